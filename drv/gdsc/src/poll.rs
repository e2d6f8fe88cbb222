// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bounded polling of a status bit.

use drv_gdsc_api::{DelayUs, GdscError, Gdscr, Regmap, GDSCR};

/// The power state we are waiting for the domain to report.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Status {
    Enabled,
    Disabled,
}

/// Samples `reg & mask` until the presence of the masked bits matches
/// `expect_set`, trying at most `budget` times.
///
/// Each failed sample costs exactly one 1 us delay; after `budget` failed
/// samples this gives up with [`GdscError::Timeout`]. A failed register read
/// ends the poll immediately.
pub fn wait_for<R, D>(
    reg: &R,
    mask: u32,
    expect_set: bool,
    budget: u32,
    delay: &mut D,
) -> Result<(), GdscError>
where
    R: Regmap + ?Sized,
    D: DelayUs<u32>,
{
    for _ in 0..budget {
        let val = reg.read(GDSCR)?;
        if (val & mask != 0) == expect_set {
            return Ok(());
        }

        // Nothing bounds how long the status bit takes to follow the
        // domain, so keep the gap between samples as small as we can.
        delay.delay_us(1);
    }

    Err(GdscError::Timeout)
}

/// Waits for the `PWR_ON` status bit of `reg` to reflect `status`.
pub fn wait_for_status<R, D>(
    reg: &R,
    status: Status,
    budget: u32,
    delay: &mut D,
) -> Result<(), GdscError>
where
    R: Regmap + ?Sized,
    D: DelayUs<u32>,
{
    wait_for(
        reg,
        Gdscr::PWR_ON.bits(),
        status == Status::Enabled,
        budget,
        delay,
    )
}
