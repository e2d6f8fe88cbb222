// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Ordered access to a domain's control and status registers.

use crate::poll::{self, Status};
use crate::{Trace, TRACE_DEPTH};
use drv_gdsc_api::{DelayUs, GdscError, Gdscr, Regmap, GDSCR};
use ringbuf::Ringbuf;

/// The registers every domain has, plus the delay source and trace ring
/// that all sequencing steps share.
pub(crate) struct Port<R, D> {
    pub gdscr: R,
    /// Alternate status register. Domains that can be handed to the hardware
    /// trigger report power state here rather than in GDSCR.
    pub hw_ctrl: Option<R>,
    delay: D,
    pub timeout_us: u32,
    pub trace: Ringbuf<Trace, TRACE_DEPTH>,
}

impl<R: Regmap, D: DelayUs<u32>> Port<R, D> {
    pub fn new(gdscr: R, hw_ctrl: Option<R>, delay: D, timeout_us: u32) -> Self {
        Self {
            gdscr,
            hw_ctrl,
            delay,
            timeout_us,
            trace: Ringbuf::new(Trace::None),
        }
    }

    pub fn read_gdscr(&self) -> Result<Gdscr, GdscError> {
        Ok(Gdscr::from_bits_retain(self.gdscr.read(GDSCR)?))
    }

    pub fn write_gdscr(&self, val: Gdscr) -> Result<(), GdscError> {
        Ok(self.gdscr.write(GDSCR, val.bits())?)
    }

    /// Reads GDSCR for no reason other than to make sure every write issued
    /// before it has reached the hardware.
    pub fn mb(&self) -> Result<(), GdscError> {
        self.gdscr.read(GDSCR)?;
        Ok(())
    }

    pub fn udelay(&mut self, us: u32) {
        self.delay.delay_us(us);
    }

    /// Current contents of the alternate status register, if there is one.
    pub fn hw_ctrl_status(&self) -> Result<Option<u32>, GdscError> {
        match &self.hw_ctrl {
            Some(reg) => Ok(Some(reg.read(GDSCR)?)),
            None => Ok(None),
        }
    }

    /// Polls for `status` against whichever register reports power state for
    /// this domain, using the domain's timeout budget.
    pub fn poll_status(&mut self, status: Status) -> Result<(), GdscError> {
        let reg = self.hw_ctrl.as_ref().unwrap_or(&self.gdscr);
        poll::wait_for_status(reg, status, self.timeout_us, &mut self.delay)
    }
}
