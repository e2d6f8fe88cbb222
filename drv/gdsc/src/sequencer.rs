// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Power-up and power-down sequences.
//!
//! A domain is sequenced one of two ways, fixed when it is built:
//!
//! - by toggling its own collapse bit (or its bit in a shared vote
//!   register), with the surrounding block resets and memory clamps driven
//!   through their registers and the result confirmed by polling; or
//! - by some other reset controller, in which case the domain is "on" exactly
//!   when its reset lines are released. Apart from the hardware-control
//!   check on enable, none of its registers matter.
//!
//! Neither sequence rolls anything back on failure. The hardware finishes a
//! half-started transition on its own, and the caller finds out from the
//! error.

use crate::poll::Status;
use crate::port::Port;
use crate::{Config, Trace, DEFAULT_TIMEOUT_US, MAX_RESETS};
use drv_gdsc_api::{
    Bcr, DelayUs, DomainAddr, GdscError, Gdscr, Regmap, ResetLine, GDSCR,
};
use ringbuf::ringbuf_entry;

/// How a domain is switched on and off, with the resources each approach
/// needs.
pub enum Logic<R, L> {
    Toggle(ToggleRegs<R>),
    Resets(ResetLines<L>),
}

/// A bit in a register shared by several consumers of one domain. Setting
/// our bit votes for collapse; the hardware aggregates the votes.
pub struct CollapseVote<R> {
    pub regmap: R,
    pub bit: u32,
}

/// The optional register groups around a register-toggled domain.
pub struct ToggleRegs<R> {
    /// Memory clamp and memory reset for the domain's memories.
    pub domain_addr: Option<R>,
    /// Block reset pulsed before every power-up.
    pub sw_reset: Option<R>,
    /// ACD reset, pulsed together with `sw_reset`.
    pub acd_reset: Option<R>,
    /// ACD misc reset, pulsed with `sw_reset` and left asserted on
    /// power-down.
    pub acd_misc_reset: Option<R>,
    pub collapse_vote: Option<CollapseVote<R>>,
}

impl<R> Default for ToggleRegs<R> {
    fn default() -> Self {
        Self {
            domain_addr: None,
            sw_reset: None,
            acd_reset: None,
            acd_misc_reset: None,
            collapse_vote: None,
        }
    }
}

impl<R: Regmap> ToggleRegs<R> {
    /// Whether collapse is currently being requested, by our vote or by the
    /// collapse bit.
    pub(crate) fn collapse_requested<D: DelayUs<u32>>(
        &self,
        port: &Port<R, D>,
    ) -> Result<bool, GdscError> {
        match &self.collapse_vote {
            Some(vote) => Ok(vote.regmap.read(GDSCR)? & (1 << vote.bit) != 0),
            None => Ok(port.read_gdscr()?.contains(Gdscr::SW_COLLAPSE)),
        }
    }

    fn request_collapse<D: DelayUs<u32>>(
        &self,
        port: &Port<R, D>,
        collapse: bool,
    ) -> Result<(), GdscError> {
        match &self.collapse_vote {
            Some(vote) => {
                // Touch nothing but our own vote; the other bits belong to
                // other consumers.
                let bit = 1 << vote.bit;
                vote.regmap.update_bits(
                    GDSCR,
                    bit,
                    if collapse { bit } else { 0 },
                )?;
            }
            None => {
                let mut gdscr = port.read_gdscr()?;
                gdscr.set(Gdscr::SW_COLLAPSE, collapse);
                port.write_gdscr(gdscr)?;
            }
        }
        Ok(())
    }

    /// Writes `bcr` to the SW reset and to whichever ACD resets exist, so
    /// they all see the same edge.
    fn write_block_resets(&self, sw_reset: &R, bcr: Bcr) -> Result<(), GdscError> {
        sw_reset.write(GDSCR, bcr.bits())?;
        for acd in [&self.acd_reset, &self.acd_misc_reset].into_iter().flatten() {
            acd.write(GDSCR, bcr.bits())?;
        }
        Ok(())
    }

    pub(crate) fn power_on<D: DelayUs<u32>>(
        &self,
        port: &mut Port<R, D>,
        config: &Config,
    ) -> Result<(), GdscError> {
        if let Some(sw_reset) = &self.sw_reset {
            let mut bcr = Bcr::from_bits_retain(sw_reset.read(GDSCR)?);
            bcr |= Bcr::BLK_ARES;
            self.write_block_resets(sw_reset, bcr)?;

            // BLK_ARES has to stay asserted for 1us.
            port.mb()?;
            port.udelay(1);

            bcr -= Bcr::BLK_ARES;
            self.write_block_resets(sw_reset, bcr)?;
            port.mb()?;
        }

        if let Some(domain_addr) = &self.domain_addr {
            if config.reset_aon {
                let mut val =
                    DomainAddr::from_bits_retain(domain_addr.read(GDSCR)?);
                val |= DomainAddr::MEM_RESET;
                domain_addr.write(GDSCR, val.bits())?;

                // Memory reset is held for at least 1us as well.
                port.mb()?;
                port.udelay(1);

                val -= DomainAddr::MEM_RESET;
                domain_addr.write(GDSCR, val.bits())?;
                port.mb()?;
            }

            let mut val = DomainAddr::from_bits_retain(domain_addr.read(GDSCR)?);
            val -= DomainAddr::CLAMP_IO;
            domain_addr.write(GDSCR, val.bits())?;
            port.mb()?;
        }

        self.request_collapse(port, false)?;

        // The status bit means nothing until 8 XO cycles after the request.
        port.mb()?;
        port.udelay(1);

        match port.poll_status(Status::Enabled) {
            Ok(()) => {}
            Err(GdscError::Timeout) => recover_enable_timeout(port)?,
            Err(e) => return Err(e),
        }

        if config.retain_ff_enable {
            let gdscr = port.read_gdscr()?;
            if !gdscr.contains(Gdscr::RETAIN_FF_ENABLE) {
                port.write_gdscr(gdscr | Gdscr::RETAIN_FF_ENABLE)?;
            }
        }

        // Clocks that were already running take another 4 cycles to come
        // back after the rail, and must not start within 400ns of the
        // memories being powered.
        port.udelay(1);

        // Staggered memory power-up.
        port.udelay(1);

        Ok(())
    }

    /// Returns `Err(Timeout)` if the domain never reported collapse, but only
    /// after finishing the rest of the sequence.
    pub(crate) fn power_off<D: DelayUs<u32>>(
        &self,
        port: &mut Port<R, D>,
        config: &Config,
    ) -> Result<(), GdscError> {
        // Staggered memory power-down.
        port.udelay(1);

        if let Some(acd_misc) = &self.acd_misc_reset {
            acd_misc.update_bits(
                GDSCR,
                Bcr::BLK_ARES.bits(),
                Bcr::BLK_ARES.bits(),
            )?;
        }

        self.request_collapse(port, true)?;

        port.mb()?;
        port.udelay(1);

        let mut result = Ok(());
        if config.no_status_check_on_disable {
            // No status to wait for, so wait long enough that an enable
            // arriving right behind us can't catch the domain mid-collapse.
            port.udelay(DEFAULT_TIMEOUT_US);
        } else {
            match port.poll_status(Status::Disabled) {
                Ok(()) => {}
                Err(GdscError::Timeout) => {
                    // The clamp below goes back on even if this read fails.
                    let gdscr =
                        port.read_gdscr().map(|g| g.bits()).unwrap_or(0);
                    ringbuf_entry!(port.trace, Trace::DisableTimeout { gdscr });
                    result = Err(GdscError::Timeout);
                }
                Err(e) => return Err(e),
            }
        }

        if let Some(domain_addr) = &self.domain_addr {
            let val = DomainAddr::from_bits_retain(domain_addr.read(GDSCR)?)
                | DomainAddr::CLAMP_IO;
            domain_addr.write(GDSCR, val.bits())?;
        }

        result
    }
}

/// Handles a domain that did not report power within the budget.
///
/// With an alternate status register the domain may simply be slow to hand
/// over, so we log both registers and give it one more budget. Without one
/// there is nothing more to wait on: we let it settle for one more timeout
/// so the final state in the log means something, and fail.
fn recover_enable_timeout<R: Regmap, D: DelayUs<u32>>(
    port: &mut Port<R, D>,
) -> Result<(), GdscError> {
    let gdscr = port.read_gdscr()?.bits();

    match port.hw_ctrl_status()? {
        Some(hw_ctrl) => {
            ringbuf_entry!(port.trace, Trace::EnableTimeout { gdscr, hw_ctrl });

            match port.poll_status(Status::Enabled) {
                Ok(()) => {
                    ringbuf_entry!(port.trace, Trace::EnableRecovered);
                    Ok(())
                }
                Err(GdscError::Timeout) => {
                    let gdscr = port.read_gdscr()?.bits();
                    let hw_ctrl = port.hw_ctrl_status()?.unwrap_or(0);
                    ringbuf_entry!(
                        port.trace,
                        Trace::EnableFinalTimeout { gdscr, hw_ctrl }
                    );
                    Err(GdscError::Timeout)
                }
                Err(e) => Err(e),
            }
        }
        None => {
            ringbuf_entry!(port.trace, Trace::EnableTimedOut { gdscr });
            let timeout_us = port.timeout_us;
            port.udelay(timeout_us);

            let gdscr = port.read_gdscr()?.bits();
            ringbuf_entry!(port.trace, Trace::EnableFinalState { gdscr });
            Err(GdscError::Timeout)
        }
    }
}

/// The reset lines of a reset-controlled domain, in power-up order.
pub struct ResetLines<L> {
    lines: heapless::Vec<L, MAX_RESETS>,
    asserted: bool,
}

impl<L: ResetLine> ResetLines<L> {
    /// Takes the lines in the order they must be released. More than
    /// [`MAX_RESETS`] lines is a configuration error.
    pub fn new(
        lines: impl IntoIterator<Item = L>,
    ) -> Result<Self, GdscError> {
        let mut v = heapless::Vec::new();
        for line in lines {
            v.push(line).map_err(|_| GdscError::ConfigError)?;
        }
        // We find out whether the lines are asserted the first time we
        // drive them; until then the domain counts as running.
        Ok(Self {
            lines: v,
            asserted: false,
        })
    }

    pub fn asserted(&self) -> bool {
        self.asserted
    }

    pub(crate) fn deassert_all(&mut self) -> Result<(), GdscError> {
        for line in self.lines.iter_mut() {
            line.deassert()?;
        }
        self.asserted = false;
        Ok(())
    }

    pub(crate) fn assert_all(&mut self) -> Result<(), GdscError> {
        for line in self.lines.iter_mut().rev() {
            line.assert()?;
        }
        self.asserted = true;
        Ok(())
    }
}
