// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Handing a domain to and from the hardware trigger.

use crate::poll::Status;
use crate::{Gdsc, Trace};
use drv_gdsc_api::{
    Clock, DelayUs, GdscError, Gdscr, Mode, Regmap, ResetLine, Supply,
};
use ringbuf::ringbuf_entry;

impl<R, C, L, D, S> Gdsc<'_, R, C, L, D, S>
where
    R: Regmap,
    C: Clock,
    L: ResetLine,
    D: DelayUs<u32>,
    S: Supply,
{
    pub fn mode(&self) -> Mode {
        if self.hw_ctrl_mode {
            Mode::HardwareAutonomous
        } else {
            Mode::SoftwareControlled
        }
    }

    /// Switches who sequences the domain. The parent, if any, is locked and
    /// must be on for the whole switch.
    pub fn set_mode(&mut self, mode: Mode) -> Result<(), GdscError> {
        if !self.config.supports_hw_trigger {
            ringbuf_entry!(self.port.trace, Trace::ModeUnsupported);
            return Err(GdscError::InvalidState);
        }

        let _parent = self.lock_enabled_parent()?;

        ringbuf_entry!(self.port.trace, Trace::SetMode(mode));

        let mut gdscr = self.port.read_gdscr()?;
        match mode {
            Mode::HardwareAutonomous => {
                gdscr |= Gdscr::HW_CONTROL;
                self.port.write_gdscr(gdscr)?;

                // Give the trigger a moment to take over, so a status read
                // right behind us doesn't see the stale "on" from before the
                // switch.
                self.port.mb()?;
                self.port.udelay(1);

                self.hw_ctrl_mode = true;
            }
            Mode::SoftwareControlled => {
                gdscr -= Gdscr::HW_CONTROL;
                self.port.write_gdscr(gdscr)?;

                self.port.mb()?;
                self.port.udelay(1);

                // The trigger may have been mid-collapse when we took the
                // domain back. Only a domain we believe is on has anything
                // to wait for.
                if self.enabled {
                    if let Err(e) = self.port.poll_status(Status::Enabled) {
                        let gdscr = self.port.read_gdscr()?.bits();
                        ringbuf_entry!(
                            self.port.trace,
                            Trace::ModeSwitchTimeout { gdscr }
                        );
                        return Err(e);
                    }
                }

                self.hw_ctrl_mode = false;
            }
        }

        Ok(())
    }

    /// Like [`Gdsc::set_mode`], taking one of the power framework's mode
    /// codes.
    pub fn set_mode_raw(&mut self, raw: u32) -> Result<(), GdscError> {
        let mode = Mode::try_from(raw)?;
        self.set_mode(mode)
    }
}
