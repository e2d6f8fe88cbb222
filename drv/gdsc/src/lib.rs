// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Driver for GDSC power domains.
//!
//! A GDSC switches power to one domain of the SoC. Software asks for the
//! domain to collapse (power off) or restore by writing a bit, and the GDSC's
//! own state machine does the rest: it walks the domain's clamps and resets in
//! the right order and reports the result in a status bit. Our job is to set
//! up the parts around the state machine in the right order, give the
//! hardware the settle time it needs, and not fight the hardware trigger when
//! the domain has been handed to it.
//!
//! The expected usage model is:
//!
//! - Describe the domain with a [`Config`] and hand over its register
//!   groups, clocks and (for reset-controlled domains) reset lines in a
//!   [`Resources`].
//!
//! - Build it with [`Gdsc::new`], which validates the description, brings
//!   GDSCR into a known state and reads back whether the domain was left on
//!   by whatever ran before us.
//!
//! - Drive it through [`PowerDomain`].
//!
//! Each `Gdsc` keeps its own trace ring; see [`Gdsc::trace`].

#![cfg_attr(target_os = "none", no_std)]

mod mode;
mod poll;
mod port;
mod registry;
mod sequencer;

pub use drv_gdsc_api::*;
pub use poll::{wait_for, wait_for_status, Status};
pub use registry::{DomainId, Registry};
pub use sequencer::{CollapseVote, Logic, ResetLines, ToggleRegs};

use port::Port;
use ringbuf::{ringbuf_entry, Ringbuf};

/// Status polls allowed before a transition is declared stuck, in
/// microseconds.
pub const DEFAULT_TIMEOUT_US: u32 = 100;

pub const MAX_RESETS: usize = 8;
pub const MAX_CLOCKS: usize = 8;

const TRACE_DEPTH: usize = 32;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Trace {
    None,
    Probed {
        enabled: bool,
        hw_ctrl: bool,
    },
    ForceEnableTimeout {
        gdscr: u32,
    },
    Enable,
    EnableWhileHwControlled {
        gdscr: u32,
    },
    /// First poll budget ran out; polling again.
    EnableTimeout {
        gdscr: u32,
        hw_ctrl: u32,
    },
    EnableRecovered,
    EnableFinalTimeout {
        gdscr: u32,
        hw_ctrl: u32,
    },
    /// Timed out with no alternate status register to fall back on.
    EnableTimedOut {
        gdscr: u32,
    },
    EnableFinalState {
        gdscr: u32,
    },
    Enabled,
    Disable,
    DisableTimeout {
        gdscr: u32,
    },
    Disabled,
    RootClock(bool),
    ParentDisabled,
    ParentQueryFailed,
    ModeUnsupported,
    SetMode(Mode),
    ModeSwitchTimeout {
        gdscr: u32,
    },
    Regs(RegDump),
}

/// What, if anything, to do with the domain's root clock around
/// transitions.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RootClockPolicy {
    None,
    /// Vote the root clock on when the domain is enabled and keep it voted
    /// until the domain is disabled.
    EnableOnTransition,
    /// Force the root clock on for the length of every enable and every
    /// disable, and release it at the end of each.
    AlwaysForceEnabled,
}

/// Static description of a domain.
#[derive(Copy, Clone, Debug)]
pub struct Config {
    pub name: &'static str,
    pub timeout_us: u32,
    pub root_clock: RootClockPolicy,
    /// Set RETAIN_FF_ENABLE once the domain is up.
    pub retain_ff_enable: bool,
    /// Pulse the memory reset before unclamping the memories.
    pub reset_aon: bool,
    /// Trust a fixed delay rather than the status bit on disable.
    pub no_status_check_on_disable: bool,
    /// The domain is left on by other means; enable is a no-op and it
    /// never reports itself enabled.
    pub skip_disable_before_enable: bool,
    /// The domain can be handed to the hardware trigger.
    pub supports_hw_trigger: bool,
    /// GDSCR is followed by the CFG and CFG2 registers.
    pub has_config_regs: bool,
    /// Value for GDSCR's clock-disable wait field, written at probe.
    pub clk_dis_wait: Option<u8>,
}

impl Config {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            timeout_us: DEFAULT_TIMEOUT_US,
            root_clock: RootClockPolicy::None,
            retain_ff_enable: false,
            reset_aon: false,
            no_status_check_on_disable: false,
            skip_disable_before_enable: false,
            supports_hw_trigger: false,
            has_config_regs: true,
            clk_dis_wait: None,
        }
    }
}

/// The hardware handles a domain needs, as found by whoever parsed the
/// board description.
pub struct Resources<R, C, L> {
    pub gdscr: R,
    pub hw_ctrl: Option<R>,
    pub clocks: heapless::Vec<C, MAX_CLOCKS>,
    /// Index of the root clock in `clocks`.
    pub root_clk: Option<usize>,
    pub logic: Logic<R, L>,
}

impl<R, C, L> Resources<R, C, L> {
    pub fn new(gdscr: R, logic: Logic<R, L>) -> Self {
        Self {
            gdscr,
            hw_ctrl: None,
            clocks: heapless::Vec::new(),
            root_clk: None,
            logic,
        }
    }

    pub fn with_hw_ctrl(mut self, hw_ctrl: R) -> Self {
        self.hw_ctrl = Some(hw_ctrl);
        self
    }

    pub fn with_clock(mut self, clock: C) -> Result<Self, GdscError> {
        self.clocks.push(clock).map_err(|_| GdscError::ConfigError)?;
        Ok(self)
    }

    /// Adds `clock` and marks it as the domain's root clock.
    pub fn with_root_clock(mut self, clock: C) -> Result<Self, GdscError> {
        self.root_clk = Some(self.clocks.len());
        self.with_clock(clock)
    }
}

/// A snapshot of the GDSC's own registers.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RegDump {
    pub gdscr: u32,
    pub cfg: Option<u32>,
    pub cfg2: Option<u32>,
}

/// One GDSC-controlled power domain.
///
/// `S` is the type of the supply this domain hangs off; domains without one
/// use [`NoParent`] and pass `None`.
pub struct Gdsc<'p, R, C, L, D, S = NoParent> {
    id: DomainId,
    config: Config,
    port: Port<R, D>,
    logic: Logic<R, L>,
    clocks: heapless::Vec<C, MAX_CLOCKS>,
    root_clk: Option<usize>,
    parent: Option<&'p S>,
    enabled: bool,
    hw_ctrl_mode: bool,
    root_clk_voted: bool,
}

impl<'p, R, C, L, D, S> Gdsc<'p, R, C, L, D, S>
where
    R: Regmap,
    C: Clock,
    L: ResetLine,
    D: DelayUs<u32>,
    S: Supply,
{
    /// Validates `config` against `resources`, brings the hardware into a
    /// known state, and records the domain in `registry`.
    ///
    /// GDSCR is left with the hardware trigger and software override off;
    /// whatever power state the domain is in is kept and becomes our initial
    /// state. Reset-controlled domains are the exception: their GDSC is
    /// switched on here, once, and stays on.
    pub fn new<const N: usize>(
        registry: &mut Registry<N>,
        config: Config,
        resources: Resources<R, C, L>,
        delay: D,
        parent: Option<&'p S>,
    ) -> Result<Self, GdscError> {
        registry.check(config.name)?;

        if let Logic::Toggle(regs) = &resources.logic {
            if regs.collapse_vote.as_ref().is_some_and(|v| v.bit > 31) {
                return Err(GdscError::ConfigError);
            }
        }

        if config.root_clock != RootClockPolicy::None {
            match resources.root_clk {
                Some(i) if i < resources.clocks.len() => {}
                _ => return Err(GdscError::ConfigError),
            }
        }

        let mut port = Port::new(
            resources.gdscr,
            resources.hw_ctrl,
            delay,
            config.timeout_us,
        );

        // Collapse and restore happen on our register writes, sequenced by
        // the GDSC state machine, until someone asks for otherwise.
        let mut gdscr = port.read_gdscr()?;
        gdscr -= Gdscr::HW_CONTROL | Gdscr::SW_OVERRIDE;
        if let Some(cycles) = config.clk_dis_wait {
            gdscr = gdscr.with_clk_dis_wait(cycles);
        }
        port.write_gdscr(gdscr)?;

        let enabled = match &resources.logic {
            Logic::Toggle(regs) => !regs.collapse_requested(&port)?,
            Logic::Resets(resets) => {
                gdscr -= Gdscr::SW_COLLAPSE;
                port.write_gdscr(gdscr)?;

                if let Err(e) = port.poll_status(Status::Enabled) {
                    ringbuf_entry!(
                        port.trace,
                        Trace::ForceEnableTimeout {
                            gdscr: gdscr.bits()
                        }
                    );
                    return Err(e);
                }
                !resets.asserted()
            }
        };

        let hw_ctrl_mode = port.read_gdscr()?.contains(Gdscr::HW_CONTROL);
        ringbuf_entry!(
            port.trace,
            Trace::Probed {
                enabled,
                hw_ctrl: hw_ctrl_mode
            }
        );

        let id = registry.register(config.name)?;

        Ok(Self {
            id,
            config,
            port,
            logic: resources.logic,
            clocks: resources.clocks,
            root_clk: resources.root_clk,
            parent,
            enabled,
            hw_ctrl_mode,
            root_clk_voted: false,
        })
    }

    pub fn id(&self) -> DomainId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.config.name
    }

    pub fn trace(&self) -> &Ringbuf<Trace, TRACE_DEPTH> {
        &self.port.trace
    }

    pub fn root_clock_voted(&self) -> bool {
        self.root_clk_voted
    }

    /// Whether the reset lines of a reset-controlled domain are held.
    /// Always `false` for register-toggled domains.
    pub fn resets_asserted(&self) -> bool {
        match &self.logic {
            Logic::Resets(resets) => resets.asserted(),
            Logic::Toggle(_) => false,
        }
    }

    /// Our view of the domain's power state. This never touches the
    /// hardware.
    pub fn is_enabled(&self) -> bool {
        // Domains we never really switch always look off, so that the
        // framework keeps sending us enables (which we ignore).
        if self.config.skip_disable_before_enable {
            return false;
        }
        match &self.logic {
            Logic::Resets(resets) => !resets.asserted(),
            Logic::Toggle(_) => self.enabled,
        }
    }

    pub fn enable(&mut self) -> Result<(), GdscError> {
        if self.config.skip_disable_before_enable {
            return Ok(());
        }

        ringbuf_entry!(self.port.trace, Trace::Enable);

        match self.config.root_clock {
            RootClockPolicy::None => {}
            // Still voted from an earlier enable.
            RootClockPolicy::EnableOnTransition if self.root_clk_voted => {}
            _ => self.vote_root_clock()?,
        }

        let result = match self.port.read_gdscr() {
            Ok(gdscr) if gdscr.contains(Gdscr::HW_CONTROL) => {
                // The hardware trigger owns this domain; switching it now
                // would race it. Nothing has been started, so there's
                // nothing to undo either.
                ringbuf_entry!(
                    self.port.trace,
                    Trace::EnableWhileHwControlled {
                        gdscr: gdscr.bits()
                    }
                );
                return Err(GdscError::Busy);
            }
            Ok(_) => match &mut self.logic {
                Logic::Toggle(regs) => {
                    regs.power_on(&mut self.port, &self.config)
                }
                Logic::Resets(resets) => resets.deassert_all(),
            },
            Err(e) => Err(e),
        };

        if self.config.root_clock == RootClockPolicy::AlwaysForceEnabled {
            self.release_root_clock();
        }

        result?;

        self.enabled = true;
        ringbuf_entry!(self.port.trace, Trace::Enabled);
        Ok(())
    }

    pub fn disable(&mut self) -> Result<(), GdscError> {
        let _parent = self.lock_enabled_parent()?;

        ringbuf_entry!(self.port.trace, Trace::Disable);

        let forced =
            self.config.root_clock == RootClockPolicy::AlwaysForceEnabled;
        if forced {
            self.vote_root_clock()?;
        }

        let result = match &mut self.logic {
            Logic::Toggle(regs) => regs.power_off(&mut self.port, &self.config),
            Logic::Resets(resets) => resets.assert_all(),
        };

        match result {
            // A domain that is slow to report collapse has still been told
            // to collapse; finish the bookkeeping and report the timeout.
            Ok(()) | Err(GdscError::Timeout) => {}
            Err(e) => {
                if forced {
                    self.release_root_clock();
                }
                return Err(e);
            }
        }

        // If enable was never called through us the root clock was never
        // voted, and is not ours to drop.
        let voted_while_on = self.root_clk_voted
            && self.config.root_clock == RootClockPolicy::EnableOnTransition;
        if voted_while_on || forced {
            self.release_root_clock();
        }

        self.enabled = false;
        ringbuf_entry!(self.port.trace, Trace::Disabled);
        result
    }

    /// Reads the GDSC registers into the trace ring, and returns them.
    pub fn dump_regs(&mut self) -> Result<RegDump, GdscError> {
        let gdscr = self.port.gdscr.read(GDSCR)?;
        let (cfg, cfg2) = if self.config.has_config_regs {
            (
                Some(self.port.gdscr.read(GDS_CFG)?),
                Some(self.port.gdscr.read(GDS_CFG2)?),
            )
        } else {
            (None, None)
        };

        let dump = RegDump { gdscr, cfg, cfg2 };
        ringbuf_entry!(self.port.trace, Trace::Regs(dump));
        Ok(dump)
    }

    fn root_clock(&mut self) -> Option<&mut C> {
        if self.config.root_clock == RootClockPolicy::None {
            return None;
        }
        let idx = self.root_clk?;
        self.clocks.get_mut(idx)
    }

    fn vote_root_clock(&mut self) -> Result<(), GdscError> {
        if let Some(clk) = self.root_clock() {
            clk.prepare_enable()?;
            self.root_clk_voted = true;
            ringbuf_entry!(self.port.trace, Trace::RootClock(true));
        }
        Ok(())
    }

    fn release_root_clock(&mut self) {
        if let Some(clk) = self.root_clock() {
            clk.disable_unprepare();
            self.root_clk_voted = false;
            ringbuf_entry!(self.port.trace, Trace::RootClock(false));
        }
    }

    /// Takes the parent's lock and checks that the parent is on. The lock
    /// is held until the returned guard is dropped; on error it has already
    /// been released.
    fn lock_enabled_parent(
        &mut self,
    ) -> Result<Option<ParentGuard<'p, S>>, GdscError> {
        let Some(parent) = self.parent else {
            return Ok(None);
        };

        let guard = ParentGuard::lock(parent);
        match parent.is_enabled() {
            Ok(true) => Ok(Some(guard)),
            Ok(false) => {
                ringbuf_entry!(self.port.trace, Trace::ParentDisabled);
                Err(GdscError::InvalidState)
            }
            Err(e) => {
                ringbuf_entry!(self.port.trace, Trace::ParentQueryFailed);
                Err(e.into())
            }
        }
    }
}

/// Holds a supply's lock for as long as it lives.
struct ParentGuard<'p, S: Supply>(&'p S);

impl<'p, S: Supply> ParentGuard<'p, S> {
    fn lock(supply: &'p S) -> Self {
        supply.lock();
        Self(supply)
    }
}

impl<S: Supply> Drop for ParentGuard<'_, S> {
    fn drop(&mut self) {
        self.0.unlock();
    }
}

impl<R, C, L, D, S> PowerDomain for Gdsc<'_, R, C, L, D, S>
where
    R: Regmap,
    C: Clock,
    L: ResetLine,
    D: DelayUs<u32>,
    S: Supply,
{
    fn is_enabled(&self) -> bool {
        Gdsc::is_enabled(self)
    }

    fn enable(&mut self) -> Result<(), GdscError> {
        Gdsc::enable(self)
    }

    fn disable(&mut self) -> Result<(), GdscError> {
        Gdsc::disable(self)
    }

    fn mode(&self) -> Mode {
        Gdsc::mode(self)
    }

    fn set_mode(&mut self, mode: Mode) -> Result<(), GdscError> {
        Gdsc::set_mode(self, mode)
    }
}
