// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A simulated GDSC and its surroundings.
//!
//! All fakes share one [`Hw`], which keeps the register contents and a log of
//! every access in the order it happened. The domain's power status follows
//! its collapse request (the collapse bit, or the vote bit when one is
//! configured) after a configurable number of stale status reads.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use drv_gdsc::{
    BusError, Clock, ClockError, Config, Gdsc, Gdscr, Logic, NoParent,
    Regmap, Registry, ResetError, ResetLine, Resources, Supply, SupplyError,
    ToggleRegs, Trace, GDSCR,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Reg {
    Gdscr,
    HwCtrl,
    DomainAddr,
    SwReset,
    AcdReset,
    AcdMisc,
    Vote,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Op {
    Read(Reg, u32),
    Write(Reg, u32, u32),
    Delay(u32),
    ClockOn(usize),
    ClockOff(usize),
    Assert(usize),
    Deassert(usize),
    Lock,
    Unlock,
}

struct State {
    regs: HashMap<(Reg, u32), u32>,
    log: Vec<Op>,
    status_reg: Reg,
    vote_bit: Option<u32>,
    powered: bool,
    /// Stale status reads before `powered` follows the request; `None`
    /// means it never does.
    latency: Option<u32>,
    pending: Option<u32>,
    /// Successful reads left before a register starts failing.
    fail_after: HashMap<Reg, u32>,
    clock_fails: bool,
    reset_fails: bool,
}

impl State {
    fn collapse_requested(&self) -> bool {
        match self.vote_bit {
            Some(bit) => self.get(Reg::Vote, GDSCR) & (1 << bit) != 0,
            None => {
                self.get(Reg::Gdscr, GDSCR) & Gdscr::SW_COLLAPSE.bits() != 0
            }
        }
    }

    fn get(&self, reg: Reg, offset: u32) -> u32 {
        self.regs.get(&(reg, offset)).copied().unwrap_or(0)
    }

    /// Restarts the countdown if the domain now has somewhere to go.
    fn request_changed(&mut self) {
        if self.collapse_requested() == self.powered {
            if self.pending.is_none() {
                self.pending = self.latency;
            }
        } else {
            self.pending = None;
        }
    }

    fn sample_status(&mut self) {
        if self.collapse_requested() != self.powered {
            return;
        }
        match self.pending {
            Some(0) => {
                self.powered = !self.powered;
                self.pending = None;
            }
            Some(n) => self.pending = Some(n - 1),
            None => {}
        }
    }
}

#[derive(Clone)]
pub struct Hw(Rc<RefCell<State>>);

impl Default for Hw {
    fn default() -> Self {
        Self::new()
    }
}

impl Hw {
    /// A collapsed, unpowered domain that powers up as soon as it is asked.
    pub fn new() -> Self {
        let mut regs = HashMap::new();
        regs.insert((Reg::Gdscr, GDSCR), Gdscr::SW_COLLAPSE.bits());
        Self(Rc::new(RefCell::new(State {
            regs,
            log: Vec::new(),
            status_reg: Reg::Gdscr,
            vote_bit: None,
            powered: false,
            latency: Some(0),
            pending: None,
            fail_after: HashMap::new(),
            clock_fails: false,
            reset_fails: false,
        })))
    }

    /// A domain that was left powered on by whatever ran before us.
    pub fn powered_on() -> Self {
        let hw = Self::new();
        hw.set(Reg::Gdscr, 0);
        hw.set_powered(true);
        hw
    }

    pub fn regmap(&self, reg: Reg) -> FakeReg {
        FakeReg {
            hw: self.clone(),
            reg,
        }
    }

    pub fn delay(&self) -> FakeDelay {
        FakeDelay(self.clone())
    }

    pub fn clock(&self, idx: usize) -> FakeClock {
        FakeClock {
            hw: self.clone(),
            idx,
        }
    }

    pub fn reset(&self, idx: usize) -> FakeReset {
        FakeReset {
            hw: self.clone(),
            idx,
        }
    }

    pub fn parent(&self, enabled: bool) -> FakeParent {
        FakeParent {
            hw: self.clone(),
            enabled: Cell::new(enabled),
            broken: Cell::new(false),
            locks: Cell::new(0),
            unlocks: Cell::new(0),
        }
    }

    pub fn get(&self, reg: Reg) -> u32 {
        self.get_at(reg, GDSCR)
    }

    pub fn get_at(&self, reg: Reg, offset: u32) -> u32 {
        self.0.borrow().get(reg, offset)
    }

    pub fn gdscr(&self) -> Gdscr {
        Gdscr::from_bits_retain(self.get(Reg::Gdscr))
    }

    pub fn set(&self, reg: Reg, val: u32) {
        self.set_at(reg, GDSCR, val);
    }

    pub fn set_at(&self, reg: Reg, offset: u32, val: u32) {
        let mut s = self.0.borrow_mut();
        s.regs.insert((reg, offset), val);
        s.request_changed();
    }

    /// Reports power status through `reg` rather than GDSCR.
    pub fn use_status(&self, reg: Reg) {
        self.0.borrow_mut().status_reg = reg;
    }

    /// Makes bit `bit` of the vote register the collapse request.
    pub fn use_vote_bit(&self, bit: u32) {
        let mut s = self.0.borrow_mut();
        s.vote_bit = Some(bit);
        s.request_changed();
    }

    pub fn set_latency(&self, latency: Option<u32>) {
        let mut s = self.0.borrow_mut();
        s.latency = latency;
        s.pending = None;
        s.request_changed();
    }

    pub fn powered(&self) -> bool {
        self.0.borrow().powered
    }

    pub fn set_powered(&self, powered: bool) {
        let mut s = self.0.borrow_mut();
        s.powered = powered;
        s.pending = None;
        s.request_changed();
    }

    pub fn fail_reads(&self, reg: Reg) {
        self.fail_reads_after(reg, 0);
    }

    /// Lets `reads` more reads of `reg` through, then fails the rest.
    pub fn fail_reads_after(&self, reg: Reg, reads: u32) {
        self.0.borrow_mut().fail_after.insert(reg, reads);
    }

    pub fn fail_clocks(&self) {
        self.0.borrow_mut().clock_fails = true;
    }

    pub fn fail_resets(&self) {
        self.0.borrow_mut().reset_fails = true;
    }

    fn log(&self, op: Op) {
        self.0.borrow_mut().log.push(op);
    }

    pub fn ops(&self) -> Vec<Op> {
        self.0.borrow().log.clone()
    }

    pub fn clear_ops(&self) {
        self.0.borrow_mut().log.clear();
    }

    pub fn writes(&self) -> Vec<(Reg, u32)> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                Op::Write(reg, _, val) => Some((reg, val)),
                _ => None,
            })
            .collect()
    }

    pub fn writes_to(&self, reg: Reg) -> Vec<u32> {
        self.writes()
            .into_iter()
            .filter(|&(r, _)| r == reg)
            .map(|(_, val)| val)
            .collect()
    }

    pub fn delays(&self) -> Vec<u32> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                Op::Delay(us) => Some(us),
                _ => None,
            })
            .collect()
    }

    /// Everything that isn't a register read or a delay.
    pub fn actions(&self) -> Vec<Op> {
        self.ops()
            .into_iter()
            .filter(|op| !matches!(op, Op::Read(..) | Op::Delay(_)))
            .collect()
    }
}

pub struct FakeReg {
    hw: Hw,
    reg: Reg,
}

impl Regmap for FakeReg {
    fn read(&self, offset: u32) -> Result<u32, BusError> {
        let mut s = self.hw.0.borrow_mut();
        if let Some(left) = s.fail_after.get_mut(&self.reg) {
            if *left == 0 {
                return Err(BusError);
            }
            *left -= 1;
        }
        s.log.push(Op::Read(self.reg, offset));

        let mut val = s.get(self.reg, offset);
        if self.reg == s.status_reg && offset == GDSCR {
            s.sample_status();
            val &= !Gdscr::PWR_ON.bits();
            if s.powered {
                val |= Gdscr::PWR_ON.bits();
            }
        }
        Ok(val)
    }

    fn write(&self, offset: u32, val: u32) -> Result<(), BusError> {
        let mut s = self.hw.0.borrow_mut();
        s.log.push(Op::Write(self.reg, offset, val));
        s.regs.insert((self.reg, offset), val);
        s.request_changed();
        Ok(())
    }
}

pub struct FakeDelay(Hw);

impl drv_gdsc::DelayUs<u32> for FakeDelay {
    fn delay_us(&mut self, us: u32) {
        self.0.log(Op::Delay(us));
    }
}

pub struct FakeClock {
    hw: Hw,
    idx: usize,
}

impl Clock for FakeClock {
    fn prepare_enable(&mut self) -> Result<(), ClockError> {
        if self.hw.0.borrow().clock_fails {
            return Err(ClockError);
        }
        self.hw.log(Op::ClockOn(self.idx));
        Ok(())
    }

    fn disable_unprepare(&mut self) {
        self.hw.log(Op::ClockOff(self.idx));
    }
}

pub struct FakeReset {
    hw: Hw,
    idx: usize,
}

impl ResetLine for FakeReset {
    fn assert(&mut self) -> Result<(), ResetError> {
        if self.hw.0.borrow().reset_fails {
            return Err(ResetError);
        }
        self.hw.log(Op::Assert(self.idx));
        Ok(())
    }

    fn deassert(&mut self) -> Result<(), ResetError> {
        if self.hw.0.borrow().reset_fails {
            return Err(ResetError);
        }
        self.hw.log(Op::Deassert(self.idx));
        Ok(())
    }
}

pub struct FakeParent {
    hw: Hw,
    pub enabled: Cell<bool>,
    pub broken: Cell<bool>,
    pub locks: Cell<u32>,
    pub unlocks: Cell<u32>,
}

impl FakeParent {
    pub fn held(&self) -> bool {
        self.locks.get() != self.unlocks.get()
    }
}

impl Supply for FakeParent {
    fn lock(&self) {
        self.locks.set(self.locks.get() + 1);
        self.hw.log(Op::Lock);
    }

    fn unlock(&self) {
        self.unlocks.set(self.unlocks.get() + 1);
        self.hw.log(Op::Unlock);
    }

    fn is_enabled(&self) -> Result<bool, SupplyError> {
        if self.broken.get() {
            return Err(SupplyError);
        }
        Ok(self.enabled.get())
    }
}

pub type TestGdsc<'p, S = NoParent> =
    Gdsc<'p, FakeReg, FakeClock, FakeReset, FakeDelay, S>;

pub type TestResources = Resources<FakeReg, FakeClock, FakeReset>;

/// Resources for a register-toggled domain with nothing but GDSCR.
pub fn toggle(hw: &Hw) -> TestResources {
    toggle_with(hw, ToggleRegs::default())
}

pub fn toggle_with(hw: &Hw, regs: ToggleRegs<FakeReg>) -> TestResources {
    Resources::new(hw.regmap(Reg::Gdscr), Logic::Toggle(regs))
}

/// Builds a parentless domain in a registry of its own.
pub fn build(
    hw: &Hw,
    config: Config,
    resources: TestResources,
) -> TestGdsc<'static> {
    let mut registry = Registry::<4>::new();
    Gdsc::new(&mut registry, config, resources, hw.delay(), None)
        .expect("domain should build")
}

pub fn build_with_parent<'p>(
    hw: &Hw,
    config: Config,
    resources: TestResources,
    parent: &'p FakeParent,
) -> TestGdsc<'p, FakeParent> {
    let mut registry = Registry::<4>::new();
    Gdsc::new(&mut registry, config, resources, hw.delay(), Some(parent))
        .expect("domain should build")
}

pub fn traces<S: Supply>(gdsc: &TestGdsc<'_, S>) -> Vec<Trace> {
    gdsc.trace().payloads().collect()
}
