// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! API crate for GDSC power-domain drivers.
//!
//! A GDSC (globally distributed switch controller) gates power to one domain
//! of an SoC. This crate holds what is shared between the driver and the
//! things around it: the register layouts, the error and mode types, the
//! traits the driver needs its platform to implement, and the
//! [`PowerDomain`] trait the driver exposes upward.

#![cfg_attr(target_os = "none", no_std)]

use bitflags::bitflags;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

pub use embedded_hal::blocking::delay::DelayUs;

/// Offset of the control register (GDSCR) within its register group. Every
/// other register group this driver touches also keeps its one register of
/// interest at this offset.
pub const GDSCR: u32 = 0x0;
/// Offset of the first configuration register, when present.
pub const GDS_CFG: u32 = 0x4;
/// Offset of the second configuration register, when present.
pub const GDS_CFG2: u32 = 0x8;

/// Shift of the `clk_dis_wait` field in GDSCR.
pub const CLK_DIS_WAIT_SHIFT: u32 = 12;

bitflags! {
    /// Bits of the GDSC control register.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct Gdscr: u32 {
        /// Request that the domain collapse (power off).
        const SW_COLLAPSE = 1 << 0;
        /// Hand sequencing to the hardware trigger.
        const HW_CONTROL = 1 << 1;
        /// Bypass the hardware state machine. We always keep this clear.
        const SW_OVERRIDE = 1 << 2;
        /// Keep retention flops enabled across collapse.
        const RETAIN_FF_ENABLE = 1 << 11;
        /// Clock-disable wait cycles, a 4-bit field.
        const CLK_DIS_WAIT = 0xf << CLK_DIS_WAIT_SHIFT;
        /// Status: the domain is powered.
        const PWR_ON = 1 << 31;
    }
}

impl Gdscr {
    /// Returns `self` with the `clk_dis_wait` field replaced by `cycles`.
    /// Only the low four bits of `cycles` are significant.
    pub fn with_clk_dis_wait(self, cycles: u8) -> Self {
        let field = (u32::from(cycles) << CLK_DIS_WAIT_SHIFT)
            & Self::CLK_DIS_WAIT.bits();
        (self - Self::CLK_DIS_WAIT) | Self::from_bits_retain(field)
    }
}

bitflags! {
    /// Bits of the domain-address register that fronts the domain's
    /// memories.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct DomainAddr: u32 {
        const CLAMP_IO = 1 << 0;
        const MEM_RESET = 1 << 4;
    }
}

bitflags! {
    /// Bits of a block control register (BCR), used for the SW reset and the
    /// ACD resets.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct Bcr: u32 {
        const BLK_ARES = 1 << 0;
    }
}

#[derive(Copy, Clone, Debug, FromPrimitive, Eq, PartialEq)]
pub enum GdscError {
    /// The domain is under hardware control and refuses a software enable.
    Busy = 1,
    /// The status bit never reached the expected state.
    Timeout,
    /// The parent supply is off, or the requested mode is unsupported.
    InvalidState,
    /// The static configuration does not describe a usable domain.
    ConfigError,
    RegisterAccess,
    ClockFault,
    ResetFault,
    /// The parent supply could not report its state.
    SupplyFault,
}

/// Failure of the underlying register transport.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BusError;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ClockError;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ResetError;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SupplyError;

impl From<BusError> for GdscError {
    fn from(_: BusError) -> Self {
        Self::RegisterAccess
    }
}

impl From<ClockError> for GdscError {
    fn from(_: ClockError) -> Self {
        Self::ClockFault
    }
}

impl From<ResetError> for GdscError {
    fn from(_: ResetError) -> Self {
        Self::ResetFault
    }
}

impl From<SupplyError> for GdscError {
    fn from(_: SupplyError) -> Self {
        Self::SupplyFault
    }
}

/// Who sequences the domain.
///
/// The discriminants are the mode codes used by the power framework, so a
/// raw code can be converted with `TryFrom<u32>`.
#[derive(Copy, Clone, Debug, FromPrimitive, Eq, PartialEq)]
#[repr(u32)]
pub enum Mode {
    /// The hardware trigger collapses and restores the domain on its own
    /// ("fast" mode to the framework).
    HardwareAutonomous = 0x1,
    /// Collapse and restore happen on register writes from software
    /// ("normal" mode to the framework).
    SoftwareControlled = 0x2,
}

impl TryFrom<u32> for Mode {
    type Error = GdscError;

    fn try_from(raw: u32) -> Result<Self, Self::Error> {
        Self::from_u32(raw).ok_or(GdscError::InvalidState)
    }
}

/// Access to a group of memory-mapped registers.
///
/// Accesses are issued in program order; a read of any register in the
/// group is enough to ensure that earlier writes have landed.
pub trait Regmap {
    fn read(&self, offset: u32) -> Result<u32, BusError>;

    fn write(&self, offset: u32, val: u32) -> Result<(), BusError>;

    /// Replaces the bits of `mask` at `offset` with the corresponding bits
    /// of `val`. The write is skipped when nothing would change.
    fn update_bits(
        &self,
        offset: u32,
        mask: u32,
        val: u32,
    ) -> Result<(), BusError> {
        let orig = self.read(offset)?;
        let new = (orig & !mask) | (val & mask);
        if new != orig {
            self.write(offset, new)?;
        }
        Ok(())
    }
}

/// A clock that can be voted on and off.
pub trait Clock {
    fn prepare_enable(&mut self) -> Result<(), ClockError>;

    fn disable_unprepare(&mut self);
}

/// A reset line owned by some other reset controller.
pub trait ResetLine {
    fn assert(&mut self) -> Result<(), ResetError>;

    fn deassert(&mut self) -> Result<(), ResetError>;
}

/// The supply feeding a domain.
///
/// While the lock is held, the supply's enable state must not change. The
/// driver pairs every `lock` with exactly one `unlock`.
pub trait Supply {
    fn lock(&self);

    fn unlock(&self);

    fn is_enabled(&self) -> Result<bool, SupplyError>;
}

/// The supply type for domains that hang directly off an always-on rail.
/// It cannot be constructed.
#[derive(Copy, Clone, Debug)]
pub enum NoParent {}

impl Supply for NoParent {
    fn lock(&self) {
        match *self {}
    }

    fn unlock(&self) {
        match *self {}
    }

    fn is_enabled(&self) -> Result<bool, SupplyError> {
        match *self {}
    }
}

/// What a power-management framework sees of a domain.
pub trait PowerDomain {
    fn is_enabled(&self) -> bool;

    fn enable(&mut self) -> Result<(), GdscError>;

    fn disable(&mut self) -> Result<(), GdscError>;

    fn mode(&self) -> Mode;

    fn set_mode(&mut self, mode: Mode) -> Result<(), GdscError>;
}
