//! I2C master register block, CH32V003 / STM32F1 style.
//!
//! All registers are 16 bit wide on a 32 bit stride.

use crate::controller::{Controller, Flag, Timing};

/// I2C1 on CH32V00x.
pub const I2C1_BASE: usize = 0x4000_5400;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Register {
    Ctlr1,
    Ctlr2,
    Datar,
    Star1,
    Star2,
    Ckcfgr,
}

impl Register {
    pub fn offset(self) -> usize {
        match self {
            Register::Ctlr1 => 0x00,
            Register::Ctlr2 => 0x04,
            Register::Datar => 0x10,
            Register::Star1 => 0x14,
            Register::Star2 => 0x18,
            Register::Ckcfgr => 0x1C,
        }
    }
}

// CTLR1
const CTLR1_PE: u16 = 1 << 0;
const CTLR1_START: u16 = 1 << 8;
const CTLR1_STOP: u16 = 1 << 9;
const CTLR1_ACK: u16 = 1 << 10;
const CTLR1_SWRST: u16 = 1 << 15;

// STAR1
const STAR1_SB: u16 = 1 << 0;
const STAR1_ADDR: u16 = 1 << 1;
const STAR1_BTF: u16 = 1 << 2;
const STAR1_RXNE: u16 = 1 << 6;
const STAR1_AF: u16 = 1 << 10;

const CTLR2_FREQ_MSK: u16 = 0x3F;

/// Raw access to the register block.
pub trait RegisterAccess {
    fn read(&mut self, reg: Register) -> u16;
    fn write(&mut self, reg: Register, value: u16);

    fn modify(&mut self, reg: Register, f: impl FnOnce(u16) -> u16) {
        let value = self.read(reg);
        self.write(reg, f(value));
    }
}

/// Volatile access to a memory mapped register block.
pub struct Mmio {
    base: usize,
}

impl Mmio {
    /// # Safety
    ///
    /// `base` must point at an I2C register block that nothing else accesses
    /// for the lifetime of the returned value.
    pub unsafe fn new(base: usize) -> Self {
        Mmio { base }
    }

    fn ptr(&self, reg: Register) -> *mut u16 {
        (self.base + reg.offset()) as *mut u16
    }
}

impl RegisterAccess for Mmio {
    fn read(&mut self, reg: Register) -> u16 {
        // SAFETY: exclusive access to a valid register block, promised by `new`
        unsafe { core::ptr::read_volatile(self.ptr(reg)) }
    }

    fn write(&mut self, reg: Register, value: u16) {
        // SAFETY: as above
        unsafe { core::ptr::write_volatile(self.ptr(reg), value) }
    }
}

/// [`Controller`] on top of the raw registers.
pub struct I2cRegisters<A> {
    regs: A,
}

impl<A: RegisterAccess> I2cRegisters<A> {
    pub fn new(regs: A) -> Self {
        I2cRegisters { regs }
    }

    pub fn release(self) -> A {
        self.regs
    }

    fn set_ctlr1(&mut self, bits: u16, on: bool) {
        self.regs
            .modify(Register::Ctlr1, |v| if on { v | bits } else { v & !bits });
    }
}

impl<A: RegisterAccess> Controller for I2cRegisters<A> {
    fn set_reset(&mut self, reset: bool) {
        self.set_ctlr1(CTLR1_SWRST, reset);
    }

    fn configure(&mut self, timing: &Timing) {
        self.regs
            .write(Register::Ctlr2, timing.input_clock_mhz as u16 & CTLR2_FREQ_MSK);
        self.regs.write(Register::Ckcfgr, timing.clock_control);
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.set_ctlr1(CTLR1_PE, enabled);
    }

    fn generate_start(&mut self) {
        self.set_ctlr1(CTLR1_START, true);
    }

    fn generate_stop(&mut self) {
        self.set_ctlr1(CTLR1_STOP, true);
    }

    fn set_ack(&mut self, enabled: bool) {
        self.set_ctlr1(CTLR1_ACK, enabled);
    }

    fn status(&mut self, flag: Flag) -> bool {
        let mask = match flag {
            Flag::StartBit => STAR1_SB,
            Flag::AddressSent => STAR1_ADDR,
            Flag::ByteTransferFinished => STAR1_BTF,
            Flag::RxNotEmpty => STAR1_RXNE,
            Flag::AcknowledgeFailure => STAR1_AF,
        };
        self.regs.read(Register::Star1) & mask != 0
    }

    fn clear_acknowledge_failure(&mut self) {
        self.regs.modify(Register::Star1, |v| v & !STAR1_AF);
    }

    fn clear_address(&mut self) {
        // ADDR clears on a STAR1 read followed by a STAR2 read; the STAR1
        // read already happened while polling
        let _ = self.regs.read(Register::Star2);
    }

    fn write_data(&mut self, byte: u8) {
        self.regs.write(Register::Datar, byte as u16);
    }

    fn read_data(&mut self) -> u8 {
        self.regs.read(Register::Datar) as u8
    }
}
