//! A scripted I2C controller for exercising the transaction sequence
//! without hardware.

use std::collections::VecDeque;
use std::vec::Vec;

use core::convert::Infallible;

use embedded_hal_1::digital::{ErrorType, InputPin, OutputPin};
use embedded_hal_mock::eh1::digital::{Mock as PinMock, Transaction as PinTransaction};

use crate::bus_recovery::{BusPins, LineMode};
use crate::controller::{Controller, Flag, Timing};

/// Side effects the driver requested, in order. Status reads are counted,
/// not logged.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
    Reset(bool),
    Configure(Timing),
    Enable(bool),
    Start,
    Stop,
    Ack(bool),
    ClearAf,
    ClearAddr,
    Write(u8),
    Read,
}

const FLAGS: usize = 5;

fn index(flag: Flag) -> usize {
    match flag {
        Flag::StartBit => 0,
        Flag::AddressSent => 1,
        Flag::ByteTransferFinished => 2,
        Flag::RxNotEmpty => 3,
        Flag::AcknowledgeFailure => 4,
    }
}

#[derive(Debug, Default)]
pub struct SimController {
    pub log: Vec<Op>,
    /// Bytes handed out by `read_data`. RXNE stays clear once exhausted.
    pub rx: VecDeque<u8>,
    /// Flags that never become set.
    pub stuck: Vec<Flag>,
    /// The addressed device answers with NACK.
    pub nack: bool,
    /// Data byte the device refuses: AF latches and BTF stays clear until
    /// AF is cleared.
    pub refuse: Option<u8>,
    /// Polls each flag reads clear after every action before it sets.
    pub latency: u32,
    polls: [u32; FLAGS],
    pending: u32,
    af: bool,
}

impl SimController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rx(bytes: &[u8]) -> Self {
        SimController {
            rx: bytes.iter().copied().collect(),
            ..Self::default()
        }
    }

    pub fn stuck(mut self, flag: Flag) -> Self {
        self.stuck.push(flag);
        self
    }

    pub fn nack(mut self) -> Self {
        self.nack = true;
        self
    }

    pub fn latency(mut self, polls: u32) -> Self {
        self.latency = polls;
        self
    }

    /// Number of times `flag` has been sampled.
    pub fn polls(&self, flag: Flag) -> u32 {
        self.polls[index(flag)]
    }

    fn act(&mut self, op: Op) {
        self.pending = self.latency;
        self.log.push(op);
    }
}

impl Controller for SimController {
    fn set_reset(&mut self, reset: bool) {
        self.act(Op::Reset(reset));
    }

    fn configure(&mut self, timing: &Timing) {
        self.act(Op::Configure(*timing));
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.act(Op::Enable(enabled));
    }

    fn generate_start(&mut self) {
        self.act(Op::Start);
    }

    fn generate_stop(&mut self) {
        self.act(Op::Stop);
    }

    fn set_ack(&mut self, enabled: bool) {
        self.act(Op::Ack(enabled));
    }

    fn status(&mut self, flag: Flag) -> bool {
        self.polls[index(flag)] += 1;

        if flag == Flag::AcknowledgeFailure {
            return self.nack || self.af;
        }
        if flag == Flag::ByteTransferFinished && self.af {
            return false;
        }
        if self.stuck.contains(&flag) {
            return false;
        }
        if flag == Flag::AddressSent && (self.nack || self.af) {
            return false;
        }
        if flag == Flag::RxNotEmpty && self.rx.is_empty() {
            return false;
        }
        if self.pending > 0 {
            self.pending -= 1;
            return false;
        }
        true
    }

    fn clear_acknowledge_failure(&mut self) {
        self.af = false;
        self.act(Op::ClearAf);
    }

    fn clear_address(&mut self) {
        self.act(Op::ClearAddr);
    }

    fn write_data(&mut self, byte: u8) {
        if self.refuse == Some(byte) {
            self.af = true;
        }
        self.act(Op::Write(byte));
    }

    fn read_data(&mut self) -> u8 {
        self.act(Op::Read);
        self.rx.pop_front().unwrap_or(0)
    }
}

/// An open-drain line that idles high and ignores writes.
#[derive(Debug, Default)]
pub struct PulledUp;

impl ErrorType for PulledUp {
    type Error = Infallible;
}

impl InputPin for PulledUp {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(true)
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(false)
    }
}

impl OutputPin for PulledUp {
    fn set_low(&mut self) -> Result<(), Infallible> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        Ok(())
    }
}

/// A healthy bus: both lines read high.
#[derive(Debug, Default)]
pub struct IdlePins {
    scl: PulledUp,
    sda: PulledUp,
    pub modes: Vec<LineMode>,
}

impl BusPins for IdlePins {
    type Error = Infallible;
    type Scl = PulledUp;
    type Sda = PulledUp;

    fn scl(&mut self) -> &mut PulledUp {
        &mut self.scl
    }

    fn sda(&mut self) -> &mut PulledUp {
        &mut self.sda
    }

    fn set_mode(&mut self, mode: LineMode) {
        self.modes.push(mode);
    }
}

/// Scripted lines from `embedded-hal-mock`, recording mode switches.
pub struct MockPins {
    scl: PinMock,
    sda: PinMock,
    pub modes: Vec<LineMode>,
}

impl MockPins {
    pub fn new(scl: &[PinTransaction], sda: &[PinTransaction]) -> Self {
        MockPins {
            scl: PinMock::new(scl),
            sda: PinMock::new(sda),
            modes: Vec::new(),
        }
    }

    pub fn done(&mut self) {
        self.scl.done();
        self.sda.done();
    }
}

impl BusPins for MockPins {
    type Error = <PinMock as ErrorType>::Error;
    type Scl = PinMock;
    type Sda = PinMock;

    fn scl(&mut self) -> &mut PinMock {
        &mut self.scl
    }

    fn sda(&mut self) -> &mut PinMock {
        &mut self.sda
    }

    fn set_mode(&mut self, mode: LineMode) {
        self.modes.push(mode);
    }
}
