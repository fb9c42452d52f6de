//! MLX90614 infrared thermometer.
//!
//! - Interface: SMBus, read word with PEC
//! - Address(7bit): 0x5A
//! - Temperature: raw * 0.02 K
//!
//! The transfers are driven by hand on the I2C controller, polling each
//! status bit with a fixed iteration budget instead of a clock.

use embedded_hal_1::delay::DelayNs;
use embedded_hal_1::digital::OutputPin;

use crate::bus_recovery::{recover_bus, BusPins, LineMode, Recovery};
use crate::controller::{Controller, Flag, Timing};

pub const MLX90614_I2CADDR: u8 = 0x5A;

// RAM
pub const MLX90614_RAWIR1: u8 = 0x04;
pub const MLX90614_RAWIR2: u8 = 0x05;
pub const MLX90614_TA: u8 = 0x06;
pub const MLX90614_TOBJ1: u8 = 0x07;
pub const MLX90614_TOBJ2: u8 = 0x08;

// EEPROM, read access only
pub const MLX90614_EMISSIVITY: u8 = 0x24;
pub const MLX90614_ID1: u8 = 0x3C;

/// Returned by [`Reading::or_sentinel`] when there is no temperature.
pub const INVALID_TEMPERATURE: f32 = -999.0;

const DEFAULT_TIMEOUT: u32 = 1000;

/// Bytes in a read word transfer: LSB, MSB, PEC.
const READ_WORD_LEN: u8 = 3;

/// Point in a transfer where a bounded wait ran out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Step {
    Start,
    Address,
    Command,
    RepeatedStart,
    ReadAddress,
    /// Waiting for the n-th received byte.
    Receive(u8),
}

/// MLX90614 errors
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// A status bit was not seen within the polling budget.
    Timeout(Step),
    /// The device did not acknowledge its address.
    Nack,
    /// The device returned 0, which is not a temperature.
    InvalidReading,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Maximum number of times each status bit is sampled.
    pub timeout: u32,
    pub timing: Timing,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            timeout: DEFAULT_TIMEOUT,
            timing: Timing::default(),
        }
    }
}

/// A temperature, or the reason there is none.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Reading {
    Celsius(f32),
    Unavailable(Error),
}

impl Reading {
    /// Raw 0 is what a failed transfer leaves behind, never a valid reading.
    pub fn from_raw(raw: u16) -> Self {
        if raw == 0 {
            Reading::Unavailable(Error::InvalidReading)
        } else {
            Reading::Celsius(raw as f32 * 0.02 - 273.15)
        }
    }

    pub fn celsius(self) -> Option<f32> {
        match self {
            Reading::Celsius(t) => Some(t),
            Reading::Unavailable(_) => None,
        }
    }

    /// Celsius, or [`INVALID_TEMPERATURE`] on any failure.
    pub fn or_sentinel(self) -> f32 {
        self.celsius().unwrap_or(INVALID_TEMPERATURE)
    }
}

impl From<Result<u16, Error>> for Reading {
    fn from(raw: Result<u16, Error>) -> Self {
        match raw {
            Ok(raw) => Reading::from_raw(raw),
            Err(e) => Reading::Unavailable(e),
        }
    }
}

/// Which IR sensor channel to sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IrChannel {
    One,
    Two,
}

/// Calls `f` until it stops returning `WouldBlock`, at most `budget` times.
fn bounded<T>(budget: u32, step: Step, mut f: impl FnMut() -> nb::Result<T, Error>) -> Result<T, Error> {
    for _ in 0..budget {
        match f() {
            Ok(v) => return Ok(v),
            Err(nb::Error::Other(e)) => return Err(e),
            Err(nb::Error::WouldBlock) => {}
        }
    }

    #[cfg(feature = "defmt")]
    defmt::warn!("mlx90614: timeout at {}", step);

    Err(Error::Timeout(step))
}

fn flag_set<C: Controller>(controller: &mut C, flag: Flag) -> nb::Result<(), Error> {
    if controller.status(flag) {
        Ok(())
    } else {
        Err(nb::Error::WouldBlock)
    }
}

/// MLX90614 on a polled I2C controller.
pub struct MLX90614<C, P> {
    controller: C,
    pins: P,
    config: Config,
}

impl<C, P> MLX90614<C, P>
where
    C: Controller,
    P: BusPins,
{
    pub fn new(controller: C, pins: P) -> Self {
        Self::with_config(controller, pins, Config::default())
    }

    pub fn with_config(controller: C, pins: P, config: Config) -> Self {
        MLX90614 {
            controller,
            pins,
            config,
        }
    }

    pub fn release(self) -> (C, P) {
        (self.controller, self.pins)
    }

    /// Bring up the lines and the controller, then unstick the bus if needed.
    ///
    /// Call once before any transfer. Only pin errors are reported; a bus that
    /// stays stuck shows up as timeouts later on.
    pub fn init<D: DelayNs>(&mut self, delay: &mut D) -> Result<Recovery, P::Error> {
        self.pins.set_mode(LineMode::Alternate);
        self.pins.scl().set_high()?;
        self.pins.sda().set_high()?;
        delay.delay_ms(10);

        self.controller.set_reset(true);
        delay.delay_ms(10);
        self.controller.set_reset(false);

        self.controller.configure(&self.config.timing);
        self.controller.set_enabled(true);
        delay.delay_ms(100);

        recover_bus(&mut self.controller, &mut self.pins, delay)
    }

    /// Address the device for write and check that it answers.
    pub fn probe(&mut self) -> Result<(), Error> {
        match self.address_device() {
            Ok(()) => {
                self.controller.clear_address();
                self.controller.generate_stop();
                Ok(())
            }
            Err(e) => {
                self.abort();
                Err(e)
            }
        }
    }

    pub fn is_ready(&mut self) -> bool {
        self.probe().is_ok()
    }

    /// Ambient (die) temperature.
    pub fn ambient_temperature(&mut self) -> Reading {
        self.read_raw(MLX90614_TA).into()
    }

    /// Object temperature of the first thermopile.
    pub fn object_temperature(&mut self) -> Reading {
        self.read_raw(MLX90614_TOBJ1).into()
    }

    /// Object temperature of the second thermopile, dual zone parts only.
    pub fn object2_temperature(&mut self) -> Reading {
        self.read_raw(MLX90614_TOBJ2).into()
    }

    pub fn raw_ir(&mut self, channel: IrChannel) -> Result<u16, Error> {
        match channel {
            IrChannel::One => self.read_raw(MLX90614_RAWIR1),
            IrChannel::Two => self.read_raw(MLX90614_RAWIR2),
        }
    }

    /// Emissivity setting, 0.1 to 1.0.
    pub fn emissivity(&mut self) -> Result<f32, Error> {
        let raw = self.read_raw(MLX90614_EMISSIVITY)?;
        Ok(raw as f32 / 65535.0)
    }

    /// Factory ID, ID1 first.
    pub fn device_id(&mut self) -> Result<[u16; 4], Error> {
        let mut id = [0u16; 4];
        for (word, command) in id.iter_mut().zip(MLX90614_ID1..) {
            *word = self.read_raw(command)?;
        }
        Ok(id)
    }

    /// Read one word: command write, repeated START, then LSB, MSB and PEC.
    ///
    /// The PEC byte is clocked in and dropped unchecked.
    pub fn read_raw(&mut self, command: u8) -> Result<u16, Error> {
        let [lsb, msb] = match self.request(command) {
            Ok(word) => word,
            Err(e) => {
                self.abort();
                return Err(e);
            }
        };

        // STOP is already on its way, nothing to abort
        let _pec = self.receive(READ_WORD_LEN - 1)?;

        Ok(u16::from_le_bytes([lsb, msb]))
    }

    /// Everything up to and including the MSB, with the PEC set up to be NACKed.
    fn request(&mut self, command: u8) -> Result<[u8; 2], Error> {
        self.address_device()?;
        self.controller.clear_address();

        self.controller.write_data(command);
        bounded(self.config.timeout, Step::Command, || {
            flag_set(&mut self.controller, Flag::ByteTransferFinished)
        })?;

        self.controller.generate_start();
        bounded(self.config.timeout, Step::RepeatedStart, || {
            flag_set(&mut self.controller, Flag::StartBit)
        })?;

        self.controller.write_data((MLX90614_I2CADDR << 1) | 1);
        self.wait_address(Step::ReadAddress)?;

        self.controller.set_ack(true);
        self.controller.clear_address();

        let lsb = self.receive(0)?;
        let msb = self.receive(1)?;

        self.controller.set_ack(false);
        self.controller.generate_stop();

        Ok([lsb, msb])
    }

    /// START and address for write, up to the address acknowledge.
    fn address_device(&mut self) -> Result<(), Error> {
        self.controller.generate_start();
        bounded(self.config.timeout, Step::Start, || {
            flag_set(&mut self.controller, Flag::StartBit)
        })?;

        self.controller.write_data(MLX90614_I2CADDR << 1);
        self.wait_address(Step::Address)
    }

    fn wait_address(&mut self, step: Step) -> Result<(), Error> {
        let controller = &mut self.controller;
        bounded(self.config.timeout, step, || {
            if controller.status(Flag::AddressSent) {
                return Ok(());
            }
            if controller.status(Flag::AcknowledgeFailure) {
                #[cfg(feature = "defmt")]
                defmt::debug!("mlx90614: address nack at {}", step);

                return Err(nb::Error::Other(Error::Nack));
            }
            Err(nb::Error::WouldBlock)
        })
    }

    fn receive(&mut self, index: u8) -> Result<u8, Error> {
        bounded(self.config.timeout, Step::Receive(index), || {
            flag_set(&mut self.controller, Flag::RxNotEmpty)
        })?;
        Ok(self.controller.read_data())
    }

    /// Leave the controller idle: AF latches until cleared, even when the
    /// refused byte was data rather than an address.
    fn abort(&mut self) {
        self.controller.clear_acknowledge_failure();
        self.controller.set_ack(false);
        self.controller.generate_stop();
    }
}
