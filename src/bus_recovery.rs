//! I2C bus recovery.
//!
//! A slave that lost power or saw a master reset in the middle of a read may
//! keep SDA low while it waits for the rest of its byte to be clocked out.
//! Recovery hands both lines to GPIO, clocks SCL until the slave lets go,
//! then forces a STOP so every device on the bus is back to idle.
//!
//! Ref: https://www.analog.com/media/en/technical-documentation/application-notes/54305147357414AN686_0.pdf

use embedded_hal_1::delay::DelayNs;
use embedded_hal_1::digital::{ErrorType, InputPin, OutputPin};

use crate::controller::Controller;

/// Clock pulses needed to walk a slave through the rest of a byte plus ACK.
pub const MAX_CLOCK_PULSES: u8 = 9;

const PULSE_DELAY_MS: u32 = 1;

/// Who drives the bus lines.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LineMode {
    /// Plain open-drain GPIO outputs.
    Gpio,
    /// Open-drain alternate function, driven by the I2C controller.
    Alternate,
}

/// SCL and SDA of one bus, with their pin-mux switch.
///
/// Both lines must be open-drain so that they can be read back while driven.
pub trait BusPins {
    type Error;
    type Scl: ErrorType<Error = Self::Error> + InputPin + OutputPin;
    type Sda: ErrorType<Error = Self::Error> + InputPin + OutputPin;

    fn scl(&mut self) -> &mut Self::Scl;
    fn sda(&mut self) -> &mut Self::Sda;
    fn set_mode(&mut self, mode: LineMode);
}

/// Idle levels of both lines, `true` is high.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LineState {
    pub scl: bool,
    pub sda: bool,
}

impl LineState {
    pub fn sample<P: BusPins>(pins: &mut P) -> Result<Self, P::Error> {
        let scl = pins.scl().is_high()?;
        let sda = pins.sda().is_high()?;
        Ok(LineState { scl, sda })
    }

    /// A free bus idles with both lines pulled up.
    pub fn is_idle(&self) -> bool {
        self.scl && self.sda
    }
}

/// Outcome of [`recover_bus`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Recovery {
    /// Both lines were high, nothing was touched.
    Idle,
    /// The bus was stuck and has been clocked out.
    Recovered { pulses: u8 },
}

/// Checks the bus and clocks it free if either line is held low.
///
/// Must not be called while a transaction is in flight. There is no error for
/// a bus that stays stuck: the following transactions will time out. Pin mode
/// and controller enable are restored even if a pin operation fails.
pub fn recover_bus<C, P, D>(controller: &mut C, pins: &mut P, delay: &mut D) -> Result<Recovery, P::Error>
where
    C: Controller,
    P: BusPins,
    D: DelayNs,
{
    let state = LineState::sample(pins)?;
    if state.is_idle() {
        return Ok(Recovery::Idle);
    }

    #[cfg(feature = "defmt")]
    defmt::info!("i2c bus stuck, scl: {}, sda: {}", state.scl, state.sda);

    controller.set_enabled(false);
    pins.set_mode(LineMode::Gpio);

    let clocked = clock_out(pins, delay);

    pins.set_mode(LineMode::Alternate);
    controller.set_enabled(true);

    let pulses = clocked?;

    #[cfg(feature = "defmt")]
    defmt::info!("i2c bus released after {} pulses", pulses);

    Ok(Recovery::Recovered { pulses })
}

fn clock_out<P: BusPins, D: DelayNs>(pins: &mut P, delay: &mut D) -> Result<u8, P::Error> {
    let mut pulses = 0;
    while pulses < MAX_CLOCK_PULSES {
        pins.scl().set_low()?;
        delay.delay_ms(PULSE_DELAY_MS);
        pins.scl().set_high()?;
        delay.delay_ms(PULSE_DELAY_MS);
        pulses += 1;

        // a released SDA means the slave has finished its byte, further
        // pulses would only start clocking in a new one
        if pins.sda().is_high()? {
            break;
        }
    }

    // STOP: SDA rises while SCL is high
    pins.sda().set_low()?;
    delay.delay_ms(PULSE_DELAY_MS);
    pins.scl().set_high()?;
    delay.delay_ms(PULSE_DELAY_MS);
    pins.sda().set_high()?;
    delay.delay_ms(PULSE_DELAY_MS);

    Ok(pulses)
}
