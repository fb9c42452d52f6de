//! The operations the driver may perform on an on-chip I2C master.
//!
//! Every method maps onto a single register access (or a read-modify-write
//! of one register) on the peripheral. Waiting is never done here; callers
//! poll [`Controller::status`] with their own budget.

/// Status bits of the primary status register the driver waits on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Flag {
    /// START condition generated (SB).
    StartBit,
    /// Address sent and acknowledged (ADDR).
    AddressSent,
    /// Byte transfer finished (BTF).
    ByteTransferFinished,
    /// Receive data register not empty (RXNE).
    RxNotEmpty,
    /// Acknowledge failure (AF).
    AcknowledgeFailure,
}

/// Clock setup of the peripheral.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timing {
    /// Peripheral input clock in MHz, written to CTLR2.
    pub input_clock_mhz: u8,
    /// Raw clock control value, written to CKCFGR.
    pub clock_control: u16,
}

impl Default for Timing {
    /// 24 MHz input, standard mode at roughly 50 kHz.
    fn default() -> Self {
        Timing {
            input_clock_mhz: 24,
            clock_control: 240,
        }
    }
}

/// Polled I2C master.
pub trait Controller {
    /// Hold (`true`) or release (`false`) the peripheral software reset.
    fn set_reset(&mut self, reset: bool);

    fn configure(&mut self, timing: &Timing);

    /// Peripheral enable (PE).
    fn set_enabled(&mut self, enabled: bool);

    /// Request a START (or repeated START) condition.
    fn generate_start(&mut self);

    /// Request a STOP condition after the current byte.
    fn generate_stop(&mut self);

    /// Enable or disable hardware ACK of received bytes.
    fn set_ack(&mut self, enabled: bool);

    /// Sample one status bit.
    fn status(&mut self, flag: Flag) -> bool;

    fn clear_acknowledge_failure(&mut self);

    /// Clear ADDR by reading the secondary status register.
    fn clear_address(&mut self);

    fn write_data(&mut self, byte: u8);

    fn read_data(&mut self) -> u8;
}
