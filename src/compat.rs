//! Glue for HALs still on embedded-hal 0.2.

use embedded_hal_02::blocking::delay::DelayUs;
use embedded_hal_1::delay::DelayNs;

/// Wraps an embedded-hal 0.2 microsecond delay so it can be passed to
/// [`MLX90614::init`](crate::mlx90614::MLX90614::init).
pub struct Delay02<D>(pub D);

impl<D> Delay02<D> {
    pub fn release(self) -> D {
        self.0
    }
}

impl<D: DelayUs<u32>> DelayNs for Delay02<D> {
    fn delay_ns(&mut self, ns: u32) {
        // round up, never wait less than asked
        self.0.delay_us(ns / 1_000 + (ns % 1_000 != 0) as u32);
    }

    fn delay_us(&mut self, us: u32) {
        self.0.delay_us(us);
    }
}
