//! Polled, register level MLX90614 infrared thermometer driver.
//!
//! The I2C peripheral is driven bit by bit through [`controller::Controller`],
//! every status wait is bounded by an iteration budget, and
//! [`bus_recovery`] clocks a stuck bus free before the first transfer.

#![no_std]

#[cfg(test)]
extern crate std;

pub mod bus_recovery;
pub mod compat;
pub mod controller;
pub mod mlx90614;
pub mod registers;

#[cfg(test)]
mod sim;

pub use bus_recovery::{recover_bus, BusPins, LineMode, Recovery};
pub use controller::{Controller, Flag, Timing};
pub use mlx90614::{Config, Error, Reading, MLX90614};
