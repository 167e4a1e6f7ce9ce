//! Driver and tooling for the LTC2946 power, charge and energy monitor.
//!
//! The driver is generic over the [`hw_trait::I2c`] bus abstraction, so it
//! runs against a Linux `/dev/i2c-N` adapter ([`transport::LinuxI2c`]) or
//! any other transport that can move bytes to and from a 7-bit address.

pub mod config;
pub mod hw_trait;
pub mod peripheral;
pub mod tracing;
pub mod transport;
