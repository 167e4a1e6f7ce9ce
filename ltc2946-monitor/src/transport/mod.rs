//! Concrete bus implementations for the hw_trait interfaces.

pub mod linux_i2c;

pub use linux_i2c::LinuxI2c;
