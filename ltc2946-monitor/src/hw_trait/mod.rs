//! Hardware abstraction layer traits.
//!
//! Drivers talk to hardware only through the traits defined here, so the
//! same driver code runs over a kernel I2C adapter or an in-memory bus
//! double in tests.

pub mod i2c;

#[cfg(test)]
pub mod mock_i2c;

pub use i2c::{BusChannel, I2c, I2cError};

/// Common error type for hardware operations
#[derive(Debug, thiserror::Error)]
pub enum HwError {
    /// I/O error from underlying transport
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Bus-level failure reported by an I2C transaction
    #[error("I2C error: {0}")]
    I2c(#[from] I2cError),

    /// Invalid parameter or argument
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Operation not supported by hardware
    #[error("Operation not supported: {0}")]
    NotSupported(String),

    /// Timeout waiting for hardware response
    #[error("Hardware timeout")]
    Timeout,

    /// Other hardware-specific error
    #[error("Hardware error: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, HwError>;
