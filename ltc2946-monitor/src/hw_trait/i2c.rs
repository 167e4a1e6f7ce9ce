//! I2C hardware abstraction trait.

use std::fmt;

use async_trait::async_trait;

use super::{HwError, Result};

/// I2C-specific errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum I2cError {
    /// No acknowledgment from device
    #[error("No acknowledgment from device at address 0x{0:02x}")]
    NoAck(u8),

    /// Bus arbitration lost
    #[error("Bus arbitration lost")]
    ArbitrationLost,

    /// Bus error
    #[error("Bus error")]
    BusError,

    /// Other I2C error
    #[error("I2C error: {0}")]
    Other(String),
}

/// Identity of one of the host's I2C bus controllers.
///
/// A device is bound to its channel once, at construction; nothing past
/// that point branches on which controller is in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BusChannel(u8);

impl BusChannel {
    /// Number of independent bus channels supported.
    pub const COUNT: u8 = 4;

    /// Creates a channel selector if `index` names a supported bus
    pub const fn new(index: u8) -> Option<Self> {
        if index < Self::COUNT {
            Some(Self(index))
        } else {
            None
        }
    }

    pub const fn index(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for BusChannel {
    type Error = HwError;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value).ok_or_else(|| {
            HwError::InvalidParameter(format!(
                "Bus channel {} out of range 0-{}",
                value,
                Self::COUNT - 1
            ))
        })
    }
}

impl fmt::Display for BusChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "i2c-{}", self.0)
    }
}

/// I2C bus abstraction
#[async_trait]
pub trait I2c: Send + Sync {
    /// Write data to an I2C device.
    async fn write(&mut self, addr: u8, data: &[u8]) -> Result<()>;

    /// Read data from an I2C device.
    async fn read(&mut self, addr: u8, buffer: &mut [u8]) -> Result<()>;

    /// Write data then read from an I2C device (repeated start).
    async fn write_read(&mut self, addr: u8, write: &[u8], read: &mut [u8]) -> Result<()>;

    /// Set the I2C bus frequency in Hz.
    async fn set_frequency(&mut self, hz: u32) -> Result<()>;
}
