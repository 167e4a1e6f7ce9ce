//! I2C implementation on top of the Linux i2c-dev interface.
//!
//! Each [`BusChannel`] maps to the character device `/dev/i2c-<index>`.
//! Transfers go through the kernel's `I2C_RDWR` ioctl, which issues a
//! repeated start between the write and read halves of a `write_read`.

use std::path::PathBuf;

use async_trait::async_trait;
use embedded_hal::i2c::ErrorKind;
use linux_embedded_hal::I2cdev;

use crate::hw_trait::{BusChannel, HwError, I2c, I2cError, Result};
use crate::tracing::prelude::*;

/// I2C bus backed by a kernel i2c-dev adapter.
pub struct LinuxI2c {
    dev: I2cdev,
    path: PathBuf,
}

impl LinuxI2c {
    /// Open the adapter for `channel`
    pub fn open(channel: BusChannel) -> Result<Self> {
        Self::open_path(Self::device_path(channel))
    }

    /// Open an adapter by device node path
    pub fn open_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let dev = I2cdev::new(&path).map_err(|e| {
            warn!(path = %path.display(), error = %e, "Failed to open I2C adapter");
            HwError::Io(std::io::Error::from(e))
        })?;
        debug!(path = %path.display(), "Opened I2C adapter");
        Ok(Self { dev, path })
    }

    pub fn device_path(channel: BusChannel) -> PathBuf {
        PathBuf::from(format!("/dev/i2c-{}", channel.index()))
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

fn map_error_kind(addr: u8, kind: ErrorKind) -> I2cError {
    match kind {
        ErrorKind::NoAcknowledge(_) => I2cError::NoAck(addr),
        ErrorKind::ArbitrationLoss => I2cError::ArbitrationLost,
        ErrorKind::Bus => I2cError::BusError,
        other => I2cError::Other(format!("{:?}", other)),
    }
}

fn bus_error<E: embedded_hal::i2c::Error>(addr: u8, error: E) -> HwError {
    trace!(addr = format!("{:#04x}", addr), error = ?error, "i2c-dev transfer failed");
    map_error_kind(addr, error.kind()).into()
}

// i2c-dev transfers are a handful of bytes and complete inside the ioctl,
// so they run directly on the calling task.
#[async_trait]
impl I2c for LinuxI2c {
    async fn write(&mut self, addr: u8, data: &[u8]) -> Result<()> {
        embedded_hal::i2c::I2c::write(&mut self.dev, addr, data).map_err(|e| bus_error(addr, e))
    }

    async fn read(&mut self, addr: u8, buffer: &mut [u8]) -> Result<()> {
        embedded_hal::i2c::I2c::read(&mut self.dev, addr, buffer).map_err(|e| bus_error(addr, e))
    }

    async fn write_read(&mut self, addr: u8, write: &[u8], read: &mut [u8]) -> Result<()> {
        embedded_hal::i2c::I2c::write_read(&mut self.dev, addr, write, read)
            .map_err(|e| bus_error(addr, e))
    }

    async fn set_frequency(&mut self, hz: u32) -> Result<()> {
        // The adapter clock comes from the device tree, not from userspace
        debug!(
            path = %self.path.display(),
            requested_hz = hz,
            "Bus frequency is fixed by the kernel driver"
        );
        Ok(())
    }
}
