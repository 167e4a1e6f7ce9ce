//! Width-specific register access for the LTC2946.
//!
//! The chip exposes a byte-addressed register file. Multi-byte values are
//! transferred most-significant byte first and the register pointer
//! auto-increments, so an N-byte value is a single transaction starting at
//! its MSB register. Values are assembled with explicit shifts, never by
//! reinterpreting host memory.

use crate::hw_trait::{HwError, I2c, Result};
use crate::tracing::prelude::*;

use super::protocol;

/// Register widths supported by the register file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    Bits8,
    /// 12-bit ADC code left-justified in a 16-bit field
    Bits12,
    Bits16,
    Bits24,
    Bits32,
}

impl Width {
    /// Bytes on the wire
    pub const fn bytes(self) -> usize {
        match self {
            Width::Bits8 => 1,
            Width::Bits12 | Width::Bits16 => 2,
            Width::Bits24 => 3,
            Width::Bits32 => 4,
        }
    }

    /// Largest value a register of this width can hold
    pub const fn max_value(self) -> u32 {
        match self {
            Width::Bits8 => 0xFF,
            Width::Bits12 => 0x0FFF,
            Width::Bits16 => 0xFFFF,
            Width::Bits24 => 0x00FF_FFFF,
            Width::Bits32 => u32::MAX,
        }
    }
}

/// Register transport bound to one device address.
pub struct RegisterIo<I> {
    i2c: I,
    address: u8,
}

impl<I: I2c> RegisterIo<I> {
    /// ADC codes occupy the upper 12 bits of their 16-bit register pair
    const ADC_CODE_SHIFT: u32 = 4;

    pub fn new(i2c: I, address: u8) -> Self {
        Self { i2c, address }
    }

    /// Underlying bus, for operations that are not register transfers
    pub(crate) fn bus_mut(&mut self) -> &mut I {
        &mut self.i2c
    }

    /// Release the bus
    pub fn into_inner(self) -> I {
        self.i2c
    }

    pub async fn write_u8(&mut self, reg: u8, value: u8) -> Result<()> {
        self.write_bytes(reg, &[value]).await
    }

    pub async fn write_u16(&mut self, reg: u8, value: u16) -> Result<()> {
        self.write_bytes(reg, &value.to_be_bytes()).await
    }

    /// Writes the low 24 bits of `value`; the top byte is not transmitted
    pub async fn write_u24(&mut self, reg: u8, value: u32) -> Result<()> {
        let bytes = value.to_be_bytes();
        self.write_bytes(reg, &bytes[1..]).await
    }

    pub async fn write_u32(&mut self, reg: u8, value: u32) -> Result<()> {
        self.write_bytes(reg, &value.to_be_bytes()).await
    }

    /// Write `value` using the transfer size of `width`
    pub async fn write(&mut self, reg: u8, width: Width, value: u32) -> Result<()> {
        if value > width.max_value() {
            return Err(HwError::InvalidParameter(format!(
                "0x{:x} does not fit in a {:?} register",
                value, width
            )));
        }
        match width {
            Width::Bits8 => self.write_u8(reg, value as u8).await,
            Width::Bits16 => self.write_u16(reg, value as u16).await,
            Width::Bits24 => self.write_u24(reg, value).await,
            Width::Bits32 => self.write_u32(reg, value).await,
            Width::Bits12 => Err(HwError::NotSupported(
                "12-bit registers are read-only ADC results".into(),
            )),
        }
    }

    pub async fn read_u8(&mut self, reg: u8) -> Result<u8> {
        let [value] = self.read_bytes::<1>(reg).await?;
        Ok(value)
    }

    /// Read a 12-bit ADC code, always in 0..=4095
    pub async fn read_u12(&mut self, reg: u8) -> Result<u16> {
        let raw = self.read_u16(reg).await?;
        Ok(raw >> Self::ADC_CODE_SHIFT)
    }

    pub async fn read_u16(&mut self, reg: u8) -> Result<u16> {
        let bytes = self.read_bytes::<2>(reg).await?;
        Ok(u16::from_be_bytes(bytes))
    }

    /// Read a 24-bit register, always in 0..=0xFF_FFFF
    pub async fn read_u24(&mut self, reg: u8) -> Result<u32> {
        let [msb2, msb1, lsb] = self.read_bytes::<3>(reg).await?;
        let assembled = u32::from_be_bytes([0, msb2, msb1, lsb]);
        Ok(assembled & Width::Bits24.max_value())
    }

    pub async fn read_u32(&mut self, reg: u8) -> Result<u32> {
        let bytes = self.read_bytes::<4>(reg).await?;
        Ok(u32::from_be_bytes(bytes))
    }

    /// Read a register of the given width, widened to `u32`
    pub async fn read(&mut self, reg: u8, width: Width) -> Result<u32> {
        match width {
            Width::Bits8 => self.read_u8(reg).await.map(u32::from),
            Width::Bits12 => self.read_u12(reg).await.map(u32::from),
            Width::Bits16 => self.read_u16(reg).await.map(u32::from),
            Width::Bits24 => self.read_u24(reg).await,
            Width::Bits32 => self.read_u32(reg).await,
        }
    }

    // Register pointer byte followed by the value, MSB first.
    async fn write_bytes(&mut self, reg: u8, value: &[u8]) -> Result<()> {
        let mut frame = Vec::with_capacity(1 + value.len());
        frame.push(reg);
        frame.extend_from_slice(value);

        trace!(
            addr = format!("{:#04x}", self.address),
            "{}",
            protocol::format_transaction(reg, Some(value), false)
        );
        self.i2c.write(self.address, &frame).await
    }

    // Set the register pointer, then read N bytes under repeated start.
    async fn read_bytes<const N: usize>(&mut self, reg: u8) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.i2c.write_read(self.address, &[reg], &mut buf).await?;

        trace!(
            addr = format!("{:#04x}", self.address),
            "{}",
            protocol::format_transaction(reg, Some(&buf), true)
        );
        Ok(buf)
    }
}
