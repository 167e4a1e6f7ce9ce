//! LTC2946 wide range power, charge and energy monitor driver.
//!
//! The LTC2946 digitizes the voltage across an external sense resistor
//! (ΔSENSE), a supply voltage (VIN) and an auxiliary input (ADIN) with a
//! 12-bit ADC, and multiplies current by voltage internally to report a
//! 24-bit power code. Charge, energy and elapsed time are integrated in
//! 32-bit accumulators.
//!
//! Two acquisition modes are supported. In continuous mode the ADC cycles
//! on its own and every read returns the latest code. In on-demand
//! (snapshot) mode the driver starts a single conversion, polls the busy
//! bit in STATUS2 and then reads the result.
//!
//! Bus failures never surface from the read methods. Each failed
//! transaction sets a pending-error flag owned by the driver instance;
//! callers inspect it with [`Ltc2946::check_and_clear_error`].
//!
//! Datasheet: <https://www.analog.com/en/products/ltc2946.html>

pub mod conversion;
pub mod registers;

use std::fmt;
use std::num::NonZeroU32;
use std::time::Duration;

use crate::{
    hw_trait::{BusChannel, HwError, I2c, Result},
    tracing::prelude::*,
};

pub use conversion::{Datasheet, Lsb};
pub use registers::{RegisterIo, Width};

/// Default I2C address for LTC2946 (ADR1 and ADR0 low)
pub const DEFAULT_ADDRESS: u8 = protocol::DEFAULT_ADDRESS;

/// Register map and field encodings
pub mod protocol {
    /// Default I2C address for LTC2946
    pub const DEFAULT_ADDRESS: u8 = 0x6F;

    /// LTC2946 register addresses. Multi-byte values start at the MSB.
    pub mod regs {
        /// Control register A: channel configuration and voltage select
        pub const CTRLA: u8 = 0x00;
        /// Control register B: alert and accumulator control
        pub const CTRLB: u8 = 0x01;
        pub const ALERT1: u8 = 0x02;
        pub const STATUS1: u8 = 0x03;
        pub const FAULT1: u8 = 0x04;
        /// Power, 24 bits
        pub const POWER: u8 = 0x05;
        pub const MAX_POWER: u8 = 0x08;
        pub const MIN_POWER: u8 = 0x0B;
        pub const MAX_POWER_THRESHOLD: u8 = 0x0E;
        pub const MIN_POWER_THRESHOLD: u8 = 0x11;
        /// Sense resistor voltage, 12 bits left-justified
        pub const DELTA_SENSE: u8 = 0x14;
        pub const MAX_DELTA_SENSE: u8 = 0x16;
        pub const MIN_DELTA_SENSE: u8 = 0x18;
        pub const MAX_DELTA_SENSE_THRESHOLD: u8 = 0x1A;
        pub const MIN_DELTA_SENSE_THRESHOLD: u8 = 0x1C;
        /// Supply voltage, 12 bits left-justified
        pub const VIN: u8 = 0x1E;
        pub const MAX_VIN: u8 = 0x20;
        pub const MIN_VIN: u8 = 0x22;
        pub const MAX_VIN_THRESHOLD: u8 = 0x24;
        pub const MIN_VIN_THRESHOLD: u8 = 0x26;
        /// Auxiliary ADC input, 12 bits left-justified
        pub const ADIN: u8 = 0x28;
        pub const MAX_ADIN: u8 = 0x2A;
        pub const MIN_ADIN: u8 = 0x2C;
        pub const MAX_ADIN_THRESHOLD: u8 = 0x2E;
        pub const MIN_ADIN_THRESHOLD: u8 = 0x30;
        pub const ALERT2: u8 = 0x32;
        pub const GPIO_CFG: u8 = 0x33;
        /// Elapsed time counter, 32 bits
        pub const TIME_COUNTER: u8 = 0x34;
        /// Charge accumulator, 32 bits
        pub const CHARGE: u8 = 0x38;
        /// Energy accumulator, 32 bits
        pub const ENERGY: u8 = 0x3C;
        /// Status register 2: ADC busy and GPIO states
        pub const STATUS2: u8 = 0x40;
        pub const FAULT2: u8 = 0x41;
        pub const GPIO3_CTRL: u8 = 0x42;
        pub const CLK_DIV: u8 = 0x43;
    }

    /// CTRLA field encodings
    pub mod ctrla {
        /// Bits 2:0 select which inputs the ADC cycles through
        pub const CHANNEL_MASK: u8 = 0x07;
        /// Single conversion of the selected voltage, then idle
        pub const SNAPSHOT: u8 = 0x07;

        /// Bits 4:3 select the voltage measured in snapshot mode
        pub const VOLTAGE_MASK: u8 = 0x18;
        pub const DELTA_SENSE: u8 = 0x00;
        pub const VDD: u8 = 0x08;
        pub const ADIN: u8 = 0x10;
        pub const SENSE_PLUS: u8 = 0x18;

        /// Power-on value: alternate VIN (SENSE+) and ΔSENSE continuously
        pub const CONTINUOUS_DEFAULT: u8 = SENSE_PLUS;
    }

    /// STATUS2 bits
    pub mod status2 {
        /// Set while a snapshot conversion is in progress
        pub const ADC_BUSY: u8 = 0x08;
    }

    /// Get register name from address
    pub fn register_name(addr: u8) -> String {
        let name = match addr {
            regs::CTRLA => "CTRLA",
            regs::CTRLB => "CTRLB",
            regs::ALERT1 => "ALERT1",
            regs::STATUS1 => "STATUS1",
            regs::FAULT1 => "FAULT1",
            regs::POWER => "POWER",
            regs::MAX_POWER => "MAX_POWER",
            regs::MIN_POWER => "MIN_POWER",
            regs::MAX_POWER_THRESHOLD => "MAX_POWER_THRESHOLD",
            regs::MIN_POWER_THRESHOLD => "MIN_POWER_THRESHOLD",
            regs::DELTA_SENSE => "DELTA_SENSE",
            regs::MAX_DELTA_SENSE => "MAX_DELTA_SENSE",
            regs::MIN_DELTA_SENSE => "MIN_DELTA_SENSE",
            regs::MAX_DELTA_SENSE_THRESHOLD => "MAX_DELTA_SENSE_THRESHOLD",
            regs::MIN_DELTA_SENSE_THRESHOLD => "MIN_DELTA_SENSE_THRESHOLD",
            regs::VIN => "VIN",
            regs::MAX_VIN => "MAX_VIN",
            regs::MIN_VIN => "MIN_VIN",
            regs::MAX_VIN_THRESHOLD => "MAX_VIN_THRESHOLD",
            regs::MIN_VIN_THRESHOLD => "MIN_VIN_THRESHOLD",
            regs::ADIN => "ADIN",
            regs::MAX_ADIN => "MAX_ADIN",
            regs::MIN_ADIN => "MIN_ADIN",
            regs::MAX_ADIN_THRESHOLD => "MAX_ADIN_THRESHOLD",
            regs::MIN_ADIN_THRESHOLD => "MIN_ADIN_THRESHOLD",
            regs::ALERT2 => "ALERT2",
            regs::GPIO_CFG => "GPIO_CFG",
            regs::TIME_COUNTER => "TIME_COUNTER",
            regs::CHARGE => "CHARGE",
            regs::ENERGY => "ENERGY",
            regs::STATUS2 => "STATUS2",
            regs::FAULT2 => "FAULT2",
            regs::GPIO3_CTRL => "GPIO3_CTRL",
            regs::CLK_DIV => "CLK_DIV",
            _ => return format!("UNKNOWN[0x{:02x}]", addr),
        };
        name.to_string()
    }

    /// Decode a CTRLA value
    pub fn decode_ctrla(value: u8) -> String {
        let voltage = match value & ctrla::VOLTAGE_MASK {
            ctrla::DELTA_SENSE => "DELTA_SENSE",
            ctrla::VDD => "VDD",
            ctrla::ADIN => "ADIN",
            _ => "SENSE+",
        };
        if value & ctrla::CHANNEL_MASK == ctrla::SNAPSHOT {
            format!("0x{:02x} (snapshot {})", value, voltage)
        } else {
            format!(
                "0x{:02x} (continuous, channel config {}, VIN from {})",
                value,
                value & ctrla::CHANNEL_MASK,
                voltage
            )
        }
    }

    /// Decode a STATUS2 value
    pub fn decode_status2(value: u8) -> String {
        if value & status2::ADC_BUSY != 0 {
            format!("0x{:02x} (ADC busy)", value)
        } else {
            format!("0x{:02x}", value)
        }
    }

    /// Format an LTC2946 I2C transaction
    pub fn format_transaction(reg: u8, data: Option<&[u8]>, is_read: bool) -> String {
        let reg_name = register_name(reg);
        let direction = if is_read { "-> READ" } else { "<- WRITE" };

        let Some(data) = data else {
            return format!("{} {}", direction, reg_name);
        };

        let decoded = match (reg, data) {
            (regs::CTRLA, [value]) => decode_ctrla(*value),
            (regs::STATUS2, [value]) => decode_status2(*value),
            (regs::VIN | regs::DELTA_SENSE | regs::ADIN, [msb, lsb]) => {
                let code = u16::from_be_bytes([*msb, *lsb]) >> 4;
                format!("{:02x?} (code {})", data, code)
            }
            (_, [value]) => format!("0x{:02x}", value),
            _ => format!("{:02x?}", data),
        };
        format!("{} {}={}", direction, reg_name, decoded)
    }
}

use protocol::{ctrla, regs, status2};

/// How conversions are started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AcquisitionMode {
    /// The ADC free-runs; reads return the latest result
    #[default]
    Continuous,
    /// Each read triggers one conversion and waits for it
    OnDemand,
}

/// How raw codes become the value returned by a read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConversionPolicy {
    /// The unscaled code
    #[default]
    Raw,
    /// Code times a caller-supplied per-quantity constant
    Calibrated,
    /// Fixed datasheet lsb (voltage and current only)
    Datasheet,
}

impl ConversionPolicy {
    /// Map the conversion-enable and legacy-formula switches to a policy
    pub const fn from_flags(conversion: bool, legacy: bool) -> Self {
        match (conversion, legacy) {
            (false, _) => ConversionPolicy::Raw,
            (true, false) => ConversionPolicy::Calibrated,
            (true, true) => ConversionPolicy::Datasheet,
        }
    }
}

/// A measurement the driver can acquire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    Voltage,
    Current,
    Power,
}

impl Quantity {
    /// Register holding the latest result
    pub const fn register(self) -> u8 {
        match self {
            Quantity::Voltage => regs::VIN,
            Quantity::Current => regs::DELTA_SENSE,
            Quantity::Power => regs::POWER,
        }
    }

    /// CTRLA value that starts a snapshot of this quantity, if the chip
    /// supports one
    pub const fn snapshot_control(self) -> Option<u8> {
        match self {
            Quantity::Voltage => Some(ctrla::SNAPSHOT | ctrla::VDD),
            Quantity::Current => Some(ctrla::SNAPSHOT | ctrla::DELTA_SENSE),
            Quantity::Power => None,
        }
    }

    /// Whether a read of this quantity is implemented for the combination
    pub const fn supports(self, mode: AcquisitionMode, policy: ConversionPolicy) -> bool {
        let acquirable = match mode {
            AcquisitionMode::Continuous => true,
            AcquisitionMode::OnDemand => self.snapshot_control().is_some(),
        };
        let convertible = !matches!(
            (self, policy),
            (Quantity::Power, ConversionPolicy::Datasheet)
        );
        acquirable && convertible
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Quantity::Voltage => "voltage",
            Quantity::Current => "current",
            Quantity::Power => "power",
        };
        f.write_str(name)
    }
}

/// Per-quantity multipliers for [`ConversionPolicy::Calibrated`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleConstants {
    pub voltage: f32,
    pub current: f32,
    pub power: f32,
}

impl ScaleConstants {
    pub const fn get(&self, quantity: Quantity) -> f32 {
        match quantity {
            Quantity::Voltage => self.voltage,
            Quantity::Current => self.current,
            Quantity::Power => self.power,
        }
    }

    pub fn set(&mut self, quantity: Quantity, scale: f32) {
        match quantity {
            Quantity::Voltage => self.voltage = scale,
            Quantity::Current => self.current = scale,
            Quantity::Power => self.power = scale,
        }
    }
}

impl Default for ScaleConstants {
    fn default() -> Self {
        Self {
            voltage: 1.0,
            current: 1.0,
            power: 1.0,
        }
    }
}

/// Bound on the snapshot busy-poll loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollLimit {
    /// Poll until the busy bit clears, however long that takes
    #[default]
    Unbounded,
    /// Give up after this many STATUS2 reads
    Iterations(NonZeroU32),
}

/// LTC2946 configuration parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Ltc2946Config {
    /// Mode in effect at construction; nothing is written to the chip
    pub acquisition_mode: AcquisitionMode,
    pub conversion_policy: ConversionPolicy,
    pub scales: ScaleConstants,
    /// Datasheet lsb constants and sense resistor
    pub datasheet: Datasheet,
    /// CTRLA value written when switching to continuous mode
    pub continuous_control: u8,
    pub poll_limit: PollLimit,
    /// Delay between STATUS2 reads; zero only yields to the executor
    pub poll_interval: Duration,
    /// Bus clock requested at setup
    pub bus_frequency_hz: u32,
}

impl Default for Ltc2946Config {
    fn default() -> Self {
        Self {
            acquisition_mode: AcquisitionMode::Continuous,
            conversion_policy: ConversionPolicy::Raw,
            scales: ScaleConstants::default(),
            datasheet: Datasheet::default(),
            continuous_control: ctrla::CONTINUOUS_DEFAULT,
            poll_limit: PollLimit::Unbounded,
            poll_interval: Duration::ZERO,
            bus_frequency_hz: 100_000,
        }
    }
}

/// Identifies one physical chip: bus channel plus 7-bit address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceHandle {
    channel: BusChannel,
    address: u8,
}

impl DeviceHandle {
    const MAX_ADDRESS: u8 = 0x7F;

    pub fn new(channel: BusChannel, address: u8) -> Result<Self> {
        if address > Self::MAX_ADDRESS {
            return Err(HwError::InvalidParameter(format!(
                "I2C address 0x{:02x} is not a 7-bit address",
                address
            )));
        }
        Ok(Self { channel, address })
    }

    pub fn channel(&self) -> BusChannel {
        self.channel
    }

    pub fn address(&self) -> u8 {
        self.address
    }
}

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:#04x}", self.channel, self.address)
    }
}

/// LTC2946 driver
pub struct Ltc2946<I> {
    regs: RegisterIo<I>,
    handle: DeviceHandle,
    config: Ltc2946Config,
    mode: AcquisitionMode,
    use_conversion: bool,
    use_legacy: bool,
    pending_error: bool,
}

impl<I: I2c> Ltc2946<I> {
    /// Create a driver for the device at `handle`, reached through `i2c`
    pub fn new(i2c: I, handle: DeviceHandle, config: Ltc2946Config) -> Self {
        let (use_conversion, use_legacy) = match config.conversion_policy {
            ConversionPolicy::Raw => (false, false),
            ConversionPolicy::Calibrated => (true, false),
            ConversionPolicy::Datasheet => (true, true),
        };
        Self {
            regs: RegisterIo::new(i2c, handle.address()),
            handle,
            mode: config.acquisition_mode,
            config,
            use_conversion,
            use_legacy,
            pending_error: false,
        }
    }

    pub fn handle(&self) -> DeviceHandle {
        self.handle
    }

    pub fn config(&self) -> &Ltc2946Config {
        &self.config
    }

    /// Direct register access, bypassing the measurement engine
    pub fn registers(&mut self) -> &mut RegisterIo<I> {
        &mut self.regs
    }

    pub fn into_inner(self) -> I {
        self.regs.into_inner()
    }

    /// Initialize the bus channel this device lives on
    pub async fn setup(&mut self) {
        let hz = self.config.bus_frequency_hz;
        let result = self.regs.bus_mut().set_frequency(hz).await;
        self.absorb("bus setup", result);
        info!(device = %self.handle, bus_hz = hz, "LTC2946 ready");
    }

    pub fn acquisition_mode(&self) -> AcquisitionMode {
        self.mode
    }

    /// Select continuous or on-demand acquisition.
    ///
    /// Continuous mode restores the configured free-running CTRLA value.
    /// On-demand mode writes nothing until the next read triggers a
    /// conversion.
    pub async fn set_acquisition_mode(&mut self, mode: AcquisitionMode) {
        self.mode = mode;
        if mode == AcquisitionMode::Continuous {
            let control = self.config.continuous_control;
            let result = self.regs.write_u8(regs::CTRLA, control).await;
            self.absorb("CTRLA write", result);
        }
        debug!(device = %self.handle, ?mode, "Acquisition mode set");
    }

    pub fn conversion_policy(&self) -> ConversionPolicy {
        ConversionPolicy::from_flags(self.use_conversion, self.use_legacy)
    }

    /// Turn unit conversion on (calibrated or datasheet) or off (raw codes)
    pub fn enable_conversion(&mut self, state: bool) {
        self.use_conversion = state;
        debug!(device = %self.handle, policy = ?self.conversion_policy(), "Conversion policy set");
    }

    /// Prefer datasheet formulas over calibrated constants
    pub fn enable_legacy(&mut self, state: bool) {
        self.use_legacy = state;
        debug!(device = %self.handle, policy = ?self.conversion_policy(), "Conversion policy set");
    }

    pub fn set_conversion_policy(&mut self, policy: ConversionPolicy) {
        self.enable_conversion(policy != ConversionPolicy::Raw);
        self.enable_legacy(policy == ConversionPolicy::Datasheet);
    }

    pub fn set_voltage_scale(&mut self, scale: f32) {
        self.set_scale(Quantity::Voltage, scale);
    }

    pub fn set_current_scale(&mut self, scale: f32) {
        self.set_scale(Quantity::Current, scale);
    }

    pub fn set_power_scale(&mut self, scale: f32) {
        self.set_scale(Quantity::Power, scale);
    }

    /// Set a calibrated-mode multiplier. Any value is accepted.
    pub fn set_scale(&mut self, quantity: Quantity, scale: f32) {
        self.config.scales.set(quantity, scale);
    }

    pub fn set_poll_limit(&mut self, limit: PollLimit) {
        self.config.poll_limit = limit;
    }

    /// Read VIN in volts (datasheet), scaled code (calibrated) or code (raw)
    pub async fn read_voltage(&mut self) -> f32 {
        self.read(Quantity::Voltage).await
    }

    /// Read load current in amps (datasheet), scaled code or raw code
    pub async fn read_current(&mut self) -> f32 {
        self.read(Quantity::Current).await
    }

    /// Read power as a scaled or raw code.
    ///
    /// Power is only acquired in continuous mode and has no datasheet
    /// conversion; those combinations return NaN.
    pub async fn read_power(&mut self) -> f32 {
        self.read(Quantity::Power).await
    }

    /// Acquire and convert one quantity.
    ///
    /// On transport failure the pending-error flag is set and the value is
    /// derived from a zero code. Unsupported mode/policy combinations
    /// return NaN without touching the bus.
    pub async fn read(&mut self, quantity: Quantity) -> f32 {
        let policy = self.conversion_policy();
        if !quantity.supports(self.mode, policy) {
            warn!(
                device = %self.handle,
                %quantity,
                mode = ?self.mode,
                ?policy,
                "Read not implemented for this mode and conversion"
            );
            return f32::NAN;
        }

        let code = match (self.mode, quantity.snapshot_control()) {
            (AcquisitionMode::OnDemand, Some(control)) => {
                self.snapshot_code(quantity, control).await
            }
            _ => self.read_code(quantity).await,
        };

        let value = self.convert(quantity, policy, code);
        trace!(device = %self.handle, %quantity, code, value, "Measurement");
        value
    }

    /// Report whether any transaction failed since the last call, and
    /// reset the flag.
    pub fn check_and_clear_error(&mut self) -> bool {
        std::mem::take(&mut self.pending_error)
    }

    async fn read_code(&mut self, quantity: Quantity) -> u32 {
        let reg = quantity.register();
        let result = match quantity {
            Quantity::Voltage | Quantity::Current => self.regs.read_u12(reg).await.map(u32::from),
            Quantity::Power => self.regs.read_u24(reg).await,
        };
        self.absorb("measurement read", result)
    }

    async fn snapshot_code(&mut self, quantity: Quantity, control: u8) -> u32 {
        let result = self.regs.write_u8(regs::CTRLA, control).await;
        self.absorb("snapshot trigger", result);

        if !self.wait_for_conversion().await {
            return 0;
        }
        self.read_code(quantity).await
    }

    /// Poll STATUS2 until the ADC busy bit clears.
    ///
    /// A failed status read is recorded and polling continues, since the
    /// busy state is unknown. Returns false only when a configured poll
    /// limit runs out.
    async fn wait_for_conversion(&mut self) -> bool {
        let mut polls: u32 = 0;
        loop {
            polls = polls.saturating_add(1);
            match self.regs.read_u8(regs::STATUS2).await {
                Ok(status) if status & status2::ADC_BUSY == 0 => {
                    trace!(device = %self.handle, polls, "Snapshot conversion complete");
                    return true;
                }
                Ok(_) => {}
                Err(e) => self.absorb("STATUS2 poll", Err::<(), _>(e)),
            }

            if let PollLimit::Iterations(limit) = self.config.poll_limit {
                if polls >= limit.get() {
                    self.absorb("snapshot conversion", Err::<(), _>(HwError::Timeout));
                    return false;
                }
            }

            if self.config.poll_interval.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(self.config.poll_interval).await;
            }
        }
    }

    fn convert(&self, quantity: Quantity, policy: ConversionPolicy, code: u32) -> f32 {
        match policy {
            ConversionPolicy::Raw => code as f32,
            ConversionPolicy::Calibrated => code as f32 * self.config.scales.get(quantity),
            ConversionPolicy::Datasheet => match quantity {
                // 12-bit codes, so the narrowing is lossless
                Quantity::Voltage => self.config.datasheet.vin_to_volts(code as u16),
                Quantity::Current => self.config.datasheet.delta_sense_to_amps(code as u16),
                Quantity::Power => f32::NAN,
            },
        }
    }

    // Record a failed transaction and substitute the default value.
    fn absorb<T: Default>(&mut self, what: &str, result: Result<T>) -> T {
        match result {
            Ok(value) => value,
            Err(e) => {
                warn!(device = %self.handle, error = %e, "{} failed", what);
                self.pending_error = true;
                T::default()
            }
        }
    }
}
