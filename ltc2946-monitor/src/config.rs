//! Monitor configuration.
//!
//! Parses environment variables describing which LTC2946 to talk to and
//! how to interpret its readings.

use std::env;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::time::Duration;

use crate::hw_trait::{BusChannel, HwError, Result};
use crate::peripheral::ltc2946::{
    AcquisitionMode, ConversionPolicy, Datasheet, DeviceHandle, Ltc2946Config, PollLimit,
    DEFAULT_ADDRESS,
};

/// Device location plus driver settings, parsed from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    pub handle: DeviceHandle,
    pub device: Ltc2946Config,
}

impl MonitorConfig {
    /// Bus used when `LTC2946_BUS` is unset
    pub const DEFAULT_BUS: u8 = 1;

    /// Parse configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `LTC2946_BUS`: bus channel 0-3 (default: 1)
    /// - `LTC2946_ADDRESS`: 7-bit address, `0x`-prefixed hex or decimal
    ///   (default: 0x6F)
    /// - `LTC2946_SENSE_OHMS`: sense resistor in ohms (default: 0.02)
    /// - `LTC2946_MODE`: `continuous` or `on-demand`
    /// - `LTC2946_CONVERSION`: `raw`, `calibrated` or `datasheet`
    /// - `LTC2946_VOLTAGE_SCALE`, `LTC2946_CURRENT_SCALE`,
    ///   `LTC2946_POWER_SCALE`: calibrated multipliers (default: 1.0)
    /// - `LTC2946_POLL_LIMIT`: maximum STATUS2 polls per snapshot, at
    ///   least 1 (default: unbounded)
    /// - `LTC2946_POLL_INTERVAL_MS`: delay between polls (default: 0)
    ///
    /// Values that are present but malformed are errors rather than being
    /// silently replaced by defaults.
    pub fn from_env() -> Result<Self> {
        let bus = parse_var("LTC2946_BUS", parse_number::<u8>)?.unwrap_or(Self::DEFAULT_BUS);
        let address = parse_var("LTC2946_ADDRESS", parse_address)?.unwrap_or(DEFAULT_ADDRESS);
        let handle = DeviceHandle::new(BusChannel::try_from(bus)?, address)?;

        let mut device = Ltc2946Config::default();

        if let Some(mode) = parse_var("LTC2946_MODE", parse_mode)? {
            device.acquisition_mode = mode;
        }
        if let Some(policy) = parse_var("LTC2946_CONVERSION", parse_policy)? {
            device.conversion_policy = policy;
        }

        let sense = parse_var("LTC2946_SENSE_OHMS", parse_number::<f32>)?
            .unwrap_or(Datasheet::DEFAULT_SENSE_RESISTOR);
        if !(sense.is_finite() && sense > 0.0) {
            return Err(HwError::InvalidParameter(format!(
                "LTC2946_SENSE_OHMS must be a positive resistance, got {}",
                sense
            )));
        }
        device.datasheet.sense_resistor = sense;

        if let Some(scale) = parse_var("LTC2946_VOLTAGE_SCALE", parse_number::<f32>)? {
            device.scales.voltage = scale;
        }
        if let Some(scale) = parse_var("LTC2946_CURRENT_SCALE", parse_number::<f32>)? {
            device.scales.current = scale;
        }
        if let Some(scale) = parse_var("LTC2946_POWER_SCALE", parse_number::<f32>)? {
            device.scales.power = scale;
        }

        if let Some(limit) = parse_var("LTC2946_POLL_LIMIT", parse_number::<NonZeroU32>)? {
            device.poll_limit = PollLimit::Iterations(limit);
        }
        if let Some(ms) = parse_var("LTC2946_POLL_INTERVAL_MS", parse_number::<u64>)? {
            device.poll_interval = Duration::from_millis(ms);
        }

        Ok(Self { handle, device })
    }
}

fn parse_var<T>(name: &str, parse: fn(&str) -> Option<T>) -> Result<Option<T>> {
    match env::var(name) {
        Ok(raw) => parse(raw.trim()).map(Some).ok_or_else(|| {
            HwError::InvalidParameter(format!("{}: cannot parse {:?}", name, raw))
        }),
        Err(_) => Ok(None),
    }
}

fn parse_number<T: FromStr>(s: &str) -> Option<T> {
    s.parse().ok()
}

fn parse_address(s: &str) -> Option<u8> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

fn parse_mode(s: &str) -> Option<AcquisitionMode> {
    match s.to_ascii_lowercase().as_str() {
        "continuous" => Some(AcquisitionMode::Continuous),
        "on-demand" | "ondemand" | "snapshot" => Some(AcquisitionMode::OnDemand),
        _ => None,
    }
}

fn parse_policy(s: &str) -> Option<ConversionPolicy> {
    match s.to_ascii_lowercase().as_str() {
        "raw" => Some(ConversionPolicy::Raw),
        "calibrated" => Some(ConversionPolicy::Calibrated),
        "datasheet" => Some(ConversionPolicy::Datasheet),
        _ => None,
    }
}
