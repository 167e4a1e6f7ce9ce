//! Datasheet code-to-unit conversions for the LTC2946.
//!
//! Only the VIN and current formulas are used by the live read path. The
//! remaining conversions operate on raw codes that the caller fetched
//! through [`RegisterIo`](super::registers::RegisterIo) directly.

/// Full-scale-derived weight of one ADC code for each measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lsb {
    /// VIN register, volts per code (102.4 V / 4095)
    pub vin: f32,
    /// ADIN register, volts per code (2.048 V / 4095)
    pub adin: f32,
    /// ΔSENSE register, volts per code (102.4 mV / 4095)
    pub delta_sense: f32,
    /// POWER register, V² per code; divide by sense ohms for watts
    pub power: f32,
    /// TIME_COUNTER register, seconds per tick of the internal clock
    pub time: f32,
}

impl Lsb {
    /// Values from the LTC2946 electrical characteristics table
    pub const DATASHEET: Self = Self {
        vin: 2.500_610_5e-2,
        adin: 5.001_221e-4,
        delta_sense: 2.500_610_5e-5,
        power: 6.253_05e-7,
        time: 1.639_543e-2,
    };
}

impl Default for Lsb {
    fn default() -> Self {
        Self::DATASHEET
    }
}

/// Fixed-lsb conversion formulas, parameterized by the sense resistor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Datasheet {
    pub lsb: Lsb,
    /// External sense resistor in ohms
    pub sense_resistor: f32,
}

impl Datasheet {
    /// Sense resistor fitted on the LTC2946 demo board
    pub const DEFAULT_SENSE_RESISTOR: f32 = 0.02;

    /// Charge lsb is 16 current lsb times the time lsb
    const CHARGE_LSB_MULTIPLIER: f32 = 16.0;

    /// Energy lsb is 65536 power lsb times the time lsb
    const ENERGY_LSB_MULTIPLIER: f32 = 65536.0;

    pub const fn new(lsb: Lsb, sense_resistor: f32) -> Self {
        Self {
            lsb,
            sense_resistor,
        }
    }

    /// VIN code to volts
    pub fn vin_to_volts(&self, code: u16) -> f32 {
        code as f32 * self.lsb.vin
    }

    /// ADIN code to volts
    pub fn adin_to_volts(&self, code: u16) -> f32 {
        code as f32 * self.lsb.adin
    }

    /// ΔSENSE code to load current in amps, I = V / R
    pub fn delta_sense_to_amps(&self, code: u16) -> f32 {
        let volts = code as f32 * self.lsb.delta_sense;
        volts / self.sense_resistor
    }

    /// POWER code to watts
    pub fn power_to_watts(&self, code: u32) -> f32 {
        code as f32 * self.lsb.power / self.sense_resistor
    }

    /// Joules represented by one ENERGY code
    pub fn energy_lsb(&self) -> f32 {
        (self.lsb.power / self.sense_resistor) * Self::ENERGY_LSB_MULTIPLIER * self.lsb.time
    }

    /// ENERGY code to joules
    pub fn energy_to_joules(&self, code: u32) -> f32 {
        code as f32 * self.energy_lsb()
    }

    /// Coulombs represented by one CHARGE code
    pub fn charge_lsb(&self) -> f32 {
        (self.lsb.delta_sense / self.sense_resistor) * Self::CHARGE_LSB_MULTIPLIER * self.lsb.time
    }

    /// CHARGE code to coulombs
    pub fn charge_to_coulombs(&self, code: u32) -> f32 {
        code as f32 * self.charge_lsb()
    }

    /// TIME_COUNTER code to elapsed seconds
    pub fn time_to_seconds(&self, code: u32) -> f32 {
        self.lsb.time * code as f32
    }
}

impl Default for Datasheet {
    fn default() -> Self {
        Self::new(Lsb::DATASHEET, Self::DEFAULT_SENSE_RESISTOR)
    }
}
