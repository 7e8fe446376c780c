//! Calibration profiles.
//!
//! A profile is turned into a [`Calibration`]: the value for the CALIBRATION
//! register, the CONFIGURATION bits written alongside it, and the LSBs that
//! scale raw CURRENT and POWER readings. Nothing here touches the bus.

use crate::configuration::{AdcMode, BusVoltageRange, Configuration, Gain, OperatingMode};
use crate::error::ConfigurationError;

/// Internal fixed scaling constant of the INA219 (datasheet equation 1).
const CALIBRATION_SCALE: f32 = 0.04096;
/// Power LSB is always 20 times the current LSB.
const POWER_LSB_RATIO: f32 = 20.0;
/// Full scale of the CURRENT register at 15-bit resolution.
const MAX_CURRENT_COUNTS_15BIT: f32 = 32767.0;
/// Full scale of the CURRENT register at 12-bit resolution.
const MAX_CURRENT_COUNTS_12BIT: f32 = 4096.0;
/// A float can be scaled by ten at most this many times before overflowing.
const MAX_DECADES: u8 = 38;

/// The operating point programmed into the device.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Calibration {
    /// Milliamps per CURRENT register count.
    pub current_lsb_milliamps: f32,
    /// Milliwatts per POWER register count.
    pub power_lsb_milliwatts: f32,
    /// CALIBRATION register value.
    pub value: u16,
    /// CONFIGURATION register value written with it.
    pub configuration: Configuration,
}

impl Calibration {
    /// State of a driver that has not been calibrated yet. All readings scale to zero.
    pub const UNCALIBRATED: Self = Calibration {
        current_lsb_milliamps: 0.0,
        power_lsb_milliwatts: 0.0,
        value: 0,
        configuration: Configuration::empty(),
    };

    /// Convert a raw CURRENT register value to milliamps.
    pub fn current_milliamps(&self, raw: i16) -> f32 {
        raw as f32 * self.current_lsb_milliamps
    }

    /// Convert a raw POWER register value to milliwatts.
    pub fn power_milliwatts(&self, raw: i16) -> f32 {
        raw as f32 * self.power_lsb_milliwatts
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Calibration::UNCALIBRATED
    }
}

/// Convert a raw shunt voltage (10 µV per count) to millivolts.
pub fn shunt_millivolts(raw: i16) -> f32 {
    raw as f32 * 0.01
}

/// Convert a raw bus voltage (in millivolts, as returned by
/// [`INA219::bus_voltage_raw`](crate::INA219::bus_voltage_raw)) to volts.
pub fn bus_volts(raw: i16) -> f32 {
    raw as f32 * 0.001
}

/// A calibration profile.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Profile {
    /// 32V bus, 2A expected, 0.1Ω shunt. 0.1 mA per current bit, overflows at 3.2A.
    Range32V2A,
    /// 32V bus, 1A expected, 0.1Ω shunt. 0.04 mA per current bit, overflows at 1.3A.
    Range32V1A,
    /// 16V bus, 400mA expected, 0.1Ω shunt. 0.05 mA per current bit.
    Range16V400mA,
    /// Computed from the physical shunt and expected operating range.
    Custom(ShuntParameters),
}

impl Profile {
    pub fn calibration(&self) -> Result<Calibration, ConfigurationError> {
        match self {
            Profile::Range32V2A => Ok(preset(0.1, 2.0, 4096, BusVoltageRange::Volts32, Gain::Div8)),
            Profile::Range32V1A => Ok(preset(0.04, 0.8, 10240, BusVoltageRange::Volts32, Gain::Div8)),
            Profile::Range16V400mA => {
                Ok(preset(0.05, 1.0, 8192, BusVoltageRange::Volts16, Gain::Div1))
            }
            Profile::Custom(params) => params.calibration(),
        }
    }
}

fn preset(
    current_lsb_milliamps: f32,
    power_lsb_milliwatts: f32,
    value: u16,
    range: BusVoltageRange,
    gain: Gain,
) -> Calibration {
    Calibration {
        current_lsb_milliamps,
        power_lsb_milliwatts,
        value,
        configuration: default_configuration(range, gain),
    }
}

/// 12-bit single-sample conversions on both channels, shunt and bus continuous.
fn default_configuration(range: BusVoltageRange, gain: Gain) -> Configuration {
    Configuration::new(
        range,
        gain,
        AdcMode::Bits12,
        AdcMode::Bits12,
        OperatingMode::ShuntAndBusContinuous,
    )
}

/// How the minimum current LSB is rounded up to a round number.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LsbRounding {
    /// Next value in the 1-2-5 series, e.g. 0.000061 -> 0.0001.
    #[default]
    Decade125,
    /// Round the leading digit up, e.g. 0.000061 -> 0.00007.
    LeadingDigit,
}

/// Physical parameters of the measurement circuit.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ShuntParameters {
    /// Shunt resistance in ohms.
    pub shunt_resistance: f32,
    /// Largest voltage expected across the shunt, in volts.
    pub max_shunt_voltage: f32,
    /// Largest bus voltage expected, in volts.
    pub max_bus_voltage: f32,
    /// Largest current expected through the shunt, in amps.
    pub max_expected_current: f32,
    pub lsb_rounding: LsbRounding,
}

/// Operating limits implied by a custom calibration.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Diagnostics {
    /// Current at which the shunt reaches `max_shunt_voltage`, in amps.
    pub max_possible_current: f32,
    /// Current LSB at 15-bit resolution, in amps.
    pub min_lsb: f32,
    /// Current LSB at 12-bit resolution, in amps.
    pub max_lsb: f32,
    pub max_current_before_overflow: f32,
    pub max_shunt_voltage_before_overflow: f32,
    /// In watts.
    pub max_power: f32,
}

impl ShuntParameters {
    pub fn new(
        shunt_resistance: f32,
        max_shunt_voltage: f32,
        max_bus_voltage: f32,
        max_expected_current: f32,
    ) -> Self {
        ShuntParameters {
            shunt_resistance,
            max_shunt_voltage,
            max_bus_voltage,
            max_expected_current,
            lsb_rounding: LsbRounding::default(),
        }
    }

    pub fn with_lsb_rounding(self, lsb_rounding: LsbRounding) -> Self {
        ShuntParameters {
            lsb_rounding,
            ..self
        }
    }

    fn validate(&self) -> Result<(), ConfigurationError> {
        // Written as negations so NaN is rejected too.
        if !(self.max_expected_current > 0.0 && self.max_expected_current.is_finite()) {
            return Err(ConfigurationError::NonPositiveExpectedCurrent);
        }
        if !(self.shunt_resistance > 0.0 && self.shunt_resistance.is_finite()) {
            return Err(ConfigurationError::NonPositiveShuntResistance);
        }
        if !(self.max_shunt_voltage > 0.0 && self.max_shunt_voltage.is_finite()) {
            return Err(ConfigurationError::NonPositiveShuntVoltage);
        }
        Ok(())
    }

    pub fn calibration(&self) -> Result<Calibration, ConfigurationError> {
        self.validate()?;

        let min_lsb = self.max_expected_current / MAX_CURRENT_COUNTS_15BIT;
        let current_lsb = round_lsb(min_lsb, self.lsb_rounding)?;

        let exact = CALIBRATION_SCALE / (current_lsb * self.shunt_resistance);
        // Absorb a few ULPs of error so 4095.9995 truncates to 4096.
        let value = libm::floorf(exact * (1.0 + 4.0 * f32::EPSILON));
        if !(value >= 1.0 && value <= u16::MAX as f32) {
            return Err(ConfigurationError::CalibrationOutOfRange);
        }

        Ok(Calibration {
            current_lsb_milliamps: current_lsb * 1000.0,
            power_lsb_milliwatts: current_lsb * POWER_LSB_RATIO * 1000.0,
            value: value as u16,
            configuration: default_configuration(
                BusVoltageRange::covering(self.max_bus_voltage),
                Gain::covering(self.max_shunt_voltage),
            ),
        })
    }

    pub fn diagnostics(&self, calibration: &Calibration) -> Diagnostics {
        let max_possible_current = self.max_shunt_voltage / self.shunt_resistance;
        let current_lsb = calibration.current_lsb_milliamps / 1000.0;
        let max_current_before_overflow =
            (current_lsb * MAX_CURRENT_COUNTS_15BIT).min(max_possible_current);
        let max_shunt_voltage_before_overflow =
            (max_current_before_overflow * self.shunt_resistance).min(self.max_shunt_voltage);

        Diagnostics {
            max_possible_current,
            min_lsb: self.max_expected_current / MAX_CURRENT_COUNTS_15BIT,
            max_lsb: self.max_expected_current / MAX_CURRENT_COUNTS_12BIT,
            max_current_before_overflow,
            max_shunt_voltage_before_overflow,
            max_power: max_current_before_overflow * self.max_bus_voltage,
        }
    }
}

/// Round `min_lsb` up to a round decimal value no smaller than it.
fn round_lsb(min_lsb: f32, rounding: LsbRounding) -> Result<f32, ConfigurationError> {
    if !(min_lsb > 0.0 && min_lsb.is_finite()) {
        return Err(ConfigurationError::NonPositiveExpectedCurrent);
    }

    // Bring the leading digit into the units place: 1.0 <= scaled < 10.0
    let mut scale = 1.0f32;
    let mut decades = 0;
    while min_lsb * scale < 1.0 {
        if decades == MAX_DECADES {
            return Err(ConfigurationError::LsbNotConvergent);
        }
        scale *= 10.0;
        decades += 1;
    }
    while min_lsb * scale >= 10.0 {
        scale /= 10.0;
    }
    let scaled = min_lsb * scale;

    let mantissa = match rounding {
        LsbRounding::LeadingDigit => libm::ceilf(scaled),
        LsbRounding::Decade125 => {
            if scaled <= 1.0 {
                1.0
            } else if scaled <= 2.0 {
                2.0
            } else if scaled <= 5.0 {
                5.0
            } else {
                10.0
            }
        }
    };
    Ok(mantissa / scale)
}

#[cfg(test)]
mod tests {
    use super::{round_lsb, LsbRounding, Profile, ShuntParameters};
    use crate::configuration::Gain;
    use crate::error::ConfigurationError;
    use approx::assert_relative_eq;

    #[test]
    fn round_lsb_decade() {
        let lsb = round_lsb(2.0 / 32767.0, LsbRounding::Decade125).unwrap();
        assert_relative_eq!(lsb, 0.0001, max_relative = 0.0001);
        let lsb = round_lsb(1.0 / 32767.0, LsbRounding::Decade125).unwrap();
        assert_relative_eq!(lsb, 0.00005, max_relative = 0.0001);
        let lsb = round_lsb(0.4 / 32767.0, LsbRounding::Decade125).unwrap();
        assert_relative_eq!(lsb, 0.00002, max_relative = 0.0001);
    }

    #[test]
    fn round_lsb_leading_digit() {
        let lsb = round_lsb(0.000610, LsbRounding::LeadingDigit).unwrap();
        assert_relative_eq!(lsb, 0.0007, max_relative = 0.0001);
        let lsb = round_lsb(1.0 / 32767.0, LsbRounding::LeadingDigit).unwrap();
        assert_relative_eq!(lsb, 0.00004, max_relative = 0.0001);
    }

    #[test]
    fn round_lsb_never_below_minimum() {
        for rounding in [LsbRounding::Decade125, LsbRounding::LeadingDigit] {
            for min in [0.000061, 0.00021, 0.0049, 0.0123, 0.3, 2.5] {
                let lsb = round_lsb(min, rounding).unwrap();
                assert!(lsb >= min, "{} rounded to {}", min, lsb);
            }
        }
    }

    #[test]
    fn round_lsb_rejects_zero() {
        assert_eq!(
            round_lsb(0.0, LsbRounding::Decade125),
            Err(ConfigurationError::NonPositiveExpectedCurrent)
        );
    }

    #[test]
    fn round_lsb_gives_up_on_tiny_values() {
        assert_eq!(
            round_lsb(f32::MIN_POSITIVE / 1000.0, LsbRounding::Decade125),
            Err(ConfigurationError::LsbNotConvergent)
        );
    }

    #[test]
    fn custom_matches_32v_2a_preset() {
        let preset = Profile::Range32V2A.calibration().unwrap();
        let custom = ShuntParameters::new(0.1, 0.32, 32.0, 2.0).calibration().unwrap();
        assert_eq!(custom.value, preset.value);
        assert_eq!(custom.configuration, preset.configuration);
        assert_relative_eq!(
            custom.current_lsb_milliamps,
            preset.current_lsb_milliamps,
            max_relative = 0.0001
        );
        assert_relative_eq!(
            custom.power_lsb_milliwatts,
            preset.power_lsb_milliwatts,
            max_relative = 0.0001
        );
    }

    #[test]
    fn custom_leading_digit_matches_32v_1a_preset() {
        let preset = Profile::Range32V1A.calibration().unwrap();
        let custom = ShuntParameters::new(0.1, 0.32, 32.0, 1.0)
            .with_lsb_rounding(LsbRounding::LeadingDigit)
            .calibration()
            .unwrap();
        assert_eq!(custom.value, preset.value);
        assert_relative_eq!(
            custom.current_lsb_milliamps,
            preset.current_lsb_milliamps,
            max_relative = 0.0001
        );
    }

    #[test]
    fn custom_truncation_tolerates_float_noise() {
        // 0.04096 / (0.0005 * 0.01) is 8192, but computes to 8191.999 in f32.
        let calibration = ShuntParameters::new(0.01, 0.1, 12.0, 10.0)
            .calibration()
            .unwrap();
        assert_eq!(calibration.value, 8192);
        assert_eq!(calibration.configuration.gain(), Gain::Div4);
    }

    #[test]
    fn custom_rejects_non_positive_current() {
        for current in [0.0, -1.0, f32::NAN] {
            let result = ShuntParameters::new(0.1, 0.32, 32.0, current).calibration();
            assert_eq!(result, Err(ConfigurationError::NonPositiveExpectedCurrent));
        }
    }

    #[test]
    fn custom_rejects_zero_shunt() {
        let result = ShuntParameters::new(0.0, 0.32, 32.0, 2.0).calibration();
        assert_eq!(result, Err(ConfigurationError::NonPositiveShuntResistance));
    }

    #[test]
    fn custom_rejects_oversized_calibration() {
        // 1 mΩ with 100 mA expected needs a calibration of 8192000.
        let result = ShuntParameters::new(0.001, 0.04, 5.0, 0.1).calibration();
        assert_eq!(result, Err(ConfigurationError::CalibrationOutOfRange));
    }

    #[test]
    fn diagnostics_for_32v_2a() {
        let params = ShuntParameters::new(0.1, 0.32, 32.0, 2.0);
        let calibration = params.calibration().unwrap();
        let diagnostics = params.diagnostics(&calibration);
        assert_relative_eq!(diagnostics.max_possible_current, 3.2, max_relative = 0.0001);
        assert_relative_eq!(diagnostics.max_current_before_overflow, 3.2, max_relative = 0.0001);
        assert_relative_eq!(
            diagnostics.max_shunt_voltage_before_overflow,
            0.32,
            max_relative = 0.0001
        );
        assert_relative_eq!(diagnostics.max_power, 102.4, max_relative = 0.0001);
    }
}
