use bitflags::bitflags;

bitflags! {
    /// The CONFIGURATION register (0x00).
    pub struct Configuration: u16 {
        /// Reset bit. Self-clearing.
        const RST = 1 << 15;
        /// Bus voltage range. Set for 32V, clear for 16V.
        const BRNG = 1 << 13;
        const PG1 = 1 << 12;
        const PG0 = 1 << 11;
        const BADC4 = 1 << 10;
        const BADC3 = 1 << 9;
        const BADC2 = 1 << 8;
        const BADC1 = 1 << 7;
        const SADC4 = 1 << 6;
        const SADC3 = 1 << 5;
        const SADC2 = 1 << 4;
        const SADC1 = 1 << 3;
        const MODE3 = 1 << 2;
        const MODE2 = 1 << 1;
        const MODE1 = 1 << 0;

        const PG = Self::PG1.bits | Self::PG0.bits;
        const BADC = Self::BADC4.bits | Self::BADC3.bits | Self::BADC2.bits | Self::BADC1.bits;
        const SADC = Self::SADC4.bits | Self::SADC3.bits | Self::SADC2.bits | Self::SADC1.bits;
        const MODE = Self::MODE3.bits | Self::MODE2.bits | Self::MODE1.bits;
    }
}

const PG_SHIFT: u16 = 11;
const BADC_SHIFT: u16 = 7;
const SADC_SHIFT: u16 = 3;

impl Configuration {
    /// Assemble a configuration from its fields.
    pub fn new(
        range: BusVoltageRange,
        gain: Gain,
        bus_adc: AdcMode,
        shunt_adc: AdcMode,
        mode: OperatingMode,
    ) -> Self {
        let mut config = Configuration::from_bits_truncate(
            (gain as u16) << PG_SHIFT
                | (bus_adc as u16) << BADC_SHIFT
                | (shunt_adc as u16) << SADC_SHIFT
                | mode as u16,
        );
        config.set(Configuration::BRNG, range == BusVoltageRange::Volts32);
        config
    }

    pub fn bus_voltage_range(&self) -> BusVoltageRange {
        if self.contains(Configuration::BRNG) {
            BusVoltageRange::Volts32
        } else {
            BusVoltageRange::Volts16
        }
    }

    pub fn gain(&self) -> Gain {
        match (self.bits & Configuration::PG.bits) >> PG_SHIFT {
            0b00 => Gain::Div1,
            0b01 => Gain::Div2,
            0b10 => Gain::Div4,
            _ => Gain::Div8,
        }
    }

    pub fn bus_adc(&self) -> AdcMode {
        AdcMode::from_field((self.bits & Configuration::BADC.bits) >> BADC_SHIFT)
    }

    pub fn shunt_adc(&self) -> AdcMode {
        AdcMode::from_field((self.bits & Configuration::SADC.bits) >> SADC_SHIFT)
    }

    pub fn operating_mode(&self) -> OperatingMode {
        OperatingMode::from_field(self.bits & Configuration::MODE.bits)
    }

    /// Replace the BADC field, leaving every other bit untouched.
    pub fn with_bus_adc(self, adc: AdcMode) -> Self {
        let field = Configuration::from_bits_truncate((adc as u16) << BADC_SHIFT);
        (self - Configuration::BADC) | field
    }

    /// Replace the SADC field, leaving every other bit untouched.
    pub fn with_shunt_adc(self, adc: AdcMode) -> Self {
        let field = Configuration::from_bits_truncate((adc as u16) << SADC_SHIFT);
        (self - Configuration::SADC) | field
    }
}

/// Full-scale bus voltage range.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusVoltageRange {
    Volts16,
    Volts32,
}

impl BusVoltageRange {
    /// The narrowest range that still covers `max_bus_voltage`.
    pub fn covering(max_bus_voltage: f32) -> Self {
        if max_bus_voltage > 16.0 {
            BusVoltageRange::Volts32
        } else {
            BusVoltageRange::Volts16
        }
    }
}

/// Shunt voltage PGA gain and the full-scale range it gives.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Gain {
    /// ±40 mV
    Div1 = 0b00,
    /// ±80 mV
    Div2 = 0b01,
    /// ±160 mV
    Div4 = 0b10,
    /// ±320 mV
    Div8 = 0b11,
}

impl Gain {
    /// The smallest range covering `max_shunt_voltage`. A value exactly on a
    /// boundary picks the smaller range.
    pub fn covering(max_shunt_voltage: f32) -> Self {
        if max_shunt_voltage <= 0.04 {
            Gain::Div1
        } else if max_shunt_voltage <= 0.08 {
            Gain::Div2
        } else if max_shunt_voltage <= 0.16 {
            Gain::Div4
        } else {
            Gain::Div8
        }
    }

    /// PGA divider: 1, 2, 4 or 8.
    pub fn divisor(&self) -> u8 {
        1 << (*self as u8)
    }

    /// Full-scale shunt voltage in volts.
    pub fn full_scale_volts(&self) -> f32 {
        0.04 * self.divisor() as f32
    }
}

/// Resolution or averaging setting of a single ADC channel (BADC / SADC).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdcMode {
    Bits9 = 0b0000,
    Bits10 = 0b0001,
    Bits11 = 0b0010,
    Bits12 = 0b0011,
    Samples2 = 0b1001,
    Samples4 = 0b1010,
    Samples8 = 0b1011,
    Samples16 = 0b1100,
    Samples32 = 0b1101,
    Samples64 = 0b1110,
    Samples128 = 0b1111,
}

impl AdcMode {
    // 0b01xx aliases 0b00xx and 0b1000 is another 12-bit single sample.
    fn from_field(field: u16) -> Self {
        match field & 0b1111 {
            0b0000 | 0b0100 => AdcMode::Bits9,
            0b0001 | 0b0101 => AdcMode::Bits10,
            0b0010 | 0b0110 => AdcMode::Bits11,
            0b0011 | 0b0111 | 0b1000 => AdcMode::Bits12,
            0b1001 => AdcMode::Samples2,
            0b1010 => AdcMode::Samples4,
            0b1011 => AdcMode::Samples8,
            0b1100 => AdcMode::Samples16,
            0b1101 => AdcMode::Samples32,
            0b1110 => AdcMode::Samples64,
            _ => AdcMode::Samples128,
        }
    }

    /// Number of 12-bit samples averaged per result.
    pub fn samples(&self) -> u8 {
        match self {
            AdcMode::Bits9 | AdcMode::Bits10 | AdcMode::Bits11 | AdcMode::Bits12 => 1,
            AdcMode::Samples2 => 2,
            AdcMode::Samples4 => 4,
            AdcMode::Samples8 => 8,
            AdcMode::Samples16 => 16,
            AdcMode::Samples32 => 32,
            AdcMode::Samples64 => 64,
            AdcMode::Samples128 => 128,
        }
    }

    /// Worst-case conversion time in microseconds.
    pub fn conversion_time_us(&self) -> u32 {
        match self {
            AdcMode::Bits9 => 84,
            AdcMode::Bits10 => 148,
            AdcMode::Bits11 => 276,
            AdcMode::Bits12 => 532,
            AdcMode::Samples2 => 1_060,
            AdcMode::Samples4 => 2_130,
            AdcMode::Samples8 => 4_260,
            AdcMode::Samples16 => 8_510,
            AdcMode::Samples32 => 17_020,
            AdcMode::Samples64 => 34_050,
            AdcMode::Samples128 => 68_100,
        }
    }

    /// Milliseconds to wait after selecting this mode before the first
    /// averaged result is available. Zero for single-sample modes.
    pub fn settling_time_ms(&self) -> u8 {
        if self.samples() == 1 {
            return 0;
        }
        let us = self.conversion_time_us();
        ((us + 999) / 1000) as u8
    }
}

/// Operating mode (MODE field).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OperatingMode {
    PowerDown = 0b000,
    ShuntTriggered = 0b001,
    BusTriggered = 0b010,
    ShuntAndBusTriggered = 0b011,
    AdcOff = 0b100,
    ShuntContinuous = 0b101,
    BusContinuous = 0b110,
    ShuntAndBusContinuous = 0b111,
}

impl OperatingMode {
    fn from_field(field: u16) -> Self {
        match field & 0b111 {
            0b000 => OperatingMode::PowerDown,
            0b001 => OperatingMode::ShuntTriggered,
            0b010 => OperatingMode::BusTriggered,
            0b011 => OperatingMode::ShuntAndBusTriggered,
            0b100 => OperatingMode::AdcOff,
            0b101 => OperatingMode::ShuntContinuous,
            0b110 => OperatingMode::BusContinuous,
            _ => OperatingMode::ShuntAndBusContinuous,
        }
    }
}

bitflags! {
    /// Status bits in the low end of the BUSVOLTAGE register (0x02).
    pub struct BusVoltageStatus: u16 {
        /// Conversion ready.
        const CNVR = 1 << 1;
        /// Math overflow: current or power exceeded its register range.
        const OVF = 1 << 0;
    }
}
