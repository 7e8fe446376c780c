#![no_std]

mod fmt;

mod calibration;
mod configuration;
mod error;

use core::result::Result;

use byteorder::{BigEndian, ByteOrder};
use embedded_hal::blocking::{
    delay::DelayMs,
    i2c::{Read, Write},
};

pub use calibration::{
    bus_volts, shunt_millivolts, Calibration, Diagnostics, LsbRounding, Profile, ShuntParameters,
};
pub use configuration::{
    AdcMode, BusVoltageRange, BusVoltageStatus, Configuration, Gain, OperatingMode,
};
pub use error::{ConfigurationError, Error};

use fmt::{debug, trace};

/// Address with A0 and A1 tied to GND.
pub const DEFAULT_ADDRESS: u8 = 0x40;

/// Worst-case 12-bit conversion is 586us, so wait a full millisecond between
/// selecting a register and reading it.
const READ_SETTLE_MS: u8 = 1;

#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Register {
    Configuration = 0x00,
    ShuntVoltage = 0x01,
    BusVoltage = 0x02,
    Power = 0x03,
    Current = 0x04,
    Calibration = 0x05,
}

pub struct INA219<I2C, D> {
    i2c: I2C,
    delay: D,
    address: u8,
    calibration: Calibration,
}

impl<I2C, D, E> INA219<I2C, D>
where
    I2C: Write<Error = E> + Read<Error = E>,
    D: DelayMs<u8>,
{
    /// Create a driver for the device at `address`. Nothing is sent until a
    /// calibration is applied with [`begin`](Self::begin) or [`calibrate`](Self::calibrate).
    pub fn new(i2c: I2C, delay: D, address: u8) -> Self {
        INA219 {
            i2c,
            delay,
            address,
            calibration: Calibration::UNCALIBRATED,
        }
    }

    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// Point the driver at another device. The cached calibration is kept
    /// as is; apply one again if the new device has not been calibrated.
    pub fn set_address(&mut self, address: u8) {
        self.address = address;
    }

    /// The operating point last written to the device.
    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    /// Apply the default 32V/2A calibration.
    pub fn begin(&mut self) -> Result<(), Error<E>> {
        self.calibrate(&Profile::Range32V2A)
    }

    /// Write the CALIBRATION and CONFIGURATION registers for `profile`.
    ///
    /// An invalid custom profile is rejected before anything is written.
    /// The cached scale factors only change once both writes succeeded.
    pub fn calibrate(&mut self, profile: &Profile) -> Result<(), Error<E>> {
        let calibration = profile.calibration()?;
        if let Profile::Custom(params) = profile {
            let diagnostics = params.diagnostics(&calibration);
            debug!(
                "custom calibration: max possible {} A, lsb range {}..{} A, max before overflow {} A / {} V, max power {} W",
                diagnostics.max_possible_current,
                diagnostics.min_lsb,
                diagnostics.max_lsb,
                diagnostics.max_current_before_overflow,
                diagnostics.max_shunt_voltage_before_overflow,
                diagnostics.max_power
            );
        }

        self.write_register(Register::Calibration, calibration.value)?;
        self.write_register(Register::Configuration, calibration.configuration.bits())?;
        self.calibration = calibration;

        debug!(
            "calibrated: cal {}, current lsb {} mA, power lsb {} mW, config {:#x}",
            calibration.value,
            calibration.current_lsb_milliamps,
            calibration.power_lsb_milliwatts,
            calibration.configuration.bits()
        );
        Ok(())
    }

    /// Measure up to 32V and 2A with a 0.1Ω shunt.
    pub fn set_calibration_32v_2a(&mut self) -> Result<(), Error<E>> {
        self.calibrate(&Profile::Range32V2A)
    }

    /// Measure up to 32V and 1A with a 0.1Ω shunt.
    pub fn set_calibration_32v_1a(&mut self) -> Result<(), Error<E>> {
        self.calibrate(&Profile::Range32V1A)
    }

    /// Measure up to 16V and 400mA with a 0.1Ω shunt, at the highest precision.
    pub fn set_calibration_16v_400ma(&mut self) -> Result<(), Error<E>> {
        self.calibrate(&Profile::Range16V400mA)
    }

    /// Derive the calibration from the physical shunt and operating range.
    pub fn set_calibration_custom(&mut self, params: ShuntParameters) -> Result<(), Error<E>> {
        self.calibrate(&Profile::Custom(params))
    }

    /// Read the configuration register.
    pub fn configuration(&mut self) -> Result<Configuration, Error<E>> {
        let value = self.read_register(Register::Configuration)?;
        Ok(Configuration::from_bits_truncate(value))
    }

    /// Write the configuration register. The cached calibration is not updated.
    pub fn set_configuration(&mut self, configuration: Configuration) -> Result<(), Error<E>> {
        self.write_register(Register::Configuration, configuration.bits())
    }

    /// Get the bus voltage in millivolts, with the status bits dropped.
    pub fn bus_voltage_raw(&mut self) -> Result<i16, Error<E>> {
        let value = self.read_register(Register::BusVoltage)?;
        Ok(((value >> 3) * 4) as i16)
    }

    /// Get the conversion ready and math overflow flags.
    pub fn bus_voltage_status(&mut self) -> Result<BusVoltageStatus, Error<E>> {
        let value = self.read_register(Register::BusVoltage)?;
        Ok(BusVoltageStatus::from_bits_truncate(value))
    }

    /// Get the shunt voltage in 10µV counts.
    pub fn shunt_voltage_raw(&mut self) -> Result<i16, Error<E>> {
        let value = self.read_register(Register::ShuntVoltage)?;
        Ok(value as i16)
    }

    /// Get the current register.
    ///
    /// A sharp load transient can reset the device and clear its calibration,
    /// leaving CURRENT and POWER at zero. The cached calibration value is
    /// therefore written back before every read.
    pub fn current_raw(&mut self) -> Result<i16, Error<E>> {
        self.write_register(Register::Calibration, self.calibration.value)?;
        let value = self.read_register(Register::Current)?;
        Ok(value as i16)
    }

    /// Get the power register. Relies on a preceding [`current_raw`](Self::current_raw)
    /// to have restored the calibration.
    pub fn power_raw(&mut self) -> Result<i16, Error<E>> {
        let value = self.read_register(Register::Power)?;
        Ok(value as i16)
    }

    pub fn shunt_voltage_millivolts(&mut self) -> Result<f32, Error<E>> {
        self.shunt_voltage_raw().map(shunt_millivolts)
    }

    pub fn bus_voltage_volts(&mut self) -> Result<f32, Error<E>> {
        self.bus_voltage_raw().map(bus_volts)
    }

    pub fn current_milliamps(&mut self) -> Result<f32, Error<E>> {
        let raw = self.current_raw()?;
        Ok(self.calibration.current_milliamps(raw))
    }

    pub fn power_milliwatts(&mut self) -> Result<f32, Error<E>> {
        let raw = self.power_raw()?;
        Ok(self.calibration.power_milliwatts(raw))
    }

    /// Take each shunt measurement from a single 12-bit sample.
    pub fn shunt_single_sample(&mut self) -> Result<(), Error<E>> {
        self.set_shunt_adc(AdcMode::Bits12)
    }

    /// Average each shunt measurement over 128 samples.
    pub fn shunt_averaged(&mut self) -> Result<(), Error<E>> {
        self.set_shunt_adc(AdcMode::Samples128)
    }

    /// Take each bus measurement from a single 12-bit sample.
    pub fn bus_single_sample(&mut self) -> Result<(), Error<E>> {
        self.set_bus_adc(AdcMode::Bits12)
    }

    /// Average each bus measurement over 128 samples.
    pub fn bus_averaged(&mut self) -> Result<(), Error<E>> {
        self.set_bus_adc(AdcMode::Samples128)
    }

    /// Change the shunt ADC setting, keeping the rest of the configuration.
    /// Blocks until an averaged result is available.
    pub fn set_shunt_adc(&mut self, adc: AdcMode) -> Result<(), Error<E>> {
        let configuration = self.configuration()?.with_shunt_adc(adc);
        self.set_configuration(configuration)?;
        self.settle(adc);
        Ok(())
    }

    /// Change the bus ADC setting, keeping the rest of the configuration.
    /// Blocks until an averaged result is available.
    pub fn set_bus_adc(&mut self, adc: AdcMode) -> Result<(), Error<E>> {
        let configuration = self.configuration()?.with_bus_adc(adc);
        self.set_configuration(configuration)?;
        self.settle(adc);
        Ok(())
    }

    fn settle(&mut self, adc: AdcMode) {
        let ms = adc.settling_time_ms();
        if ms > 0 {
            self.delay.delay_ms(ms);
        }
    }

    /// Write a 16-bit value to a register, high byte first.
    pub fn write_register(&mut self, register: Register, value: u16) -> Result<(), Error<E>> {
        let mut buffer = [register as u8, 0x00, 0x00];
        BigEndian::write_u16(&mut buffer[1..3], value);
        trace!("write {:#x} <- {:#x}", register as u8, value);
        self.i2c.write(self.address, &buffer).map_err(Error::Bus)
    }

    /// Read a 16-bit register. Selects the register, waits for the
    /// conversion to settle, then reads two bytes.
    pub fn read_register(&mut self, register: Register) -> Result<u16, Error<E>> {
        self.i2c
            .write(self.address, &[register as u8])
            .map_err(Error::Bus)?;
        self.delay.delay_ms(READ_SETTLE_MS);
        let mut buffer = [0x00, 0x00];
        self.i2c
            .read(self.address, &mut buffer)
            .map_err(Error::Bus)?;
        let value = BigEndian::read_u16(&buffer);
        trace!("read {:#x} -> {:#x}", register as u8, value);
        Ok(value)
    }
}
