use core::fmt::{self, Display};

/// Errors returned by the driver, generic over the I2C bus error.
#[derive(Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// The I2C transaction failed. The device may be missing or not acknowledging.
    Bus(E),
    /// The requested calibration cannot be programmed into the device.
    Configuration(ConfigurationError),
}

/// Reasons a custom calibration is rejected before anything is written.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigurationError {
    /// Maximum expected current must be finite and greater than zero.
    NonPositiveExpectedCurrent,
    /// Shunt resistance must be finite and greater than zero.
    NonPositiveShuntResistance,
    /// Maximum shunt voltage must be finite and greater than zero.
    NonPositiveShuntVoltage,
    /// The current LSB could not be rounded to a representable decimal value.
    LsbNotConvergent,
    /// The computed calibration value does not fit the 16-bit register.
    CalibrationOutOfRange,
}

impl<E> From<ConfigurationError> for Error<E> {
    fn from(error: ConfigurationError) -> Self {
        Error::Configuration(error)
    }
}

impl<E: Display> Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Bus(e) => write!(f, "bus error: {}", e),
            Error::Configuration(e) => write!(f, "invalid calibration: {}", e),
        }
    }
}

impl Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigurationError::NonPositiveExpectedCurrent => {
                write!(f, "maximum expected current must be positive")
            }
            ConfigurationError::NonPositiveShuntResistance => {
                write!(f, "shunt resistance must be positive")
            }
            ConfigurationError::NonPositiveShuntVoltage => {
                write!(f, "maximum shunt voltage must be positive")
            }
            ConfigurationError::LsbNotConvergent => {
                write!(f, "current LSB cannot be rounded to a decimal value")
            }
            ConfigurationError::CalibrationOutOfRange => {
                write!(f, "calibration value does not fit in 16 bits")
            }
        }
    }
}
