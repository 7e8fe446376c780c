use embedded_hal::blocking::delay::DelayMs;
use embedded_hal_mock::i2c::{Mock as I2cMock, Transaction as I2cTransaction};
use ina219::{AdcMode, DEFAULT_ADDRESS, INA219};

#[derive(Default)]
struct RecordingDelay {
    waits: Vec<u8>,
}

impl DelayMs<u8> for RecordingDelay {
    fn delay_ms(&mut self, ms: u8) {
        self.waits.push(ms);
    }
}

fn read_modify_write(current: u16, updated: u16) -> Vec<I2cTransaction> {
    let current = current.to_be_bytes();
    let updated = updated.to_be_bytes();
    vec![
        I2cTransaction::write(DEFAULT_ADDRESS, vec![0x00]),
        I2cTransaction::read(DEFAULT_ADDRESS, current.to_vec()),
        I2cTransaction::write(DEFAULT_ADDRESS, vec![0x00, updated[0], updated[1]]),
    ]
}

#[test]
fn shunt_averaged_keeps_bus_adc() {
    // Arrange
    let expectations = read_modify_write(0x399F, 0x39FF);
    let i2c = I2cMock::new(&expectations);
    let mut ina219 = INA219::new(i2c, RecordingDelay::default(), DEFAULT_ADDRESS);

    // Act
    ina219.shunt_averaged().expect("configuration to be written");

    // Assert
    let (mut i2c, delay) = ina219.release();
    assert_eq!(delay.waits, vec![1, 69]);
    i2c.done();
}

#[test]
fn bus_averaged_keeps_shunt_adc() {
    // Arrange
    let expectations = read_modify_write(0x399F, 0x3F9F);
    let i2c = I2cMock::new(&expectations);
    let mut ina219 = INA219::new(i2c, RecordingDelay::default(), DEFAULT_ADDRESS);

    // Act
    ina219.bus_averaged().expect("configuration to be written");

    // Assert
    let (mut i2c, delay) = ina219.release();
    assert_eq!(delay.waits, vec![1, 69]);
    i2c.done();
}

#[test]
fn shunt_single_sample_keeps_bus_averaging() {
    // Arrange
    let expectations = read_modify_write(0x3FFF, 0x3F9F);
    let i2c = I2cMock::new(&expectations);
    let mut ina219 = INA219::new(i2c, RecordingDelay::default(), DEFAULT_ADDRESS);

    // Act
    ina219
        .shunt_single_sample()
        .expect("configuration to be written");

    // Assert
    let (mut i2c, delay) = ina219.release();
    assert_eq!(delay.waits, vec![1]);
    i2c.done();
}

#[test]
fn bus_single_sample_keeps_shunt_averaging() {
    // Arrange
    let expectations = read_modify_write(0x3FFF, 0x39FF);
    let i2c = I2cMock::new(&expectations);
    let mut ina219 = INA219::new(i2c, RecordingDelay::default(), DEFAULT_ADDRESS);

    // Act
    ina219
        .bus_single_sample()
        .expect("configuration to be written");

    // Assert
    let (mut i2c, delay) = ina219.release();
    assert_eq!(delay.waits, vec![1]);
    i2c.done();
}

#[test]
fn toggles_preserve_gain_and_range() {
    // Arrange
    // 16V, gain /1, as left by the 16V/400mA preset
    let mut expectations = read_modify_write(0x019F, 0x01FF);
    expectations.extend(read_modify_write(0x01FF, 0x07FF));
    let i2c = I2cMock::new(&expectations);
    let mut ina219 = INA219::new(i2c, RecordingDelay::default(), DEFAULT_ADDRESS);

    // Act
    ina219.shunt_averaged().expect("configuration to be written");
    ina219.bus_averaged().expect("configuration to be written");

    // Assert
    let (mut i2c, delay) = ina219.release();
    assert_eq!(delay.waits, vec![1, 69, 1, 69]);
    i2c.done();
}

#[test]
fn set_shunt_adc_waits_for_average() {
    // Arrange
    let expectations = read_modify_write(0x399F, 0x39DF);
    let i2c = I2cMock::new(&expectations);
    let mut ina219 = INA219::new(i2c, RecordingDelay::default(), DEFAULT_ADDRESS);

    // Act
    ina219
        .set_shunt_adc(AdcMode::Samples8)
        .expect("configuration to be written");

    // Assert
    let (mut i2c, delay) = ina219.release();
    assert_eq!(delay.waits, vec![1, 5]);
    i2c.done();
}

#[test]
fn set_bus_adc_lower_resolution() {
    // Arrange
    let expectations = read_modify_write(0x399F, 0x381F);
    let i2c = I2cMock::new(&expectations);
    let mut ina219 = INA219::new(i2c, RecordingDelay::default(), DEFAULT_ADDRESS);

    // Act
    ina219
        .set_bus_adc(AdcMode::Bits9)
        .expect("configuration to be written");

    // Assert
    let (mut i2c, delay) = ina219.release();
    assert_eq!(delay.waits, vec![1]);
    i2c.done();
}
