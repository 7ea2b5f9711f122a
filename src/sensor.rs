//! Air quality readings served once the device is online.
//!
//! The APC1 sensor exposes each measurement as a big-endian register value;
//! [`CHANNELS`] names them and says how to scale the raw number. [`Apc1`]
//! reads them over any `embedded-hal` I2C bus.

use embedded_hal::i2c::{Error as _, I2c};
use log::warn;
use serde::Serialize;
use std::fmt;

/// One APC1 measurement channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Channel {
    pub name: &'static str,
    /// First register of the value.
    pub register: u8,
    /// Value width in bytes.
    pub width: usize,
    /// Raw value is divided by this.
    pub divisor: u32,
    pub unit: &'static str,
    pub description: &'static str,
}

impl Channel {
    const fn new(
        name: &'static str,
        register: u8,
        width: usize,
        divisor: u32,
        unit: &'static str,
        description: &'static str,
    ) -> Self {
        Self {
            name,
            register,
            width,
            divisor,
            unit,
            description,
        }
    }

    /// Scale a raw register value.
    pub fn scale(&self, raw: u32) -> f64 {
        f64::from(raw) / f64::from(self.divisor)
    }

    /// Decode the big-endian register bytes read for this channel.
    pub fn decode(&self, bytes: &[u8]) -> Result<Reading, SensorError> {
        if bytes.len() != self.width {
            return Err(SensorError::ShortRead {
                channel: self.name,
                expected: self.width,
                got: bytes.len(),
            });
        }
        let raw = bytes.iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b));
        Ok(self.reading(raw))
    }

    fn reading(&self, raw: u32) -> Reading {
        Reading {
            name: self.name,
            value: self.scale(raw),
            unit: self.unit,
            description: self.description,
        }
    }
}

/// APC1 channels in register order.
pub const CHANNELS: [Channel; 10] = [
    Channel::new("PM1.0", 0x04, 2, 1, "ug/m3", "PM1.0 Mass Concentration"),
    Channel::new("PM2.5", 0x06, 2, 1, "ug/m3", "PM2.5 Mass Concentration"),
    Channel::new("PM10", 0x08, 2, 1, "ug/m3", "PM10 Mass Concentration"),
    Channel::new("TVOC", 0x1C, 2, 1, "ppb", "TVOC output"),
    Channel::new("eCO2", 0x1E, 2, 1, "ppm", "Output in ppm CO2 equivalents"),
    Channel::new("T-comp", 0x22, 2, 10, "C", "Compensated Temperature"),
    Channel::new("RH-comp", 0x24, 2, 10, "%", "Compensated Relative Humidity"),
    Channel::new("T-raw", 0x26, 2, 10, "C", "Raw Temperature"),
    Channel::new("RH-raw", 0x28, 2, 10, "%", "Raw Relative Humidity"),
    Channel::new("AQI", 0x3A, 1, 1, "", "AQI according to TVOC value"),
];

/// Default I2C address of the APC1.
pub const APC1_I2C_ADDR: u8 = 0x12;

/// Look up a channel by name.
pub fn channel(name: &str) -> Result<&'static Channel, SensorError> {
    CHANNELS
        .iter()
        .find(|c| c.name == name)
        .ok_or_else(|| SensorError::UnknownChannel(name.to_string()))
}

/// One scaled measurement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    pub name: &'static str,
    pub value: f64,
    pub unit: &'static str,
    pub description: &'static str,
}

/// Source of current readings.
pub trait SensorSource {
    /// Read every channel, in [`CHANNELS`] order.
    fn read_all(&mut self) -> Result<Vec<Reading>, SensorError>;
}

/// APC1 on an I2C bus.
pub struct Apc1<I> {
    i2c: I,
    address: u8,
}

impl<I: I2c> Apc1<I> {
    /// Sensor at the default address [`APC1_I2C_ADDR`].
    pub fn new(i2c: I) -> Self {
        Self::with_address(i2c, APC1_I2C_ADDR)
    }

    pub fn with_address(i2c: I, address: u8) -> Self {
        Self { i2c, address }
    }

    /// Read and decode one channel.
    pub fn read(&mut self, channel: &Channel) -> Result<Reading, SensorError> {
        let mut bytes = vec![0u8; channel.width];
        self.i2c
            .write_read(self.address, &[channel.register], &mut bytes)
            .map_err(|e| {
                warn!("APC1 read of {} failed: {:?}", channel.name, e);
                SensorError::Bus(format!("{}: {:?}", channel.name, e.kind()))
            })?;
        channel.decode(&bytes)
    }

    /// Read a channel by name.
    pub fn read_named(&mut self, name: &str) -> Result<Reading, SensorError> {
        self.read(channel(name)?)
    }

    pub fn release(self) -> I {
        self.i2c
    }
}

impl<I: I2c> SensorSource for Apc1<I> {
    fn read_all(&mut self) -> Result<Vec<Reading>, SensorError> {
        CHANNELS.iter().map(|ch| self.read(ch)).collect()
    }
}

/// Readings from fixed raw register values, for host runs and tests.
#[derive(Debug, Clone)]
pub struct FixedReadings {
    raw: [u32; CHANNELS.len()],
}

impl FixedReadings {
    /// Raw values in [`CHANNELS`] order.
    pub fn new(raw: [u32; CHANNELS.len()]) -> Self {
        Self { raw }
    }

    /// Plausible indoor values.
    pub fn indoor() -> Self {
        Self::new([4, 7, 9, 120, 560, 231, 452, 248, 401, 1])
    }
}

impl SensorSource for FixedReadings {
    fn read_all(&mut self) -> Result<Vec<Reading>, SensorError> {
        Ok(CHANNELS
            .iter()
            .zip(self.raw)
            .map(|(ch, raw)| ch.reading(raw))
            .collect())
    }
}

/// Sensor errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SensorError {
    /// No channel with this name.
    UnknownChannel(String),
    /// Fewer or more bytes than the channel width.
    ShortRead {
        channel: &'static str,
        expected: usize,
        got: usize,
    },
    /// Bus transfer failed.
    Bus(String),
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownChannel(name) => write!(f, "unknown channel '{}'", name),
            Self::ShortRead {
                channel,
                expected,
                got,
            } => write!(f, "{}: expected {} bytes, got {}", channel, expected, got),
            Self::Bus(msg) => write!(f, "sensor bus error: {}", msg),
        }
    }
}

impl std::error::Error for SensorError {}
