//! Station configuration and fixed timing constants.

use embassy_time::Duration;
use serde::{Deserialize, Serialize};
use thiserror_no_std::Error;

use crate::frames::CodecError;
use crate::hal::RtcTime;

/// Supply stabilisation delay before the first radio transmission.
pub const POWER_ON_DELAY: Duration = Duration::from_millis(7000);
pub const RTC_CALIBRATION_TIMEOUT: Duration = Duration::from_secs(180);
pub const GEOLOC_TIMEOUT: Duration = Duration::from_secs(120);

pub const MEASUREMENT_PERIOD_SECONDS: u32 = 60;

/// One sample per minute over one hour.
pub const MEASUREMENT_BUFFER_SIZE: usize = 60;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration blob is invalid: {0:?}")]
    Decode(postcard::Error),
    #[error("configuration does not fit the output buffer: {0:?}")]
    Encode(postcard::Error),
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StationMode {
    /// Temperature, humidity, light, UV and pressure only.
    Standard,
    /// Additional anemometer, wind vane and rain gauge.
    #[default]
    WindRainfall,
}

impl StationMode {
    /// Value of the station-mode bit in the status byte.
    pub const fn status_bit(self) -> bool {
        matches!(self, Self::WindRainfall)
    }
}

/// UTC offsets used to decide whether it is afternoon locally.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalTimeConfig {
    pub utc_offset_winter: i8,
    pub utc_offset_summer: i8,
    /// Winter time applies while `month <= winter_last_month`...
    pub winter_last_month: u8,
    /// ...or `month >= winter_first_month`.
    pub winter_first_month: u8,
    pub afternoon_hour_threshold: u8,
}

impl Default for LocalTimeConfig {
    fn default() -> Self {
        Self {
            utc_offset_winter: 1,
            utc_offset_summer: 2,
            winter_last_month: 3,
            winter_first_month: 11,
            afternoon_hour_threshold: 12,
        }
    }
}

impl LocalTimeConfig {
    pub fn utc_offset(&self, month: u8) -> i8 {
        if month > self.winter_last_month && month < self.winter_first_month {
            self.utc_offset_summer
        } else {
            self.utc_offset_winter
        }
    }

    pub fn local_hour(&self, time: &RtcTime) -> u8 {
        let hour = i16::from(time.hours) + i16::from(self.utc_offset(time.month));
        hour.rem_euclid(24) as u8
    }

    pub fn is_afternoon(&self, time: &RtcTime) -> bool {
        self.local_hour(time) >= self.afternoon_hour_threshold
    }
}

/// Firmware identification sent in the startup frame.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FirmwareVersion {
    pub major: u8,
    pub minor: u8,
    pub commit_index: u8,
    /// Abbreviated commit hash, 28 bits on air.
    pub commit_id: u32,
    pub dirty: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct StationConfig {
    pub mode: StationMode,
    /// Enables downlinks, the configurable weather period and intermediate reports.
    pub bidirectional: bool,
    pub local_time: LocalTimeConfig,
    pub firmware: FirmwareVersion,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            mode: StationMode::WindRainfall,
            bidirectional: true,
            local_time: LocalTimeConfig::default(),
            firmware: FirmwareVersion::default(),
        }
    }
}

impl StationConfig {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        postcard::from_bytes(bytes).map_err(ConfigError::Decode)
    }

    /// Serialise into `buffer`, returning the used prefix.
    pub fn to_slice<'b>(&self, buffer: &'b mut [u8]) -> Result<&'b mut [u8], ConfigError> {
        postcard::to_slice(self, buffer).map_err(ConfigError::Encode)
    }
}

/// Selectable interval between weather reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum WeatherDataPeriod {
    #[default]
    Minutes60 = 0,
    Minutes30 = 1,
    Minutes20 = 2,
    Minutes15 = 3,
    Minutes12 = 4,
    Minutes10 = 5,
}

impl WeatherDataPeriod {
    pub const fn seconds(self) -> u32 {
        match self {
            Self::Minutes60 => 3600,
            Self::Minutes30 => 1800,
            Self::Minutes20 => 1200,
            Self::Minutes15 => 900,
            Self::Minutes12 => 720,
            Self::Minutes10 => 600,
        }
    }

    /// Number of weather messages fitting in one hour.
    pub const fn messages_per_hour(self) -> u32 {
        3600 / self.seconds()
    }
}

impl TryFrom<u8> for WeatherDataPeriod {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::Minutes60,
            1 => Self::Minutes30,
            2 => Self::Minutes20,
            3 => Self::Minutes15,
            4 => Self::Minutes12,
            5 => Self::Minutes10,
            other => return Err(CodecError::PeriodOutOfRange(other)),
        })
    }
}
