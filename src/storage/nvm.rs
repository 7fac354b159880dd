//! Fixed layout of the EEPROM and typed access to the records it holds.

use crate::config::WeatherDataPeriod;
use crate::hal::{HalError, NonVolatileMemory, RtcTime};

pub const RADIO_ID_ADDRESS: u16 = 0;
pub const RADIO_ID_SIZE: u16 = 4;
pub const RADIO_KEY_ADDRESS: u16 = RADIO_ID_ADDRESS + RADIO_ID_SIZE;
pub const RADIO_KEY_SIZE: u16 = 16;
/// Opaque data owned by the radio endpoint library (sequence number, ...).
pub const RADIO_LIB_DATA_ADDRESS: u16 = RADIO_KEY_ADDRESS + RADIO_KEY_SIZE;
pub const RADIO_LIB_DATA_SIZE: u16 = 6;
/// year (2), month, date, hours, minutes
pub const LAST_WAKE_UP_ADDRESS: u16 = RADIO_LIB_DATA_ADDRESS + RADIO_LIB_DATA_SIZE;
/// year (2), month, date, status
pub const LAST_GEOLOC_ADDRESS: u16 = LAST_WAKE_UP_ADDRESS + 6;
/// year (2), month, date, status
pub const LAST_DOWNLINK_ADDRESS: u16 = LAST_GEOLOC_ADDRESS + 5;
pub const WEATHER_DATA_PERIOD_ADDRESS: u16 = LAST_DOWNLINK_ADDRESS + 5;

pub const NVM_USED_SIZE: usize = WEATHER_DATA_PERIOD_ADDRESS as usize + 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampKind {
    LastWakeUp,
    LastGeoloc,
    LastDownlink,
}

impl TimestampKind {
    const fn address(self) -> u16 {
        match self {
            Self::LastWakeUp => LAST_WAKE_UP_ADDRESS,
            Self::LastGeoloc => LAST_GEOLOC_ADDRESS,
            Self::LastDownlink => LAST_DOWNLINK_ADDRESS,
        }
    }

    /// The wake-up record stores a time of day, the others a status bit.
    const fn has_time_of_day(self) -> bool {
        matches!(self, Self::LastWakeUp)
    }
}

/// Date of the last occurrence of an event.
///
/// `hours`/`minutes` are only persisted for [`TimestampKind::LastWakeUp`],
/// `status` only for the other kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimestampRecord {
    pub year: u16,
    pub month: u8,
    pub date: u8,
    pub hours: u8,
    pub minutes: u8,
    pub status: bool,
}

impl TimestampRecord {
    pub fn from_time(time: &RtcTime, status: bool) -> Self {
        Self {
            year: time.year,
            month: time.month,
            date: time.date,
            hours: time.hours,
            minutes: time.minutes,
            status,
        }
    }

    pub fn same_day(&self, time: &RtcTime) -> bool {
        self.year == time.year && self.month == time.month && self.date == time.date
    }

    pub fn same_time_of_day(&self, time: &RtcTime) -> bool {
        self.hours == time.hours && self.minutes == time.minutes
    }
}

/// Station records on top of a byte-addressed memory.
pub trait StationNvm: NonVolatileMemory {
    fn load_timestamp(&mut self, kind: TimestampKind) -> Result<TimestampRecord, HalError> {
        let base = kind.address();
        let year = u16::from_be_bytes([self.read_byte(base)?, self.read_byte(base + 1)?]);
        let month = self.read_byte(base + 2)?;
        let date = self.read_byte(base + 3)?;
        let mut record = TimestampRecord {
            year,
            month,
            date,
            ..Default::default()
        };
        if kind.has_time_of_day() {
            record.hours = self.read_byte(base + 4)?;
            record.minutes = self.read_byte(base + 5)?;
        } else {
            record.status = self.read_byte(base + 4)? & 0x01 != 0;
        }
        Ok(record)
    }

    fn store_timestamp(&mut self, kind: TimestampKind, record: &TimestampRecord) -> Result<(), HalError> {
        let base = kind.address();
        let [year_msb, year_lsb] = record.year.to_be_bytes();
        self.write_byte(base, year_msb)?;
        self.write_byte(base + 1, year_lsb)?;
        self.write_byte(base + 2, record.month)?;
        self.write_byte(base + 3, record.date)?;
        if kind.has_time_of_day() {
            self.write_byte(base + 4, record.hours)?;
            self.write_byte(base + 5, record.minutes)?;
        } else {
            self.write_byte(base + 4, u8::from(record.status))?;
        }
        Ok(())
    }

    /// Raw selector byte; range checking is left to the caller.
    fn load_weather_data_period(&mut self) -> Result<u8, HalError> {
        self.read_byte(WEATHER_DATA_PERIOD_ADDRESS)
    }

    fn store_weather_data_period(&mut self, period: WeatherDataPeriod) -> Result<(), HalError> {
        self.write_byte(WEATHER_DATA_PERIOD_ADDRESS, period as u8)
    }

    /// Least significant byte of the radio identifier.
    fn device_id_last_byte(&mut self) -> Result<u8, HalError> {
        self.read_byte(RADIO_ID_ADDRESS + RADIO_ID_SIZE - 1)
    }

    /// Per-device second at which the sharp-hour alarm fires, spreading the
    /// fleet's hourly uplinks over a minute.
    fn sharp_hour_alarm_second(&mut self) -> Result<u8, HalError> {
        Ok(self.device_id_last_byte()? % 60)
    }
}

impl<T: NonVolatileMemory + ?Sized> StationNvm for T {}
