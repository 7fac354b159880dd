use super::*;
use crate::app_state::{ErrorCode, ErrorStack};
use crate::config::{FirmwareVersion, StationMode};
use crate::hal::{AcquisitionStatus, GnssPosition};
use crate::storage::{MonitoringReport, WeatherReport, WindReport};

pub const STARTUP_FRAME_SIZE: usize = 8;
pub const WEATHER_FRAME_SIZE: usize = 6;
pub const WEATHER_WIND_FRAME_SIZE: usize = 10;
pub const MONITORING_FRAME_SIZE: usize = 9;
pub const GEOLOC_FRAME_SIZE: usize = 11;
pub const GEOLOC_TIMEOUT_FRAME_SIZE: usize = 2;
pub const ERROR_STACK_FRAME_SIZE: usize = 12;

/// Error codes carried by one error stack frame.
pub const ERROR_STACK_FRAME_CODES: usize = ERROR_STACK_FRAME_SIZE / 2;

pub const RAINFALL_MAX_UM: u32 = 126_000;
/// Below this amount rainfall is sent in tenths of mm.
pub const RAINFALL_UNIT_THRESHOLD_UM: u32 = 12_700;
const RAINFALL_UNIT_MM: u8 = 0x80;

fn check_length(bytes: &[u8], expected: usize) -> Result<(), CodecError> {
    if bytes.len() < expected {
        return Err(CodecError::PayloadTooShort {
            expected,
            actual: bytes.len(),
        });
    }
    Ok(())
}

fn saturate_u8(value: u32) -> u8 {
    value.min(u32::from(u8::MAX)) as u8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartupFrame {
    pub reset_reason: u8,
    pub firmware: FirmwareVersion,
}

impl StartupFrame {
    pub fn encode(&self) -> Result<UplinkPayload, CodecError> {
        let mut writer = BitWriter::new();
        writer
            .write(u32::from(self.reset_reason), 8)?
            .write(u32::from(self.firmware.major), 8)?
            .write(u32::from(self.firmware.minor), 8)?
            .write(u32::from(self.firmware.commit_index), 8)?
            .write(self.firmware.commit_id, 28)?
            .write(u32::from(self.firmware.dirty), 4)?;
        Ok(writer.finish())
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        check_length(bytes, STARTUP_FRAME_SIZE)?;
        let mut reader = BitReader::new(bytes);
        Ok(Self {
            reset_reason: reader.read_u8(8)?,
            firmware: FirmwareVersion {
                major: reader.read_u8(8)?,
                minor: reader.read_u8(8)?,
                commit_index: reader.read_u8(8)?,
                commit_id: reader.read(28)?,
                dirty: reader.read(4)? != 0,
            },
        })
    }
}

/// Extension of the weather frame for wind and rainfall stations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindFields {
    pub average_speed_kmh: u8,
    pub peak_speed_kmh: u8,
    pub direction_two_degrees: u8,
    /// 7-bit value, bit 7 set when the unit is mm instead of tenths of mm.
    pub rainfall: u8,
}

impl WindFields {
    pub fn from_report(report: &WindReport, errors: &mut ErrorStack) -> Self {
        let speed = |mh: Option<u32>, errors: &mut ErrorStack| {
            field_or_sentinel(mh.map(|v| i64::from(v / 1000)), 8, SENTINEL_WIND, errors) as u8
        };
        Self {
            average_speed_kmh: speed(report.average_speed_mh, errors),
            peak_speed_kmh: speed(report.peak_speed_mh, errors),
            direction_two_degrees: field_or_sentinel(
                report.direction_degrees.map(|d| i64::from(d >> 1)),
                8,
                SENTINEL_WIND,
                errors,
            ) as u8,
            rainfall: report
                .rainfall_um
                .map(encode_rainfall)
                .unwrap_or(SENTINEL_RAIN as u8),
        }
    }
}

/// Rainfall byte: tenths of mm below 12.7 mm, whole mm above, rounded half up
/// and saturated at 126 mm.
pub fn encode_rainfall(rainfall_um: u32) -> u8 {
    let rainfall_um = rainfall_um.min(RAINFALL_MAX_UM);
    if rainfall_um < RAINFALL_UNIT_THRESHOLD_UM {
        saturate_u8((rainfall_um + 50) / 100).min(0x7F)
    } else {
        RAINFALL_UNIT_MM | saturate_u8((rainfall_um + 500) / 1000).min(126)
    }
}

/// Inverse of [`encode_rainfall`], `None` for the sentinel.
pub fn decode_rainfall_um(raw: u8) -> Option<u32> {
    if u32::from(raw) == SENTINEL_RAIN {
        return None;
    }
    let value = u32::from(raw & 0x7F);
    Some(if raw & RAINFALL_UNIT_MM != 0 {
        value * 1000
    } else {
        value * 100
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeatherFrame {
    /// Sign-magnitude °C.
    pub ambient_temperature: u8,
    pub ambient_humidity_percent: u8,
    pub light_percent: u8,
    pub uv_index: u8,
    pub pressure_tenth_hpa: u16,
    pub wind: Option<WindFields>,
}

impl WeatherFrame {
    /// Convert reduced values into frame fields. Wind fields are only present
    /// for [`StationMode::WindRainfall`].
    pub fn from_report(
        report: &WeatherReport,
        wind: Option<&WindReport>,
        mode: StationMode,
        errors: &mut ErrorStack,
    ) -> Self {
        let byte = |value: Option<i32>, sentinel: u32, errors: &mut ErrorStack| {
            field_or_sentinel(value.map(i64::from), 8, sentinel, errors) as u8
        };
        let wind = match mode {
            StationMode::WindRainfall => Some(WindFields::from_report(
                wind.unwrap_or(&WindReport::default()),
                errors,
            )),
            StationMode::Standard => None,
        };
        Self {
            ambient_temperature: temperature_or_sentinel(report.ambient_temperature_degrees, errors) as u8,
            ambient_humidity_percent: byte(report.ambient_humidity_percent, SENTINEL_HUMIDITY, errors),
            light_percent: byte(report.light_percent, SENTINEL_LIGHT, errors),
            uv_index: byte(report.uv_index, SENTINEL_UV_INDEX, errors),
            pressure_tenth_hpa: field_or_sentinel(
                report.pressure_pa.map(|pa| i64::from(pa / 10)),
                16,
                SENTINEL_PRESSURE,
                errors,
            ) as u16,
            wind,
        }
    }

    pub fn encode(&self) -> Result<UplinkPayload, CodecError> {
        let mut writer = BitWriter::new();
        writer
            .write(u32::from(self.ambient_temperature), 8)?
            .write(u32::from(self.ambient_humidity_percent), 8)?
            .write(u32::from(self.light_percent), 8)?
            .write(u32::from(self.uv_index), 8)?
            .write(u32::from(self.pressure_tenth_hpa), 16)?;
        if let Some(wind) = &self.wind {
            writer
                .write(u32::from(wind.average_speed_kmh), 8)?
                .write(u32::from(wind.peak_speed_kmh), 8)?
                .write(u32::from(wind.direction_two_degrees), 8)?
                .write(u32::from(wind.rainfall), 8)?;
        }
        Ok(writer.finish())
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        check_length(bytes, WEATHER_FRAME_SIZE)?;
        let mut reader = BitReader::new(bytes);
        let mut frame = Self {
            ambient_temperature: reader.read_u8(8)?,
            ambient_humidity_percent: reader.read_u8(8)?,
            light_percent: reader.read_u8(8)?,
            uv_index: reader.read_u8(8)?,
            pressure_tenth_hpa: reader.read_u16(16)?,
            wind: None,
        };
        if bytes.len() >= WEATHER_WIND_FRAME_SIZE {
            frame.wind = Some(WindFields {
                average_speed_kmh: reader.read_u8(8)?,
                peak_speed_kmh: reader.read_u8(8)?,
                direction_two_degrees: reader.read_u8(8)?,
                rainfall: reader.read_u8(8)?,
            });
        }
        Ok(frame)
    }

    pub fn ambient_temperature_degrees(&self) -> Option<i32> {
        temperature_from_field(self.ambient_temperature)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitoringFrame {
    pub mcu_temperature: u8,
    pub pcb_temperature: u8,
    pub pcb_humidity_percent: u8,
    pub source_voltage_mv: u16,
    /// 12 bits.
    pub supercap_voltage_mv: u16,
    /// 12 bits.
    pub mcu_voltage_mv: u16,
    pub status: u8,
}

impl MonitoringFrame {
    pub fn from_report(report: &MonitoringReport, status: u8, errors: &mut ErrorStack) -> Self {
        let field = |value: Option<i32>, bits: u8, sentinel: u32, errors: &mut ErrorStack| {
            field_or_sentinel(value.map(i64::from), bits, sentinel, errors)
        };
        Self {
            mcu_temperature: temperature_or_sentinel(report.mcu_temperature_degrees, errors) as u8,
            pcb_temperature: temperature_or_sentinel(report.pcb_temperature_degrees, errors) as u8,
            pcb_humidity_percent: field(report.pcb_humidity_percent, 8, SENTINEL_HUMIDITY, errors) as u8,
            source_voltage_mv: field(report.source_voltage_mv, 16, SENTINEL_ANALOG_16_BITS, errors) as u16,
            supercap_voltage_mv: field(report.supercap_voltage_mv, 12, SENTINEL_ANALOG_12_BITS, errors) as u16,
            mcu_voltage_mv: field(report.mcu_voltage_mv, 12, SENTINEL_ANALOG_12_BITS, errors) as u16,
            status,
        }
    }

    pub fn encode(&self) -> Result<UplinkPayload, CodecError> {
        let mut writer = BitWriter::new();
        writer
            .write(u32::from(self.mcu_temperature), 8)?
            .write(u32::from(self.pcb_temperature), 8)?
            .write(u32::from(self.pcb_humidity_percent), 8)?
            .write(u32::from(self.source_voltage_mv), 16)?
            .write(u32::from(self.supercap_voltage_mv), 12)?
            .write(u32::from(self.mcu_voltage_mv), 12)?
            .write(u32::from(self.status), 8)?;
        Ok(writer.finish())
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        check_length(bytes, MONITORING_FRAME_SIZE)?;
        let mut reader = BitReader::new(bytes);
        Ok(Self {
            mcu_temperature: reader.read_u8(8)?,
            pcb_temperature: reader.read_u8(8)?,
            pcb_humidity_percent: reader.read_u8(8)?,
            source_voltage_mv: reader.read_u16(16)?,
            supercap_voltage_mv: reader.read_u16(12)?,
            mcu_voltage_mv: reader.read_u16(12)?,
            status: reader.read_u8(8)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeolocFrame {
    pub position: GnssPosition,
    pub duration_seconds: u8,
}

impl GeolocFrame {
    pub fn new(position: GnssPosition, duration_seconds: u32) -> Self {
        Self {
            position,
            duration_seconds: saturate_u8(duration_seconds),
        }
    }

    pub fn encode(&self) -> Result<UplinkPayload, CodecError> {
        let p = &self.position;
        let mut writer = BitWriter::new();
        writer
            .write(u32::from(p.latitude_degrees), 8)?
            .write(u32::from(p.latitude_minutes), 6)?
            .write(p.latitude_seconds, 17)?
            .write(u32::from(p.latitude_north), 1)?
            .write(u32::from(p.longitude_degrees), 8)?
            .write(u32::from(p.longitude_minutes), 6)?
            .write(p.longitude_seconds, 17)?
            .write(u32::from(p.longitude_east), 1)?
            .write(u32::from(p.altitude_m), 16)?
            .write(u32::from(self.duration_seconds), 8)?;
        Ok(writer.finish())
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        check_length(bytes, GEOLOC_FRAME_SIZE)?;
        let mut reader = BitReader::new(bytes);
        Ok(Self {
            position: GnssPosition {
                latitude_degrees: reader.read_u8(8)?,
                latitude_minutes: reader.read_u8(6)?,
                latitude_seconds: reader.read(17)?,
                latitude_north: reader.read(1)? != 0,
                longitude_degrees: reader.read_u8(8)?,
                longitude_minutes: reader.read_u8(6)?,
                longitude_seconds: reader.read(17)?,
                longitude_east: reader.read(1)? != 0,
                altitude_m: reader.read_u16(16)?,
            },
            duration_seconds: reader.read_u8(8)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeolocTimeoutFrame {
    pub status: u8,
    pub duration_seconds: u8,
}

impl GeolocTimeoutFrame {
    pub fn new(status: AcquisitionStatus, duration_seconds: u32) -> Self {
        Self {
            status: status as u8,
            duration_seconds: saturate_u8(duration_seconds),
        }
    }

    pub fn encode(&self) -> Result<UplinkPayload, CodecError> {
        let mut writer = BitWriter::new();
        writer
            .write(u32::from(self.status), 8)?
            .write(u32::from(self.duration_seconds), 8)?;
        Ok(writer.finish())
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        check_length(bytes, GEOLOC_TIMEOUT_FRAME_SIZE)?;
        Ok(Self {
            status: bytes[0],
            duration_seconds: bytes[1],
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorStackFrame {
    pub codes: [ErrorCode; ERROR_STACK_FRAME_CODES],
}

impl ErrorStackFrame {
    /// Oldest codes of the stack, padded with [`ErrorCode::SUCCESS`]. The stack
    /// is left untouched so it survives a dropped transmission.
    pub fn from_stack(errors: &ErrorStack) -> Self {
        let mut codes = errors.iter().copied();
        Self {
            codes: core::array::from_fn(|_| codes.next().unwrap_or(ErrorCode::SUCCESS)),
        }
    }

    pub fn encode(&self) -> Result<UplinkPayload, CodecError> {
        let mut writer = BitWriter::new();
        for code in &self.codes {
            writer.write(u32::from(code.0), 16)?;
        }
        Ok(writer.finish())
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        check_length(bytes, ERROR_STACK_FRAME_SIZE)?;
        Ok(Self {
            codes: core::array::from_fn(|i| {
                ErrorCode(u16::from_be_bytes([bytes[2 * i], bytes[2 * i + 1]]))
            }),
        })
    }
}

/// Any uplink of the station.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UplinkFrame {
    Startup(StartupFrame),
    Weather(WeatherFrame),
    Monitoring(MonitoringFrame),
    Geoloc(GeolocFrame),
    GeolocTimeout(GeolocTimeoutFrame),
    ErrorStack(ErrorStackFrame),
}

impl UplinkFrame {
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Startup(_) => "startup",
            Self::Weather(_) => "weather",
            Self::Monitoring(_) => "monitoring",
            Self::Geoloc(_) => "geoloc",
            Self::GeolocTimeout(_) => "geoloc timeout",
            Self::ErrorStack(_) => "error stack",
        }
    }

    pub fn encode(&self) -> Result<UplinkPayload, CodecError> {
        match self {
            Self::Startup(frame) => frame.encode(),
            Self::Weather(frame) => frame.encode(),
            Self::Monitoring(frame) => frame.encode(),
            Self::Geoloc(frame) => frame.encode(),
            Self::GeolocTimeout(frame) => frame.encode(),
            Self::ErrorStack(frame) => frame.encode(),
        }
    }

    /// Every frame kind has a distinct length, which identifies it.
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        Ok(match bytes.len() {
            STARTUP_FRAME_SIZE => Self::Startup(StartupFrame::decode(bytes)?),
            WEATHER_FRAME_SIZE | WEATHER_WIND_FRAME_SIZE => Self::Weather(WeatherFrame::decode(bytes)?),
            MONITORING_FRAME_SIZE => Self::Monitoring(MonitoringFrame::decode(bytes)?),
            GEOLOC_FRAME_SIZE => Self::Geoloc(GeolocFrame::decode(bytes)?),
            GEOLOC_TIMEOUT_FRAME_SIZE => Self::GeolocTimeout(GeolocTimeoutFrame::decode(bytes)?),
            ERROR_STACK_FRAME_SIZE => Self::ErrorStack(ErrorStackFrame::decode(bytes)?),
            other => return Err(CodecError::UnknownLength(other)),
        })
    }
}
