use super::{MeasurementChannel, ReductionPolicy};

/// Telemetered quantities, one rolling channel each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelId {
    /// °C
    AmbientTemperature,
    /// %
    AmbientHumidity,
    /// %
    Light,
    UvIndex,
    /// Pa
    Pressure,
    /// °C
    McuTemperature,
    /// °C
    PcbTemperature,
    /// %
    PcbHumidity,
    /// mV
    SourceVoltage,
    /// mV
    SupercapVoltage,
    /// mV
    McuVoltage,
}

pub const CHANNEL_COUNT: usize = 11;

impl ChannelId {
    pub const ALL: [ChannelId; CHANNEL_COUNT] = [
        Self::AmbientTemperature,
        Self::AmbientHumidity,
        Self::Light,
        Self::UvIndex,
        Self::Pressure,
        Self::McuTemperature,
        Self::PcbTemperature,
        Self::PcbHumidity,
        Self::SourceVoltage,
        Self::SupercapVoltage,
        Self::McuVoltage,
    ];

    /// Statistic used to report this quantity.
    pub const fn policy(self) -> ReductionPolicy {
        match self {
            // Lowest reading is the conservative one for frost risk.
            Self::AmbientTemperature | Self::McuTemperature | Self::PcbTemperature => {
                ReductionPolicy::Min
            }
            Self::UvIndex => ReductionPolicy::Max,
            Self::AmbientHumidity
            | Self::PcbHumidity
            | Self::Light
            | Self::Pressure
            | Self::SourceVoltage
            | Self::McuVoltage => ReductionPolicy::Median,
            Self::SupercapVoltage => ReductionPolicy::Last,
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

/// Reduced weather quantities, `None` when no sample was collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WeatherReport {
    pub ambient_temperature_degrees: Option<i32>,
    pub ambient_humidity_percent: Option<i32>,
    pub light_percent: Option<i32>,
    pub uv_index: Option<i32>,
    pub pressure_pa: Option<i32>,
}

/// Reduced internal telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MonitoringReport {
    pub mcu_temperature_degrees: Option<i32>,
    pub pcb_temperature_degrees: Option<i32>,
    pub pcb_humidity_percent: Option<i32>,
    pub source_voltage_mv: Option<i32>,
    pub supercap_voltage_mv: Option<i32>,
    pub mcu_voltage_mv: Option<i32>,
}

/// Wind and rainfall accumulated by the sensor driver since the last report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindReport {
    pub average_speed_mh: Option<u32>,
    pub peak_speed_mh: Option<u32>,
    pub direction_degrees: Option<u32>,
    pub rainfall_um: Option<u32>,
}

/// All measurement channels of the station.
#[derive(Debug, Clone, Default)]
pub struct Measurements {
    channels: [MeasurementChannel; CHANNEL_COUNT],
}

impl Measurements {
    pub const fn new() -> Self {
        Self {
            channels: [const { MeasurementChannel::new() }; CHANNEL_COUNT],
        }
    }

    pub fn add_sample(&mut self, id: ChannelId, value: i32) {
        self.channels[id.index()].add_sample(value);
    }

    pub fn channel(&self, id: ChannelId) -> &MeasurementChannel {
        &self.channels[id.index()]
    }

    /// Reduce the channel with its designated policy.
    pub fn reduce(&self, id: ChannelId) -> Option<i32> {
        id.policy().reduce(self.channel(id))
    }

    pub fn reset(&mut self) {
        self.channels.iter_mut().for_each(MeasurementChannel::reset);
    }

    pub fn weather_report(&self) -> WeatherReport {
        WeatherReport {
            ambient_temperature_degrees: self.reduce(ChannelId::AmbientTemperature),
            ambient_humidity_percent: self.reduce(ChannelId::AmbientHumidity),
            light_percent: self.reduce(ChannelId::Light),
            uv_index: self.reduce(ChannelId::UvIndex),
            pressure_pa: self.reduce(ChannelId::Pressure),
        }
    }

    pub fn monitoring_report(&self) -> MonitoringReport {
        MonitoringReport {
            mcu_temperature_degrees: self.reduce(ChannelId::McuTemperature),
            pcb_temperature_degrees: self.reduce(ChannelId::PcbTemperature),
            pcb_humidity_percent: self.reduce(ChannelId::PcbHumidity),
            source_voltage_mv: self.reduce(ChannelId::SourceVoltage),
            supercap_voltage_mv: self.reduce(ChannelId::SupercapVoltage),
            mcu_voltage_mv: self.reduce(ChannelId::McuVoltage),
        }
    }
}
