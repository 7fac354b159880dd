use log::{debug, info};

use super::Station;
use crate::app_state::{ErrorCode, ErrorSource, OperatingState, RequestFlag, StatusBit};
use crate::config::GEOLOC_TIMEOUT;
use crate::frames::{
    ErrorStackFrame, GeolocFrame, GeolocTimeoutFrame, MonitoringFrame, UplinkFrame, WeatherFrame,
};
use crate::hal::{AcquisitionStatus, AnalogChannel, BitRate, Board, PowerDomain};
use crate::storage::{ChannelId, TimestampKind, WindReport};

const ANALOG_CHANNELS: [(AnalogChannel, ChannelId); 5] = [
    (AnalogChannel::McuVoltage, ChannelId::McuVoltage),
    (AnalogChannel::McuTemperature, ChannelId::McuTemperature),
    (AnalogChannel::SourceVoltage, ChannelId::SourceVoltage),
    (AnalogChannel::SupercapVoltage, ChannelId::SupercapVoltage),
    (AnalogChannel::Light, ChannelId::Light),
];

impl<B: Board> Station<'_, B> {
    pub(super) async fn measure(&mut self) -> OperatingState {
        // The light sensor is read through the sensors domain as well.
        self.board.enable(PowerDomain::Analog).await;
        self.board.enable(PowerDomain::Sensors).await;

        for (channel, id) in ANALOG_CHANNELS {
            let sample = self.board.convert(channel).await;
            if let Some(value) = self.check(ErrorSource::Analog, sample) {
                self.measurements.add_sample(id, value);
                if id == ChannelId::SupercapVoltage {
                    self.gates.update(value);
                }
            }
        }
        self.board.disable(PowerDomain::Analog);

        let pcb = self.board.pcb_climate().await;
        if let Some(reading) = self.check(ErrorSource::PcbSensor, pcb) {
            self.measurements
                .add_sample(ChannelId::PcbTemperature, reading.temperature_tenth_degrees / 10);
            self.measurements
                .add_sample(ChannelId::PcbHumidity, reading.humidity_percent);
        }
        let ambient = self.board.ambient_climate().await;
        if let Some(reading) = self.check(ErrorSource::AmbientSensor, ambient) {
            self.measurements.add_sample(
                ChannelId::AmbientTemperature,
                reading.temperature_tenth_degrees / 10,
            );
            self.measurements
                .add_sample(ChannelId::AmbientHumidity, reading.humidity_percent);
        }
        let pressure = self.board.pressure_pa().await;
        if let Some(pressure) = self.check(ErrorSource::PressureSensor, pressure) {
            self.measurements.add_sample(ChannelId::Pressure, pressure);
        }
        let uv = self.board.uv_index().await;
        if let Some(uv) = self.check(ErrorSource::UvSensor, uv) {
            self.measurements.add_sample(ChannelId::UvIndex, uv);
        }
        self.board.disable(PowerDomain::Sensors);

        debug!(
            "Measured {} samples per channel",
            self.measurements.channel(ChannelId::SupercapVoltage).sample_count()
        );
        self.flags.clear(RequestFlag::Measure);
        OperatingState::TaskCheck
    }

    pub(super) async fn weather(&mut self) -> OperatingState {
        let report = self.measurements.weather_report();
        self.monitoring = self.measurements.monitoring_report();
        let wind = self.wind_rainfall().then(|| self.read_wind());
        self.reset_measurements();

        let frame = WeatherFrame::from_report(&report, wind.as_ref(), self.config.mode, &mut self.errors);
        let bit_rate = if self.config.bidirectional && self.flags.contains(RequestFlag::IntermediateWeather) {
            BitRate::Bps600
        } else {
            BitRate::Bps100
        };
        let bidirectional = self.config.bidirectional && self.flags.contains(RequestFlag::Downlink);
        self.send(UplinkFrame::Weather(frame), bit_rate, bidirectional)
            .await;
        OperatingState::Monitoring
    }

    pub(super) async fn monitoring(&mut self) -> OperatingState {
        if self.flags.contains(RequestFlag::Monitoring) {
            let frame = MonitoringFrame::from_report(&self.monitoring, self.status.bits(), &mut self.errors);
            self.send(UplinkFrame::Monitoring(frame), BitRate::Bps600, false)
                .await;
            self.flags.clear(RequestFlag::Monitoring);
        }
        OperatingState::Geoloc
    }

    pub(super) async fn geoloc(&mut self) -> OperatingState {
        if !self.flags.contains(RequestFlag::Geoloc) {
            return OperatingState::ErrorStack;
        }
        self.status.set(StatusBit::DailyGeoloc, false);

        self.board.enable(PowerDomain::Gnss).await;
        let acquisition = self.board.acquire_position(GEOLOC_TIMEOUT).await;
        self.board.disable(PowerDomain::Gnss);

        let frame = match self.check(ErrorSource::Gnss, acquisition) {
            Some(acquisition) => match (acquisition.status, acquisition.data) {
                (AcquisitionStatus::Success, Some(position)) => {
                    info!("Position fixed in {} s", acquisition.duration_seconds);
                    self.status.set(StatusBit::DailyGeoloc, true);
                    UplinkFrame::Geoloc(GeolocFrame::new(position, acquisition.duration_seconds))
                }
                (status, _) => UplinkFrame::GeolocTimeout(GeolocTimeoutFrame::new(
                    status,
                    acquisition.duration_seconds,
                )),
            },
            None => UplinkFrame::GeolocTimeout(GeolocTimeoutFrame::new(AcquisitionStatus::Failure, 0)),
        };
        self.send(frame, BitRate::Bps100, false).await;
        self.persist_timestamp(TimestampKind::LastGeoloc);
        self.flags.clear(RequestFlag::Geoloc);
        OperatingState::ErrorStack
    }

    pub(super) async fn error_stack(&mut self) -> OperatingState {
        if !self.flags.contains(RequestFlag::ErrorStack) {
            return OperatingState::RtcCalibration;
        }
        while let Some(status) = self.board.take_library_error() {
            self.errors
                .push(ErrorCode::new(ErrorSource::RadioLibrary, status));
        }
        if !self.errors.is_empty() {
            let frame = ErrorStackFrame::from_stack(&self.errors);
            if self
                .send(UplinkFrame::ErrorStack(frame), BitRate::Bps600, false)
                .await
            {
                self.errors.clear();
            }
        }
        self.flags.clear(RequestFlag::ErrorStack);
        OperatingState::RtcCalibration
    }

    fn read_wind(&mut self) -> WindReport {
        let speed = self.board.wind_speed();
        let speed = self.check(ErrorSource::WindRainfall, speed);
        let direction = self.board.wind_direction();
        let direction = self.check(ErrorSource::WindRainfall, direction).flatten();
        let rainfall = self.board.rainfall_um();
        WindReport {
            average_speed_mh: speed.map(|s| s.average_mh),
            peak_speed_mh: speed.map(|s| s.peak_mh),
            direction_degrees: direction,
            rainfall_um: self.check(ErrorSource::WindRainfall, rainfall),
        }
    }

    fn reset_measurements(&mut self) {
        self.measurements.reset();
        if self.wind_rainfall() {
            self.board.reset_measurements();
        }
    }
}
