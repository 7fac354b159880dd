//! Duty-cycle state machine of the weather station.
//!
//! The station owns all mutable state. Interrupt handlers only touch the
//! shared [`InterruptContext`], which is drained once per task check.

mod radio;
mod scheduler;
mod tasks;

#[cfg(test)]
mod tests;

use log::{debug, info, warn};

use crate::app_state::{
    ErrorSource, ErrorStack, InterruptContext, OperatingState, RequestFlag, RequestFlags, StatusBit,
    StatusRegister,
};
use crate::config::{StationConfig, StationMode, WeatherDataPeriod};
use crate::hal::{Board, HalError, Oscillator, PowerDomain, RtcTime};
use crate::power::PowerGates;
use crate::storage::{Measurements, MonitoringReport, StationNvm, TimestampKind, TimestampRecord};

pub struct Station<'a, B: Board> {
    board: B,
    interrupts: &'a InterruptContext,
    config: StationConfig,
    state: OperatingState,
    status: StatusRegister,
    flags: RequestFlags,
    gates: PowerGates,
    measurements: Measurements,
    errors: ErrorStack,
    /// Reduced at weather time, sent by the monitoring task.
    monitoring: MonitoringReport,
    measurements_last_time: u32,
    sharp_hour_uptime: u32,
    weather_data_period: WeatherDataPeriod,
    weather_message_count: u32,
    weather_last_time: u32,
    /// Set until the first RTC calibration after boot.
    por_pending: bool,
}

impl<'a, B: Board> Station<'a, B> {
    pub fn new(board: B, interrupts: &'a InterruptContext, config: StationConfig) -> Self {
        let mut station = Self {
            board,
            interrupts,
            config,
            state: OperatingState::Startup,
            status: StatusRegister::default(),
            flags: RequestFlags::default(),
            gates: PowerGates::default(),
            measurements: Measurements::new(),
            errors: ErrorStack::new(),
            monitoring: MonitoringReport::default(),
            measurements_last_time: 0,
            sharp_hour_uptime: 0,
            weather_data_period: WeatherDataPeriod::default(),
            weather_message_count: 0,
            weather_last_time: 0,
            por_pending: true,
        };
        station.flags.set(RequestFlag::RtcCalibration);
        station
            .status
            .set(StatusBit::StationMode, config.mode.status_bit());
        if config.bidirectional {
            station.load_weather_data_period();
        }
        station.start_sharp_hour_alarm();
        info!(
            "Station initialised: {:?}, bidirectional {}, weather period {} s",
            config.mode,
            config.bidirectional,
            station.weather_data_period.seconds()
        );
        station
    }

    /// Run one state of the machine.
    pub async fn step(&mut self) {
        self.board.reload_watchdog();
        let next = match self.state {
            OperatingState::Startup => self.startup().await,
            OperatingState::RtcCalibration => self.rtc_calibration().await,
            OperatingState::TaskEnd => self.task_end().await,
            OperatingState::TaskCheck => self.task_check().await,
            OperatingState::Measure => self.measure().await,
            OperatingState::Weather => self.weather().await,
            OperatingState::Monitoring => self.monitoring().await,
            OperatingState::Geoloc => self.geoloc().await,
            OperatingState::ErrorStack => self.error_stack().await,
            OperatingState::Sleep => self.sleep().await,
        };
        if next != self.state {
            debug!("{:?} -> {:?}", self.state, next);
        }
        self.state = next;
    }

    pub async fn run(&mut self) -> ! {
        loop {
            self.step().await;
        }
    }

    pub fn state(&self) -> OperatingState {
        self.state
    }

    pub fn status(&self) -> StatusRegister {
        self.status
    }

    pub fn flags(&self) -> RequestFlags {
        self.flags
    }

    pub fn gates(&self) -> &PowerGates {
        &self.gates
    }

    pub fn measurements(&self) -> &Measurements {
        &self.measurements
    }

    pub fn errors(&self) -> &ErrorStack {
        &self.errors
    }

    pub fn weather_data_period(&self) -> WeatherDataPeriod {
        self.weather_data_period
    }

    pub fn config(&self) -> &StationConfig {
        &self.config
    }

    pub fn board(&self) -> &B {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut B {
        &mut self.board
    }

    fn wind_rainfall(&self) -> bool {
        self.config.mode == StationMode::WindRainfall
    }

    /// Stack a failed collaborator call and keep going without its value.
    fn check<T>(&mut self, source: ErrorSource, result: Result<T, HalError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(error) => {
                self.errors.push_hal(source, error);
                None
            }
        }
    }

    fn load_weather_data_period(&mut self) {
        let stored = self.board.load_weather_data_period();
        let period = match self.check(ErrorSource::Nvm, stored) {
            Some(raw) => WeatherDataPeriod::try_from(raw).unwrap_or_else(|error| {
                warn!("Stored {}, using the default period", error);
                WeatherDataPeriod::default()
            }),
            None => WeatherDataPeriod::default(),
        };
        self.set_weather_data_period(period);
    }

    fn set_weather_data_period(&mut self, period: WeatherDataPeriod) {
        self.weather_data_period = period;
        let result = self.board.store_weather_data_period(period);
        self.check(ErrorSource::Nvm, result);
    }

    fn start_sharp_hour_alarm(&mut self) {
        let second = self.board.sharp_hour_alarm_second();
        let second = self.check(ErrorSource::Nvm, second).unwrap_or(0);
        let result = self.board.start_sharp_hour_alarm(second);
        self.check(ErrorSource::Rtc, result);
        debug!("Sharp-hour alarm at second {}", second);
    }

    fn current_time(&mut self) -> Option<RtcTime> {
        let time = self.board.time();
        self.check(ErrorSource::Rtc, time)
    }

    fn load_timestamp(&mut self, kind: TimestampKind) -> TimestampRecord {
        let record = self.board.load_timestamp(kind);
        self.check(ErrorSource::Nvm, record).unwrap_or_default()
    }

    /// Write the current date of `kind` along with its status bit.
    fn persist_timestamp(&mut self, kind: TimestampKind) {
        let Some(now) = self.current_time() else {
            return;
        };
        let status = match kind {
            TimestampKind::LastWakeUp => false,
            TimestampKind::LastGeoloc => self.status.get(StatusBit::DailyGeoloc),
            TimestampKind::LastDownlink => self.status.get(StatusBit::DailyDownlink),
        };
        let result = self
            .board
            .store_timestamp(kind, &TimestampRecord::from_time(&now, status));
        self.check(ErrorSource::Nvm, result);
    }

    /// Switch between the precise (TCXO) and low power clocks and refresh the
    /// clock bits of the status register.
    async fn set_clock(&mut self, precise: bool) {
        if precise {
            self.board.enable(PowerDomain::Tcxo).await;
            let result = self.board.switch_to_external_clock();
            self.check(ErrorSource::Clock, result);
        } else {
            let result = self.board.switch_to_internal_clock();
            self.check(ErrorSource::Clock, result);
            self.board.disable(PowerDomain::Tcxo);
        }
        let external = self.board.system_clock_is_external();
        self.status.set(StatusBit::ExternalClock, external);
        for (oscillator, bit) in [
            (Oscillator::Lsi, StatusBit::LsiRunning),
            (Oscillator::Lse, StatusBit::LseRunning),
        ] {
            let running = self.board.oscillator_running(oscillator);
            let running = self.check(ErrorSource::Clock, running).unwrap_or(false);
            self.status.set(bit, running);
        }
    }
}
