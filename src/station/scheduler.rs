use log::{debug, info, warn};

use super::Station;
use crate::app_state::{ErrorSource, OperatingState, RequestFlag, StatusBit};
use crate::config::{MEASUREMENT_PERIOD_SECONDS, POWER_ON_DELAY, RTC_CALIBRATION_TIMEOUT};
use crate::frames::{StartupFrame, UplinkFrame};
use crate::hal::{AcquisitionStatus, BitRate, Board, PowerDomain};
use crate::storage::TimestampKind;

impl<B: Board> Station<'_, B> {
    pub(super) async fn startup(&mut self) -> OperatingState {
        let delay = self.board.delay(POWER_ON_DELAY).await;
        self.check(ErrorSource::System, delay);
        self.set_clock(true).await;

        let frame = StartupFrame {
            reset_reason: self.board.reset_flags(),
            firmware: self.config.firmware,
        };
        self.board.clear_reset_flags();
        self.send(UplinkFrame::Startup(frame), BitRate::Bps600, false)
            .await;
        OperatingState::RtcCalibration
    }

    pub(super) async fn rtc_calibration(&mut self) -> OperatingState {
        if !self.flags.contains(RequestFlag::RtcCalibration) {
            return OperatingState::TaskEnd;
        }
        self.status.set(StatusBit::DailyRtcCalibration, false);

        self.board.enable(PowerDomain::Gnss).await;
        let acquisition = self.board.acquire_time(RTC_CALIBRATION_TIMEOUT).await;
        self.board.disable(PowerDomain::Gnss);

        if let Some(acquisition) = self.check(ErrorSource::Gnss, acquisition) {
            match (acquisition.status, acquisition.data) {
                (AcquisitionStatus::Success, Some(time)) => {
                    let result = self.board.set_time(&time);
                    if self.check(ErrorSource::Rtc, result).is_some() {
                        if !self.status.get(StatusBit::FirstRtcCalibration) {
                            self.persist_timestamp(TimestampKind::LastWakeUp);
                        }
                        self.status.set(StatusBit::FirstRtcCalibration, true);
                        self.status.set(StatusBit::DailyRtcCalibration, true);
                        info!(
                            "RTC calibrated to {} in {} s",
                            time, acquisition.duration_seconds
                        );
                    }
                }
                (status, _) => warn!(
                    "RTC calibration failed ({:?} after {} s)",
                    status, acquisition.duration_seconds
                ),
            }
        }

        if self.por_pending {
            // The RTC reset makes the alarm fire during the first time acquisition.
            self.flags.clear(RequestFlag::FirstSharpHourAlarm);
            self.flags.clear(RequestFlag::SharpHourAlarm);
            self.flags.clear(RequestFlag::Weather);
            self.flags.clear(RequestFlag::Measure);
            self.interrupts.discard_sharp_hour_alarm();
        }
        self.por_pending = false;
        self.flags.clear(RequestFlag::RtcCalibration);
        OperatingState::TaskEnd
    }

    pub(super) async fn task_end(&mut self) -> OperatingState {
        self.set_clock(false).await;
        if self.wind_rainfall() {
            self.arm_wind_rainfall(true);
        }
        OperatingState::TaskCheck
    }

    pub(super) async fn task_check(&mut self) -> OperatingState {
        let uptime = self.board.uptime_seconds();
        let events = self.interrupts.take();

        if events.sharp_hour_alarm {
            self.on_sharp_hour_alarm(events.sharp_hour_uptime);
        }
        if events.wind_process && self.wind_rainfall() {
            let result = self.board.process();
            self.check(ErrorSource::WindRainfall, result);
        }
        if uptime >= self.measurements_last_time + MEASUREMENT_PERIOD_SECONDS {
            self.flags.set(RequestFlag::Measure);
            self.measurements_last_time = uptime;
        }
        if self.config.bidirectional {
            self.schedule_weather(uptime);
        }

        // Cleared before processing since the wake-up is not guaranteed to be valid.
        if self.flags.take(RequestFlag::Weather) {
            self.update_additional_requests();
            if self.flags.contains(RequestFlag::ValidWakeup) {
                if self.wind_rainfall() {
                    self.arm_wind_rainfall(false);
                }
                self.persist_timestamp(TimestampKind::LastWakeUp);
                let calibration = self.board.calibrate_internal_clocks().await;
                self.check(ErrorSource::Clock, calibration);
                self.set_clock(true).await;
                return OperatingState::Weather;
            }
            debug!("Ignoring weather request on invalid wake-up");
            OperatingState::Sleep
        } else if self.flags.contains(RequestFlag::Measure) {
            OperatingState::Measure
        } else {
            OperatingState::Sleep
        }
    }

    pub(super) async fn sleep(&mut self) -> OperatingState {
        if self.flags.take(RequestFlag::Reset) {
            info!("Performing requested software reset");
            self.board.software_reset();
        }
        self.board.reload_watchdog();
        self.board.deep_sleep().await;
        self.board.reload_watchdog();
        OperatingState::TaskCheck
    }

    fn on_sharp_hour_alarm(&mut self, uptime: u32) {
        debug!("Sharp-hour alarm at uptime {} s", uptime);
        if self.config.bidirectional {
            self.flags.set(RequestFlag::SharpHourAlarm);
            self.flags.set(RequestFlag::FirstSharpHourAlarm);
            self.sharp_hour_uptime = uptime;
        } else {
            self.flags.set(RequestFlag::Weather);
            self.flags.set(RequestFlag::Monitoring);
        }
    }

    /// Full-hour report on the alarm, intermediate reports in between.
    fn schedule_weather(&mut self, uptime: u32) {
        if self.flags.take(RequestFlag::SharpHourAlarm) {
            self.flags.set(RequestFlag::Monitoring);
            self.flags.set(RequestFlag::Weather);
            self.flags.clear(RequestFlag::IntermediateWeather);
            self.weather_last_time = self.sharp_hour_uptime;
            self.weather_message_count = 1;
        } else if self.flags.contains(RequestFlag::FirstSharpHourAlarm) {
            let period = self.weather_data_period;
            if uptime >= self.weather_last_time + period.seconds()
                && self.weather_message_count < period.messages_per_hour()
            {
                self.flags
                    .assign(RequestFlag::Weather, self.gates.reporting_enabled());
                self.flags.set(RequestFlag::IntermediateWeather);
                self.weather_last_time = uptime;
                self.weather_message_count += 1;
            }
        }
    }

    /// Compare the RTC with the persisted records to validate the wake-up and
    /// raise the once-a-day requests.
    pub(crate) fn update_additional_requests(&mut self) {
        self.flags.clear(RequestFlag::ValidWakeup);
        let Some(now) = self.current_time() else {
            return;
        };
        let wake_up = self.load_timestamp(TimestampKind::LastWakeUp);
        let geoloc = self.load_timestamp(TimestampKind::LastGeoloc);
        self.status.set(StatusBit::DailyGeoloc, geoloc.status);

        if !wake_up.same_day(&now) {
            self.flags.set(RequestFlag::RtcCalibration);
            self.flags.set(RequestFlag::ValidWakeup);
        }
        // Recalibration jitter can wake the station twice in the same minute.
        if !wake_up.same_time_of_day(&now) {
            self.flags.set(RequestFlag::ValidWakeup);
        }

        let afternoon = self.config.local_time.is_afternoon(&now);
        if afternoon && !geoloc.same_day(&now) {
            self.flags.set(RequestFlag::Geoloc);
            self.flags.set(RequestFlag::ErrorStack);
        }
        if self.config.bidirectional {
            let downlink = self.load_timestamp(TimestampKind::LastDownlink);
            self.status.set(StatusBit::DailyDownlink, downlink.status);
            if afternoon && !downlink.same_day(&now) {
                self.flags.set(RequestFlag::Downlink);
            }
        }
    }

    fn arm_wind_rainfall(&mut self, enabled: bool) {
        let wind = self.board.set_wind_measurement(enabled);
        self.check(ErrorSource::WindRainfall, wind);
        let rainfall = self.board.set_rainfall_measurement(enabled);
        self.check(ErrorSource::WindRainfall, rainfall);
    }
}
