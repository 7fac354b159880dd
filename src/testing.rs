//! Scripted board used by the unit tests.

use std::collections::VecDeque;
use std::vec::Vec;

use embassy_time::Duration;

use crate::hal::*;
use crate::storage::NVM_USED_SIZE;

/// Values returned in order, then `fallback` forever.
pub(crate) struct Script<T: Clone> {
    queue: VecDeque<T>,
    fallback: T,
}

impl<T: Clone> Script<T> {
    pub fn new(fallback: T) -> Self {
        Self {
            queue: VecDeque::new(),
            fallback,
        }
    }

    pub fn push(&mut self, value: T) -> &mut Self {
        self.queue.push_back(value);
        self
    }

    pub fn set_fallback(&mut self, value: T) {
        self.fallback = value;
    }

    fn next(&mut self) -> T {
        self.queue.pop_front().unwrap_or_else(|| self.fallback.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SentMessage {
    pub payload: Vec<u8>,
    pub bit_rate: BitRate,
    pub bidirectional: bool,
}

pub(crate) struct MockBoard {
    pub now: RtcTime,
    pub uptime: u32,
    pub rtc_fails: bool,
    pub alarm_second: Option<u8>,
    pub nvm: [u8; NVM_USED_SIZE],
    pub mcu_voltage: Script<Result<i32, HalError>>,
    pub mcu_temperature: Script<Result<i32, HalError>>,
    pub source_voltage: Script<Result<i32, HalError>>,
    pub supercap_voltage: Script<Result<i32, HalError>>,
    pub light: Script<Result<i32, HalError>>,
    pub pcb_climate: Script<Result<TemperatureHumidity, HalError>>,
    pub ambient_climate: Script<Result<TemperatureHumidity, HalError>>,
    pub pressure: Script<Result<i32, HalError>>,
    pub uv_index: Script<Result<i32, HalError>>,
    pub gnss_time: Script<Result<Acquisition<RtcTime>, HalError>>,
    pub gnss_position: Script<Result<Acquisition<GnssPosition>, HalError>>,
    pub radio: Script<Result<Option<DownlinkPayload>, HalError>>,
    pub library_errors: VecDeque<u8>,
    pub sent: Vec<SentMessage>,
    pub enabled_domains: Vec<PowerDomain>,
    pub external_clock: bool,
    pub clock_calibrations: u32,
    pub reset_flags: u8,
    pub software_resets: u32,
    pub deep_sleeps: u32,
    /// Seconds elapsed per deep sleep.
    pub sleep_seconds: u32,
    pub wind_armed: bool,
    pub rainfall_armed: bool,
    pub wind_processed: u32,
    pub wind_resets: u32,
    pub wind: WindSpeed,
    pub wind_direction: Option<u32>,
    pub rainfall_um: u32,
}

impl MockBoard {
    pub fn new() -> Self {
        Self {
            now: RtcTime::new(2024, 1, 2, 10, 0, 0),
            uptime: 0,
            rtc_fails: false,
            alarm_second: None,
            nvm: [0; NVM_USED_SIZE],
            mcu_voltage: Script::new(Ok(3300)),
            mcu_temperature: Script::new(Ok(21)),
            source_voltage: Script::new(Ok(5000)),
            supercap_voltage: Script::new(Ok(2500)),
            light: Script::new(Ok(50)),
            pcb_climate: Script::new(Ok(TemperatureHumidity {
                temperature_tenth_degrees: 215,
                humidity_percent: 40,
            })),
            ambient_climate: Script::new(Ok(TemperatureHumidity {
                temperature_tenth_degrees: 180,
                humidity_percent: 60,
            })),
            pressure: Script::new(Ok(101_325)),
            uv_index: Script::new(Ok(2)),
            gnss_time: Script::new(Ok(Acquisition::failed(AcquisitionStatus::Timeout, 180))),
            gnss_position: Script::new(Ok(Acquisition::failed(AcquisitionStatus::Timeout, 120))),
            radio: Script::new(Ok(None)),
            library_errors: VecDeque::new(),
            sent: Vec::new(),
            enabled_domains: Vec::new(),
            external_clock: false,
            clock_calibrations: 0,
            reset_flags: 0x0C,
            software_resets: 0,
            deep_sleeps: 0,
            sleep_seconds: 60,
            wind_armed: false,
            rainfall_armed: false,
            wind_processed: 0,
            wind_resets: 0,
            wind: WindSpeed {
                average_mh: 12_000,
                peak_mh: 25_000,
            },
            wind_direction: Some(90),
            rainfall_um: 1_200,
        }
    }

    /// Advance both clocks. Calendar carry stops at the date.
    pub fn advance(&mut self, seconds: u32) {
        self.uptime += seconds;
        let total = u32::from(self.now.seconds)
            + 60 * u32::from(self.now.minutes)
            + 3600 * u32::from(self.now.hours)
            + seconds;
        self.now.seconds = (total % 60) as u8;
        self.now.minutes = (total / 60 % 60) as u8;
        self.now.hours = (total / 3600 % 24) as u8;
        self.now.date += (total / 86_400) as u8;
    }
}

impl RealTimeClock for MockBoard {
    fn time(&mut self) -> Result<RtcTime, HalError> {
        if self.rtc_fails {
            Err(HalError::Bus(0x01))
        } else {
            Ok(self.now)
        }
    }

    fn set_time(&mut self, time: &RtcTime) -> Result<(), HalError> {
        self.now = *time;
        Ok(())
    }

    fn uptime_seconds(&mut self) -> u32 {
        self.uptime
    }

    fn start_sharp_hour_alarm(&mut self, second_offset: u8) -> Result<(), HalError> {
        self.alarm_second = Some(second_offset);
        Ok(())
    }
}

impl NonVolatileMemory for MockBoard {
    fn read_byte(&mut self, address: u16) -> Result<u8, HalError> {
        self.nvm.get(address as usize).copied().ok_or(HalError::Nvm(0x02))
    }

    fn write_byte(&mut self, address: u16, value: u8) -> Result<(), HalError> {
        let byte = self.nvm.get_mut(address as usize).ok_or(HalError::Nvm(0x02))?;
        *byte = value;
        Ok(())
    }
}

impl AnalogFrontEnd for MockBoard {
    async fn convert(&mut self, channel: AnalogChannel) -> Result<i32, HalError> {
        match channel {
            AnalogChannel::McuVoltage => self.mcu_voltage.next(),
            AnalogChannel::McuTemperature => self.mcu_temperature.next(),
            AnalogChannel::SourceVoltage => self.source_voltage.next(),
            AnalogChannel::SupercapVoltage => self.supercap_voltage.next(),
            AnalogChannel::Light => self.light.next(),
        }
    }
}

impl WeatherSensors for MockBoard {
    async fn pcb_climate(&mut self) -> Result<TemperatureHumidity, HalError> {
        self.pcb_climate.next()
    }

    async fn ambient_climate(&mut self) -> Result<TemperatureHumidity, HalError> {
        self.ambient_climate.next()
    }

    async fn pressure_pa(&mut self) -> Result<i32, HalError> {
        self.pressure.next()
    }

    async fn uv_index(&mut self) -> Result<i32, HalError> {
        self.uv_index.next()
    }
}

impl GnssReceiver for MockBoard {
    async fn acquire_time(&mut self, _timeout: Duration) -> Result<Acquisition<RtcTime>, HalError> {
        self.gnss_time.next()
    }

    async fn acquire_position(
        &mut self,
        _timeout: Duration,
    ) -> Result<Acquisition<GnssPosition>, HalError> {
        self.gnss_position.next()
    }
}

impl RadioEndpoint for MockBoard {
    async fn send(&mut self, message: &UplinkMessage<'_>) -> Result<Option<DownlinkPayload>, HalError> {
        let result = self.radio.next();
        if result.is_ok() {
            self.sent.push(SentMessage {
                payload: message.payload.to_vec(),
                bit_rate: message.bit_rate,
                bidirectional: message.bidirectional,
            });
        }
        result.map(|downlink| if message.bidirectional { downlink } else { None })
    }

    fn take_library_error(&mut self) -> Option<u8> {
        self.library_errors.pop_front()
    }
}

impl PowerDomains for MockBoard {
    async fn enable(&mut self, domain: PowerDomain) {
        if !self.enabled_domains.contains(&domain) {
            self.enabled_domains.push(domain);
        }
    }

    fn disable(&mut self, domain: PowerDomain) {
        self.enabled_domains.retain(|&enabled| enabled != domain);
    }
}

impl ClockTree for MockBoard {
    fn switch_to_external_clock(&mut self) -> Result<(), HalError> {
        self.external_clock = true;
        Ok(())
    }

    fn switch_to_internal_clock(&mut self) -> Result<(), HalError> {
        self.external_clock = false;
        Ok(())
    }

    fn system_clock_is_external(&mut self) -> bool {
        self.external_clock
    }

    fn oscillator_running(&mut self, _oscillator: Oscillator) -> Result<bool, HalError> {
        Ok(true)
    }

    async fn calibrate_internal_clocks(&mut self) -> Result<(), HalError> {
        self.clock_calibrations += 1;
        Ok(())
    }
}

impl SystemControl for MockBoard {
    async fn delay(&mut self, _duration: Duration) -> Result<(), HalError> {
        Ok(())
    }

    async fn deep_sleep(&mut self) {
        self.deep_sleeps += 1;
        self.advance(self.sleep_seconds);
    }

    fn reset_flags(&mut self) -> u8 {
        self.reset_flags
    }

    fn clear_reset_flags(&mut self) {
        self.reset_flags = 0;
    }

    fn software_reset(&mut self) {
        self.software_resets += 1;
    }

    fn reload_watchdog(&mut self) {}
}

impl WindRainfallSensor for MockBoard {
    fn set_wind_measurement(&mut self, enabled: bool) -> Result<(), HalError> {
        self.wind_armed = enabled;
        Ok(())
    }

    fn set_rainfall_measurement(&mut self, enabled: bool) -> Result<(), HalError> {
        self.rainfall_armed = enabled;
        Ok(())
    }

    fn process(&mut self) -> Result<(), HalError> {
        self.wind_processed += 1;
        Ok(())
    }

    fn wind_speed(&mut self) -> Result<WindSpeed, HalError> {
        Ok(self.wind)
    }

    fn wind_direction(&mut self) -> Result<Option<u32>, HalError> {
        Ok(self.wind_direction)
    }

    fn rainfall_um(&mut self) -> Result<u32, HalError> {
        Ok(self.rainfall_um)
    }

    fn reset_measurements(&mut self) {
        self.wind_resets += 1;
    }
}
