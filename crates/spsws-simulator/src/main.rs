//! Host simulator for the weather station control core.
//!
//! Runs the `spsws` state machine against a virtual board: a simulated RTC and
//! uptime counter, synthetic sensor waveforms, a GNSS receiver that always
//! gets a fix and a radio endpoint that logs decoded uplinks.
//!
//! # Usage
//!
//! ```text
//! spsws-simulator [--hours N] [--config FILE] [--write-default-config FILE]
//! ```
//!
//! Configuration files are postcard-encoded [`StationConfig`] blobs. Set
//! `RUST_LOG=debug` to follow every state transition.

use std::collections::HashMap;
use std::f64::consts::TAU;
use std::fmt::Display;
use std::process::ExitCode;

use embassy_futures::block_on;
use embassy_time::Duration;
use log::{error, info, warn};

use spsws::app_state::InterruptContext;
use spsws::config::{FirmwareVersion, StationConfig};
use spsws::frames::{UplinkFrame, decode_rainfall_um, temperature_from_field};
use spsws::hal::*;
use spsws::station::Station;

// ---------------------------------------------------------------------------
// Simulation constants
// ---------------------------------------------------------------------------

/// Default simulated duration.
const DEFAULT_HOURS: u32 = 26;

/// Longest deep sleep before the wake-up timer fires.
const MAX_SLEEP_SECONDS: u32 = 60;

/// Time needed by the simulated receiver to get a fix.
const GNSS_TIME_FIX_SECONDS: u32 = 40;
const GNSS_POSITION_FIX_SECONDS: u32 = 55;

/// Radio identifier; its last byte offsets the sharp-hour alarm.
const DEVICE_ID: [u8; 4] = [0x00, 0x4D, 0x2A, 0xAB];

/// Calendar registers after a power-on reset.
const RTC_RESET_VALUE: RtcTime = RtcTime::new(2000, 1, 1, 0, 0, 0);

/// True UTC at simulator start.
const SIMULATION_START: RtcTime = RtcTime::new(2024, 6, 15, 10, 57, 0);

/// Reset flags reported at boot (power-on and pin reset).
const BOOT_RESET_FLAGS: u8 = 0x0C;

/// Answer to the first bidirectional uplink: weather period set to 30 min.
const SCRIPTED_DOWNLINK: DownlinkPayload = [0x02, 0x01, 0, 0, 0, 0, 0, 0];

/// Shared with the simulated interrupt sources.
static INTERRUPTS: InterruptContext = InterruptContext::new();

// ---------------------------------------------------------------------------
// Calendar helpers
// ---------------------------------------------------------------------------

fn days_in_month(year: u16, month: u8) -> u8 {
    match month {
        2 if (year % 4 == 0 && year % 100 != 0) || year % 400 == 0 => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

/// Advance calendar time by one second.
fn tick(time: &mut RtcTime) {
    time.seconds += 1;
    if time.seconds < 60 {
        return;
    }
    time.seconds = 0;
    time.minutes += 1;
    if time.minutes < 60 {
        return;
    }
    time.minutes = 0;
    time.hours += 1;
    if time.hours < 24 {
        return;
    }
    time.hours = 0;
    time.date += 1;
    if time.date <= days_in_month(time.year, time.month) {
        return;
    }
    time.date = 1;
    time.month += 1;
    if time.month > 12 {
        time.month = 1;
        time.year += 1;
    }
}

// ---------------------------------------------------------------------------
// Frame decoding
// ---------------------------------------------------------------------------

fn or_na<T: Display>(value: Option<T>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| v.to_string())
}

/// `None` for all-ones sentinel fields.
fn field(raw: u16, bits: u8) -> Option<u16> {
    (u32::from(raw) != (1 << bits) - 1).then_some(raw)
}

/// Render an uplink in engineering units.
fn describe(frame: &UplinkFrame) -> String {
    match frame {
        UplinkFrame::Startup(f) => format!(
            "startup: reset flags {:#04x}, firmware {}.{}.{}-{:07x}{}",
            f.reset_reason,
            f.firmware.major,
            f.firmware.minor,
            f.firmware.commit_index,
            f.firmware.commit_id,
            if f.firmware.dirty { "-dirty" } else { "" }
        ),
        UplinkFrame::Weather(f) => {
            let pressure = field(f.pressure_tenth_hpa, 16).map(|p| format!("{}.{}", p / 10, p % 10));
            let mut text = format!(
                "weather: {} °C, {} %RH, light {} %, UV {}, {} hPa",
                or_na(temperature_from_field(f.ambient_temperature)),
                or_na(field(f.ambient_humidity_percent.into(), 8)),
                or_na(field(f.light_percent.into(), 8)),
                or_na(field(f.uv_index.into(), 8)),
                or_na(pressure)
            );
            if let Some(wind) = &f.wind {
                let rain = decode_rainfall_um(wind.rainfall).map(|um| format!("{:.1}", f64::from(um) / 1000.0));
                text.push_str(&format!(
                    ", wind {}/{} km/h from {} deg, rain {} mm",
                    or_na(field(wind.average_speed_kmh.into(), 8)),
                    or_na(field(wind.peak_speed_kmh.into(), 8)),
                    or_na(field(wind.direction_two_degrees.into(), 8).map(|d| d * 2)),
                    or_na(rain)
                ));
            }
            text
        }
        UplinkFrame::Monitoring(f) => format!(
            "monitoring: MCU {} °C, PCB {} °C {} %RH, source {} mV, supercap {} mV, MCU {} mV, status {:08b}",
            or_na(temperature_from_field(f.mcu_temperature)),
            or_na(temperature_from_field(f.pcb_temperature)),
            or_na(field(f.pcb_humidity_percent.into(), 8)),
            or_na(field(f.source_voltage_mv, 16)),
            or_na(field(f.supercap_voltage_mv, 12)),
            or_na(field(f.mcu_voltage_mv, 12)),
            f.status
        ),
        UplinkFrame::Geoloc(f) => {
            let p = &f.position;
            format!(
                "geoloc: {}°{}.{:05}'{} {}°{}.{:05}'{}, {} m, fix in {} s",
                p.latitude_degrees,
                p.latitude_minutes,
                p.latitude_seconds,
                if p.latitude_north { 'N' } else { 'S' },
                p.longitude_degrees,
                p.longitude_minutes,
                p.longitude_seconds,
                if p.longitude_east { 'E' } else { 'W' },
                p.altitude_m,
                f.duration_seconds
            )
        }
        UplinkFrame::GeolocTimeout(f) => format!(
            "geoloc timeout: status {}, after {} s",
            f.status, f.duration_seconds
        ),
        UplinkFrame::ErrorStack(f) => {
            let codes: Vec<String> = f
                .codes
                .iter()
                .filter(|code| code.0 != 0)
                .map(|code| format!("{:04X}", code.0))
                .collect();
            format!("error stack: [{}]", codes.join(", "))
        }
    }
}

// ---------------------------------------------------------------------------
// Virtual board
// ---------------------------------------------------------------------------

/// Board backed by synthetic waveforms and a virtual clock.
struct SimBoard {
    rtc: RtcTime,
    utc: RtcTime,
    uptime: u32,
    alarm_second: Option<u8>,
    nvm: [u8; 256],
    external_clock: bool,
    powered: Vec<PowerDomain>,
    reset_flags: u8,
    reset_requested: bool,
    wind_armed: bool,
    rainfall_armed: bool,
    wind_samples: u32,
    wind_sum_mh: u64,
    wind_peak_mh: u32,
    rainfall_um: u32,
    downlink: Option<DownlinkPayload>,
    frames: HashMap<&'static str, u32>,
}

impl SimBoard {
    fn new() -> Self {
        let mut nvm = [0u8; 256];
        nvm[..DEVICE_ID.len()].copy_from_slice(&DEVICE_ID);
        Self {
            rtc: RTC_RESET_VALUE,
            utc: SIMULATION_START,
            uptime: 0,
            alarm_second: None,
            nvm,
            external_clock: false,
            powered: Vec::new(),
            reset_flags: BOOT_RESET_FLAGS,
            reset_requested: false,
            wind_armed: false,
            rainfall_armed: false,
            wind_samples: 0,
            wind_sum_mh: 0,
            wind_peak_mh: 0,
            rainfall_um: 0,
            downlink: Some(SCRIPTED_DOWNLINK),
            frames: HashMap::new(),
        }
    }

    /// Let `seconds` elapse, raising the sharp-hour alarm when the RTC crosses
    /// it. Returns whether the alarm fired.
    fn elapse(&mut self, seconds: u32) -> bool {
        let mut fired = false;
        for _ in 0..seconds {
            self.uptime += 1;
            tick(&mut self.rtc);
            tick(&mut self.utc);
            if self.alarm_second == Some(self.rtc.seconds) && self.rtc.minutes == 0 {
                INTERRUPTS.on_sharp_hour_alarm(self.uptime);
                fired = true;
            }
        }
        fired
    }

    fn elapse_duration(&mut self, duration: Duration) {
        // Sub-second delays are rounded up to keep the virtual clock moving.
        let seconds = duration.as_millis().div_ceil(1000) as u32;
        self.elapse(seconds);
    }

    /// Sinusoid around `mean` with the given period in seconds.
    fn wave(&self, mean: f64, amplitude: f64, period_seconds: f64) -> f64 {
        mean + amplitude * (TAU * f64::from(self.uptime) / period_seconds).sin()
    }

    fn wind_mh(&self) -> u32 {
        (self.wave(14_000.0, 9_000.0, 1_800.0) + self.wave(0.0, 3_000.0, 97.0)).max(0.0) as u32
    }

    fn is_raining(&self) -> bool {
        self.wave(0.0, 1.0, 14_400.0) > 0.6
    }

    fn powered(&self, domain: PowerDomain) -> Result<(), HalError> {
        if self.powered.contains(&domain) {
            Ok(())
        } else {
            Err(HalError::NotReady(domain as u8))
        }
    }
}

impl RealTimeClock for SimBoard {
    fn time(&mut self) -> Result<RtcTime, HalError> {
        Ok(self.rtc)
    }

    fn set_time(&mut self, time: &RtcTime) -> Result<(), HalError> {
        info!("RTC set from {} to {}", self.rtc, time);
        self.rtc = *time;
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

impl NonVolatileMemory for SimBoard {
    fn read_byte(&mut self, address: u16) -> Result<u8, HalError> {
        self.nvm.get(usize::from(address)).copied().ok_or(HalError::Nvm(0x01))
    }

    fn write_byte(&mut self, address: u16, value: u8) -> Result<(), HalError> {
        let byte = self.nvm.get_mut(usize::from(address)).ok_or(HalError::Nvm(0x01))?;
        *byte = value;
        Ok(())
    }
}

impl AnalogFrontEnd for SimBoard {
    async fn convert(&mut self, channel: AnalogChannel) -> Result<i32, HalError> {
        self.powered(PowerDomain::Analog)?;
        let value = match channel {
            AnalogChannel::McuVoltage => 3_000.0,
            AnalogChannel::McuTemperature => self.wave(24.0, 8.0, 86_400.0),
            AnalogChannel::SourceVoltage => self.wave(4_000.0, 3_000.0, 86_400.0).max(0.0),
            // Deep enough to exercise both power gates.
            AnalogChannel::SupercapVoltage => self.wave(1_800.0, 900.0, 21_600.0),
            AnalogChannel::Light => self.wave(50.0, 50.0, 86_400.0),
        };
        Ok(value as i32)
    }
}

impl WeatherSensors for SimBoard {
    async fn pcb_climate(&mut self) -> Result<TemperatureHumidity, HalError> {
        self.powered(PowerDomain::Sensors)?;
        Ok(TemperatureHumidity {
            temperature_tenth_degrees: self.wave(250.0, 80.0, 86_400.0) as i32,
            humidity_percent: self.wave(45.0, 10.0, 86_400.0) as i32,
        })
    }

    async fn ambient_climate(&mut self) -> Result<TemperatureHumidity, HalError> {
        self.powered(PowerDomain::Sensors)?;
        Ok(TemperatureHumidity {
            temperature_tenth_degrees: self.wave(180.0, 70.0, 86_400.0) as i32,
            humidity_percent: self.wave(65.0, 20.0, 43_200.0) as i32,
        })
    }

    async fn pressure_pa(&mut self) -> Result<i32, HalError> {
        self.powered(PowerDomain::Sensors)?;
        Ok(self.wave(101_325.0, 800.0, 172_800.0) as i32)
    }

    async fn uv_index(&mut self) -> Result<i32, HalError> {
        self.powered(PowerDomain::Sensors)?;
        Ok(self.wave(4.0, 4.0, 86_400.0).max(0.0) as i32)
    }
}

impl GnssReceiver for SimBoard {
    async fn acquire_time(&mut self, _timeout: Duration) -> Result<Acquisition<RtcTime>, HalError> {
        self.powered(PowerDomain::Gnss)?;
        self.elapse(GNSS_TIME_FIX_SECONDS);
        Ok(Acquisition::success(self.utc, GNSS_TIME_FIX_SECONDS))
    }

    async fn acquire_position(
        &mut self,
        _timeout: Duration,
    ) -> Result<Acquisition<GnssPosition>, HalError> {
        self.powered(PowerDomain::Gnss)?;
        self.elapse(GNSS_POSITION_FIX_SECONDS);
        let position = GnssPosition {
            latitude_degrees: 43,
            latitude_minutes: 36,
            latitude_seconds: 42_150,
            latitude_north: true,
            longitude_degrees: 1,
            longitude_minutes: 26,
            longitude_seconds: 71_300,
            longitude_east: true,
            altitude_m: 146,
        };
        Ok(Acquisition::success(position, GNSS_POSITION_FIX_SECONDS))
    }
}

impl RadioEndpoint for SimBoard {
    async fn send(&mut self, message: &UplinkMessage<'_>) -> Result<Option<DownlinkPayload>, HalError> {
        if !self.external_clock {
            return Err(HalError::NotReady(0x01));
        }
        // Each repetition lasts about 2 s at 100 bps.
        let airtime =
            u32::from(message.number_of_frames) * 200 / u32::from(message.bit_rate.bits_per_second());
        self.elapse(airtime.max(1));

        match UplinkFrame::decode(message.payload) {
            Ok(frame) => {
                *self.frames.entry(frame.kind()).or_default() += 1;
                info!("[{}] {}", self.rtc, describe(&frame));
            }
            Err(e) => warn!("[{}] undecodable uplink: {}", self.rtc, e),
        }

        if !message.bidirectional {
            return Ok(None);
        }
        self.elapse(25);
        let downlink = self.downlink.take();
        info!("[{}] downlink {:02X?}", self.rtc, downlink);
        Ok(downlink)
    }

    fn take_library_error(&mut self) -> Option<u8> {
        None
    }
}

impl PowerDomains for SimBoard {
    async fn enable(&mut self, domain: PowerDomain) {
        if !self.powered.contains(&domain) {
            self.powered.push(domain);
        }
    }

    fn disable(&mut self, domain: PowerDomain) {
        self.powered.retain(|&powered| powered != domain);
    }
}

impl ClockTree for SimBoard {
    fn switch_to_external_clock(&mut self) -> Result<(), HalError> {
        self.powered(PowerDomain::Tcxo)?;
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
        Ok(())
    }
}

impl SystemControl for SimBoard {
    async fn delay(&mut self, duration: Duration) -> Result<(), HalError> {
        self.elapse_duration(duration);
        Ok(())
    }

    async fn deep_sleep(&mut self) {
        for _ in 0..MAX_SLEEP_SECONDS {
            if self.elapse(1) {
                break;
            }
        }
        if self.wind_armed || self.rainfall_armed {
            INTERRUPTS.on_wind_process();
        }
    }

    fn reset_flags(&mut self) -> u8 {
        self.reset_flags
    }

    fn clear_reset_flags(&mut self) {
        self.reset_flags = 0;
    }

    fn software_reset(&mut self) {
        warn!("[{}] software reset requested", self.rtc);
        self.reset_requested = true;
    }

    fn reload_watchdog(&mut self) {}
}

impl WindRainfallSensor for SimBoard {
    fn set_wind_measurement(&mut self, enabled: bool) -> Result<(), HalError> {
        self.wind_armed = enabled;
        Ok(())
    }

    fn set_rainfall_measurement(&mut self, enabled: bool) -> Result<(), HalError> {
        self.rainfall_armed = enabled;
        Ok(())
    }

    fn process(&mut self) -> Result<(), HalError> {
        if self.wind_armed {
            let speed = self.wind_mh();
            self.wind_samples += 1;
            self.wind_sum_mh += u64::from(speed);
            self.wind_peak_mh = self.wind_peak_mh.max(speed);
        }
        if self.rainfall_armed && self.is_raining() {
            self.rainfall_um += 279;
        }
        Ok(())
    }

    fn wind_speed(&mut self) -> Result<WindSpeed, HalError> {
        let average = self
            .wind_sum_mh
            .checked_div(u64::from(self.wind_samples))
            .unwrap_or(0);
        Ok(WindSpeed {
            average_mh: average as u32,
            peak_mh: self.wind_peak_mh,
        })
    }

    fn wind_direction(&mut self) -> Result<Option<u32>, HalError> {
        if self.wind_samples == 0 {
            return Ok(None);
        }
        Ok(Some(self.wave(225.0, 90.0, 7_200.0) as u32 % 360))
    }

    fn rainfall_um(&mut self) -> Result<u32, HalError> {
        Ok(self.rainfall_um)
    }

    fn reset_measurements(&mut self) {
        self.wind_samples = 0;
        self.wind_sum_mh = 0;
        self.wind_peak_mh = 0;
        self.rainfall_um = 0;
    }
}

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

struct Options {
    hours: u32,
    config: Option<String>,
    write_default_config: Option<String>,
}

fn parse_args() -> Result<Options, String> {
    let mut options = Options {
        hours: DEFAULT_HOURS,
        config: None,
        write_default_config: None,
    };
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        let mut value = || args.next().ok_or_else(|| format!("{arg} expects a value"));
        match arg.as_str() {
            "--hours" => {
                let hours = value()?;
                options.hours = hours.parse().map_err(|_| format!("invalid hour count {hours}"))?;
            }
            "--config" => options.config = Some(value()?),
            "--write-default-config" => options.write_default_config = Some(value()?),
            other => return Err(format!("unknown argument {other}")),
        }
    }
    Ok(options)
}

fn default_config() -> StationConfig {
    StationConfig {
        firmware: FirmwareVersion {
            major: 1,
            minor: 0,
            commit_index: 0,
            commit_id: 0x00C0_FFEE,
            dirty: false,
        },
        ..Default::default()
    }
}

fn load_config(path: Option<&str>) -> Result<StationConfig, String> {
    let Some(path) = path else {
        return Ok(default_config());
    };
    let bytes = std::fs::read(path).map_err(|e| format!("cannot read {path}: {e}"))?;
    Ok(StationConfig::from_bytes(&bytes).unwrap_or_else(|e| {
        warn!("{path}: {e}, using the default configuration");
        default_config()
    }))
}

fn write_config(path: &str, config: &StationConfig) -> Result<(), String> {
    let mut buffer = [0u8; 64];
    let bytes = config.to_slice(&mut buffer).map_err(|e| e.to_string())?;
    std::fs::write(path, bytes).map_err(|e| format!("cannot write {path}: {e}"))
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let options = match parse_args() {
        Ok(options) => options,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    if let Some(path) = &options.write_default_config {
        return match write_config(path, &default_config()) {
            Ok(()) => {
                info!("Default configuration written to {path}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("{e}");
                ExitCode::FAILURE
            }
        };
    }

    let config = match load_config(options.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    info!(
        "Simulating {} h of a {:?} station (bidirectional {})",
        options.hours, config.mode, config.bidirectional
    );

    let end = options.hours.saturating_mul(3600);
    let mut station = Station::new(SimBoard::new(), &INTERRUPTS, config);

    // -----------------------------------------------------------------------
    // Main loop
    // -----------------------------------------------------------------------

    while station.board().uptime < end {
        block_on(station.step());
        if station.board().reset_requested {
            info!("Stopping at the requested reset");
            break;
        }
    }

    let board = station.board();
    info!("Simulation ended at {} (uptime {} s)", board.rtc, board.uptime);
    let mut frames: Vec<_> = board.frames.iter().collect();
    frames.sort();
    for (kind, count) in frames {
        info!("  {kind:>14}: {count} frame(s)");
    }
    info!(
        "  weather period: {} s, pending errors: {}",
        station.weather_data_period().seconds(),
        station.errors().len()
    );
    ExitCode::SUCCESS
}
