//! Interfaces to the external collaborators of the station.
//!
//! Sensor chips, peripherals (RTC, NVM, ADC, clock tree, power switches), the
//! GPS module and the certified Sigfox endpoint library are implemented by the
//! board support crate. The state machine only sees these traits, combined into
//! [`Board`].

mod gnss;
mod radio;

pub use gnss::*;
pub use radio::*;

use core::future::Future;

use embassy_time::Duration;
use thiserror_no_std::Error;

/// Failure reported by an external collaborator.
///
/// Each variant carries the raw status byte of the driver so it can be reported
/// verbatim in the error stack frame.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HalError {
    #[error("operation timed out (status {0:#04x})")]
    Timeout(u8),
    #[error("bus transfer failed (status {0:#04x})")]
    Bus(u8),
    #[error("peripheral not ready (status {0:#04x})")]
    NotReady(u8),
    #[error("non-volatile memory access failed (status {0:#04x})")]
    Nvm(u8),
    #[error("radio endpoint failed (status {0:#04x})")]
    Radio(u8),
}

impl HalError {
    /// Raw driver status byte.
    pub const fn status(self) -> u8 {
        match self {
            Self::Timeout(s) | Self::Bus(s) | Self::NotReady(s) | Self::Nvm(s) | Self::Radio(s) => s,
        }
    }
}

/// Calendar time as kept by the real-time clock (UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RtcTime {
    pub year: u16,
    pub month: u8,
    pub date: u8,
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
}

impl RtcTime {
    pub const fn new(year: u16, month: u8, date: u8, hours: u8, minutes: u8, seconds: u8) -> Self {
        Self {
            year,
            month,
            date,
            hours,
            minutes,
            seconds,
        }
    }
}

impl core::fmt::Display for RtcTime {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}Z",
            self.year, self.month, self.date, self.hours, self.minutes, self.seconds
        )
    }
}

pub trait RealTimeClock {
    /// Current calendar time.
    fn time(&mut self) -> Result<RtcTime, HalError>;

    /// Overwrite the calendar registers.
    fn set_time(&mut self, time: &RtcTime) -> Result<(), HalError>;

    /// Seconds elapsed since boot, independent of calendar updates.
    fn uptime_seconds(&mut self) -> u32;

    /// Arm the hourly alarm at `second_offset` seconds past every full hour.
    fn start_sharp_hour_alarm(&mut self, second_offset: u8) -> Result<(), HalError>;
}

/// Byte-addressed EEPROM.
pub trait NonVolatileMemory {
    fn read_byte(&mut self, address: u16) -> Result<u8, HalError>;
    fn write_byte(&mut self, address: u16, value: u8) -> Result<(), HalError>;
}

/// Channels converted by the analog front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalogChannel {
    /// MCU supply voltage (mV).
    McuVoltage,
    /// MCU die temperature (°C).
    McuTemperature,
    /// Solar cell voltage (mV).
    SourceVoltage,
    /// Supercap voltage (mV).
    SupercapVoltage,
    /// Light dependent resistor (%).
    Light,
}

pub trait AnalogFrontEnd {
    fn convert(&mut self, channel: AnalogChannel) -> impl Future<Output = Result<i32, HalError>>;
}

/// Reading of a combined temperature/humidity chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemperatureHumidity {
    pub temperature_tenth_degrees: i32,
    pub humidity_percent: i32,
}

/// Digital weather sensors on the sensors power domain.
pub trait WeatherSensors {
    /// On-board temperature/humidity sensor.
    fn pcb_climate(&mut self) -> impl Future<Output = Result<TemperatureHumidity, HalError>>;

    /// External temperature/humidity sensor under the radiation shield.
    fn ambient_climate(&mut self) -> impl Future<Output = Result<TemperatureHumidity, HalError>>;

    /// Absolute pressure in Pa.
    fn pressure_pa(&mut self) -> impl Future<Output = Result<i32, HalError>>;

    fn uv_index(&mut self) -> impl Future<Output = Result<i32, HalError>>;
}

/// Switchable supply domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerDomain {
    Analog,
    Sensors,
    Gnss,
    /// Temperature compensated oscillator feeding the precise system clock.
    Tcxo,
}

pub trait PowerDomains {
    /// Power the domain on and wait for it to settle.
    fn enable(&mut self, domain: PowerDomain) -> impl Future<Output = ()>;
    fn disable(&mut self, domain: PowerDomain);
}

/// Low speed oscillators whose health is reported in the status register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Oscillator {
    /// External 32.768 kHz crystal.
    Lse,
    /// Internal low speed RC.
    Lsi,
}

pub trait ClockTree {
    /// Run the system from the external TCXO (needed by the radio).
    fn switch_to_external_clock(&mut self) -> Result<(), HalError>;

    /// Run the system from the internal RC oscillator.
    fn switch_to_internal_clock(&mut self) -> Result<(), HalError>;

    fn system_clock_is_external(&mut self) -> bool;

    fn oscillator_running(&mut self, oscillator: Oscillator) -> Result<bool, HalError>;

    /// Measure the internal oscillators against the LSE.
    fn calibrate_internal_clocks(&mut self) -> impl Future<Output = Result<(), HalError>>;
}

pub trait SystemControl {
    /// Low power blocking delay.
    fn delay(&mut self, duration: Duration) -> impl Future<Output = Result<(), HalError>>;

    /// Enter the deepest low power mode until the next timer or interrupt.
    fn deep_sleep(&mut self) -> impl Future<Output = ()>;

    fn reset_flags(&mut self) -> u8;
    fn clear_reset_flags(&mut self);

    /// Request a software reset. Does not return on hardware.
    fn software_reset(&mut self);

    fn reload_watchdog(&mut self);
}

/// Average and peak wind speed since the last reset, in m/h.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindSpeed {
    pub average_mh: u32,
    pub peak_mh: u32,
}

/// Anemometer, wind vane and rain gauge.
pub trait WindRainfallSensor {
    fn set_wind_measurement(&mut self, enabled: bool) -> Result<(), HalError>;
    fn set_rainfall_measurement(&mut self, enabled: bool) -> Result<(), HalError>;

    /// Service the edges counted by the interrupt handlers.
    fn process(&mut self) -> Result<(), HalError>;

    fn wind_speed(&mut self) -> Result<WindSpeed, HalError>;

    /// Average direction in degrees, `None` when no trend is available yet.
    fn wind_direction(&mut self) -> Result<Option<u32>, HalError>;

    fn rainfall_um(&mut self) -> Result<u32, HalError>;

    fn reset_measurements(&mut self);
}

/// Everything the station state machine needs from the board.
pub trait Board:
    RealTimeClock
    + NonVolatileMemory
    + AnalogFrontEnd
    + WeatherSensors
    + GnssReceiver
    + RadioEndpoint
    + PowerDomains
    + ClockTree
    + SystemControl
    + WindRainfallSensor
{
}

impl<T> Board for T where
    T: RealTimeClock
        + NonVolatileMemory
        + AnalogFrontEnd
        + WeatherSensors
        + GnssReceiver
        + RadioEndpoint
        + PowerDomains
        + ClockTree
        + SystemControl
        + WindRainfallSensor
{
}
