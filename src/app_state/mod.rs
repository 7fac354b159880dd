//! Scheduler state, status register and request flags of the station.

mod error_stack;
mod interrupts;

pub use error_stack::*;
pub use interrupts::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatingState {
    Startup,
    Measure,
    Weather,
    Monitoring,
    Geoloc,
    ErrorStack,
    RtcCalibration,
    TaskEnd,
    TaskCheck,
    Sleep,
}

/// Bits of the status byte carried by the monitoring frame, MSB first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StatusBit {
    DailyDownlink = 7,
    DailyGeoloc = 6,
    DailyRtcCalibration = 5,
    FirstRtcCalibration = 4,
    LseRunning = 3,
    LsiRunning = 2,
    /// Set while the system runs from the precise external clock.
    ExternalClock = 1,
    /// Set for stations with wind and rainfall sensing.
    StationMode = 0,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusRegister(u8);

impl StatusRegister {
    pub const fn bits(self) -> u8 {
        self.0
    }

    pub fn get(self, bit: StatusBit) -> bool {
        self.0 & (1 << bit as u8) != 0
    }

    pub fn set(&mut self, bit: StatusBit, value: bool) {
        if value {
            self.0 |= 1 << bit as u8;
        } else {
            self.0 &= !(1 << bit as u8);
        }
    }
}

/// Task requests and scheduler bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum RequestFlag {
    Measure = 1 << 0,
    Weather = 1 << 1,
    Monitoring = 1 << 2,
    Geoloc = 1 << 3,
    ErrorStack = 1 << 4,
    RtcCalibration = 1 << 5,
    Downlink = 1 << 6,
    Reset = 1 << 7,
    /// The current wake-up follows a real clock change, not a recalibration glitch.
    ValidWakeup = 1 << 8,
    SharpHourAlarm = 1 << 9,
    FirstSharpHourAlarm = 1 << 10,
    /// The pending weather report is an intermediate one.
    IntermediateWeather = 1 << 11,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RequestFlags(u16);

impl RequestFlags {
    pub fn contains(self, flag: RequestFlag) -> bool {
        self.0 & flag as u16 != 0
    }

    pub fn set(&mut self, flag: RequestFlag) {
        self.0 |= flag as u16;
    }

    pub fn clear(&mut self, flag: RequestFlag) {
        self.0 &= !(flag as u16);
    }

    pub fn assign(&mut self, flag: RequestFlag, value: bool) {
        if value {
            self.set(flag)
        } else {
            self.clear(flag)
        }
    }

    /// Clear the flag, returning whether it was set.
    pub fn take(&mut self, flag: RequestFlag) -> bool {
        let was_set = self.contains(flag);
        self.clear(flag);
        was_set
    }
}
