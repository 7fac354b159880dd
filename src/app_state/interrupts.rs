use core::cell::Cell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

/// Events latched by interrupt handlers since the last drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PendingEvents {
    pub sharp_hour_alarm: bool,
    /// Uptime captured when the sharp-hour alarm fired.
    pub sharp_hour_uptime: u32,
    /// Wind or rain edges are waiting to be processed.
    pub wind_process: bool,
}

/// Shared between interrupt handlers and the scheduler.
///
/// Handlers only latch bits; the scheduler drains them once per task check.
pub struct InterruptContext {
    pending: Mutex<CriticalSectionRawMutex, Cell<PendingEvents>>,
}

impl Default for InterruptContext {
    fn default() -> Self {
        Self::new()
    }
}

impl InterruptContext {
    pub const fn new() -> Self {
        Self {
            pending: Mutex::new(Cell::new(PendingEvents {
                sharp_hour_alarm: false,
                sharp_hour_uptime: 0,
                wind_process: false,
            })),
        }
    }

    /// RTC alarm handler.
    pub fn on_sharp_hour_alarm(&self, uptime_seconds: u32) {
        self.pending.lock(|cell| {
            let mut events = cell.get();
            events.sharp_hour_alarm = true;
            events.sharp_hour_uptime = uptime_seconds;
            cell.set(events);
        });
    }

    /// Anemometer, wind vane or rain gauge edge handler.
    pub fn on_wind_process(&self) {
        self.pending.lock(|cell| {
            let mut events = cell.get();
            events.wind_process = true;
            cell.set(events);
        });
    }

    /// Return and clear everything latched so far.
    pub fn take(&self) -> PendingEvents {
        self.pending.lock(|cell| cell.replace(PendingEvents::default()))
    }

    pub fn discard_sharp_hour_alarm(&self) {
        self.pending.lock(|cell| {
            let mut events = cell.get();
            events.sharp_hour_alarm = false;
            cell.set(events);
        });
    }
}
