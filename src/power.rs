//! Supercap voltage hysteresis gating radio and optional reporting.

pub const RADIO_OFF_THRESHOLD_MV: i32 = 1000;
pub const RADIO_ON_THRESHOLD_MV: i32 = 1500;
pub const REPORTING_OFF_THRESHOLD_MV: i32 = 1500;
pub const REPORTING_ON_THRESHOLD_MV: i32 = 2000;

/// Two-threshold switch, unchanged while the input sits inside the band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HysteresisGate {
    off_below_mv: i32,
    on_above_mv: i32,
    enabled: bool,
}

impl HysteresisGate {
    pub const fn new(off_below_mv: i32, on_above_mv: i32, enabled: bool) -> Self {
        Self {
            off_below_mv,
            on_above_mv,
            enabled,
        }
    }

    /// Feed a voltage sample and return the resulting state.
    pub fn update(&mut self, voltage_mv: i32) -> bool {
        if voltage_mv < self.off_below_mv {
            self.enabled = false;
        }
        if voltage_mv > self.on_above_mv {
            self.enabled = true;
        }
        self.enabled
    }

    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }
}

/// Radio and intermediate-report gates driven by the same supercap samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerGates {
    /// Off: every transmission is dropped.
    pub radio: HysteresisGate,
    /// Off: intermediate weather reports are skipped, the sharp-hour one is kept.
    pub reporting: HysteresisGate,
}

impl Default for PowerGates {
    fn default() -> Self {
        Self {
            radio: HysteresisGate::new(RADIO_OFF_THRESHOLD_MV, RADIO_ON_THRESHOLD_MV, true),
            reporting: HysteresisGate::new(REPORTING_OFF_THRESHOLD_MV, REPORTING_ON_THRESHOLD_MV, true),
        }
    }
}

impl PowerGates {
    pub fn update(&mut self, supercap_mv: i32) {
        let radio = self.radio.is_enabled();
        let reporting = self.reporting.is_enabled();
        self.radio.update(supercap_mv);
        self.reporting.update(supercap_mv);
        if radio != self.radio.is_enabled() || reporting != self.reporting.is_enabled() {
            log::info!(
                "Supercap at {} mV: radio {}, reporting {}",
                supercap_mv,
                if self.radio.is_enabled() { "on" } else { "off" },
                if self.reporting.is_enabled() { "on" } else { "off" }
            );
        }
    }

    pub fn radio_enabled(&self) -> bool {
        self.radio.is_enabled()
    }

    pub fn reporting_enabled(&self) -> bool {
        self.reporting.is_enabled()
    }
}
