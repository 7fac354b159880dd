use core::future::Future;

use embassy_time::Duration;

use super::{HalError, RtcTime};

/// Outcome of a satellite acquisition, as reported in the geolocation timeout frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AcquisitionStatus {
    Success = 0,
    /// Receiver answered but never reached a valid fix.
    NoFix = 1,
    Timeout = 2,
    /// Driver error, see the error stack.
    Failure = 3,
}

/// Result of a bounded-time acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Acquisition<T> {
    pub status: AcquisitionStatus,
    pub duration_seconds: u32,
    /// Present only when `status` is [`AcquisitionStatus::Success`].
    pub data: Option<T>,
}

impl<T> Acquisition<T> {
    pub fn success(data: T, duration_seconds: u32) -> Self {
        Self {
            status: AcquisitionStatus::Success,
            duration_seconds,
            data: Some(data),
        }
    }

    pub fn failed(status: AcquisitionStatus, duration_seconds: u32) -> Self {
        Self {
            status,
            duration_seconds,
            data: None,
        }
    }
}

/// Position in degrees / minutes / fractional seconds.
///
/// `*_seconds` are in 1/100000 minute units as delivered by the NMEA parser
/// (17 bits on air).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GnssPosition {
    pub latitude_degrees: u8,
    pub latitude_minutes: u8,
    pub latitude_seconds: u32,
    pub latitude_north: bool,
    pub longitude_degrees: u8,
    pub longitude_minutes: u8,
    pub longitude_seconds: u32,
    pub longitude_east: bool,
    pub altitude_m: u16,
}

pub trait GnssReceiver {
    /// Acquire UTC time, giving up after `timeout`.
    fn acquire_time(
        &mut self,
        timeout: Duration,
    ) -> impl Future<Output = Result<Acquisition<RtcTime>, HalError>>;

    /// Acquire a position fix, giving up after `timeout`.
    fn acquire_position(
        &mut self,
        timeout: Duration,
    ) -> impl Future<Output = Result<Acquisition<GnssPosition>, HalError>>;
}
