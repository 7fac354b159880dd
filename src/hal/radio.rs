use core::future::Future;

use super::HalError;
use crate::frames::DL_PAYLOAD_SIZE;

/// Uplink bit rates supported by the RC1 zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitRate {
    Bps100,
    Bps600,
}

impl BitRate {
    pub const fn bits_per_second(self) -> u16 {
        match self {
            Self::Bps100 => 100,
            Self::Bps600 => 600,
        }
    }
}

/// Number of repetitions of each uplink on air.
pub const UPLINK_REPETITIONS: u8 = 3;

/// One application message handed to the Sigfox endpoint library.
#[derive(Debug, Clone, Copy)]
pub struct UplinkMessage<'p> {
    pub payload: &'p [u8],
    pub bit_rate: BitRate,
    pub number_of_frames: u8,
    /// Open a receive window after the uplink.
    pub bidirectional: bool,
}

pub type DownlinkPayload = [u8; DL_PAYLOAD_SIZE];

/// Certified radio-network endpoint (framing, FEC and PHY live behind it).
pub trait RadioEndpoint {
    /// Send one message. For bidirectional messages the future completes after
    /// the receive window and yields the downlink payload, if one arrived.
    fn send(
        &mut self,
        message: &UplinkMessage<'_>,
    ) -> impl Future<Output = Result<Option<DownlinkPayload>, HalError>>;

    /// Pop one error recorded internally by the endpoint library.
    fn take_library_error(&mut self) -> Option<u8>;
}
