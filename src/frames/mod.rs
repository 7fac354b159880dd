//! Bit-exact uplink and downlink payloads.
//!
//! All fields are packed MSB first with no padding between them, so a field may
//! straddle a byte boundary (e.g. the 12-bit voltages of the monitoring frame).
//! Quantities that could not be measured are sent as an all-ones sentinel that
//! the network backend reads as "no data".

mod downlink;
mod uplink;

pub use downlink::*;
pub use uplink::*;

use heapless::Vec;
use thiserror_no_std::Error;

use crate::app_state::{ErrorCode, ErrorStack};

pub const UL_PAYLOAD_MAX_SIZE: usize = 12;
pub const DL_PAYLOAD_SIZE: usize = 8;

pub type UplinkPayload = Vec<u8, UL_PAYLOAD_MAX_SIZE>;

pub const SENTINEL_ANALOG_12_BITS: u32 = 0xFFF;
pub const SENTINEL_ANALOG_16_BITS: u32 = 0xFFFF;
pub const SENTINEL_TEMPERATURE: u32 = 0x7F;
pub const SENTINEL_HUMIDITY: u32 = 0xFF;
pub const SENTINEL_LIGHT: u32 = 0xFF;
pub const SENTINEL_UV_INDEX: u32 = 0xFF;
pub const SENTINEL_PRESSURE: u32 = 0xFFFF;
pub const SENTINEL_WIND: u32 = 0xFF;
pub const SENTINEL_RAIN: u32 = 0xFF;

/// Magnitude bits of the temperature fields (plus one sign bit).
pub const TEMPERATURE_MAGNITUDE_BITS: u8 = 7;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    #[error("{value} does not fit a sign-magnitude field of {magnitude_bits} bits")]
    SignMagnitudeOverflow { value: i32, magnitude_bits: u8 },
    #[error("{value} does not fit a {bits}-bit field")]
    FieldOverflow { value: i64, bits: u8 },
    #[error("payload of {actual} bytes is too short, {expected} expected")]
    PayloadTooShort { expected: usize, actual: usize },
    #[error("payload exceeds the maximum uplink size")]
    BufferOverflow,
    #[error("no uplink frame is {0} bytes long")]
    UnknownLength(usize),
    #[error("unknown downlink op-code {0}")]
    UnknownOpCode(u8),
    #[error("weather data period selector {0} out of range")]
    PeriodOutOfRange(u8),
}

impl CodecError {
    /// Status byte reported in the error stack.
    pub const fn status(self) -> u8 {
        match self {
            Self::SignMagnitudeOverflow { .. } => 0x01,
            Self::FieldOverflow { .. } => 0x02,
            Self::PayloadTooShort { .. } => 0x03,
            Self::BufferOverflow => 0x04,
            Self::UnknownLength(_) => 0x05,
            Self::UnknownOpCode(_) => 0x10,
            Self::PeriodOutOfRange(_) => 0x11,
        }
    }
}

/// Appends big-endian bit fields to an uplink payload.
#[derive(Debug, Default)]
pub struct BitWriter {
    bytes: UplinkPayload,
    bit_position: usize,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the `bits` least significant bits of `value`.
    pub fn write(&mut self, value: u32, bits: u8) -> Result<&mut Self, CodecError> {
        if bits < 32 && value >> bits != 0 {
            return Err(CodecError::FieldOverflow {
                value: i64::from(value),
                bits,
            });
        }
        if self.bit_position + bits as usize > UL_PAYLOAD_MAX_SIZE * 8 {
            return Err(CodecError::BufferOverflow);
        }
        for shift in (0..bits).rev() {
            let byte = self.bit_position / 8;
            if byte == self.bytes.len() {
                self.bytes.push(0).map_err(|_| CodecError::BufferOverflow)?;
            }
            if (value >> shift) & 1 != 0 {
                self.bytes[byte] |= 0x80 >> (self.bit_position % 8);
            }
            self.bit_position += 1;
        }
        Ok(self)
    }

    pub fn finish(self) -> UplinkPayload {
        self.bytes
    }
}

/// Reads big-endian bit fields back out of a payload.
#[derive(Debug)]
pub struct BitReader<'b> {
    bytes: &'b [u8],
    bit_position: usize,
}

impl<'b> BitReader<'b> {
    pub fn new(bytes: &'b [u8]) -> Self {
        Self {
            bytes,
            bit_position: 0,
        }
    }

    pub fn read(&mut self, bits: u8) -> Result<u32, CodecError> {
        let end = self.bit_position + bits as usize;
        if end > self.bytes.len() * 8 {
            return Err(CodecError::PayloadTooShort {
                expected: end.div_ceil(8),
                actual: self.bytes.len(),
            });
        }
        let mut value = 0u32;
        for _ in 0..bits {
            let bit = (self.bytes[self.bit_position / 8] >> (7 - self.bit_position % 8)) & 1;
            value = (value << 1) | u32::from(bit);
            self.bit_position += 1;
        }
        Ok(value)
    }

    pub fn read_u8(&mut self, bits: u8) -> Result<u8, CodecError> {
        Ok(self.read(bits)? as u8)
    }

    pub fn read_u16(&mut self, bits: u8) -> Result<u16, CodecError> {
        Ok(self.read(bits)? as u16)
    }
}

/// Sign bit followed by `magnitude_bits` of absolute value.
pub fn to_sign_magnitude(value: i32, magnitude_bits: u8) -> Result<u32, CodecError> {
    let magnitude = value.unsigned_abs();
    if magnitude >> magnitude_bits != 0 {
        return Err(CodecError::SignMagnitudeOverflow {
            value,
            magnitude_bits,
        });
    }
    let sign = u32::from(value < 0) << magnitude_bits;
    Ok(sign | magnitude)
}

pub fn from_sign_magnitude(raw: u32, magnitude_bits: u8) -> i32 {
    let magnitude = (raw & ((1 << magnitude_bits) - 1)) as i32;
    if raw & (1 << magnitude_bits) != 0 {
        -magnitude
    } else {
        magnitude
    }
}

/// Encode an unsigned field, substituting `sentinel` when the value is missing
/// or does not fit. A value that would collide with the sentinel counts as not
/// fitting. Overflows are stacked in `errors`.
pub fn field_or_sentinel(value: Option<i64>, bits: u8, sentinel: u32, errors: &mut ErrorStack) -> u32 {
    let Some(value) = value else {
        return sentinel;
    };
    match u32::try_from(value) {
        Ok(raw) if (bits >= 32 || raw >> bits == 0) && raw != sentinel => raw,
        _ => {
            errors.push(ErrorCode::from(CodecError::FieldOverflow { value, bits }));
            sentinel
        }
    }
}

/// Sign-magnitude temperature field, sentinel when missing or out of range.
pub fn temperature_or_sentinel(value: Option<i32>, errors: &mut ErrorStack) -> u32 {
    let Some(value) = value else {
        return SENTINEL_TEMPERATURE;
    };
    match to_sign_magnitude(value, TEMPERATURE_MAGNITUDE_BITS) {
        Ok(raw) if raw != SENTINEL_TEMPERATURE => raw,
        Ok(_) => {
            errors.push(ErrorCode::from(CodecError::SignMagnitudeOverflow {
                value,
                magnitude_bits: TEMPERATURE_MAGNITUDE_BITS,
            }));
            SENTINEL_TEMPERATURE
        }
        Err(error) => {
            errors.push(ErrorCode::from(error));
            SENTINEL_TEMPERATURE
        }
    }
}

/// Decode a sign-magnitude temperature field, `None` for the sentinel.
pub fn temperature_from_field(raw: u8) -> Option<i32> {
    if u32::from(raw) == SENTINEL_TEMPERATURE {
        None
    } else {
        Some(from_sign_magnitude(u32::from(raw), TEMPERATURE_MAGNITUDE_BITS))
    }
}
