use heapless::Deque;
use log::warn;

use crate::frames::CodecError;
use crate::hal::HalError;

pub const ERROR_STACK_DEPTH: usize = 32;

/// Component that reported an error, stored in the high byte of the code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorSource {
    System = 0x01,
    Clock = 0x02,
    Rtc = 0x03,
    Nvm = 0x04,
    Analog = 0x05,
    PcbSensor = 0x06,
    AmbientSensor = 0x07,
    PressureSensor = 0x08,
    UvSensor = 0x09,
    Gnss = 0x0A,
    Radio = 0x0B,
    /// Errors recorded internally by the radio endpoint library.
    RadioLibrary = 0x0C,
    WindRainfall = 0x0D,
    Codec = 0x0E,
    Downlink = 0x0F,
}

/// 16-bit error code as carried by the error stack frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ErrorCode(pub u16);

impl ErrorCode {
    pub const SUCCESS: Self = Self(0x0000);

    pub const fn new(source: ErrorSource, status: u8) -> Self {
        Self(((source as u16) << 8) | status as u16)
    }

    pub fn from_hal(source: ErrorSource, error: HalError) -> Self {
        Self::new(source, error.status())
    }

    pub const fn to_be_bytes(self) -> [u8; 2] {
        self.0.to_be_bytes()
    }
}

impl From<CodecError> for ErrorCode {
    fn from(error: CodecError) -> Self {
        let source = match error {
            CodecError::UnknownOpCode(_) | CodecError::PeriodOutOfRange(_) => ErrorSource::Downlink,
            _ => ErrorSource::Codec,
        };
        Self::new(source, error.status())
    }
}

/// Bounded log of non-fatal errors, drained by the error stack frame.
///
/// Once full, new codes are dropped so the oldest faults are kept until the
/// stack is drained.
#[derive(Debug, Default)]
pub struct ErrorStack {
    codes: Deque<ErrorCode, ERROR_STACK_DEPTH>,
    dropped: u32,
}

impl ErrorStack {
    pub const fn new() -> Self {
        Self {
            codes: Deque::new(),
            dropped: 0,
        }
    }

    pub fn push(&mut self, code: ErrorCode) {
        warn!("Stacking error {:#06x}", code.0);
        if self.codes.push_back(code).is_err() {
            self.dropped = self.dropped.saturating_add(1);
            warn!("Error stack full, {} codes dropped", self.dropped);
        }
    }

    pub fn push_hal(&mut self, source: ErrorSource, error: HalError) {
        warn!("{:?}: {}", source, error);
        self.push(ErrorCode::from_hal(source, error));
    }

    /// Oldest code, or [`ErrorCode::SUCCESS`] once empty.
    pub fn pop(&mut self) -> ErrorCode {
        self.codes.pop_front().unwrap_or(ErrorCode::SUCCESS)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ErrorCode> {
        self.codes.iter()
    }

    pub fn clear(&mut self) {
        self.codes.clear();
        self.dropped = 0;
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Pushes rejected since the last clear.
    pub fn dropped(&self) -> u32 {
        self.dropped
    }
}
