use super::{CodecError, DL_PAYLOAD_SIZE};
use crate::config::WeatherDataPeriod;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    Nop = 0,
    Reset = 1,
    SetWeatherDataPeriod = 2,
}

impl TryFrom<u8> for OpCode {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Nop),
            1 => Ok(Self::Reset),
            2 => Ok(Self::SetWeatherDataPeriod),
            other => Err(CodecError::UnknownOpCode(other)),
        }
    }
}

/// Command carried by a downlink frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownlinkCommand {
    Nop,
    /// Software reset, performed once the station is idle.
    Reset,
    SetWeatherDataPeriod(WeatherDataPeriod),
}

impl DownlinkCommand {
    /// Parse the op-code (first byte) and its arguments.
    pub fn decode(payload: &[u8; DL_PAYLOAD_SIZE]) -> Result<Self, CodecError> {
        Ok(match OpCode::try_from(payload[0])? {
            OpCode::Nop => Self::Nop,
            OpCode::Reset => Self::Reset,
            OpCode::SetWeatherDataPeriod => {
                Self::SetWeatherDataPeriod(WeatherDataPeriod::try_from(payload[1])?)
            }
        })
    }

    pub fn op_code(&self) -> OpCode {
        match self {
            Self::Nop => OpCode::Nop,
            Self::Reset => OpCode::Reset,
            Self::SetWeatherDataPeriod(_) => OpCode::SetWeatherDataPeriod,
        }
    }

    /// Build the frame as the network backend would send it.
    pub fn encode(&self) -> [u8; DL_PAYLOAD_SIZE] {
        let mut payload = [0u8; DL_PAYLOAD_SIZE];
        payload[0] = self.op_code() as u8;
        if let Self::SetWeatherDataPeriod(period) = self {
            payload[1] = *period as u8;
        }
        payload
    }
}
