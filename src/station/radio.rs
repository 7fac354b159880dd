use log::{debug, info, warn};

use super::Station;
use crate::app_state::{ErrorCode, ErrorSource, RequestFlag, StatusBit};
use crate::frames::{CodecError, DL_PAYLOAD_SIZE, DownlinkCommand, UplinkFrame};
use crate::hal::{BitRate, Board, DownlinkPayload, UPLINK_REPETITIONS, UplinkMessage};
use crate::storage::TimestampKind;

impl<B: Board> Station<'_, B> {
    /// Encode and transmit one frame. Returns whether it went on air.
    pub(super) async fn send(&mut self, frame: UplinkFrame, bit_rate: BitRate, bidirectional: bool) -> bool {
        if !self.gates.radio_enabled() {
            warn!("Radio disabled by supercap voltage, {} frame dropped", frame.kind());
            return false;
        }
        let payload = match frame.encode() {
            Ok(payload) => payload,
            Err(error) => {
                warn!("Cannot encode {} frame: {}", frame.kind(), error);
                self.errors.push(ErrorCode::from(error));
                return false;
            }
        };
        info!(
            "Sending {} frame ({} bytes) at {} bps{}: {:02X?}",
            frame.kind(),
            payload.len(),
            bit_rate.bits_per_second(),
            if bidirectional { " with downlink" } else { "" },
            payload.as_slice()
        );

        let message = UplinkMessage {
            payload: payload.as_slice(),
            bit_rate,
            number_of_frames: UPLINK_REPETITIONS,
            bidirectional,
        };
        let result = self.board.send(&message).await;
        match self.check(ErrorSource::Radio, result) {
            Some(downlink) => {
                if bidirectional {
                    self.complete_downlink(downlink);
                }
                true
            }
            None => false,
        }
    }

    fn complete_downlink(&mut self, downlink: Option<DownlinkPayload>) {
        self.status.set(StatusBit::DailyDownlink, false);
        if let Some(payload) = downlink {
            self.status.set(StatusBit::DailyDownlink, true);
            if let Err(error) = self.handle_downlink(&payload) {
                debug!("Downlink left the configuration unchanged: {}", error);
            }
        } else {
            info!("No downlink received");
        }
        self.persist_timestamp(TimestampKind::LastDownlink);
        self.flags.clear(RequestFlag::Downlink);
    }

    /// Decode and apply a downlink frame.
    ///
    /// A reset is only recorded here and performed from the sleep state.
    /// Invalid frames are stacked and leave the configuration untouched.
    pub fn handle_downlink(&mut self, payload: &[u8; DL_PAYLOAD_SIZE]) -> Result<DownlinkCommand, CodecError> {
        let command = match DownlinkCommand::decode(payload) {
            Ok(command) => command,
            Err(error) => {
                warn!("Rejected downlink {:02X?}: {}", payload, error);
                self.errors.push(ErrorCode::from(error));
                return Err(error);
            }
        };
        info!("Downlink command {:?}", command);
        match command {
            DownlinkCommand::Nop => {}
            DownlinkCommand::Reset => self.flags.set(RequestFlag::Reset),
            DownlinkCommand::SetWeatherDataPeriod(period) => self.set_weather_data_period(period),
        }
        Ok(command)
    }
}
