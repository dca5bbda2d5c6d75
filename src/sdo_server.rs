use embedded_can::Frame;

use crate::cmd_header::{SdoExpeditedCmd, SDO_CMD_READ_REQUEST, SDO_CMD_WRITE_RESPONSE};
use crate::constant::{COB_FUNC_TRANSMIT_SDO, SDO_TX_TIMEOUT_MS};
use crate::driver::{CanDriver, Clock};
use crate::emergency::{EmcyCode, EmcyPriority};
use crate::node::Node;
use crate::util::create_frame_with_padding;
use crate::{error, info};

impl<CAN, CLK> Node<CAN, CLK>
where
    CAN: CanDriver,
    CLK: Clock,
{
    /// Handle an expedited request addressed to this node's SDO server.
    ///
    /// A well-formed request gets a response on `0x580 + node_id` echoing
    /// the request's index and subindex. A failed request gets no response
    /// at all; the failure is reported as a minor emergency instead.
    pub(crate) fn process_sdo_request(&mut self, frame: &CAN::Frame) {
        if frame.data().len() < 8 {
            info!("dropping malformed SDO request {:x?}", frame);
            return;
        }
        match self.build_sdo_response(frame.data()) {
            Ok(response) => {
                let cob_id = COB_FUNC_TRANSMIT_SDO + self.node_id as u16;
                let frame = match create_frame_with_padding(cob_id, &response) {
                    Ok(frame) => frame,
                    Err(ec) => {
                        error!("errors in creating SDO response frame: {:?}", ec);
                        return;
                    }
                };
                if self.transmit(&frame, SDO_TX_TIMEOUT_MS).is_err() {
                    self.send_emcy(
                        EmcyPriority::Minor,
                        self.node_id,
                        EmcyCode::SdoResponseTransmitFailed,
                    );
                }
            }
            Err(code) => {
                error!("SDO server rejecting request {:x?}: {:?}", frame.data(), code);
                self.send_emcy(EmcyPriority::Minor, self.node_id, code);
            }
        }
    }

    fn build_sdo_response(&mut self, req: &[u8]) -> Result<[u8; 8], EmcyCode> {
        let cmd = req[0];
        let index = u16::from_le_bytes([req[1], req[2]]);
        let sub_index = req[3];

        let mut response = [0u8; 8];
        response[1..4].copy_from_slice(&req[1..4]);

        let (access, value) = match self.object_directory.get(index, sub_index) {
            Ok(var) => (var.access(), var.value()),
            Err(_) => return Err(EmcyCode::SdoEntryNotFound),
        };

        if cmd == SDO_CMD_READ_REQUEST {
            if !access.is_readable() {
                return Err(EmcyCode::SdoAccessViolation);
            }
            let size = value.size();
            response[0] = match size {
                1 | 2 | 4 => SdoExpeditedCmd::upload_response(size),
                _ => return Err(EmcyCode::SdoUnsupportedSize),
            };
            value.copy_to_le(&mut response[4..4 + size]);
        } else {
            let expected = match cmd {
                0x2F => 1,
                0x2B => 2,
                0x23 => 4,
                _ => return Err(EmcyCode::SdoUnknownWriteCommand),
            };
            if !access.is_writable() {
                return Err(EmcyCode::SdoAccessViolation);
            }
            if expected != value.size() {
                return Err(EmcyCode::SdoSizeMismatch);
            }
            self.object_directory
                .set_value(index, sub_index, &req[4..4 + expected], true)
                .map_err(|_| EmcyCode::SdoSizeMismatch)?;
            response[0] = SDO_CMD_WRITE_RESPONSE;
        }

        Ok(response)
    }
}
