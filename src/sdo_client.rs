use embedded_can::Frame;

use crate::cmd_header::{
    SdoExpeditedCmd, SDO_CMD_ABORT, SDO_CMD_READ_REQUEST, SDO_CMD_WRITE_RESPONSE,
};
use crate::constant::{
    COB_FUNC_RECEIVE_SDO, COB_FUNC_TRANSMIT_SDO, SDO_POLL_TIMEOUT_MS, SDO_RESPONSE_DEADLINE_MS,
    SDO_TX_TIMEOUT_MS,
};
use crate::driver::{CanDriver, Clock};
use crate::emergency::{EmcyCode, EmcyPriority};
use crate::error::ErrorCode;
use crate::node::Node;
use crate::util::{create_frame_with_padding, get_cob_id};
use crate::{error, info};

enum SdoResponse {
    Confirmed,
    Value(u32),
}

impl<CAN, CLK> Node<CAN, CLK>
where
    CAN: CanDriver,
    CLK: Clock,
{
    /// Write a 1/2/4-byte value into a peer's dictionary and wait for the
    /// confirmation. Blocks the caller for at most the response deadline;
    /// unrelated bus traffic keeps being dispatched meanwhile.
    pub fn expedited_write(
        &mut self,
        target: u8,
        index: u16,
        sub_index: u8,
        size: usize,
        value: u32,
    ) -> Result<(), ErrorCode> {
        let cmd = match size {
            1 | 2 | 4 => SdoExpeditedCmd::download_request(size),
            _ => {
                error!("invalid SDO write size {}", size);
                self.send_emcy(EmcyPriority::Minor, self.node_id, EmcyCode::SdoClientInvalidSize);
                return Err(ErrorCode::UnsupportedSize { size });
            }
        };
        let mut request = [0u8; 8];
        prepare_sdo_request(cmd, index, sub_index, &value.to_le_bytes()[..size], &mut request);
        self.transmit_sdo_request(target, &request)?;
        self.await_sdo_response(target).map(|_| ())
    }

    /// Read a value from a peer's dictionary. 1/2/4-byte responses are
    /// zero-extended to 32 bits.
    pub fn expedited_read(
        &mut self,
        target: u8,
        index: u16,
        sub_index: u8,
    ) -> Result<u32, ErrorCode> {
        let mut request = [0u8; 8];
        prepare_sdo_request(SDO_CMD_READ_REQUEST, index, sub_index, &[], &mut request);
        self.transmit_sdo_request(target, &request)?;
        match self.await_sdo_response(target)? {
            SdoResponse::Value(value) => Ok(value),
            SdoResponse::Confirmed => Ok(0),
        }
    }

    fn transmit_sdo_request(&mut self, target: u8, request: &[u8; 8]) -> Result<(), ErrorCode> {
        let frame = create_frame_with_padding(COB_FUNC_RECEIVE_SDO + target as u16, request)?;
        if self.transmit(&frame, SDO_TX_TIMEOUT_MS).is_err() {
            self.send_emcy(
                EmcyPriority::Minor,
                self.node_id,
                EmcyCode::SdoClientRequestTransmitFailed,
            );
            return Err(ErrorCode::TransmitFailed);
        }
        Ok(())
    }

    /// Poll for the matched response. Frames that belong to another
    /// protocol layer are handed back to the dispatcher, so a blocking
    /// transfer cannot starve NMT, EMCY, PDO or heartbeat traffic.
    fn await_sdo_response(&mut self, target: u8) -> Result<SdoResponse, ErrorCode> {
        let expected_cob_id = COB_FUNC_TRANSMIT_SDO + target as u16;
        let start = self.now_ms();
        while self.now_ms().wrapping_sub(start) < SDO_RESPONSE_DEADLINE_MS {
            let frame = match self.driver.receive(SDO_POLL_TIMEOUT_MS) {
                Ok(frame) => frame,
                Err(nb::Error::WouldBlock) => continue,
                Err(nb::Error::Other(err)) => {
                    info!("errors in reading CAN frame, {:?}", err);
                    continue;
                }
            };

            if get_cob_id(&frame) != Some(expected_cob_id) {
                self.tick_with_frame(Some(frame));
                continue;
            }

            let data = frame.data();
            let cmd = if data.is_empty() { 0 } else { data[0] };
            if cmd == SDO_CMD_WRITE_RESPONSE {
                return Ok(SdoResponse::Confirmed);
            }
            if cmd == SDO_CMD_ABORT {
                error!("SDO abort received from node {}", target);
                self.send_emcy(EmcyPriority::Minor, self.node_id, EmcyCode::SdoClientRemoteAbort);
                return Err(ErrorCode::RemoteAbort);
            }
            if matches!(cmd, 0x4F | 0x4B | 0x43) && data.len() >= 8 {
                let size = SdoExpeditedCmd::from(cmd).payload_size();
                let mut bytes = [0u8; 4];
                bytes[..size].copy_from_slice(&data[4..4 + size]);
                return Ok(SdoResponse::Value(u32::from_le_bytes(bytes)));
            }

            error!("unexpected SDO response command {:#04x}", cmd);
            self.send_emcy(
                EmcyPriority::Minor,
                self.node_id,
                EmcyCode::SdoClientUnexpectedResponse,
            );
            return Err(ErrorCode::ProtocolError { cmd });
        }

        error!("SDO response timeout waiting on node {}", target);
        self.send_emcy(EmcyPriority::Major, self.node_id, EmcyCode::SdoClientResponseTimeout);
        Err(ErrorCode::ResponseTimeout)
    }
}

/// Fill the 8-byte request buffer: command, little-endian index, subindex,
/// then the inline payload zero-padded to the end of the frame.
fn prepare_sdo_request(cmd: u8, index: u16, sub_index: u8, value: &[u8], out: &mut [u8; 8]) {
    out[0] = cmd;
    out[1..3].copy_from_slice(&index.to_le_bytes());
    out[3] = sub_index;
    out[4..].fill(0);
    out[4..4 + value.len()].copy_from_slice(value);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_sdo_request_layout() {
        let mut buf = [0xFFu8; 8];
        prepare_sdo_request(0x2B, 0x1017, 0x00, &[0xE8, 0x03], &mut buf);
        assert_eq!(buf, [0x2B, 0x17, 0x10, 0x00, 0xE8, 0x03, 0x00, 0x00]);
    }

    #[test]
    fn test_prepare_read_request_has_empty_payload() {
        let mut buf = [0xFFu8; 8];
        prepare_sdo_request(SDO_CMD_READ_REQUEST, 0x2000, 0x03, &[], &mut buf);
        assert_eq!(buf, [0x40, 0x00, 0x20, 0x03, 0x00, 0x00, 0x00, 0x00]);
    }
}
