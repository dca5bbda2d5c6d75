use crate::constant::{COB_FUNC_EMCY, CTRL_TX_TIMEOUT_MS, MAX_MINOR_EMCY_COUNT, MODE_STOPPED};
use crate::driver::{CanDriver, Clock};
use crate::node::Node;
use crate::util::create_frame;
use crate::{error, warn};
use embedded_can::Frame;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum EmcyPriority {
    /// A major error stops the node before the frame goes out.
    Major,
    /// Minor errors are tolerated up to a threshold, then escalated.
    Minor,
}

impl EmcyPriority {
    pub(crate) fn code(&self) -> u8 {
        match *self {
            EmcyPriority::Major => 0x00,
            EmcyPriority::Minor => 0x01,
        }
    }
}

/// The 32-bit error code registry carried in emergency frames.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum EmcyCode {
    SdoEntryNotFound,
    SdoUnsupportedSize,
    SdoUnknownWriteCommand,
    SdoSizeMismatch,
    SdoResponseTransmitFailed,
    SdoClientInvalidSize,
    SdoClientRequestTransmitFailed,
    SdoClientResponseTimeout,
    SdoClientRemoteAbort,
    SdoClientUnexpectedResponse,
    SdoAccessViolation,
    HeartbeatPeerTimeout,
    NmtTransmitFailed,
    MinorErrorEscalation,
    TpdoMappingFailed,
    RpdoMappingFailed,
    TpdoTransmitFailed,
    RpdoUnpackFailed,
}

impl EmcyCode {
    pub fn code(&self) -> u32 {
        match *self {
            EmcyCode::SdoEntryNotFound => 0x0000_0001,
            EmcyCode::SdoUnsupportedSize => 0x0000_0002,
            EmcyCode::SdoUnknownWriteCommand => 0x0000_0003,
            EmcyCode::SdoSizeMismatch => 0x0000_0004,
            EmcyCode::SdoResponseTransmitFailed => 0x0000_0005,
            EmcyCode::SdoClientInvalidSize => 0x0000_0006,
            EmcyCode::SdoClientRequestTransmitFailed => 0x0000_0007,
            EmcyCode::SdoClientResponseTimeout => 0x0000_0008,
            EmcyCode::SdoClientRemoteAbort => 0x0000_0009,
            EmcyCode::SdoClientUnexpectedResponse => 0x0000_000A,
            EmcyCode::SdoAccessViolation => 0x0000_000B,
            EmcyCode::HeartbeatPeerTimeout => 0x0000_0101,
            EmcyCode::NmtTransmitFailed => 0x0000_0201,
            EmcyCode::MinorErrorEscalation => 0x0000_0301,
            EmcyCode::TpdoMappingFailed => 0x0000_0401,
            EmcyCode::RpdoMappingFailed => 0x0000_0402,
            EmcyCode::TpdoTransmitFailed => 0x0000_0403,
            EmcyCode::RpdoUnpackFailed => 0x0000_0404,
        }
    }

    #[allow(dead_code)]
    pub(crate) fn from_code(code: u32) -> Option<Self> {
        match code {
            0x0000_0001 => Some(EmcyCode::SdoEntryNotFound),
            0x0000_0002 => Some(EmcyCode::SdoUnsupportedSize),
            0x0000_0003 => Some(EmcyCode::SdoUnknownWriteCommand),
            0x0000_0004 => Some(EmcyCode::SdoSizeMismatch),
            0x0000_0005 => Some(EmcyCode::SdoResponseTransmitFailed),
            0x0000_0006 => Some(EmcyCode::SdoClientInvalidSize),
            0x0000_0007 => Some(EmcyCode::SdoClientRequestTransmitFailed),
            0x0000_0008 => Some(EmcyCode::SdoClientResponseTimeout),
            0x0000_0009 => Some(EmcyCode::SdoClientRemoteAbort),
            0x0000_000A => Some(EmcyCode::SdoClientUnexpectedResponse),
            0x0000_000B => Some(EmcyCode::SdoAccessViolation),
            0x0000_0101 => Some(EmcyCode::HeartbeatPeerTimeout),
            0x0000_0201 => Some(EmcyCode::NmtTransmitFailed),
            0x0000_0301 => Some(EmcyCode::MinorErrorEscalation),
            0x0000_0401 => Some(EmcyCode::TpdoMappingFailed),
            0x0000_0402 => Some(EmcyCode::RpdoMappingFailed),
            0x0000_0403 => Some(EmcyCode::TpdoTransmitFailed),
            0x0000_0404 => Some(EmcyCode::RpdoUnpackFailed),
            _ => None,
        }
    }
}

impl From<EmcyCode> for u32 {
    fn from(code: EmcyCode) -> u32 {
        code.code()
    }
}

impl<CAN, CLK> Node<CAN, CLK>
where
    CAN: CanDriver,
    CLK: Clock,
{
    /// Emit an emergency frame on behalf of `node_id` and apply the
    /// escalation policy.
    ///
    /// A major emergency forces the node into `Stopped` before anything hits
    /// the wire. The fifth consecutive minor emergency is swallowed and
    /// replaced by a major `MinorErrorEscalation`.
    pub fn send_emcy(&mut self, priority: EmcyPriority, node_id: u8, error_code: impl Into<u32>) {
        let error_code = error_code.into();
        let mut data = [0u8; 6];
        data[0] = priority.code();
        data[1] = node_id;
        data[2..6].copy_from_slice(&error_code.to_le_bytes());

        if priority == EmcyPriority::Major {
            self.set_operating_mode(MODE_STOPPED);
        }

        if priority == EmcyPriority::Minor {
            self.minor_emcy_count = self.minor_emcy_count.saturating_add(1);
            if self.minor_emcy_count >= MAX_MINOR_EMCY_COUNT {
                // Reset first so the recursive major send cannot loop.
                self.minor_emcy_count = 0;
                self.send_emcy(EmcyPriority::Major, node_id, EmcyCode::MinorErrorEscalation);
                return;
            }
        }

        let frame = match create_frame(COB_FUNC_EMCY + node_id as u16, &data) {
            Ok(frame) => frame,
            Err(ec) => {
                error!("errors in creating EMCY frame: {:?}", ec);
                return;
            }
        };
        if self.driver.transmit(&frame, CTRL_TX_TIMEOUT_MS).is_err()
            && self.driver.transmit(&frame, CTRL_TX_TIMEOUT_MS).is_err()
        {
            error!("EMCY transmission failed twice, code {:#010x}", error_code);
        }
    }

    /// Consume a peer emergency frame: a major one halts our PDO service,
    /// a minor one counts toward the escalation threshold.
    pub(crate) fn process_emcy_frame(&mut self, frame: &CAN::Frame) {
        if frame.dlc() < 1 {
            return;
        }
        match frame.data()[0] {
            0x00 => {
                warn!("major EMCY on the bus, stopping PDO service");
                self.set_operating_mode(MODE_STOPPED);
            }
            0x01 => self.minor_emcy_count = self.minor_emcy_count.saturating_add(1),
            _ => {}
        }
    }
}
