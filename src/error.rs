use core::fmt;
use core::fmt::Formatter;

/// Runtime error taxonomy. Configuration and dictionary errors stay local to
/// the caller; transmit, protocol, timeout and abort errors are also
/// reported on the bus through an emergency frame at the call site.
#[derive(Clone, Copy, Eq, PartialEq)]
pub enum ErrorCode {
    InvalidStandardId { cob_id: u16 },
    FrameCreationFailed,
    ChannelDisabled { channel: usize },
    MappingOverflow,
    UnsupportedSize { size: usize },
    EntryNotFound { index: u16, sub_index: u8 },
    SizeMismatch { index: u16, sub_index: u8, expected: usize, actual: usize },
    DlcMismatch { expected: usize, actual: usize },
    AccessViolation { index: u16, sub_index: u8 },
    DuplicateEntry { index: u16, sub_index: u8 },
    DictionaryFull,
    TransmitFailed,
    ProtocolError { cmd: u8 },
    ResponseTimeout,
    RemoteAbort,
}

impl fmt::Debug for ErrorCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::InvalidStandardId { cob_id } => write!(f, "Invalid Standard ID: {:#x}", cob_id),
            ErrorCode::FrameCreationFailed => write!(f, "Frame creation failed"),
            ErrorCode::ChannelDisabled { channel } => write!(f, "PDO channel {} is disabled", channel),
            ErrorCode::MappingOverflow => write!(f, "PDO mapping exceeds the 8 byte payload"),
            ErrorCode::UnsupportedSize { size } => write!(f, "Unsupported object size: {}", size),
            ErrorCode::EntryNotFound { index, sub_index } =>
                write!(f, "No entry at {:#06x}:{:#04x}", index, sub_index),
            ErrorCode::SizeMismatch { index, sub_index, expected, actual } =>
                write!(f, "Size mismatch at {:#06x}:{:#04x}: entry holds {} bytes, got {}",
                       index, sub_index, expected, actual),
            ErrorCode::DlcMismatch { expected, actual } =>
                write!(f, "DLC mismatch: mapping needs {} bytes, frame carries {}", expected, actual),
            ErrorCode::AccessViolation { index, sub_index } =>
                write!(f, "Access violation at {:#06x}:{:#04x}", index, sub_index),
            ErrorCode::DuplicateEntry { index, sub_index } =>
                write!(f, "Entry {:#06x}:{:#04x} is already registered", index, sub_index),
            ErrorCode::DictionaryFull => write!(f, "Object dictionary is full"),
            ErrorCode::TransmitFailed => write!(f, "Driver transmit failed"),
            ErrorCode::ProtocolError { cmd } => write!(f, "Unexpected SDO command {:#04x}", cmd),
            ErrorCode::ResponseTimeout => write!(f, "SDO response timed out"),
            ErrorCode::RemoteAbort => write!(f, "Peer aborted the SDO transfer"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_debug() {
        assert_eq!(format!("{:?}", ErrorCode::InvalidStandardId { cob_id: 0x823 }),
                   "Invalid Standard ID: 0x823");
        assert_eq!(format!("{:?}", ErrorCode::EntryNotFound { index: 0x1017, sub_index: 1 }),
                   "No entry at 0x1017:0x01");
        assert_eq!(format!("{:?}", ErrorCode::DlcMismatch { expected: 3, actual: 1 }),
                   "DLC mismatch: mapping needs 3 bytes, frame carries 1");
        assert_eq!(format!("{:?}", ErrorCode::ResponseTimeout), "SDO response timed out");
    }
}
