use embedded_can::{Frame, Id, StandardId};

use crate::error::ErrorCode;
use crate::prelude::*;

pub fn get_cob_id<F: Frame>(frame: &F) -> Option<u16> {
    if let Id::Standard(sid) = frame.id() {
        return Some(sid.as_raw());
    }
    // No standard id. We only support CAN 2.0a in current version.
    None
}

pub fn create_frame<F: Frame + Debug>(cob_id: u16, data: &[u8]) -> Result<F, ErrorCode> {
    F::new(StandardId::new(cob_id).ok_or(ErrorCode::InvalidStandardId { cob_id })?, data)
        .ok_or(ErrorCode::FrameCreationFailed)
}

/// Build a frame whose payload is zero-padded to the full 8 bytes, as SDO
/// frames always carry DLC 8.
pub fn create_frame_with_padding<F: Frame + Debug>(cob_id: u16, data: &[u8]) -> Result<F, ErrorCode> {
    let mut packet = [0u8; 8];
    let len = data.len().min(8);
    packet[..len].copy_from_slice(&data[..len]);
    create_frame(cob_id, &packet)
}

#[cfg(test)]
mod util_tests {
    use core::fmt::{Debug, Formatter};

    use embedded_can::{Frame, Id};

    use super::{create_frame, create_frame_with_padding, get_cob_id, ErrorCode};

    struct MockFrame {
        id: Id,
        data: Vec<u8>,
    }

    impl Frame for MockFrame {
        fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
            if data.len() > 8 {
                None
            } else {
                Some(MockFrame { id: id.into(), data: data.to_vec() })
            }
        }

        fn new_remote(_id: impl Into<Id>, _dlc: usize) -> Option<Self> {
            None
        }

        fn is_extended(&self) -> bool {
            matches!(self.id, Id::Extended(_))
        }

        fn is_remote_frame(&self) -> bool {
            false
        }

        fn id(&self) -> Id {
            self.id
        }

        fn dlc(&self) -> usize {
            self.data.len()
        }

        fn data(&self) -> &[u8] {
            &self.data
        }
    }

    impl Debug for MockFrame {
        fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
            write!(f, "mock_frame: {:x?}", self.data)
        }
    }

    #[test]
    fn test_create_frame_success() {
        let frame = create_frame::<MockFrame>(0x123, &[0x01, 0x02, 0x03]).unwrap();
        assert_eq!(frame.data(), &[0x01, 0x02, 0x03]);
        assert_eq!(get_cob_id(&frame), Some(0x123));
    }

    #[test]
    fn test_create_frame_invalid_standard_id() {
        let result = create_frame::<MockFrame>(0x1FFF, &[0x01]);
        assert!(matches!(result, Err(ErrorCode::InvalidStandardId { cob_id: 0x1FFF })));
    }

    #[test]
    fn test_padding_fills_eight_bytes() {
        let frame = create_frame_with_padding::<MockFrame>(0x585, &[0x60, 0x17, 0x10]).unwrap();
        assert_eq!(frame.dlc(), 8);
        assert_eq!(frame.data(), &[0x60, 0x17, 0x10, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_padding_truncates_long_input() {
        let frame =
            create_frame_with_padding::<MockFrame>(0x585, &[1, 2, 3, 4, 5, 6, 7, 8, 9]).unwrap();
        assert_eq!(frame.data(), &[1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_extended_id_has_no_cob_id() {
        let frame = MockFrame::new(Id::Extended(embedded_can::ExtendedId::MAX), &[0]).unwrap();
        assert_eq!(get_cob_id(&frame), None);
    }
}
