use bitfield_struct::bitfield;

/// Read (upload) request command byte.
pub(crate) const SDO_CMD_READ_REQUEST: u8 = 0x40;
/// Write (download) confirmation command byte.
pub(crate) const SDO_CMD_WRITE_RESPONSE: u8 = 0x60;
/// Transfer abort command byte.
pub(crate) const SDO_CMD_ABORT: u8 = 0x80;

/// Command byte of an expedited SDO transfer, MSB first.
/// The bitfield representation is based on an `u8` (8-bit unsigned integer), with the most significant bit (MSB) ordering.
#[bitfield(u8, order = Msb)]
pub struct SdoExpeditedCmd {
    /// Command Specifier.
    /// 1 = initiate download (write), 2 = initiate upload (read) and its
    /// response, 3 = download confirmation, 4 = abort.
    #[bits(3)]
    pub ccs: u8,

    /// Reserved bit.
    /// This bit is reserved for future use and should typically be set to 0.
    #[bits(1)]
    _reserved_0: u8,

    /// Number of data bytes in 4..8 that do not contain data, 0 to 3.
    #[bits(2)]
    pub n: u8,

    /// Expedited Transfer flag.
    /// Set when the payload travels inline in the same frame.
    #[bits(1)]
    pub e: bool,

    /// Size indicator.
    /// If set (`true`), indicates that the `n` field is valid.
    #[bits(1)]
    pub s: bool,
}

impl SdoExpeditedCmd {
    /// Inline payload byte count declared by this command.
    pub fn payload_size(&self) -> usize {
        4 - self.n() as usize
    }

    /// Read response command for an inline payload of `size` bytes
    /// (1 => 0x4F, 2 => 0x4B, 4 => 0x43).
    pub fn upload_response(size: usize) -> u8 {
        Self::new().with_ccs(2).with_n(((4 - size) & 0x3) as u8).with_e(true).with_s(true).into()
    }

    /// Write request command carrying `size` bytes inline
    /// (1 => 0x2F, 2 => 0x2B, 4 => 0x23).
    pub fn download_request(size: usize) -> u8 {
        Self::new().with_ccs(1).with_n(((4 - size) & 0x3) as u8).with_e(true).with_s(true).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_bytes_match_the_wire() {
        assert_eq!(SdoExpeditedCmd::upload_response(1), 0x4F);
        assert_eq!(SdoExpeditedCmd::upload_response(2), 0x4B);
        assert_eq!(SdoExpeditedCmd::upload_response(4), 0x43);
        assert_eq!(SdoExpeditedCmd::download_request(1), 0x2F);
        assert_eq!(SdoExpeditedCmd::download_request(2), 0x2B);
        assert_eq!(SdoExpeditedCmd::download_request(4), 0x23);
    }

    #[test]
    fn test_payload_size_decodes_n() {
        assert_eq!(SdoExpeditedCmd::from(0x4Fu8).payload_size(), 1);
        assert_eq!(SdoExpeditedCmd::from(0x4Bu8).payload_size(), 2);
        assert_eq!(SdoExpeditedCmd::from(0x43u8).payload_size(), 4);
    }
}
