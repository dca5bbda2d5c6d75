//! Byte-fed parser for the VE.Direct text protocol spoken by Victron
//! battery monitors. Records are `Name<TAB>Value<CR><LF>` lines; a frame
//! ends with a record named `Checksum` whose value byte makes the 8-bit sum
//! of every transmitted byte zero.

use crate::warn;

/// A frame carries at most 22 fields.
const BLOCK_LEN: usize = 22;
/// Field labels are at most 8 characters.
const LABEL_LEN: usize = 9;
/// Field values are at most 32 characters.
const VALUE_LEN: usize = 33;

const CHECKSUM_TAG: &[u8] = b"CHECKSUM";

#[derive(Debug, Clone, Copy)]
enum FrameState {
    Idle,
    RecordBegin,
    RecordName,
    RecordValue,
    Checksum,
}

/// One name/value pair from a validated frame. Names are stored uppercased;
/// values are kept verbatim.
#[derive(Debug, Clone, Copy)]
pub struct VeField {
    name: [u8; LABEL_LEN],
    name_len: usize,
    value: [u8; VALUE_LEN],
    value_len: usize,
}

impl VeField {
    const EMPTY: VeField =
        VeField { name: [0; LABEL_LEN], name_len: 0, value: [0; VALUE_LEN], value_len: 0 };

    pub fn name(&self) -> &str {
        core::str::from_utf8(&self.name[..self.name_len]).unwrap_or("")
    }

    pub fn value(&self) -> &str {
        core::str::from_utf8(&self.value[..self.value_len]).unwrap_or("")
    }
}

/// The frame-level state machine. Bytes go in through [`rx_data`]; once a
/// frame passes the checksum its fields are promoted into a public table
/// with upsert semantics and [`is_data_available`] turns true.
///
/// [`rx_data`]: VeDirectParser::rx_data
/// [`is_data_available`]: VeDirectParser::is_data_available
#[derive(Debug)]
pub struct VeDirectParser {
    state: FrameState,
    checksum: u8,
    name: [u8; LABEL_LEN],
    name_len: usize,
    value: [u8; VALUE_LEN],
    value_len: usize,
    // Fields of the frame currently being parsed. Promoted to `fields`
    // only after the checksum verifies.
    temp: [VeField; BLOCK_LEN],
    frame_index: usize,
    fields: [VeField; BLOCK_LEN],
    field_count: usize,
    new_data_available: bool,
    /// Accept frames regardless of checksum validity.
    pub ignore_checksum: bool,
}

impl VeDirectParser {
    pub fn new() -> Self {
        VeDirectParser {
            state: FrameState::Idle,
            checksum: 0,
            name: [0; LABEL_LEN],
            name_len: 0,
            value: [0; VALUE_LEN],
            value_len: 0,
            temp: [VeField::EMPTY; BLOCK_LEN],
            frame_index: 0,
            fields: [VeField::EMPTY; BLOCK_LEN],
            field_count: 0,
            new_data_available: false,
            ignore_checksum: false,
        }
    }

    /// Feed one byte from the serial stream. Every byte counts toward the
    /// checksum, including bytes dropped between frames.
    pub fn rx_data(&mut self, byte: u8) {
        self.checksum = self.checksum.wrapping_add(byte);

        match self.state {
            FrameState::Idle => {
                // Only a newline opens a record; \r and stray line tails
                // are dropped.
                if byte == b'\n' {
                    self.state = FrameState::RecordBegin;
                }
            }
            FrameState::RecordBegin => {
                self.name_len = 0;
                self.push_name(byte);
                self.state = FrameState::RecordName;
            }
            FrameState::RecordName => {
                if byte == b'\t' {
                    if self.name[..self.name_len] == *CHECKSUM_TAG {
                        self.state = FrameState::Checksum;
                    } else {
                        self.value_len = 0;
                        self.state = FrameState::RecordValue;
                    }
                } else {
                    self.push_name(byte);
                }
            }
            FrameState::RecordValue => match byte {
                b'\n' => {
                    self.store_field();
                    self.state = FrameState::RecordBegin;
                }
                b'\r' => {}
                _ => self.push_value(byte),
            },
            FrameState::Checksum => {
                // This state consumes the checksum byte itself, so a valid
                // frame leaves the accumulator at exactly zero.
                let valid = self.ignore_checksum || self.checksum == 0;
                if !valid {
                    warn!("invalid VE.Direct frame, checksum residue {}", self.checksum);
                }
                self.state = FrameState::Idle;
                self.frame_end(valid);
                self.checksum = 0;
            }
        }
    }

    /// True once a complete valid frame has been promoted.
    pub fn is_data_available(&self) -> bool {
        self.new_data_available
    }

    /// Clear the new-data flag; the public table keeps its contents.
    pub fn clear_data(&mut self) {
        self.new_data_available = false;
    }

    /// The promoted name/value pairs.
    pub fn fields(&self) -> impl Iterator<Item = &VeField> {
        self.fields[..self.field_count].iter()
    }

    /// Look up a promoted field's value by name, case-insensitively.
    pub fn value_of(&self, name: &str) -> Option<&str> {
        self.fields()
            .find(|field| field.name().eq_ignore_ascii_case(name))
            .map(|field| field.value())
    }

    fn push_name(&mut self, byte: u8) {
        if self.name_len < LABEL_LEN - 1 {
            self.name[self.name_len] = byte.to_ascii_uppercase();
            self.name_len += 1;
        }
    }

    fn push_value(&mut self, byte: u8) {
        if self.value_len < VALUE_LEN - 1 {
            self.value[self.value_len] = byte;
            self.value_len += 1;
        }
    }

    fn store_field(&mut self) {
        if self.frame_index < BLOCK_LEN {
            let slot = &mut self.temp[self.frame_index];
            slot.name = self.name;
            slot.name_len = self.name_len;
            slot.value = self.value;
            slot.value_len = self.value_len;
            self.frame_index += 1;
        }
    }

    fn frame_end(&mut self, valid: bool) {
        if valid {
            self.new_data_available = true;
            for i in 0..self.frame_index {
                let field = self.temp[i];
                self.upsert(&field);
            }
        }
        self.frame_index = 0;
    }

    fn upsert(&mut self, field: &VeField) {
        for existing in self.fields[..self.field_count].iter_mut() {
            if existing.name() == field.name() {
                existing.value = field.value;
                existing.value_len = field.value_len;
                return;
            }
        }
        // New name: append, overwriting the last slot once the table is
        // full.
        let slot = self.field_count.min(BLOCK_LEN - 1);
        self.fields[slot] = *field;
        self.field_count = (self.field_count + 1).min(BLOCK_LEN);
    }
}

impl Default for VeDirectParser {
    fn default() -> Self {
        Self::new()
    }
}
