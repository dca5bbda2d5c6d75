use hashbrown::HashMap;

use crate::constant::{
    DEFAULT_HEARTBEAT_INTERVAL_MS, MAX_OD_ENTRIES, MODE_STOPPED, REG_OPERATING_MODE,
    REG_PRODUCER_HEARTBEAT_TIME,
};
use crate::error::ErrorCode;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessType {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl AccessType {
    pub fn is_readable(&self) -> bool {
        !matches!(self, AccessType::WriteOnly)
    }

    pub fn is_writable(&self) -> bool {
        !matches!(self, AccessType::ReadOnly)
    }
}

/// Tagged per-size storage of a dictionary entry. Wire layout is
/// little-endian for every size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OdValue {
    U8(u8),
    U16(u16),
    U32(u32),
}

impl OdValue {
    pub fn size(&self) -> usize {
        match self {
            OdValue::U8(_) => 1,
            OdValue::U16(_) => 2,
            OdValue::U32(_) => 4,
        }
    }

    /// Zero-extended numeric view, independent of the stored width.
    pub fn as_u32(&self) -> u32 {
        match self {
            OdValue::U8(v) => *v as u32,
            OdValue::U16(v) => *v as u32,
            OdValue::U32(v) => *v,
        }
    }

    /// Serialize into `dst`, which must hold at least `size()` bytes.
    pub fn copy_to_le(&self, dst: &mut [u8]) {
        match self {
            OdValue::U8(v) => dst[0] = *v,
            OdValue::U16(v) => dst[..2].copy_from_slice(&v.to_le_bytes()),
            OdValue::U32(v) => dst[..4].copy_from_slice(&v.to_le_bytes()),
        }
    }

    /// Replace the stored value, keeping the variant. Returns false when
    /// `src` does not match the entry width exactly.
    pub fn update_from_le(&mut self, src: &[u8]) -> bool {
        match self {
            OdValue::U8(v) => {
                if src.len() != 1 {
                    return false;
                }
                *v = src[0];
            }
            OdValue::U16(v) => {
                let Ok(bytes) = src.try_into() else { return false };
                *v = u16::from_le_bytes(bytes);
            }
            OdValue::U32(v) => {
                let Ok(bytes) = src.try_into() else { return false };
                *v = u32::from_le_bytes(bytes);
            }
        }
        true
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Variable {
    index: u16,
    sub_index: u8,
    access: AccessType,
    value: OdValue,
}

impl Variable {
    pub fn index(&self) -> u16 {
        self.index
    }
    pub fn sub_index(&self) -> u8 {
        self.sub_index
    }
    pub fn access(&self) -> AccessType {
        self.access
    }
    pub fn value(&self) -> OdValue {
        self.value
    }
}

/// The node's addressable registry of typed variables keyed by
/// (index, subindex). Capacity is fixed; registration happens before the
/// engine starts servicing the bus.
#[derive(Clone, Debug)]
pub struct ObjectDirectory {
    entries: HashMap<(u16, u8), Variable>,
}

impl ObjectDirectory {
    /// An empty dictionary plus the two entries every node carries: the
    /// operating mode register and the producer heartbeat time.
    pub fn new() -> Self {
        let mut entries = HashMap::with_capacity(MAX_OD_ENTRIES);
        entries.insert(
            (REG_OPERATING_MODE, 0),
            Variable {
                index: REG_OPERATING_MODE,
                sub_index: 0,
                access: AccessType::ReadWrite,
                value: OdValue::U8(MODE_STOPPED),
            },
        );
        entries.insert(
            (REG_PRODUCER_HEARTBEAT_TIME, 0),
            Variable {
                index: REG_PRODUCER_HEARTBEAT_TIME,
                sub_index: 0,
                access: AccessType::ReadWrite,
                value: OdValue::U32(DEFAULT_HEARTBEAT_INTERVAL_MS),
            },
        );
        ObjectDirectory { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn register(
        &mut self,
        index: u16,
        sub_index: u8,
        access: AccessType,
        value: OdValue,
    ) -> Result<(), ErrorCode> {
        if self.entries.len() >= MAX_OD_ENTRIES {
            return Err(ErrorCode::DictionaryFull);
        }
        if self.entries.contains_key(&(index, sub_index)) {
            return Err(ErrorCode::DuplicateEntry { index, sub_index });
        }
        self.entries.insert((index, sub_index), Variable { index, sub_index, access, value });
        Ok(())
    }

    pub fn get(&self, index: u16, sub_index: u8) -> Result<&Variable, ErrorCode> {
        self.entries
            .get(&(index, sub_index))
            .ok_or(ErrorCode::EntryNotFound { index, sub_index })
    }

    pub fn read(&self, index: u16, sub_index: u8) -> Result<OdValue, ErrorCode> {
        self.get(index, sub_index).map(|var| var.value)
    }

    /// Overwrite an entry from little-endian bytes. `ignore_access_check`
    /// is used by the engine itself and by RPDO unpacking; the SDO server
    /// enforces access.
    pub fn set_value(
        &mut self,
        index: u16,
        sub_index: u8,
        data: &[u8],
        ignore_access_check: bool,
    ) -> Result<(), ErrorCode> {
        let var = self
            .entries
            .get_mut(&(index, sub_index))
            .ok_or(ErrorCode::EntryNotFound { index, sub_index })?;
        if !ignore_access_check && !var.access.is_writable() {
            return Err(ErrorCode::AccessViolation { index, sub_index });
        }
        let expected = var.value.size();
        if !var.value.update_from_le(data) {
            return Err(ErrorCode::SizeMismatch { index, sub_index, expected, actual: data.len() });
        }
        Ok(())
    }
}

impl Default for ObjectDirectory {
    fn default() -> Self {
        Self::new()
    }
}
