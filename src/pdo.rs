use embedded_can::Frame;

use crate::constant::{
    COB_FUNC_RPDO_0, COB_FUNC_TPDO_0, MAX_PDO_MAPPINGS, MAX_PDO_PAYLOAD, PDO_CHANNELS,
    PDO_TX_TIMEOUT_MS, TRANS_TYPE_ASYNC,
};
use crate::driver::{CanDriver, Clock};
use crate::emergency::{EmcyCode, EmcyPriority};
use crate::error::ErrorCode;
use crate::node::Node;
use crate::util::{create_frame, get_cob_id};
use crate::{debug, error};

/// Bit 31 of the stored COB-ID marks the channel disabled.
pub const PDO_COB_DISABLED: u32 = 0x8000_0000;

/// Communication parameters of one PDO channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdoComm {
    cob_id: u32,
    trans_type: u8,
    // Stored in milliseconds for runtime simplicity; the standard declares
    // 100 us units for the inhibit time.
    inhibit_time: u16,
    event_timer: u16,
    enabled: bool,
}

impl PdoComm {
    fn set(&mut self, cob_id: u32, trans_type: u8, inhibit_ms: u16, event_ms: u16) {
        self.cob_id = cob_id;
        self.trans_type = trans_type;
        self.inhibit_time = inhibit_ms;
        self.event_timer = event_ms;
        self.enabled = cob_id & PDO_COB_DISABLED == 0;
    }

    pub fn cob_id(&self) -> u32 {
        self.cob_id
    }

    /// The on-wire 11-bit identifier.
    pub fn can_id(&self) -> u16 {
        (self.cob_id & 0x7FF) as u16
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn trans_type(&self) -> u8 {
        self.trans_type
    }

    pub fn inhibit_time(&self) -> u16 {
        self.inhibit_time
    }

    pub fn event_timer(&self) -> u16 {
        self.event_timer
    }
}

/// One byte-aligned object mapping: `len_bits` must be 8, 16 or 32.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PdoMapEntry {
    pub index: u16,
    pub sub_index: u8,
    pub len_bits: u8,
}

impl PdoMapEntry {
    fn len_bytes(&self) -> usize {
        (self.len_bits / 8) as usize
    }

    fn is_byte_aligned(&self) -> bool {
        matches!(self.len_bits, 8 | 16 | 32)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct PdoMap {
    count: u8,
    entries: [PdoMapEntry; MAX_PDO_MAPPINGS],
}

impl PdoMap {
    fn entries(&self) -> &[PdoMapEntry] {
        &self.entries[..self.count as usize]
    }

    fn total_bytes(&self) -> usize {
        self.entries().iter().map(|entry| entry.len_bytes()).sum()
    }

    fn assign(&mut self, entries: &[PdoMapEntry]) -> Result<(), ErrorCode> {
        if entries.len() > MAX_PDO_MAPPINGS {
            return Err(ErrorCode::MappingOverflow);
        }
        let mut total = 0;
        for entry in entries {
            if !entry.is_byte_aligned() {
                return Err(ErrorCode::UnsupportedSize { size: entry.len_bits as usize });
            }
            total += entry.len_bytes();
        }
        if total > MAX_PDO_PAYLOAD {
            return Err(ErrorCode::MappingOverflow);
        }
        self.count = entries.len() as u8;
        self.entries[..entries.len()].copy_from_slice(entries);
        Ok(())
    }
}

/// Runtime state of a transmit channel: the last payload put on the wire
/// (for coalescing), its timestamp (for event timer and inhibit), and the
/// application's event request.
#[derive(Debug, Clone, Copy, Default)]
struct TpdoState {
    last_tx_ms: u32,
    last_payload: [u8; MAX_PDO_PAYLOAD],
    last_len: u8,
    last_valid: bool,
    dirty: bool,
}

#[derive(Debug, Clone, Copy, Default)]
struct TpdoChannel {
    comm: PdoComm,
    map: PdoMap,
    state: TpdoState,
}

#[derive(Debug, Clone, Copy, Default)]
struct RpdoChannel {
    comm: PdoComm,
    map: PdoMap,
}

/// The four transmit and four receive channels of one node.
#[derive(Debug, Clone)]
pub struct PdoObjects {
    tpdo: [TpdoChannel; PDO_CHANNELS],
    rpdo: [RpdoChannel; PDO_CHANNELS],
}

impl PdoObjects {
    /// Every channel starts at its standard COB-ID with bit 31 set, so
    /// nothing is transmitted or accepted until the application enables it.
    pub(crate) fn new(node_id: u8) -> Self {
        let mut tpdo = [TpdoChannel::default(); PDO_CHANNELS];
        let mut rpdo = [RpdoChannel::default(); PDO_CHANNELS];
        for (i, channel) in tpdo.iter_mut().enumerate() {
            let cob_id = COB_FUNC_TPDO_0 as u32 + i as u32 * 0x100 + node_id as u32;
            channel.comm.set(PDO_COB_DISABLED | cob_id, TRANS_TYPE_ASYNC, 0, 0);
        }
        for (i, channel) in rpdo.iter_mut().enumerate() {
            let cob_id = COB_FUNC_RPDO_0 as u32 + i as u32 * 0x100 + node_id as u32;
            channel.comm.set(PDO_COB_DISABLED | cob_id, TRANS_TYPE_ASYNC, 0, 0);
        }
        PdoObjects { tpdo, rpdo }
    }

    pub fn tpdo_comm(&self, channel: usize) -> Option<&PdoComm> {
        self.tpdo.get(channel).map(|ch| &ch.comm)
    }

    pub fn rpdo_comm(&self, channel: usize) -> Option<&PdoComm> {
        self.rpdo.get(channel).map(|ch| &ch.comm)
    }
}

impl<CAN, CLK> Node<CAN, CLK>
where
    CAN: CanDriver,
    CLK: Clock,
{
    /// Set communication parameters for a transmit channel. Bit 31 of
    /// `cob_id` marks the channel disabled.
    pub fn configure_tpdo(
        &mut self,
        channel: usize,
        cob_id: u32,
        trans_type: u8,
        inhibit_ms: u16,
        event_ms: u16,
    ) -> bool {
        match self.pdo_objects.tpdo.get_mut(channel) {
            Some(ch) => {
                ch.comm.set(cob_id, trans_type, inhibit_ms, event_ms);
                true
            }
            None => false,
        }
    }

    /// Set communication parameters for a receive channel. Receive channels
    /// have no event timer.
    pub fn configure_rpdo(
        &mut self,
        channel: usize,
        cob_id: u32,
        trans_type: u8,
        inhibit_ms: u16,
    ) -> bool {
        match self.pdo_objects.rpdo.get_mut(channel) {
            Some(ch) => {
                ch.comm.set(cob_id, trans_type, inhibit_ms, 0);
                true
            }
            None => false,
        }
    }

    /// Replace the mapping list of a transmit channel. At most 8 entries,
    /// byte-aligned, 8 payload bytes total.
    pub fn map_tpdo(&mut self, channel: usize, entries: &[PdoMapEntry]) -> bool {
        match self.pdo_objects.tpdo.get_mut(channel) {
            Some(ch) => ch.map.assign(entries).is_ok(),
            None => false,
        }
    }

    /// Replace the mapping list of a receive channel.
    pub fn map_rpdo(&mut self, channel: usize, entries: &[PdoMapEntry]) -> bool {
        match self.pdo_objects.rpdo.get_mut(channel) {
            Some(ch) => ch.map.assign(entries).is_ok(),
            None => false,
        }
    }

    /// Request an event-driven transmission on the next service pass.
    pub fn mark_tpdo_dirty(&mut self, channel: usize) {
        if let Some(ch) = self.pdo_objects.tpdo.get_mut(channel) {
            ch.state.dirty = true;
        }
    }

    fn try_pack_tpdo(&self, channel: usize) -> Result<([u8; MAX_PDO_PAYLOAD], usize), ErrorCode> {
        let ch = &self.pdo_objects.tpdo[channel];
        if !ch.comm.enabled {
            return Err(ErrorCode::ChannelDisabled { channel });
        }
        let mut payload = [0u8; MAX_PDO_PAYLOAD];
        let mut offset = 0;
        for entry in ch.map.entries() {
            if !entry.is_byte_aligned() {
                return Err(ErrorCode::UnsupportedSize { size: entry.len_bits as usize });
            }
            let len = entry.len_bytes();
            if offset + len > MAX_PDO_PAYLOAD {
                return Err(ErrorCode::MappingOverflow);
            }
            let value = self.object_directory.get(entry.index, entry.sub_index)?.value();
            if value.size() != len {
                return Err(ErrorCode::SizeMismatch {
                    index: entry.index,
                    sub_index: entry.sub_index,
                    expected: value.size(),
                    actual: len,
                });
            }
            value.copy_to_le(&mut payload[offset..offset + len]);
            offset += len;
        }
        Ok((payload, offset))
    }

    /// Project the mapped dictionary entries into a payload. Any failure is
    /// reported as a minor mapping emergency.
    fn pack_tpdo(&mut self, channel: usize) -> Option<([u8; MAX_PDO_PAYLOAD], usize)> {
        match self.try_pack_tpdo(channel) {
            Ok(packed) => Some(packed),
            Err(ec) => {
                error!("TPDO {} pack failed: {:?}", channel, ec);
                self.send_emcy(EmcyPriority::Minor, self.node_id, EmcyCode::TpdoMappingFailed);
                None
            }
        }
    }

    fn try_unpack_rpdo(&mut self, channel: usize, data: &[u8]) -> Result<(), ErrorCode> {
        let ch = self.pdo_objects.rpdo[channel];
        if !ch.comm.enabled {
            return Err(ErrorCode::ChannelDisabled { channel });
        }
        // The DLC must match the mapping exactly; a short or long frame
        // must not touch the dictionary at all.
        let expected = ch.map.total_bytes();
        if expected != data.len() {
            return Err(ErrorCode::DlcMismatch { expected, actual: data.len() });
        }
        let mut offset = 0;
        for entry in ch.map.entries() {
            if !entry.is_byte_aligned() {
                return Err(ErrorCode::UnsupportedSize { size: entry.len_bits as usize });
            }
            let len = entry.len_bytes();
            let value = self.object_directory.get(entry.index, entry.sub_index)?.value();
            if value.size() != len {
                return Err(ErrorCode::SizeMismatch {
                    index: entry.index,
                    sub_index: entry.sub_index,
                    expected: value.size(),
                    actual: len,
                });
            }
            self.object_directory.set_value(
                entry.index,
                entry.sub_index,
                &data[offset..offset + len],
                true,
            )?;
            offset += len;
        }
        Ok(())
    }

    /// Write a received payload into the mapped dictionary entries. Any
    /// failure is reported as a minor mapping emergency.
    fn unpack_rpdo(&mut self, channel: usize, data: &[u8]) -> Result<(), ErrorCode> {
        match self.try_unpack_rpdo(channel, data) {
            Ok(()) => Ok(()),
            Err(ec) => {
                error!("RPDO {} unpack failed: {:?}", channel, ec);
                self.send_emcy(EmcyPriority::Minor, self.node_id, EmcyCode::RpdoMappingFailed);
                Err(ec)
            }
        }
    }

    /// Route a frame to the lowest-indexed enabled receive channel whose
    /// COB-ID matches. Frames that match no channel are dropped silently.
    pub(crate) fn process_rpdo(&mut self, frame: &CAN::Frame) {
        let can_id = match get_cob_id(frame) {
            Some(can_id) => can_id,
            None => return,
        };
        for channel in 0..PDO_CHANNELS {
            let comm = self.pdo_objects.rpdo[channel].comm;
            if comm.enabled && comm.can_id() == can_id {
                if self.unpack_rpdo(channel, frame.data()).is_err() {
                    self.send_emcy(EmcyPriority::Minor, self.node_id, EmcyCode::RpdoUnpackFailed);
                }
                return;
            }
        }
    }

    /// The transmit scheduler: event timers, dirty flags, inhibit windows
    /// and payload coalescing, in channel order.
    pub(crate) fn service_tpdos(&mut self) {
        let now = self.now_ms();
        for channel in 0..PDO_CHANNELS {
            let ch = self.pdo_objects.tpdo[channel];
            if !ch.comm.enabled || ch.comm.trans_type != TRANS_TYPE_ASYNC {
                continue;
            }

            let elapsed = now.wrapping_sub(ch.state.last_tx_ms);
            let timer_due =
                ch.comm.event_timer > 0 && elapsed >= ch.comm.event_timer as u32;
            if !timer_due && !ch.state.dirty {
                continue;
            }

            // Inside the inhibit window: skip, but keep the dirty flag so
            // the request survives to the next pass.
            if ch.comm.inhibit_time > 0 && elapsed < ch.comm.inhibit_time as u32 {
                continue;
            }

            let (payload, len) = match self.pack_tpdo(channel) {
                Some(packed) => packed,
                None => continue,
            };

            {
                let state = &mut self.pdo_objects.tpdo[channel].state;
                if state.last_valid
                    && state.last_len as usize == len
                    && state.last_payload[..len] == payload[..len]
                {
                    // Mapped data unchanged since the last transmission.
                    debug!("TPDO {} coalesced", channel);
                    state.dirty = false;
                    continue;
                }
            }

            let frame = match create_frame(ch.comm.can_id(), &payload[..len]) {
                Ok(frame) => frame,
                Err(ec) => {
                    error!("errors in creating TPDO frame: {:?}", ec);
                    continue;
                }
            };
            if self.transmit(&frame, PDO_TX_TIMEOUT_MS).is_ok() {
                let state = &mut self.pdo_objects.tpdo[channel].state;
                state.last_tx_ms = now;
                state.last_payload = payload;
                state.last_len = len as u8;
                state.last_valid = true;
                state.dirty = false;
            } else {
                // State untouched: the channel retries on the next tick.
                self.send_emcy(EmcyPriority::Minor, self.node_id, EmcyCode::TpdoTransmitFailed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enabled_is_derived_from_bit31() {
        let mut comm = PdoComm::default();
        comm.set(0x185, TRANS_TYPE_ASYNC, 0, 0);
        assert!(comm.enabled());
        assert_eq!(comm.can_id(), 0x185);

        comm.set(PDO_COB_DISABLED | 0x185, TRANS_TYPE_ASYNC, 0, 0);
        assert!(!comm.enabled());
        assert_eq!(comm.can_id(), 0x185);
    }

    #[test]
    fn test_map_rejects_overflow_and_odd_sizes() {
        let mut map = PdoMap::default();
        let wide = PdoMapEntry { index: 0x2000, sub_index: 0, len_bits: 32 };
        assert_eq!(map.assign(&[wide; 3]), Err(ErrorCode::MappingOverflow));
        assert!(matches!(
            map.assign(&[PdoMapEntry { index: 0x2000, sub_index: 0, len_bits: 12 }]),
            Err(ErrorCode::UnsupportedSize { size: 12 })
        ));
        let byte = PdoMapEntry { index: 0x2000, sub_index: 0, len_bits: 8 };
        assert_eq!(map.assign(&[byte; 9]), Err(ErrorCode::MappingOverflow));
    }

    #[test]
    fn test_map_total_bytes() {
        let mut map = PdoMap::default();
        map.assign(&[
            PdoMapEntry { index: 0x2000, sub_index: 0, len_bits: 16 },
            PdoMapEntry { index: 0x2001, sub_index: 0, len_bits: 8 },
        ])
        .unwrap();
        assert_eq!(map.total_bytes(), 3);
        assert_eq!(map.entries().len(), 2);
    }
}
