use embedded_can::Frame;

use crate::constant::{
    COB_FUNC_HEARTBEAT, CTRL_TX_TIMEOUT_MS, DEFAULT_HEARTBEAT_INTERVAL_MS,
    HEARTBEAT_CHECK_PERIOD_MS, HEARTBEAT_TIMEOUT_MS, MAX_NODES, REG_PRODUCER_HEARTBEAT_TIME,
};
use crate::driver::{CanDriver, Clock};
use crate::emergency::{EmcyCode, EmcyPriority};
use crate::node::Node;
use crate::util::create_frame;
use crate::{debug, error};

/// Last reported state of one peer node.
#[derive(Clone, Copy, Debug, Default)]
pub struct PeerHeartbeat {
    pub operating_mode: u8,
    pub last_heartbeat_ms: u32,
}

#[derive(Debug)]
pub(crate) struct HeartbeatState {
    pub(crate) table: [PeerHeartbeat; MAX_NODES],
    pub(crate) last_send_ms: u32,
    pub(crate) last_check_ms: u32,
    pub(crate) consumer_enabled: bool,
}

impl HeartbeatState {
    pub(crate) fn new() -> Self {
        HeartbeatState {
            table: [PeerHeartbeat::default(); MAX_NODES],
            last_send_ms: 0,
            last_check_ms: 0,
            consumer_enabled: false,
        }
    }
}

impl<CAN, CLK> Node<CAN, CLK>
where
    CAN: CanDriver,
    CLK: Clock,
{
    /// Producer: broadcast the operating mode once per heartbeat interval.
    /// The interval is read from `0x1017:00` on every pass, so SDO writes
    /// take effect immediately.
    pub(crate) fn send_heartbeat(&mut self) {
        let interval = self
            .object_directory
            .read(REG_PRODUCER_HEARTBEAT_TIME, 0)
            .map(|value| value.as_u32())
            .unwrap_or(DEFAULT_HEARTBEAT_INTERVAL_MS);
        let now = self.now_ms();
        if now.wrapping_sub(self.heartbeat.last_send_ms) < interval {
            return;
        }

        let mode = self.operating_mode();
        let frame = match create_frame(COB_FUNC_HEARTBEAT + self.node_id as u16, &[mode]) {
            Ok(frame) => frame,
            Err(ec) => {
                error!("errors in creating heartbeat frame: {:?}", ec);
                return;
            }
        };
        // A failed transmit leaves last_send_ms alone, so the next tick
        // retries instead of waiting a full period.
        if self.transmit(&frame, CTRL_TX_TIMEOUT_MS).is_ok() {
            self.heartbeat.last_send_ms = now;
        }
    }

    /// Consumer: record a peer heartbeat into the liveness table.
    pub(crate) fn receive_heartbeat(&mut self, cob_id: u16, frame: &CAN::Frame) {
        let peer = (cob_id - COB_FUNC_HEARTBEAT) as usize;
        if peer >= MAX_NODES || frame.dlc() < 1 {
            return;
        }
        debug!("heartbeat from node {}: mode {:#04x}", peer, frame.data()[0]);
        self.heartbeat.table[peer] = PeerHeartbeat {
            operating_mode: frame.data()[0],
            last_heartbeat_ms: self.now_ms(),
        };
    }

    /// Turn on the periodic peer liveness scan, starting from a clean table.
    pub fn enable_heartbeat_consumer(&mut self) {
        self.heartbeat.table = [PeerHeartbeat::default(); MAX_NODES];
        self.heartbeat.consumer_enabled = true;
    }

    /// Last recorded state for `peer`, if any heartbeat has arrived from it.
    pub fn peer_heartbeat(&self, peer: u8) -> Option<PeerHeartbeat> {
        let entry = self.heartbeat.table.get(peer as usize)?;
        (entry.last_heartbeat_ms > 0).then_some(*entry)
    }

    /// Scan for stale peers, at most once per second. A peer that has been
    /// silent for longer than the timeout raises a major emergency carrying
    /// its node id.
    pub(crate) fn check_heartbeat_timeouts(&mut self) {
        let now = self.now_ms();
        if now.wrapping_sub(self.heartbeat.last_check_ms) < HEARTBEAT_CHECK_PERIOD_MS {
            return;
        }
        self.heartbeat.last_check_ms = now;

        for peer in 0..MAX_NODES {
            let entry = self.heartbeat.table[peer];
            if entry.last_heartbeat_ms > 0
                && now.wrapping_sub(entry.last_heartbeat_ms) > HEARTBEAT_TIMEOUT_MS
            {
                self.send_emcy(EmcyPriority::Major, peer as u8, EmcyCode::HeartbeatPeerTimeout);
            }
        }
    }
}
