use embedded_can::Frame;

use crate::constant::{
    COB_FUNC_HEARTBEAT, COB_FUNC_NMT, COB_FUNC_RECEIVE_SDO, CTRL_TX_TIMEOUT_MS,
    DISPATCH_RX_TIMEOUT_MS, EMCY_CONSUMER_RANGE, MAX_NODES, MODE_OPERATIONAL,
    MODE_PRE_OPERATIONAL, MODE_STOPPED, REG_OPERATING_MODE, RPDO_CONSUMER_RANGE,
};
use crate::driver::{CanDriver, Clock};
use crate::emergency::{EmcyCode, EmcyPriority};
use crate::error::ErrorCode;
use crate::heartbeat::HeartbeatState;
use crate::object_directory::ObjectDirectory;
use crate::pdo::PdoObjects;
use crate::util::{create_frame, get_cob_id};
use crate::{debug, error, info};

/// The protocol engine of one bus node. Everything the wire protocols
/// mutate lives here: the object dictionary, the PDO channel tables, the
/// heartbeat table and the emergency counter.
///
/// The engine is single-threaded and cooperative. The application owns the
/// super-loop and calls [`Node::tick`] repeatedly; the only blocking points
/// are the driver's transmit and receive calls, each bounded by a short
/// timeout. On a multi-threaded runtime the whole value must be owned by a
/// single executor; none of the internal state is synchronized.
pub struct Node<CAN, CLK>
where
    CAN: CanDriver,
    CLK: Clock,
{
    pub(crate) node_id: u8,
    pub(crate) driver: CAN,
    pub(crate) clock: CLK,
    pub(crate) object_directory: ObjectDirectory,
    pub(crate) pdo_objects: PdoObjects,
    pub(crate) heartbeat: HeartbeatState,
    pub(crate) minor_emcy_count: u8,
}

impl<CAN, CLK> Node<CAN, CLK>
where
    CAN: CanDriver,
    CLK: Clock,
{
    /// A node in the `Stopped` state, with default (disabled) PDO channels
    /// and the default dictionary entries registered.
    pub fn new(node_id: u8, driver: CAN, clock: CLK) -> Self {
        Node {
            node_id,
            driver,
            clock,
            object_directory: ObjectDirectory::new(),
            pdo_objects: PdoObjects::new(node_id),
            heartbeat: HeartbeatState::new(),
            minor_emcy_count: 0,
        }
    }

    pub fn node_id(&self) -> u8 {
        self.node_id
    }

    pub fn object_directory(&self) -> &ObjectDirectory {
        &self.object_directory
    }

    pub fn object_directory_mut(&mut self) -> &mut ObjectDirectory {
        &mut self.object_directory
    }

    pub fn pdo_objects(&self) -> &PdoObjects {
        &self.pdo_objects
    }

    /// Current operating mode byte, as stored in the `0x1000:00` register.
    pub fn operating_mode(&self) -> u8 {
        self.object_directory
            .read(REG_OPERATING_MODE, 0)
            .map(|value| value.as_u32() as u8)
            .unwrap_or(MODE_STOPPED)
    }

    pub(crate) fn set_operating_mode(&mut self, mode: u8) {
        if self.object_directory.set_value(REG_OPERATING_MODE, 0, &[mode], true).is_err() {
            error!("operating mode register missing from the object dictionary");
        }
    }

    pub(crate) fn now_ms(&self) -> u32 {
        self.clock.now_ms()
    }

    pub(crate) fn transmit(&mut self, frame: &CAN::Frame, timeout_ms: u32) -> Result<(), ErrorCode> {
        match self.driver.transmit(frame, timeout_ms) {
            Ok(()) => {
                debug!("sent frame {:x?}", frame);
                Ok(())
            }
            Err(err) => {
                error!("errors in transmit frame {:x?}, err: {:?}", frame, err);
                Err(ErrorCode::TransmitFailed)
            }
        }
    }

    /// One dispatcher pass: run the periodic producers, then route at most
    /// one received frame to the protocol layer it belongs to.
    pub fn tick(&mut self) {
        self.tick_with_frame(None);
    }

    /// Dispatcher body. The SDO client's response wait re-enters here with
    /// the frames it did not consume, so NMT, EMCY, PDO and heartbeat
    /// traffic keeps flowing during a blocking transfer.
    pub(crate) fn tick_with_frame(&mut self, injected: Option<CAN::Frame>) {
        if self.operating_mode() == MODE_OPERATIONAL {
            self.service_tpdos();
        }
        self.send_heartbeat();
        if self.heartbeat.consumer_enabled {
            self.check_heartbeat_timeouts();
        }

        let frame = match injected {
            Some(frame) => frame,
            None => match self.driver.receive(DISPATCH_RX_TIMEOUT_MS) {
                Ok(frame) => frame,
                Err(nb::Error::WouldBlock) => return,
                Err(nb::Error::Other(err)) => {
                    info!("errors in reading CAN frame, {:?}", err);
                    return;
                }
            },
        };

        let cob_id = match get_cob_id(&frame) {
            Some(cob_id) => cob_id,
            None => return,
        };
        let mode = self.operating_mode();

        // PDOs are data-plane traffic and stay gated on Operational; the
        // SDO server stays reachable for configuration in PreOperational;
        // NMT, EMCY and heartbeats are never silenced.
        if cob_id == COB_FUNC_NMT {
            self.process_nmt_frame(&frame);
        } else if EMCY_CONSUMER_RANGE.contains(&cob_id) {
            self.process_emcy_frame(&frame);
        } else if RPDO_CONSUMER_RANGE.contains(&cob_id) && mode == MODE_OPERATIONAL {
            self.process_rpdo(&frame);
        } else if cob_id == COB_FUNC_RECEIVE_SDO + self.node_id as u16
            && (mode == MODE_OPERATIONAL || mode == MODE_PRE_OPERATIONAL)
        {
            self.process_sdo_request(&frame);
        } else if (COB_FUNC_HEARTBEAT..COB_FUNC_HEARTBEAT + MAX_NODES as u16).contains(&cob_id) {
            self.receive_heartbeat(cob_id, &frame);
        }
        // Anything else is not addressed to a service on this node.
    }

    fn process_nmt_frame(&mut self, frame: &CAN::Frame) {
        if frame.dlc() != 2 {
            return;
        }
        let (mode, target) = (frame.data()[0], frame.data()[1]);
        if target != self.node_id {
            return;
        }
        // The requested byte is stored unvalidated; an unknown mode leaves
        // PDO service disabled until the master sends a known one.
        info!("NMT: switching to mode {:#04x}", mode);
        self.set_operating_mode(mode);
    }

    /// Broadcast an NMT state change request for `target`.
    pub fn send_nmt(&mut self, mode: u8, target: u8) {
        let frame = match create_frame(COB_FUNC_NMT, &[mode, target]) {
            Ok(frame) => frame,
            Err(ec) => {
                error!("errors in creating NMT frame: {:?}", ec);
                return;
            }
        };
        if self.transmit(&frame, CTRL_TX_TIMEOUT_MS).is_err() {
            self.send_emcy(EmcyPriority::Major, target, EmcyCode::NmtTransmitFailed);
        }
    }
}
