#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt::{Debug, Formatter};
use std::rc::Rc;

use canopen_node::driver::{CanDriver, Clock};
use canopen_node::node::Node;
use embedded_can::{Frame, Id, StandardId};

#[derive(Clone)]
pub struct MockFrame {
    id: Id,
    data: Vec<u8>,
}

impl MockFrame {
    pub fn std(cob_id: u16, data: &[u8]) -> Self {
        MockFrame {
            id: Id::Standard(StandardId::new(cob_id).expect("valid standard id")),
            data: data.to_vec(),
        }
    }

    pub fn cob_id(&self) -> u16 {
        match self.id {
            Id::Standard(sid) => sid.as_raw(),
            Id::Extended(_) => panic!("extended id in test frame"),
        }
    }
}

impl Frame for MockFrame {
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        if data.len() > 8 {
            return None;
        }
        Some(MockFrame { id: id.into(), data: data.to_vec() })
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
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:03x} [{}] {:02x?}", self.cob_id(), self.dlc(), self.data)
    }
}

pub struct MockClock {
    now: Rc<Cell<u32>>,
}

impl Clock for MockClock {
    fn now_ms(&self) -> u32 {
        self.now.get()
    }
}

/// In-process driver backed by shared queues. A receive that would block
/// advances the shared clock by the timeout, modelling the wall time a real
/// driver would spend waiting.
pub struct MockDriver {
    rx: Rc<RefCell<VecDeque<MockFrame>>>,
    tx: Rc<RefCell<Vec<MockFrame>>>,
    fail_tx: Rc<Cell<u32>>,
    now: Rc<Cell<u32>>,
}

impl CanDriver for MockDriver {
    type Frame = MockFrame;
    type Error = ();

    fn transmit(&mut self, frame: &MockFrame, _timeout_ms: u32) -> Result<(), ()> {
        if self.fail_tx.get() > 0 {
            self.fail_tx.set(self.fail_tx.get() - 1);
            return Err(());
        }
        self.tx.borrow_mut().push(frame.clone());
        Ok(())
    }

    fn receive(&mut self, timeout_ms: u32) -> nb::Result<MockFrame, ()> {
        match self.rx.borrow_mut().pop_front() {
            Some(frame) => Ok(frame),
            None => {
                self.now.set(self.now.get().wrapping_add(timeout_ms));
                Err(nb::Error::WouldBlock)
            }
        }
    }
}

pub struct Harness {
    pub node: Node<MockDriver, MockClock>,
    pub rx: Rc<RefCell<VecDeque<MockFrame>>>,
    pub tx: Rc<RefCell<Vec<MockFrame>>>,
    pub clock: Rc<Cell<u32>>,
    pub fail_tx: Rc<Cell<u32>>,
}

impl Harness {
    pub fn new(node_id: u8) -> Self {
        let rx = Rc::new(RefCell::new(VecDeque::new()));
        let tx = Rc::new(RefCell::new(Vec::new()));
        let clock = Rc::new(Cell::new(0u32));
        let fail_tx = Rc::new(Cell::new(0u32));
        let driver = MockDriver {
            rx: Rc::clone(&rx),
            tx: Rc::clone(&tx),
            fail_tx: Rc::clone(&fail_tx),
            now: Rc::clone(&clock),
        };
        let node = Node::new(node_id, driver, MockClock { now: Rc::clone(&clock) });
        Harness { node, rx, tx, clock, fail_tx }
    }

    /// Queue a frame for the node to receive on a later tick.
    pub fn push_rx(&self, cob_id: u16, data: &[u8]) {
        self.rx.borrow_mut().push_back(MockFrame::std(cob_id, data));
    }

    /// Everything the node has put on the wire so far.
    pub fn sent(&self) -> Vec<MockFrame> {
        self.tx.borrow().clone()
    }

    pub fn sent_with_id(&self, cob_id: u16) -> Vec<MockFrame> {
        self.tx.borrow().iter().filter(|f| f.cob_id() == cob_id).cloned().collect()
    }

    pub fn clear_tx(&self) {
        self.tx.borrow_mut().clear();
    }

    pub fn set_time(&self, ms: u32) {
        self.clock.set(ms);
    }

    /// Drive the node into the given operating mode through an NMT frame.
    pub fn switch_mode(&mut self, mode: u8) {
        let node_id = self.node.node_id();
        self.push_rx(0x000, &[mode, node_id]);
        self.node.tick();
        assert_eq!(self.node.operating_mode(), mode);
    }
}
