use core::ops::RangeInclusive;

/// Canopen function code prefixes on COB_ID
pub(crate) const COB_FUNC_NMT: u16 = 0x000;
pub(crate) const COB_FUNC_EMCY: u16 = 0x080;
pub(crate) const COB_FUNC_TPDO_0: u16 = 0x180;
pub(crate) const COB_FUNC_RPDO_0: u16 = 0x200;
pub(crate) const COB_FUNC_TRANSMIT_SDO: u16 = 0x580;
pub(crate) const COB_FUNC_RECEIVE_SDO: u16 = 0x600;
pub(crate) const COB_FUNC_HEARTBEAT: u16 = 0x700;

/// COB-ID ranges routed by the dispatcher.
pub(crate) const EMCY_CONSUMER_RANGE: RangeInclusive<u16> = 0x081..=0x0FF;
pub(crate) const RPDO_CONSUMER_RANGE: RangeInclusive<u16> = 0x180..=0x57F;

/// CANOPEN Registers
pub(crate) const REG_OPERATING_MODE: u16 = 0x1000;
pub(crate) const REG_PRODUCER_HEARTBEAT_TIME: u16 = 0x1017;

/// Operating mode bytes carried by NMT, EMCY consumer and heartbeat logic.
pub(crate) const MODE_OPERATIONAL: u8 = 0x01;
pub(crate) const MODE_STOPPED: u8 = 0x02;
pub(crate) const MODE_PRE_OPERATIONAL: u8 = 0x80;

/// Table limits. All engine tables are bounded at build time.
pub(crate) const MAX_OD_ENTRIES: usize = 32;
pub(crate) const MAX_NODES: usize = 16;
pub(crate) const PDO_CHANNELS: usize = 4;
pub(crate) const MAX_PDO_MAPPINGS: usize = 8;
pub(crate) const MAX_PDO_PAYLOAD: usize = 8;

/// Only asynchronous, event-driven PDOs are scheduled.
pub(crate) const TRANS_TYPE_ASYNC: u8 = 255;

/// Driver timeouts in milliseconds.
pub(crate) const DISPATCH_RX_TIMEOUT_MS: u32 = 5;
pub(crate) const PDO_TX_TIMEOUT_MS: u32 = 10;
pub(crate) const SDO_TX_TIMEOUT_MS: u32 = 10;
pub(crate) const CTRL_TX_TIMEOUT_MS: u32 = 100;
pub(crate) const SDO_POLL_TIMEOUT_MS: u32 = 50;
pub(crate) const SDO_RESPONSE_DEADLINE_MS: u32 = 200;

/// Heartbeat policy.
pub(crate) const DEFAULT_HEARTBEAT_INTERVAL_MS: u32 = 1000;
pub(crate) const HEARTBEAT_TIMEOUT_MS: u32 = 1500;
pub(crate) const HEARTBEAT_CHECK_PERIOD_MS: u32 = 1000;

/// Consecutive minor emergencies tolerated before escalating to a major one.
pub(crate) const MAX_MINOR_EMCY_COUNT: u8 = 5;
