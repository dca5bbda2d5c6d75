//! A compact CANopen-style protocol engine for a small bus node: NMT state
//! control, event-driven PDO exchange with dynamic byte-aligned mapping,
//! expedited SDO server and client, emergency reporting with minor-error
//! escalation, and heartbeat production/consumption. A separate module
//! parses VE.Direct text telemetry from a battery monitor.

#![cfg_attr(all(target_arch = "arm", target_os = "none"), no_std)]

pub mod driver;
pub mod emergency;
pub mod error;
pub mod heartbeat;
pub mod node;
pub mod object_directory;
pub mod pdo;
pub mod sdo_client;
pub mod sdo_server;
pub mod util;
pub mod vedirect;

mod cmd_header;
mod constant;
mod prelude;
