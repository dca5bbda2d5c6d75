use embedded_can::Frame;

use crate::prelude::*;

/// Contract for the CAN transceiver the engine polls. Hardware filtering is
/// expected to accept every identifier; protocol filtering happens in the
/// dispatcher.
pub trait CanDriver {
    type Frame: Frame + Debug;
    type Error: Debug;

    /// Queue a frame for transmission, waiting at most `timeout_ms` for
    /// space in the driver queue.
    fn transmit(&mut self, frame: &Self::Frame, timeout_ms: u32) -> Result<(), Self::Error>;

    /// Pop the next received frame, waiting at most `timeout_ms`.
    /// `Err(nb::Error::WouldBlock)` means the timeout elapsed with the
    /// receive queue still empty.
    fn receive(&mut self, timeout_ms: u32) -> nb::Result<Self::Frame, Self::Error>;
}

/// Monotonic millisecond clock provided by the host. The counter may wrap;
/// every interval comparison in the engine uses wrapping subtraction.
pub trait Clock {
    fn now_ms(&self) -> u32;
}
