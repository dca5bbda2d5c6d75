mod testing;

use canopen_node::object_directory::{AccessType, OdValue};
use embedded_can::Frame;
use testing::Harness;

fn preop_harness() -> Harness {
    let mut h = Harness::new(5);
    h.switch_mode(0x80);
    h.clear_tx();
    h
}

#[test]
fn test_expedited_read_infers_size_from_the_entry() {
    let mut h = preop_harness();

    h.push_rx(0x605, &[0x40, 0x17, 0x10, 0x00, 0, 0, 0, 0]);
    h.node.tick();

    let frames = h.sent_with_id(0x585);
    assert_eq!(frames.len(), 1);
    // 4-byte entry => 0x43, echoed address, value 1000 LE, zero padding.
    assert_eq!(frames[0].data(), &[0x43, 0x17, 0x10, 0x00, 0xE8, 0x03, 0x00, 0x00]);

    h.clear_tx();
    h.push_rx(0x605, &[0x40, 0x00, 0x10, 0x00, 0, 0, 0, 0]);
    h.node.tick();
    let frames = h.sent_with_id(0x585);
    // 1-byte entry => 0x4F with the tail zero-padded.
    assert_eq!(frames[0].data(), &[0x4F, 0x00, 0x10, 0x00, 0x80, 0x00, 0x00, 0x00]);
}

#[test]
fn test_write_size_mismatch_gets_no_response() {
    let mut h = preop_harness();

    // Two-byte write into the four-byte heartbeat interval.
    h.push_rx(0x605, &[0x2B, 0x17, 0x10, 0x00, 0xE8, 0x03, 0x00, 0x00]);
    h.node.tick();

    assert!(h.sent_with_id(0x585).is_empty());
    let emcy = h.sent_with_id(0x085);
    assert_eq!(emcy.len(), 1);
    assert_eq!(emcy[0].data(), &[0x01, 5, 0x04, 0x00, 0x00, 0x00]);
    // The entry is untouched.
    assert_eq!(h.node.object_directory().read(0x1017, 0), Ok(OdValue::U32(1000)));
}

#[test]
fn test_correctly_sized_write_is_confirmed_and_applied() {
    let mut h = preop_harness();

    h.push_rx(0x605, &[0x23, 0x17, 0x10, 0x00, 0xD0, 0x07, 0x00, 0x00]);
    h.node.tick();

    let frames = h.sent_with_id(0x585);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].data(), &[0x60, 0x17, 0x10, 0x00, 0x00, 0x00, 0x00, 0x00]);
    assert_eq!(h.node.object_directory().read(0x1017, 0), Ok(OdValue::U32(2000)));

    // The heartbeat producer picks the new interval up immediately.
    h.clear_tx();
    h.set_time(1999);
    h.node.tick();
    assert!(h.sent_with_id(0x705).is_empty());
    h.set_time(2000);
    h.node.tick();
    assert_eq!(h.sent_with_id(0x705).len(), 1);
}

#[test]
fn test_write_then_read_round_trips_the_value() {
    let mut h = preop_harness();
    h.node
        .object_directory_mut()
        .register(0x2002, 0, AccessType::ReadWrite, OdValue::U16(0))
        .unwrap();

    h.push_rx(0x605, &[0x2B, 0x02, 0x20, 0x00, 0x9A, 0x78, 0x00, 0x00]);
    h.node.tick();
    h.push_rx(0x605, &[0x40, 0x02, 0x20, 0x00, 0x00, 0x00, 0x00, 0x00]);
    h.node.tick();

    let frames = h.sent_with_id(0x585);
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].data(), &[0x60, 0x02, 0x20, 0x00, 0x00, 0x00, 0x00, 0x00]);
    assert_eq!(frames[1].data(), &[0x4B, 0x02, 0x20, 0x00, 0x9A, 0x78, 0x00, 0x00]);
}

#[test]
fn test_missing_entry_raises_not_found() {
    let mut h = preop_harness();

    h.push_rx(0x605, &[0x40, 0x00, 0x60, 0x00, 0, 0, 0, 0]);
    h.node.tick();

    assert!(h.sent_with_id(0x585).is_empty());
    let emcy = h.sent_with_id(0x085);
    assert_eq!(emcy.len(), 1);
    assert_eq!(emcy[0].data()[2..6], 0x0000_0001u32.to_le_bytes());
}

#[test]
fn test_unknown_write_command_is_rejected() {
    let mut h = preop_harness();

    // 0x27 would be a 3-byte expedited write; the server only accepts
    // 1, 2 and 4 bytes.
    h.push_rx(0x605, &[0x27, 0x17, 0x10, 0x00, 0x01, 0x02, 0x03, 0x00]);
    h.node.tick();

    assert!(h.sent_with_id(0x585).is_empty());
    let emcy = h.sent_with_id(0x085);
    assert_eq!(emcy[0].data()[2..6], 0x0000_0003u32.to_le_bytes());
}

#[test]
fn test_access_is_enforced() {
    let mut h = preop_harness();
    h.node
        .object_directory_mut()
        .register(0x2000, 0, AccessType::ReadOnly, OdValue::U8(0x42))
        .unwrap();
    h.node
        .object_directory_mut()
        .register(0x2001, 0, AccessType::WriteOnly, OdValue::U8(0x00))
        .unwrap();

    // Write to a read-only entry.
    h.push_rx(0x605, &[0x2F, 0x00, 0x20, 0x00, 0x07, 0x00, 0x00, 0x00]);
    h.node.tick();
    assert!(h.sent_with_id(0x585).is_empty());
    assert_eq!(h.node.object_directory().read(0x2000, 0), Ok(OdValue::U8(0x42)));

    // Read from a write-only entry.
    h.push_rx(0x605, &[0x40, 0x01, 0x20, 0x00, 0, 0, 0, 0]);
    h.node.tick();
    assert!(h.sent_with_id(0x585).is_empty());

    let emcy = h.sent_with_id(0x085);
    assert_eq!(emcy.len(), 2);
    assert_eq!(emcy[0].data()[2..6], 0x0000_000Bu32.to_le_bytes());
    assert_eq!(emcy[1].data()[2..6], 0x0000_000Bu32.to_le_bytes());

    // The write-only entry still takes writes.
    h.push_rx(0x605, &[0x2F, 0x01, 0x20, 0x00, 0x07, 0x00, 0x00, 0x00]);
    h.node.tick();
    assert_eq!(h.sent_with_id(0x585).len(), 1);
    assert_eq!(h.node.object_directory().read(0x2001, 0), Ok(OdValue::U8(0x07)));
}

#[test]
fn test_response_transmit_failure_raises_emcy() {
    let mut h = preop_harness();

    h.fail_tx.set(1);
    h.push_rx(0x605, &[0x40, 0x17, 0x10, 0x00, 0, 0, 0, 0]);
    h.node.tick();

    assert!(h.sent_with_id(0x585).is_empty());
    let emcy = h.sent_with_id(0x085);
    assert_eq!(emcy.len(), 1);
    assert_eq!(emcy[0].data()[2..6], 0x0000_0005u32.to_le_bytes());
}
