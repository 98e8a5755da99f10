// Layout conformance tests for the shared-memory ring.
// Both processes map the same bytes, so EnvelopeMeta, Slot and RingHeader
// must have the same shape in every build. The observed values are printed
// to aid debugging when a mismatch occurs on a given platform.
use metered_pipe::Pipe::Buffer::layout::RingHeader;
use metered_pipe::Pipe::Buffer::{RingBuffer, Slot, MSG_INLINE};
use metered_pipe::Pipe::Structs::EnvelopeMeta;
use memoffset::offset_of;
use std::mem::{align_of, size_of};

#[test]
fn test_envelope_meta_layout() {
    let raw = 8 + 8 + 8 + 4 + 4 + 4 + 4 + 4 + 4; // 48 bytes of fields
    let aligned = (raw + 7) & !7;

    let size = size_of::<EnvelopeMeta>();
    let align = align_of::<EnvelopeMeta>();
    let off_sequence = offset_of!(EnvelopeMeta, sequence);
    let off_sent_at = offset_of!(EnvelopeMeta, sent_at_ns);
    let off_enqueued_at = offset_of!(EnvelopeMeta, enqueued_at_ns);
    let off_batch_len = offset_of!(EnvelopeMeta, batch_len);
    let off_batch_index = offset_of!(EnvelopeMeta, batch_index);
    let off_sender_pid = offset_of!(EnvelopeMeta, sender_pid);
    let off_flags = offset_of!(EnvelopeMeta, flags);
    let off_payload_len = offset_of!(EnvelopeMeta, payload_len);

    println!(
        "EnvelopeMeta => size: {size}, expected: {aligned}, align: {align}, offsets: [sequence:{off_sequence}, sent_at_ns:{off_sent_at}, enqueued_at_ns:{off_enqueued_at}, batch_len:{off_batch_len}, batch_index:{off_batch_index}, sender_pid:{off_sender_pid}, flags:{off_flags}, payload_len:{off_payload_len}]"
    );

    assert_eq!(size, aligned);
    assert_eq!(align, align_of::<u64>());
    assert_eq!(off_sequence, 0);
    assert_eq!(off_sent_at, 8);
    assert_eq!(off_enqueued_at, 16);
    assert_eq!(off_batch_len, 24);
    assert_eq!(off_batch_index, 28);
    assert_eq!(off_sender_pid, 32);
    assert_eq!(off_flags, 36);
    assert_eq!(off_payload_len, 40);
}

#[test]
fn test_slot_layout() {
    let stride = RingBuffer::slot_stride();
    println!("Slot => size: {stride}, align: {}", align_of::<Slot>());

    assert_eq!(stride, size_of::<Slot>());
    assert_eq!(stride % 64, 0);
    assert_eq!(offset_of!(Slot, sequence), 0);
    assert_eq!(offset_of!(Slot, meta), 8);
    assert!(stride >= 8 + size_of::<EnvelopeMeta>() + MSG_INLINE);
}

#[test]
fn test_ring_header_layout() {
    let size = size_of::<RingHeader>();
    println!("RingHeader => size: {size}, align: {}", align_of::<RingHeader>());

    assert_eq!(align_of::<RingHeader>(), 128);
    assert_eq!(size % 128, 0, "slots must start on a 128-byte boundary");
    assert_eq!(offset_of!(RingHeader, magic), 0);
    assert_eq!(
        RingBuffer::region_size(16),
        size + 16 * RingBuffer::slot_stride()
    );
}
