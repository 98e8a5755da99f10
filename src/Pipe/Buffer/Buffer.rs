// The shared slot ring behind `SharedChannel`.

use super::layout::RingHeader;
use crate::Pipe::Structs::Envelope_Structs::EnvelopeMeta;

use std::sync::atomic::AtomicU64;

/// The size of the inline payload per slot.
/// A serialized payload must fit here; larger ones are rejected at send.
pub const MSG_INLINE: usize = 1024;

/// A single slot in the ring buffer.
///
/// This struct represents the actual data layout in shared memory.
/// It is marked `#[repr(C)]` to ensure a defined and stable memory layout.
#[repr(C, align(64))]
pub struct Slot {
    /// The sequence number of the slot. This is the core of the synchronization.
    /// - The writer claims a `tail` position and requires the `sequence` in
    ///   the target slot to equal it.
    /// - After writing, it sets the `sequence` to `tail + 1`, signaling completion.
    /// - The reader waits for the `sequence` in its `head` slot to equal
    ///   `head + 1`.
    pub sequence: AtomicU64,

    /// Envelope metadata (sequence, timestamps, batch framing).
    pub meta: EnvelopeMeta,

    /// Serialized payload bytes.
    pub payload: [u8; MSG_INLINE],
}

/// A lock-free bounded ring buffer view over a shared memory region.
///
/// This struct is NOT stored in shared memory. It is a transient view that holds
/// pointers to the shared memory region.
///
/// ### Concurrency Design:
/// - **Enqueue**: a batch claims `n` consecutive positions by advancing `tail`
///   once, after checking every slot in the range is free. Either the whole
///   batch is claimed or nothing is.
/// - **Dequeue**: the reader advances `head` one slot at a time and uses the
///   slot `sequence` to know when a message has been fully written.
pub struct RingBuffer {
    /// Pointer to the ring header at the start of the region.
    pub(crate) header: *const RingHeader,

    /// Pointer to the first slot.
    pub(crate) buffer_base: *mut u8,

    /// The capacity of the buffer (number of slots).
    pub(crate) capacity: usize,

    /// A bitmask used to wrap positions around the buffer.
    /// Calculated as `capacity - 1`.
    pub(crate) mask: usize,
}

unsafe impl Send for RingBuffer {}
unsafe impl Sync for RingBuffer {}
