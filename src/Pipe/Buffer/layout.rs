use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicU32, AtomicU64};

/// "MPIPE_RB" — identifies a region as a metered-pipe ring.
pub const RING_MAGIC: u64 = 0x4D50_4950_455F_5242;

/// Bumped whenever `RingHeader` or `Slot` change shape.
pub const RING_VERSION: u32 = 1;

/// The header located at the very beginning of a shared ring region.
///
/// Holds the cursors and the wake-up word. Slots start at the next
/// 128-byte boundary after the header, which `size_of::<RingHeader>()`
/// already is thanks to the alignment.
#[repr(C, align(128))]
pub struct RingHeader {
    /// Written last by the creator; attachers refuse a region without it.
    pub magic: u64,

    /// The version of the memory layout.
    pub version: u32,

    /// Size in bytes of the inline payload area of each slot.
    pub slot_payload: u32,

    /// Number of slots. Always a power of two.
    pub capacity: u64,

    /// Signal word for futex-based blocking/waking.
    /// The writer bumps it (and wakes) after publishing; the reader waits on it.
    pub signal: AtomicU32,

    /// The "tail" cursor for the writer. Advanced by a whole batch at a time.
    /// Padded to prevent false sharing with the head cursor.
    pub tail: CachePadded<AtomicU64>,

    /// The "head" cursor for the reader.
    pub head: CachePadded<AtomicU64>,
}
