use crate::Pipe::Buffer::RingBuffer;
use crate::Pipe::{LocalChannel, SharedChannel};
use std::fmt;

/// Debug function for RingBuffer
///
/// Shows the slot base and capacity plus the current fill level. Cursors
/// are read with acquire loads; the header itself is never printed.
pub fn debug_ring_buffer(buffer: &RingBuffer, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RingBuffer")
        .field("buffer", &format_args!("0x{:x}", buffer.buffer_base as usize))
        .field("capacity", &buffer.capacity)
        .field("len", &buffer.len())
        .finish_non_exhaustive()
}

/// Debug function for SharedChannel
///
/// Shows:
/// - Region name and ownership
/// - Mapping size
/// - Underlying RingBuffer details
pub fn debug_shared_channel<T>(
    channel: &SharedChannel<T>,
    f: &mut fmt::Formatter<'_>,
) -> fmt::Result {
    f.debug_struct("SharedChannel")
        .field("name", &channel.name)
        .field("owner", &channel.shm.is_owner())
        .field("bytes", &channel.shm.size())
        .field("ring", &channel.ring)
        .finish()
}

pub fn debug_local_channel<T>(
    channel: &LocalChannel<T>,
    f: &mut fmt::Formatter<'_>,
) -> fmt::Result {
    f.debug_struct("LocalChannel")
        .field("capacity", &channel.capacity)
        .field("len", &channel.len())
        .finish_non_exhaustive()
}

impl fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_ring_buffer(self, f)
    }
}
