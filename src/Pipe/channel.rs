use crate::error::Result;
use crate::Pipe::Structs::Envelope_Structs::Timestamp;

/// One payload as it crosses the channel.
#[derive(Clone, Debug, PartialEq)]
pub struct Envelope<T> {
    pub payload: T,
    pub sequence: u64,
    pub sent_at: Timestamp,
    pub enqueued_at: Timestamp,
}

/// A bounded FIFO of batches shared between exactly one writer and one reader.
///
/// Implementations provide their own synchronization; the pipe adds none.
/// Capacity is counted in messages, not batches or bytes.
pub trait BoundedChannel<T>: Send + Sync {
    /// Maximum number of messages the channel holds at once. Writers never
    /// offer a batch larger than this.
    fn capacity(&self) -> usize;

    /// Offer a whole batch without blocking.
    ///
    /// On success the batch is taken (`batch` is left empty). On
    /// `Err(PipeError::ChannelFull)` or any other error nothing was enqueued
    /// and `batch` is untouched.
    fn try_enqueue(&self, batch: &mut Vec<Envelope<T>>) -> Result<()>;

    /// Block until the next batch is available and return all of it.
    fn dequeue(&self) -> Result<Vec<Envelope<T>>>;

    /// Check a payload before it is buffered. Channels that can only carry
    /// some payloads (e.g. fixed-size slots) reject the rest here, so a bad
    /// payload never reaches a flush.
    fn admit(&self, _payload: &T) -> Result<()> {
        Ok(())
    }
}
