use std::io;
use thiserror::Error;

/// Errors surfaced by pipe construction, writers, readers and channels.
///
/// Sequence mismatches on the reader and writers dropped with buffered
/// messages are not represented here: both panic, since the timing log can
/// no longer be trusted once either happens.
#[derive(Debug, Error)]
pub enum PipeError {
    /// Only unidirectional pipes exist.
    #[error("duplex pipes are not supported")]
    DuplexUnsupported,

    #[error("invalid pipe configuration: {0}")]
    InvalidConfig(String),

    /// The channel could not accept a batch right now. Returned by
    /// `BoundedChannel::try_enqueue`; writers retry on it.
    #[error("channel is full")]
    ChannelFull,

    /// A flush ran out of retries. Nothing was lost; `pending` messages are
    /// still buffered and go out with the next flush.
    #[error("channel stayed full for {attempts} attempts; {pending} message(s) still buffered")]
    Backpressure { attempts: u32, pending: usize },

    #[error("payload of {len} bytes exceeds the slot size of {max} bytes")]
    PayloadTooLarge { len: usize, max: usize },

    /// A shared-memory batch did not reassemble cleanly.
    #[error("malformed batch: {0}")]
    Framing(String),

    #[error("payload codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, PipeError>;
