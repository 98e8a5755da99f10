mod builder;
mod config;
mod log;
mod reader;
mod writer;

pub mod channel;
pub mod local;
pub mod shared;

pub use builder::{create_pipe, PipeBuilder};
pub use channel::{BoundedChannel, Envelope};
pub use config::{PipeConfig, DEFAULT_CHANNEL_CAPACITY};
pub use local::LocalChannel;
pub use log::{IntervalStats, LogSummary, MeterRecord, MeteringLog};
pub use reader::Reader;
pub use shared::SharedChannel;
pub use writer::{Writer, WriterStats};

pub mod Buffer {
    pub mod Buffer;
    pub mod Buffer_impl;
    pub mod layout;
    pub use Buffer::{RingBuffer, Slot, MSG_INLINE}; // re-export for stable path
}

pub mod Structs {
    pub mod Envelope_Structs;
    pub use Envelope_Structs::{EnvelopeMeta, Timestamp}; // re-export for stable path
}
