// src/Pipe/reader.rs

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::{error, trace};

use super::channel::BoundedChannel;
use super::log::{MeterRecord, MeteringLog};
use crate::error::Result;
use crate::Pipe::Structs::Envelope_Structs::Timestamp;

/// The receiving end of a metered pipe.
///
/// Hands out payloads one at a time in writer order and records a
/// [`MeterRecord`] for every message it fetches. There must be exactly one
/// reader per channel.
pub struct Reader<T> {
    channel: Arc<dyn BoundedChannel<T>>,
    buffer: VecDeque<T>,
    log: MeteringLog,
    /// Sequence the next fetched message must carry.
    expected: u64,
}

impl<T> Reader<T> {
    /// Reader over an existing channel. Use this on the consuming side of a
    /// cross-process pipe; in-process pairs come from `create_pipe`.
    pub fn new(channel: Arc<dyn BoundedChannel<T>>) -> Self {
        Self {
            channel,
            buffer: VecDeque::new(),
            log: MeteringLog::new(),
            expected: 0,
        }
    }

    /// Block for the next batch, buffer its payloads and log one record per
    /// message. Returns the number of messages fetched.
    ///
    /// # Panics
    /// If a message's sequence is not the next one expected. That means
    /// messages were lost, duplicated or reordered, or two writers share
    /// the channel; the timing log is no longer trustworthy either way.
    pub fn fetch(&mut self) -> Result<usize> {
        let fetch_started_at = Timestamp::now();
        let batch = self.channel.dequeue()?;
        let fetch_completed_at = Timestamp::now();

        let fetched = batch.len();
        for envelope in batch {
            if envelope.sequence != self.expected {
                error!(
                    expected = self.expected,
                    received = envelope.sequence,
                    "sequence mismatch on pipe"
                );
                panic!(
                    "protocol violation: expected sequence {} but received {}",
                    self.expected, envelope.sequence
                );
            }
            self.expected += 1;

            self.buffer.push_back(envelope.payload);
            self.log.push(MeterRecord {
                sent_at: envelope.sent_at,
                enqueued_at: envelope.enqueued_at,
                fetch_started_at,
                fetch_completed_at,
            });
        }

        trace!(messages = fetched, next_sequence = self.expected, "fetched batch");
        Ok(fetched)
    }

    /// Next payload in writer order, blocking until one arrives.
    pub fn recv(&mut self) -> Result<T> {
        loop {
            if let Some(payload) = self.buffer.pop_front() {
                return Ok(payload);
            }
            self.fetch()?;
        }
    }

    /// Hand every logged record, oldest first, to `f` and forget it.
    pub fn flush_log_using<F: FnMut(MeterRecord)>(&mut self, f: F) {
        self.log.drain_using(f);
    }

    /// Drain the log into a `Vec`.
    pub fn drain_log(&mut self) -> Vec<MeterRecord> {
        let mut records = Vec::with_capacity(self.log.len());
        self.flush_log_using(|record| records.push(record));
        records
    }

    pub fn log(&self) -> &MeteringLog {
        &self.log
    }

    /// Messages fetched from the channel so far.
    pub fn received(&self) -> u64 {
        self.expected
    }

    /// Fetched payloads not yet returned by `recv`.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

impl<T> std::fmt::Debug for Reader<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reader")
            .field("buffered", &self.buffer.len())
            .field("received", &self.expected)
            .field("log_len", &self.log.len())
            .finish_non_exhaustive()
    }
}
