// src/Pipe/writer.rs

use std::sync::Arc;
use std::thread;
use std::time::Instant;

use tracing::{debug, error, trace, warn};

use super::channel::{BoundedChannel, Envelope};
use super::config::PipeConfig;
use crate::error::{PipeError, Result};
use crate::Pipe::Structs::Envelope_Structs::Timestamp;

/// Counters kept by a writer over its lifetime.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct WriterStats {
    /// Payloads accepted by `send`.
    pub sent: u64,
    /// Batches accepted by the channel.
    pub batches: u64,
    /// Enqueue attempts that found the channel full.
    pub full_attempts: u64,
    /// Flushes that ran out of retries and kept their messages buffered.
    pub deferred_flushes: u64,
}

/// The sending end of a metered pipe.
///
/// Payloads are buffered locally and pushed to the channel in batches, at
/// most once per `max_flush_interval`. Anything still buffered after the
/// last `send` goes out only on `flush`, so a writer must be flushed before
/// it is dropped; dropping it with buffered messages panics. Use
/// [`Writer::scoped`] or [`Writer::close`] to have that done for you.
pub struct Writer<T> {
    channel: Arc<dyn BoundedChannel<T>>,
    buffer: Vec<Envelope<T>>,
    /// Messages the channel has accepted; also the sequence of `buffer[0]`.
    sequence: u64,
    last_flush: Option<Instant>,
    config: PipeConfig,
    stats: WriterStats,
}

impl<T> Writer<T> {
    /// Writer over an existing channel. Use this on the producing side of a
    /// cross-process pipe; in-process pairs come from `create_pipe`.
    pub fn new(channel: Arc<dyn BoundedChannel<T>>, config: PipeConfig) -> Self {
        Self {
            channel,
            buffer: Vec::new(),
            sequence: 0,
            last_flush: None,
            config,
            stats: WriterStats::default(),
        }
    }

    /// Buffer `payload` and flush if the flush interval has passed.
    ///
    /// Flush failures are never reported here: the messages stay buffered
    /// and go out with a later flush, so an `Ok` means the payload is in the
    /// pipe and must not be sent again. The only errors are payloads the
    /// channel can never carry, which are rejected before being buffered.
    pub fn send(&mut self, payload: T) -> Result<()> {
        let sent_at = Timestamp::now();
        self.channel.admit(&payload)?;

        let sequence = self.sequence + self.buffer.len() as u64;
        self.buffer.push(Envelope {
            payload,
            sequence,
            sent_at,
            enqueued_at: sent_at,
        });
        self.stats.sent += 1;

        if let Some(last) = self.last_flush {
            if last.elapsed() < self.config.max_flush_interval {
                return Ok(());
            }
        }

        // Buffered and sequenced from here on: flush errors stay internal.
        match self.flush() {
            Ok(()) => {}
            Err(PipeError::Backpressure { pending, .. }) => {
                debug!(pending, "channel full, send deferred to a later flush");
            }
            Err(err) => {
                warn!(
                    pending = self.buffer.len(),
                    %err,
                    "flush failed, messages kept for the next one"
                );
            }
        }
        Ok(())
    }

    /// Push everything buffered into the channel.
    ///
    /// The buffer goes out as one batch, or as consecutive batches of at most
    /// `capacity()` messages when it is larger than the channel. Each batch
    /// gets up to `max_retries` attempts, `retry_interval` apart. When they
    /// run out this returns [`PipeError::Backpressure`]; batches already
    /// accepted stay delivered and the rest stays buffered, in order.
    pub fn flush(&mut self) -> Result<()> {
        while !self.buffer.is_empty() {
            let take = self.buffer.len().min(self.channel.capacity().max(1));
            let rest = self.buffer.split_off(take);
            let mut batch = std::mem::replace(&mut self.buffer, rest);

            match self.enqueue_with_retry(&mut batch) {
                Ok(()) => {
                    self.sequence += take as u64;
                    self.last_flush = Some(Instant::now());
                    self.stats.batches += 1;
                    trace!(messages = take, next_sequence = self.sequence, "flushed batch");
                }
                Err(err) => {
                    batch.append(&mut self.buffer);
                    self.buffer = batch;

                    if let PipeError::ChannelFull = err {
                        self.stats.deferred_flushes += 1;
                        let pending = self.buffer.len();
                        warn!(
                            attempts = self.config.max_retries,
                            pending, "channel stayed full, keeping messages buffered"
                        );
                        return Err(PipeError::Backpressure {
                            attempts: self.config.max_retries,
                            pending,
                        });
                    }
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    fn enqueue_with_retry(&mut self, batch: &mut Vec<Envelope<T>>) -> Result<()> {
        let attempts = self.config.max_retries.max(1);
        for attempt in 1..=attempts {
            let now = Timestamp::now();
            for envelope in batch.iter_mut() {
                envelope.enqueued_at = now;
            }

            match self.channel.try_enqueue(batch) {
                Ok(()) => return Ok(()),
                Err(PipeError::ChannelFull) => {
                    self.stats.full_attempts += 1;
                    if attempt < attempts {
                        thread::sleep(self.config.retry_interval);
                    }
                }
                Err(err) => return Err(err),
            }
        }
        Err(PipeError::ChannelFull)
    }

    /// Flush until the buffer is empty, however long the channel stays full.
    /// Blocks forever if nothing is reading.
    pub fn flush_blocking(&mut self) -> Result<()> {
        loop {
            match self.flush() {
                Err(PipeError::Backpressure { pending, .. }) => {
                    debug!(pending, "still waiting for room in the channel");
                    thread::yield_now();
                }
                other => return other,
            }
        }
    }

    /// Run `f` with this writer, then flush everything it sent.
    ///
    /// The flush happens even when `f` fails; `f`'s error wins over a flush
    /// error.
    pub fn scoped<R, F>(&mut self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Self) -> Result<R>,
    {
        let out = f(self);
        let flushed = self.flush_blocking();
        let value = out?;
        flushed?;
        Ok(value)
    }

    /// Flush everything and drop the writer.
    ///
    /// If the flush fails outright (not just backpressure) the remaining
    /// messages are discarded and the error returned.
    pub fn close(mut self) -> Result<()> {
        let result = self.flush_blocking();
        if let Err(err) = &result {
            error!(pending = self.buffer.len(), %err, "discarding messages on close");
            self.buffer.clear();
        }
        result
    }

    /// Messages buffered and not yet accepted by the channel.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Messages accepted by the channel so far.
    pub fn delivered(&self) -> u64 {
        self.sequence
    }

    pub fn stats(&self) -> WriterStats {
        self.stats
    }

    pub fn config(&self) -> &PipeConfig {
        &self.config
    }
}

impl<T> Drop for Writer<T> {
    fn drop(&mut self) {
        if self.buffer.is_empty() || thread::panicking() {
            return;
        }
        let pending = self.buffer.len();
        error!(pending, "writer dropped with unflushed messages");
        panic!(
            "Writer dropped with {pending} unflushed message(s); call flush() before dropping it"
        );
    }
}

impl<T> std::fmt::Debug for Writer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Writer")
            .field("pending", &self.buffer.len())
            .field("delivered", &self.sequence)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
