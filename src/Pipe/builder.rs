use std::sync::Arc;
use std::time::Duration;

use super::channel::BoundedChannel;
use super::config::PipeConfig;
use super::local::LocalChannel;
use super::{Reader, Writer};
use crate::error::{PipeError, Result};

/// Builds a connected `(Reader, Writer)` pair.
///
/// Without an explicit channel a fresh in-process [`LocalChannel`] of
/// `channel_capacity` messages is created.
pub struct PipeBuilder<T> {
    config: PipeConfig,
    duplex: bool,
    channel: Option<Arc<dyn BoundedChannel<T>>>,
}

impl<T> Default for PipeBuilder<T> {
    fn default() -> Self {
        Self {
            config: PipeConfig::default(),
            duplex: false,
            channel: None,
        }
    }
}

impl<T: Send + 'static> PipeBuilder<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: PipeConfig) -> Self {
        self.config = config;
        self
    }

    /// Request a duplex pipe. `build` will refuse it.
    pub fn duplex(mut self, duplex: bool) -> Self {
        self.duplex = duplex;
        self
    }

    /// Use an existing channel instead of creating one.
    pub fn with_channel(mut self, channel: Arc<dyn BoundedChannel<T>>) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = capacity;
        self
    }

    pub fn with_max_flush_interval(mut self, interval: Duration) -> Self {
        self.config.max_flush_interval = interval;
        self
    }

    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.config.retry_interval = interval;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    pub fn build(self) -> Result<(Reader<T>, Writer<T>)> {
        if self.duplex {
            return Err(PipeError::DuplexUnsupported);
        }
        self.config.validate()?;

        let channel: Arc<dyn BoundedChannel<T>> = match self.channel {
            Some(channel) => channel,
            None => Arc::new(LocalChannel::new(self.config.channel_capacity)?),
        };

        Ok((Reader::new(Arc::clone(&channel)), Writer::new(channel, self.config)))
    }
}

/// Connected pipe with default tunables.
///
/// Fails with [`PipeError::DuplexUnsupported`] when `duplex` is set, before
/// any channel is created.
pub fn create_pipe<T: Send + 'static>(
    duplex: bool,
    channel: Option<Arc<dyn BoundedChannel<T>>>,
) -> Result<(Reader<T>, Writer<T>)> {
    let builder = PipeBuilder::new().duplex(duplex);
    match channel {
        Some(channel) => builder.with_channel(channel).build(),
        None => builder.build(),
    }
}
