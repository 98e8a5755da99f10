use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PipeError, Result};

/// Default channel capacity, in messages.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 4096;

/// Tunables for a pipe. Durations serialize as fractional seconds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipeConfig {
    /// The writer touches the channel at most once per this interval and
    /// buffers locally in between. Useful values run from about 1µs
    /// (channel-bound) to 100µs (throughput-bound).
    #[serde(with = "secs")]
    pub max_flush_interval: Duration,

    /// Pause between enqueue attempts while the channel is full.
    #[serde(with = "secs")]
    pub retry_interval: Duration,

    /// Enqueue attempts per flush before giving up until the next one.
    pub max_retries: u32,

    /// Capacity of a channel built by the factory, in messages.
    pub channel_capacity: usize,
}

impl Default for PipeConfig {
    fn default() -> Self {
        Self {
            max_flush_interval: Duration::from_micros(100),
            retry_interval: Duration::from_micros(10),
            max_retries: 10,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl PipeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_retries == 0 {
            return Err(PipeError::InvalidConfig(
                "max_retries must be at least 1".into(),
            ));
        }
        if self.channel_capacity == 0 {
            return Err(PipeError::InvalidConfig(
                "channel_capacity must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_tunables() {
        let config = PipeConfig::default();
        assert_eq!(config.max_flush_interval, Duration::from_micros(100));
        assert_eq!(config.retry_interval, Duration::from_micros(10));
        assert_eq!(config.max_retries, 10);
        assert_eq!(config.channel_capacity, 4096);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_zero_retries_and_capacity() {
        let config = PipeConfig {
            max_retries: 0,
            ..PipeConfig::default()
        };
        assert!(matches!(config.validate(), Err(PipeError::InvalidConfig(_))));

        let config = PipeConfig {
            channel_capacity: 0,
            ..PipeConfig::default()
        };
        assert!(matches!(config.validate(), Err(PipeError::InvalidConfig(_))));
    }

    #[test]
    fn durations_round_trip_as_seconds() {
        let config = PipeConfig {
            max_flush_interval: Duration::from_millis(2),
            ..PipeConfig::default()
        };
        let bytes = bincode::serialize(&config).unwrap();
        let back: PipeConfig = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back.max_flush_interval, Duration::from_millis(2));
        assert_eq!(back.max_retries, config.max_retries);
    }
}
