// Plain data carried by every message: the wall-clock stamp type and the
// per-slot metadata written into shared memory.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Wall-clock instant in nanoseconds since the Unix epoch.
///
/// Wall clock rather than `Instant` because stamps taken in different
/// processes have to be comparable.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    pub fn now() -> Self {
        let ns = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64;
        Self(ns)
    }

    pub const fn from_nanos(ns: u64) -> Self {
        Self(ns)
    }

    pub const fn as_nanos(self) -> u64 {
        self.0
    }

    /// Time from `earlier` to `self`, zero if `earlier` is later.
    pub fn saturating_since(self, earlier: Timestamp) -> Duration {
        Duration::from_nanos(self.0.saturating_sub(earlier.0))
    }

    /// Signed offset from `origin` to `self`, in seconds.
    pub fn offset_from(self, origin: Timestamp) -> f64 {
        (self.0 as i128 - origin.0 as i128) as f64 / 1e9
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.0 / 1_000_000_000, self.0 % 1_000_000_000)
    }
}

/// Metadata that precedes each serialized payload in a ring slot.
/// ABI-stable across processes; no atomics, plain integral fields only.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct EnvelopeMeta {
    /// Writer-assigned sequence number.
    pub sequence: u64,
    /// When the payload was handed to the writer (ns since epoch).
    pub sent_at_ns: u64,
    /// When the containing batch was accepted by the ring (ns since epoch).
    pub enqueued_at_ns: u64,
    /// Number of envelopes in the containing batch.
    pub batch_len: u32,
    /// Position of this envelope within its batch.
    pub batch_index: u32,
    pub sender_pid: u32,
    pub flags: u32,
    pub payload_len: u32,
    pub _reserved: u32,
}
