use std::collections::VecDeque;
use std::time::Duration;

use serde::Serialize;

use crate::Pipe::Structs::Envelope_Structs::Timestamp;

/// Timing of one message from `send` to the moment it became available to
/// the reader.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MeterRecord {
    /// s0: payload handed to the writer.
    pub sent_at: Timestamp,
    /// s1: containing batch accepted by the channel.
    pub enqueued_at: Timestamp,
    /// t0: reader started the blocking fetch that returned this message.
    pub fetch_started_at: Timestamp,
    /// t1: that fetch returned. Shared by every message of a batch.
    pub fetch_completed_at: Timestamp,
}

impl MeterRecord {
    /// s1 - s0: time spent in the writer's local buffer.
    pub fn enqueue_delay(&self) -> Duration {
        self.enqueued_at.saturating_since(self.sent_at)
    }

    /// t1 - s1: time spent in the channel.
    pub fn transit(&self) -> Duration {
        self.fetch_completed_at.saturating_since(self.enqueued_at)
    }

    /// t1 - t0: how long the reader blocked for the batch.
    pub fn fetch_wait(&self) -> Duration {
        self.fetch_completed_at.saturating_since(self.fetch_started_at)
    }

    /// t1 - s0.
    pub fn total(&self) -> Duration {
        self.fetch_completed_at.saturating_since(self.sent_at)
    }

    /// `[s0, s1, t0, t1]` as signed seconds relative to s0.
    ///
    /// t0 is negative when the reader was already waiting before the message
    /// was sent ("ahead"), positive when it fell behind.
    pub fn offsets(&self) -> [f64; 4] {
        let origin = self.sent_at;
        [
            0.0,
            self.enqueued_at.offset_from(origin),
            self.fetch_started_at.offset_from(origin),
            self.fetch_completed_at.offset_from(origin),
        ]
    }
}

/// Append-only, FIFO-drainable sequence of records.
#[derive(Debug, Default)]
pub struct MeteringLog {
    records: VecDeque<MeterRecord>,
    appended: u64,
}

impl MeteringLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: MeterRecord) {
        self.records.push_back(record);
        self.appended += 1;
    }

    /// Records not yet drained.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records appended over the log's lifetime, drained or not.
    pub fn total_appended(&self) -> u64 {
        self.appended
    }

    pub fn iter(&self) -> impl Iterator<Item = &MeterRecord> {
        self.records.iter()
    }

    /// Pop records oldest first into `f` until the log is empty.
    pub fn drain_using<F: FnMut(MeterRecord)>(&mut self, mut f: F) {
        while let Some(record) = self.records.pop_front() {
            f(record);
        }
    }
}

/// Mean and max of one interval.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize)]
pub struct IntervalStats {
    pub mean: Duration,
    pub max: Duration,
}

/// Aggregate view of a batch of records.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize)]
pub struct LogSummary {
    pub count: usize,
    pub enqueue_delay: IntervalStats,
    pub transit: IntervalStats,
    pub fetch_wait: IntervalStats,
    pub total: IntervalStats,
    /// Messages per second between the first send and the last fetch.
    pub throughput: f64,
}

impl LogSummary {
    pub fn from_records(records: &[MeterRecord]) -> Self {
        if records.is_empty() {
            return Self::default();
        }

        let stats = |f: fn(&MeterRecord) -> Duration| {
            let mut sum = 0.0;
            let mut max = Duration::ZERO;
            for r in records {
                let d = f(r);
                sum += d.as_secs_f64();
                max = max.max(d);
            }
            IntervalStats {
                mean: Duration::from_secs_f64(sum / records.len() as f64),
                max,
            }
        };

        let first = records.iter().map(|r| r.sent_at).min().unwrap_or_default();
        let last = records
            .iter()
            .map(|r| r.fetch_completed_at)
            .max()
            .unwrap_or_default();
        let span = last.saturating_since(first).as_secs_f64();

        Self {
            count: records.len(),
            enqueue_delay: stats(MeterRecord::enqueue_delay),
            transit: stats(MeterRecord::transit),
            fetch_wait: stats(MeterRecord::fetch_wait),
            total: stats(MeterRecord::total),
            throughput: if span > 0.0 {
                records.len() as f64 / span
            } else {
                0.0
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(s0: u64, s1: u64, t0: u64, t1: u64) -> MeterRecord {
        MeterRecord {
            sent_at: Timestamp::from_nanos(s0),
            enqueued_at: Timestamp::from_nanos(s1),
            fetch_started_at: Timestamp::from_nanos(t0),
            fetch_completed_at: Timestamp::from_nanos(t1),
        }
    }

    #[test]
    fn intervals_and_offsets() {
        let r = record(1_000, 3_000, 500, 4_000);
        assert_eq!(r.enqueue_delay(), Duration::from_nanos(2_000));
        assert_eq!(r.transit(), Duration::from_nanos(1_000));
        assert_eq!(r.fetch_wait(), Duration::from_nanos(3_500));
        assert_eq!(r.total(), Duration::from_nanos(3_000));

        let [s0, s1, t0, t1] = r.offsets();
        assert_eq!(s0, 0.0);
        assert!((s1 - 2e-6).abs() < 1e-12);
        assert!((t0 + 5e-7).abs() < 1e-12, "reader was ahead of the send");
        assert!((t1 - 3e-6).abs() < 1e-12);
    }

    #[test]
    fn drain_is_fifo_and_idempotent() {
        let mut log = MeteringLog::new();
        let mut calls = 0;
        log.drain_using(|_| calls += 1);
        assert_eq!(calls, 0);

        for i in 0..3 {
            log.push(record(i, i, i, i));
        }
        let mut seen = Vec::new();
        log.drain_using(|r| seen.push(r.sent_at.as_nanos()));
        assert_eq!(seen, vec![0, 1, 2]);
        assert!(log.is_empty());
        assert_eq!(log.total_appended(), 3);

        log.drain_using(|_| calls += 1);
        assert_eq!(calls, 0);
    }

    #[test]
    fn summary_aggregates() {
        let records = vec![
            record(0, 1_000, 0, 2_000),
            record(1_000, 4_000, 0, 5_000),
        ];
        let summary = LogSummary::from_records(&records);
        assert_eq!(summary.count, 2);
        let mean = summary.enqueue_delay.mean.as_nanos() as i128;
        assert!((mean - 2_000).abs() <= 1, "mean {mean}ns");
        assert_eq!(summary.enqueue_delay.max, Duration::from_nanos(3_000));
        assert_eq!(summary.transit.max, Duration::from_nanos(1_000));
        assert!(summary.throughput > 0.0);

        assert_eq!(LogSummary::from_records(&[]), LogSummary::default());
    }
}
