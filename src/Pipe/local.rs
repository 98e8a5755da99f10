// In-process bounded channel for pipes whose ends live on threads of the
// same process.

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

use super::channel::{BoundedChannel, Envelope};
use crate::error::{PipeError, Result};

struct State<T> {
    batches: VecDeque<Vec<Envelope<T>>>,
    /// Messages across all queued batches.
    len: usize,
}

/// Bounded batch queue guarded by a `parking_lot` mutex.
pub struct LocalChannel<T> {
    state: Mutex<State<T>>,
    ready: Condvar,
    pub(crate) capacity: usize,
}

impl<T> LocalChannel<T> {
    /// `capacity` is in messages and must be non-zero.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(PipeError::InvalidConfig(
                "channel capacity must be greater than zero".into(),
            ));
        }
        Ok(Self {
            state: Mutex::new(State {
                batches: VecDeque::new(),
                len: 0,
            }),
            ready: Condvar::new(),
            capacity,
        })
    }

    /// Messages currently queued.
    pub fn len(&self) -> usize {
        self.state.lock().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Send> BoundedChannel<T> for LocalChannel<T> {
    fn capacity(&self) -> usize {
        self.capacity
    }

    fn try_enqueue(&self, batch: &mut Vec<Envelope<T>>) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut state = self.state.lock();
        if state.len + batch.len() > self.capacity {
            return Err(PipeError::ChannelFull);
        }
        state.len += batch.len();
        state.batches.push_back(std::mem::take(batch));
        drop(state);

        self.ready.notify_one();
        Ok(())
    }

    fn dequeue(&self) -> Result<Vec<Envelope<T>>> {
        let mut state = self.state.lock();
        loop {
            if let Some(batch) = state.batches.pop_front() {
                state.len -= batch.len();
                return Ok(batch);
            }
            self.ready.wait(&mut state);
        }
    }
}

impl<T> std::fmt::Debug for LocalChannel<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        crate::Debug::StructDebug::debug_local_channel(self, f)
    }
}
