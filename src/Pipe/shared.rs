// Cross-process bounded channel: a slot ring in a named /dev/shm region.
//
// Region layout: [RingHeader][Slot; capacity]. Each envelope takes one slot;
// a batch takes a contiguous run of slots claimed in a single step, and
// every slot carries (batch_len, batch_index) so the reader can put the
// batch back together.

use std::io;
use std::marker::PhantomData;
use std::mem::size_of;
use std::ptr;
use std::sync::atomic::{fence, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use crossbeam_utils::CachePadded;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, trace, warn};

use super::channel::{BoundedChannel, Envelope};
use crate::Core::{attach_shared_memory, create_shared_memory, SharedMemoryBackend};
use crate::Pipe::Buffer::layout::{RingHeader, RING_MAGIC, RING_VERSION};
use crate::Pipe::Buffer::{RingBuffer, MSG_INLINE};
use crate::Pipe::Structs::Envelope_Structs::{EnvelopeMeta, Timestamp};
use crate::error::{PipeError, Result};

/// Upper bound on a single futex sleep; the reader re-checks the ring after it.
const WAIT_SLICE: Duration = Duration::from_millis(50);

/// A bounded channel living in shared memory, usable from several processes.
///
/// One process calls [`SharedChannel::create`]; the peer calls
/// [`SharedChannel::attach`] with the same name. Payloads are serialized with
/// `bincode` and must fit in [`MSG_INLINE`] bytes.
pub struct SharedChannel<T> {
    pub(crate) shm: Box<dyn SharedMemoryBackend>,
    pub(crate) ring: RingBuffer,
    pub(crate) name: String,
    _payload: PhantomData<fn(T) -> T>,
}

impl<T> SharedChannel<T> {
    /// Create a fresh ring named `name` with room for `capacity` messages.
    ///
    /// `capacity` must be a non-zero power of two. Any stale region with the
    /// same name is replaced. The region is removed when this handle drops.
    pub fn create(name: &str, capacity: usize) -> Result<Self> {
        if capacity == 0 || !capacity.is_power_of_two() {
            return Err(PipeError::InvalidConfig(format!(
                "shared ring capacity must be a non-zero power of two, got {capacity}"
            )));
        }

        let size = RingBuffer::region_size(capacity);
        let shm = create_shared_memory(size, name)?;

        let header = shm.as_ptr() as *mut RingHeader;
        if (header as usize) % 128 != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Shared memory not properly aligned",
            )
            .into());
        }

        let ring = unsafe {
            ptr::write(
                header,
                RingHeader {
                    magic: 0,
                    version: RING_VERSION,
                    slot_payload: MSG_INLINE as u32,
                    capacity: capacity as u64,
                    signal: AtomicU32::new(0),
                    tail: CachePadded::new(AtomicU64::new(0)),
                    head: CachePadded::new(AtomicU64::new(0)),
                },
            );
            let ring = RingBuffer::new(header, shm.as_ptr().add(size_of::<RingHeader>()));
            ring.init_slots();

            // Magic goes in last: attachers treat its presence as "ready".
            fence(Ordering::Release);
            ptr::write_volatile(ptr::addr_of_mut!((*header).magic), RING_MAGIC);
            ring
        };

        debug!(name, capacity, bytes = size, "created shared ring");
        Ok(Self {
            shm,
            ring,
            name: name.to_owned(),
            _payload: PhantomData,
        })
    }

    /// Attach to a ring previously created under `name`.
    pub fn attach(name: &str) -> Result<Self> {
        let shm = attach_shared_memory(name, size_of::<RingHeader>())?;
        let header = shm.as_ptr() as *const RingHeader;

        let (magic, version, slot_payload, capacity) = unsafe {
            let magic = ptr::read_volatile(ptr::addr_of!((*header).magic));
            fence(Ordering::Acquire);
            (
                magic,
                (*header).version,
                (*header).slot_payload,
                (*header).capacity as usize,
            )
        };

        let invalid = |msg: String| -> PipeError {
            io::Error::new(io::ErrorKind::InvalidData, msg).into()
        };
        if magic != RING_MAGIC {
            return Err(invalid(format!(
                "'{name}' is not an initialized metered-pipe ring"
            )));
        }
        if version != RING_VERSION || slot_payload as usize != MSG_INLINE {
            return Err(invalid(format!(
                "'{name}' has layout v{version} with {slot_payload}-byte slots, expected v{RING_VERSION} with {MSG_INLINE}-byte slots"
            )));
        }
        if capacity == 0 || !capacity.is_power_of_two() {
            return Err(invalid(format!("'{name}' has invalid capacity {capacity}")));
        }
        if shm.size() < RingBuffer::region_size(capacity) {
            return Err(invalid(format!(
                "'{name}' is truncated: {} bytes for {capacity} slots",
                shm.size()
            )));
        }

        let ring = unsafe { RingBuffer::new(header, shm.as_ptr().add(size_of::<RingHeader>())) };

        debug!(name, capacity, "attached to shared ring");
        Ok(Self {
            shm,
            ring,
            name: name.to_owned(),
            _payload: PhantomData,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Messages currently in the ring.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Whether this handle created the region.
    pub fn is_owner(&self) -> bool {
        self.shm.is_owner()
    }

    /// Pull the remaining `batch_len - 1` slots of a batch whose first slot
    /// has been dequeued. The whole range was claimed before the first slot
    /// was published, so the rest is at most a few stores away.
    fn next_in_batch(&self) -> (EnvelopeMeta, Vec<u8>) {
        let mut spins = 0u32;
        loop {
            if let Some(slot) = self.ring.dequeue() {
                return slot;
            }
            spins += 1;
            if spins < 64 {
                std::hint::spin_loop();
            } else {
                std::thread::yield_now();
            }
        }
    }
}

impl<T: DeserializeOwned> SharedChannel<T> {
    fn decode(meta: &EnvelopeMeta, bytes: &[u8]) -> Result<Envelope<T>> {
        Ok(Envelope {
            payload: bincode::deserialize(bytes)?,
            sequence: meta.sequence,
            sent_at: Timestamp::from_nanos(meta.sent_at_ns),
            enqueued_at: Timestamp::from_nanos(meta.enqueued_at_ns),
        })
    }

    /// Put a batch back together from its first slot and the `batch_len - 1`
    /// that follow it.
    ///
    /// Every slot of the batch is taken off the ring even when one of them
    /// fails to decode or is mis-framed, so the next call starts on a batch
    /// boundary. The first failure is returned.
    fn collect_batch(&self, first: EnvelopeMeta, bytes: Vec<u8>) -> Result<Vec<Envelope<T>>> {
        let batch_len = first.batch_len;
        if batch_len == 0 || first.batch_index != 0 || batch_len as usize > self.ring.capacity() {
            return Err(PipeError::Framing(format!(
                "batch starts at index {} of {}",
                first.batch_index, batch_len
            )));
        }

        let mut batch = Vec::with_capacity(batch_len as usize);
        let mut failure: Option<PipeError> = None;
        let mut first_slot = Some(bytes);

        for index in 0..batch_len {
            let (meta, bytes) = match first_slot.take() {
                Some(bytes) => (first, bytes),
                None => self.next_in_batch(),
            };
            match Self::check_and_decode(&first, &meta, index, &bytes) {
                Ok(envelope) => batch.push(envelope),
                Err(err) => {
                    failure.get_or_insert(err);
                }
            }
        }

        if let Some(err) = failure {
            warn!(ring = %self.name, batch_len, %err, "dropped malformed batch");
            return Err(err);
        }
        trace!(ring = %self.name, messages = batch.len(), "dequeued batch");
        Ok(batch)
    }

    /// Decode slot `index` of the batch that `first` opened.
    fn check_and_decode(
        first: &EnvelopeMeta,
        meta: &EnvelopeMeta,
        index: u32,
        bytes: &[u8],
    ) -> Result<Envelope<T>> {
        if meta.batch_index != index || meta.batch_len != first.batch_len {
            return Err(PipeError::Framing(format!(
                "expected slot {index} of {}, found slot {} of {}",
                first.batch_len, meta.batch_index, meta.batch_len
            )));
        }
        if meta.sender_pid != first.sender_pid {
            return Err(PipeError::Framing(format!(
                "slot {index} written by pid {}, batch opened by pid {}",
                meta.sender_pid, first.sender_pid
            )));
        }
        if meta.flags != 0 {
            return Err(PipeError::Framing(format!(
                "slot {index} carries unknown flags {:#x}",
                meta.flags
            )));
        }
        Self::decode(meta, bytes)
    }
}

impl<T> BoundedChannel<T> for SharedChannel<T>
where
    T: Serialize + DeserializeOwned + Send,
{
    fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    fn admit(&self, payload: &T) -> Result<()> {
        let len = bincode::serialized_size(payload)? as usize;
        if len > MSG_INLINE {
            return Err(PipeError::PayloadTooLarge {
                len,
                max: MSG_INLINE,
            });
        }
        Ok(())
    }

    fn try_enqueue(&self, batch: &mut Vec<Envelope<T>>) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        if batch.len() > self.ring.capacity() {
            return Err(PipeError::ChannelFull);
        }

        let encoded = batch
            .iter()
            .map(|env| bincode::serialize(&env.payload))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        if let Some(too_big) = encoded.iter().find(|bytes| bytes.len() > MSG_INLINE) {
            return Err(PipeError::PayloadTooLarge {
                len: too_big.len(),
                max: MSG_INLINE,
            });
        }

        let pid = std::process::id();
        let batch_len = batch.len() as u32;
        let slots: Vec<(EnvelopeMeta, &[u8])> = batch
            .iter()
            .zip(&encoded)
            .enumerate()
            .map(|(i, (env, bytes))| {
                let meta = EnvelopeMeta {
                    sequence: env.sequence,
                    sent_at_ns: env.sent_at.as_nanos(),
                    enqueued_at_ns: env.enqueued_at.as_nanos(),
                    batch_len,
                    batch_index: i as u32,
                    sender_pid: pid,
                    flags: 0,
                    payload_len: bytes.len() as u32,
                    _reserved: 0,
                };
                (meta, bytes.as_slice())
            })
            .collect();

        match self.ring.enqueue_batch(&slots) {
            Some(_) => {
                self.ring.signal_reader();
                batch.clear();
                Ok(())
            }
            None => Err(PipeError::ChannelFull),
        }
    }

    fn dequeue(&self) -> Result<Vec<Envelope<T>>> {
        loop {
            let seen = self.ring.signal_value();
            if let Some((meta, bytes)) = self.ring.dequeue() {
                return self.collect_batch(meta, bytes);
            }
            self.ring.wait_for_data(seen, Some(WAIT_SLICE));
        }
    }
}

impl<T> std::fmt::Debug for SharedChannel<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        crate::Debug::StructDebug::debug_shared_channel(self, f)
    }
}
