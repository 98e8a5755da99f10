use std::mem::size_of;
use std::ptr;
use std::sync::atomic::Ordering::{AcqRel, Acquire, Relaxed, Release};
use std::time::Duration;

use super::layout::RingHeader;
use super::Buffer::{RingBuffer, Slot, MSG_INLINE};
use crate::Pipe::Structs::Envelope_Structs::EnvelopeMeta;

impl RingBuffer {
    /// View over a header and slot array that already live in a mapping.
    ///
    /// # Safety
    /// Caller must ensure `header` points to an initialized `RingHeader` and
    /// `buffer_base` to `capacity` slots, both valid for the life of the view.
    pub unsafe fn new(header: *const RingHeader, buffer_base: *mut u8) -> Self {
        let capacity = (*header).capacity as usize;
        Self {
            header,
            buffer_base,
            capacity,
            mask: capacity - 1,
        }
    }

    /// Distance in bytes between consecutive slots.
    #[inline]
    pub fn slot_stride() -> usize {
        size_of::<Slot>()
    }

    /// Bytes needed for a header plus `capacity` slots.
    pub fn region_size(capacity: usize) -> usize {
        size_of::<RingHeader>() + capacity * Self::slot_stride()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Mark every slot free for lap zero (slot k gets sequence k). Only the
    /// process that created the region calls this, before publishing magic.
    ///
    /// # Safety
    /// The slot array must be mapped writable and not yet shared.
    pub unsafe fn init_slots(&self) {
        for k in 0..self.capacity {
            let slot = self.slot_mut(k);
            (*slot).sequence.store(k as u64, Relaxed);
        }
    }

    #[inline]
    unsafe fn slot_mut(&self, index: usize) -> *mut Slot {
        let base = self.buffer_base.add(index * Self::slot_stride());
        base as *mut Slot
    }

    #[inline]
    fn header(&self) -> &RingHeader {
        // Safety: the view never outlives the mapping it was built over
        unsafe { &*self.header }
    }

    /// Messages currently published and not yet dequeued (approximate under
    /// concurrent use).
    pub fn len(&self) -> usize {
        let tail = self.header().tail.load(Acquire);
        let head = self.header().head.load(Acquire);
        tail.saturating_sub(head) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Place a whole batch in consecutive slots, or none of it.
    ///
    /// Returns the slot index of the first message, or `None` when the ring
    /// lacks room for every message right now (or ever, if the batch is
    /// longer than the ring).
    pub fn enqueue_batch(&self, messages: &[(EnvelopeMeta, &[u8])]) -> Option<usize> {
        let batch_size = messages.len();
        if batch_size == 0 {
            return Some(0);
        }
        if batch_size > self.capacity {
            return None;
        }

        let tail_atomic = &self.header().tail;

        'claim: loop {
            let tail = tail_atomic.load(Relaxed);

            // 1. Check that every slot in the batch range is free
            for i in 0..batch_size {
                let target_seq = tail + i as u64;
                let idx = (target_seq as usize) & self.mask;
                let slot_ptr = unsafe { self.slot_mut(idx) };
                let seq = unsafe { &(*slot_ptr).sequence }.load(Acquire);

                let dif = seq as i64 - target_seq as i64;
                if dif < 0 {
                    // The reader has not freed this slot yet
                    return None;
                } else if dif > 0 {
                    // Tail moved under us; reload it
                    std::hint::spin_loop();
                    continue 'claim;
                }
            }

            // 2. Claim the whole range at once
            if tail_atomic
                .compare_exchange_weak(tail, tail + batch_size as u64, AcqRel, Relaxed)
                .is_ok()
            {
                // [tail, tail + batch_size) is ours; no other writer touches it
                for (i, (meta, payload)) in messages.iter().enumerate() {
                    let target_seq = tail + i as u64;
                    let idx = (target_seq as usize) & self.mask;
                    let slot_ptr = unsafe { self.slot_mut(idx) };
                    let len = payload.len().min(MSG_INLINE);
                    debug_assert_eq!(len, payload.len(), "payload exceeds slot size");

                    unsafe {
                        (*slot_ptr).meta = *meta;
                        (*slot_ptr).meta.payload_len = len as u32;

                        ptr::copy_nonoverlapping(
                            payload.as_ptr(),
                            (*slot_ptr).payload.as_mut_ptr(),
                            len,
                        );

                        (*slot_ptr).sequence.store(target_seq + 1, Release);
                    }
                }
                return Some((tail as usize) & self.mask);
            }
            std::hint::spin_loop();
        }
    }

    /// Take the oldest published slot.
    ///
    /// `None` means the ring is empty or the next slot is claimed but its
    /// writer has not published it yet.
    pub fn dequeue(&self) -> Option<(EnvelopeMeta, Vec<u8>)> {
        let head_atomic = &self.header().head;

        loop {
            let head = head_atomic.load(Relaxed);
            let idx = (head as usize) & self.mask;
            let slot_ptr = unsafe { self.slot_mut(idx) };
            let seq = unsafe { &(*slot_ptr).sequence }.load(Acquire);
            let dif = seq as i64 - (head as i64 + 1);

            if dif == 0 {
                if head_atomic
                    .compare_exchange_weak(head, head + 1, AcqRel, Relaxed)
                    .is_ok()
                {
                    let (meta, payload) = unsafe {
                        let meta = (*slot_ptr).meta;
                        let len = (meta.payload_len as usize).min(MSG_INLINE);
                        let mut payload = vec![0u8; len];
                        ptr::copy_nonoverlapping(
                            (*slot_ptr).payload.as_ptr(),
                            payload.as_mut_ptr(),
                            len,
                        );
                        (meta, payload)
                    };

                    // free slot for the writer's next lap
                    unsafe {
                        (*slot_ptr).sequence.store(head + self.capacity as u64, Release);
                    }
                    return Some((meta, payload));
                }
                continue;
            } else {
                // empty, or the writer is mid-publish
                return None;
            }
        }
    }

    /// Current value of the wake-up word. Read it *before* checking for data
    /// and pass it to `wait_for_data`, so a publish in between is not missed.
    pub fn signal_value(&self) -> u32 {
        self.header().signal.load(Acquire)
    }

    /// Bump the wake-up word and wake a parked reader.
    pub fn signal_reader(&self) {
        let signal = &self.header().signal;
        signal.fetch_add(1, Release);
        crate::Core::futex::futex_wake(signal);
    }

    /// Park until the wake-up word moves past `seen` or `timeout` elapses.
    pub fn wait_for_data(&self, seen: u32, timeout: Option<Duration>) {
        crate::Core::futex::futex_wait(&self.header().signal, seen, timeout);
    }
}
