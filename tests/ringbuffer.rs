use crossbeam_utils::CachePadded;
use metered_pipe::Pipe::Buffer::layout::{RingHeader, RING_MAGIC, RING_VERSION};
use metered_pipe::Pipe::Buffer::{RingBuffer, MSG_INLINE};
use metered_pipe::Pipe::Structs::EnvelopeMeta;
use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::sync::atomic::{AtomicU32, AtomicU64};
use std::sync::Arc;
use std::thread;

fn create_dummy_header(capacity: u64) -> Box<RingHeader> {
    Box::new(RingHeader {
        magic: RING_MAGIC,
        version: RING_VERSION,
        slot_payload: MSG_INLINE as u32,
        capacity,
        signal: AtomicU32::new(0),
        tail: CachePadded::new(AtomicU64::new(0)),
        head: CachePadded::new(AtomicU64::new(0)),
    })
}

fn make_aligned_backing(capacity: usize) -> (*mut u8, Layout) {
    let size = capacity * RingBuffer::slot_stride();
    let layout = Layout::from_size_align(size, 128).unwrap();
    let ptr = unsafe { alloc_zeroed(layout) };
    if ptr.is_null() {
        panic!("Failed to allocate aligned memory");
    }
    (ptr, layout)
}

fn meta(sequence: u64, batch_len: u32, batch_index: u32) -> EnvelopeMeta {
    EnvelopeMeta {
        sequence,
        batch_len,
        batch_index,
        ..EnvelopeMeta::default()
    }
}

#[test]
fn simple_enqueue_dequeue() {
    let capacity = 16;
    let (ptr, layout) = make_aligned_backing(capacity);
    let header = create_dummy_header(capacity as u64);
    let rb = unsafe { RingBuffer::new(&*header, ptr) };
    unsafe {
        rb.init_slots();
    }

    let payload = vec![1, 2, 3, 4];
    assert!(rb.enqueue_batch(&[(meta(7, 1, 0), &payload[..])]).is_some());
    assert_eq!(rb.len(), 1);

    let (meta_out, data) = rb.dequeue().expect("one message queued");
    assert_eq!(data, payload);
    assert_eq!(meta_out.sequence, 7);
    assert_eq!(meta_out.payload_len, 4);
    assert!(rb.dequeue().is_none());
    assert!(rb.is_empty());

    unsafe {
        dealloc(ptr, layout);
    }
}

#[test]
fn batch_is_all_or_nothing() {
    let capacity = 4;
    let (ptr, layout) = make_aligned_backing(capacity);
    let header = create_dummy_header(capacity as u64);
    let rb = unsafe { RingBuffer::new(&*header, ptr) };
    unsafe {
        rb.init_slots();
    }

    let payload = [0u8; 8];
    let three: Vec<_> = (0..3).map(|i| (meta(i, 3, i as u32), &payload[..])).collect();
    let two: Vec<_> = (3..5).map(|i| (meta(i, 2, (i - 3) as u32), &payload[..])).collect();

    assert!(rb.enqueue_batch(&three).is_some());
    // Only one slot left: nothing of the second batch may land
    assert!(rb.enqueue_batch(&two).is_none());
    assert_eq!(rb.len(), 3);

    // Free one slot; now two fit, wrapping around the end
    assert_eq!(rb.dequeue().map(|(m, _)| m.sequence), Some(0));
    assert!(rb.enqueue_batch(&two).is_some());
    assert_eq!(rb.len(), 4);

    let order: Vec<u64> = std::iter::from_fn(|| rb.dequeue().map(|(m, _)| m.sequence)).collect();
    assert_eq!(order, vec![1, 2, 3, 4]);

    unsafe {
        dealloc(ptr, layout);
    }
}

#[test]
fn oversized_batch_never_fits() {
    let capacity = 4;
    let (ptr, layout) = make_aligned_backing(capacity);
    let header = create_dummy_header(capacity as u64);
    let rb = unsafe { RingBuffer::new(&*header, ptr) };
    unsafe {
        rb.init_slots();
    }

    let payload = [0u8; 1];
    let five: Vec<_> = (0..5).map(|i| (meta(i, 5, i as u32), &payload[..])).collect();
    assert!(rb.enqueue_batch(&five).is_none());
    assert!(rb.is_empty());
    assert_eq!(rb.enqueue_batch(&[]), Some(0));

    unsafe {
        dealloc(ptr, layout);
    }
}

#[test]
fn batches_keep_order_across_threads() {
    let capacity = 8;
    let (ptr, layout) = make_aligned_backing(capacity);
    let header = create_dummy_header(capacity as u64);
    let header_ptr: *const RingHeader = &*header;

    let rb = Arc::new(unsafe { RingBuffer::new(header_ptr, ptr) });
    unsafe {
        rb.init_slots();
    }

    let total = 5_000u64;

    let rb_prod = rb.clone();
    let p = thread::spawn(move || {
        let mut rng = fastrand::Rng::with_seed(7);
        let mut next = 0u64;
        while next < total {
            let n = rng.u64(1..=capacity as u64).min(total - next);
            let payloads: Vec<[u8; 8]> = (next..next + n).map(|i| i.to_le_bytes()).collect();
            let batch: Vec<_> = payloads
                .iter()
                .enumerate()
                .map(|(i, bytes)| (meta(next + i as u64, n as u32, i as u32), &bytes[..]))
                .collect();
            while rb_prod.enqueue_batch(&batch).is_none() {
                thread::yield_now();
            }
            next += n;
        }
    });

    let rb_cons = rb.clone();
    let c = thread::spawn(move || {
        let mut expected = 0u64;
        while expected < total {
            if let Some((meta, data)) = rb_cons.dequeue() {
                assert_eq!(meta.sequence, expected);
                assert_eq!(u64::from_le_bytes(data[..8].try_into().unwrap()), expected);
                expected += 1;
            } else {
                std::hint::spin_loop();
            }
        }
    });

    p.join().unwrap();
    c.join().unwrap();
    drop(rb);
    drop(header);

    unsafe {
        dealloc(ptr, layout);
    }
}
