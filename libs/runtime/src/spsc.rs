//! Lock-free single-producer/single-consumer ring buffer
//!
//! Capacity rounds up to a power of two; the write and read indices are
//! monotonically increasing and masked to a slot. The atomic element count
//! provides the happens-before edge: the producer publishes with a
//! release increment after writing the slot, the consumer observes it with
//! an acquire load before reading, and releases the slot back with a
//! release decrement.
//!
//! `push` on a full ring returns the element to the caller; producers log
//! and drop rather than block. `pop` on an empty ring returns `None`;
//! consumers busy-spin with a CPU relax hint.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[repr(align(64))]
struct CacheAligned<T>(T);

struct Shared<T> {
    slots: Box<[UnsafeCell<MaybeUninit<T>>]>,
    mask: usize,
    /// Next slot the producer writes. Written only by the producer.
    write_index: CacheAligned<AtomicUsize>,
    /// Next slot the consumer reads. Written only by the consumer.
    read_index: CacheAligned<AtomicUsize>,
    /// Unconsumed element count; the synchronization point.
    len: CacheAligned<AtomicUsize>,
}

unsafe impl<T: Send> Send for Shared<T> {}
unsafe impl<T: Send> Sync for Shared<T> {}

impl<T> Drop for Shared<T> {
    fn drop(&mut self) {
        let mut read = *self.read_index.0.get_mut();
        let write = *self.write_index.0.get_mut();
        while read != write {
            unsafe {
                (*self.slots[read & self.mask].get()).assume_init_drop();
            }
            read += 1;
        }
    }
}

/// Write half of an SPSC ring. Not clonable: exactly one producer.
pub struct Producer<T> {
    shared: Arc<Shared<T>>,
}

/// Read half of an SPSC ring. Not clonable: exactly one consumer.
pub struct Consumer<T> {
    shared: Arc<Shared<T>>,
}

/// Create a ring with at least `capacity` slots (rounded up to a power of
/// two), returning the two halves.
pub fn spsc<T: Send>(capacity: usize) -> (Producer<T>, Consumer<T>) {
    let capacity = capacity.max(1).next_power_of_two();
    let slots = (0..capacity)
        .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
        .collect::<Vec<_>>()
        .into_boxed_slice();
    let shared = Arc::new(Shared {
        slots,
        mask: capacity - 1,
        write_index: CacheAligned(AtomicUsize::new(0)),
        read_index: CacheAligned(AtomicUsize::new(0)),
        len: CacheAligned(AtomicUsize::new(0)),
    });
    (
        Producer {
            shared: Arc::clone(&shared),
        },
        Consumer { shared },
    )
}

impl<T: Send> Producer<T> {
    /// Publish one element. On a full ring the element comes back in `Err`.
    pub fn push(&mut self, item: T) -> Result<(), T> {
        let shared = &*self.shared;
        if shared.len.0.load(Ordering::Acquire) > shared.mask {
            return Err(item);
        }
        let index = shared.write_index.0.load(Ordering::Relaxed);
        unsafe {
            (*shared.slots[index & shared.mask].get()).write(item);
        }
        shared.write_index.0.store(index + 1, Ordering::Relaxed);
        shared.len.0.fetch_add(1, Ordering::Release);
        Ok(())
    }

    /// Unconsumed element count.
    pub fn len(&self) -> usize {
        self.shared.len.0.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.shared.mask + 1
    }
}

impl<T: Send> Consumer<T> {
    /// Consume one element, or `None` when the ring is empty.
    pub fn pop(&mut self) -> Option<T> {
        let shared = &*self.shared;
        if shared.len.0.load(Ordering::Acquire) == 0 {
            return None;
        }
        let index = shared.read_index.0.load(Ordering::Relaxed);
        let item = unsafe { (*shared.slots[index & shared.mask].get()).assume_init_read() };
        shared.read_index.0.store(index + 1, Ordering::Relaxed);
        shared.len.0.fetch_sub(1, Ordering::Release);
        Some(item)
    }

    /// Unconsumed element count.
    pub fn len(&self) -> usize {
        self.shared.len.0.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.shared.mask + 1
    }
}
