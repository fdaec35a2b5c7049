//! Lock-free visualization queue
//!
//! Single producer (the audio thread) and single consumer (a display timer)
//! share a power-of-two ring of sample slots. The producer never waits: it
//! always writes, overwriting the oldest samples when the consumer falls
//! behind. The consumer skips ahead to the oldest sample still held and
//! counts what it missed.
//!
//! Performance characteristics:
//! - Wait-free on both sides
//! - Cache-padded cursors (no false sharing)
//! - No allocations after construction

use crossbeam::utils::CachePadded;
use std::sync::atomic::{fence, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug)]
struct Ring {
    /// f32 bit patterns
    slots: Box<[AtomicU32]>,
    /// Samples published so far; everything below it is readable
    committed: CachePadded<AtomicUsize>,
    /// Raised before the producer touches any slot, so the consumer can
    /// tell which slots may have changed underneath it
    reserved: CachePadded<AtomicUsize>,
    mask: usize,
}

impl Ring {
    fn capacity(&self) -> usize {
        self.slots.len()
    }
}

/// Create a queue holding the most recent `capacity` samples
///
/// Capacity is rounded up to the next power of 2 (minimum 2).
pub fn scope_queue(capacity: usize) -> (ScopeProducer, ScopeConsumer) {
    let capacity = capacity.max(2).next_power_of_two();
    let ring = Arc::new(Ring {
        slots: (0..capacity).map(|_| AtomicU32::new(0)).collect(),
        committed: CachePadded::new(AtomicUsize::new(0)),
        reserved: CachePadded::new(AtomicUsize::new(0)),
        mask: capacity - 1,
    });

    (
        ScopeProducer {
            ring: Arc::clone(&ring),
            write: 0,
        },
        ScopeConsumer {
            ring,
            read: 0,
            dropped: 0,
        },
    )
}

/// Audio-thread end of the queue
#[derive(Debug)]
pub struct ScopeProducer {
    ring: Arc<Ring>,
    write: usize,
}

impl ScopeProducer {
    /// Append samples, overwriting the oldest if the ring is full
    pub fn push(&mut self, samples: &[f32]) {
        let ring = &*self.ring;
        let end = self.write + samples.len();

        // Only the newest `capacity` samples can survive this push
        let skip = samples.len().saturating_sub(ring.capacity());

        ring.reserved.store(end, Ordering::Relaxed);
        fence(Ordering::Release);

        for (i, &sample) in samples.iter().enumerate().skip(skip) {
            let pos = (self.write + i) & ring.mask;
            ring.slots[pos].store(sample.to_bits(), Ordering::Relaxed);
        }

        ring.committed.store(end, Ordering::Release);
        self.write = end;
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }
}

/// Display end of the queue
#[derive(Debug)]
pub struct ScopeConsumer {
    ring: Arc<Ring>,
    read: usize,
    dropped: u64,
}

impl ScopeConsumer {
    /// Read up to `out.len()` of the oldest unread samples
    ///
    /// Returns the number of samples written to `out`.
    pub fn pop(&mut self, out: &mut [f32]) -> usize {
        let ring = &*self.ring;
        let capacity = ring.capacity();
        let committed = ring.committed.load(Ordering::Acquire);

        let mut start = self.read;
        if committed - start > capacity {
            self.dropped += (committed - start - capacity) as u64;
            start = committed - capacity;
        }

        let mut n = out.len().min(committed - start);
        for (i, slot) in out[..n].iter_mut().enumerate() {
            let bits = ring.slots[(start + i) & ring.mask].load(Ordering::Relaxed);
            *slot = f32::from_bits(bits);
        }

        // Discard anything the producer may have overwritten during the copy
        fence(Ordering::Acquire);
        let oldest_intact = ring
            .reserved
            .load(Ordering::Relaxed)
            .saturating_sub(capacity);
        if oldest_intact > start {
            let torn = (oldest_intact - start).min(n);
            out.copy_within(torn..n, 0);
            self.dropped += torn as u64;
            n -= torn;
            start += torn;
        }

        self.read = start + n;
        n
    }

    /// Unread samples currently held (at most the capacity)
    pub fn available(&self) -> usize {
        let committed = self.ring.committed.load(Ordering::Acquire);
        (committed - self.read).min(self.ring.capacity())
    }

    /// Samples overwritten before they could be read
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }
}
