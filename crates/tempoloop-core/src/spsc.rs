//! Hand-rolled fixed-capacity SPSC ring buffer (§4.1)
//!
//! Used for the display and LED output queues, where a small, fixed-size,
//! always-on channel is the natural fit — the teacher reaches for
//! hand-maintained atomics (`SlicerAtomics`, `DeckAtomics`) rather than
//! `rtrb` for exactly this shape of always-resident, never-resized channel.
//! The command and clock-event/tick queues use `rtrb` directly instead (see
//! DESIGN.md); this type exists for the narrower display/LED contract.
//!
//! Capacity `C` must be a power of two; one slot is always kept empty to
//! distinguish full from empty, matching the pseudocode in §4.1 exactly.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};

pub struct RingBuffer<T, const C: usize> {
    slots: Box<[UnsafeCell<MaybeUninit<T>>]>,
    write_idx: AtomicUsize,
    read_idx: AtomicUsize,
}

unsafe impl<T: Send, const C: usize> Sync for RingBuffer<T, C> {}

impl<T, const C: usize> RingBuffer<T, C> {
    pub fn new() -> Self {
        assert!(C.is_power_of_two(), "capacity must be a power of two");
        let slots = (0..C)
            .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
            .collect();
        Self {
            slots,
            write_idx: AtomicUsize::new(0),
            read_idx: AtomicUsize::new(0),
        }
    }

    /// Producer-only. Returns false (dropping the item) if the buffer is full.
    pub fn push(&self, item: T) -> bool {
        let w = self.write_idx.load(Ordering::Relaxed);
        let r = self.read_idx.load(Ordering::Acquire);
        if (w + 1) % C == r % C {
            return false;
        }
        let slot = &self.slots[w % C];
        unsafe {
            (*slot.get()).write(item);
        }
        self.write_idx.store(w + 1, Ordering::Release);
        true
    }

    /// Consumer-only. Returns `None` if the buffer is empty.
    pub fn pop(&self) -> Option<T> {
        let r = self.read_idx.load(Ordering::Relaxed);
        let w = self.write_idx.load(Ordering::Acquire);
        if r == w {
            return None;
        }
        let slot = &self.slots[r % C];
        let item = unsafe { (*slot.get()).assume_init_read() };
        self.read_idx.store(r + 1, Ordering::Release);
        Some(item)
    }

    /// Advisory snapshot — may be stale by the time the caller reads it.
    pub fn len(&self) -> usize {
        let w = self.write_idx.load(Ordering::Relaxed);
        let r = self.read_idx.load(Ordering::Relaxed);
        w.wrapping_sub(r) % C
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        C - 1
    }
}

impl<T, const C: usize> Default for RingBuffer<T, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const C: usize> Drop for RingBuffer<T, C> {
    fn drop(&mut self) {
        while self.pop().is_some() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_pop_fifo() {
        let rb: RingBuffer<u32, 4> = RingBuffer::new();
        assert!(rb.push(1));
        assert!(rb.push(2));
        assert_eq!(rb.pop(), Some(1));
        assert_eq!(rb.pop(), Some(2));
        assert_eq!(rb.pop(), None);
    }

    #[test]
    fn test_full_drops() {
        let rb: RingBuffer<u32, 4> = RingBuffer::new();
        assert!(rb.push(1));
        assert!(rb.push(2));
        assert!(rb.push(3));
        assert!(!rb.push(4), "capacity is C-1 = 3, fourth push must drop");
        assert_eq!(rb.pop(), Some(1));
        assert!(rb.push(4));
    }

    #[test]
    fn test_size_bounds() {
        let rb: RingBuffer<u32, 8> = RingBuffer::new();
        for i in 0..7 {
            assert!(rb.push(i));
        }
        assert_eq!(rb.len(), 7);
        assert!(rb.len() <= rb.capacity());
    }
}
