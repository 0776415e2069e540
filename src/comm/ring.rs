//! A fixed-depth single-producer/single-consumer ring buffer of byte
//! messages, the backing structure for the no-copy direct-socket transport.
//!
//! Generalizes `channel_utils::sync_channel_by_cb::crossbeam_wrapper`'s
//! `Read`/`Write` adapter over an *unbounded* `crossbeam::channel` into a
//! *bounded* ring with a fixed depth, built on `crossbeam::queue::ArrayQueue`
//! plus a `crossbeam::utils::Backoff`-based busy-wait in place of the
//! channel's blocking `recv`/`send`, matching the no-copy ring's spin-loop
//! behavior described in
//! `original_source/include/core/communication/no_copy_communicator/
//! no_copy_ring.h`.

use crossbeam::queue::ArrayQueue;
use crossbeam::utils::Backoff;

/// One entry in the ring: a generation counter (this crate's Rust-native
/// stand-in for the original's pointer-identity check on pop -- two
/// `Vec<u8>` buffers can compare equal by content but a generation counter
/// is unique per push, so a caller that remembers the generation it pushed
/// can verify it got back the same slot) plus the payload bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RingEntry {
    /// Monotonically increasing identity of this push.
    pub generation: u64,
    /// The message bytes.
    pub payload: Vec<u8>,
}

/// A bounded SPSC ring of [`RingEntry`] values.
pub struct Ring {
    queue: ArrayQueue<RingEntry>,
    next_generation: std::sync::atomic::AtomicU64,
}

impl Ring {
    /// A ring with room for `depth` entries.
    pub fn new(depth: usize) -> Self {
        Ring {
            queue: ArrayQueue::new(depth),
            next_generation: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Push `payload`, busy-waiting while the ring is full. Returns the
    /// generation assigned to this entry.
    pub fn push_blocking(&self, payload: Vec<u8>) -> u64 {
        let generation = self
            .next_generation
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let mut entry = RingEntry { generation, payload };
        let backoff = Backoff::new();
        loop {
            match self.queue.push(entry) {
                Ok(()) => return generation,
                Err(rejected) => {
                    entry = rejected;
                    backoff.snooze();
                }
            }
        }
    }

    /// Pop the next entry, busy-waiting while the ring is empty.
    pub fn pop_blocking(&self) -> RingEntry {
        let backoff = Backoff::new();
        loop {
            if let Some(entry) = self.queue.pop() {
                return entry;
            }
            backoff.snooze();
        }
    }

    /// Pop the next entry and verify it carries the expected generation,
    /// the ring's equivalent of the original's pointer-identity check.
    pub fn pop_blocking_expect(&self, expected_generation: u64) -> RingEntry {
        let entry = self.pop_blocking();
        assert_eq!(
            entry.generation, expected_generation,
            "ring returned entry out of order"
        );
        entry
    }

    /// Number of entries currently buffered.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether the ring is empty.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn push_pop_preserves_fifo_order() {
        let ring = Ring::new(4);
        ring.push_blocking(b"a".to_vec());
        ring.push_blocking(b"b".to_vec());
        assert_eq!(ring.pop_blocking().payload, b"a");
        assert_eq!(ring.pop_blocking().payload, b"b");
    }

    #[test]
    fn generations_are_strictly_increasing() {
        let ring = Ring::new(4);
        let g0 = ring.push_blocking(b"x".to_vec());
        let g1 = ring.push_blocking(b"y".to_vec());
        assert!(g1 > g0);
    }

    #[test]
    fn producer_blocks_until_consumer_drains() {
        let ring = Arc::new(Ring::new(1));
        ring.push_blocking(b"first".to_vec());

        let ring2 = ring.clone();
        let handle = std::thread::spawn(move || {
            ring2.push_blocking(b"second".to_vec());
        });

        std::thread::sleep(std::time::Duration::from_millis(20));
        assert_eq!(ring.len(), 1);

        let first = ring.pop_blocking();
        assert_eq!(first.payload, b"first");

        handle.join().unwrap();
        let second = ring.pop_blocking();
        assert_eq!(second.payload, b"second");
    }
}
