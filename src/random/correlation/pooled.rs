//! Amortized, FIFO-backed pooling of any tuple-producing generator.
//!
//! Grounded in `original_source/include/core/random/**/*_manager.h`'s
//! "reserve ahead of time, hand out from a queue" pattern (also echoed in
//! this crate's own [`super::permutation::PermutationManager`]): rather
//! than generating one triple/tuple per call, callers batch-reserve a
//! count up front and `get_next` drains it, amortizing setup cost (OT
//! base-OTs, network round trips) across many small requests.

use std::collections::VecDeque;

/// A FIFO of pre-generated tuples of type `Tup`, refilled in batches by a
/// caller-supplied generator closure.
pub struct Pooled<Tup, F>
where
    F: FnMut(usize) -> Vec<Tup>,
{
    queue: VecDeque<Tup>,
    generate: F,
}

impl<Tup, F> Pooled<Tup, F>
where
    F: FnMut(usize) -> Vec<Tup>,
{
    /// Wrap `generate` (a closure producing `count` fresh tuples at a
    /// time) as an empty pool.
    pub fn new(generate: F) -> Self {
        Pooled {
            queue: VecDeque::new(),
            generate,
        }
    }

    /// Number of tuples currently buffered.
    pub fn available(&self) -> usize {
        self.queue.len()
    }

    /// Top up the pool so at least `n` tuples are buffered, generating the
    /// shortfall in one call to the underlying generator.
    pub fn reserve(&mut self, n: usize) {
        if self.queue.len() >= n {
            return;
        }
        let missing = n - self.queue.len();
        self.queue.extend((self.generate)(missing));
    }

    /// Take the next `n` tuples, reserving more first if the pool is
    /// short.
    pub fn get_next(&mut self, n: usize) -> Vec<Tup> {
        self.reserve(n);
        (0..n)
            .map(|_| {
                self.queue
                    .pop_front()
                    .expect("reserve just ensured enough tuples")
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_next_refills_on_shortfall() {
        let mut next_id = 0u32;
        let mut pool = Pooled::new(move |count| {
            (0..count)
                .map(|_| {
                    next_id += 1;
                    next_id
                })
                .collect()
        });

        assert_eq!(pool.available(), 0);
        let first = pool.get_next(3);
        assert_eq!(first, vec![1, 2, 3]);
        assert_eq!(pool.available(), 0);

        pool.reserve(5);
        assert_eq!(pool.available(), 5);
        let second = pool.get_next(2);
        assert_eq!(second, vec![4, 5]);
        assert_eq!(pool.available(), 3);
    }

    #[test]
    fn reserve_is_a_no_op_when_enough_are_buffered() {
        let mut calls = 0u32;
        {
            let mut pool = Pooled::new(|count| {
                calls += 1;
                vec![0u8; count]
            });
            pool.reserve(4);
            pool.reserve(2);
        }
        assert_eq!(calls, 1);
    }
}
