//! Typed vectors with non-materialized access-pattern views.
//!
//! A [`Vector<T>`] is a logical sequence of `T` backed by a reference-counted
//! storage buffer plus a [`ViewKind`] chain describing how logical indices
//! translate into storage indices. Strided, cyclic, reversed, alternating and
//! repeated re-indexings are all expressed without copying; only the
//! elementwise operators (`+`, `-`, `*`, bitwise, comparisons, shifts)
//! materialize a fresh plain result vector.
//!
//! There is no single file in the teacher crate that implements this --
//! the teacher works directly on `Vec<FiniteField>`. The `Arc`-wrapped
//! shared-storage shape follows `channel_utils::ch_arcnize`'s preference for
//! `Arc`-wrapped shared state, and the view descriptor sum type follows the
//! shape described for `Vector<T>` in the surrounding design documents.

mod int;
mod view;

pub use int::ShareInt;
pub use view::ViewKind;

use std::sync::Arc;
use view::ViewNode;

/// A logical sequence of `T`, backed by shared storage and a view
/// descriptor. `T` is one of the signed integer widths the runtime shares:
/// `i8`, `i16`, `i32`, `i64`, `i128`.
#[derive(Clone)]
pub struct Vector<T: ShareInt> {
    storage: Arc<Vec<T>>,
    view: Arc<ViewNode>,
    batch_start: usize,
    batch_end: usize,
    precision: u32,
}

impl<T: ShareInt> Vector<T> {
    /// Build a plain vector directly over owned storage.
    pub fn from_vec(data: Vec<T>) -> Self {
        let len = data.len();
        Vector {
            storage: Arc::new(data),
            view: Arc::new(ViewNode::plain(len)),
            batch_start: 0,
            batch_end: len,
            precision: 0,
        }
    }

    /// Build a plain zero-filled vector of the given length.
    pub fn zeros(len: usize) -> Self {
        Self::from_vec(vec![T::default(); len])
    }

    /// Fixed-point precision (fractional bits) carried by this vector.
    pub fn precision(&self) -> u32 {
        self.precision
    }

    /// Return a copy of this vector with an overridden precision, without
    /// touching any element. Used by protocol code that tracks scale
    /// factors explicitly (e.g. after a caller-performed truncation).
    pub fn with_precision(mut self, precision: u32) -> Self {
        self.precision = precision;
        self
    }

    /// Number of elements visible in the active batch window.
    pub fn size(&self) -> usize {
        self.batch_end - self.batch_start
    }

    /// Number of elements in the full view, ignoring the batch window.
    pub fn total_size(&self) -> usize {
        self.view.size()
    }

    /// Narrow the active window to `[start, end)` without rebuilding the
    /// view. `size()` observes the batch length; `total_size()` does not.
    pub fn set_batch_window(&mut self, start: usize, end: usize) {
        assert!(end <= self.view.size(), "batch window exceeds view length");
        assert!(start <= end, "batch window start after end");
        self.batch_start = start;
        self.batch_end = end;
    }

    /// A copy of this vector narrowed to `[start, end)`. Shares storage and
    /// view with the original -- no data is copied.
    pub fn windowed(&self, start: usize, end: usize) -> Self {
        let mut v = self.clone();
        v.set_batch_window(start, end);
        v
    }

    /// True iff the view is anything other than a single plain level
    /// directly over storage. Communicators refuse to send/receive vectors
    /// for which this is true -- they must be materialized first.
    pub fn has_mapping(&self) -> bool {
        !self.view.is_plain()
    }

    /// Read the element at logical index `i` within the active batch
    /// window.
    pub fn get(&self, i: usize) -> T {
        assert!(i < self.size(), "index out of range");
        let storage_idx = self.view.to_storage_index(self.batch_start + i);
        self.storage[storage_idx]
    }

    /// Materialize the active batch window into a contiguous `Vec<T>`.
    pub fn to_vec(&self) -> Vec<T> {
        (0..self.size()).map(|i| self.get(i)).collect()
    }

    /// Return a contiguous slice over the active batch window. Only valid
    /// on a plain view -- panics otherwise, matching the contract that
    /// `batch_span` is only defined when `has_mapping()` is false.
    pub fn batch_span(&self) -> &[T] {
        assert!(!self.has_mapping(), "batch_span requires a plain view");
        let base = self.view.to_storage_index(0);
        &self.storage[base + self.batch_start..base + self.batch_end]
    }

    /// Wrap this vector in a simple strided subset view: elements
    /// `start, start+step, ..., < end`.
    pub fn simple_subset_reference(&self, start: usize, step: usize, end: usize) -> Self {
        self.wrap(ViewKind::SimpleSubset { start, step, end })
    }

    /// Wrap this vector in an alternating-chunk view: `included` elements
    /// kept, `excluded` elements skipped, repeating.
    pub fn alternating_subset_reference(&self, included: usize, excluded: usize) -> Self {
        self.wrap(ViewKind::Alternating {
            included,
            excluded,
            reversed: false,
        })
    }

    /// As [`Self::alternating_subset_reference`], but chunks are read from
    /// the end of the sequence backwards.
    pub fn alternating_subset_reference_reversed(&self, included: usize, excluded: usize) -> Self {
        self.wrap(ViewKind::Alternating {
            included,
            excluded,
            reversed: true,
        })
    }

    /// Wrap this vector so that every element is repeated `k` times
    /// consecutively.
    pub fn repeated_subset_reference(&self, k: usize) -> Self {
        self.wrap(ViewKind::Repeated { k })
    }

    /// Wrap this vector so that the whole sequence is cycled `k` times.
    pub fn cyclic_subset_reference(&self, k: usize) -> Self {
        self.wrap(ViewKind::Cyclic { k })
    }

    /// Wrap this vector in a reversed view.
    pub fn reversed(&self) -> Self {
        self.wrap(ViewKind::Reversed)
    }

    /// `directed_subset_reference(+-1)`: forward (`dir=1`) is identity,
    /// backward (`dir=-1`) is [`Self::reversed`].
    pub fn directed_subset_reference(&self, dir: i32) -> Self {
        assert!(dir == 1 || dir == -1, "direction must be +-1");
        if dir == 1 {
            self.clone()
        } else {
            self.reversed()
        }
    }

    fn wrap(&self, kind: ViewKind) -> Self {
        let node = ViewNode::wrap(kind, self.view.clone(), self.batch_start, self.batch_end);
        let len = node.size();
        Vector {
            storage: self.storage.clone(),
            view: Arc::new(node),
            batch_start: 0,
            batch_end: len,
            precision: self.precision,
        }
    }

    fn assert_compatible(&self, other: &Self) {
        assert_eq!(self.size(), other.size(), "size mismatch");
        assert_eq!(
            self.precision, other.precision,
            "precision mismatch: {} vs {}",
            self.precision, other.precision
        );
    }

    fn zip_map(&self, other: &Self, f: impl Fn(T, T) -> T) -> Self {
        self.assert_compatible(other);
        let data = (0..self.size())
            .map(|i| f(self.get(i), other.get(i)))
            .collect::<Vec<_>>();
        Self::from_vec(data).with_precision(self.precision)
    }

    fn map(&self, f: impl Fn(T) -> T) -> Self {
        let data = (0..self.size()).map(|i| f(self.get(i))).collect::<Vec<_>>();
        Self::from_vec(data).with_precision(self.precision)
    }

    /// Elementwise addition. Panics on size/precision mismatch.
    pub fn add(&self, other: &Self) -> Self {
        self.zip_map(other, |a, b| a.wrapping_add(b))
    }

    /// Elementwise subtraction. Panics on size/precision mismatch.
    pub fn sub(&self, other: &Self) -> Self {
        self.zip_map(other, |a, b| a.wrapping_sub(b))
    }

    /// Elementwise multiplication. Result precision is the left operand's
    /// precision -- the caller is responsible for truncating afterwards.
    pub fn mul(&self, other: &Self) -> Self {
        assert_eq!(self.size(), other.size(), "size mismatch");
        let data = (0..self.size())
            .map(|i| self.get(i).wrapping_mul(other.get(i)))
            .collect::<Vec<_>>();
        Self::from_vec(data).with_precision(self.precision)
    }

    /// Elementwise (non-truncating) division.
    pub fn div(&self, other: &Self) -> Self {
        self.zip_map(other, |a, b| a.wrapping_div(b))
    }

    /// Elementwise bitwise AND.
    pub fn and(&self, other: &Self) -> Self {
        self.zip_map(other, |a, b| a.bitand(b))
    }

    /// Elementwise bitwise OR.
    pub fn or(&self, other: &Self) -> Self {
        self.zip_map(other, |a, b| a.bitor(b))
    }

    /// Elementwise bitwise XOR.
    pub fn xor(&self, other: &Self) -> Self {
        self.zip_map(other, |a, b| a.bitxor(b))
    }

    /// Elementwise bitwise NOT.
    pub fn not(&self) -> Self {
        self.map(|a| a.bitnot())
    }

    /// Elementwise negation.
    pub fn neg(&self) -> Self {
        self.map(|a| a.wrapping_neg())
    }

    /// Elementwise equality, result elements are 1 or 0.
    pub fn eq_elem(&self, other: &Self) -> Self {
        self.zip_map(other, |a, b| if a == b { T::one() } else { T::default() })
    }

    /// Elementwise less-than, result elements are 1 or 0.
    pub fn lt_elem(&self, other: &Self) -> Self {
        self.zip_map(other, |a, b| if a < b { T::one() } else { T::default() })
    }

    /// Elementwise left shift by `bits`.
    pub fn shl(&self, bits: u32) -> Self {
        self.map(|a| a.shl(bits))
    }

    /// Elementwise (arithmetic) right shift by `bits`.
    pub fn shr(&self, bits: u32) -> Self {
        self.map(|a| a.shr(bits))
    }

    /// For each element, within each `2^level`-bit chunk, fill the low half
    /// with the LSB of the high half. Used by comparison networks that
    /// propagate a sign/carry bit down through a chunk.
    pub fn bit_level_shift(&self, level: u32) -> Self {
        let chunk_bits = 1u32 << level;
        let half = chunk_bits / 2;
        self.map(|a| {
            let bits = T::BITS;
            let mut out = T::default();
            let mut chunk_start = 0u32;
            while chunk_start < bits {
                let hi_lsb_pos = chunk_start + half;
                let hi_lsb = a.bit(hi_lsb_pos.min(bits - 1));
                if hi_lsb {
                    for b in chunk_start..chunk_start + half {
                        if b < bits {
                            out = out.set_bit(b);
                        }
                    }
                }
                for b in chunk_start + half..chunk_start + chunk_bits {
                    if b < bits && a.bit(b) {
                        out = out.set_bit(b);
                    }
                }
                chunk_start += chunk_bits;
            }
            out
        })
    }

    /// Replicate bit 0 of each element to every bit, producing an all-zero
    /// or all-ones mask per element.
    pub fn extend_lsb(&self) -> Self {
        self.map(|a| if a.bit(0) { T::all_ones() } else { T::default() })
    }

    /// Keep only elements at positions where `mask` is non-zero, returning
    /// a new (shorter, plain) vector.
    pub fn extract_valid(&self, mask: &Self) -> Self {
        assert_eq!(self.size(), mask.size(), "size mismatch");
        let data = (0..self.size())
            .filter(|&i| mask.get(i) != T::default())
            .map(|i| self.get(i))
            .collect::<Vec<_>>();
        Self::from_vec(data).with_precision(self.precision)
    }

    /// Sum disjoint runs of `k` consecutive elements into a vector of
    /// length `size()/k`.
    pub fn chunked_sum(&self, k: usize) -> Self {
        assert!(k > 0 && self.size() % k == 0, "size must be a multiple of k");
        let data = (0..self.size() / k)
            .map(|c| {
                (0..k)
                    .map(|j| self.get(c * k + j))
                    .fold(T::default(), |acc, x| acc.wrapping_add(x))
            })
            .collect::<Vec<_>>();
        Self::from_vec(data).with_precision(self.precision)
    }

    /// Extract bits `start, start+step, .., end` of every element (each
    /// repeated `rep` times) and pack the resulting bitstream densely into
    /// output words of `T::BITS` bits each, the last word zero-padded.
    /// `bits_per_element = ((end - start + 1) / step) * rep` source bits are
    /// drawn from each input element before moving to the next.
    pub fn simple_bit_compress(&self, start: u32, step: u32, end: u32, rep: u32) -> Self {
        let num_positions = (end - start + 1) / step;
        let bits_per_element = (num_positions * rep) as usize;
        let total_bits = bits_per_element * self.size();
        let max_bits = T::BITS as usize;
        let total_new_elements = (total_bits + max_bits - 1) / max_bits;

        let mut out = vec![T::default(); total_new_elements];
        let mut k = 0usize;
        for word in out.iter_mut() {
            let mut r = T::default();
            let mut p = 0u32;
            while (p as usize) < max_bits && k < total_bits {
                let elem_idx = k / bits_per_element;
                let within = (k % bits_per_element) as u32;
                let pos = start + (within / rep) * step;
                if self.get(elem_idx).bit(pos) {
                    r = r.set_bit(p);
                }
                k += 1;
                p += 1;
            }
            *word = r;
        }
        Self::from_vec(out)
    }

    /// Inverse of [`Self::simple_bit_compress`]: scatter the densely-packed
    /// bits in `self` back to bit positions `start, start+step, .., end`
    /// (collapsing each run of `rep` repeated copies back onto one bit) of
    /// `elements` zero-initialized output elements.
    pub fn simple_bit_decompress(&self, start: u32, step: u32, end: u32, rep: u32, elements: usize) -> Self {
        let num_positions = (end - start + 1) / step;
        let bits_per_element = (num_positions * rep) as usize;
        let total_bits = bits_per_element * elements;
        let max_bits = T::BITS as usize;

        let mut out = vec![T::default(); elements];
        let mut k = 0usize;
        for i in 0..self.size() {
            if k >= total_bits {
                break;
            }
            let r = self.get(i);
            let mut p = 0u32;
            while (p as usize) < max_bits && k < total_bits {
                if r.bit(p) {
                    let elem_idx = k / bits_per_element;
                    let within = (k % bits_per_element) as u32;
                    let pos = start + (within / rep) * step;
                    out[elem_idx] = out[elem_idx].set_bit(pos);
                }
                k += 1;
                p += 1;
            }
        }
        Self::from_vec(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_roundtrip() {
        let v = Vector::<i32>::from_vec(vec![1, 2, 3, 4, 5]);
        assert!(!v.has_mapping());
        assert_eq!(v.to_vec(), vec![1, 2, 3, 4, 5]);
        assert_eq!(v.batch_span(), &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn batch_window_narrows_size_not_total() {
        let v = Vector::<i32>::from_vec(vec![1, 2, 3, 4, 5]);
        let w = v.windowed(1, 3);
        assert_eq!(w.size(), 2);
        assert_eq!(w.total_size(), 5);
        assert_eq!(w.to_vec(), vec![2, 3]);
    }

    #[test]
    fn simple_subset_reference() {
        let v = Vector::<i32>::from_vec(vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
        let s = v.simple_subset_reference(1, 2, 9);
        assert!(s.has_mapping());
        assert_eq!(s.to_vec(), vec![1, 3, 5, 7]);
    }

    #[test]
    fn reversed_view() {
        let v = Vector::<i32>::from_vec(vec![1, 2, 3]);
        assert_eq!(v.reversed().to_vec(), vec![3, 2, 1]);
    }

    #[test]
    fn repeated_view() {
        let v = Vector::<i32>::from_vec(vec![1, 2, 3]);
        assert_eq!(v.repeated_subset_reference(2).to_vec(), vec![1, 1, 2, 2, 3, 3]);
    }

    #[test]
    fn cyclic_view() {
        let v = Vector::<i32>::from_vec(vec![1, 2, 3]);
        assert_eq!(v.cyclic_subset_reference(2).to_vec(), vec![1, 2, 3, 1, 2, 3]);
    }

    #[test]
    fn alternating_view() {
        let v = Vector::<i32>::from_vec(vec![0, 1, 2, 3, 4, 5, 6, 7]);
        let a = v.alternating_subset_reference(2, 1);
        // keep 2, skip 1, repeating: 0,1, (skip 2), 3,4, (skip 5), 6,7
        assert_eq!(a.to_vec(), vec![0, 1, 3, 4, 6, 7]);
    }

    #[test]
    fn elementwise_ops() {
        let a = Vector::<i32>::from_vec(vec![3, 1, 4]);
        let b = Vector::<i32>::from_vec(vec![2, 7, 1]);
        assert_eq!(a.add(&b).to_vec(), vec![5, 8, 5]);
        assert_eq!(a.mul(&b).to_vec(), vec![6, 7, 4]);
        assert_eq!(a.sub(&b).to_vec(), vec![1, -6, 3]);
    }

    #[test]
    fn chunked_sum_sums_disjoint_runs() {
        let v = Vector::<i32>::from_vec(vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(v.chunked_sum(3).to_vec(), vec![6, 15]);
    }

    #[test]
    fn extract_valid_filters_by_mask() {
        let v = Vector::<i32>::from_vec(vec![10, 20, 30, 40]);
        let mask = Vector::<i32>::from_vec(vec![0, 1, 0, 1]);
        assert_eq!(v.extract_valid(&mask).to_vec(), vec![20, 40]);
    }

    #[test]
    fn extend_lsb_produces_masks() {
        let v = Vector::<i32>::from_vec(vec![0, 1, 2, 3]);
        assert_eq!(v.extend_lsb().to_vec(), vec![0, -1, 0, -1]);
    }

    #[test]
    fn bit_compress_packs_one_bit_per_element_densely() {
        let v = Vector::<i32>::from_vec(vec![0b101, 0b010, 0b111]);
        // bit 0 of each element: 1, 0, 1 -- packed into a single dense word.
        let compressed = v.simple_bit_compress(0, 1, 0, 1);
        assert_eq!(compressed.to_vec(), vec![0b101]);
    }

    #[test]
    fn bit_compress_decompress_roundtrips() {
        let v = Vector::<i32>::from_vec(vec![0b101, 0b010, 0b111]);
        let compressed = v.simple_bit_compress(0, 1, 0, 1);
        let decompressed = compressed.simple_bit_decompress(0, 1, 0, 1, 3);
        assert_eq!(decompressed.to_vec(), vec![1, 0, 1]);
    }

    #[test]
    fn bit_compress_spans_multiple_words_when_input_is_large() {
        let v = Vector::<i32>::from_vec((0..40).map(|i| i % 2).collect());
        // one bit per element, 40 elements -> ceil(40/32) = 2 packed words.
        let compressed = v.simple_bit_compress(0, 1, 0, 1);
        assert_eq!(compressed.size(), 2);
        let decompressed = compressed.simple_bit_decompress(0, 1, 0, 1, 40);
        assert_eq!(decompressed.to_vec(), (0..40).map(|i| i % 2).collect::<Vec<i32>>());
    }

    #[test]
    #[should_panic(expected = "size mismatch")]
    fn size_mismatch_panics() {
        let a = Vector::<i32>::from_vec(vec![1, 2, 3]);
        let b = Vector::<i32>::from_vec(vec![1, 2]);
        a.add(&b);
    }

    #[test]
    #[should_panic(expected = "batch_span requires a plain view")]
    fn batch_span_panics_on_mapped_view() {
        let v = Vector::<i32>::from_vec(vec![1, 2, 3, 4]);
        let s = v.simple_subset_reference(0, 2, 4);
        let _ = s.batch_span();
    }
}
