//! Replicated-share vectors: `R` parallel [`Vector<T>`]s representing one
//! party's `R` share-copies of a single secret vector.
//!
//! Replication factor `R` is carried as a `const` parameter rather than
//! boxed into a `Vec` of unknown length, since `R` is fixed for the
//! lifetime of a runtime (1 for 1PC/2PC, 2 for 3PC, 3 for 4PC).

use crate::vector::{ShareInt, Vector};

/// `R` parallel [`Vector<T>`]s of identical length and precision, one per
/// replicated share this party holds. `open` is intentionally not defined
/// here -- reconstructing the secret requires network communication and is
/// a protocol-layer operation (see [crate::protocol]).
#[derive(Clone)]
pub struct EVector<T: ShareInt, const R: usize> {
    shares: [Vector<T>; R],
}

impl<T: ShareInt, const R: usize> EVector<T, R> {
    /// Build an `EVector` from exactly `R` share vectors of identical size
    /// and precision.
    pub fn new(shares: [Vector<T>; R]) -> Self {
        for w in shares.windows(2) {
            assert_eq!(w[0].size(), w[1].size(), "replicated shares must agree in size");
            assert_eq!(
                w[0].precision(),
                w[1].precision(),
                "replicated shares must agree in precision"
            );
        }
        EVector { shares }
    }

    /// Number of elements in the active batch window, shared by every
    /// replica.
    pub fn size(&self) -> usize {
        self.shares[0].size()
    }

    /// Fixed-point precision shared by every replica.
    pub fn precision(&self) -> u32 {
        self.shares[0].precision()
    }

    /// Borrow the `i`-th replica.
    pub fn share(&self, i: usize) -> &Vector<T> {
        &self.shares[i]
    }

    /// Borrow all replicas.
    pub fn shares(&self) -> &[Vector<T>; R] {
        &self.shares
    }

    /// True iff any replica carries a non-plain view.
    pub fn has_mapping(&self) -> bool {
        self.shares.iter().any(|s| s.has_mapping())
    }

    /// Force every replica to a plain (materialized) view.
    pub fn materialize_inplace(&mut self) {
        for s in self.shares.iter_mut() {
            if s.has_mapping() {
                *s = Vector::from_vec(s.to_vec()).with_precision(s.precision());
            }
        }
    }

    fn zip_with(&self, other: &Self, f: impl Fn(&Vector<T>, &Vector<T>) -> Vector<T>) -> Self {
        let shares: Vec<Vector<T>> = self
            .shares
            .iter()
            .zip(other.shares.iter())
            .map(|(a, b)| f(a, b))
            .collect();
        EVector {
            shares: shares.try_into().unwrap_or_else(|_| unreachable!()),
        }
    }

    /// Elementwise, per-replica addition.
    pub fn add(&self, other: &Self) -> Self {
        self.zip_with(other, |a, b| a.add(b))
    }

    /// Elementwise, per-replica subtraction.
    pub fn sub(&self, other: &Self) -> Self {
        self.zip_with(other, |a, b| a.sub(b))
    }

    /// Elementwise, per-replica XOR.
    pub fn xor(&self, other: &Self) -> Self {
        self.zip_with(other, |a, b| a.xor(b))
    }

    /// Elementwise, per-replica AND.
    pub fn and(&self, other: &Self) -> Self {
        self.zip_with(other, |a, b| a.and(b))
    }

    /// Per-replica negation.
    pub fn neg(&self) -> Self {
        let shares: Vec<Vector<T>> = self.shares.iter().map(|a| a.neg()).collect();
        EVector {
            shares: shares.try_into().unwrap_or_else(|_| unreachable!()),
        }
    }

    /// Per-replica bitwise NOT.
    pub fn not(&self) -> Self {
        let shares: Vec<Vector<T>> = self.shares.iter().map(|a| a.not()).collect();
        EVector {
            shares: shares.try_into().unwrap_or_else(|_| unreachable!()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_is_elementwise_per_replica() {
        let a = EVector::<i32, 2>::new([
            Vector::from_vec(vec![1, 2, 3]),
            Vector::from_vec(vec![4, 5, 6]),
        ]);
        let b = EVector::<i32, 2>::new([
            Vector::from_vec(vec![10, 20, 30]),
            Vector::from_vec(vec![40, 50, 60]),
        ]);
        let c = a.add(&b);
        assert_eq!(c.share(0).to_vec(), vec![11, 22, 33]);
        assert_eq!(c.share(1).to_vec(), vec![44, 55, 66]);
    }

    #[test]
    fn has_mapping_is_or_across_replicas() {
        let plain = Vector::<i32>::from_vec(vec![1, 2, 3, 4]);
        let strided = plain.simple_subset_reference(0, 2, 4);
        let e = EVector::<i32, 2>::new([plain.clone(), strided]);
        assert!(e.has_mapping());

        let mut e2 = e.clone();
        e2.materialize_inplace();
        assert!(!e2.has_mapping());
    }
}
