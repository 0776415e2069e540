//! Beaver multiplication triples built on top of an OLE.
//!
//! Grounded in the standard triple-from-OLE construction: each party picks
//! random `a_i, b_i`, runs an OLE between every ordered pair of parties to
//! get the cross terms, and sums `a_i * b_i` plus every cross term into
//! `c_i`. For the two-party case this is exactly the
//! [`super::ole::GilboaArithmeticOle`] construction. [`cross_term_as_low`]/
//! [`cross_term_as_high`] are the live two-message version of the same
//! cross term, run pairwise against one peer at a time so the same pair of
//! functions serves both two-party and replicated (three-peer) triple
//! generation; they're what
//! [`crate::comm::Communicator::generate_beaver_cross_term`] calls.

use crate::random::correlation::ole::{
    DummyOle, GilboaArithmeticOle, OleHalfP0, OleHalfP1, SilentOtBooleanOle, ZeroOle,
};
use crate::vector::{ShareInt, Vector};
use anyhow::Result;
use ocelot::ot::{Receiver as OtReceiver, Sender as OtSender};
use rand::{CryptoRng, RngCore};
use scuttlebutt::{AbstractChannel, Block};

/// One party's share of a two-party Beaver triple: `c0 + c1 = (a0+a1)*(b0+b1)`.
#[derive(Clone)]
pub struct BeaverTriple<T: ShareInt> {
    /// This party's share of the first multiplicand.
    pub a: Vector<T>,
    /// This party's share of the second multiplicand.
    pub b: Vector<T>,
    /// This party's share of the product.
    pub c: Vector<T>,
}

impl<T: ShareInt> BeaverTriple<T> {
    /// Check the textbook correlation against a peer's share: this is a
    /// debug-only helper, never exposed in production paths, and grounded
    /// in `original_source`'s `assert_correlated` triple-consistency check.
    pub fn debug_assert_correlated(&self, other: &Self) {
        let a = self.a.add(&other.a);
        let b = self.b.add(&other.b);
        let c = self.c.add(&other.c);
        assert_eq!(c.to_vec(), a.mul(&b).to_vec(), "beaver triple is inconsistent");
    }
}

/// Build a matched pair of two-party Beaver triples of length `n` using
/// seeded common randomness (suitable for unit tests, not for production
/// use -- see [`DummyOle`]).
pub fn dummy_triple_pair<T: ShareInt>(
    n: usize,
    mut draw_a0: impl FnMut() -> T,
    mut draw_b0: impl FnMut() -> T,
    mut draw_a1: impl FnMut() -> T,
    mut draw_b1: impl FnMut() -> T,
    mut draw_ole: impl FnMut() -> T,
) -> (BeaverTriple<T>, BeaverTriple<T>) {
    let a0 = Vector::from_vec((0..n).map(|_| draw_a0()).collect());
    let b0 = Vector::from_vec((0..n).map(|_| draw_b0()).collect());
    let a1 = Vector::from_vec((0..n).map(|_| draw_a1()).collect());
    let b1 = Vector::from_vec((0..n).map(|_| draw_b1()).collect());

    // (a0+a1)*(b0+b1) = a0*b0 + a1*b1 + a0*b1 + a1*b0: both cross terms
    // need their own OLE, one per ordered pair.
    let (a0b1_p0, a0b1_p1): (OleHalfP0<T>, OleHalfP1<T>) = DummyOle::generate(&a0, &b1, &mut draw_ole);
    let (a1b0_p0, a1b0_p1): (OleHalfP0<T>, OleHalfP1<T>) = DummyOle::generate(&a1, &b0, &mut draw_ole);

    let c0 = a0.mul(&b0).add(&a0b1_p0.a).add(&a1b0_p1.b);
    let c1 = a1.mul(&b1).add(&a0b1_p1.b).add(&a1b0_p0.a);

    (
        BeaverTriple { a: a0, b: b0, c: c0 },
        BeaverTriple { a: a1, b: b1, c: c1 },
    )
}

/// Lower-rank half of a pairwise Beaver cross-term exchange: plays the OT
/// sender for both legs, first offering `my_a` against the peer's `b`
/// (wanting `my_a * peer_b`), then `my_b` against the peer's `a` (wanting
/// `my_b * peer_a`). Multiplication is commutative in which operand feeds
/// OLE's `C` vs `D`, so there's no need to swap sender/receiver roles
/// between the two legs -- the higher-rank peer running
/// [`cross_term_as_high`] plays receiver throughout, in the same order.
pub fn cross_term_as_low<T, OT, C, RNG>(
    my_a: &Vector<T>,
    my_b: &Vector<T>,
    channel: &mut C,
    rng: &mut RNG,
    binary: bool,
) -> Result<Vector<T>>
where
    T: ShareInt,
    OT: OtSender<Msg = Block>,
    C: AbstractChannel,
    RNG: CryptoRng + RngCore,
{
    let (leg1, leg2) = if binary {
        (
            SilentOtBooleanOle::generate_p0::<T, OT, C, RNG>(my_a, channel, rng)?,
            SilentOtBooleanOle::generate_p0::<T, OT, C, RNG>(my_b, channel, rng)?,
        )
    } else {
        (
            GilboaArithmeticOle::generate_p0::<T, OT, C, RNG>(my_a, channel, rng)?,
            GilboaArithmeticOle::generate_p0::<T, OT, C, RNG>(my_b, channel, rng)?,
        )
    };
    Ok(if binary { leg1.a.xor(&leg2.a) } else { leg1.a.add(&leg2.a) })
}

/// Higher-rank half of [`cross_term_as_low`]: OT receiver for both legs,
/// `peer_a * my_b` first (matching the peer's `my_a` leg), then
/// `peer_b * my_a` (matching the peer's `my_b` leg).
pub fn cross_term_as_high<T, OT, C, RNG>(
    my_a: &Vector<T>,
    my_b: &Vector<T>,
    channel: &mut C,
    rng: &mut RNG,
    binary: bool,
) -> Result<Vector<T>>
where
    T: ShareInt,
    OT: OtReceiver<Msg = Block>,
    C: AbstractChannel,
    RNG: CryptoRng + RngCore,
{
    let (leg1, leg2) = if binary {
        (
            SilentOtBooleanOle::generate_p1::<T, OT, C, RNG>(my_b, channel, rng)?,
            SilentOtBooleanOle::generate_p1::<T, OT, C, RNG>(my_a, channel, rng)?,
        )
    } else {
        (
            GilboaArithmeticOle::generate_p1::<T, OT, C, RNG>(my_b, channel, rng)?,
            GilboaArithmeticOle::generate_p1::<T, OT, C, RNG>(my_a, channel, rng)?,
        )
    };
    Ok(if binary { leg1.b.xor(&leg2.b) } else { leg1.b.add(&leg2.b) })
}

/// All-zero triple, satisfying the correlation trivially. Used for
/// throughput-only benchmarking paths where the triple's correctness is
/// not under test.
pub fn zero_triple_pair<T: ShareInt>(n: usize) -> (BeaverTriple<T>, BeaverTriple<T>) {
    let (_, _): (OleHalfP0<T>, OleHalfP1<T>) = ZeroOle::generate(n);
    let zero = || BeaverTriple {
        a: Vector::zeros(n),
        b: Vector::zeros(n),
        c: Vector::zeros(n),
    };
    (zero(), zero())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dummy_triple_pair_satisfies_correlation() {
        let mut seed = 0i32;
        let mut draw = move || {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
            (seed >> 16) as i32
        };
        let (t0, t1): (BeaverTriple<i32>, BeaverTriple<i32>) =
            dummy_triple_pair(4, &mut draw, &mut draw, &mut draw, &mut draw, &mut draw);
        t0.debug_assert_correlated(&t1);
    }

    #[test]
    fn zero_triple_pair_is_trivially_correlated() {
        let (t0, t1): (BeaverTriple<i32>, BeaverTriple<i32>) = zero_triple_pair(3);
        t0.debug_assert_correlated(&t1);
    }
}
