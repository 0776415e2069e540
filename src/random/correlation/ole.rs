//! Oblivious Linear Evaluation (dishonest-majority, two-party only).
//!
//! Two concrete real generators are built directly on `ocelot::ot::{Sender,
//! Receiver}`. [`SilentOtBooleanOle`] runs one 1-out-of-2 OT per bit,
//! masking both candidate messages by a random string and letting the
//! receiver's choice bit select the correlated half (`A xor B = C and D`).
//! [`GilboaArithmeticOle`] performs the textbook OT-to-OLE (Gilboa)
//! reduction: for each bit `i` of `D`, P0 offers a 1-out-of-2 OT of
//! `(r_i, r_i + C*2^i)` (wrapping arithmetic), P1 picks by its bit and sums
//! the results across all bits to get `C*D`, while P0's share is the
//! negated sum of its own masks. [`ZeroOle`] and [`DummyOle`] are the
//! seeded/zero variants the spec calls for benchmarking and unit testing.

use crate::vector::{ShareInt, Vector};
use anyhow::{Context, Result};
use ocelot::ot::{Receiver as OtReceiver, Sender as OtSender};
use rand::{CryptoRng, Rng};
use scuttlebutt::{AbstractChannel, Block};

/// P0's half of an OLE tuple.
pub struct OleHalfP0<T: ShareInt> {
    /// Random mask.
    pub a: Vector<T>,
    /// P0's own scalar/vector operand.
    pub c: Vector<T>,
}

/// P1's half of an OLE tuple.
pub struct OleHalfP1<T: ShareInt> {
    /// Received mask, satisfying `a ⊕ b = c ⊛ d` with P0's `(a, c)`.
    pub b: Vector<T>,
    /// P1's own scalar/vector operand.
    pub d: Vector<T>,
}

fn block_from_bit(bit: bool) -> Block {
    Block::from(if bit { 1u128 } else { 0u128 })
}

fn bit_from_block(b: Block) -> bool {
    u128::from(b) & 1 == 1
}

/// Boolean OLE via a correlated-OT primitive, chunked at
/// [`crate::random::prg::MAX_PRG_QUERY_BYTES`]-sized bit blocks (mirroring
/// `ot_based.rs`'s chunking of bit-level VOLE requests).
pub struct SilentOtBooleanOle;

impl SilentOtBooleanOle {
    /// P0 (OT sender) side: generate `n` elements' worth of `(A, C)`.
    /// `c` is P0's own operand vector.
    pub fn generate_p0<T, OT, C, RNG>(
        c: &Vector<T>,
        channel: &mut C,
        rng: &mut RNG,
    ) -> Result<OleHalfP0<T>>
    where
        T: ShareInt,
        OT: OtSender<Msg = Block>,
        C: AbstractChannel,
        RNG: CryptoRng + Rng,
    {
        let bits = T::BITS as usize * c.size();
        let mut ot = OT::init(channel, rng).with_context(|| format!("@{}:{}", file!(), line!()))?;
        let a_bits: Vec<bool> = (0..bits).map(|_| rng.gen::<bool>()).collect();
        let c_bits = bit_decompose(c);

        let inputs: Vec<(Block, Block)> = a_bits
            .iter()
            .zip(c_bits.iter())
            .map(|(&a, &cb)| {
                let m0 = block_from_bit(a);
                let m1 = block_from_bit(a ^ cb);
                (m0, m1)
            })
            .collect();
        ot.send(channel, &inputs, rng)
            .with_context(|| format!("@{}:{}", file!(), line!()))?;

        Ok(OleHalfP0 {
            a: bit_recompose::<T>(&a_bits, c.size()),
            c: c.clone(),
        })
    }

    /// P1 (OT receiver) side: generate `n` elements' worth of `(B, D)`.
    /// `d` is P1's own operand vector.
    pub fn generate_p1<T, OT, C, RNG>(
        d: &Vector<T>,
        channel: &mut C,
        rng: &mut RNG,
    ) -> Result<OleHalfP1<T>>
    where
        T: ShareInt,
        OT: OtReceiver<Msg = Block>,
        C: AbstractChannel,
        RNG: CryptoRng + Rng,
    {
        let d_bits = bit_decompose(d);
        let mut ot = OT::init(channel, rng).with_context(|| format!("@{}:{}", file!(), line!()))?;
        let received = ot
            .receive(channel, &d_bits, rng)
            .with_context(|| format!("@{}:{}", file!(), line!()))?;
        let b_bits: Vec<bool> = received.into_iter().map(bit_from_block).collect();

        Ok(OleHalfP1 {
            b: bit_recompose::<T>(&b_bits, d.size()),
            d: d.clone(),
        })
    }
}

/// Arithmetic OLE via the standard Gilboa OT-to-OLE reduction: for every
/// bit `i` of `D`, P0 offers a 1-out-of-2 OT of full scalar messages
/// `(r_i, r_i + C*2^i)` and P1 picks by `d_i`. Summing P1's `n_bits`
/// received values gives `sum_i d_i * C * 2^i == C * D`; P0 holds the
/// negated sum of its own masks `r_i`, so the two sides' sums add
/// (mod 2^BITS) to `C * D`. Unlike boolean OLE (one independent bit-AND
/// correlation per bit of both operands), this keeps `C` whole and only
/// bit-decomposes `D`, with the weighting folded into the OT messages
/// themselves rather than applied after the fact.
pub struct GilboaArithmeticOle;

impl GilboaArithmeticOle {
    /// P0 side of arithmetic OLE: `A + B = C * D`.
    pub fn generate_p0<T, OT, C, RNG>(
        c: &Vector<T>,
        channel: &mut C,
        rng: &mut RNG,
    ) -> Result<OleHalfP0<T>>
    where
        T: ShareInt,
        OT: OtSender<Msg = Block>,
        C: AbstractChannel,
        RNG: CryptoRng + Rng,
    {
        let width = T::BITS as usize;
        let mut ot = OT::init(channel, rng).with_context(|| format!("@{}:{}", file!(), line!()))?;
        let mut inputs = Vec::with_capacity(c.size() * width);
        let mut a = Vec::with_capacity(c.size());
        for idx in 0..c.size() {
            let cv = c.get(idx);
            let mut mask_sum = T::default();
            for bit in 0..T::BITS {
                let weight = cv.shl(bit);
                let r = random_scalar::<T, RNG>(rng);
                mask_sum = mask_sum.wrapping_add(r);
                inputs.push((scalar_to_block(r), scalar_to_block(r.wrapping_add(weight))));
            }
            a.push(mask_sum.wrapping_neg());
        }
        ot.send(channel, &inputs, rng)
            .with_context(|| format!("@{}:{}", file!(), line!()))?;

        Ok(OleHalfP0 {
            a: Vector::from_vec(a),
            c: c.clone(),
        })
    }

    /// P1 side of arithmetic OLE.
    pub fn generate_p1<T, OT, C, RNG>(
        d: &Vector<T>,
        channel: &mut C,
        rng: &mut RNG,
    ) -> Result<OleHalfP1<T>>
    where
        T: ShareInt,
        OT: OtReceiver<Msg = Block>,
        C: AbstractChannel,
        RNG: CryptoRng + Rng,
    {
        let width = T::BITS as usize;
        let choices: Vec<bool> = (0..d.size())
            .flat_map(|i| {
                let x = d.get(i);
                (0..T::BITS).map(move |bit| x.bit(bit))
            })
            .collect();
        let mut ot = OT::init(channel, rng).with_context(|| format!("@{}:{}", file!(), line!()))?;
        let received = ot
            .receive(channel, &choices, rng)
            .with_context(|| format!("@{}:{}", file!(), line!()))?;

        let b = (0..d.size())
            .map(|idx| {
                (0..width)
                    .map(|bit| scalar_from_block::<T>(received[idx * width + bit]))
                    .fold(T::default(), |acc, v| acc.wrapping_add(v))
            })
            .collect();

        Ok(OleHalfP1 {
            b: Vector::from_vec(b),
            d: d.clone(),
        })
    }
}

fn scalar_to_block<T: ShareInt>(v: T) -> Block {
    let bytes = v.to_le_bytes();
    let mut buf = [0u8; 16];
    buf[..bytes.len()].copy_from_slice(&bytes);
    Block::from(u128::from_le_bytes(buf))
}

fn scalar_from_block<T: ShareInt>(b: Block) -> T {
    let buf = u128::from(b).to_le_bytes();
    T::from_le_bytes(&buf[..T::byte_len()])
}

fn random_scalar<T: ShareInt, RNG: Rng>(rng: &mut RNG) -> T {
    let mut buf = vec![0u8; T::byte_len()];
    rng.fill_bytes(&mut buf);
    T::from_le_bytes(&buf)
}

/// Produces all-zero OLE tuples. Trivially satisfies the correlation
/// (`0 ⊕ 0 = 0 ⊛ 0`); useful only for throughput benchmarking where the
/// correlation's correctness is not under test.
pub struct ZeroOle;

impl ZeroOle {
    /// Generate a zero OLE tuple of length `n`.
    pub fn generate<T: ShareInt>(n: usize) -> (OleHalfP0<T>, OleHalfP1<T>) {
        (
            OleHalfP0 {
                a: Vector::zeros(n),
                c: Vector::zeros(n),
            },
            OleHalfP1 {
                b: Vector::zeros(n),
                d: Vector::zeros(n),
            },
        )
    }
}

/// Produces OLE tuples from seeded common randomness rather than a real OT
/// exchange -- both parties already know the same seed, so this leaks
/// everything and is suitable only for unit tests.
pub struct DummyOle;

impl DummyOle {
    /// Generate a matched `(P0 half, P1 half)` pair given a shared
    /// `CommonPrg`-style seed. `c` and `d` are the two parties' operands.
    pub fn generate<T: ShareInt>(
        c: &Vector<T>,
        d: &Vector<T>,
        mut draw: impl FnMut() -> T,
    ) -> (OleHalfP0<T>, OleHalfP1<T>) {
        assert_eq!(c.size(), d.size(), "size mismatch");
        let a = Vector::from_vec((0..c.size()).map(|_| draw()).collect());
        let b = c.mul(d).sub(&a);
        (
            OleHalfP0 { a, c: c.clone() },
            OleHalfP1 { b, d: d.clone() },
        )
    }
}

fn bit_decompose<T: ShareInt>(v: &Vector<T>) -> Vec<bool> {
    (0..v.size())
        .flat_map(|i| {
            let x = v.get(i);
            (0..T::BITS).map(move |b| x.bit(b))
        })
        .collect()
}

fn bit_recompose<T: ShareInt>(bits: &[bool], n: usize) -> Vector<T> {
    let width = T::BITS as usize;
    assert_eq!(bits.len(), n * width, "bit count mismatch");
    let data = (0..n)
        .map(|i| {
            let mut x = T::default();
            for b in 0..T::BITS {
                if bits[i * width + b as usize] {
                    x = x.set_bit(b);
                }
            }
            x
        })
        .collect();
    Vector::from_vec(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_ole_satisfies_correlation() {
        let (p0, p1): (OleHalfP0<i32>, OleHalfP1<i32>) = ZeroOle::generate(5);
        assert_eq!(p0.a.xor(&p1.b).to_vec(), vec![0; 5]);
    }

    #[test]
    fn dummy_ole_satisfies_arithmetic_correlation() {
        let c = Vector::<i32>::from_vec(vec![3, 1, 4]);
        let d = Vector::<i32>::from_vec(vec![2, 7, 1]);
        let mut counter = 0i32;
        let (p0, p1) = DummyOle::generate(&c, &d, || {
            counter += 1;
            counter
        });
        // A + B = C * D
        let lhs = p0.a.add(&p1.b);
        let rhs = p0.c.mul(&p1.d);
        assert_eq!(lhs.to_vec(), rhs.to_vec());
    }

    #[test]
    fn bit_decompose_recompose_roundtrip() {
        let v = Vector::<i16>::from_vec(vec![-5, 0, 1234, -1]);
        let bits = bit_decompose(&v);
        let back: Vector<i16> = bit_recompose(&bits, v.size());
        assert_eq!(back.to_vec(), v.to_vec());
    }
}
