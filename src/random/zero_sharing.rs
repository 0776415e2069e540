//! Additive/XOR shares of the zero vector, drawn from group-common PRGs.
//!
//! Grounded in `kmprt17_mt::MultiThreadParty::secret_share_of_zero`, which
//! already builds an n-party additive sharing of the zero vector by
//! sampling `n-1` random shares and setting the last as their negated sum so
//! the telescoping sum is zero. This module generalizes that construction
//! from "one shared RNG per call site" to per-relative-rank and per-group
//! [`crate::random::CommonPrg`]s, and adds the XOR (boolean) variant.

use crate::random::common_prg::CommonPrg;
use crate::vector::{ShareInt, Vector};

fn draw_vector<T: ShareInt>(prg: &mut CommonPrg, n: usize) -> Vector<T> {
    let width = T::byte_len();
    let bytes = prg.next_bytes(n * width);
    let data = bytes
        .chunks(width)
        .map(T::from_le_bytes)
        .collect::<Vec<_>>();
    Vector::from_vec(data)
}

/// Party `i`'s additive share of the zero vector of length `n`: samples
/// `r_prev` from the PRG shared with the previous relative-rank peer and
/// `r_next` from the PRG shared with the next relative-rank peer, and
/// returns `r_prev - r_next`. Summed across all parties this telescopes to
/// zero. The 2-party case is a special case of the same rule: P0's "next"
/// and "previous" peer are the same party, so P0's share negates P1's.
pub fn arithmetic_zero_share<T: ShareInt>(
    prev_prg: &mut CommonPrg,
    next_prg: &mut CommonPrg,
    n: usize,
) -> Vector<T> {
    let r_prev = draw_vector::<T>(prev_prg, n);
    let r_next = draw_vector::<T>(next_prg, n);
    r_prev.sub(&r_next)
}

/// Boolean (XOR) variant of [`arithmetic_zero_share`].
pub fn boolean_zero_share<T: ShareInt>(
    prev_prg: &mut CommonPrg,
    next_prg: &mut CommonPrg,
    n: usize,
) -> Vector<T> {
    let r_prev = draw_vector::<T>(prev_prg, n);
    let r_next = draw_vector::<T>(next_prg, n);
    r_prev.xor(&r_next)
}

/// Group-level variant: for a group of `group_size` parties sharing
/// `group_prg`, every member but the last draws a fresh random vector; the
/// last member's share is whatever makes the arithmetic (or XOR, depending
/// on `binary`) combination of all `group_size` shares equal to zero. Since
/// every member runs the identical deterministic PRG, every member
/// independently derives the same `group_size - 1` random draws and can
/// compute the same final share without communicating.
pub fn group_zero_share<T: ShareInt>(
    group_prg: &mut CommonPrg,
    my_index_in_group: usize,
    group_size: usize,
    n: usize,
    binary: bool,
) -> Vector<T> {
    assert!(group_size >= 2, "a group needs at least two members");
    assert!(my_index_in_group < group_size, "index out of range");

    let draws: Vec<Vector<T>> = (0..group_size - 1)
        .map(|_| draw_vector::<T>(group_prg, n))
        .collect();

    if my_index_in_group < group_size - 1 {
        return draws[my_index_in_group].clone();
    }

    // Last member: force the combination to zero.
    let combine = |a: &Vector<T>, b: &Vector<T>| if binary { a.xor(b) } else { a.add(b) };
    let sum = draws
        .iter()
        .skip(1)
        .fold(draws[0].clone(), |acc, v| combine(&acc, v));
    if binary {
        sum // XOR is its own inverse: XOR-ing all n-1 shares again cancels them.
    } else {
        sum.neg()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::prg::AesPrg;

    fn shared_prg_pair(key: [u8; 32]) -> (CommonPrg, CommonPrg) {
        (
            CommonPrg::new(0, Box::new(AesPrg::new(key))),
            CommonPrg::new(1, Box::new(AesPrg::new(key))),
        )
    }

    #[test]
    fn arithmetic_zero_share_telescopes_for_three_parties() {
        // three parties in a ring: prg(0,1), prg(1,2), prg(2,0)
        let (mut p01_a, mut p01_b) = shared_prg_pair([1u8; 32]);
        let (mut p12_a, mut p12_b) = shared_prg_pair([2u8; 32]);
        let (mut p20_a, mut p20_b) = shared_prg_pair([3u8; 32]);

        let n = 8;
        let share0 = arithmetic_zero_share::<i32>(&mut p20_b, &mut p01_a, n);
        let share1 = arithmetic_zero_share::<i32>(&mut p01_b, &mut p12_a, n);
        let share2 = arithmetic_zero_share::<i32>(&mut p12_b, &mut p20_a, n);

        let total = share0.add(&share1).add(&share2);
        assert_eq!(total.to_vec(), vec![0; n]);
    }

    #[test]
    fn boolean_zero_share_xors_to_zero() {
        let (mut prev_a, mut prev_b) = shared_prg_pair([9u8; 32]);
        let (mut next_a, mut next_b) = shared_prg_pair([10u8; 32]);

        let n = 4;
        let share_a = boolean_zero_share::<i32>(&mut next_b, &mut prev_a, n);
        let share_b = boolean_zero_share::<i32>(&mut prev_b, &mut next_a, n);

        assert_eq!(share_a.xor(&share_b).to_vec(), vec![0; n]);
    }

    #[test]
    fn group_zero_share_sums_to_zero() {
        let key = [11u8; 32];
        let n = 5;
        let group_size = 4;
        let shares = (0..group_size)
            .map(|i| {
                let mut prg = CommonPrg::new(i, Box::new(AesPrg::new(key)));
                group_zero_share::<i32>(&mut prg, i, group_size, n, false)
            })
            .collect::<Vec<_>>();

        let total = shares
            .iter()
            .skip(1)
            .fold(shares[0].clone(), |acc, v| acc.add(v));
        assert_eq!(total.to_vec(), vec![0; n]);
    }
}
