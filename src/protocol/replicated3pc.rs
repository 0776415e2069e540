//! 3PC: honest-majority replicated (`R = 2`) sharing among three parties.
//! Party `p` holds the additive terms at global indices `p` and `p + 1 mod
//! 3`; `share(0)` is always the party's own canonical term, `share(1)` its
//! neighbor's.
//!
//! Grounded in the standard ABY3-style replicated multiplication: each
//! party locally computes its share of the product from the four terms it
//! already knows (`x_p y_p + x_p y_{p+1} + x_{p+1} y_p`), masks it with a
//! pseudo-random zero sharing drawn from
//! `random::zero_sharing::arithmetic_zero_share`/`boolean_zero_share` (so
//! the masking step itself costs no network round, mirroring
//! `CommonPrg`'s whole reason for existing), then exchanges the masked
//! term with its two neighbors in one round to re-establish replication.

use super::Protocol;
use crate::comm::Communicator;
use crate::error::Result;
use crate::evector::EVector;
use crate::random::common_prg::CommonPrg;
use crate::random::zero_sharing::{arithmetic_zero_share, boolean_zero_share};
use crate::vector::{ShareInt, Vector};
use rand::RngCore;

fn random_vector<T: ShareInt>(n: usize) -> Vector<T> {
    let width = T::byte_len();
    let mut bytes = vec![0u8; n * width];
    rand::thread_rng().fill_bytes(&mut bytes);
    let data = bytes.chunks(width).map(T::from_le_bytes).collect();
    Vector::from_vec(data)
}

/// Three-party honest-majority protocol object.
pub struct Replicated3Pc<T: ShareInt> {
    rank: usize,
    prev_prg: CommonPrg,
    next_prg: CommonPrg,
    _marker: std::marker::PhantomData<T>,
}

impl<T: ShareInt> Replicated3Pc<T> {
    /// `prev_prg` must be shared with party `rank - 1 mod 3`, `next_prg`
    /// with party `rank + 1 mod 3`.
    pub fn new(rank: usize, prev_prg: CommonPrg, next_prg: CommonPrg) -> Self {
        assert!(rank < 3, "Replicated3Pc is a three-party protocol");
        Replicated3Pc {
            rank,
            prev_prg,
            next_prg,
            _marker: std::marker::PhantomData,
        }
    }

    fn redistribute<C: Communicator>(
        &mut self,
        comm: &mut C,
        masked: &Vector<T>,
    ) -> Result<Vector<T>> {
        comm.exchange_shares_directed(masked, -1, 1, masked.size())
    }
}

impl<T: ShareInt> Protocol<T, 2> for Replicated3Pc<T> {
    fn rank(&self) -> usize {
        self.rank
    }

    fn num_parties(&self) -> usize {
        3
    }

    fn raw_multiply<C: Communicator>(
        &mut self,
        comm: &mut C,
        x: &EVector<T, 2>,
        y: &EVector<T, 2>,
        binary: bool,
    ) -> Result<EVector<T, 2>> {
        let (x0, x1) = (x.share(0), x.share(1));
        let (y0, y1) = (y.share(0), y.share(1));

        let local = if binary {
            x0.and(y0).xor(&x0.and(y1)).xor(&x1.and(y0))
        } else {
            x0.mul(y0).add(&x0.mul(y1)).add(&x1.mul(y0))
        };

        let mask = if binary {
            boolean_zero_share::<T>(&mut self.prev_prg, &mut self.next_prg, local.size())
        } else {
            arithmetic_zero_share::<T>(&mut self.prev_prg, &mut self.next_prg, local.size())
        };
        let masked = if binary { local.xor(&mask) } else { local.add(&mask) };

        let neighbor = self.redistribute(comm, &masked)?;
        Ok(EVector::new([masked, neighbor]))
    }

    fn reshare<C: Communicator>(
        &mut self,
        comm: &mut C,
        v: &EVector<T, 2>,
        binary: bool,
    ) -> Result<EVector<T, 2>> {
        let n = v.size();
        let mask = if binary {
            boolean_zero_share::<T>(&mut self.prev_prg, &mut self.next_prg, n)
        } else {
            arithmetic_zero_share::<T>(&mut self.prev_prg, &mut self.next_prg, n)
        };
        let masked = if binary { v.share(0).xor(&mask) } else { v.share(0).add(&mask) };
        let neighbor = self.redistribute(comm, &masked)?;
        Ok(EVector::new([masked, neighbor]))
    }

    fn open<C: Communicator>(
        &mut self,
        comm: &mut C,
        v: &EVector<T, 2>,
        binary: bool,
    ) -> Result<Vector<T>> {
        let missing = comm.exchange_shares_directed(v.share(0), 1, -1, v.size())?;
        Ok(if binary {
            v.share(0).xor(v.share(1)).xor(&missing)
        } else {
            v.share(0).add(v.share(1)).add(&missing)
        })
    }

    fn secret_share<C: Communicator>(
        &mut self,
        comm: &mut C,
        owner: usize,
        plain: Option<&Vector<T>>,
        n: usize,
        binary: bool,
    ) -> Result<EVector<T, 2>> {
        if self.rank == owner {
            let plain = plain.expect("owner must supply the plaintext value");
            let x0 = random_vector::<T>(n);
            let x1 = random_vector::<T>(n);
            let x2 = if binary {
                plain.xor(&x0).xor(&x1)
            } else {
                plain.sub(&x0).sub(&x1)
            };
            let x = [x0, x1, x2];

            for p in 0..3usize {
                if p == owner {
                    continue;
                }
                let rel = ((p as i64) - (owner as i64)).rem_euclid(3);
                comm.send_share(&x[p], rel)?;
                comm.send_share(&x[(p + 1) % 3], rel)?;
            }
            Ok(EVector::new([x[owner].clone(), x[(owner + 1) % 3].clone()]))
        } else {
            let rel = ((owner as i64) - (self.rank as i64)).rem_euclid(3);
            let s0: Vector<T> = comm.recv_share(rel)?;
            let s1: Vector<T> = comm.recv_share(rel)?;
            Ok(EVector::new([s0, s1]))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel_utils::{ch_arcnize_all, sync_channel::create_unix_channels};
    use crate::comm::message_passing::MessagePassingCommunicator;
    use crate::random::prg::AesPrg;
    use std::collections::HashMap;

    fn keyed_prg(rank: usize, key: [u8; 32]) -> CommonPrg {
        CommonPrg::new(rank, Box::new(AesPrg::new(key)))
    }

    /// Builds three parties' `Replicated3Pc` objects wired with pairwise
    /// `CommonPrg`s: party `i`'s `prev_prg` shares a key with `i - 1 mod 3`,
    /// its `next_prg` with `i + 1 mod 3`.
    fn three_party_protocols<T: ShareInt>(keys: [[u8; 32]; 3]) -> Vec<Replicated3Pc<T>> {
        // keys[k] is the key shared on edge (k, k+1 mod 3): party k uses it
        // as next_prg, party k+1 uses it as prev_prg.
        (0..3)
            .map(|p| {
                let prev_key = keys[(p + 3 - 1) % 3];
                let next_key = keys[p];
                Replicated3Pc::new(p, keyed_prg(p, prev_key), keyed_prg(p, next_key))
            })
            .collect()
    }

    #[test]
    fn open_reconstructs_a_freshly_shared_secret() {
        let keys = [[1u8; 32], [2u8; 32], [3u8; 32]];
        let mut protocols = three_party_protocols::<i32>(keys);

        let (recv_channels, channels) = create_unix_channels(3).unwrap();
        let (recv_channels, channels) = ch_arcnize_all(recv_channels, channels);
        let mut channels = channels.into_iter();
        let peers0: HashMap<_, _> = recv_channels.into_iter().collect();
        let peers1: HashMap<_, _> = channels.next().unwrap().into_iter().collect();
        let peers2: HashMap<_, _> = channels.next().unwrap().into_iter().collect();

        let mut proto2 = protocols.pop().unwrap();
        let mut proto1 = protocols.pop().unwrap();
        let mut proto0 = protocols.pop().unwrap();

        let h1 = std::thread::spawn(move || {
            let mut comm = MessagePassingCommunicator::new(1, 3, peers1);
            let shared = proto1.secret_share(&mut comm, 0, None, 2, false).unwrap();
            proto1.open(&mut comm, &shared, false).unwrap()
        });
        let h2 = std::thread::spawn(move || {
            let mut comm = MessagePassingCommunicator::new(2, 3, peers2);
            let shared = proto2.secret_share(&mut comm, 0, None, 2, false).unwrap();
            proto2.open(&mut comm, &shared, false).unwrap()
        });

        let mut comm0 = MessagePassingCommunicator::new(0, 3, peers0);
        let plain = Vector::<i32>::from_vec(vec![11, 22]);
        let shared0 = proto0.secret_share(&mut comm0, 0, Some(&plain), 2, false).unwrap();
        let opened0 = proto0.open(&mut comm0, &shared0, false).unwrap();

        let opened1 = h1.join().unwrap();
        let opened2 = h2.join().unwrap();

        assert_eq!(opened0.to_vec(), vec![11, 22]);
        assert_eq!(opened1.to_vec(), vec![11, 22]);
        assert_eq!(opened2.to_vec(), vec![11, 22]);
    }
}
