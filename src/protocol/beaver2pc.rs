//! 2PC: dishonest-majority, additive (`R = 1`) sharing secured by Beaver
//! triples for multiplication.
//!
//! Grounded in the textbook Beaver trick (`d = x - a`, `e = y - b`, reveal
//! `d, e`, `z = c + d*b + e*a + d*e` with the `d*e` cross term added by only
//! one party) and in [`super::super::random::correlation::beaver`] for the
//! triple shape. Reshare is communication-free the same way
//! `random::zero_sharing::arithmetic_zero_share` already is: both parties
//! hold a `CommonPrg` keyed identically with their single peer, so each can
//! independently draw a telescoping-to-zero mask without a network round.
//!
//! Triple generation draws each party's own `a, b` locally and gets the
//! cross term `a0*b1 + a1*b0` from
//! [`crate::comm::Communicator::generate_beaver_cross_term`], a live OLE
//! exchange over the peer channel -- without it the masked `d, e` values
//! exchanged below would be the raw, unmasked input shares.

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

/// Two-party dishonest-majority protocol object.
pub struct Beaver2Pc<T: ShareInt> {
    rank: usize,
    prev_prg: CommonPrg,
    next_prg: CommonPrg,
    _marker: std::marker::PhantomData<T>,
}

impl<T: ShareInt> Beaver2Pc<T> {
    /// Build the protocol object for one of the two parties. `prev_prg` and
    /// `next_prg` must both be keyed identically to the peer's own pair
    /// (the single-peer case is its own "previous" and "next").
    pub fn new(rank: usize, prev_prg: CommonPrg, next_prg: CommonPrg) -> Self {
        assert!(rank < 2, "Beaver2Pc is a two-party protocol");
        Beaver2Pc {
            rank,
            prev_prg,
            next_prg,
            _marker: std::marker::PhantomData,
        }
    }

    fn peer_rel(&self) -> i64 {
        1
    }
}

impl<T: ShareInt> Protocol<T, 1> for Beaver2Pc<T> {
    fn rank(&self) -> usize {
        self.rank
    }

    fn num_parties(&self) -> usize {
        2
    }

    fn raw_multiply<C: Communicator>(
        &mut self,
        comm: &mut C,
        x: &EVector<T, 1>,
        y: &EVector<T, 1>,
        binary: bool,
    ) -> Result<EVector<T, 1>> {
        let n = x.size();
        let a = random_vector::<T>(n);
        let b = random_vector::<T>(n);
        let cross = comm.generate_beaver_cross_term(self.peer_rel(), &a, &b, binary)?;
        let local = if binary { a.and(&b) } else { a.mul(&b) };
        let c = if binary { local.xor(&cross) } else { local.add(&cross) };

        let my_d = if binary { x.share(0).xor(&a) } else { x.share(0).sub(&a) };
        let my_e = if binary { y.share(0).xor(&b) } else { y.share(0).sub(&b) };

        let peer_d = comm.exchange_shares(&my_d, self.peer_rel(), n)?;
        let peer_e = comm.exchange_shares(&my_e, self.peer_rel(), n)?;

        let d = if binary { my_d.xor(&peer_d) } else { my_d.add(&peer_d) };
        let e = if binary { my_e.xor(&peer_e) } else { my_e.add(&peer_e) };

        let mut z = if binary {
            c.xor(&d.and(&b)).xor(&e.and(&a))
        } else {
            c.add(&d.mul(&b)).add(&e.mul(&a))
        };
        if self.rank == 0 {
            z = if binary { z.xor(&d.and(&e)) } else { z.add(&d.mul(&e)) };
        }

        Ok(EVector::new([z]))
    }

    fn reserve_triples<C: Communicator>(&mut self, comm: &mut C, n: usize, binary: bool) -> Result<()> {
        let a = random_vector::<T>(n);
        let b = random_vector::<T>(n);
        let _cross = comm.generate_beaver_cross_term(self.peer_rel(), &a, &b, binary)?;
        Ok(())
    }

    fn reshare<C: Communicator>(
        &mut self,
        _comm: &mut C,
        v: &EVector<T, 1>,
        binary: bool,
    ) -> Result<EVector<T, 1>> {
        let n = v.size();
        let mask = if binary {
            boolean_zero_share::<T>(&mut self.prev_prg, &mut self.next_prg, n)
        } else {
            arithmetic_zero_share::<T>(&mut self.prev_prg, &mut self.next_prg, n)
        };
        let refreshed = if binary { v.share(0).xor(&mask) } else { v.share(0).add(&mask) };
        Ok(EVector::new([refreshed]))
    }

    fn open<C: Communicator>(
        &mut self,
        comm: &mut C,
        v: &EVector<T, 1>,
        binary: bool,
    ) -> Result<Vector<T>> {
        let peer = comm.exchange_shares(v.share(0), self.peer_rel(), v.size())?;
        Ok(if binary { v.share(0).xor(&peer) } else { v.share(0).add(&peer) })
    }

    fn secret_share<C: Communicator>(
        &mut self,
        comm: &mut C,
        owner: usize,
        plain: Option<&Vector<T>>,
        n: usize,
        binary: bool,
    ) -> Result<EVector<T, 1>> {
        if owner == self.rank {
            let plain = plain.expect("owner must supply the plaintext value");
            let mine = random_vector::<T>(n);
            let theirs = if binary { plain.xor(&mine) } else { plain.sub(&mine) };
            comm.send_share(&theirs, self.peer_rel())?;
            Ok(EVector::new([mine]))
        } else {
            let mine: Vector<T> = comm.recv_share(self.peer_rel())?;
            Ok(EVector::new([mine]))
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

    #[test]
    fn multiply_a_reconstructs_the_plain_product() {
        let (recv_channels, channels) = create_unix_channels(2).unwrap();
        let (recv_channels, channels) = ch_arcnize_all(recv_channels, channels);
        let key = [42u8; 32];

        let handle = std::thread::spawn(move || {
            let peers: HashMap<_, _> = channels.into_iter().next().unwrap().into_iter().collect();
            let mut comm = MessagePassingCommunicator::new(1, 2, peers);
            let mut proto = Beaver2Pc::<i32>::new(1, keyed_prg(1, key), keyed_prg(1, key));
            let x1 = EVector::<i32, 1>::new([Vector::from_vec(vec![0, 0])]);
            let y1 = EVector::<i32, 1>::new([Vector::from_vec(vec![0, 0])]);
            let z1 = proto.raw_multiply(&mut comm, &x1, &y1, false).unwrap();
            proto.open(&mut comm, &z1, false).unwrap()
        });

        let peers: HashMap<_, _> = recv_channels.into_iter().collect();
        let mut comm = MessagePassingCommunicator::new(0, 2, peers);
        let mut proto = Beaver2Pc::<i32>::new(0, keyed_prg(0, key), keyed_prg(0, key));
        let x0 = EVector::<i32, 1>::new([Vector::from_vec(vec![3, 4])]);
        let y0 = EVector::<i32, 1>::new([Vector::from_vec(vec![5, 6])]);
        let z0 = proto.raw_multiply(&mut comm, &x0, &y0, false).unwrap();
        let opened0 = proto.open(&mut comm, &z0, false).unwrap();

        let opened1 = handle.join().unwrap();
        assert_eq!(opened0.to_vec(), vec![15, 24]);
        assert_eq!(opened1.to_vec(), vec![15, 24]);
    }
}
