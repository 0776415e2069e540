//! 1PC: the plaintext/"0PC" protocol. A single party holds every share, so
//! every operation is local -- no communicator round ever actually touches
//! the network, but the trait still takes one so call sites stay uniform
//! across variants.

use super::Protocol;
use crate::comm::Communicator;
use crate::error::Result;
use crate::evector::EVector;
use crate::vector::{ShareInt, Vector};
use std::marker::PhantomData;

/// Replication factor for the single-party case: one party, one replica.
pub struct Plaintext<T: ShareInt> {
    _marker: PhantomData<T>,
}

impl<T: ShareInt> Plaintext<T> {
    pub fn new() -> Self {
        Plaintext { _marker: PhantomData }
    }
}

impl<T: ShareInt> Default for Plaintext<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ShareInt> Protocol<T, 1> for Plaintext<T> {
    fn rank(&self) -> usize {
        0
    }

    fn num_parties(&self) -> usize {
        1
    }

    fn raw_multiply<C: Communicator>(
        &mut self,
        _comm: &mut C,
        x: &EVector<T, 1>,
        y: &EVector<T, 1>,
        binary: bool,
    ) -> Result<EVector<T, 1>> {
        let prod = if binary { x.and(y) } else {
            let data: Vec<T> = x
                .share(0)
                .to_vec()
                .into_iter()
                .zip(y.share(0).to_vec())
                .map(|(a, b)| a.wrapping_mul(b))
                .collect();
            EVector::new([Vector::from_vec(data)])
        };
        Ok(prod)
    }

    fn reshare<C: Communicator>(
        &mut self,
        _comm: &mut C,
        v: &EVector<T, 1>,
        _binary: bool,
    ) -> Result<EVector<T, 1>> {
        Ok(v.clone())
    }

    fn open<C: Communicator>(
        &mut self,
        _comm: &mut C,
        v: &EVector<T, 1>,
        _binary: bool,
    ) -> Result<Vector<T>> {
        Ok(v.share(0).clone())
    }

    fn secret_share<C: Communicator>(
        &mut self,
        _comm: &mut C,
        _owner: usize,
        plain: Option<&Vector<T>>,
        n: usize,
        _binary: bool,
    ) -> Result<EVector<T, 1>> {
        let v = plain
            .cloned()
            .unwrap_or_else(|| Vector::from_vec(vec![T::default(); n]));
        Ok(EVector::new([v]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::socket::NullCommunicator;

    #[test]
    fn multiply_a_matches_plain_multiplication() {
        let mut proto = Plaintext::<i32>::new();
        let mut comm = NullCommunicator::new();
        let x = proto.public_share(&Vector::from_vec(vec![3, 4]));
        let y = proto.public_share(&Vector::from_vec(vec![5, 6]));
        let prod = proto.multiply_a(&mut comm, &x, &y).unwrap();
        let opened = proto.reconstruct_from_a(&mut comm, &prod).unwrap();
        assert_eq!(opened.to_vec(), vec![15, 24]);
    }

    #[test]
    fn secret_share_with_no_plain_input_is_zero() {
        let mut proto = Plaintext::<i32>::new();
        let mut comm = NullCommunicator::new();
        let shared = proto.secret_share_a(&mut comm, 0, None, 3).unwrap();
        let opened = proto.reconstruct_from_a(&mut comm, &shared).unwrap();
        assert_eq!(opened.to_vec(), vec![0, 0, 0]);
    }
}
