//! Communicator abstractions: typed per-peer send/recv/exchange/broadcast.
//!
//! Grounded in `channel_utils`: `tcp_channel.rs`'s `create_tcp_channels_for_
//! sender/receiver` grounds [`message_passing`]'s multi-socket transport,
//! `sync_channel.rs`'s `create_unix_channels` grounds the in-process test
//! transport used by this crate's own tests, and
//! `sync_channel_by_cb::crossbeam_wrapper` (a `Read`/`Write` adapter over an
//! unbounded `crossbeam::channel`) grounds [`ring`]'s bounded SPSC ring.

pub mod message_passing;
pub mod ring;
pub mod socket;

use crate::error::{MpcError, Result};
use crate::vector::{ShareInt, Vector};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Shared send/receive byte totals, for reporting. Cloned handles (one per
/// peer channel) all update the same counters.
#[derive(Clone, Default)]
pub struct ByteCounters {
    sent: Arc<AtomicU64>,
    received: Arc<AtomicU64>,
}

impl ByteCounters {
    /// A fresh zeroed counter pair.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `n` bytes sent.
    pub fn add_sent(&self, n: u64) {
        self.sent.fetch_add(n, Ordering::Relaxed);
    }

    /// Record `n` bytes received.
    pub fn add_received(&self, n: u64) {
        self.received.fetch_add(n, Ordering::Relaxed);
    }

    /// Total bytes sent so far.
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    /// Total bytes received so far.
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }
}

/// Serialize a plain vector's elements to a flat byte buffer, the wire
/// format every transport below agrees on. Byte-level serialization
/// subsumes the "128-bit elements are split into two 64-bit words"
/// contract: `i128::to_le_bytes` already yields the same 16 bytes that two
/// little-endian `i64` halves would, just without an intermediate type.
pub fn encode<T: ShareInt>(v: &Vector<T>) -> Result<Vec<u8>> {
    if v.has_mapping() {
        return Err(MpcError::ViewNotPlain);
    }
    Ok(v.to_vec().into_iter().flat_map(T::to_le_bytes).collect())
}

/// Inverse of [`encode`]: chunk `bytes` into `T::byte_len()`-wide pieces.
pub fn decode<T: ShareInt>(bytes: &[u8]) -> Vector<T> {
    let width = T::byte_len();
    assert_eq!(bytes.len() % width, 0, "byte length not a multiple of element width");
    let data = bytes.chunks(width).map(T::from_le_bytes).collect();
    Vector::from_vec(data)
}

/// Typed per-peer communication, parameterized by the party's own rank and
/// peer count. All vector arguments must be plain views (`has_mapping() ==
/// false`); passing a mapped view is a caller bug, not a runtime condition,
/// so methods return [`MpcError::ViewNotPlain`] rather than panicking.
pub trait Communicator {
    /// This party's rank.
    fn rank(&self) -> usize;

    /// Total number of parties.
    fn num_parties(&self) -> usize;

    /// Total bytes sent over this communicator so far.
    fn bytes_sent(&self) -> u64;

    /// Total bytes received over this communicator so far.
    fn bytes_received(&self) -> u64;

    /// Send `v` to the peer at signed relative rank `rel_peer`.
    fn send_share<T: ShareInt>(&mut self, v: &Vector<T>, rel_peer: i64) -> Result<()>;

    /// Send the first `n` elements of `v` to `rel_peer`.
    fn send_shares<T: ShareInt>(&mut self, v: &Vector<T>, rel_peer: i64, n: usize) -> Result<()> {
        self.send_share(&v.windowed(0, n), rel_peer)
    }

    /// Receive one vector from `rel_peer`.
    fn recv_share<T: ShareInt>(&mut self, rel_peer: i64) -> Result<Vector<T>>;

    /// Receive `n` elements from `rel_peer`.
    fn recv_shares<T: ShareInt>(&mut self, rel_peer: i64, n: usize) -> Result<Vector<T>>;

    /// Send `send` to `rel_peer` and receive `n` elements back from the
    /// same peer, round-tripping in one call.
    fn exchange_shares<T: ShareInt>(
        &mut self,
        send: &Vector<T>,
        rel_peer: i64,
        n: usize,
    ) -> Result<Vector<T>>;

    /// As [`Self::exchange_shares`], but the send and receive legs may go
    /// to/from different peers.
    fn exchange_shares_directed<T: ShareInt>(
        &mut self,
        send: &Vector<T>,
        to_peer: i64,
        from_peer: i64,
        n: usize,
    ) -> Result<Vector<T>>;

    /// Send one vector per entry of `peers`, `vecs[i]` to `peers[i]`.
    fn send_shares_multi<T: ShareInt>(&mut self, vecs: &[Vector<T>], peers: &[i64]) -> Result<()> {
        assert_eq!(vecs.len(), peers.len(), "size mismatch");
        for (v, &p) in vecs.iter().zip(peers) {
            self.send_share(v, p)?;
        }
        Ok(())
    }

    /// Receive one vector of length `n` from each entry of `peers`.
    fn receive_broadcast<T: ShareInt>(&mut self, peers: &[i64], n: usize) -> Result<Vec<Vector<T>>> {
        peers.iter().map(|&p| self.recv_shares(p, n)).collect()
    }

    /// Bidirectional batched exchange: send `vecs[i]` to `to_peers[i]` and
    /// receive a same-length vector from `from_peers[i]`, for every `i`.
    fn exchange_shares_multi<T: ShareInt>(
        &mut self,
        vecs: &[Vector<T>],
        to_peers: &[i64],
        from_peers: &[i64],
    ) -> Result<Vec<Vector<T>>> {
        assert_eq!(vecs.len(), to_peers.len(), "size mismatch");
        assert_eq!(vecs.len(), from_peers.len(), "size mismatch");
        vecs.iter()
            .zip(to_peers)
            .zip(from_peers)
            .map(|((v, &to), &from)| self.exchange_shares_directed(v, to, from, v.size()))
            .collect()
    }

    /// Run a real OLE exchange with the peer at `rel_peer` to get this
    /// party's share of the two Beaver cross terms between its own `(my_a,
    /// my_b)` and the peer's operands: the returned vector `s` satisfies
    /// `s_self + s_peer == my_a*peer_b + peer_a*my_b` (XOR/AND when
    /// `binary`). Only a communicator backed by a real bidirectional
    /// channel can serve this -- [`message_passing::MessagePassingCommunicator`]
    /// overrides it; other transports (the in-memory ring, the null
    /// communicator) have no OT-capable channel and keep this default,
    /// which errors.
    fn generate_beaver_cross_term<T: ShareInt>(
        &mut self,
        rel_peer: i64,
        my_a: &Vector<T>,
        my_b: &Vector<T>,
        binary: bool,
    ) -> Result<Vector<T>> {
        let _ = (rel_peer, my_a, my_b, binary);
        Err(MpcError::InvalidConfig(
            "this communicator has no OT-capable transport for Beaver cross-term generation".into(),
        ))
    }
}

/// Map a signed relative rank to an absolute party rank modulo
/// `num_parties`.
pub fn relative_to_absolute(my_rank: usize, num_parties: usize, rel_peer: i64) -> usize {
    let n = num_parties as i64;
    (((my_rank as i64) + rel_peer).rem_euclid(n)) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_rank_wraps_around() {
        assert_eq!(relative_to_absolute(0, 3, -1), 2);
        assert_eq!(relative_to_absolute(2, 3, 1), 0);
        assert_eq!(relative_to_absolute(1, 4, 2), 3);
    }

    #[test]
    fn encode_decode_roundtrip() {
        let v = Vector::<i32>::from_vec(vec![1, -2, 3, -4]);
        let bytes = encode(&v).unwrap();
        let back: Vector<i32> = decode(&bytes);
        assert_eq!(back.to_vec(), v.to_vec());
    }

    #[test]
    fn encode_rejects_mapped_views() {
        let v = Vector::<i32>::from_vec(vec![1, 2, 3, 4]);
        let mapped = v.simple_subset_reference(0, 2, 4);
        assert!(encode(&mapped).is_err());
    }
}
