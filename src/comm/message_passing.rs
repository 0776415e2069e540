//! Multi-process message-passing transport: one buffered channel per peer.
//!
//! Grounded directly in `channel_utils::tcp_channel`'s
//! `create_tcp_channels_for_sender`/`create_tcp_channels_for_receiver` (one
//! socket per ordered pair, spawned one thread per peer) and
//! `channel_utils::sync_channel::create_unix_channels` (the in-process
//! equivalent this module's own tests use, matching the teacher's own test
//! style of pairing `UnixStream`s). `exchange_shares` follows the same
//! lower-rank-writes-first convention `tcp_channel.rs`'s
//! `create_tcp_channel_for_party` uses to avoid a duplex deadlock.

use super::{decode, encode, relative_to_absolute, ByteCounters, Communicator};
use crate::error::{MpcError, Result};
use crate::random::correlation::beaver;
use crate::vector::{ShareInt, Vector};
use ocelot::ot::{AlszReceiver, AlszSender};
use scuttlebutt::AbstractChannel;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// A [`Communicator`] backed by one `AbstractChannel` per peer, each
/// wrapped in an `Arc<Mutex<_>>` the way `channel_utils::ch_arcnize`
/// prepares channels for concurrent use.
pub struct MessagePassingCommunicator<C: AbstractChannel> {
    rank: usize,
    num_parties: usize,
    peers: HashMap<usize, Arc<Mutex<C>>>,
    counters: ByteCounters,
}

impl<C: AbstractChannel> MessagePassingCommunicator<C> {
    /// Build a communicator from this party's rank, total party count, and
    /// one channel per other party keyed by absolute rank (as returned by
    /// `channel_utils::ch_arcnize`/`ch_arcnize_all`).
    pub fn new(
        rank: usize,
        num_parties: usize,
        peers: HashMap<usize, Arc<Mutex<C>>>,
    ) -> Self {
        MessagePassingCommunicator {
            rank,
            num_parties,
            peers,
            counters: ByteCounters::new(),
        }
    }

    fn channel(&self, abs_peer: usize) -> Result<Arc<Mutex<C>>> {
        self.peers
            .get(&abs_peer)
            .cloned()
            .ok_or_else(|| MpcError::InvalidConfig(format!("no channel for party {abs_peer}")))
    }

    fn write_bytes(&self, channel: &mut C, bytes: &[u8]) -> Result<()> {
        channel.write_usize(bytes.len())?;
        channel.write_bytes(bytes)?;
        channel.flush()?;
        self.counters.add_sent(bytes.len() as u64);
        Ok(())
    }

    fn read_bytes(&self, channel: &mut C) -> Result<Vec<u8>> {
        let len = channel.read_usize()?;
        let mut buf = vec![0u8; len];
        channel.read_bytes(&mut buf)?;
        self.counters.add_received(len as u64);
        Ok(buf)
    }
}

impl<C: AbstractChannel> Communicator for MessagePassingCommunicator<C> {
    fn rank(&self) -> usize {
        self.rank
    }

    fn num_parties(&self) -> usize {
        self.num_parties
    }

    fn bytes_sent(&self) -> u64 {
        self.counters.sent()
    }

    fn bytes_received(&self) -> u64 {
        self.counters.received()
    }

    fn send_share<T: ShareInt>(&mut self, v: &Vector<T>, rel_peer: i64) -> Result<()> {
        let abs_peer = relative_to_absolute(self.rank, self.num_parties, rel_peer);
        let channel = self.channel(abs_peer)?;
        let bytes = encode(v)?;
        let mut guard = channel.lock().expect("channel mutex poisoned");
        self.write_bytes(&mut guard, &bytes)
    }

    fn recv_share<T: ShareInt>(&mut self, rel_peer: i64) -> Result<Vector<T>> {
        let abs_peer = relative_to_absolute(self.rank, self.num_parties, rel_peer);
        let channel = self.channel(abs_peer)?;
        let mut guard = channel.lock().expect("channel mutex poisoned");
        let bytes = self.read_bytes(&mut guard)?;
        Ok(decode(&bytes))
    }

    fn recv_shares<T: ShareInt>(&mut self, rel_peer: i64, _n: usize) -> Result<Vector<T>> {
        self.recv_share(rel_peer)
    }

    fn exchange_shares<T: ShareInt>(
        &mut self,
        send: &Vector<T>,
        rel_peer: i64,
        _n: usize,
    ) -> Result<Vector<T>> {
        self.exchange_shares_directed(send, rel_peer, rel_peer, send.size())
    }

    fn exchange_shares_directed<T: ShareInt>(
        &mut self,
        send: &Vector<T>,
        to_peer: i64,
        from_peer: i64,
        _n: usize,
    ) -> Result<Vector<T>> {
        let to_abs = relative_to_absolute(self.rank, self.num_parties, to_peer);
        let from_abs = relative_to_absolute(self.rank, self.num_parties, from_peer);
        let bytes = encode(send)?;

        if to_abs == from_abs {
            let channel = self.channel(to_abs)?;
            let mut guard = channel.lock().expect("channel mutex poisoned");
            if self.rank < to_abs {
                self.write_bytes(&mut guard, &bytes)?;
                let recv_bytes = self.read_bytes(&mut guard)?;
                Ok(decode(&recv_bytes))
            } else {
                let recv_bytes = self.read_bytes(&mut guard)?;
                self.write_bytes(&mut guard, &bytes)?;
                Ok(decode(&recv_bytes))
            }
        } else {
            let to_channel = self.channel(to_abs)?;
            {
                let mut guard = to_channel.lock().expect("channel mutex poisoned");
                self.write_bytes(&mut guard, &bytes)?;
            }
            let from_channel = self.channel(from_abs)?;
            let mut guard = from_channel.lock().expect("channel mutex poisoned");
            let recv_bytes = self.read_bytes(&mut guard)?;
            Ok(decode(&recv_bytes))
        }
    }

    fn generate_beaver_cross_term<T: ShareInt>(
        &mut self,
        rel_peer: i64,
        my_a: &Vector<T>,
        my_b: &Vector<T>,
        binary: bool,
    ) -> Result<Vector<T>> {
        let abs_peer = relative_to_absolute(self.rank, self.num_parties, rel_peer);
        let channel = self.channel(abs_peer)?;
        let mut guard = channel.lock().expect("channel mutex poisoned");
        let mut rng = rand::thread_rng();
        // Same write-before-read tie-break as `exchange_shares_directed`:
        // the lower absolute rank always plays OT sender, the higher
        // always OT receiver, for both cross-term legs.
        let result = if self.rank < abs_peer {
            beaver::cross_term_as_low::<T, AlszSender, C, _>(my_a, my_b, &mut *guard, &mut rng, binary)
        } else {
            beaver::cross_term_as_high::<T, AlszReceiver, C, _>(my_a, my_b, &mut *guard, &mut rng, binary)
        };
        result.map_err(|e| MpcError::InvalidConfig(format!("beaver cross-term generation failed: {e:#}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel_utils::{ch_arcnize_all, sync_channel::create_unix_channels};

    #[test]
    fn two_parties_exchange_shares() {
        let (recv_channels, channels) = create_unix_channels(2).unwrap();
        let (recv_channels, channels) = ch_arcnize_all(recv_channels, channels);

        let handle = std::thread::spawn(move || {
            let peers: HashMap<_, _> = channels.into_iter().next().unwrap().into_iter().collect();
            let mut comm = MessagePassingCommunicator::new(1, 2, peers);
            let v = Vector::<i32>::from_vec(vec![10, 20, 30]);
            comm.exchange_shares(&v, -1, 3).unwrap()
        });

        let peers: HashMap<_, _> = recv_channels.into_iter().collect();
        let mut comm = MessagePassingCommunicator::new(0, 2, peers);
        let v = Vector::<i32>::from_vec(vec![1, 2, 3]);
        let got = comm.exchange_shares(&v, 1, 3).unwrap();
        assert_eq!(got.to_vec(), vec![10, 20, 30]);

        let other_got = handle.join().unwrap();
        assert_eq!(other_got.to_vec(), vec![1, 2, 3]);

        assert!(comm.bytes_sent() > 0);
        assert!(comm.bytes_received() > 0);
    }

    #[test]
    fn send_then_recv_share() {
        let (recv_channels, channels) = create_unix_channels(2).unwrap();
        let (recv_channels, channels) = ch_arcnize_all(recv_channels, channels);

        let handle = std::thread::spawn(move || {
            let peers: HashMap<_, _> = channels.into_iter().next().unwrap().into_iter().collect();
            let mut comm = MessagePassingCommunicator::new(1, 2, peers);
            let got: Vector<i32> = comm.recv_share(-1).unwrap();
            assert_eq!(got.to_vec(), vec![7, 8, 9]);
        });

        let peers: HashMap<_, _> = recv_channels.into_iter().collect();
        let mut comm = MessagePassingCommunicator::new(0, 2, peers);
        let v = Vector::<i32>::from_vec(vec![7, 8, 9]);
        comm.send_share(&v, 1).unwrap();

        handle.join().unwrap();
    }
}
