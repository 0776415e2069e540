//! Direct-socket transport with a no-copy ring, and the `P=1`
//! null-communicator specialization.
//!
//! Each peer link owns an outgoing [`Ring`] drained by a dedicated writer
//! thread and a blocking reader half of the same duplex stream, matching
//! the spec's "each peer has its own stream socket and a fixed-depth ring
//! buffer... a background send thread drains the ring" description and
//! `original_source/include/core/communication/no_copy_communicator/
//! no_copy_ring.h`'s socket-setup shape. Socket setup itself reuses
//! `channel_utils::tcp_channel::create_tcp_channels`'s one-thread-per-peer
//! connection pattern -- this module only replaces the buffered-channel
//! send/recv with the ring-backed path.

use super::ring::Ring;
use super::{decode, encode, relative_to_absolute, ByteCounters, Communicator};
use crate::error::{MpcError, Result};
use crate::vector::{ShareInt, Vector};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

const DEFAULT_RING_DEPTH: usize = 256;

fn write_framed<W: Write>(writer: &mut W, payload: &[u8]) -> std::io::Result<()> {
    writer.write_all(&(payload.len() as u64).to_le_bytes())?;
    writer.write_all(payload)?;
    writer.flush()
}

fn read_framed<R: Read>(reader: &mut R) -> std::io::Result<Vec<u8>> {
    let mut len_buf = [0u8; 8];
    reader.read_exact(&mut len_buf)?;
    let len = u64::from_le_bytes(len_buf) as usize;
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

struct PeerLink<S> {
    ring: Arc<Ring>,
    reader: Mutex<S>,
    drain_handle: Option<JoinHandle<()>>,
}

impl<S> Drop for PeerLink<S> {
    fn drop(&mut self) {
        if let Some(h) = self.drain_handle.take() {
            // The drain thread loops forever on the ring; in production
            // teardown happens at process exit. Detaching here avoids
            // blocking a unit test's drop on a thread that has nothing left
            // to drain.
            drop(h);
        }
    }
}

/// A [`Communicator`] backed by one duplex stream per peer, each with its
/// own outgoing ring and writer thread.
pub struct DirectSocketCommunicator<S: Read + Write + Send + 'static> {
    rank: usize,
    num_parties: usize,
    peers: HashMap<usize, PeerLink<S>>,
    counters: ByteCounters,
}

impl<S: Read + Write + Send + 'static> DirectSocketCommunicator<S> {
    /// Build a communicator from this party's rank, total party count, and
    /// one `(writer_half, reader_half)` duplex stream pair per other party
    /// keyed by absolute rank.
    pub fn new(
        rank: usize,
        num_parties: usize,
        streams: HashMap<usize, (S, S)>,
    ) -> Self
    where
        S: 'static,
    {
        Self::with_ring_depth(rank, num_parties, streams, DEFAULT_RING_DEPTH)
    }

    /// As [`Self::new`], with an explicit ring depth instead of
    /// [`DEFAULT_RING_DEPTH`].
    pub fn with_ring_depth(
        rank: usize,
        num_parties: usize,
        streams: HashMap<usize, (S, S)>,
        ring_depth: usize,
    ) -> Self {
        let counters = ByteCounters::new();
        let mut peers = HashMap::new();
        for (abs_peer, (mut writer, reader)) in streams {
            let ring = Arc::new(Ring::new(ring_depth));
            let ring_for_thread = ring.clone();
            let counters_for_thread = counters.clone();
            let drain_handle = std::thread::spawn(move || loop {
                let entry = ring_for_thread.pop_blocking();
                if entry.generation == u64::MAX {
                    break;
                }
                if write_framed(&mut writer, &entry.payload).is_err() {
                    break;
                }
                counters_for_thread.add_sent(entry.payload.len() as u64);
            });
            peers.insert(
                abs_peer,
                PeerLink {
                    ring,
                    reader: Mutex::new(reader),
                    drain_handle: Some(drain_handle),
                },
            );
        }
        DirectSocketCommunicator {
            rank,
            num_parties,
            peers,
            counters,
        }
    }

    fn peer(&self, abs_peer: usize) -> Result<&PeerLink<S>> {
        self.peers
            .get(&abs_peer)
            .ok_or_else(|| MpcError::InvalidConfig(format!("no peer link for party {abs_peer}")))
    }
}

impl<S: Read + Write + Send + 'static> Communicator for DirectSocketCommunicator<S> {
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
        let bytes = encode(v)?;
        self.peer(abs_peer)?.ring.push_blocking(bytes);
        Ok(())
    }

    fn recv_share<T: ShareInt>(&mut self, rel_peer: i64) -> Result<Vector<T>> {
        let abs_peer = relative_to_absolute(self.rank, self.num_parties, rel_peer);
        let link = self.peer(abs_peer)?;
        let mut reader = link.reader.lock().expect("reader mutex poisoned");
        let bytes = read_framed(&mut *reader)?;
        self.counters.add_received(bytes.len() as u64);
        Ok(decode(&bytes))
    }

    fn recv_shares<T: ShareInt>(&mut self, rel_peer: i64, _n: usize) -> Result<Vector<T>> {
        self.recv_share(rel_peer)
    }

    fn exchange_shares<T: ShareInt>(
        &mut self,
        send: &Vector<T>,
        rel_peer: i64,
        n: usize,
    ) -> Result<Vector<T>> {
        self.exchange_shares_directed(send, rel_peer, rel_peer, n)
    }

    fn exchange_shares_directed<T: ShareInt>(
        &mut self,
        send: &Vector<T>,
        to_peer: i64,
        from_peer: i64,
        _n: usize,
    ) -> Result<Vector<T>> {
        self.send_share(send, to_peer)?;
        self.recv_share(from_peer)
    }
}

/// The `P=1` specialization: no sockets, no threads. Every send is
/// immediately visible to the matching receive on the same (only) party.
pub struct NullCommunicator {
    counters: ByteCounters,
    loopback: Mutex<HashMap<usize, Vec<Vec<u8>>>>,
}

impl NullCommunicator {
    /// A null communicator for the single-party case.
    pub fn new() -> Self {
        NullCommunicator {
            counters: ByteCounters::new(),
            loopback: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for NullCommunicator {
    fn default() -> Self {
        Self::new()
    }
}

impl Communicator for NullCommunicator {
    fn rank(&self) -> usize {
        0
    }

    fn num_parties(&self) -> usize {
        1
    }

    fn bytes_sent(&self) -> u64 {
        self.counters.sent()
    }

    fn bytes_received(&self) -> u64 {
        self.counters.received()
    }

    fn send_share<T: ShareInt>(&mut self, v: &Vector<T>, rel_peer: i64) -> Result<()> {
        let bytes = encode(v)?;
        self.loopback
            .lock()
            .expect("loopback mutex poisoned")
            .entry(relative_to_absolute(0, 1, rel_peer))
            .or_default()
            .push(bytes);
        Ok(())
    }

    fn recv_share<T: ShareInt>(&mut self, rel_peer: i64) -> Result<Vector<T>> {
        let mut guard = self.loopback.lock().expect("loopback mutex poisoned");
        let queue = guard
            .get_mut(&relative_to_absolute(0, 1, rel_peer))
            .ok_or_else(|| MpcError::InvalidConfig("no message queued".into()))?;
        let bytes = if queue.is_empty() {
            return Err(MpcError::InvalidConfig("no message queued".into()));
        } else {
            queue.remove(0)
        };
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
        self.send_share(send, rel_peer)?;
        self.recv_share(rel_peer)
    }

    fn exchange_shares_directed<T: ShareInt>(
        &mut self,
        send: &Vector<T>,
        to_peer: i64,
        from_peer: i64,
        _n: usize,
    ) -> Result<Vector<T>> {
        self.send_share(send, to_peer)?;
        self.recv_share(from_peer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{TcpListener, TcpStream};

    fn tcp_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = std::thread::spawn(move || listener.accept().unwrap().0);
        let a = TcpStream::connect(addr).unwrap();
        let b = handle.join().unwrap();
        (a, b)
    }

    #[test]
    fn direct_socket_round_trips_a_share() {
        let (s0, s1) = tcp_pair();
        let s0_w = s0.try_clone().unwrap();
        let s1_w = s1.try_clone().unwrap();

        let mut streams0 = HashMap::new();
        streams0.insert(1, (s0_w, s0));
        let mut streams1 = HashMap::new();
        streams1.insert(0, (s1_w, s1));

        let handle = std::thread::spawn(move || {
            let mut comm1 = DirectSocketCommunicator::new(1, 2, streams1);
            let got: Vector<i32> = comm1.recv_share(-1).unwrap();
            assert_eq!(got.to_vec(), vec![1, 2, 3]);
        });

        let mut comm0 = DirectSocketCommunicator::new(0, 2, streams0);
        let v = Vector::<i32>::from_vec(vec![1, 2, 3]);
        comm0.send_share(&v, 1).unwrap();

        handle.join().unwrap();
    }

    #[test]
    fn null_communicator_loops_back_locally() {
        let mut comm = NullCommunicator::new();
        let v = Vector::<i32>::from_vec(vec![9, 9, 9]);
        comm.send_share(&v, 0).unwrap();
        let got: Vector<i32> = comm.recv_share(0).unwrap();
        assert_eq!(got.to_vec(), vec![9, 9, 9]);
    }
}
