//! The process-wide orchestrator: owns the worker pool, slices vector
//! operations into per-worker batches, dispatches typed protocol
//! operations across the pool, and manages teardown.
//!
//! Grounded directly in `original_source/include/backend/common/runtime.h`:
//! the signed batch-size convention, `MINIMUM_CHUNK_SIZE`, and the full
//! per-width operation surface enumerated by
//! `runtime_declare_protocol_functions(T)` are carried over as this
//! struct's public methods, each generic over the integer width via the
//! [`WidthOf`] selector instead of macro-expanded per width.

use crate::comm::Communicator;
use crate::error::{MpcError, Result};
use crate::evector::EVector;
use crate::protocol::Protocol;
use crate::random::common_prg::{canonical_groups, party_share_mapping, GroupKey};
use crate::vector::{ShareInt, Vector};
use crate::worker::{thread_batch_boundaries, Worker};
use std::sync::{mpsc, Arc, Barrier};

/// Floor applied to every resolved batch size, matching the original's
/// `MINIMUM_CHUNK_SIZE` (itself constrained to a multiple of 128).
pub const MINIMUM_CHUNK_SIZE: usize = 256;
/// Default batch-size parameter tuned for a low-latency LAN deployment:
/// divide each thread's work into 12 equal chunks.
pub const DEFAULT_BATCH_SIZE_LAN: i64 = -12;
/// Default batch-size parameter tuned for a high-latency WAN deployment:
/// one chunk per thread (maximize per-round batching).
pub const DEFAULT_BATCH_SIZE_WAN: i64 = -1;

/// Resolve a signed batch-size parameter against a total element count.
/// Negative means "divide into `|batch_size|` equal chunks per thread";
/// positive means "use that literal size". Always floored at
/// [`MINIMUM_CHUNK_SIZE`].
pub fn resolve_batch_size(total: usize, batch_size: i64) -> usize {
    let literal = if batch_size < 0 {
        let chunks = (-batch_size) as usize;
        (total / chunks.max(1)).max(1)
    } else {
        batch_size as usize
    };
    literal.max(MINIMUM_CHUNK_SIZE)
}

/// Bundles one protocol object per integer width, all sharing the same
/// replication factor `R` (fixed by whichever protocol variant the
/// embedding application selected).
pub struct ProtocolSet<const R: usize, P8, P16, P32, P64, P128>
where
    P8: Protocol<i8, R>,
    P16: Protocol<i16, R>,
    P32: Protocol<i32, R>,
    P64: Protocol<i64, R>,
    P128: Protocol<i128, R>,
{
    /// The 8-bit-width protocol object.
    pub w8: P8,
    /// The 16-bit-width protocol object.
    pub w16: P16,
    /// The 32-bit-width protocol object.
    pub w32: P32,
    /// The 64-bit-width protocol object.
    pub w64: P64,
    /// The 128-bit-width protocol object.
    pub w128: P128,
}

/// Selects the protocol object matching integer width `T` out of a
/// [`ProtocolSet`], so `Runtime`'s dispatch methods can stay generic over
/// `T` instead of being macro-expanded per width.
pub trait WidthOf<T: ShareInt, const R: usize> {
    /// The protocol object type for width `T`.
    type Proto: Protocol<T, R>;
    /// Borrow this width's protocol object out of the set.
    fn proto(&mut self) -> &mut Self::Proto;
}

// Each width gets its own `WidthOf` impl by hand below (a declarative
// macro can't yield an associated type from a field-name token, so this
// isn't worth abstracting over).

impl<const R: usize, P8, P16, P32, P64, P128> WidthOf<i8, R> for ProtocolSet<R, P8, P16, P32, P64, P128>
where
    P8: Protocol<i8, R>,
    P16: Protocol<i16, R>,
    P32: Protocol<i32, R>,
    P64: Protocol<i64, R>,
    P128: Protocol<i128, R>,
{
    type Proto = P8;
    fn proto(&mut self) -> &mut P8 {
        &mut self.w8
    }
}

impl<const R: usize, P8, P16, P32, P64, P128> WidthOf<i16, R> for ProtocolSet<R, P8, P16, P32, P64, P128>
where
    P8: Protocol<i8, R>,
    P16: Protocol<i16, R>,
    P32: Protocol<i32, R>,
    P64: Protocol<i64, R>,
    P128: Protocol<i128, R>,
{
    type Proto = P16;
    fn proto(&mut self) -> &mut P16 {
        &mut self.w16
    }
}

impl<const R: usize, P8, P16, P32, P64, P128> WidthOf<i32, R> for ProtocolSet<R, P8, P16, P32, P64, P128>
where
    P8: Protocol<i8, R>,
    P16: Protocol<i16, R>,
    P32: Protocol<i32, R>,
    P64: Protocol<i64, R>,
    P128: Protocol<i128, R>,
{
    type Proto = P32;
    fn proto(&mut self) -> &mut P32 {
        &mut self.w32
    }
}

impl<const R: usize, P8, P16, P32, P64, P128> WidthOf<i64, R> for ProtocolSet<R, P8, P16, P32, P64, P128>
where
    P8: Protocol<i8, R>,
    P16: Protocol<i16, R>,
    P32: Protocol<i32, R>,
    P64: Protocol<i64, R>,
    P128: Protocol<i128, R>,
{
    type Proto = P64;
    fn proto(&mut self) -> &mut P64 {
        &mut self.w64
    }
}

impl<const R: usize, P8, P16, P32, P64, P128> WidthOf<i128, R> for ProtocolSet<R, P8, P16, P32, P64, P128>
where
    P8: Protocol<i8, R>,
    P16: Protocol<i16, R>,
    P32: Protocol<i32, R>,
    P64: Protocol<i64, R>,
    P128: Protocol<i128, R>,
{
    type Proto = P128;
    fn proto(&mut self) -> &mut P128 {
        &mut self.w128
    }
}

fn window<T: ShareInt, const R: usize>(v: &EVector<T, R>, start: usize, end: usize) -> EVector<T, R> {
    EVector::new(std::array::from_fn(|i| v.share(i).windowed(start, end)))
}

fn concat_evectors<T: ShareInt, const R: usize>(parts: Vec<EVector<T, R>>) -> EVector<T, R> {
    let mut shares: [Vec<T>; R] = std::array::from_fn(|_| Vec::new());
    for part in &parts {
        for i in 0..R {
            shares[i].extend(part.share(i).to_vec());
        }
    }
    EVector::new(shares.map(Vector::from_vec))
}

fn concat_vectors<T: ShareInt>(parts: Vec<Vector<T>>) -> Vector<T> {
    let mut data = Vec::new();
    for part in &parts {
        data.extend(part.to_vec());
    }
    Vector::from_vec(data)
}

type Set<const R: usize, P8, P16, P32, P64, P128> = ProtocolSet<R, P8, P16, P32, P64, P128>;

/// Owns the worker pool and dispatches protocol operations across it.
/// `C` is the communicator type every worker holds its own instance of;
/// `P8..P128` are the five width-specific protocol objects, all sharing
/// replication factor `R`.
pub struct Runtime<C, const R: usize, P8, P16, P32, P64, P128>
where
    C: Communicator + Send + 'static,
    P8: Protocol<i8, R> + Send + 'static,
    P16: Protocol<i16, R> + Send + 'static,
    P32: Protocol<i32, R> + Send + 'static,
    P64: Protocol<i64, R> + Send + 'static,
    P128: Protocol<i128, R> + Send + 'static,
{
    workers: Vec<Worker<C, Set<R, P8, P16, P32, P64, P128>>>,
    barrier: Arc<Barrier>,
    batch_size: i64,
    num_parties: usize,
}

impl<C, const R: usize, P8, P16, P32, P64, P128> Runtime<C, R, P8, P16, P32, P64, P128>
where
    C: Communicator + Send + 'static,
    P8: Protocol<i8, R> + Send + 'static,
    P16: Protocol<i16, R> + Send + 'static,
    P32: Protocol<i32, R> + Send + 'static,
    P64: Protocol<i64, R> + Send + 'static,
    P128: Protocol<i128, R> + Send + 'static,
{
    /// Spawn one worker thread per `(communicator, protocol set)` pair and
    /// rendezvous once at the shared arrival barrier to confirm every
    /// thread is alive before accepting operations.
    pub fn new(
        mut comms: Vec<C>,
        mut protocol_sets: Vec<Set<R, P8, P16, P32, P64, P128>>,
        batch_size: i64,
        num_parties: usize,
    ) -> Self {
        assert_eq!(comms.len(), protocol_sets.len(), "one communicator per protocol set");
        let num_workers = comms.len();
        let barrier = Arc::new(Barrier::new(num_workers + 1));
        let mut workers = Vec::with_capacity(num_workers);
        for i in 0..num_workers {
            let mut worker = Worker::new(i);
            worker.start(comms.remove(0), protocol_sets.remove(0), barrier.clone());
            log::info!("worker {i} started");
            workers.push(worker);
        }
        barrier.wait();
        Runtime { workers, barrier, batch_size, num_parties }
    }

    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    /// The canonical PRG-sharing groups for this run's party count, tolerating
    /// a single adversary: disjoint halves for `P >= 4`, every `(P-1)`-subset
    /// otherwise, plus "everyone".
    pub fn get_groups(&self) -> Vec<GroupKey> {
        canonical_groups(self.num_parties, 1)
    }

    /// For this run's replication factor `R`, the global additive-term
    /// indices each party rank holds.
    pub fn get_party_share_mappings(&self) -> Vec<Vec<usize>> {
        party_share_mapping(self.num_parties, R)
    }

    fn batch_bounds(&self, total: usize) -> Vec<(usize, usize)> {
        let bs = resolve_batch_size(total, self.batch_size);
        thread_batch_boundaries(total, self.workers.len(), bs)
    }

    /// Round the current batch size up to the nearest multiple of `d`
    /// after resolving it against `total` (negative batch sizes are first
    /// converted to an equal-chunk literal size). Returns the previous
    /// (unrounded, possibly-negative) value so the caller can restore it.
    pub fn make_batch_size_divisible_by(&mut self, total: usize, d: usize) -> i64 {
        let previous = self.batch_size;
        let literal = resolve_batch_size(total, previous).max(d);
        let rem = literal % d;
        let rounded = if rem == 0 { literal } else { literal + (d - rem) };
        self.batch_size = rounded as i64;
        previous
    }

    /// Tear down the worker pool: signal termination to every worker and
    /// join its thread. The runtime itself never calls `std::process::exit`
    /// -- teardown always returns control to the caller.
    pub fn shutdown(self) {
        for worker in self.workers {
            let id = worker.id();
            worker.shutdown();
            log::info!("worker {id} stopped");
        }
    }

    fn run_local<T, F>(&mut self, x: &EVector<T, R>, y: Option<&EVector<T, R>>, op: F) -> EVector<T, R>
    where
        T: ShareInt,
        Set<R, P8, P16, P32, P64, P128>: WidthOf<T, R>,
        F: Fn(&<Set<R, P8, P16, P32, P64, P128> as WidthOf<T, R>>::Proto, &EVector<T, R>, Option<&EVector<T, R>>) -> EVector<T, R>
            + Clone
            + Send
            + 'static,
    {
        let total = x.size();
        let bounds = self.batch_bounds(total);
        let (tx, rx) = mpsc::channel();
        for (worker, (start, end)) in self.workers.iter().zip(bounds.iter().copied()) {
            let x_window = window(x, start, end);
            let y_window = y.map(|y| window(y, start, end));
            let op = op.clone();
            let tx = tx.clone();
            worker.submit(Box::new(move |_comm, protocols| {
                let proto = WidthOf::<T, R>::proto(protocols);
                let result = op(proto, &x_window, y_window.as_ref());
                let _ = tx.send((start, result));
            }));
        }
        drop(tx);
        self.barrier.wait();
        let mut parts: Vec<(usize, EVector<T, R>)> = rx.try_iter().collect();
        parts.sort_by_key(|(start, _)| *start);
        concat_evectors(parts.into_iter().map(|(_, v)| v).collect())
    }

    fn run_network<T, F>(&mut self, x: &EVector<T, R>, y: Option<&EVector<T, R>>, op: F) -> Result<EVector<T, R>>
    where
        T: ShareInt,
        Set<R, P8, P16, P32, P64, P128>: WidthOf<T, R>,
        F: Fn(&mut <Set<R, P8, P16, P32, P64, P128> as WidthOf<T, R>>::Proto, &mut C, &EVector<T, R>, Option<&EVector<T, R>>) -> Result<EVector<T, R>>
            + Clone
            + Send
            + 'static,
    {
        let total = x.size();
        let bounds = self.batch_bounds(total);
        let (tx, rx) = mpsc::channel();
        for (worker, (start, end)) in self.workers.iter().zip(bounds.iter().copied()) {
            let x_window = window(x, start, end);
            let y_window = y.map(|y| window(y, start, end));
            let op = op.clone();
            let tx = tx.clone();
            worker.submit(Box::new(move |comm, protocols| {
                let proto = WidthOf::<T, R>::proto(protocols);
                let result = op(proto, comm, &x_window, y_window.as_ref());
                let _ = tx.send((start, result));
            }));
        }
        drop(tx);
        self.barrier.wait();
        let mut parts: Vec<(usize, Result<EVector<T, R>>)> = rx.try_iter().collect();
        parts.sort_by_key(|(start, _)| *start);
        let mut ok = Vec::with_capacity(parts.len());
        for (_, part) in parts {
            ok.push(part?);
        }
        Ok(concat_evectors(ok))
    }

    fn run_network_open<T, F>(&mut self, x: &EVector<T, R>, op: F) -> Result<Vector<T>>
    where
        T: ShareInt,
        Set<R, P8, P16, P32, P64, P128>: WidthOf<T, R>,
        F: Fn(&mut <Set<R, P8, P16, P32, P64, P128> as WidthOf<T, R>>::Proto, &mut C, &EVector<T, R>) -> Result<Vector<T>>
            + Clone
            + Send
            + 'static,
    {
        let total = x.size();
        let bounds = self.batch_bounds(total);
        let (tx, rx) = mpsc::channel();
        for (worker, (start, end)) in self.workers.iter().zip(bounds.iter().copied()) {
            let x_window = window(x, start, end);
            let op = op.clone();
            let tx = tx.clone();
            worker.submit(Box::new(move |comm, protocols| {
                let proto = WidthOf::<T, R>::proto(protocols);
                let result = op(proto, comm, &x_window);
                let _ = tx.send((start, result));
            }));
        }
        drop(tx);
        self.barrier.wait();
        let mut parts: Vec<(usize, Result<Vector<T>>)> = rx.try_iter().collect();
        parts.sort_by_key(|(start, _)| *start);
        let mut ok = Vec::with_capacity(parts.len());
        for (_, part) in parts {
            ok.push(part?);
        }
        Ok(concat_vectors(ok))
    }

    // -- local (no-network) dispatch --------------------------------------

    pub fn add_a<T: ShareInt>(&mut self, x: &EVector<T, R>, y: &EVector<T, R>) -> EVector<T, R>
    where
        Set<R, P8, P16, P32, P64, P128>: WidthOf<T, R>,
    {
        self.run_local(x, Some(y), |p, x, y| p.add_a(x, y.unwrap()))
    }

    pub fn sub_a<T: ShareInt>(&mut self, x: &EVector<T, R>, y: &EVector<T, R>) -> EVector<T, R>
    where
        Set<R, P8, P16, P32, P64, P128>: WidthOf<T, R>,
    {
        self.run_local(x, Some(y), |p, x, y| p.sub_a(x, y.unwrap()))
    }

    pub fn neg_a<T: ShareInt>(&mut self, x: &EVector<T, R>) -> EVector<T, R>
    where
        Set<R, P8, P16, P32, P64, P128>: WidthOf<T, R>,
    {
        self.run_local(x, None, |p, x, _| p.neg_a(x))
    }

    pub fn xor_b<T: ShareInt>(&mut self, x: &EVector<T, R>, y: &EVector<T, R>) -> EVector<T, R>
    where
        Set<R, P8, P16, P32, P64, P128>: WidthOf<T, R>,
    {
        self.run_local(x, Some(y), |p, x, y| p.xor_b(x, y.unwrap()))
    }

    pub fn not_b<T: ShareInt>(&mut self, x: &EVector<T, R>) -> EVector<T, R>
    where
        Set<R, P8, P16, P32, P64, P128>: WidthOf<T, R>,
    {
        self.run_local(x, None, |p, x, _| p.not_b(x))
    }

    pub fn not_b_1<T: ShareInt>(&mut self, x: &EVector<T, R>) -> EVector<T, R>
    where
        Set<R, P8, P16, P32, P64, P128>: WidthOf<T, R>,
    {
        self.run_local(x, None, |p, x, _| p.not_b_1(x))
    }

    pub fn div_const_a<T: ShareInt>(&mut self, x: &EVector<T, R>, c: T) -> EVector<T, R>
    where
        Set<R, P8, P16, P32, P64, P128>: WidthOf<T, R>,
    {
        self.run_local(x, None, move |p, x, _| p.div_const_a(x, c))
    }

    // -- network dispatch ---------------------------------------------------

    pub fn multiply_a<T: ShareInt>(&mut self, x: &EVector<T, R>, y: &EVector<T, R>) -> Result<EVector<T, R>>
    where
        Set<R, P8, P16, P32, P64, P128>: WidthOf<T, R>,
    {
        self.run_network(x, Some(y), |p, comm, x, y| p.multiply_a(comm, x, y.unwrap()))
    }

    pub fn and_b<T: ShareInt>(&mut self, x: &EVector<T, R>, y: &EVector<T, R>) -> Result<EVector<T, R>>
    where
        Set<R, P8, P16, P32, P64, P128>: WidthOf<T, R>,
    {
        self.run_network(x, Some(y), |p, comm, x, y| p.and_b(comm, x, y.unwrap()))
    }

    pub fn reshare<T: ShareInt>(&mut self, x: &EVector<T, R>, binary: bool) -> Result<EVector<T, R>>
    where
        Set<R, P8, P16, P32, P64, P128>: WidthOf<T, R>,
    {
        self.run_network(x, None, move |p, comm, x, _| p.reshare(comm, x, binary))
    }

    pub fn redistribute_shares_b<T: ShareInt>(&mut self, x: &EVector<T, R>) -> Result<EVector<T, R>>
    where
        Set<R, P8, P16, P32, P64, P128>: WidthOf<T, R>,
    {
        self.run_network(x, None, |p, comm, x, _| p.redistribute_shares_b(comm, x))
    }

    pub fn ltz<T: ShareInt>(&mut self, x: &EVector<T, R>) -> Result<EVector<T, R>>
    where
        Set<R, P8, P16, P32, P64, P128>: WidthOf<T, R>,
    {
        self.run_network(x, None, |p, comm, x, _| p.ltz(comm, x))
    }

    pub fn b2a_bit<T: ShareInt>(&mut self, x: &EVector<T, R>) -> Result<EVector<T, R>>
    where
        Set<R, P8, P16, P32, P64, P128>: WidthOf<T, R>,
    {
        self.run_network(x, None, |p, comm, x, _| p.b2a_bit(comm, x))
    }

    pub fn div_const_a_corrected<T: ShareInt>(&mut self, x: &EVector<T, R>, c: T) -> Result<EVector<T, R>>
    where
        Set<R, P8, P16, P32, P64, P128>: WidthOf<T, R>,
    {
        self.run_network(x, None, move |p, comm, x, _| p.div_const_a_corrected(comm, x, c))
    }

    pub fn reconstruct_from_a<T: ShareInt>(&mut self, x: &EVector<T, R>) -> Result<Vector<T>>
    where
        Set<R, P8, P16, P32, P64, P128>: WidthOf<T, R>,
    {
        self.run_network_open(x, |p, comm, x| p.reconstruct_from_a(comm, x))
    }

    pub fn reconstruct_from_b<T: ShareInt>(&mut self, x: &EVector<T, R>) -> Result<Vector<T>>
    where
        Set<R, P8, P16, P32, P64, P128>: WidthOf<T, R>,
    {
        self.run_network_open(x, |p, comm, x| p.reconstruct_from_b(comm, x))
    }

    pub fn open_shares_a<T: ShareInt>(&mut self, x: &EVector<T, R>) -> Result<Vector<T>>
    where
        Set<R, P8, P16, P32, P64, P128>: WidthOf<T, R>,
    {
        self.run_network_open(x, |p, comm, x| p.open_shares_a(comm, x))
    }

    pub fn open_shares_b<T: ShareInt>(&mut self, x: &EVector<T, R>) -> Result<Vector<T>>
    where
        Set<R, P8, P16, P32, P64, P128>: WidthOf<T, R>,
    {
        self.run_network_open(x, |p, comm, x| p.open_shares_b(comm, x))
    }

    /// Pre-draw `n` Beaver triples per worker ahead of a batch of
    /// multiplications. Unlike the other network dispatches this assigns
    /// the same `n` to every worker as a single call -- no per-worker
    /// `batch_bounds` windowing -- since pooled triple generation has a
    /// high fixed per-call overhead that sub-chunking would multiply out.
    /// Plaintext and honest-majority protocols that need no triples accept
    /// this as a no-op.
    pub fn reserve_triples<T: ShareInt>(&mut self, n: usize, binary: bool) -> Result<()>
    where
        Set<R, P8, P16, P32, P64, P128>: WidthOf<T, R>,
    {
        let (tx, rx) = mpsc::channel();
        for worker in &self.workers {
            let tx = tx.clone();
            worker.submit(Box::new(move |comm, protocols| {
                let proto = WidthOf::<T, R>::proto(protocols);
                let result = proto.reserve_triples(comm, n, binary);
                let _ = tx.send(result);
            }));
        }
        drop(tx);
        self.barrier.wait();
        for result in rx.try_iter() {
            result?;
        }
        Ok(())
    }

    /// Aggregate dot product: elementwise multiply, then sum every
    /// worker's partial sum into a single scalar. Unlike the other
    /// network dispatches this doesn't concatenate per-batch outputs --
    /// each batch already reduces to one element, and those are summed
    /// again locally across workers.
    pub fn dot_product_a<T: ShareInt>(&mut self, x: &EVector<T, R>, y: &EVector<T, R>) -> Result<EVector<T, R>>
    where
        Set<R, P8, P16, P32, P64, P128>: WidthOf<T, R>,
    {
        let partials = self.run_network(x, Some(y), |p, comm, x, y| p.dot_product_a(comm, x, y.unwrap()))?;
        // `run_network` already concatenated one scalar per worker batch;
        // one more local `add_a` fold reduces that to the final scalar.
        let n = partials.size();
        if n <= 1 {
            return Ok(partials);
        }
        let mut acc = window(&partials, 0, 1);
        for i in 1..n {
            acc = self.run_local(&acc, Some(&window(&partials, i, i + 1)), |p, a, b| p.add_a(a, b.unwrap()));
        }
        Ok(acc)
    }

    /// Secret-share a plaintext vector known to `owner` (a party rank, not
    /// a worker index) across the protocol. Only the owner's call passes
    /// `Some(plain)`; other parties pass `None` and receive their shares
    /// over the network.
    pub fn secret_share_a<T: ShareInt>(&mut self, owner: usize, plain: Option<&Vector<T>>, n: usize) -> Result<EVector<T, R>>
    where
        Set<R, P8, P16, P32, P64, P128>: WidthOf<T, R>,
    {
        self.secret_share(owner, plain, n, false)
    }

    pub fn secret_share_b<T: ShareInt>(&mut self, owner: usize, plain: Option<&Vector<T>>, n: usize) -> Result<EVector<T, R>>
    where
        Set<R, P8, P16, P32, P64, P128>: WidthOf<T, R>,
    {
        self.secret_share(owner, plain, n, true)
    }

    fn secret_share<T: ShareInt>(&mut self, owner: usize, plain: Option<&Vector<T>>, n: usize, binary: bool) -> Result<EVector<T, R>>
    where
        Set<R, P8, P16, P32, P64, P128>: WidthOf<T, R>,
    {
        let bounds = self.batch_bounds(n);
        let (tx, rx) = mpsc::channel();
        for (worker, (start, end)) in self.workers.iter().zip(bounds.iter().copied()) {
            let window_plain = plain.map(|p| p.windowed(start, end));
            let batch_len = end - start;
            let tx = tx.clone();
            worker.submit(Box::new(move |comm, protocols| {
                let proto = WidthOf::<T, R>::proto(protocols);
                let result = proto.secret_share(comm, owner, window_plain.as_ref(), batch_len, binary);
                let _ = tx.send((start, result));
            }));
        }
        drop(tx);
        self.barrier.wait();
        let mut parts: Vec<(usize, Result<EVector<T, R>>)> = rx.try_iter().collect();
        parts.sort_by_key(|(start, _)| *start);
        let mut ok = Vec::with_capacity(parts.len());
        for (_, part) in parts {
            ok.push(part?);
        }
        Ok(concat_evectors(ok))
    }

    pub fn public_share<T: ShareInt>(&mut self, plain: &Vector<T>) -> EVector<T, R>
    where
        Set<R, P8, P16, P32, P64, P128>: WidthOf<T, R>,
    {
        let bounds = self.batch_bounds(plain.size());
        let (tx, rx) = mpsc::channel();
        for (worker, (start, end)) in self.workers.iter().zip(bounds.iter().copied()) {
            let window_plain = plain.windowed(start, end);
            let tx = tx.clone();
            worker.submit(Box::new(move |_comm, protocols| {
                let proto = WidthOf::<T, R>::proto(protocols);
                let result = proto.public_share(&window_plain);
                let _ = tx.send((start, result));
            }));
        }
        drop(tx);
        self.barrier.wait();
        let mut parts: Vec<(usize, EVector<T, R>)> = rx.try_iter().collect();
        parts.sort_by_key(|(start, _)| *start);
        concat_evectors(parts.into_iter().map(|(_, v)| v).collect())
    }

    /// Run the malicious-security consistency check on every worker (a
    /// no-op returning `Ok(true)` for non-malicious protocol variants) and
    /// fold the results with a logical AND. Any worker reporting `false`
    /// aborts the whole run -- per-width malicious checks never partially
    /// apply.
    pub fn malicious_check<T: ShareInt>(&mut self) -> Result<()>
    where
        Set<R, P8, P16, P32, P64, P128>: WidthOf<T, R>,
    {
        let (tx, rx) = mpsc::channel();
        for worker in &self.workers {
            let tx = tx.clone();
            worker.submit(Box::new(move |comm, protocols| {
                let proto = WidthOf::<T, R>::proto(protocols);
                let result = proto.malicious_check(comm);
                let _ = tx.send(result);
            }));
        }
        drop(tx);
        self.barrier.wait();
        let mut suspects = Vec::new();
        for (rank, result) in rx.try_iter().enumerate() {
            if !result? {
                suspects.push(rank);
            }
        }
        if suspects.is_empty() {
            Ok(())
        } else {
            log::error!("malicious check failed, suspected workers: {suspects:?}");
            Err(MpcError::MaliciousAbort { suspects })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_batch_size_floors_at_minimum_chunk_size() {
        assert_eq!(resolve_batch_size(100, -12), MINIMUM_CHUNK_SIZE);
        assert_eq!(resolve_batch_size(100_000, -1), 100_000);
    }

    #[test]
    fn resolve_batch_size_accepts_a_literal_positive_size() {
        assert_eq!(resolve_batch_size(10_000, 512), 512);
    }
}
