//! The per-thread compute unit: one communicator, one set of per-width
//! protocol objects, a task queue drained by a single dedicated thread,
//! and a shared arrival barrier used to rendezvous with the runtime
//! between operations.
//!
//! Grounded in `kmprt17_mt::MultiThreadParty`'s thread-per-channel shape
//! (spawn a thread that owns its channel and
//! loops popping work off an `mpsc`-style queue) generalized with
//! `std::sync::Barrier` for the arrival-barrier rendezvous: every worker
//! calls [`std::sync::Barrier::wait`] as the first thing in its loop, so a
//! worker's return from the barrier both signals "previous task finished"
//! and blocks until every other worker (and the runtime thread driving
//! them) reaches the same point. The runtime submits a task to every
//! worker, notifies their condition variables, then waits on the same
//! barrier -- its `wait()` call returns only once every worker has looped
//! back around and reported in.

use std::collections::VecDeque;
use std::sync::{Arc, Barrier, Condvar, Mutex};
use std::thread::JoinHandle;

/// A unit of work handed to a worker thread: a closure given mutable access
/// to the thread's owned communicator and protocol-object set.
pub type Task<C, PS> = Box<dyn FnOnce(&mut C, &mut PS) + Send>;

enum Command<C, PS> {
    Run(Task<C, PS>),
    Terminate,
}

struct Queue<C, PS> {
    commands: Mutex<VecDeque<Command<C, PS>>>,
    cond: Condvar,
}

impl<C, PS> Queue<C, PS> {
    fn new() -> Self {
        Queue {
            commands: Mutex::new(VecDeque::new()),
            cond: Condvar::new(),
        }
    }
}

/// A single compute thread. `C` is the communicator type it owns; `PS` is
/// the bundle of per-width protocol objects (see
/// [`crate::runtime::ProtocolSet`]).
pub struct Worker<C, PS> {
    id: usize,
    queue: Arc<Queue<C, PS>>,
    handle: Option<JoinHandle<()>>,
}

impl<C: Send + 'static, PS: Send + 'static> Worker<C, PS> {
    /// A worker with no thread yet running; call [`Self::start`] to attach
    /// its owned resources and launch it.
    pub fn new(id: usize) -> Self {
        Worker {
            id,
            queue: Arc::new(Queue::new()),
            handle: None,
        }
    }

    /// This worker's index within the runtime's pool.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Attach the communicator and protocol-object set this worker owns
    /// for its whole lifetime, and launch its thread. `barrier` must be
    /// shared with every other worker in the pool and sized
    /// `num_workers + 1` (the `+1` is the runtime thread driving them).
    pub fn start(&mut self, mut comm: C, mut protocols: PS, barrier: Arc<Barrier>) {
        let queue = self.queue.clone();
        let handle = std::thread::spawn(move || loop {
            barrier.wait();
            let command = {
                let mut guard = queue.commands.lock().expect("worker queue poisoned");
                while guard.is_empty() {
                    guard = queue.cond.wait(guard).expect("worker condvar poisoned");
                }
                guard.pop_front().expect("queue non-empty under lock")
            };
            match command {
                Command::Run(task) => task(&mut comm, &mut protocols),
                Command::Terminate => break,
            }
        });
        self.handle = Some(handle);
    }

    /// Enqueue one task and wake the worker thread.
    pub fn submit(&self, task: Task<C, PS>) {
        let mut guard = self.queue.commands.lock().expect("worker queue poisoned");
        guard.push_back(Command::Run(task));
        self.queue.cond.notify_one();
    }

    /// Signal termination and join the thread. Consumes the worker: it has
    /// no further use once its thread has exited.
    pub fn shutdown(mut self) {
        {
            let mut guard = self.queue.commands.lock().expect("worker queue poisoned");
            guard.push_back(Command::Terminate);
        }
        self.queue.cond.notify_one();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Splits `[0, total)` into whole batches of `batch_size` assigned round-
/// robin-by-count across `threads` workers, with the first `remainder`
/// threads getting one extra batch and any leftover tail folded into the
/// last thread's range. Mirrors
/// `original_source/include/backend/common/runtime.h`'s
/// `get_thread_batch_boundaries`.
pub fn thread_batch_boundaries(total: usize, threads: usize, batch_size: usize) -> Vec<(usize, usize)> {
    if threads == 0 || total == 0 {
        return vec![(0, 0); threads];
    }
    let batch_size = batch_size.max(1);
    let whole_batches = total / batch_size;
    let base_batches_per_thread = whole_batches / threads;
    let remainder_batches = whole_batches % threads;
    let tail = total - whole_batches * batch_size;

    let mut bounds = Vec::with_capacity(threads);
    let mut cursor = 0usize;
    for t in 0..threads {
        let mut batches_for_thread = base_batches_per_thread;
        if t < remainder_batches {
            batches_for_thread += 1;
        }
        let mut end = cursor + batches_for_thread * batch_size;
        if t == threads - 1 {
            end += tail;
        }
        bounds.push((cursor, end));
        cursor = end;
    }
    bounds
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn submit_runs_the_task_on_the_worker_thread() {
        let barrier = Arc::new(Barrier::new(2));
        let mut worker: Worker<(), i32> = Worker::new(0);
        worker.start((), 0, barrier.clone());
        barrier.wait();

        let (tx, rx) = mpsc::channel();
        worker.submit(Box::new(move |_comm, protocols| {
            *protocols += 1;
            tx.send(*protocols).unwrap();
        }));
        barrier.wait();
        assert_eq!(rx.recv().unwrap(), 1);
        worker.shutdown();
    }

    #[test]
    fn thread_batch_boundaries_cover_the_whole_range_without_overlap() {
        let bounds = thread_batch_boundaries(1000, 3, 256);
        assert_eq!(bounds.first().unwrap().0, 0);
        assert_eq!(bounds.last().unwrap().1, 1000);
        for w in bounds.windows(2) {
            assert_eq!(w[0].1, w[1].0);
        }
    }

    #[test]
    fn thread_batch_boundaries_gives_every_thread_some_work_when_batches_outnumber_threads() {
        let bounds = thread_batch_boundaries(1024, 4, 256);
        assert_eq!(bounds, vec![(0, 256), (256, 512), (512, 768), (768, 1024)]);
    }
}
