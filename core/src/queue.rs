use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

type Task = Box<dyn FnOnce() + Send + 'static>;

struct State {
    queue: VecDeque<Task>,
    /// Tasks submitted but not yet completed, including tasks still queued.
    pending: usize,
    shutdown: bool,
}

struct Shared {
    state: Mutex<State>,
    work_ready: Condvar,
    all_done: Condvar,
}

/// Fixed pool of worker threads executing submitted tasks in FIFO order.
///
/// Tasks may submit further tasks from inside the pool; `finish` accounts for
/// that transitively because a task's pending slot is released only after any
/// work it spawned has already been counted.
pub struct WorkQueue {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkQueue {
    /// Spawn a pool of `workers` threads. A requested size of zero is clamped
    /// to one.
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        let shared = Arc::new(Shared {
            state: Mutex::new(State { queue: VecDeque::new(), pending: 0, shutdown: false }),
            work_ready: Condvar::new(),
            all_done: Condvar::new(),
        });
        let handles = (0..workers)
            .map(|id| {
                let shared = Arc::clone(&shared);
                thread::Builder::new()
                    .name(format!("worker-{id}"))
                    .spawn(move || worker_loop(&shared))
                    .expect("spawn worker thread")
            })
            .collect();
        tracing::debug!(workers, "work queue started");
        Self { shared, workers: Mutex::new(handles) }
    }

    /// Enqueue a task and wake one idle worker. Safe to call from a task
    /// running on the pool. Calling after `shutdown` is a contract violation.
    pub fn execute<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.shared.state.lock();
        assert!(!state.shutdown, "execute called after shutdown");
        state.queue.push_back(Box::new(task));
        state.pending += 1;
        self.shared.work_ready.notify_one();
    }

    /// Block until every submitted task, including tasks submitted by other
    /// tasks while this call is waiting, has completed.
    pub fn finish(&self) {
        let mut state = self.shared.state.lock();
        while state.pending > 0 {
            self.shared.all_done.wait(&mut state);
        }
    }

    /// Drain the queue gracefully and join all workers. Idempotent.
    pub fn shutdown(&self) {
        {
            let mut state = self.shared.state.lock();
            state.shutdown = true;
            self.shared.work_ready.notify_all();
        }
        let mut workers = self.workers.lock();
        for handle in workers.drain(..) {
            if handle.join().is_err() {
                tracing::error!("worker thread panicked");
            }
        }
    }
}

impl Drop for WorkQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(shared: &Shared) {
    loop {
        let task = {
            let mut state = shared.state.lock();
            loop {
                if let Some(task) = state.queue.pop_front() {
                    break task;
                }
                if state.shutdown {
                    return;
                }
                shared.work_ready.wait(&mut state);
            }
        };

        // A panicking task must not kill the worker or leak its pending slot.
        if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
            tracing::error!("task panicked");
        }

        let mut state = shared.state.lock();
        state.pending -= 1;
        if state.pending == 0 {
            shared.all_done.notify_all();
        }
    }
}
