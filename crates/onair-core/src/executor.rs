// crates/onair-core/src/executor.rs
//
// Generic single-consumer task queue: a background thread draining an
// unbounded crossbeam channel of boxed closures, one at a time, in
// submission order. Two things in the engine are built on this:
//
//   - The Stage queue (one per channel). Every Layer mutation and every
//     tick's layer-assembly step is a closure submitted here, so two
//     stage ops are never interleaved and a tick never observes a
//     half-applied op (Stage §4.4's "all public operations on Stage
//     complete-ordered via that queue" invariant).
//   - The mixer device thread (one per process). GPU allocations,
//     draws and readbacks would all serialize through an instance of
//     this in a real accelerator backend.
//
// A single-threaded command queue draining a channel of boxed closures
// is the standard shape for this kind of serialization point: submit a
// closure, get a `Reply` back, and whatever thread drains the channel
// is the only place state actually mutates.

use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Sender};
use log::debug;

use crate::error::ShuttingDown;
use crate::future::Reply;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A named, single-threaded task queue.
pub struct TaskQueue {
    name: String,
    tx: Option<Sender<Job>>,
    handle: Option<JoinHandle<()>>,
}

impl TaskQueue {
    /// Spawn the background thread and return a handle to submit work to it.
    pub fn spawn(name: impl Into<String>) -> Self {
        let name = name.into();
        let (tx, rx) = unbounded::<Job>();
        let thread_name = name.clone();
        let handle = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                debug!("task queue '{thread_name}' started");
                for job in rx {
                    job();
                }
                debug!("task queue '{thread_name}' drained and exiting");
            })
            .expect("failed to spawn task queue thread");

        Self {
            name,
            tx: Some(tx),
            handle: Some(handle),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Submit a closure and get back a `Reply` resolving to its return value.
    ///
    /// Returns `Err(ShuttingDown)` without running `job` if the queue has
    /// already been shut down — callers fail a "queue shutting down"
    /// error rather than hang.
    pub fn submit<F, T>(&self, job: F) -> Result<Reply<T>, ShuttingDown>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let tx = self.tx.as_ref().ok_or(ShuttingDown)?;
        let (reply_tx, reply) = Reply::new();
        let sent = tx.send(Box::new(move || {
            reply_tx.send(job());
        }));
        sent.map_err(|_| ShuttingDown)?;
        Ok(reply)
    }

    /// Fire-and-forget submission — used for ops whose caller doesn't
    /// need the result (e.g. a tick's internal housekeeping).
    pub fn submit_detached<F>(&self, job: F) -> Result<(), ShuttingDown>
    where
        F: FnOnce() + Send + 'static,
    {
        let tx = self.tx.as_ref().ok_or(ShuttingDown)?;
        tx.send(Box::new(job)).map_err(|_| ShuttingDown)
    }

    /// Stop accepting new work and drop the sender so the background
    /// thread drains whatever is queued, then exits. Blocks until it has.
    pub fn shutdown(&mut self) {
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.tx.is_none()
    }
}

impl Drop for TaskQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn submitted_jobs_run_in_order() {
        let q = TaskQueue::spawn("test");
        let counter = Arc::new(AtomicUsize::new(0));
        let mut replies = Vec::new();
        for expected in 0..100 {
            let counter = Arc::clone(&counter);
            replies.push(
                q.submit(move || counter.fetch_add(1, Ordering::SeqCst) == expected)
                    .unwrap(),
            );
        }
        for r in replies {
            assert!(r.wait(), "jobs must observe monotonically increasing order");
        }
    }

    #[test]
    fn shutdown_rejects_new_submissions() {
        let mut q = TaskQueue::spawn("test");
        q.shutdown();
        assert!(q.submit(|| 1).is_err());
    }

    #[test]
    fn pending_jobs_complete_before_shutdown_returns() {
        let q = TaskQueue::spawn("test");
        let flag = Arc::new(AtomicUsize::new(0));
        let flag2 = Arc::clone(&flag);
        q.submit_detached(move || {
            std::thread::sleep(std::time::Duration::from_millis(10));
            flag2.store(1, Ordering::SeqCst);
        })
        .unwrap();
        drop(q);
        assert_eq!(flag.load(Ordering::SeqCst), 1);
    }
}
