// crates/onair-core/src/future.rs
//
// `Reply<T>` is a one-shot, blocking handle to a value produced on
// another thread. Nothing in this workspace reaches for an async
// runtime at this layer (the stage queue, the mixer device thread and
// the output fan-out all hand work off to a background thread and hand
// the caller something to block on), so `Reply` is a thin wrapper over
// a one-shot `crossbeam_channel` rather than a boxed future.
//
// Every stage op, mixer render call and consumer send in the engine
// returns one of these. Dropping a `Reply` without waiting on it is
// fine: the producing side still runs to completion on the queue
// regardless of whether anyone is waiting on the result.

use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};

/// The writable half, held by whoever is doing the work.
pub struct ReplySender<T> {
    tx: Sender<T>,
}

impl<T> ReplySender<T> {
    /// Fulfil the reply. A dropped receiver (the caller gave up) is not
    /// an error here — the result is simply discarded.
    pub fn send(self, value: T) {
        let _ = self.tx.send(value);
    }
}

/// The readable half, handed back to the caller.
pub struct Reply<T> {
    rx: Receiver<T>,
}

impl<T> Reply<T> {
    /// Create a linked (sender, reply) pair. Capacity 1: exactly one
    /// value is ever produced.
    pub fn new() -> (ReplySender<T>, Reply<T>) {
        let (tx, rx) = bounded(1);
        (ReplySender { tx }, Reply { rx })
    }

    /// A reply that is already resolved — useful for fast paths that
    /// don't need to cross a thread boundary (e.g. an empty-producer
    /// frame request).
    pub fn ready(value: T) -> Reply<T> {
        let (tx, rx) = Reply::new();
        tx.send(value);
        rx
    }

    /// Block until the value is available.
    ///
    /// Panics if the sender was dropped without sending — that is a
    /// programming error in the engine (every code path that creates a
    /// `ReplySender` must eventually call `.send()`), not a condition
    /// callers should be asked to handle.
    pub fn wait(self) -> T {
        self.rx.recv().expect("Reply sender dropped without a value")
    }

    /// Block up to `timeout`, used by the output fan-out's per-consumer
    /// deadline (`2 * frame_duration`).
    pub fn wait_timeout(self, timeout: Duration) -> Result<T, ReplyTimeout> {
        match self.rx.recv_timeout(timeout) {
            Ok(v) => Ok(v),
            Err(RecvTimeoutError::Timeout) => Err(ReplyTimeout::TimedOut),
            Err(RecvTimeoutError::Disconnected) => Err(ReplyTimeout::Disconnected),
        }
    }

    /// Non-blocking poll, for code that wants to check readiness without
    /// consuming the reply.
    pub fn try_get(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyTimeout {
    TimedOut,
    Disconnected,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn ready_reply_resolves_immediately() {
        let r = Reply::ready(42);
        assert_eq!(r.wait(), 42);
    }

    #[test]
    fn sender_on_another_thread_is_observed() {
        let (tx, rx) = Reply::<i32>::new();
        thread::spawn(move || tx.send(7)).join().unwrap();
        assert_eq!(rx.wait(), 7);
    }

    #[test]
    fn wait_timeout_fires_when_nobody_sends() {
        let (_tx, rx) = Reply::<i32>::new();
        let err = rx.wait_timeout(Duration::from_millis(5)).unwrap_err();
        assert_eq!(err, ReplyTimeout::TimedOut);
    }
}
