// src/relay.rs
//
// Bounded FIFO relay between the reader thread and the session sink.
// A full queue blocks the producer (backpressure into the serial read
// loop); an empty queue blocks the consumer on a condition variable.
// Dropping either handle closes the relay and unblocks the other side.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// Default number of in-flight lines.
pub const DEFAULT_CAPACITY: usize = 20;

/// Result of a dequeue attempt.
#[derive(Debug, PartialEq, Eq)]
pub enum Dequeued {
    /// Next line in FIFO order.
    Line(String),
    /// Producer side is gone and the queue is drained.
    Closed,
    /// No line arrived within the timeout (only from `dequeue_timeout`).
    TimedOut,
}

/// Error returned by `enqueue` once the consumer side is gone.
#[derive(Debug, PartialEq, Eq)]
pub struct RelayClosed;

impl std::fmt::Display for RelayClosed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "relay closed")
    }
}

struct Inner {
    slots: VecDeque<String>,
    closed: bool,
}

struct Shared {
    inner: Mutex<Inner>,
    capacity: usize,
    not_empty: Condvar,
    not_full: Condvar,
}

impl Shared {
    // Recover the guard when a peer thread panicked while holding the lock
    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn close(&self) {
        let mut inner = self.lock();
        inner.closed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }
}

/// Create a bounded relay split into its producer and consumer handles.
/// The session owns both ends and hands them to the reader thread and the
/// sink explicitly — there is no process-wide queue registry.
pub fn bounded(capacity: usize) -> (RelayProducer, RelayConsumer) {
    assert!(capacity > 0, "relay capacity must be at least 1");
    let shared = Arc::new(Shared {
        inner: Mutex::new(Inner {
            slots: VecDeque::with_capacity(capacity),
            closed: false,
        }),
        capacity,
        not_empty: Condvar::new(),
        not_full: Condvar::new(),
    });
    (
        RelayProducer {
            shared: shared.clone(),
        },
        RelayConsumer { shared },
    )
}

/// Producer handle: owned by the reader thread.
pub struct RelayProducer {
    shared: Arc<Shared>,
}

impl RelayProducer {
    /// Enqueue a line, blocking while the relay is full.
    /// Fails only when the consumer side has been dropped; a full relay
    /// never errors and never drops the line.
    pub fn enqueue(&self, line: String) -> Result<(), RelayClosed> {
        let mut inner = self.shared.lock();
        while inner.slots.len() >= self.shared.capacity {
            if inner.closed {
                return Err(RelayClosed);
            }
            inner = self
                .shared
                .not_full
                .wait(inner)
                .unwrap_or_else(|e| e.into_inner());
        }
        if inner.closed {
            return Err(RelayClosed);
        }
        inner.slots.push_back(line);
        self.shared.not_empty.notify_one();
        Ok(())
    }
}

impl Drop for RelayProducer {
    fn drop(&mut self) {
        self.shared.close();
    }
}

/// Consumer handle: owned by the session sink.
pub struct RelayConsumer {
    shared: Arc<Shared>,
}

impl RelayConsumer {
    /// Dequeue the next line, blocking until one is available.
    /// Lines enqueued before producer closure are still delivered;
    /// `Closed` is returned only once the queue is drained.
    pub fn dequeue(&self) -> Dequeued {
        let mut inner = self.shared.lock();
        loop {
            if let Some(line) = inner.slots.pop_front() {
                self.shared.not_full.notify_one();
                return Dequeued::Line(line);
            }
            if inner.closed {
                return Dequeued::Closed;
            }
            inner = self
                .shared
                .not_empty
                .wait(inner)
                .unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Like `dequeue`, but gives up after `timeout` with `TimedOut`.
    /// Used to bound the "transport stalled with no data and no closure
    /// signal" case.
    pub fn dequeue_timeout(&self, timeout: Duration) -> Dequeued {
        let deadline = Instant::now() + timeout;
        let mut inner = self.shared.lock();
        loop {
            if let Some(line) = inner.slots.pop_front() {
                self.shared.not_full.notify_one();
                return Dequeued::Line(line);
            }
            if inner.closed {
                return Dequeued::Closed;
            }
            let now = Instant::now();
            if now >= deadline {
                return Dequeued::TimedOut;
            }
            let (guard, _) = self
                .shared
                .not_empty
                .wait_timeout(inner, deadline - now)
                .unwrap_or_else(|e| e.into_inner());
            inner = guard;
        }
    }
}

impl Drop for RelayConsumer {
    fn drop(&mut self) {
        self.shared.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;

    #[test]
    fn test_fifo_order() {
        let (producer, consumer) = bounded(8);

        for i in 0..5 {
            producer.enqueue(format!("line{}", i)).unwrap();
        }
        for i in 0..5 {
            assert_eq!(consumer.dequeue(), Dequeued::Line(format!("line{}", i)));
        }
    }

    #[test]
    fn test_drains_before_reporting_closed() {
        let (producer, consumer) = bounded(4);

        producer.enqueue("a".to_string()).unwrap();
        producer.enqueue("b".to_string()).unwrap();
        drop(producer);

        assert_eq!(consumer.dequeue(), Dequeued::Line("a".to_string()));
        assert_eq!(consumer.dequeue(), Dequeued::Line("b".to_string()));
        assert_eq!(consumer.dequeue(), Dequeued::Closed);
        assert_eq!(consumer.dequeue(), Dequeued::Closed);
    }

    #[test]
    fn test_enqueue_blocks_when_full() {
        let (producer, consumer) = bounded(2);
        let (done_tx, done_rx) = mpsc::channel();

        let handle = thread::spawn(move || {
            for i in 0..3 {
                producer.enqueue(format!("line{}", i)).unwrap();
                done_tx.send(i).unwrap();
            }
        });

        // First two enqueues fit within capacity
        assert_eq!(done_rx.recv_timeout(Duration::from_secs(1)).unwrap(), 0);
        assert_eq!(done_rx.recv_timeout(Duration::from_secs(1)).unwrap(), 1);
        // Third blocks until a slot frees
        assert!(done_rx.recv_timeout(Duration::from_millis(100)).is_err());

        assert_eq!(consumer.dequeue(), Dequeued::Line("line0".to_string()));
        assert_eq!(done_rx.recv_timeout(Duration::from_secs(1)).unwrap(), 2);
        handle.join().unwrap();

        // The blocked line was neither dropped nor reordered
        assert_eq!(consumer.dequeue(), Dequeued::Line("line1".to_string()));
        assert_eq!(consumer.dequeue(), Dequeued::Line("line2".to_string()));
    }

    #[test]
    fn test_enqueue_fails_after_consumer_drop() {
        let (producer, consumer) = bounded(2);
        drop(consumer);

        assert_eq!(producer.enqueue("x".to_string()), Err(RelayClosed));
    }

    #[test]
    fn test_consumer_drop_unblocks_full_producer() {
        let (producer, consumer) = bounded(1);
        producer.enqueue("fill".to_string()).unwrap();

        let handle = thread::spawn(move || producer.enqueue("blocked".to_string()));

        thread::sleep(Duration::from_millis(50));
        drop(consumer);

        assert_eq!(handle.join().unwrap(), Err(RelayClosed));
    }

    #[test]
    fn test_producer_drop_unblocks_waiting_consumer() {
        let (producer, consumer) = bounded(2);

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            drop(producer);
        });

        assert_eq!(consumer.dequeue(), Dequeued::Closed);
        handle.join().unwrap();
    }

    #[test]
    fn test_dequeue_timeout_on_idle_relay() {
        let (_producer, consumer) = bounded(2);

        let start = Instant::now();
        let result = consumer.dequeue_timeout(Duration::from_millis(50));

        assert_eq!(result, Dequeued::TimedOut);
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_dequeue_timeout_returns_available_line() {
        let (producer, consumer) = bounded(2);
        producer.enqueue("ready".to_string()).unwrap();

        assert_eq!(
            consumer.dequeue_timeout(Duration::from_millis(50)),
            Dequeued::Line("ready".to_string())
        );
    }
}
