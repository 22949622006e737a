//! Bounded pipeline queue.
//!
//! A thin typed facade over a bounded crossbeam channel with the pipeline's
//! asymmetric contract: producers never block (a full queue is an immediate
//! refusal, the caller keeps the item), consumers always block. Shutdown is
//! a sentinel item per consumer rather than a channel close, so the queue
//! stays open for late producers whose submissions simply go nowhere once
//! the consumers are gone.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

/// Fixed-capacity FIFO shared between pipeline stages. Cloning shares the
/// same underlying channel; any clone may produce or consume.
#[derive(Clone)]
pub struct BoundedQueue<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
    capacity: usize,
}

impl<T> BoundedQueue<T> {
    /// Create a queue holding at most `capacity` items.
    ///
    /// # Panics
    ///
    /// Panics when `capacity` is zero; a zero-capacity pipeline queue
    /// could never hand an item from producer to consumer without both
    /// blocking, which the contract forbids.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be at least 1");
        let (tx, rx) = bounded(capacity);
        Self { tx, rx, capacity }
    }

    /// Non-blocking enqueue. A full queue returns the item to the caller,
    /// which decides whether to drop or retry; the queue never blocks a
    /// producer.
    pub fn try_enqueue(&self, item: T) -> Result<(), T> {
        match self.tx.try_send(item) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(item)) | Err(TrySendError::Disconnected(item)) => Err(item),
        }
    }

    /// Blocking enqueue. Reserved for shutdown sentinels, which must reach
    /// a draining consumer even when the queue is momentarily full.
    pub fn enqueue_blocking(&self, item: T) {
        // Both halves live in this struct, so the channel cannot be
        // disconnected while `self` exists.
        let _ = self.tx.send(item);
    }

    /// Blocking dequeue. Returns when an item is available; never returns
    /// an empty result while the queue exists.
    pub fn dequeue(&self) -> T {
        self.rx
            .recv()
            .expect("queue disconnected with a receiver still alive")
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.rx.len() >= self.capacity
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
