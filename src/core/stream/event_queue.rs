// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Event Queue
//!
//! Unbounded multi-producer queue between reader callback threads and the
//! ingestion worker.
//!
//! ```text
//! driver thread(s) ──enqueue──▶ EventQueue ──dequeue(timeout)──▶ IngestionLoop
//! ```
//!
//! `enqueue` never blocks. `dequeue` waits at most the given timeout so the
//! consumer can notice shutdown between polls.

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use crossbeam_utils::CachePadded;
use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Thread-safe unbounded FIFO
pub struct EventQueue<T> {
    sender: Sender<T>,
    receiver: Receiver<T>,
    enqueued: Arc<CachePadded<AtomicU64>>,
}

impl<T> Debug for EventQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventQueue")
            .field("len", &self.receiver.len())
            .field("enqueued", &self.enqueued.load(Ordering::Relaxed))
            .finish()
    }
}

impl<T: Send> Default for EventQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send> EventQueue<T> {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            sender,
            receiver,
            enqueued: Arc::new(CachePadded::new(AtomicU64::new(0))),
        }
    }

    /// Append an item. Never blocks.
    pub fn enqueue(&self, item: T) {
        push(&self.sender, &self.enqueued, item);
    }

    /// Wait up to `timeout` for the next item
    ///
    /// Returns `None` when nothing arrived in time.
    pub fn dequeue(&self, timeout: Duration) -> Option<T> {
        match self.receiver.recv_timeout(timeout) {
            Ok(item) => Some(item),
            Err(RecvTimeoutError::Timeout) => None,
            // The queue owns a sender, so this cannot happen while `self` is alive
            Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Take the next item if one is already queued
    pub fn try_dequeue(&self) -> Option<T> {
        match self.receiver.try_recv() {
            Ok(item) => Some(item),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Cheap cloneable handle for producer threads
    pub fn producer(&self) -> QueueProducer<T> {
        QueueProducer {
            sender: self.sender.clone(),
            enqueued: Arc::clone(&self.enqueued),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Items enqueued over the queue's lifetime
    #[inline]
    pub fn total_enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }
}

/// Producer side of an [`EventQueue`]
pub struct QueueProducer<T> {
    sender: Sender<T>,
    enqueued: Arc<CachePadded<AtomicU64>>,
}

impl<T> Clone for QueueProducer<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            enqueued: Arc::clone(&self.enqueued),
        }
    }
}

impl<T> Debug for QueueProducer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueProducer")
            .field("enqueued", &self.enqueued.load(Ordering::Relaxed))
            .finish()
    }
}

impl<T> QueueProducer<T> {
    /// Append an item. Never blocks.
    pub fn enqueue(&self, item: T) {
        push(&self.sender, &self.enqueued, item);
    }
}

fn push<T>(sender: &Sender<T>, enqueued: &CachePadded<AtomicU64>, item: T) {
    match sender.send(item) {
        Ok(()) => {
            enqueued.fetch_add(1, Ordering::Relaxed);
        }
        Err(_) => {
            // Only reachable once the queue itself has been dropped
            log::warn!("[EventQueue] Consumer side dropped, discarding item");
        }
    }
}
