//! Lock-free bounded queue between a transport and a logic thread
//!
//! Uses crossbeam-channel so any number of producers can submit without
//! blocking, and the consumer drains everything pending at the start of
//! its tick.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use crate::net::sink::SinkError;

pub struct Inbox<T> {
    /// Sender side - cloned to each producer
    sender: Sender<T>,
    /// Receiver side - used by the consumer
    receiver: Receiver<T>,
    capacity: usize,
}

impl<T> Inbox<T> {
    /// Capacity should cover the burst between two drains
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
        }
    }

    /// Create a new sender handle for a producer
    pub fn sender(&self) -> InboxSender<T> {
        InboxSender {
            sender: self.sender.clone(),
        }
    }

    /// Try to submit (non-blocking); false if the queue is full
    #[inline]
    pub fn try_submit(&self, item: T) -> bool {
        self.sender.try_send(item).is_ok()
    }

    /// Drain everything pending
    pub fn drain(&self) -> Vec<T> {
        self.receiver.try_iter().collect()
    }

    #[inline]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Clonable producer handle
pub struct InboxSender<T> {
    sender: Sender<T>,
}

impl<T> Clone for InboxSender<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<T> InboxSender<T> {
    /// Submit without blocking; `Full` is backpressure
    #[inline]
    pub fn try_send(&self, item: T) -> Result<(), SinkError> {
        self.sender.try_send(item).map_err(|e| match e {
            TrySendError::Full(_) => SinkError::Full,
            TrySendError::Disconnected(_) => SinkError::Disconnected,
        })
    }
}
