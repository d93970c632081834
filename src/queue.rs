// Copyright 2025 Dualplane Contributors
// SPDX-License-Identifier: Apache-2.0

//! Bounded outbound queue for the data plane
//!
//! Producers are any caller threads; the single consumer is the data-plane
//! worker loop. A full queue rejects the producer with
//! [`RuntimeError::QueueFull`] so backpressure stays observable instead of
//! silently stalling the caller on the data-plane loop.

use crate::common::error::{RuntimeError, RuntimeResult};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::Duration;

/// Bounded, thread-safe FIFO of opaque byte buffers.
///
/// One queue exists per session and never crosses an active/inactive
/// transition. Buffers still queued at shutdown are discarded
/// (at-most-once delivery).
pub struct OutboundQueue {
    buffers: Mutex<VecDeque<Vec<u8>>>,
    available: Condvar,
    capacity: usize,
}

impl OutboundQueue {
    /// Create a queue bounded at `capacity` buffers
    pub fn new(capacity: usize) -> Self {
        Self {
            buffers: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
            capacity,
        }
    }

    /// Append a buffer to the tail.
    ///
    /// Fails with [`RuntimeError::EmptyPayload`] for empty buffers and
    /// [`RuntimeError::QueueFull`] when the high-water mark is reached.
    /// Wakes the consumer on success.
    pub fn enqueue(&self, buffer: Vec<u8>) -> RuntimeResult<()> {
        if buffer.is_empty() {
            return Err(RuntimeError::EmptyPayload);
        }

        let mut buffers = self.buffers.lock();
        if buffers.len() >= self.capacity {
            return Err(RuntimeError::QueueFull {
                capacity: self.capacity,
            });
        }
        buffers.push_back(buffer);
        drop(buffers);

        self.available.notify_one();
        Ok(())
    }

    /// Remove and return the head buffer; `None` if the queue is empty.
    /// Never blocks.
    pub fn drain_one(&self) -> Option<Vec<u8>> {
        self.buffers.lock().pop_front()
    }

    /// Consumer-side bounded wait: returns as soon as a buffer is
    /// enqueued, or after `timeout`. Bounds idle latency without a busy
    /// spin.
    pub fn wait_for_message(&self, timeout: Duration) {
        let mut buffers = self.buffers.lock();
        if buffers.is_empty() {
            self.available.wait_for(&mut buffers, timeout);
        }
    }

    /// Drop every queued buffer. Shutdown only.
    pub fn clear(&self) {
        self.buffers.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.buffers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_fifo_order() {
        let queue = OutboundQueue::new(10);
        queue.enqueue(b"one".to_vec()).unwrap();
        queue.enqueue(b"two".to_vec()).unwrap();
        queue.enqueue(b"three".to_vec()).unwrap();

        assert_eq!(queue.drain_one().unwrap(), b"one");
        assert_eq!(queue.drain_one().unwrap(), b"two");
        assert_eq!(queue.drain_one().unwrap(), b"three");
        assert!(queue.drain_one().is_none());
    }

    #[test]
    fn test_rejects_empty_payload() {
        let queue = OutboundQueue::new(10);
        assert!(matches!(
            queue.enqueue(Vec::new()),
            Err(RuntimeError::EmptyPayload)
        ));
    }

    #[test]
    fn test_backpressure_at_capacity() {
        let queue = OutboundQueue::new(3);
        for i in 0..3 {
            queue.enqueue(vec![i]).unwrap();
        }
        // the (k+1)-th enqueue is rejected, never silently dropped
        assert!(matches!(
            queue.enqueue(vec![9]),
            Err(RuntimeError::QueueFull { capacity: 3 })
        ));
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn test_clear_discards_everything() {
        let queue = OutboundQueue::new(5);
        queue.enqueue(b"a".to_vec()).unwrap();
        queue.enqueue(b"b".to_vec()).unwrap();
        queue.clear();
        assert!(queue.is_empty());
        assert!(queue.drain_one().is_none());
    }

    #[test]
    fn test_wait_wakes_on_enqueue() {
        let queue = Arc::new(OutboundQueue::new(5));
        let producer_queue = Arc::clone(&queue);

        let producer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            producer_queue.enqueue(b"wake".to_vec()).unwrap();
        });

        let started = Instant::now();
        queue.wait_for_message(Duration::from_secs(5));
        // woken by the enqueue, well before the 5s bound
        assert!(started.elapsed() < Duration::from_secs(1));
        producer.join().unwrap();
        assert_eq!(queue.drain_one().unwrap(), b"wake");
    }

    #[test]
    fn test_concurrent_producers_keep_per_producer_order() {
        let queue = Arc::new(OutboundQueue::new(300));
        let mut handles = Vec::new();

        for producer in 0u8..2 {
            let queue = Arc::clone(&queue);
            handles.push(thread::spawn(move || {
                for i in 0u8..100 {
                    queue.enqueue(vec![producer, i]).unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let mut last_seen = [None::<u8>; 2];
        while let Some(buffer) = queue.drain_one() {
            let producer = buffer[0] as usize;
            let seq = buffer[1];
            if let Some(last) = last_seen[producer] {
                assert!(seq > last, "producer {} out of order", producer);
            }
            last_seen[producer] = Some(seq);
        }
        assert_eq!(last_seen[0], Some(99));
        assert_eq!(last_seen[1], Some(99));
    }
}
