//! Bounded transmit queue between the scheduler and the serial writer.
//!
//! Holds register addresses awaiting a GET request. The scheduler pushes,
//! the transmitter pops; the mutex is the only piece of state those two
//! activities share. Backpressure is lossy rather than blocking: a request
//! dropped at capacity is simply re-requested on the next scheduling pass.

use std::sync::Mutex;

pub struct TxQueue {
    slots: Mutex<Vec<u16>>,
    capacity: usize,
}

impl TxQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Mutex::new(Vec::with_capacity(capacity)),
            capacity,
        }
    }

    /// Enqueue a register address. A full queue drops it silently.
    pub fn push(&self, address: u16) {
        let mut slots = self.slots.lock().unwrap();
        if slots.len() < self.capacity {
            slots.push(address);
        }
    }

    /// Remove one pending address, most recently pushed first. The drain
    /// order matches the reference implementation; the scheduler's
    /// round-robin sweep means every register is reached either way.
    pub fn pop(&self) -> Option<u16> {
        self.slots.lock().unwrap().pop()
    }

    pub fn len(&self) -> usize {
        self.slots.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[test]
fn test_push_pop_lifo() {
    let queue = TxQueue::new(4);
    queue.push(0x0FFF);
    queue.push(0xED8F);
    assert_eq!(queue.pop(), Some(0xED8F));
    assert_eq!(queue.pop(), Some(0x0FFF));
    assert_eq!(queue.pop(), None);
}

#[test]
fn test_capacity_bound() {
    let queue = TxQueue::new(2);
    queue.push(1);
    queue.push(2);
    queue.push(3); // dropped
    queue.push(4); // dropped
    assert_eq!(queue.len(), 2);
    assert_eq!(queue.pop(), Some(2));
    assert_eq!(queue.pop(), Some(1));
    assert_eq!(queue.pop(), None);
}

#[test]
fn test_drains_then_refills() {
    let queue = TxQueue::new(2);
    queue.push(1);
    queue.push(2);
    queue.push(3);
    assert_eq!(queue.pop(), Some(2));
    queue.push(5);
    assert_eq!(queue.pop(), Some(5));
    assert_eq!(queue.pop(), Some(1));
    assert!(queue.is_empty());
}
