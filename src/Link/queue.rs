// Bounded interruptible handoff queue between producers and a worker

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

struct QueueState<T> {
    items: VecDeque<T>,
    interrupted: bool,
}

/// Bounded handoff queue with interrupt support.
///
/// `interrupt` wakes every waiter and rejects traffic until
/// `reset_interrupt`; teardown relies on it to unblock the consumer.
pub struct SendQueue<T> {
    state: Mutex<QueueState<T>>,
    item_available: Condvar,
    space_available: Condvar,
    capacity: usize,
}

impl<T> SendQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                interrupted: false,
            }),
            item_available: Condvar::new(),
            space_available: Condvar::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Enqueue without waiting. Returns false when full or interrupted.
    pub fn push(&self, item: T) -> bool {
        let mut state = self.state.lock();
        if state.interrupted || state.items.len() >= self.capacity {
            return false;
        }
        state.items.push_back(item);
        drop(state);
        self.item_available.notify_one();
        true
    }

    /// Enqueue, waiting up to `timeout` for space. Returns false on
    /// timeout or interrupt.
    pub fn push_timeout(&self, item: T, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while !state.interrupted && state.items.len() >= self.capacity {
            if self.space_available.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }
        if state.interrupted || state.items.len() >= self.capacity {
            return false;
        }
        state.items.push_back(item);
        drop(state);
        self.item_available.notify_one();
        true
    }

    /// Dequeue without waiting. Returns None when empty or interrupted.
    pub fn pop(&self) -> Option<T> {
        let mut state = self.state.lock();
        if state.interrupted {
            return None;
        }
        let item = state.items.pop_front();
        if item.is_some() {
            drop(state);
            self.space_available.notify_one();
        }
        item
    }

    /// Block until an item arrives or the queue is interrupted.
    pub fn wait_and_pop(&self) -> Option<T> {
        let mut state = self.state.lock();
        while state.items.is_empty() && !state.interrupted {
            self.item_available.wait(&mut state);
        }
        if state.interrupted {
            return None;
        }
        let item = state.items.pop_front();
        drop(state);
        self.space_available.notify_one();
        item
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.items.clear();
        drop(state);
        self.space_available.notify_all();
    }

    /// Wake all waiters and reject further traffic.
    pub fn interrupt(&self) {
        self.state.lock().interrupted = true;
        self.item_available.notify_all();
        self.space_available.notify_all();
    }

    pub fn reset_interrupt(&self) {
        self.state.lock().interrupted = false;
    }

    pub fn is_interrupted(&self) -> bool {
        self.state.lock().interrupted
    }
}
