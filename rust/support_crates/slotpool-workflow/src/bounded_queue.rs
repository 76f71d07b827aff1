//! A bounded, blocking, single-producer, multi-consumer queue.
//!
//! This is the single point of synchronization between the thread that submits
//! work and the pool's workers. The sender blocks while the queue holds `bound`
//! items; receivers block while it is empty. Each side knows when the other is
//! gone, so a blocked call wakes up with an error instead of waiting forever.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

/// Creates a bounded channel holding at most `bound` undelivered items.
///
/// Items become available on the [`Receiver`] in the order they were sent.
/// [`Sender::send`] blocks while the buffer is full, [`Receiver::recv`] blocks
/// while it is empty. The receiving half can be cloned; the queue tracks how
/// many receivers are alive.
///
/// # Panics
///
/// Panics if `bound` is 0; the pool validates its slot count before it gets here.
pub fn bounded<T>(bound: usize) -> (Sender<T>, Receiver<T>) {
    assert_ne!(bound, 0, "bounded queue does not support zero capacity");
    let inner = Arc::new(Inner {
        state: Mutex::new(State {
            items: VecDeque::with_capacity(bound),
            capacity: bound,
            sender_alive: true,
            consumers: 1,
        }),
        not_empty: Condvar::new(),
        not_full: Condvar::new(),
    });
    (Sender(inner.clone()), Receiver(inner))
}

/// The error returned by [`Sender::send`] when every receiver is gone.
/// The unsent item is handed back.
#[derive(Debug, PartialEq, Eq)]
pub struct SendError<T>(pub T);

/// The error returned by [`Receiver::recv`] once the queue is empty and the
/// sender is gone.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct RecvError;

/// The sending half of a [`bounded`] queue.
pub struct Sender<T>(Arc<Inner<T>>);

impl<T> Sender<T> {
    /// Enqueues `item`, blocking while the queue is full.
    ///
    /// Returns the item back if all receivers have been dropped, including the
    /// case where the last receiver goes away while this call is waiting.
    pub fn send(&self, item: T) -> Result<(), SendError<T>> {
        let mut state = self.0.lock();
        loop {
            if state.consumers == 0 {
                return Err(SendError(item));
            }
            if state.items.len() < state.capacity {
                break;
            }
            state = self
                .0
                .not_full
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        state.items.push_back(item);
        drop(state);
        self.0.not_empty.notify_one();
        Ok(())
    }
}

impl<T> Drop for Sender<T> {
    fn drop(&mut self) {
        self.0.lock().sender_alive = false;
        self.0.not_empty.notify_all();
    }
}

/// The receiving half of a [`bounded`] queue.
pub struct Receiver<T>(Arc<Inner<T>>);

impl<T> Receiver<T> {
    /// Dequeues the oldest item, blocking while the queue is empty.
    ///
    /// Items sent before the sender was dropped are still delivered;
    /// after that the call fails with [`RecvError`].
    pub fn recv(&self) -> Result<T, RecvError> {
        let mut state = self.0.lock();
        loop {
            if let Some(item) = state.items.pop_front() {
                drop(state);
                self.0.not_full.notify_one();
                return Ok(item);
            }
            if !state.sender_alive {
                return Err(RecvError);
            }
            state = self
                .0
                .not_empty
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

impl<T> Clone for Receiver<T> {
    fn clone(&self) -> Self {
        self.0.lock().consumers += 1;
        Self(self.0.clone())
    }
}

impl<T> Drop for Receiver<T> {
    fn drop(&mut self) {
        let mut state = self.0.lock();
        state.consumers -= 1;
        if state.consumers == 0 {
            // Nobody can ever take these; release them and wake blocked senders.
            let orphaned = std::mem::take(&mut state.items);
            drop(state);
            drop(orphaned);
            self.0.not_full.notify_all();
        }
    }
}

struct State<T> {
    items: VecDeque<T>,
    capacity: usize,
    sender_alive: bool,
    consumers: usize,
}

struct Inner<T> {
    state: Mutex<State<T>>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl<T> Inner<T> {
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
