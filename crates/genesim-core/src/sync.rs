//! Synchronization primitives for the phase pipeline: a closeable barrier, a
//! multi-notifier/multi-waiter signal link, the free-slot queue, and a float
//! atomic.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Result of blocking on a pipeline primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The rendezvous completed; continue with the next phase.
    Proceed,
    /// The primitive was closed; unwind at this synchronization point.
    Shutdown,
}

impl WaitOutcome {
    #[must_use]
    pub fn is_shutdown(self) -> bool {
        matches!(self, Self::Shutdown)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Reusable barrier for a fixed set of pipeline workers.
///
/// Unlike `std::sync::Barrier` it can be closed: a closed barrier releases
/// every waiter with [`WaitOutcome::Shutdown`] and never blocks again. The
/// driver closes all pipeline primitives to interrupt workers mid-wait.
#[derive(Debug)]
pub struct PhaseBarrier {
    participants: usize,
    state: Mutex<BarrierState>,
    cond: Condvar,
}

#[derive(Debug)]
struct BarrierState {
    arrived: usize,
    generation: u64,
    closed: bool,
}

impl PhaseBarrier {
    #[must_use]
    pub fn new(participants: usize) -> Self {
        Self {
            participants: participants.max(1),
            state: Mutex::new(BarrierState {
                arrived: 0,
                generation: 0,
                closed: false,
            }),
            cond: Condvar::new(),
        }
    }

    /// Block until all participants have arrived, or until the barrier is
    /// closed.
    pub fn wait(&self) -> WaitOutcome {
        let mut state = lock(&self.state);
        if state.closed {
            return WaitOutcome::Shutdown;
        }
        state.arrived += 1;
        if state.arrived == self.participants {
            state.arrived = 0;
            state.generation = state.generation.wrapping_add(1);
            self.cond.notify_all();
            return WaitOutcome::Proceed;
        }
        let generation = state.generation;
        while state.generation == generation && !state.closed {
            state = self.cond.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
        if state.generation == generation {
            WaitOutcome::Shutdown
        } else {
            WaitOutcome::Proceed
        }
    }

    /// Release every waiter with [`WaitOutcome::Shutdown`] and make all
    /// future waits return immediately.
    pub fn close(&self) {
        lock(&self.state).closed = true;
        self.cond.notify_all();
    }
}

/// A rendezvous where every notifier must call [`SignalLink::notify`] to flip
/// the link ready, and every waiter must call [`SignalLink::wait`]; the last
/// waiter through clears the ready flag, making the link reusable.
///
/// A waiter must not re-enter [`SignalLink::wait`] until every waiter has
/// consumed the current round. The pipeline's barriers separate the rounds,
/// so its workers satisfy this by construction.
#[derive(Debug)]
pub struct SignalLink {
    notifiers: usize,
    waiters: usize,
    state: Mutex<LinkState>,
    cond: Condvar,
}

#[derive(Debug)]
struct LinkState {
    ready: bool,
    notified: usize,
    awaited: usize,
    closed: bool,
}

impl SignalLink {
    #[must_use]
    pub fn new(notifiers: usize, waiters: usize, start_ready: bool) -> Self {
        Self {
            notifiers: notifiers.max(1),
            waiters: waiters.max(1),
            state: Mutex::new(LinkState {
                ready: start_ready,
                notified: 0,
                awaited: 0,
                closed: false,
            }),
            cond: Condvar::new(),
        }
    }

    /// Register this thread's notification; the final notifier flips the
    /// link ready and wakes all waiters. No-op once closed.
    pub fn notify(&self) {
        let mut state = lock(&self.state);
        if state.closed {
            return;
        }
        state.notified += 1;
        if state.notified == self.notifiers {
            state.notified = 0;
            state.ready = true;
            self.cond.notify_all();
        }
    }

    /// Block until the link is ready or closed. The last waiter through
    /// clears the ready flag.
    pub fn wait(&self) -> WaitOutcome {
        let mut state = lock(&self.state);
        while !state.ready && !state.closed {
            state = self.cond.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
        if state.closed {
            return WaitOutcome::Shutdown;
        }
        state.awaited += 1;
        if state.awaited == self.waiters {
            state.awaited = 0;
            state.ready = false;
        }
        WaitOutcome::Proceed
    }

    /// Release every waiter with [`WaitOutcome::Shutdown`]; later notifies
    /// and waits become no-ops.
    pub fn close(&self) {
        lock(&self.state).closed = true;
        self.cond.notify_all();
    }
}

/// Concurrent FIFO of free slot indices.
///
/// [`IndexQueue::pop_with`] dequeues under the lock but invokes the callback
/// after releasing it, keeping the critical section to the queue operation
/// itself. The callback takes ownership of the popped slot before any other
/// phase can observe it.
#[derive(Debug, Default)]
pub struct IndexQueue {
    inner: Mutex<VecDeque<u32>>,
}

impl IndexQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, index: u32) {
        lock(&self.inner).push_back(index);
    }

    /// Pop the oldest free index and hand it to `claim`. Returns false if
    /// the queue is empty.
    pub fn pop_with(&self, claim: impl FnOnce(u32)) -> bool {
        let index = lock(&self.inner).pop_front();
        match index {
            Some(index) => {
                claim(index);
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// `f32` stored by bit pattern in an `AtomicU32`.
///
/// Loads and stores are relaxed: cross-phase visibility in the pipeline is
/// established by the barriers and signal links, not by these cells.
#[derive(Debug, Default)]
pub struct AtomicF32(AtomicU32);

impl AtomicF32 {
    #[must_use]
    pub fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    #[must_use]
    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}
