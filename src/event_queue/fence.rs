//! Cross-thread rendezvous fence
//!
//! A monotone 64-bit value with notify-on-change semantics. The UI thread
//! enqueues a fence and waits for the render thread to reach it; once the
//! render thread parks on the fence, the UI thread may touch shared state
//! and then release it.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Condvar, Mutex};

/// The three-state rendezvous protocol carried by a fence.
#[repr(u64)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceState {
    /// Initial state: the renderer has not reached the fence event yet.
    WaitRenderer = 0,
    /// The renderer is parked on the fence; the main thread may proceed.
    WaitMain = 1,
    /// The main thread is done; the renderer may resume.
    Done = 2,
}

pub struct Fence {
    value: AtomicU64,
    mutex: Mutex<()>,
    condvar: Condvar,
}

impl Fence {
    pub fn new(initial: FenceState) -> Self {
        Self {
            value: AtomicU64::new(initial as u64),
            mutex: Mutex::new(()),
            condvar: Condvar::new(),
        }
    }

    /// Raise the fence to `state`. Signals with a value below the current
    /// one are ignored (monotonicity guard).
    pub fn signal(&self, state: FenceState) {
        self.signal_value(state as u64);
    }

    pub fn signal_value(&self, value: u64) {
        // The store happens under the mutex so a waiter cannot miss the
        // wakeup between its value check and its park.
        let previous = {
            let _guard = self.mutex.lock();
            self.value.fetch_max(value, Ordering::AcqRel)
        };
        if previous < value {
            self.condvar.notify_all();
        }
    }

    /// Block until the fence value reaches at least `state`.
    pub fn wait_until(&self, state: FenceState) {
        self.wait_until_value(state as u64);
    }

    pub fn wait_until_value(&self, value: u64) {
        if self.value.load(Ordering::Acquire) >= value {
            return;
        }
        let mut guard = self.mutex.lock();
        while self.value.load(Ordering::Acquire) < value {
            self.condvar.wait(&mut guard);
        }
    }

    pub fn current_value(&self) -> u64 {
        self.value.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn signal_below_current_is_ignored() {
        let fence = Fence::new(FenceState::WaitMain);
        fence.signal(FenceState::WaitRenderer);
        assert_eq!(fence.current_value(), FenceState::WaitMain as u64);

        fence.signal(FenceState::Done);
        assert_eq!(fence.current_value(), FenceState::Done as u64);
    }

    #[test]
    fn wait_returns_once_value_reached() {
        let fence = Arc::new(Fence::new(FenceState::WaitRenderer));
        let signaller = Arc::clone(&fence);

        let handle = std::thread::spawn(move || {
            signaller.signal(FenceState::WaitMain);
            signaller.signal(FenceState::Done);
        });

        fence.wait_until(FenceState::Done);
        assert_eq!(fence.current_value(), FenceState::Done as u64);
        handle.join().unwrap();
    }

    #[test]
    fn wait_on_already_reached_value_returns_immediately() {
        let fence = Fence::new(FenceState::Done);
        fence.wait_until(FenceState::WaitMain);
    }
}
