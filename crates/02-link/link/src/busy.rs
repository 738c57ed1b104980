//! Folding per-channel activity into one system wake lock.
//!
//! Two edges are debounced. A channel bit only changes when its requested
//! state differs from the current one, and the wake lock only moves when the
//! whole bitset flips between empty and non-empty. The bitset is updated with
//! compare-and-swap; lock calls are then reconciled against the live bitset
//! under a small mutex, so concurrent toggles on different channels can never
//! leave the lock held with no busy channel (or released with one).

use corelink_transport::{ChannelId, WakeLock, WakeReason};
use log::debug;

#[cfg(feature = "loom")]
mod sync {
    pub(crate) use loom::sync::atomic::{AtomicU64, Ordering};

    pub(crate) struct Mutex<T>(loom::sync::Mutex<T>);

    impl<T> Mutex<T> {
        pub(crate) fn new(value: T) -> Self {
            Self(loom::sync::Mutex::new(value))
        }

        pub(crate) fn lock(&self) -> loom::sync::MutexGuard<'_, T> {
            self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
        }
    }
}

#[cfg(not(feature = "loom"))]
mod sync {
    pub(crate) use parking_lot::Mutex;
    pub(crate) use std::sync::atomic::{AtomicU64, Ordering};
}

use sync::{AtomicU64, Mutex, Ordering};

pub struct BusyAggregate<W> {
    bits: AtomicU64,
    held: Mutex<bool>,
    wake: W,
    reason: WakeReason,
}

impl<W: WakeLock> BusyAggregate<W> {
    pub fn new(wake: W, reason: WakeReason) -> Self {
        Self {
            bits: AtomicU64::new(0),
            held: Mutex::new(false),
            wake,
            reason,
        }
    }

    /// Marks `channel` busy or idle. Returns whether its bit changed.
    pub fn set_busy(&self, channel: ChannelId, busy: bool) -> bool {
        let bit = channel.bit();
        let mut current = self.bits.load(Ordering::Acquire);
        loop {
            let next = if busy { current | bit } else { current & !bit };
            if next == current {
                return false;
            }
            match self
                .bits
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => {
                    if (current == 0) != (next == 0) {
                        self.reconcile();
                    }
                    return true;
                }
                Err(actual) => current = actual,
            }
        }
    }

    fn reconcile(&self) {
        let mut held = self.held.lock();
        let wanted = self.bits.load(Ordering::Acquire) != 0;
        if wanted == *held {
            return;
        }
        if wanted {
            self.wake.acquire(self.reason);
        } else {
            self.wake.release(self.reason);
        }
        *held = wanted;
        debug!(
            "{}: wake lock {}",
            self.reason,
            if wanted { "acquired" } else { "released" }
        );
    }

    pub fn is_busy(&self, channel: ChannelId) -> bool {
        self.bits.load(Ordering::Acquire) & channel.bit() != 0
    }

    pub fn any_busy(&self) -> bool {
        self.bits.load(Ordering::Acquire) != 0
    }

    /// Whether this aggregate currently holds the system wake lock.
    pub fn lock_held(&self) -> bool {
        *self.held.lock()
    }

    pub fn wake_lock(&self) -> &W {
        &self.wake
    }
}

#[cfg(all(test, not(feature = "loom")))]
mod tests {
    use super::*;
    use crate::testing::CountingWake;

    const REASON: WakeReason = WakeReason(0x42);

    fn aggregate() -> BusyAggregate<CountingWake> {
        BusyAggregate::new(CountingWake::default(), REASON)
    }

    #[test]
    fn repeated_busy_acquires_once() {
        let busy = aggregate();
        let ch = ChannelId::new(3);
        assert!(busy.set_busy(ch, true));
        assert!(!busy.set_busy(ch, true));
        assert_eq!(busy.wake_lock().acquires(), 1);
        assert!(busy.lock_held());

        assert!(busy.set_busy(ch, false));
        assert!(!busy.set_busy(ch, false));
        assert_eq!(busy.wake_lock().releases(), 1);
        assert!(!busy.lock_held());
    }

    #[test]
    fn release_waits_for_last_channel() {
        let busy = aggregate();
        let (a, b) = (ChannelId::new(0), ChannelId::new(1));
        busy.set_busy(a, true);
        busy.set_busy(b, true);
        assert_eq!(busy.wake_lock().acquires(), 1);

        busy.set_busy(a, false);
        assert_eq!(busy.wake_lock().releases(), 0);
        assert!(busy.lock_held());
        assert!(busy.is_busy(b));
        assert!(!busy.is_busy(a));

        busy.set_busy(b, false);
        assert_eq!(busy.wake_lock().releases(), 1);
        assert!(!busy.any_busy());
    }

    #[test]
    fn idle_request_on_idle_channel_is_silent() {
        let busy = aggregate();
        assert!(!busy.set_busy(ChannelId::new(9), false));
        assert_eq!(busy.wake_lock().acquires(), 0);
        assert_eq!(busy.wake_lock().releases(), 0);
    }

    #[test]
    fn reason_code_reaches_the_lock() {
        let busy = aggregate();
        busy.set_busy(ChannelId::new(0), true);
        busy.set_busy(ChannelId::new(0), false);
        assert_eq!(busy.wake_lock().reasons(), vec![REASON, REASON]);
    }

    #[test]
    fn concurrent_toggles_leave_lock_consistent() {
        use std::sync::Arc;
        use std::thread;

        let busy = Arc::new(aggregate());
        let workers: Vec<_> = (0..4u8)
            .map(|raw| {
                let busy = Arc::clone(&busy);
                thread::spawn(move || {
                    let ch = ChannelId::new(raw);
                    for round in 0..2_000 {
                        busy.set_busy(ch, round % 2 == 0);
                    }
                    busy.set_busy(ch, false);
                })
            })
            .collect();
        for worker in workers {
            worker.join().expect("worker");
        }

        assert!(!busy.any_busy());
        assert!(!busy.lock_held());
        let lock = busy.wake_lock();
        assert_eq!(lock.acquires(), lock.releases());
    }
}
