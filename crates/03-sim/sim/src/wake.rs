use std::sync::atomic::{AtomicU64, Ordering};

use corelink_transport::{WakeLock, WakeReason};
use parking_lot::Mutex;

/// Host stand-in for the power manager's sleep inhibitor.
///
/// Tracks nesting per call so tests can assert the link never acquires
/// twice or releases a lock it does not hold.
#[derive(Debug, Default)]
pub struct SimWakeLock {
    acquires: AtomicU64,
    releases: AtomicU64,
    holders: Mutex<Vec<WakeReason>>,
}

impl SimWakeLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquires(&self) -> u64 {
        self.acquires.load(Ordering::Relaxed)
    }

    pub fn releases(&self) -> u64 {
        self.releases.load(Ordering::Relaxed)
    }

    /// Whether any reason currently inhibits sleep.
    pub fn held(&self) -> bool {
        !self.holders.lock().is_empty()
    }

    pub fn holders(&self) -> Vec<WakeReason> {
        self.holders.lock().clone()
    }
}

impl WakeLock for SimWakeLock {
    fn acquire(&self, reason: WakeReason) {
        let mut holders = self.holders.lock();
        assert!(
            !holders.contains(&reason),
            "wake lock {reason} acquired twice"
        );
        holders.push(reason);
        self.acquires.fetch_add(1, Ordering::Relaxed);
        tracing::trace!("wake lock {reason} acquired");
    }

    fn release(&self, reason: WakeReason) {
        let mut holders = self.holders.lock();
        let Some(pos) = holders.iter().position(|&held| held == reason) else {
            panic!("wake lock {reason} released while not held");
        };
        holders.swap_remove(pos);
        self.releases.fetch_add(1, Ordering::Relaxed);
        tracing::trace!("wake lock {reason} released");
    }
}
