use std::fmt;
use std::sync::Arc;

/// Reason code handed to the system power manager with every lock request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WakeReason(pub u32);

impl fmt::Display for WakeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wake-reason:{:#06x}", self.0)
    }
}

/// System sleep inhibitor keyed by reason code.
///
/// The link calls `acquire` once when its first channel turns busy and
/// `release` once when its last channel goes idle.
pub trait WakeLock: Send + Sync {
    fn acquire(&self, reason: WakeReason);
    fn release(&self, reason: WakeReason);
}

impl<T: WakeLock + ?Sized> WakeLock for Arc<T> {
    fn acquire(&self, reason: WakeReason) {
        (**self).acquire(reason)
    }

    fn release(&self, reason: WakeReason) {
        (**self).release(reason)
    }
}
