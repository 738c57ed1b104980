//! Futex-style parking for simulated interrupt lines, via `atomic-wait`.

use std::sync::atomic::{AtomicU32, Ordering};

/// Parks until `word` differs from `seen` or a wakeup arrives. Returns
/// immediately if it already differs.
#[inline]
pub(crate) fn wait_while(word: &AtomicU32, seen: u32) {
    if word.load(Ordering::Acquire) == seen {
        atomic_wait::wait(word, seen);
    }
}

#[inline]
pub(crate) fn wake_all(word: &AtomicU32) {
    atomic_wait::wake_all(word as *const AtomicU32);
}
