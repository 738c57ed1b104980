//! Doorbell adapter contract.
//!
//! Each chip generation encodes its doorbell registers differently; the link
//! only ever needs these five primitives per (channel, event) pair. A doorbell
//! assertion is ordered after every write to the descriptors it announces, so
//! implementations must make `notify_peer` a release point.

use std::sync::Arc;

use crate::event::{ChannelId, Event};

pub trait Doorbell: Send + Sync {
    /// Raises `event` on the peer core for `channel`.
    fn notify_peer(&self, channel: ChannelId, event: Event);

    /// Acknowledges a local assertion so it stops pending.
    fn clear_local(&self, channel: ChannelId, event: Event);

    /// Prevents a local assertion from interrupting this core.
    fn mask_local(&self, channel: ChannelId, event: Event);

    /// Allows a local assertion to interrupt this core again.
    fn unmask_local(&self, channel: ChannelId, event: Event);

    /// Returns whether `event` is currently asserted locally.
    fn query_active(&self, channel: ChannelId, event: Event) -> bool;
}

impl<T: Doorbell + ?Sized> Doorbell for Arc<T> {
    fn notify_peer(&self, channel: ChannelId, event: Event) {
        (**self).notify_peer(channel, event)
    }

    fn clear_local(&self, channel: ChannelId, event: Event) {
        (**self).clear_local(channel, event)
    }

    fn mask_local(&self, channel: ChannelId, event: Event) {
        (**self).mask_local(channel, event)
    }

    fn unmask_local(&self, channel: ChannelId, event: Event) {
        (**self).unmask_local(channel, event)
    }

    fn query_active(&self, channel: ChannelId, event: Event) -> bool {
        (**self).query_active(channel, event)
    }
}
