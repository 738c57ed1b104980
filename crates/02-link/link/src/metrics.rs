use std::sync::atomic::{AtomicU32, Ordering};

use corelink_transport::ChannelId;

#[derive(Default)]
pub(crate) struct ChannelMetrics {
    sent: AtomicU32,
    completed: AtomicU32,
    delivered: AtomicU32,
    partial: AtomicU32,
    pool_exhausted: AtomicU32,
    resyncs: AtomicU32,
}

pub(crate) enum Counter {
    Sent,
    Completed,
    Delivered,
    Partial,
    PoolExhausted,
    Resync,
}

impl ChannelMetrics {
    pub fn bump(&self, counter: Counter) {
        self.add(counter, 1);
    }

    pub fn add(&self, counter: Counter, n: u32) {
        let cell = match counter {
            Counter::Sent => &self.sent,
            Counter::Completed => &self.completed,
            Counter::Delivered => &self.delivered,
            Counter::Partial => &self.partial,
            Counter::PoolExhausted => &self.pool_exhausted,
            Counter::Resync => &self.resyncs,
        };
        cell.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            sent: self.sent.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            partial: self.partial.load(Ordering::Relaxed),
            pool_exhausted: self.pool_exhausted.load(Ordering::Relaxed),
            resyncs: self.resyncs.load(Ordering::Relaxed),
        }
    }
}

/// Lifetime counters of one channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Messages accepted by `send`.
    pub sent: u32,
    /// Completion callbacks invoked.
    pub completed: u32,
    /// Peer descriptors fully consumed by the receive handler.
    pub delivered: u32,
    /// Receive passes that stopped on a partially consumed buffer.
    pub partial: u32,
    /// `send` calls refused for lack of a descriptor.
    pub pool_exhausted: u32,
    /// Spurious or inconsistent doorbell states resolved locally.
    pub resyncs: u32,
}

/// Point-in-time view of a channel, for diagnostics and tests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelSnapshot {
    pub channel: ChannelId,
    pub opened: bool,
    pub flow_control: bool,
    pub busy: bool,
    pub in_flight: usize,
    pub pending: usize,
    pub free: usize,
    /// Bytes left in the partially consumed peer buffer, if any.
    pub continuation: Option<usize>,
    pub awaiting_done: bool,
    /// Whether the send-indication doorbell is meant to be unmasked.
    pub receiving: bool,
    pub metrics: MetricsSnapshot,
}
