//! Simulated doorbell interrupt controller shared by two cores.
//!
//! Each core has a raised word and a mask word per event, one bit per
//! channel. A line interrupts its core while it is raised and unmasked.
//! Anything that can make a line fireable bumps that core's interrupt word,
//! which is what [`IrqThread`](crate::IrqThread) parks on.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use corelink_transport::{ChannelId, CoreSide, Doorbell, Event, MAX_CHANNELS};
use smallvec::SmallVec;

use crate::wait;

/// Lines that would interrupt a core right now, in channel order per event.
pub type FireableLines = SmallVec<[(ChannelId, Event); 8]>;

#[derive(Debug)]
struct CoreLines {
    raised: [AtomicU64; 2],
    masked: [AtomicU64; 2],
    notified: [AtomicU64; 2],
    irq: AtomicU32,
}

impl CoreLines {
    fn new() -> Self {
        Self {
            raised: [AtomicU64::new(0), AtomicU64::new(0)],
            masked: [AtomicU64::new(u64::MAX), AtomicU64::new(u64::MAX)],
            notified: [AtomicU64::new(0), AtomicU64::new(0)],
            irq: AtomicU32::new(0),
        }
    }

    fn live(&self, event: Event) -> u64 {
        let raised = self.raised[event.index()].load(Ordering::Acquire);
        let masked = self.masked[event.index()].load(Ordering::Acquire);
        raised & !masked
    }
}

/// Doorbell registers of both cores. Every line starts masked.
#[derive(Debug)]
pub struct DoorbellBank {
    cores: [CoreLines; 2],
}

impl Default for DoorbellBank {
    fn default() -> Self {
        Self::new()
    }
}

impl DoorbellBank {
    pub fn new() -> Self {
        Self {
            cores: [CoreLines::new(), CoreLines::new()],
        }
    }

    fn core(&self, side: CoreSide) -> &CoreLines {
        &self.cores[side.index()]
    }

    /// Asserts `event` on `side`, as the other core's `notify_peer` does.
    pub fn raise(&self, side: CoreSide, channel: ChannelId, event: Event) {
        self.core(side).raised[event.index()].fetch_or(channel.bit(), Ordering::AcqRel);
        self.kick(side);
    }

    pub fn is_raised(&self, side: CoreSide, channel: ChannelId, event: Event) -> bool {
        self.core(side).raised[event.index()].load(Ordering::Acquire) & channel.bit() != 0
    }

    pub fn is_masked(&self, side: CoreSide, channel: ChannelId, event: Event) -> bool {
        self.core(side).masked[event.index()].load(Ordering::Acquire) & channel.bit() != 0
    }

    pub fn is_fireable(&self, side: CoreSide, channel: ChannelId, event: Event) -> bool {
        self.core(side).live(event) & channel.bit() != 0
    }

    /// Snapshot of every raised, unmasked line on `side`.
    pub fn fireable(&self, side: CoreSide) -> FireableLines {
        let core = self.core(side);
        let mut lines = FireableLines::new();
        for event in Event::ALL {
            let mut live = core.live(event);
            while live != 0 {
                let raw = live.trailing_zeros();
                live &= live - 1;
                if (raw as usize) < MAX_CHANNELS {
                    lines.push((ChannelId::new(raw as u8), event));
                }
            }
        }
        lines
    }

    /// How many times `side` notified its peer of `event`, over all channels.
    pub fn notifications(&self, side: CoreSide, event: Event) -> u64 {
        self.core(side).notified[event.index()].load(Ordering::Relaxed)
    }

    /// Models a sleep state that resets `side`'s mask registers. Raised
    /// lines survive; nothing fires until the masks are restored.
    pub fn power_loss(&self, side: CoreSide) {
        for masked in &self.core(side).masked {
            masked.store(u64::MAX, Ordering::Release);
        }
    }

    pub(crate) fn irq_word(&self, side: CoreSide) -> &AtomicU32 {
        &self.core(side).irq
    }

    /// Wakes whatever services `side`'s interrupts.
    pub(crate) fn kick(&self, side: CoreSide) {
        let word = self.irq_word(side);
        word.fetch_add(1, Ordering::Release);
        wait::wake_all(word);
    }

    /// The adapter one core uses to drive this bank.
    pub fn doorbell(self: &Arc<Self>, side: CoreSide) -> SimDoorbell {
        SimDoorbell {
            bank: Arc::clone(self),
            side,
        }
    }
}

/// One core's view of a [`DoorbellBank`].
#[derive(Clone, Debug)]
pub struct SimDoorbell {
    bank: Arc<DoorbellBank>,
    side: CoreSide,
}

impl SimDoorbell {
    pub fn side(&self) -> CoreSide {
        self.side
    }

    pub fn bank(&self) -> &Arc<DoorbellBank> {
        &self.bank
    }
}

impl Doorbell for SimDoorbell {
    fn notify_peer(&self, channel: ChannelId, event: Event) {
        self.bank.core(self.side).notified[event.index()].fetch_add(1, Ordering::Relaxed);
        self.bank.raise(self.side.peer(), channel, event);
    }

    fn clear_local(&self, channel: ChannelId, event: Event) {
        self.bank.core(self.side).raised[event.index()]
            .fetch_and(!channel.bit(), Ordering::AcqRel);
    }

    fn mask_local(&self, channel: ChannelId, event: Event) {
        self.bank.core(self.side).masked[event.index()]
            .fetch_or(channel.bit(), Ordering::AcqRel);
    }

    fn unmask_local(&self, channel: ChannelId, event: Event) {
        let core = self.bank.core(self.side);
        core.masked[event.index()].fetch_and(!channel.bit(), Ordering::AcqRel);
        if core.raised[event.index()].load(Ordering::Acquire) & channel.bit() != 0 {
            self.bank.kick(self.side);
        }
    }

    fn query_active(&self, channel: ChannelId, event: Event) -> bool {
        self.bank.is_raised(self.side, channel, event)
    }
}
