//! Recording collaborators for unit tests.

use corelink_transport::{ChannelId, CoreSide, Doorbell, Event, WakeLock, WakeReason};
use parking_lot::Mutex;

use crate::config::LinkConfig;
use crate::table::ChannelTable;

pub(crate) type Table = ChannelTable<RecordingDoorbell, CountingWake>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Call {
    Notify(ChannelId, Event),
    Clear(ChannelId, Event),
    Mask(ChannelId, Event),
    Unmask(ChannelId, Event),
}

impl Call {
    pub fn channel(&self) -> ChannelId {
        match *self {
            Call::Notify(ch, _) | Call::Clear(ch, _) | Call::Mask(ch, _) | Call::Unmask(ch, _) => ch,
        }
    }
}

struct Lines {
    calls: Vec<Call>,
    raised: [u64; 2],
    masked: [u64; 2],
}

/// Doorbell that records every call and models local line state. Lines
/// start masked, as after reset.
pub(crate) struct RecordingDoorbell {
    lines: Mutex<Lines>,
}

impl Default for RecordingDoorbell {
    fn default() -> Self {
        Self {
            lines: Mutex::new(Lines {
                calls: Vec::new(),
                raised: [0; 2],
                masked: [u64::MAX; 2],
            }),
        }
    }
}

impl RecordingDoorbell {
    pub fn calls(&self) -> Vec<Call> {
        self.lines.lock().calls.clone()
    }

    pub fn take_calls(&self) -> Vec<Call> {
        std::mem::take(&mut self.lines.lock().calls)
    }

    pub fn notifications(&self, channel: ChannelId, event: Event) -> usize {
        self.lines
            .lock()
            .calls
            .iter()
            .filter(|&&call| call == Call::Notify(channel, event))
            .count()
    }

    pub fn is_masked(&self, channel: ChannelId, event: Event) -> bool {
        self.lines.lock().masked[event.index()] & channel.bit() != 0
    }

    /// The peer asserts `event` on this core.
    pub fn raise(&self, channel: ChannelId, event: Event) {
        self.lines.lock().raised[event.index()] |= channel.bit();
    }

    /// Mask registers come back reset.
    pub fn power_loss(&self) {
        self.lines.lock().masked = [u64::MAX; 2];
    }

    /// Raised and unmasked lines, i.e. what would interrupt right now.
    pub fn fireable(&self) -> Vec<(ChannelId, Event)> {
        let lines = self.lines.lock();
        let mut out = Vec::new();
        for event in Event::ALL {
            let live = lines.raised[event.index()] & !lines.masked[event.index()];
            for raw in 0..64u8 {
                let ch = ChannelId::new(raw);
                if live & ch.bit() != 0 {
                    out.push((ch, event));
                }
            }
        }
        out
    }
}

impl Doorbell for RecordingDoorbell {
    fn notify_peer(&self, channel: ChannelId, event: Event) {
        self.lines.lock().calls.push(Call::Notify(channel, event));
    }

    fn clear_local(&self, channel: ChannelId, event: Event) {
        let mut lines = self.lines.lock();
        lines.raised[event.index()] &= !channel.bit();
        lines.calls.push(Call::Clear(channel, event));
    }

    fn mask_local(&self, channel: ChannelId, event: Event) {
        let mut lines = self.lines.lock();
        lines.masked[event.index()] |= channel.bit();
        lines.calls.push(Call::Mask(channel, event));
    }

    fn unmask_local(&self, channel: ChannelId, event: Event) {
        let mut lines = self.lines.lock();
        lines.masked[event.index()] &= !channel.bit();
        lines.calls.push(Call::Unmask(channel, event));
    }

    fn query_active(&self, channel: ChannelId, event: Event) -> bool {
        self.lines.lock().raised[event.index()] & channel.bit() != 0
    }
}

#[derive(Default)]
pub(crate) struct CountingWake {
    log: Mutex<Vec<(bool, WakeReason)>>,
}

impl CountingWake {
    pub fn acquires(&self) -> usize {
        self.log.lock().iter().filter(|(held, _)| *held).count()
    }

    pub fn releases(&self) -> usize {
        self.log.lock().iter().filter(|(held, _)| !*held).count()
    }

    pub fn reasons(&self) -> Vec<WakeReason> {
        self.log.lock().iter().map(|&(_, reason)| reason).collect()
    }
}

impl WakeLock for CountingWake {
    fn acquire(&self, reason: WakeReason) {
        self.log.lock().push((true, reason));
    }

    fn release(&self, reason: WakeReason) {
        self.log.lock().push((false, reason));
    }
}

/// Primary-side table over a fresh region.
pub(crate) fn table(channels: usize, slots: u16) -> Table {
    let config = LinkConfig::default()
        .with_channels(channels)
        .with_slots(slots);
    let ram = config.build_region().expect("region");
    ChannelTable::new(
        CoreSide::Primary,
        config,
        ram,
        RecordingDoorbell::default(),
        CountingWake::default(),
    )
    .expect("table")
}

/// Publishes `batch` as the peer's in-flight list, starting at slot 0.
pub(crate) fn peer_publish(t: &Table, channel: ChannelId, batch: &[&'static [u8]]) {
    let ram = t.peer_ram(channel);
    for (idx, payload) in batch.iter().enumerate() {
        let idx = idx as u16;
        ram.pool().write(idx, *payload);
        if idx > 0 {
            ram.pool().link(idx - 1, Some(idx));
        }
    }
    ram.publish((!batch.is_empty()).then_some(0));
}
