use std::sync::Arc;

use corelink::{ChannelTable, LinkConfig};
use corelink_transport::{CoreSide, SharedRam};

use crate::bank::{DoorbellBank, SimDoorbell};
use crate::error::{SimError, SimResult};
use crate::irq::IrqThread;
use crate::wake::SimWakeLock;

/// A channel table wired to simulated collaborators.
pub type SimTable = ChannelTable<SimDoorbell, Arc<SimWakeLock>>;

/// Dispatch rounds [`SimLink::pump`] runs before declaring a livelock.
pub const PUMP_ROUND_LIMIT: usize = 10_000;

/// Both ends of one link over a shared region and doorbell bank.
pub struct SimLink {
    config: LinkConfig,
    ram: Arc<SharedRam>,
    bank: Arc<DoorbellBank>,
    wakes: [Arc<SimWakeLock>; 2],
    tables: [Arc<SimTable>; 2],
}

impl SimLink {
    pub fn new(config: LinkConfig) -> SimResult<Self> {
        let ram = config.build_region()?;
        let bank = Arc::new(DoorbellBank::new());
        let wakes = [Arc::new(SimWakeLock::new()), Arc::new(SimWakeLock::new())];
        let table = |side: CoreSide| -> SimResult<Arc<SimTable>> {
            Ok(Arc::new(ChannelTable::new(
                side,
                config,
                Arc::clone(&ram),
                bank.doorbell(side),
                Arc::clone(&wakes[side.index()]),
            )?))
        };
        let tables = [table(CoreSide::Primary)?, table(CoreSide::Secondary)?];
        tracing::debug!(
            "{} link simulated: {} channels x {} descriptors",
            config.kind.name(),
            config.channels,
            config.slots_per_channel
        );
        Ok(Self {
            config,
            ram,
            bank,
            wakes,
            tables,
        })
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn ram(&self) -> &Arc<SharedRam> {
        &self.ram
    }

    pub fn bank(&self) -> &Arc<DoorbellBank> {
        &self.bank
    }

    pub fn table(&self, side: CoreSide) -> &Arc<SimTable> {
        &self.tables[side.index()]
    }

    pub fn primary(&self) -> &Arc<SimTable> {
        self.table(CoreSide::Primary)
    }

    pub fn secondary(&self) -> &Arc<SimTable> {
        self.table(CoreSide::Secondary)
    }

    pub fn wake(&self, side: CoreSide) -> &SimWakeLock {
        &self.wakes[side.index()]
    }

    /// Delivers fireable doorbells on both cores on the calling thread until
    /// none remain. Returns the number of interrupts dispatched.
    ///
    /// Do not mix with running [`IrqThread`]s for the same link.
    pub fn pump(&self) -> SimResult<usize> {
        let mut dispatched = 0;
        for _ in 0..PUMP_ROUND_LIMIT {
            let mut progressed = false;
            for side in CoreSide::BOTH {
                for (channel, event) in self.bank.fireable(side) {
                    if !self.bank.is_fireable(side, channel, event) {
                        continue;
                    }
                    self.table(side).on_doorbell(channel, event);
                    dispatched += 1;
                    progressed = true;
                }
            }
            if !progressed {
                return Ok(dispatched);
            }
        }
        Err(SimError::Livelock {
            rounds: PUMP_ROUND_LIMIT,
        })
    }

    /// Drops `side` through a mask-resetting sleep and back, running the
    /// power resync hook on wake.
    pub fn power_cycle(&self, side: CoreSide) {
        self.bank.power_loss(side);
        tracing::debug!("{side:?} core lost doorbell masks");
        self.table(side).power_resync();
    }

    /// Starts a thread servicing `side`'s interrupts.
    pub fn spawn_irq(&self, side: CoreSide) -> SimResult<IrqThread> {
        IrqThread::spawn(Arc::clone(self.table(side)), Arc::clone(&self.bank), side)
    }
}

#[cfg(test)]
mod tests {
    use corelink::{ChannelId, Event, Handlers};

    use super::*;

    static PING: [u8; 4] = *b"ping";

    #[test]
    fn pump_carries_a_message_both_ways() {
        let link = SimLink::new(LinkConfig::default()).expect("link");
        let ch = ChannelId::new(0);
        let (rx, got) = crossbeam_channel::unbounded();
        let (done, completed) = crossbeam_channel::unbounded();
        link.primary()
            .open(ch, Handlers::new().on_sent(move |buf| done.send(buf).expect("done")), false)
            .expect("open primary");
        link.secondary()
            .open(
                ch,
                Handlers::new().on_receive(move |buf| {
                    rx.send(buf.to_vec()).expect("rx");
                    buf.len()
                }),
                false,
            )
            .expect("open secondary");

        link.primary().send(ch, &PING).expect("send");
        assert!(link.wake(CoreSide::Primary).held());
        let dispatched = link.pump().expect("pump");

        assert_eq!(dispatched, 2);
        assert_eq!(got.try_recv().expect("delivered"), b"ping".to_vec());
        assert_eq!(completed.try_recv().expect("completed"), &PING[..]);
        assert!(!link.wake(CoreSide::Primary).held());
        assert_eq!(link.bank().notifications(CoreSide::Secondary, Event::RecvDone), 1);
    }

    #[test]
    fn power_cycle_rearms_open_channels() {
        let link = SimLink::new(LinkConfig::default()).expect("link");
        let ch = ChannelId::new(1);
        link.secondary()
            .open(ch, Handlers::new().on_receive(|buf| buf.len()), false)
            .expect("open");
        link.bank().power_loss(CoreSide::Secondary);
        assert!(link.bank().is_masked(CoreSide::Secondary, ch, Event::Send));

        link.power_cycle(CoreSide::Secondary);
        assert!(!link.bank().is_masked(CoreSide::Secondary, ch, Event::Send));
        assert!(!link.bank().is_masked(CoreSide::Secondary, ch, Event::RecvDone));
        assert!(link.bank().is_masked(CoreSide::Secondary, ChannelId::new(0), Event::Send));
    }
}
