//! Channel registry and interrupt entry point.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use corelink_transport::{ChannelId, ChannelRam, CoreSide, Doorbell, Event, SharedRam, WakeLock};
use log::{debug, error, warn};
use parking_lot::Mutex;

use crate::busy::BusyAggregate;
use crate::channel::{ChannelState, Handlers};
use crate::config::LinkConfig;
use crate::error::{CloseError, ConfigError, OpenError};
use crate::metrics::{ChannelMetrics, ChannelSnapshot};

pub(crate) struct Channel {
    pub id: ChannelId,
    /// Critical section guarding lists, free slots and arming state.
    pub state: Mutex<ChannelState>,
    /// Set while a receive pass runs on any context.
    pub rx_active: AtomicBool,
    pub metrics: ChannelMetrics,
}

/// One core's end of a two-core link.
///
/// All methods take `&self`; the table is shared between application
/// contexts and the interrupt context that calls
/// [`on_doorbell`](Self::on_doorbell). Handlers never run inside a channel's
/// critical section, so they may call back into the table.
pub struct ChannelTable<D, W> {
    side: CoreSide,
    config: LinkConfig,
    ram: Arc<SharedRam>,
    pub(crate) doorbell: D,
    pub(crate) busy: BusyAggregate<W>,
    channels: Box<[Channel]>,
}

impl<D: Doorbell, W: WakeLock> ChannelTable<D, W> {
    /// Builds `side`'s view of the link living in `ram`.
    pub fn new(
        side: CoreSide,
        config: LinkConfig,
        ram: Arc<SharedRam>,
        doorbell: D,
        wake: W,
    ) -> Result<Self, ConfigError> {
        config.check_region(&ram)?;
        let channels = (0..config.channels)
            .map(|raw| Channel {
                id: ChannelId::new(raw as u8),
                state: Mutex::new(ChannelState::new(config.slots_per_channel)),
                rx_active: AtomicBool::new(false),
                metrics: ChannelMetrics::default(),
            })
            .collect();
        debug!(
            "{} link ({:?}): {} channels x {} descriptors",
            config.kind.name(),
            side,
            config.channels,
            config.slots_per_channel
        );
        Ok(Self {
            side,
            busy: BusyAggregate::new(wake, config.wake_reason),
            config,
            ram,
            doorbell,
            channels,
        })
    }

    pub fn side(&self) -> CoreSide {
        self.side
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn doorbell(&self) -> &D {
        &self.doorbell
    }

    pub fn busy(&self) -> &BusyAggregate<W> {
        &self.busy
    }

    /// Opens `channel`, or resets it if already open in the same mode.
    ///
    /// Publishes an empty in-flight list and unmasks both doorbells. A
    /// send indication that arrived while the channel was closed fires as
    /// soon as it is unmasked.
    pub fn open(
        &self,
        channel: ChannelId,
        handlers: Handlers,
        flow_control: bool,
    ) -> Result<(), OpenError> {
        let ch = self
            .channel(channel)
            .ok_or(OpenError::InvalidChannel(channel))?;
        let mut st = ch.state.lock();
        if st.opened && st.flow_control != flow_control {
            error!(
                "{channel}: open with flow control {flow_control} while open with {}",
                st.flow_control
            );
            return Err(OpenError::AlreadyOpenWithDifferentMode {
                channel,
                current: st.flow_control,
                requested: flow_control,
            });
        }
        if st.opened {
            debug!(
                "{channel}: reopened, abandoning {} in flight and {} pending",
                st.in_flight.len, st.pending.len
            );
        }

        st.reset();
        st.flow_control = flow_control;
        st.handlers = handlers;
        st.opened = true;
        self.local_ram(channel).publish(None);
        self.busy.set_busy(channel, false);
        self.doorbell.unmask_local(channel, Event::Send);
        self.doorbell.unmask_local(channel, Event::RecvDone);
        debug!("{channel}: open (flow control {flow_control})");
        Ok(())
    }

    /// Closes `channel`. Messages still in flight or pending are dropped
    /// without completion callbacks.
    pub fn close(&self, channel: ChannelId) -> Result<(), CloseError> {
        let ch = self
            .channel(channel)
            .ok_or(CloseError::InvalidChannel(channel))?;
        let mut st = ch.state.lock();
        self.doorbell.mask_local(channel, Event::Send);
        self.doorbell.mask_local(channel, Event::RecvDone);
        if !st.opened {
            return Ok(());
        }

        let abandoned = st.in_flight.len + st.pending.len;
        st.reset();
        st.opened = false;
        st.handlers = Handlers::default();
        self.local_ram(channel).publish(None);
        self.busy.set_busy(channel, false);
        if abandoned > 0 {
            debug!("{channel}: closed with {abandoned} messages outstanding");
        } else {
            debug!("{channel}: closed");
        }
        Ok(())
    }

    pub fn is_open(&self, channel: ChannelId) -> bool {
        self.channel(channel)
            .map(|ch| ch.state.lock().opened)
            .unwrap_or(false)
    }

    pub fn snapshot(&self, channel: ChannelId) -> Option<ChannelSnapshot> {
        let ch = self.channel(channel)?;
        let st = ch.state.lock();
        Some(ChannelSnapshot {
            channel,
            opened: st.opened,
            flow_control: st.flow_control,
            busy: self.busy.is_busy(channel),
            in_flight: st.in_flight.len as usize,
            pending: st.pending.len as usize,
            free: st.free.len(),
            continuation: st.continuation.map(|c| c.rest.len()),
            awaiting_done: st.awaiting_done,
            receiving: st.rx_armed(),
            metrics: ch.metrics.snapshot(),
        })
    }

    /// Interrupt entry: a doorbell `event` fired for `channel`.
    pub fn on_doorbell(&self, channel: ChannelId, event: Event) {
        let Some(ch) = self.channel(channel) else {
            warn!("doorbell {event:?} on unconfigured {channel}");
            return;
        };
        match event {
            Event::Send => self.on_send_indication(ch),
            Event::RecvDone => self.on_recv_done(ch),
        }
    }

    pub(crate) fn channel(&self, id: ChannelId) -> Option<&Channel> {
        self.channels.get(id.index())
    }

    pub(crate) fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter()
    }

    pub(crate) fn local_ram(&self, id: ChannelId) -> &ChannelRam {
        self.ram_of(self.side, id)
    }

    pub(crate) fn peer_ram(&self, id: ChannelId) -> &ChannelRam {
        self.ram_of(self.side.peer(), id)
    }

    fn ram_of(&self, side: CoreSide, id: ChannelId) -> &ChannelRam {
        self.ram.channel(side, id).unwrap_or_else(|| {
            unreachable!(
                "{id} missing from a region checked against {} channels",
                self.config.channels
            )
        })
    }
}

impl Channel {
    pub(crate) fn rx_busy(&self) -> bool {
        self.rx_active.load(Ordering::Acquire)
    }
}
