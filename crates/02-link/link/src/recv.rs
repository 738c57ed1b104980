//! Receive engine.
//!
//! A pass walks the peer's published list (or resumes a saved continuation)
//! outside the channel's critical section, then settles the outcome under it:
//! acknowledge, wait for [`rx_done`](ChannelTable::rx_done), or park a
//! continuation. Only one pass runs per channel at a time: the `rx_active`
//! guard is what keeps a channel to a single continuation. A doorbell that
//! lands while another context is mid-pass stays raised and fires again when
//! that pass re-arms the line. An `rx_done` that lands mid-pass is held until
//! the pass settles.

use std::sync::atomic::{AtomicBool, Ordering};

use corelink_transport::{ChannelId, Doorbell, Event, ListFault, WakeLock};
use log::{debug, trace, warn};

use crate::channel::{Continuation, RxHandler};
use crate::metrics::Counter;
use crate::table::{Channel, ChannelTable};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Trigger {
    Doorbell,
    Resume,
}

enum Start {
    Resume(Continuation),
    Head(Option<u16>),
    Fault(ListFault),
}

enum PassEnd {
    Complete,
    Partial(Continuation),
    Fault(ListFault),
    Empty,
}

/// Clears the channel's active flag if a pass unwinds out of a handler.
struct ActivePass<'a> {
    flag: &'a AtomicBool,
    armed: bool,
}

impl<'a> ActivePass<'a> {
    fn enter(flag: &'a AtomicBool) -> Option<Self> {
        if flag.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(Self { flag, armed: true })
    }

    fn finish(mut self) {
        self.flag.store(false, Ordering::Release);
        self.armed = false;
    }
}

impl Drop for ActivePass<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.flag.store(false, Ordering::Release);
        }
    }
}

impl<D: Doorbell, W: WakeLock> ChannelTable<D, W> {
    /// Send-indication doorbell: the peer published a new list.
    pub(crate) fn on_send_indication(&self, ch: &Channel) {
        self.doorbell.mask_local(ch.id, Event::Send);
        self.receive_pass(ch, Trigger::Doorbell);
    }

    /// Acknowledges a fully received batch on a flow-controlled channel and
    /// re-arms the send indication. Called while a pass is running (from the
    /// receive handler or another context), the acknowledgement is sent when
    /// that pass completes its batch. Otherwise does nothing unless a batch is
    /// waiting for acknowledgement.
    pub fn rx_done(&self, channel: ChannelId) {
        let Some(ch) = self.channel(channel) else {
            return;
        };
        let mut st = ch.state.lock();
        if st.opened && st.flow_control && !st.awaiting_done && ch.rx_busy() {
            st.ack_requested = true;
            trace!("{channel}: rx_done during receive pass, deferred");
            return;
        }
        if !st.opened || !st.awaiting_done {
            trace!("{channel}: rx_done with nothing to acknowledge");
            return;
        }
        st.awaiting_done = false;
        self.doorbell.clear_local(channel, Event::Send);
        self.doorbell.notify_peer(channel, Event::RecvDone);
        if st.rx_armed() {
            self.doorbell.unmask_local(channel, Event::Send);
        }
        trace!("{channel}: acknowledged");
    }

    /// Re-enables reception. A message left partially consumed is resumed
    /// right away, on the calling context.
    pub fn start_recv(&self, channel: ChannelId) {
        let Some(ch) = self.channel(channel) else {
            return;
        };
        let resume = {
            let mut st = ch.state.lock();
            if !st.opened {
                return;
            }
            st.rx_stopped = false;
            if st.continuation.is_some() {
                true
            } else {
                if st.rx_armed() && !ch.rx_busy() {
                    self.doorbell.unmask_local(channel, Event::Send);
                }
                false
            }
        };
        if resume {
            debug!("{channel}: resuming partially consumed message");
            self.receive_pass(ch, Trigger::Resume);
        }
    }

    /// Masks the send indication until [`start_recv`](Self::start_recv).
    pub fn stop_recv(&self, channel: ChannelId) {
        let Some(ch) = self.channel(channel) else {
            return;
        };
        let mut st = ch.state.lock();
        if !st.opened {
            return;
        }
        st.rx_stopped = true;
        self.doorbell.mask_local(channel, Event::Send);
    }

    fn receive_pass(&self, ch: &Channel, trigger: Trigger) {
        let id = ch.id;
        let Some(active) = ActivePass::enter(&ch.rx_active) else {
            trace!("{id}: receive pass already running ({trigger:?})");
            return;
        };
        if trigger == Trigger::Doorbell {
            self.doorbell.clear_local(id, Event::Send);
        }

        let (start, epoch, mut rx) = {
            let mut st = ch.state.lock();
            if !st.opened {
                active.finish();
                return;
            }
            let start = match (st.continuation.take(), trigger) {
                (Some(cont), _) => Start::Resume(cont),
                (None, Trigger::Doorbell) => match self.peer_ram(id).published() {
                    Ok(head) => Start::Head(head),
                    Err(fault) => Start::Fault(fault),
                },
                (None, Trigger::Resume) => {
                    st.ack_requested = false;
                    active.finish();
                    return;
                }
            };
            (start, st.epoch, st.handlers.rx.take())
        };

        let mut delivered = 0;
        let end = 'walk: {
            let head = match start {
                Start::Fault(fault) => break 'walk PassEnd::Fault(fault),
                Start::Head(None) => break 'walk PassEnd::Empty,
                Start::Head(head) => head,
                Start::Resume(cont) => {
                    if let Some(rest) = deliver(id, &mut rx, cont.rest) {
                        break 'walk PassEnd::Partial(Continuation {
                            rest,
                            next: cont.next,
                        });
                    }
                    delivered += 1;
                    cont.next
                }
            };
            for entry in self.peer_ram(id).pool().walk(head) {
                let message = match entry {
                    Ok(message) => message,
                    Err(fault) => break 'walk PassEnd::Fault(fault),
                };
                if let Some(rest) = deliver(id, &mut rx, message.payload) {
                    break 'walk PassEnd::Partial(Continuation {
                        rest,
                        next: message.next,
                    });
                }
                delivered += 1;
            }
            PassEnd::Complete
        };

        let mut st = ch.state.lock();
        if st.epoch != epoch {
            debug!("{id}: channel reset during receive pass");
            active.finish();
            if st.rx_armed() {
                self.doorbell.unmask_local(id, Event::Send);
            }
            return;
        }
        st.handlers.rx = rx;
        ch.metrics.add(Counter::Delivered, delivered);

        let ack = match end {
            PassEnd::Complete if st.flow_control => {
                let requested = std::mem::take(&mut st.ack_requested);
                st.awaiting_done = !requested;
                requested
            }
            PassEnd::Complete => true,
            PassEnd::Partial(cont) => {
                trace!("{id}: {} bytes left unconsumed", cont.rest.len());
                st.continuation = Some(cont);
                ch.metrics.bump(Counter::Partial);
                false
            }
            PassEnd::Fault(fault) => {
                st.ack_requested = false;
                warn!("{id}: dropping corrupt peer list: {fault}");
                ch.metrics.bump(Counter::Resync);
                true
            }
            PassEnd::Empty => {
                st.ack_requested = false;
                warn!("{id}: send indication with an empty peer list");
                ch.metrics.bump(Counter::Resync);
                false
            }
        };
        active.finish();

        if ack {
            self.doorbell.notify_peer(id, Event::RecvDone);
        }
        if st.rx_armed() {
            self.doorbell.unmask_local(id, Event::Send);
        }
        trace!("{id}: receive pass delivered {delivered} (ack {ack})");
    }
}

/// Hands `buf` to the receive handler. Returns the unconsumed tail, if any.
fn deliver(
    id: ChannelId,
    rx: &mut Option<RxHandler>,
    buf: &'static [u8],
) -> Option<&'static [u8]> {
    let handler = rx
        .as_mut()
        .unwrap_or_else(|| panic!("{id}: message arrived without a receive handler"));
    let mut processed = handler(buf);
    if processed > buf.len() {
        warn!(
            "{id}: handler consumed {processed} of a {} byte buffer",
            buf.len()
        );
        processed = buf.len();
    }
    (processed < buf.len()).then(|| &buf[processed..])
}
