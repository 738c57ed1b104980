//! Send engine: one announced batch in flight, one pending batch behind it.

use corelink_transport::{ChannelId, Doorbell, Event, WakeLock};
use log::{trace, warn};

use crate::channel::Enqueued;
use crate::error::SendError;
use crate::metrics::Counter;
use crate::table::{Channel, ChannelTable};

impl<D: Doorbell, W: WakeLock> ChannelTable<D, W> {
    /// Queues `data` on `channel`.
    ///
    /// An idle channel announces the message to the peer immediately;
    /// otherwise it waits on the pending list until the current batch
    /// completes. `data` is handed back through the completion handler once
    /// the peer is done with it. Marks the channel busy before returning.
    pub fn send(&self, channel: ChannelId, data: &'static [u8]) -> Result<(), SendError> {
        let ch = self
            .channel(channel)
            .ok_or(SendError::InvalidChannel(channel))?;
        if u32::try_from(data.len()).is_err() {
            return Err(SendError::TooLarge {
                channel,
                len: data.len(),
            });
        }

        let mut st = ch.state.lock();
        if !st.opened {
            return Err(SendError::ChannelNotOpen(channel));
        }
        let Some(idx) = st.claim(data) else {
            ch.metrics.bump(Counter::PoolExhausted);
            trace!("{channel}: no free descriptor for {} bytes", data.len());
            return Err(SendError::PoolExhausted(channel));
        };

        let ram = self.local_ram(channel);
        ram.pool().write(idx, data);
        self.busy.set_busy(channel, true);
        match st.enqueue(idx) {
            Enqueued::InFlight => {
                ram.publish(Some(idx));
                self.doorbell.notify_peer(channel, Event::Send);
                trace!("{channel}: slot {idx} announced ({} bytes)", data.len());
            }
            Enqueued::Pending { after } => {
                if let Some(tail) = after {
                    ram.pool().link(tail, Some(idx));
                }
                trace!("{channel}: slot {idx} pending ({} bytes)", data.len());
            }
        }
        ch.metrics.bump(Counter::Sent);
        Ok(())
    }

    /// Completion doorbell: the peer finished with the in-flight batch.
    pub(crate) fn on_recv_done(&self, ch: &Channel) {
        let id = ch.id;
        self.doorbell.clear_local(id, Event::RecvDone);

        let (mut tx, epoch, mut cursor) = {
            let mut st = ch.state.lock();
            if !st.opened {
                return;
            }
            if st.in_flight.is_empty() {
                ch.metrics.bump(Counter::Resync);
                warn!("{id}: completion doorbell with nothing in flight");
                return;
            }
            (st.handlers.tx.take(), st.epoch, st.in_flight.head)
        };

        let ram = self.local_ram(id);
        let mut completed = 0;
        while let Some(idx) = cursor {
            let (payload, next) = {
                let st = ch.state.lock();
                if st.epoch != epoch {
                    return;
                }
                st.entry(idx)
            };
            let handler = tx
                .as_mut()
                .unwrap_or_else(|| panic!("{id}: send completed without a completion handler"));
            handler(payload);

            let mut st = ch.state.lock();
            if st.epoch != epoch {
                return;
            }
            ram.pool().scrub(idx);
            st.release(idx);
            completed += 1;
            cursor = next;
        }

        let mut st = ch.state.lock();
        if st.epoch != epoch {
            return;
        }
        st.handlers.tx = tx;
        ch.metrics.add(Counter::Completed, completed);
        match st.promote_pending() {
            Some(head) => {
                ram.publish(Some(head));
                self.doorbell.notify_peer(id, Event::Send);
                trace!(
                    "{id}: {completed} completed, {} promoted",
                    st.in_flight.len
                );
            }
            None => {
                ram.publish(None);
                self.busy.set_busy(id, false);
                trace!("{id}: {completed} completed, idle");
            }
        }
    }
}
