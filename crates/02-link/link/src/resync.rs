use corelink_transport::{Doorbell, Event, WakeLock};
use log::debug;

use crate::table::ChannelTable;

impl<D: Doorbell, W: WakeLock> ChannelTable<D, W> {
    /// Restores doorbell masks after a sleep state that reset them.
    ///
    /// Must run before any other interrupt is serviced on wake. Every open
    /// channel gets its completion doorbell back. The send indication is not
    /// unconditionally unmasked: it is unmasked only where reception was armed
    /// before the sleep and re-masked otherwise. Stopped channels, and those
    /// waiting on `rx_done` or a partial message, stay masked. Lines raised
    /// during the transition fire once unmasked.
    pub fn power_resync(&self) {
        let mut armed = 0;
        let mut held = 0;
        for ch in self.channels() {
            let st = ch.state.lock();
            if !st.opened {
                continue;
            }
            self.doorbell.unmask_local(ch.id, Event::RecvDone);
            if st.rx_armed() && !ch.rx_busy() {
                self.doorbell.unmask_local(ch.id, Event::Send);
                armed += 1;
            } else {
                self.doorbell.mask_local(ch.id, Event::Send);
                held += 1;
            }
        }
        debug!("power resync: {armed} channels receiving, {held} held masked");
    }
}
