//! Local per-channel state.
//!
//! The wire lists live in shared RAM as linked descriptors; this side mirrors
//! its own lists as slot indices so traversal never has to trust an address.
//! Each checked-out slot remembers the `'static` buffer it carries, which is
//! what completion handlers receive back.

use std::fmt;

use corelink_transport::FreeList;

/// Receive handler: returns how many bytes of the buffer it consumed.
pub type RxHandler = Box<dyn FnMut(&[u8]) -> usize + Send>;

/// Completion handler: receives each sent buffer back once the peer is done.
pub type TxHandler = Box<dyn FnMut(&'static [u8]) + Send>;

/// Handlers registered when a channel opens.
///
/// A channel that receives without a receive handler, or completes a send
/// without a completion handler, panics.
#[derive(Default)]
pub struct Handlers {
    pub(crate) rx: Option<RxHandler>,
    pub(crate) tx: Option<TxHandler>,
}

impl Handlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_receive<F>(mut self, handler: F) -> Self
    where
        F: FnMut(&[u8]) -> usize + Send + 'static,
    {
        self.rx = Some(Box::new(handler));
        self
    }

    pub fn on_sent<F>(mut self, handler: F) -> Self
    where
        F: FnMut(&'static [u8]) + Send + 'static,
    {
        self.tx = Some(Box::new(handler));
        self
    }
}

impl fmt::Debug for Handlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handlers")
            .field("rx", &self.rx.is_some())
            .field("tx", &self.tx.is_some())
            .finish()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct SlotList {
    pub head: Option<u16>,
    pub tail: Option<u16>,
    pub len: u16,
}

impl SlotList {
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }
}

/// Where an interrupted receive pass resumes: the unconsumed tail of the
/// current peer buffer, then the descriptor that followed it.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Continuation {
    pub rest: &'static [u8],
    pub next: Option<u16>,
}

pub(crate) enum Enqueued {
    /// The slot became the in-flight head; announce it.
    InFlight,
    /// The slot joined the pending list behind `after`.
    Pending { after: Option<u16> },
}

pub(crate) struct ChannelState {
    pub opened: bool,
    pub flow_control: bool,
    /// Bumped on every open and close so contexts that dropped the lock
    /// mid-walk can tell the lists were reset underneath them.
    pub epoch: u32,
    pub handlers: Handlers,
    pub free: FreeList,
    payloads: Box<[Option<&'static [u8]>]>,
    links: Box<[Option<u16>]>,
    pub in_flight: SlotList,
    pub pending: SlotList,
    pub continuation: Option<Continuation>,
    /// Flow control: a pass finished and waits for `rx_done`.
    pub awaiting_done: bool,
    /// Flow control: `rx_done` arrived while a pass was still running.
    pub ack_requested: bool,
    /// The application called `stop_recv`.
    pub rx_stopped: bool,
}

impl ChannelState {
    pub fn new(slots: u16) -> Self {
        Self {
            opened: false,
            flow_control: false,
            epoch: 0,
            handlers: Handlers::default(),
            free: FreeList::full(slots),
            payloads: vec![None; slots as usize].into_boxed_slice(),
            links: vec![None; slots as usize].into_boxed_slice(),
            in_flight: SlotList::default(),
            pending: SlotList::default(),
            continuation: None,
            awaiting_done: false,
            ack_requested: false,
            rx_stopped: false,
        }
    }

    /// Empties every list and returns all slots to the free list. Anything
    /// in flight is abandoned without callbacks.
    pub fn reset(&mut self) {
        self.free.refill();
        self.payloads.fill(None);
        self.links.fill(None);
        self.in_flight = SlotList::default();
        self.pending = SlotList::default();
        self.continuation = None;
        self.awaiting_done = false;
        self.ack_requested = false;
        self.rx_stopped = false;
        self.epoch = self.epoch.wrapping_add(1);
    }

    /// Pops a free slot and attaches `payload` to it.
    pub fn claim(&mut self, payload: &'static [u8]) -> Option<u16> {
        let idx = self.free.pop()?;
        debug_assert!(self.payloads[idx as usize].is_none());
        self.payloads[idx as usize] = Some(payload);
        self.links[idx as usize] = None;
        Some(idx)
    }

    /// Links a claimed slot into the in-flight list when it is idle, or onto
    /// the pending list otherwise.
    pub fn enqueue(&mut self, idx: u16) -> Enqueued {
        if self.in_flight.is_empty() {
            self.in_flight = SlotList {
                head: Some(idx),
                tail: Some(idx),
                len: 1,
            };
            return Enqueued::InFlight;
        }
        let after = self.pending.tail;
        match after {
            Some(tail) => self.links[tail as usize] = Some(idx),
            None => self.pending.head = Some(idx),
        }
        self.pending.tail = Some(idx);
        self.pending.len += 1;
        Enqueued::Pending { after }
    }

    /// Buffer and successor of a checked-out slot.
    ///
    /// # Panics
    ///
    /// Panics if `idx` is on the free list.
    pub fn entry(&self, idx: u16) -> (&'static [u8], Option<u16>) {
        let payload = self.payloads[idx as usize]
            .unwrap_or_else(|| panic!("slot {idx} is not checked out"));
        (payload, self.links[idx as usize])
    }

    /// Returns a walked in-flight slot to the free list.
    pub fn release(&mut self, idx: u16) {
        self.payloads[idx as usize] = None;
        self.links[idx as usize] = None;
        self.free.push(idx);
    }

    /// Installs the pending list as the next in-flight batch.
    pub fn promote_pending(&mut self) -> Option<u16> {
        self.in_flight = std::mem::take(&mut self.pending);
        self.in_flight.head
    }

    /// Whether the send-indication doorbell should be unmasked right now.
    pub fn rx_armed(&self) -> bool {
        self.opened && !self.rx_stopped && !self.awaiting_done && self.continuation.is_none()
    }
}
