//! Interrupt-driven message link between two cores sharing RAM.
//!
//! A [`ChannelTable`] is one core's view of the link. Applications open
//! channels, [`send`](ChannelTable::send) borrowed `'static` buffers and
//! receive through per-channel handlers; the platform's interrupt vector feeds
//! doorbell edges into [`on_doorbell`](ChannelTable::on_doorbell) and its
//! power manager calls [`power_resync`](ChannelTable::power_resync) after a
//! sleep that resets interrupt masks.
//!
//! * Send engine: one in-flight batch announced to the peer plus one pending
//!   batch, promoted when the peer signals completion.
//! * Receive engine: walks the peer's published list, supports partial
//!   consumption and explicit acknowledgement (flow control).
//! * Busy coordinator: folds per-channel activity into one wake lock.
//!
//! Nothing on the message path allocates or blocks.

mod busy;
mod channel;
mod config;
mod error;
mod metrics;
mod recv;
mod resync;
mod send;
mod table;

#[cfg(all(test, not(feature = "loom")))]
mod testing;

pub use busy::BusyAggregate;
pub use channel::{Handlers, RxHandler, TxHandler};
pub use config::{LinkConfig, LinkKind};
pub use error::{CloseError, ConfigError, OpenError, SendError};
pub use metrics::{ChannelSnapshot, MetricsSnapshot};
pub use table::ChannelTable;

pub use corelink_transport::{ChannelId, CoreSide, Doorbell, Event, SharedRam, WakeLock, WakeReason};
