//! Shared-memory primitives for the inter-core message link.
//!
//! Two cores exchange messages through a RAM region both can address and a
//! handful of doorbell interrupt lines. This crate owns the pieces both sides
//! agree on byte for byte:
//! * [`Descriptor`] – the `#[repr(C)]` singly linked record the peer walks.
//! * [`DescriptorPool`] / [`FreeList`] – fixed per-channel descriptor slots.
//! * [`SharedRam`] – the region holding both sides' pools and head cells.
//! * [`Doorbell`] / [`WakeLock`] – the hardware and power collaborators.
//! * [`TransportError`] / [`ListFault`] – layout validation failures.

mod descriptor;
mod doorbell;
mod error;
mod event;
mod pool;
mod shared;
mod wake;

pub use descriptor::Descriptor;
pub use doorbell::Doorbell;
pub use error::{ListFault, TransportError, TransportResult};
pub use event::{ChannelId, CoreSide, Event, MAX_CHANNELS};
pub use pool::{DescriptorPool, FreeList, PeerMessage, PeerWalk};
pub use shared::{ChannelRam, HeadCell, SharedRam};
pub use wake::{WakeLock, WakeReason};
