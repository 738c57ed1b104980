//! The RAM region both cores address.
//!
//! For each core side and channel the region holds a [`DescriptorPool`] and a
//! [`HeadCell`]. A side publishes its in-flight list head into its own cell;
//! the peer reads that cell when the send doorbell fires. Nothing else in the
//! region is written by more than one side.

use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

use crate::descriptor::Descriptor;
use crate::error::ListFault;
use crate::event::{ChannelId, CoreSide, MAX_CHANNELS};
use crate::pool::DescriptorPool;
use crate::{TransportError, TransportResult};

/// Mailbox location holding one side's in-flight list head.
#[derive(Debug)]
pub struct HeadCell {
    head: AtomicPtr<Descriptor>,
}

impl HeadCell {
    const fn new() -> Self {
        Self {
            head: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// Release-stores `head`; every descriptor write before this call is
    /// visible to a peer that acquires the cell afterwards.
    pub fn publish(&self, head: *const Descriptor) {
        self.head.store(head.cast_mut(), Ordering::Release);
    }

    pub fn load(&self) -> *const Descriptor {
        self.head.load(Ordering::Acquire)
    }
}

/// One side of one channel inside the shared region.
#[derive(Debug)]
pub struct ChannelRam {
    pool: DescriptorPool,
    head: HeadCell,
}

impl ChannelRam {
    fn new(slots: u16) -> TransportResult<Self> {
        Ok(Self {
            pool: DescriptorPool::new(slots)?,
            head: HeadCell::new(),
        })
    }

    pub fn pool(&self) -> &DescriptorPool {
        &self.pool
    }

    pub fn head(&self) -> &HeadCell {
        &self.head
    }

    /// Publishes slot `head` (or an empty list) as this side's in-flight list.
    pub fn publish(&self, head: Option<u16>) {
        self.head.publish(self.pool.address_of(head));
    }

    /// Reads the published head back as a validated slot index.
    pub fn published(&self) -> Result<Option<u16>, ListFault> {
        self.pool.index_of(self.head.load())
    }
}

/// Shared region backing a two-core link.
#[derive(Debug)]
pub struct SharedRam {
    slots_per_channel: u16,
    sides: [Box<[ChannelRam]>; 2],
}

impl SharedRam {
    /// Lays out `channels` channels with `slots_per_channel` descriptors per side.
    pub fn new(channels: usize, slots_per_channel: u16) -> TransportResult<Self> {
        if channels == 0 || channels > MAX_CHANNELS {
            return Err(TransportError::InvalidChannelCount {
                requested: channels,
                maximum: MAX_CHANNELS,
            });
        }
        let side = || {
            (0..channels)
                .map(|_| ChannelRam::new(slots_per_channel))
                .collect::<TransportResult<Box<[ChannelRam]>>>()
        };
        Ok(Self {
            slots_per_channel,
            sides: [side()?, side()?],
        })
    }

    pub fn channels(&self) -> usize {
        self.sides[0].len()
    }

    pub fn slots_per_channel(&self) -> u16 {
        self.slots_per_channel
    }

    /// Region for `channel` as seen from `side`, if the channel exists.
    pub fn channel(&self, side: CoreSide, channel: ChannelId) -> Option<&ChannelRam> {
        self.sides[side.index()].get(channel.index())
    }
}
