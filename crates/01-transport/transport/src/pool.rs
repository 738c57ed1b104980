//! Fixed-size descriptor pools.
//!
//! Every channel owns one pool per core side, sized once when the shared
//! region is built. Slots are addressed by index locally and by address on the
//! wire; [`DescriptorPool::index_of`] converts a peer-supplied address back
//! into an index and rejects anything that is not the start of one of this
//! pool's slots, so a corrupt link can never be dereferenced.

use std::mem;

use crate::descriptor::Descriptor;
use crate::error::ListFault;
use crate::{TransportError, TransportResult};

/// Descriptor slots backing one side of one channel.
#[derive(Debug)]
pub struct DescriptorPool {
    slots: Box<[Descriptor]>,
}

impl DescriptorPool {
    /// Allocates `slot_count` empty descriptors.
    pub fn new(slot_count: u16) -> TransportResult<Self> {
        if slot_count == 0 {
            return Err(TransportError::InvalidPoolSize {
                requested: 0,
                minimum: 1,
            });
        }
        let slots = (0..slot_count).map(|_| Descriptor::empty()).collect();
        Ok(Self { slots })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// # Panics
    ///
    /// Panics if `idx` is out of range.
    pub fn descriptor(&self, idx: u16) -> &Descriptor {
        assert!(
            (idx as usize) < self.slots.len(),
            "descriptor {idx} out of range"
        );
        &self.slots[idx as usize]
    }

    /// Wire address of slot `idx`, or null for `None`.
    pub fn address_of(&self, idx: Option<u16>) -> *const Descriptor {
        match idx {
            Some(idx) => self.descriptor(idx) as *const Descriptor,
            None => std::ptr::null(),
        }
    }

    /// Maps a wire address back to a slot index.
    ///
    /// Null maps to `Ok(None)` (end of list).
    pub fn index_of(&self, addr: *const Descriptor) -> Result<Option<u16>, ListFault> {
        let addr = addr as usize;
        if addr == 0 {
            return Ok(None);
        }
        let stride = mem::size_of::<Descriptor>();
        let base = self.slots.as_ptr() as usize;
        let end = base + stride * self.slots.len();
        if addr < base || addr >= end {
            return Err(ListFault::OutOfPool { addr });
        }
        let offset = addr - base;
        if offset % stride != 0 {
            return Err(ListFault::Misaligned { addr });
        }
        Ok(Some((offset / stride) as u16))
    }

    /// Attaches `payload` to slot `idx` and terminates it.
    pub fn write(&self, idx: u16, payload: &'static [u8]) {
        let desc = self.descriptor(idx);
        desc.store_payload(payload);
        desc.store_next(std::ptr::null());
    }

    /// Points slot `idx` at `next` (or terminates it).
    pub fn link(&self, idx: u16, next: Option<u16>) {
        let next = self.address_of(next);
        self.descriptor(idx).store_next(next);
    }

    /// Zeroes slot `idx` after it returns to the free list.
    pub fn scrub(&self, idx: u16) {
        self.descriptor(idx).clear();
    }

    /// Reads slot `idx` as the peer published it.
    pub fn read(&self, idx: u16) -> Result<PeerMessage, ListFault> {
        let desc = self.descriptor(idx);
        let payload = desc.payload()?;
        let next = self.index_of(desc.load_next())?;
        Ok(PeerMessage {
            slot: idx,
            payload,
            next,
        })
    }

    /// Walks a list starting at `head`, yielding at most `len()` entries.
    pub fn walk(&self, head: Option<u16>) -> PeerWalk<'_> {
        PeerWalk {
            pool: self,
            cursor: head,
            visited: 0,
            done: false,
        }
    }
}

/// One descriptor as read from a peer list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PeerMessage {
    pub slot: u16,
    pub payload: &'static [u8],
    pub next: Option<u16>,
}

/// Read-only traversal of a peer-published list.
///
/// The walk never writes a descriptor. It stops after the first fault and
/// reports [`ListFault::Unterminated`] instead of looping forever when the
/// links form a cycle.
pub struct PeerWalk<'a> {
    pool: &'a DescriptorPool,
    cursor: Option<u16>,
    visited: usize,
    done: bool,
}

impl Iterator for PeerWalk<'_> {
    type Item = Result<PeerMessage, ListFault>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let Some(idx) = self.cursor else {
            self.done = true;
            return None;
        };
        if self.visited >= self.pool.len() {
            self.done = true;
            return Some(Err(ListFault::Unterminated {
                budget: self.pool.len(),
            }));
        }
        self.visited += 1;
        match self.pool.read(idx) {
            Ok(message) => {
                self.cursor = message.next;
                Some(Ok(message))
            }
            Err(fault) => {
                self.done = true;
                Some(Err(fault))
            }
        }
    }
}

/// Stack of free slot indices owned by the local side of a channel.
///
/// Capacity is reserved up front; pushes never reallocate.
#[derive(Debug)]
pub struct FreeList {
    stack: Vec<u16>,
    capacity: u16,
}

impl FreeList {
    /// A list holding every index in `0..capacity`; pops yield ascending indices.
    pub fn full(capacity: u16) -> Self {
        let mut stack = Vec::with_capacity(capacity as usize);
        stack.extend((0..capacity).rev());
        Self { stack, capacity }
    }

    pub fn pop(&mut self) -> Option<u16> {
        self.stack.pop()
    }

    /// Returns `idx` to the list.
    ///
    /// # Panics
    ///
    /// Panics if `idx` is out of range.
    pub fn push(&mut self, idx: u16) {
        assert!(idx < self.capacity, "slot {idx} out of range");
        debug_assert!(
            !self.stack.contains(&idx),
            "slot {idx} released twice"
        );
        debug_assert!(self.stack.len() < self.capacity as usize);
        self.stack.push(idx);
    }

    /// Restores every index, abandoning whatever was checked out.
    pub fn refill(&mut self) {
        self.stack.clear();
        self.stack.extend((0..self.capacity).rev());
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn capacity(&self) -> u16 {
        self.capacity
    }
}
