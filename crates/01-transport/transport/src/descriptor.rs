//! Wire format of a message descriptor.
//!
//! ```text
//! +-----------------+-----------------+-----------+
//! | next: *Desc     | data: *u8       | len: u32  |
//! +-----------------+-----------------+-----------+
//! ```
//!
//! Fields are word-sized atomics so both cores may touch the record without a
//! data race; the layout is identical to the plain-pointer form the peer
//! firmware expects. Individual field accesses are relaxed: visibility is
//! established by the release store of the list head and the doorbell that
//! follows it.

use std::ptr;
use std::slice;
use std::sync::atomic::{AtomicPtr, AtomicU32, Ordering};

use crate::error::ListFault;

#[repr(C)]
#[derive(Debug)]
pub struct Descriptor {
    next: AtomicPtr<Descriptor>,
    data: AtomicPtr<u8>,
    len: AtomicU32,
}

impl Descriptor {
    pub(crate) const fn empty() -> Self {
        Self {
            next: AtomicPtr::new(ptr::null_mut()),
            data: AtomicPtr::new(ptr::null_mut()),
            len: AtomicU32::new(0),
        }
    }

    pub(crate) fn store_payload(&self, payload: &'static [u8]) {
        debug_assert!(payload.len() <= u32::MAX as usize);
        self.data
            .store(payload.as_ptr().cast_mut(), Ordering::Relaxed);
        self.len.store(payload.len() as u32, Ordering::Relaxed);
    }

    pub(crate) fn store_next(&self, next: *const Descriptor) {
        self.next.store(next.cast_mut(), Ordering::Relaxed);
    }

    pub(crate) fn load_next(&self) -> *const Descriptor {
        self.next.load(Ordering::Relaxed)
    }

    /// Length field as published on the wire.
    pub fn wire_len(&self) -> u32 {
        self.len.load(Ordering::Relaxed)
    }

    /// Reconstructs the payload slice a sender attached to this descriptor.
    pub(crate) fn payload(&self) -> Result<&'static [u8], ListFault> {
        let data = self.data.load(Ordering::Relaxed);
        let len = self.len.load(Ordering::Relaxed) as usize;
        if len == 0 {
            return Ok(&[]);
        }
        if data.is_null() {
            return Err(ListFault::NullPayload { len });
        }
        // SAFETY: senders only store pointers taken from `&'static [u8]`
        // buffers together with their exact length (`store_payload`), so the
        // range stays valid and immutable for the rest of the program.
        Ok(unsafe { slice::from_raw_parts(data.cast_const(), len) })
    }

    pub(crate) fn clear(&self) {
        self.next.store(ptr::null_mut(), Ordering::Relaxed);
        self.data.store(ptr::null_mut(), Ordering::Relaxed);
        self.len.store(0, Ordering::Relaxed);
    }
}
