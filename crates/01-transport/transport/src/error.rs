//! Error types for the shared-memory layer.
//!
//! Layout errors only surface while a region is being built. List faults are
//! raised while walking a list the peer published and are resolved locally by
//! the receive engine; they never travel back across the link.

use thiserror::Error;

/// Convenience result alias for fallible transport operations.
pub type TransportResult<T, E = TransportError> = Result<T, E>;

/// Errors surfaced while sizing a shared region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Channel count is zero or exceeds the doorbell bank width.
    #[error("channel count {requested} must be between 1 and {maximum}")]
    InvalidChannelCount { requested: usize, maximum: usize },
    /// Descriptor pools must hold at least one slot.
    #[error("descriptor pool of {requested} slots must hold at least {minimum}")]
    InvalidPoolSize { requested: usize, minimum: usize },
}

/// Inconsistencies detected in a peer-published descriptor list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ListFault {
    /// A link points outside the peer's descriptor pool for this channel.
    #[error("descriptor address {addr:#x} lies outside the peer pool")]
    OutOfPool { addr: usize },
    /// A link points inside the pool but not at the start of a slot.
    #[error("descriptor address {addr:#x} is not slot aligned")]
    Misaligned { addr: usize },
    /// A descriptor announces bytes but carries no buffer address.
    #[error("descriptor announces {len} bytes at a null address")]
    NullPayload { len: usize },
    /// The list visited more descriptors than the pool holds, so it loops.
    #[error("descriptor list did not terminate within {budget} entries")]
    Unterminated { budget: usize },
}
