use corelink_transport::{ChannelId, TransportError};
use thiserror::Error;

/// Failures opening a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OpenError {
    #[error("{0} is not configured on this link")]
    InvalidChannel(ChannelId),

    /// Both producers must agree on the acknowledgement protocol; a silent
    /// mismatch loses messages later.
    #[error("{channel} is open with flow control {current}, refusing to reopen with {requested}")]
    AlreadyOpenWithDifferentMode {
        channel: ChannelId,
        current: bool,
        requested: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CloseError {
    #[error("{0} is not configured on this link")]
    InvalidChannel(ChannelId),
}

/// Failures queueing a message. None of them touch the channel's lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("{0} is not configured on this link")]
    InvalidChannel(ChannelId),

    #[error("{0} is not open")]
    ChannelNotOpen(ChannelId),

    /// Every descriptor is in flight or pending; retry after a completion.
    #[error("{0} has no free descriptor")]
    PoolExhausted(ChannelId),

    #[error("{len} byte message does not fit the 32-bit length field on {channel}")]
    TooLarge { channel: ChannelId, len: usize },
}

/// Invalid link configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid shared region layout: {0}")]
    Layout(#[from] TransportError),

    #[error(
        "shared region holds {region_channels} channels x {region_slots} slots, \
         config expects {config_channels} x {config_slots}"
    )]
    RegionMismatch {
        config_channels: usize,
        config_slots: u16,
        region_channels: usize,
        region_slots: u16,
    },
}
