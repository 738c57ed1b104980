use std::fmt;

/// Upper bound on channels per link; one bit per channel in a 64-bit word.
pub const MAX_CHANNELS: usize = 64;

/// Identifier of a logical message stream multiplexed over the doorbells.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChannelId(u8);

impl ChannelId {
    pub const fn new(raw: u8) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u8 {
        self.0
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Single-bit mask used by per-channel bitsets.
    pub const fn bit(self) -> u64 {
        1u64 << (self.0 as u32 % MAX_CHANNELS as u32)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch{}", self.0)
    }
}

impl From<u8> for ChannelId {
    fn from(raw: u8) -> Self {
        Self(raw)
    }
}

/// Doorbell events carried per channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Event {
    /// The sender published a new in-flight list.
    Send,
    /// The receiver finished with the list it was handed.
    RecvDone,
}

impl Event {
    pub const ALL: [Event; 2] = [Event::Send, Event::RecvDone];

    pub const fn index(self) -> usize {
        match self {
            Event::Send => 0,
            Event::RecvDone => 1,
        }
    }
}

/// Which of the two cores a link instance runs on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CoreSide {
    Primary,
    Secondary,
}

impl CoreSide {
    pub const BOTH: [CoreSide; 2] = [CoreSide::Primary, CoreSide::Secondary];

    pub const fn peer(self) -> Self {
        match self {
            CoreSide::Primary => CoreSide::Secondary,
            CoreSide::Secondary => CoreSide::Primary,
        }
    }

    pub const fn index(self) -> usize {
        match self {
            CoreSide::Primary => 0,
            CoreSide::Secondary => 1,
        }
    }
}
