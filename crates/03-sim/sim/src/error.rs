use corelink::{ConfigError, OpenError, SendError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("invalid link configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to open channel: {0}")]
    Open(#[from] OpenError),

    #[error("send failed: {0}")]
    Send(#[from] SendError),

    #[error("doorbells still firing after {rounds} dispatch rounds")]
    Livelock { rounds: usize },

    #[error("scenario stalled with {completed} of {expected} messages completed")]
    Stalled { completed: usize, expected: usize },

    #[error("failed to spawn interrupt thread: {0}")]
    Spawn(#[source] std::io::Error),
}

pub type SimResult<T> = Result<T, SimError>;
