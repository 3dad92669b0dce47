use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TimerError {
    #[error("slot count must be at least 1, got {0}")]
    InvalidSlotCount(usize),

    #[error("tick interval must be at least 1ms, got {0:?}")]
    InvalidTickInterval(Duration),

    #[error("time wheel [{0}] is already started")]
    AlreadyStarted(String),

    #[error("time wheel [{0}] is stopped")]
    Stopped(String),

    #[error("Internal Error:{0:?}")]
    Spawn(String),
}
