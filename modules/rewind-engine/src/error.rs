//! Typed errors for engine operations and configuration.

use rewind_history::{ActionId, HistoryError};
use thiserror::Error;

/// Errors raised synchronously to the caller of an engine operation.
/// A failing operation leaves the lifted state untouched.
///
/// Reducer failures are not here: they are captured into the history.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Actions may not have an undefined \"type\" property. Have you misspelled a constant?")]
    InvalidAction,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("unknown action id: {0}")]
    UnknownActionId(ActionId),

    #[error("the @@INIT action cannot be toggled")]
    InitActionLocked,

    #[error("state index {index} out of range (staged actions: {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("action ids exhausted: nextActionId cannot advance")]
    ActionIdsExhausted,

    #[error(transparent)]
    History(#[from] HistoryError),
}

/// Configuration rejected at construction or reconfiguration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Devtools 'maxAge' cannot be less than 2, got {0}")]
    MaxAgeTooSmall(usize),

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
