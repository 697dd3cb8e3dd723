//! Core types for the action log. Domain-agnostic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::HistoryError;

/// Identifier of an action within the current log generation.
/// Generations restart at commit, rollback, reset and import.
pub type ActionId = u64;

/// The synthetic action at staged position 0 always carries this id.
pub const INIT_ACTION_ID: ActionId = 0;

pub const INIT_ACTION_TYPE: &str = "@@INIT";

/// Error recorded on every entry downstream of a failed reduction.
pub const INTERRUPTED_ERROR: &str = "Interrupted by an error up the chain";

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// An opaque tagged record: `{ "type": ..., ...payload }`.
///
/// `kind` is `None` when the record has no usable `type` (missing or null).
/// Such actions never make it into the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl Action {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: Some(kind.into()),
            payload: Map::new(),
        }
    }

    /// An action without a `type`. Only useful for exercising validation.
    pub fn untyped() -> Self {
        Self {
            kind: None,
            payload: Map::new(),
        }
    }

    pub fn init() -> Self {
        Self::new(INIT_ACTION_TYPE)
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    pub fn kind(&self) -> Option<&str> {
        self.kind.as_deref()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    pub fn is_init(&self) -> bool {
        self.kind() == Some(INIT_ACTION_TYPE)
    }
}

impl TryFrom<Value> for Action {
    type Error = HistoryError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Ok(serde_json::from_value(value)?)
    }
}

// ---------------------------------------------------------------------------
// PerformedAction
// ---------------------------------------------------------------------------

/// An entry of the action log: the action plus when it was recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformedAction {
    pub action: Action,
    pub timestamp: DateTime<Utc>,
}

impl PerformedAction {
    pub fn new(action: Action, timestamp: DateTime<Utc>) -> Self {
        Self { action, timestamp }
    }

    pub fn now(action: Action) -> Self {
        Self::new(action, Utc::now())
    }

    pub fn init() -> Self {
        Self::now(Action::init())
    }
}

// ---------------------------------------------------------------------------
// ComputedEntry
// ---------------------------------------------------------------------------

/// One cached fold result. On error `state` is the last good state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputedEntry<S> {
    pub state: S,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<S> ComputedEntry<S> {
    pub fn ok(state: S) -> Self {
        Self { state, error: None }
    }

    pub fn failed(state: S, error: impl Into<String>) -> Self {
        Self {
            state,
            error: Some(error.into()),
        }
    }

    pub fn interrupted(state: S) -> Self {
        Self::failed(state, INTERRUPTED_ERROR)
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn is_interrupted(&self) -> bool {
        self.error.as_deref() == Some(INTERRUPTED_ERROR)
    }
}
