//! Generic, domain-agnostic history model for a reducer-driven application.
//!
//! Holds the append-only action log, the staged/skipped bookkeeping and the
//! cache of computed states as one serializable aggregate (`LiftedState`).
//! Zero knowledge of how states are computed: that is the engine's job.
//!
//! Consumers provide their own state type; actions are opaque `{ "type", ...payload }`
//! records that serialize to `serde_json::Value`.

pub mod error;
pub mod lifted;
pub mod types;

pub use error::{HistoryError, HistoryResult};
pub use lifted::{
    is_lifted_type, same_entries, ActionLog, ComputedStates, LiftedAction, LiftedState,
    LIFTED_ACTION_TYPES,
};
pub use types::{
    Action, ActionId, ComputedEntry, PerformedAction, INIT_ACTION_ID, INIT_ACTION_TYPE,
    INTERRUPTED_ERROR,
};
