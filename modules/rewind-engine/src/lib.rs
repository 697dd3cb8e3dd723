//! Lifted-state engine: time travel for reducer-driven application state.
//!
//! Records every action, caches every intermediate state, and lets a
//! developer skip actions, jump to any past state, commit, roll back and
//! reset without losing the ability to keep going forward.
//!
//! Consumers supply the state type and a `Reducer` (pure state updates).
//! Inspectors drive the engine with `LiftedAction`s and observe it through
//! published `LiftedState` snapshots.

pub mod config;
pub mod devtools;
pub mod error;
pub mod fold;
pub mod publish;
pub mod retention;
pub mod traits;

pub use config::{load_config, DevtoolsConfig};
pub use devtools::Devtools;
pub use error::{ConfigError, EngineError, EngineResult};
pub use fold::FoldCache;
pub use publish::Publisher;
pub use retention::RetentionPolicy;
pub use traits::{Monitor, NoopMonitor, Reducer};

pub use rewind_history::{
    same_entries, Action, ActionId, ComputedEntry, ComputedStates, LiftedAction, LiftedState,
    PerformedAction, INTERRUPTED_ERROR,
};
