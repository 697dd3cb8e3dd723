//! Seams where the host plugs into the engine.

use anyhow::Result;
use rewind_history::Action;
use serde_json::Value;

/// The host's state transition. Should be pure: no I/O, no side effects.
///
/// Mutates `state` in place. The engine hands over a copy of the previous
/// state, so on `Err` (or a panic) the copy is discarded and the last good
/// state is kept.
pub trait Reducer<S>: Send + Sync {
    fn reduce(&self, state: &mut S, action: &Action) -> Result<()>;
}

impl<S, F> Reducer<S> for F
where
    F: Fn(&mut S, &Action) -> Result<()> + Send + Sync,
{
    fn reduce(&self, state: &mut S, action: &Action) -> Result<()> {
        self(state, action)
    }
}

/// Receives actions that are not history operations.
///
/// Monitor actions never reach the action log or the reducer. The monitor
/// folds them into `LiftedState::monitor_state` for inspector-side UI state.
pub trait Monitor: Send + Sync {
    fn reduce(&self, monitor_state: &mut Value, action: &Action);
}

/// Ignores every monitor action; monitor state stays `null`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMonitor;

impl Monitor for NoopMonitor {
    fn reduce(&self, _monitor_state: &mut Value, _action: &Action) {}
}
