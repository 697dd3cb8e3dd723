//! Shared reducers and helpers for engine tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use rewind_engine::{Action, ComputedEntry, Devtools, DevtoolsConfig, LiftedState, Reducer};

// ---------------------------------------------------------------------------
// Reducers
// ---------------------------------------------------------------------------

pub fn counter(state: &mut i64, action: &Action) -> Result<()> {
    match action.kind() {
        Some("INCREMENT") => *state += 1,
        Some("DECREMENT") => *state -= 1,
        _ => {}
    }
    Ok(())
}

/// DECREMENT reads an undefined variable.
pub fn counter_with_bug(state: &mut i64, action: &Action) -> Result<()> {
    match action.kind() {
        Some("INCREMENT") => *state += 1,
        Some("DECREMENT") => return Err(anyhow!("ReferenceError: mistake is not defined")),
        _ => {}
    }
    Ok(())
}

/// INCREMENT reads an undefined variable.
pub fn counter_with_another_bug(state: &mut i64, action: &Action) -> Result<()> {
    match action.kind() {
        Some("INCREMENT") => return Err(anyhow!("ReferenceError: mistake is not defined")),
        Some("DECREMENT") => *state -= 1,
        _ => {}
    }
    Ok(())
}

pub fn double_counter(state: &mut i64, action: &Action) -> Result<()> {
    match action.kind() {
        Some("INCREMENT") => *state += 2,
        Some("DECREMENT") => *state -= 2,
        _ => {}
    }
    Ok(())
}

/// Counts invocations; never changes the state.
#[derive(Clone, Default)]
pub struct CountingReducer {
    pub calls: Arc<AtomicUsize>,
}

impl CountingReducer {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Reducer<i64> for CountingReducer {
    fn reduce(&self, _state: &mut i64, _action: &Action) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn devtools(reducer: impl Reducer<i64> + 'static) -> Devtools<i64> {
    Devtools::new(reducer, 0, DevtoolsConfig::default()).unwrap()
}

pub fn devtools_with_max_age(reducer: impl Reducer<i64> + 'static, max_age: usize) -> Devtools<i64> {
    Devtools::new(reducer, 0, DevtoolsConfig::default().with_max_age(max_age)).unwrap()
}

pub fn dispatch(devtools: &mut Devtools<i64>, kind: &str) {
    devtools.dispatch_perform(Action::new(kind)).unwrap();
}

/// Fold the staged history from scratch, ignoring the cache entirely.
pub fn refold<S: Clone>(
    lifted: &LiftedState<S>,
    reducer: &dyn Reducer<S>,
) -> Vec<ComputedEntry<S>> {
    let mut entries: Vec<ComputedEntry<S>> = Vec::with_capacity(lifted.staged_action_ids.len());
    for id in &lifted.staged_action_ids {
        let entry = match entries.last() {
            None => ComputedEntry::ok(lifted.committed_state.clone()),
            Some(previous) if lifted.is_skipped(*id) => ComputedEntry::ok(previous.state.clone()),
            Some(previous) if previous.is_error() => {
                ComputedEntry::interrupted(previous.state.clone())
            }
            Some(previous) => {
                let mut next = previous.state.clone();
                let action = lifted.action(*id).expect("staged action is logged");
                match reducer.reduce(&mut next, action) {
                    Ok(()) => ComputedEntry::ok(next),
                    Err(err) => ComputedEntry::failed(previous.state.clone(), format!("{err:#}")),
                }
            }
        };
        entries.push(entry);
    }
    entries
}

/// The cached entries, unwrapped for comparison with `refold`.
pub fn entries<S: Clone>(lifted: &LiftedState<S>) -> Vec<ComputedEntry<S>> {
    lifted.computed_states.iter().map(|entry| (**entry).clone()).collect()
}

pub fn states(lifted: &LiftedState<i64>) -> Vec<i64> {
    lifted.computed_states.iter().map(|entry| entry.state).collect()
}
