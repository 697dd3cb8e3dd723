//! The fold cache: action log plus memoized computed states.
//!
//! `computed_states[i]` is the fold of `staged_action_ids[..=i]` (minus skipped
//! ids) over `committed_state`. Every operation names the first position it
//! invalidates and recomputes from there; positions before it are never
//! touched and the reducer is never called for them.

use std::any::Any;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;


use rewind_history::{
    Action, ActionId, ComputedEntry, ComputedStates, LiftedState, PerformedAction,
    INIT_ACTION_ID,
};
use tracing::{debug, error};

use crate::error::{EngineError, EngineResult};
use crate::traits::Reducer;

pub struct FoldCache<S> {
    lifted: LiftedState<S>,
    reducer: Box<dyn Reducer<S>>,
    /// Seed for `reset`.
    initial_state: S,
}

impl<S: Clone> FoldCache<S> {
    pub fn new(reducer: impl Reducer<S> + 'static, initial_state: S) -> Self {
        Self {
            lifted: LiftedState::new(initial_state.clone()),
            reducer: Box::new(reducer),
            initial_state,
        }
    }

    pub fn lifted(&self) -> &LiftedState<S> {
        &self.lifted
    }

    pub(crate) fn lifted_mut(&mut self) -> &mut LiftedState<S> {
        &mut self.lifted
    }

    /// Record an action and fold it onto the newest cached entry.
    ///
    /// The current index follows the newest entry only if it was already
    /// there; after a jump into the past it stays where it was put.
    pub fn append(&mut self, performed: PerformedAction) -> EngineResult<ActionId> {
        let following_tip = self.lifted.current_state_index == self.lifted.last_index();

        let id = self.lifted.next_action_id;
        self.lifted.next_action_id = id.checked_add(1).ok_or(EngineError::ActionIdsExhausted)?;
        self.lifted.actions_by_id.insert(id, performed);
        self.lifted.staged_action_ids.push(id);

        let position = self.lifted.last_index();
        self.recompute_from(position);

        if following_tip {
            self.lifted.current_state_index = position;
        }
        Ok(id)
    }

    /// Recompute every cached entry at `index` and beyond, seeded from the
    /// entry at `index - 1`. Returns the number of reducer invocations.
    pub fn recompute_from(&mut self, index: usize) -> usize {
        let lifted = &mut self.lifted;
        let staged_len = lifted.staged_action_ids.len();
        let start = index.min(lifted.computed_states.len());

        if start >= staged_len && lifted.computed_states.len() == staged_len {
            return 0;
        }

        let computed = &mut lifted.computed_states;
        computed.truncate(start);

        let mut calls = 0;
        for position in start..staged_len {
            let id = lifted.staged_action_ids[position];

            let entry = match computed.back() {
                None => ComputedEntry::ok(lifted.committed_state.clone()),
                Some(previous) if lifted.skipped_action_ids.contains(&id) => {
                    ComputedEntry::ok(previous.state.clone())
                }
                Some(previous) if previous.is_error() => {
                    ComputedEntry::interrupted(previous.state.clone())
                }
                Some(previous) => match lifted.actions_by_id.get(&id) {
                    Some(performed) => {
                        calls += 1;
                        reduce_entry(self.reducer.as_ref(), &previous.state, &performed.action)
                    }
                    None => ComputedEntry::failed(
                        previous.state.clone(),
                        format!("action {id} is missing from the log"),
                    ),
                },
            };
            computed.push_back(Arc::new(entry));
        }

        debug!(from = start, to = staged_len, reducer_calls = calls, "recomputed states");
        calls
    }

    /// Flip `id` in or out of the fold, recomputing from its position.
    pub fn toggle_action(&mut self, id: ActionId) -> EngineResult<usize> {
        if id == INIT_ACTION_ID {
            return Err(EngineError::InitActionLocked);
        }
        let position = self
            .lifted
            .position_of(id)
            .ok_or(EngineError::UnknownActionId(id))?;

        if !self.lifted.skipped_action_ids.remove(&id) {
            self.lifted.skipped_action_ids.insert(id);
        }
        self.recompute_from(position);
        Ok(position)
    }

    /// Move the current pointer. Never touches the cache.
    pub fn jump_to_state(&mut self, index: usize) -> EngineResult<()> {
        let len = self.lifted.staged_len();
        if index >= len {
            return Err(EngineError::IndexOutOfRange { index, len });
        }
        self.lifted.current_state_index = index;
        Ok(())
    }

    /// Drop skipped actions from the log for good. Returns how many staged
    /// actions were removed.
    pub fn sweep(&mut self) -> usize {
        if self.lifted.skipped_action_ids.is_empty() {
            return 0;
        }

        let lifted = &mut self.lifted;
        let skipped = mem::take(&mut lifted.skipped_action_ids);
        let Some(first_removed) = lifted
            .staged_action_ids
            .iter()
            .position(|id| skipped.contains(id))
        else {
            for id in &skipped {
                lifted.actions_by_id.remove(id);
            }
            return 0;
        };

        let staged = mem::take(&mut lifted.staged_action_ids);
        let entries = mem::take(&mut lifted.computed_states);
        let before = staged.len();

        let mut computed = ComputedStates::new();
        for (id, entry) in staged.into_iter().zip(entries) {
            if skipped.contains(&id) {
                lifted.actions_by_id.remove(&id);
            } else {
                lifted.staged_action_ids.push(id);
                computed.push_back(entry);
            }
        }
        for id in &skipped {
            lifted.actions_by_id.remove(id);
        }

        let remaining = lifted.staged_action_ids.len();
        lifted.current_state_index = lifted.current_state_index.min(remaining - 1);

        // A skipped entry passed on a clean state even after an error, so the
        // entries it shielded must now be re-marked as interrupted. With no
        // skipped ids left that recompute never reaches the reducer.
        let first_error = computed
            .iter()
            .enumerate()
            .skip(first_removed.saturating_sub(1))
            .find(|(_, entry)| entry.is_error())
            .map(|(position, _)| position);
        lifted.computed_states = computed;
        if let Some(position) = first_error {
            self.recompute_from(position + 1);
        }

        before - remaining
    }

    /// Checkpoint at the current state; all staged history is discarded.
    pub fn commit(&mut self) {
        let committed = self.lifted.current_state().clone();
        self.restart(committed);
    }

    /// Discard staged history and return to the last checkpoint.
    pub fn rollback(&mut self) {
        let committed = self.lifted.committed_state.clone();
        self.restart(committed);
    }

    /// Discard everything back to the initial state.
    pub fn reset(&mut self) {
        let initial = self.initial_state.clone();
        self.restart(initial);
    }

    /// Swap the fold function and recompute the whole staged history.
    pub fn replace_reducer(&mut self, reducer: impl Reducer<S> + 'static) -> usize {
        self.reducer = Box::new(reducer);
        self.recompute_from(0)
    }

    /// Replace the whole aggregate. The imported cache is trusted as is.
    pub fn import_state(&mut self, lifted: LiftedState<S>) -> EngineResult<()> {
        lifted.validate()?;
        self.lifted = lifted;
        Ok(())
    }

    /// Fold the oldest non-INIT action into the committed state.
    ///
    /// Refuses (returns `None`) when nothing is staged beside INIT or when that
    /// action's entry carries an error: committing it would hide the failure.
    pub fn commit_oldest(&mut self) -> Option<ActionId> {
        let lifted = &mut self.lifted;
        if lifted.staged_action_ids.len() < 2 || lifted.computed_states.get(1)?.is_error() {
            return None;
        }

        let id = lifted.staged_action_ids.remove(1);
        lifted.actions_by_id.remove(&id);
        lifted.skipped_action_ids.remove(&id);

        lifted.computed_states.pop_front();
        lifted.committed_state = lifted.computed_states[0].state.clone();
        lifted.current_state_index = lifted.current_state_index.saturating_sub(1);

        Some(id)
    }

    /// New generation seeded with `committed`; monitor state carries over.
    fn restart(&mut self, committed: S) {
        let monitor_state = mem::take(&mut self.lifted.monitor_state);
        self.lifted = LiftedState::new(committed);
        self.lifted.monitor_state = monitor_state;
    }
}

/// The single call site of the host reducer. Failures never escape: they
/// become an error entry holding the last good state.
fn reduce_entry<S: Clone>(
    reducer: &dyn Reducer<S>,
    previous: &S,
    action: &Action,
) -> ComputedEntry<S> {
    let mut next = previous.clone();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| reducer.reduce(&mut next, action)));

    let message = match outcome {
        Ok(Ok(())) => return ComputedEntry::ok(next),
        Ok(Err(err)) => format!("{err:#}"),
        Err(payload) => format!("panicked: {}", panic_message(payload.as_ref())),
    };

    error!(
        action_type = action.kind().unwrap_or_default(),
        error = %message,
        "reducer failed"
    );
    ComputedEntry::failed(previous.clone(), message)
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
