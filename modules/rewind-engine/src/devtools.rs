//! The dispatch gateway.

use std::sync::Arc;

use futures::Stream;
use rewind_history::{Action, ActionId, LiftedAction, LiftedState, PerformedAction};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::DevtoolsConfig;
use crate::error::{EngineError, EngineResult};
use crate::fold::FoldCache;
use crate::publish::Publisher;
use crate::retention::RetentionPolicy;
use crate::traits::{Monitor, NoopMonitor, Reducer};

/// A time-travel engine around one application state.
///
/// Validate → route → fold → retain → publish. Every operation runs to
/// completion before the next; a failing one mutates nothing and publishes
/// nothing. Engines share no globals, so any number can coexist.
pub struct Devtools<S> {
    cache: FoldCache<S>,
    retention: RetentionPolicy,
    monitor: Box<dyn Monitor>,
    publisher: Publisher<S>,
    config: DevtoolsConfig,
}

impl<S> Devtools<S>
where
    S: Clone + Send + Sync + 'static,
{
    pub fn new(
        reducer: impl Reducer<S> + 'static,
        initial_state: S,
        config: DevtoolsConfig,
    ) -> EngineResult<Self> {
        config.validate()?;
        let retention = RetentionPolicy::new(config.max_age)?;
        let cache = FoldCache::new(reducer, initial_state);
        let publisher = Publisher::new(cache.lifted());

        debug!(engine = %config.name, max_age = ?config.max_age, "devtools started");

        Ok(Self {
            cache,
            retention,
            monitor: Box::new(NoopMonitor),
            publisher,
            config,
        })
    }

    pub fn with_monitor(mut self, monitor: impl Monitor + 'static) -> Self {
        self.monitor = Box::new(monitor);
        self
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    /// Record an ordinary application action. Returns its id.
    pub fn dispatch_perform(&mut self, action: Action) -> EngineResult<ActionId> {
        self.perform(PerformedAction::now(action))
    }

    /// Route a typed history operation.
    pub fn apply(&mut self, lifted: LiftedAction<S>) -> EngineResult<()> {
        match lifted {
            LiftedAction::PerformAction { action, timestamp } => {
                self.perform(PerformedAction::new(action, timestamp))?;
                Ok(())
            }
            LiftedAction::Reset => {
                self.reset();
                Ok(())
            }
            LiftedAction::Rollback => {
                self.rollback();
                Ok(())
            }
            LiftedAction::Commit => {
                self.commit();
                Ok(())
            }
            LiftedAction::Sweep => {
                self.sweep();
                Ok(())
            }
            LiftedAction::ToggleAction { id } => self.toggle_action(id),
            LiftedAction::JumpToState { index } => self.jump_to_state(index),
            LiftedAction::ImportState { next_lifted_state } => {
                self.import_state(*next_lifted_state)
            }
        }
    }

    fn perform(&mut self, performed: PerformedAction) -> EngineResult<ActionId> {
        let Some(kind) = performed.action.kind() else {
            warn!(engine = %self.config.name, "rejected action without a type");
            return Err(EngineError::InvalidAction);
        };
        debug!(engine = %self.config.name, action_type = kind, "perform");

        let id = self.cache.append(performed)?;
        self.retention.enforce(&mut self.cache);
        self.publish();
        Ok(id)
    }

    /// Feed a non-history action to the monitor. The fold is left alone, so
    /// the published cache keeps its identity.
    fn monitor_action(&mut self, action: &Action) {
        debug!(
            engine = %self.config.name,
            action_type = action.kind().unwrap_or_default(),
            "monitor action"
        );
        let lifted = self.cache.lifted_mut();
        self.monitor.reduce(&mut lifted.monitor_state, action);
        self.publish();
    }

    // -----------------------------------------------------------------------
    // History operations
    // -----------------------------------------------------------------------

    pub fn toggle_action(&mut self, id: ActionId) -> EngineResult<()> {
        let position = self.cache.toggle_action(id)?;
        debug!(
            engine = %self.config.name,
            action_id = id,
            position,
            skipped = self.cache.lifted().is_skipped(id),
            "toggled action"
        );
        self.retention.enforce(&mut self.cache);
        self.publish();
        Ok(())
    }

    pub fn jump_to_state(&mut self, index: usize) -> EngineResult<()> {
        self.cache.jump_to_state(index)?;
        debug!(engine = %self.config.name, index, "jumped to state");
        self.publish();
        Ok(())
    }

    pub fn sweep(&mut self) {
        let removed = self.cache.sweep();
        debug!(engine = %self.config.name, removed, "swept skipped actions");
        self.publish();
    }

    pub fn commit(&mut self) {
        self.cache.commit();
        info!(engine = %self.config.name, "committed history");
        self.publish();
    }

    pub fn rollback(&mut self) {
        self.cache.rollback();
        info!(engine = %self.config.name, "rolled back to last commit");
        self.publish();
    }

    pub fn reset(&mut self) {
        self.cache.reset();
        info!(engine = %self.config.name, "reset to initial state");
        self.publish();
    }

    /// Swap the reducer and recompute all staged history with it. Errors it
    /// clears may unblock auto-commits, which then flush in the same step.
    pub fn replace_reducer(&mut self, reducer: impl Reducer<S> + 'static) {
        let calls = self.cache.replace_reducer(reducer);
        let committed = self.retention.enforce(&mut self.cache);
        info!(
            engine = %self.config.name,
            reducer_calls = calls,
            auto_committed = committed,
            "replaced reducer"
        );
        self.publish();
    }

    /// Replace the whole lifted state. Nothing is recomputed.
    pub fn import_state(&mut self, lifted: LiftedState<S>) -> EngineResult<()> {
        if let Err(err) = self.cache.import_state(lifted) {
            warn!(engine = %self.config.name, error = %err, "rejected import");
            return Err(err);
        }
        info!(
            engine = %self.config.name,
            staged = self.cache.lifted().staged_len(),
            "imported lifted state"
        );
        self.publish();
        Ok(())
    }

    pub fn export_state(&self) -> LiftedState<S> {
        self.cache.lifted().clone()
    }

    /// Validate and apply a new configuration, trimming history right away
    /// if the new bound is tighter.
    pub fn reconfigure(&mut self, config: DevtoolsConfig) -> EngineResult<()> {
        config.validate()?;
        self.retention = RetentionPolicy::new(config.max_age)?;
        self.config = config;

        let committed = self.retention.enforce(&mut self.cache);
        info!(
            engine = %self.config.name,
            max_age = ?self.config.max_age,
            auto_committed = committed,
            "reconfigured"
        );
        self.publish();
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Observation
    // -----------------------------------------------------------------------

    pub fn lifted_state(&self) -> &LiftedState<S> {
        self.cache.lifted()
    }

    /// The unlifted state at the current index.
    pub fn state(&self) -> &S {
        self.cache.lifted().current_state()
    }

    pub fn config(&self) -> &DevtoolsConfig {
        &self.config
    }

    /// The snapshot most recently handed to subscribers.
    pub fn published(&self) -> Arc<LiftedState<S>> {
        self.publisher.latest_lifted()
    }

    pub fn subscribe_lifted(&self) -> watch::Receiver<Arc<LiftedState<S>>> {
        self.publisher.subscribe_lifted()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<S> {
        self.publisher.subscribe_state()
    }

    pub fn lifted_stream(&self) -> impl Stream<Item = Arc<LiftedState<S>>> + Send + 'static {
        self.publisher.lifted_stream()
    }

    pub fn state_stream(&self) -> impl Stream<Item = S> + Send + 'static {
        self.publisher.state_stream()
    }

    fn publish(&self) {
        self.publisher.publish(self.cache.lifted());
    }
}

impl<S> Devtools<S>
where
    S: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Inspector-side entry point. History operations are decoded and routed;
    /// any other type is a monitor action and never reaches the log.
    pub fn dispatch(&mut self, action: Action) -> EngineResult<()> {
        if action.kind().is_none() {
            warn!(engine = %self.config.name, "rejected action without a type");
            return Err(EngineError::InvalidAction);
        }

        match LiftedAction::from_action(&action)? {
            Some(lifted) => self.apply(lifted),
            None => {
                self.monitor_action(&action);
                Ok(())
            }
        }
    }

    /// Export as a plain structured document.
    pub fn export_document(&self) -> EngineResult<Value> {
        Ok(self.cache.lifted().to_document()?)
    }

    pub fn import_document(&mut self, document: Value) -> EngineResult<()> {
        let lifted = LiftedState::from_document(document)?;
        self.import_state(lifted)
    }
}
