//! Publish/subscribe for lifted and unlifted state.
//!
//! Backed by `tokio::sync::watch`, so publishing works without a runtime and
//! a subscriber always sees the latest value. Streams coalesce: a slow
//! consumer skips intermediate snapshots rather than queueing them.

use std::sync::Arc;

use futures::Stream;
use rewind_history::LiftedState;
use tokio::sync::watch;

pub struct Publisher<S> {
    lifted: watch::Sender<Arc<LiftedState<S>>>,
    state: watch::Sender<S>,
}

impl<S> Publisher<S>
where
    S: Clone + Send + Sync + 'static,
{
    pub fn new(initial: &LiftedState<S>) -> Self {
        let (lifted, _) = watch::channel(Arc::new(initial.clone()));
        let (state, _) = watch::channel(initial.current_state().clone());
        Self { lifted, state }
    }

    /// Replace the published snapshot. Subscribers get a read-only copy that
    /// shares the computed-state cache with the engine.
    pub fn publish(&self, lifted: &LiftedState<S>) {
        self.state.send_replace(lifted.current_state().clone());
        self.lifted.send_replace(Arc::new(lifted.clone()));
    }

    pub fn latest_lifted(&self) -> Arc<LiftedState<S>> {
        self.lifted.borrow().clone()
    }

    pub fn subscribe_lifted(&self) -> watch::Receiver<Arc<LiftedState<S>>> {
        self.lifted.subscribe()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<S> {
        self.state.subscribe()
    }

    pub fn lifted_stream(&self) -> impl Stream<Item = Arc<LiftedState<S>>> + Send + 'static {
        watch_stream(self.subscribe_lifted())
    }

    pub fn state_stream(&self) -> impl Stream<Item = S> + Send + 'static {
        watch_stream(self.subscribe_state())
    }
}

/// Yields the current value, then every change until the sender is dropped.
fn watch_stream<T>(mut rx: watch::Receiver<T>) -> impl Stream<Item = T> + Send + 'static
where
    T: Clone + Send + Sync + 'static,
{
    async_stream::stream! {
        let current = rx.borrow_and_update().clone();
        yield current;

        while rx.changed().await.is_ok() {
            let next = rx.borrow_and_update().clone();
            yield next;
        }
    }
}
