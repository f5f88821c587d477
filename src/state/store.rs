//! State store: the single owner of `FormState`

use super::action::FormAction;
use super::form_state::{reduce, FieldMap, FormState};
use std::sync::Arc;
use tokio::sync::watch;

/// Holds the current snapshot and applies transitions atomically
///
/// `dispatch` is the only mutation path. Subscribers are woken only when a
/// transition actually produced a new snapshot.
#[derive(Debug)]
pub struct FormStore {
    tx: watch::Sender<Arc<FormState>>,
}

impl FormStore {
    pub fn new(initial: FieldMap) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(FormState::new(initial)));
        Self { tx }
    }

    /// Current snapshot; stays valid after later transitions
    pub fn snapshot(&self) -> Arc<FormState> {
        Arc::clone(&self.tx.borrow())
    }

    /// Apply a transition and return the resulting snapshot
    pub fn dispatch(&self, action: FormAction) -> Arc<FormState> {
        let kind = action.kind();
        let mut result = None;
        let changed = self.tx.send_if_modified(|current| {
            let next = reduce(current, action);
            let changed = !Arc::ptr_eq(current, &next);
            *current = Arc::clone(&next);
            result = Some(next);
            changed
        });
        tracing::debug!(action = kind, changed, "dispatched form action");
        result.unwrap_or_else(|| self.snapshot())
    }

    /// Observe snapshots as they change
    pub fn subscribe(&self) -> watch::Receiver<Arc<FormState>> {
        self.tx.subscribe()
    }
}
