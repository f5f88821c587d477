//! Form engine: store, debounced field validation and the submit protocol

use crate::config::{EngineConfig, ValidationOrdering};
use crate::error::{FormError, Result};
use crate::persistence::PersistenceBridge;
use crate::state::{FieldMap, FormAction, FormState, FormStore};
use crate::validation::{
    lock_or_recover, Debouncer, FocusTarget, LogSubmitHandler, SubmitHandler, ValidationPort,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Result of a submit request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Validation passed, the handler ran once and the form was reset
    Submitted,
    /// Validation found errors; `focus` names the first field in error
    Invalid { focus: Option<String> },
    /// Another submission is still validating or submitting
    AlreadySubmitting,
    /// The validation port or the submit handler failed
    Failed(FormError),
}

/// Everything a rendering collaborator needs for one frame
#[derive(Debug, Clone)]
pub struct FormView {
    pub state: Arc<FormState>,
    /// A debounce timer is armed or a debounced validation has not finished
    pub is_pending: bool,
}

/// Builder for `FormEngine`
pub struct FormEngineBuilder {
    initial: FieldMap,
    port: Option<Arc<dyn ValidationPort>>,
    submitter: Arc<dyn SubmitHandler>,
    config: EngineConfig,
    persistence: Option<PersistenceBridge>,
}

impl FormEngineBuilder {
    pub fn validator(self, port: impl ValidationPort + 'static) -> Self {
        self.validator_arc(Arc::new(port))
    }

    pub fn validator_arc(mut self, port: Arc<dyn ValidationPort>) -> Self {
        self.port = Some(port);
        self
    }

    /// Side effect for validated submissions; defaults to logging the values
    pub fn on_submit(mut self, handler: impl SubmitHandler + 'static) -> Self {
        self.submitter = Arc::new(handler);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn persistence(mut self, bridge: PersistenceBridge) -> Self {
        self.persistence = Some(bridge);
        self
    }

    pub fn build(self) -> Result<FormEngine> {
        let port = self.port.ok_or(FormError::MissingValidator)?;
        let persistence = self
            .persistence
            .filter(|_| self.config.persists_values());

        let values = match &persistence {
            Some(bridge) => bridge.load_values(&self.initial),
            None => self.initial.clone(),
        };
        let (failures_tx, failures_rx) = mpsc::unbounded_channel();
        let store = FormStore::new(values);

        let writer = persistence
            .as_ref()
            .and_then(|bridge| spawn_writer(&store, bridge.clone(), failures_tx.clone()));

        tracing::debug!(
            fields = self.initial.len(),
            debounce_ms = self.config.debounce_delay().as_millis() as u64,
            persisted = persistence.is_some(),
            "form engine built"
        );

        Ok(FormEngine {
            inner: Arc::new(EngineInner {
                store,
                initial: self.initial,
                port,
                submitter: self.submitter,
                debouncer: Debouncer::new(self.config.debounce_delay()),
                ordering: self.config.ordering(),
                sequences: Mutex::new(HashMap::new()),
                in_flight: AtomicUsize::new(0),
                submitting: AtomicBool::new(false),
                focus_targets: Mutex::new(HashMap::new()),
                failures_tx,
                failures_rx: Mutex::new(Some(failures_rx)),
                persistence,
                writer: Mutex::new(writer),
            }),
        })
    }
}

struct EngineInner {
    store: FormStore,
    initial: FieldMap,
    port: Arc<dyn ValidationPort>,
    submitter: Arc<dyn SubmitHandler>,
    debouncer: Debouncer,
    ordering: ValidationOrdering,
    /// Latest sequence number issued per field
    sequences: Mutex<HashMap<String, u64>>,
    in_flight: AtomicUsize,
    submitting: AtomicBool,
    focus_targets: Mutex<HashMap<String, Arc<dyn FocusTarget>>>,
    failures_tx: mpsc::UnboundedSender<FormError>,
    failures_rx: Mutex<Option<mpsc::UnboundedReceiver<FormError>>>,
    persistence: Option<PersistenceBridge>,
    writer: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for EngineInner {
    fn drop(&mut self) {
        if let Some(writer) = lock_or_recover(&self.writer).take() {
            writer.abort();
        }
    }
}

/// Cheaply cloneable handle to one form instance
#[derive(Clone)]
pub struct FormEngine {
    inner: Arc<EngineInner>,
}

impl std::fmt::Debug for FormEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormEngine")
            .field("state", &self.inner.store.snapshot())
            .field("ordering", &self.inner.ordering)
            .field("persistence", &self.inner.persistence)
            .finish_non_exhaustive()
    }
}

impl FormEngine {
    /// Start building an engine over the declared fields and their initial values
    pub fn builder(initial: FieldMap) -> FormEngineBuilder {
        FormEngineBuilder {
            initial,
            port: None,
            submitter: Arc::new(LogSubmitHandler),
            config: EngineConfig::default(),
            persistence: None,
        }
    }

    pub fn snapshot(&self) -> Arc<FormState> {
        self.inner.store.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<FormState>> {
        self.inner.store.subscribe()
    }

    pub fn view(&self) -> FormView {
        FormView {
            state: self.snapshot(),
            is_pending: self.is_pending(),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.inner.debouncer.is_busy() || self.inner.in_flight.load(Ordering::Acquire) > 0
    }

    /// The values the form was declared with (reset target)
    pub fn initial_values(&self) -> &FieldMap {
        &self.inner.initial
    }

    /// Apply a transition directly
    pub fn dispatch(&self, action: FormAction) -> Arc<FormState> {
        self.inner.store.dispatch(action)
    }

    /// Take the receiver for infrastructure failures (port, submit, storage)
    ///
    /// Returns `None` once taken.
    pub fn take_failures(&self) -> Option<mpsc::UnboundedReceiver<FormError>> {
        lock_or_recover(&self.inner.failures_rx).take()
    }

    /// A read/write view of one field backed by this engine
    pub fn field(&self, name: impl Into<String>) -> FieldBinding {
        FieldBinding {
            engine: self.clone(),
            name: name.into(),
        }
    }

    /// Record a new value and schedule debounced validation for the field
    pub fn handle_change(&self, name: &str, value: impl Into<String>) {
        let state = self.dispatch(FormAction::set_form_data(name, value));
        if !state.is_declared(name) {
            return;
        }

        let weak: Weak<EngineInner> = Arc::downgrade(&self.inner);
        let field = name.to_string();
        self.inner.debouncer.schedule(name, async move {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            FormEngine { inner }.run_debounced_validation(&field).await;
        });
    }

    pub fn handle_blur(&self, name: &str) {
        self.dispatch(FormAction::set_touched(name));
    }

    pub fn set_loading(&self, is_loading: bool) {
        self.dispatch(FormAction::SetLoading { is_loading });
    }

    async fn run_debounced_validation(&self, name: &str) {
        let state = self.dispatch(FormAction::set_touched(name));
        let value = state.value(name).unwrap_or_default().to_string();
        if let Err(err) = self.validate_field(name, &value).await {
            self.report(err);
        }
    }

    /// Validate one field and commit its error
    ///
    /// A port failure leaves the field's error untouched.
    pub async fn validate_field(&self, name: &str, value: &str) -> Result<()> {
        let sequence = self.next_sequence(name);
        let _in_flight = InFlight::enter(&self.inner.in_flight);

        let mut request = FieldMap::new();
        request.insert(name.to_string(), value.to_string());

        let errors = self.inner.port.validate(request).await.map_err(|err| {
            tracing::warn!(field = name, error = %err, "field validation failed");
            FormError::field_port_failure(name, &err)
        })?;

        if self.inner.ordering == ValidationOrdering::LastIssued && !self.is_latest(name, sequence)
        {
            tracing::debug!(field = name, sequence, "discarding stale validation result");
            return Ok(());
        }

        let message = errors.get(name).cloned().unwrap_or_default();
        self.dispatch(FormAction::set_field_error(name, message));
        Ok(())
    }

    /// Validate the whole form and commit the errors in one transition
    ///
    /// Returns `true` when no field has a non-empty error. Every declared
    /// field gets an entry, so errors the port no longer reports are cleared.
    pub async fn validate_form(&self) -> Result<bool> {
        let snapshot = self.snapshot();
        let mut returned = self
            .inner
            .port
            .validate(snapshot.form_data.clone())
            .await
            .map_err(|err| {
                tracing::warn!(error = %err, "form validation failed");
                FormError::form_port_failure(&err)
            })?;

        let mut errors: FieldMap = snapshot
            .form_data
            .keys()
            .map(|name| {
                let message = returned.shift_remove(name).unwrap_or_default();
                (name.clone(), message)
            })
            .collect();
        errors.extend(returned);

        let valid = errors.values().all(String::is_empty);
        self.dispatch(FormAction::SetFormErrors { errors });
        Ok(valid)
    }

    /// Run the submit protocol
    ///
    /// Idle → Validating → Submitting → reset, or Validating → focus the
    /// first field in error. Failures are reported on the failure channel
    /// and never escape as errors.
    pub async fn submit(&self) -> SubmitOutcome {
        let inner = &self.inner;
        let Some(mut guard) = SubmitGuard::acquire(&inner.submitting, &inner.store) else {
            tracing::debug!("submit ignored, another submission is in progress");
            return SubmitOutcome::AlreadySubmitting;
        };

        let valid = match self.validate_form().await {
            Ok(valid) => valid,
            Err(err) => {
                self.report(err.clone());
                return SubmitOutcome::Failed(err);
            }
        };

        if !valid {
            let focus = self.snapshot().first_error_field().map(str::to_string);
            if let Some(name) = &focus {
                self.focus_field(name);
            }
            tracing::info!(focus = ?focus, "submit rejected by validation");
            return SubmitOutcome::Invalid { focus };
        }

        let state = guard.mark_submitting();
        let result = self.inner.submitter.submit(state.form_data.clone()).await;
        guard.clear_submitting();

        match result {
            Ok(()) => {
                tracing::info!("form submitted");
                self.reset();
                SubmitOutcome::Submitted
            }
            Err(err) => {
                let err = FormError::SubmitFailed(format!("{err:#}"));
                tracing::warn!(error = %err, "submit handler failed");
                self.report(err.clone());
                SubmitOutcome::Failed(err)
            }
        }
    }

    /// Restore the declared initial values and drop pending validations
    pub fn reset(&self) {
        self.inner.debouncer.cancel_all();
        {
            let mut sequences = lock_or_recover(&self.inner.sequences);
            for sequence in sequences.values_mut() {
                *sequence += 1;
            }
        }
        self.dispatch(FormAction::ResetForm {
            initial_state: self.inner.initial.clone(),
        });
    }

    pub fn register_focus_target(&self, name: impl Into<String>, target: Arc<dyn FocusTarget>) {
        lock_or_recover(&self.inner.focus_targets).insert(name.into(), target);
    }

    pub fn unregister_focus_target(&self, name: &str) {
        lock_or_recover(&self.inner.focus_targets).remove(name);
    }

    /// Move focus to a field; a no-op when nothing is registered for it
    pub fn focus_field(&self, name: &str) -> bool {
        let target = lock_or_recover(&self.inner.focus_targets).get(name).cloned();
        match target {
            Some(target) => {
                target.focus();
                true
            }
            None => {
                tracing::debug!(field = name, "no focus target registered");
                false
            }
        }
    }

    /// Save the current values right away
    pub fn persist_now(&self) -> Result<()> {
        match &self.inner.persistence {
            Some(bridge) => bridge.save_values(&self.snapshot().form_data),
            None => Ok(()),
        }
    }

    /// Cancel pending timers, stop background persistence and drop focus targets
    ///
    /// Validations already in flight still complete.
    pub fn teardown(&self) {
        self.inner.debouncer.cancel_all();
        if let Some(writer) = lock_or_recover(&self.inner.writer).take() {
            writer.abort();
        }
        lock_or_recover(&self.inner.focus_targets).clear();
        tracing::debug!("form engine torn down");
    }

    fn report(&self, err: FormError) {
        send_failure(&self.inner.failures_tx, err);
    }

    fn next_sequence(&self, name: &str) -> u64 {
        let mut sequences = lock_or_recover(&self.inner.sequences);
        let sequence = sequences.entry(name.to_string()).or_insert(0);
        *sequence += 1;
        *sequence
    }

    fn is_latest(&self, name: &str, sequence: u64) -> bool {
        lock_or_recover(&self.inner.sequences).get(name).copied() == Some(sequence)
    }
}

/// Projection of one field over a `FormEngine`
#[derive(Debug, Clone)]
pub struct FieldBinding {
    engine: FormEngine,
    name: String,
}

impl FieldBinding {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> String {
        self.engine
            .snapshot()
            .value(&self.name)
            .unwrap_or_default()
            .to_string()
    }

    pub fn error(&self) -> Option<String> {
        self.engine.snapshot().error(&self.name).map(str::to_string)
    }

    pub fn is_touched(&self) -> bool {
        self.engine.snapshot().is_touched(&self.name)
    }

    pub fn on_change(&self, value: impl Into<String>) {
        self.engine.handle_change(&self.name, value);
    }

    pub fn on_blur(&self) {
        self.engine.handle_blur(&self.name);
    }

    pub fn focus(&self) -> bool {
        self.engine.focus_field(&self.name)
    }
}

/// Saves `form_data` whenever it changes, off the caller's thread
fn spawn_writer(
    store: &FormStore,
    bridge: PersistenceBridge,
    failures: mpsc::UnboundedSender<FormError>,
) -> Option<JoinHandle<()>> {
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        tracing::warn!(key = bridge.key(), "no runtime, values will only persist on demand");
        return None;
    };

    let mut rx = store.subscribe();
    // Baseline taken here, not inside the task, so a change dispatched before
    // the task first runs is still seen as a change.
    let mut last = rx.borrow_and_update().form_data.clone();
    Some(runtime.spawn(async move {
        while rx.changed().await.is_ok() {
            let values = rx.borrow_and_update().form_data.clone();
            if values == last {
                continue;
            }
            last = values.clone();

            let bridge = bridge.clone();
            match tokio::task::spawn_blocking(move || bridge.save_values(&values)).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => send_failure(&failures, err),
                Err(err) => tracing::warn!(error = %err, "persistence task panicked"),
            }
        }
    }))
}

fn send_failure(failures: &mpsc::UnboundedSender<FormError>, err: FormError) {
    if failures.send(err).is_err() {
        tracing::trace!("failure receiver dropped");
    }
}

/// Counts a field validation as in flight until dropped
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Holds the single submission slot
///
/// Dropping the guard, including when the submit future is cancelled,
/// releases the slot and clears `is_submitting` if this guard set it.
struct SubmitGuard<'a> {
    slot: &'a AtomicBool,
    store: &'a FormStore,
    marked: bool,
}

impl<'a> SubmitGuard<'a> {
    fn acquire(slot: &'a AtomicBool, store: &'a FormStore) -> Option<Self> {
        slot.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self {
                slot,
                store,
                marked: false,
            })
    }

    fn mark_submitting(&mut self) -> Arc<FormState> {
        self.marked = true;
        self.store.dispatch(FormAction::SetSubmitting {
            is_submitting: true,
        })
    }

    fn clear_submitting(&mut self) {
        if std::mem::take(&mut self.marked) {
            self.store.dispatch(FormAction::SetSubmitting {
                is_submitting: false,
            });
        }
    }
}

impl Drop for SubmitGuard<'_> {
    fn drop(&mut self) {
        if self.marked {
            tracing::debug!("submit cancelled while submitting");
        }
        self.clear_submitting();
        self.slot.store(false, Ordering::Release);
    }
}
