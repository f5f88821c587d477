//! Canonical form state and the reducer that drives it

use super::action::FormAction;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Insertion-ordered mapping from field name to a string (value or message)
pub type FieldMap = IndexMap<String, String>;

/// Aggregate state of one form instance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormState {
    /// Current value per declared field; the key set never changes
    pub form_data: FieldMap,
    /// Error message per field; absent or empty means valid
    pub errors: FieldMap,
    /// Touched flag per field; absent means untouched
    pub touched: IndexMap<String, bool>,
    pub is_submitting: bool,
    pub is_loading: bool,
}

impl FormState {
    /// Create a fresh state from the declared initial values
    pub fn new(initial: FieldMap) -> Self {
        Self {
            form_data: initial,
            ..Default::default()
        }
    }

    /// Current value of a field
    pub fn value(&self, name: &str) -> Option<&str> {
        self.form_data.get(name).map(String::as_str)
    }

    /// Error message of a field, if it has a non-empty one
    pub fn error(&self, name: &str) -> Option<&str> {
        self.errors
            .get(name)
            .map(String::as_str)
            .filter(|message| !message.is_empty())
    }

    pub fn is_touched(&self, name: &str) -> bool {
        self.touched.get(name).copied().unwrap_or(false)
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.form_data.contains_key(name)
    }

    /// Whether any field currently carries a non-empty error
    pub fn has_errors(&self) -> bool {
        self.errors.values().any(|message| !message.is_empty())
    }

    /// First field, in `errors` insertion order, with a non-empty message
    pub fn first_error_field(&self) -> Option<&str> {
        self.errors
            .iter()
            .find(|(_, message)| !message.is_empty())
            .map(|(name, _)| name.as_str())
    }
}

/// Apply one transition, producing a new snapshot
///
/// The previous snapshot is never mutated. When the action leaves the state
/// unchanged (unknown kinds, undeclared fields, repeated values) the same
/// `Arc` is returned.
pub fn reduce(state: &Arc<FormState>, action: FormAction) -> Arc<FormState> {
    let mut next = FormState::clone(state);

    match action {
        FormAction::SetFormData { name, value } => {
            match next.form_data.get_mut(&name) {
                Some(slot) => *slot = value,
                None => {
                    tracing::warn!(field = %name, "ignoring value for undeclared field");
                    return Arc::clone(state);
                }
            }
        }
        FormAction::SetFieldError { name, message } => {
            next.errors.insert(name, message);
        }
        FormAction::SetFormErrors { errors } => {
            for (name, message) in errors {
                next.errors.insert(name, message);
            }
        }
        FormAction::SetTouched { name } => {
            next.touched.insert(name, true);
        }
        FormAction::SetSubmitting { is_submitting } => next.is_submitting = is_submitting,
        FormAction::SetLoading { is_loading } => next.is_loading = is_loading,
        FormAction::ResetForm { initial_state } => next = FormState::new(initial_state),
        FormAction::Unknown => return Arc::clone(state),
    }

    if next == **state {
        Arc::clone(state)
    } else {
        Arc::new(next)
    }
}
