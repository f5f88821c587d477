//! Per-field tracker usable without the aggregate store

use super::form_state::FieldMap;
use crate::error::{FormError, Result};
use crate::validation::ValidationPort;
use std::sync::Arc;

/// Value, error and touched flag of a single field
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldState {
    pub value: String,
    pub error: Option<String>,
    pub touched: bool,
}

impl FieldState {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Default::default()
        }
    }
}

/// Independent field tracker
///
/// Changes only store the raw value. Blur marks the field touched and
/// validates it immediately. Nothing here is synchronized with a
/// `FormStore`; prefer `FieldBinding` when the field also lives in one.
pub struct FieldAdapter {
    name: String,
    state: FieldState,
    port: Arc<dyn ValidationPort>,
}

impl FieldAdapter {
    pub fn new(
        name: impl Into<String>,
        initial: impl Into<String>,
        port: Arc<dyn ValidationPort>,
    ) -> Self {
        Self {
            name: name.into(),
            state: FieldState::new(initial),
            port,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.state.value
    }

    pub fn error(&self) -> Option<&str> {
        self.state.error.as_deref()
    }

    pub fn is_touched(&self) -> bool {
        self.state.touched
    }

    pub fn state(&self) -> &FieldState {
        &self.state
    }

    pub fn on_change(&mut self, value: impl Into<String>) {
        self.state.value = value.into();
    }

    /// Mark touched and validate the current value
    ///
    /// On a port failure the previous error is kept.
    pub async fn on_blur(&mut self) -> Result<()> {
        self.state.touched = true;

        let mut request = FieldMap::new();
        request.insert(self.name.clone(), self.state.value.clone());

        let errors = self.port.validate(request).await.map_err(|err| {
            tracing::warn!(field = %self.name, error = %err, "field validation failed");
            FormError::field_port_failure(&self.name, &err)
        })?;

        self.state.error = errors
            .get(&self.name)
            .filter(|message| !message.is_empty())
            .cloned();
        Ok(())
    }
}

impl std::fmt::Debug for FieldAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldAdapter")
            .field("name", &self.name)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
