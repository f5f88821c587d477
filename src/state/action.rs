//! Tagged form transitions

use super::form_state::FieldMap;
use serde::{Deserialize, Serialize};

/// A single atomic transition applied to `FormState`
///
/// Serialized with an internal `"type"` tag so collaborators can dispatch
/// actions as JSON. Any unrecognized tag deserializes to `Unknown`, which the
/// reducer ignores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FormAction {
    /// Set the current value of one field
    SetFormData { name: String, value: String },
    /// Set (or clear, with an empty message) the error of one field
    SetFieldError { name: String, message: String },
    /// Merge an already-computed field → message mapping into `errors`
    SetFormErrors { errors: FieldMap },
    /// Mark one field as touched
    SetTouched { name: String },
    SetSubmitting { is_submitting: bool },
    SetLoading { is_loading: bool },
    /// Replace all values and clear errors, touched and flags
    ResetForm { initial_state: FieldMap },
    #[serde(other)]
    Unknown,
}

impl FormAction {
    pub fn set_form_data(name: impl Into<String>, value: impl Into<String>) -> Self {
        FormAction::SetFormData {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn set_field_error(name: impl Into<String>, message: impl Into<String>) -> Self {
        FormAction::SetFieldError {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn set_touched(name: impl Into<String>) -> Self {
        FormAction::SetTouched { name: name.into() }
    }

    /// Short label used in log lines
    pub fn kind(&self) -> &'static str {
        match self {
            FormAction::SetFormData { .. } => "set_form_data",
            FormAction::SetFieldError { .. } => "set_field_error",
            FormAction::SetFormErrors { .. } => "set_form_errors",
            FormAction::SetTouched { .. } => "set_touched",
            FormAction::SetSubmitting { .. } => "set_submitting",
            FormAction::SetLoading { .. } => "set_loading",
            FormAction::ResetForm { .. } => "reset_form",
            FormAction::Unknown => "unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_deserialize_tagged_action() {
        let json = r#"{"type": "set_form_data", "name": "email", "value": "a@b.com"}"#;
        let action: FormAction = serde_json::from_str(json).unwrap();
        assert_eq!(action, FormAction::set_form_data("email", "a@b.com"));
    }

    #[test]
    fn test_deserialize_unknown_tag_is_unknown() {
        let json = r#"{"type": "launch_rockets", "count": 3}"#;
        let action: FormAction = serde_json::from_str(json).unwrap();
        assert_eq!(action, FormAction::Unknown);
    }

    #[test]
    fn test_deserialize_form_errors_keeps_order() {
        let json = r#"{"type": "set_form_errors", "errors": {"zeta": "bad", "alpha": "worse"}}"#;
        let action: FormAction = serde_json::from_str(json).unwrap();
        match action {
            FormAction::SetFormErrors { errors } => {
                let keys: Vec<&str> = errors.keys().map(String::as_str).collect();
                assert_eq!(keys, vec!["zeta", "alpha"]);
            }
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn test_serialize_flag_action() {
        let json = serde_json::to_string(&FormAction::SetLoading { is_loading: true }).unwrap();
        assert_eq!(json, r#"{"type":"set_loading","is_loading":true}"#);
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(FormAction::set_touched("x").kind(), "set_touched");
        assert_eq!(FormAction::Unknown.kind(), "unknown");
    }
}
