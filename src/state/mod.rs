//! Form state module

mod action;
mod field;
mod form_state;
mod store;

pub use action::FormAction;
pub use field::{FieldAdapter, FieldState};
pub use form_state::{reduce, FieldMap, FormState};
pub use store::FormStore;
