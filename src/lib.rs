//! Form Engine - client-side form state with debounced async validation
//!
//! Tracks field values, errors, touched flags and the submission lifecycle
//! of one form. Field validation is debounced per field; the whole form is
//! validated once at submit time.

pub mod config;
pub mod engine;
pub mod error;
pub mod persistence;
pub mod state;
pub mod validation;

pub use config::{EngineConfig, ValidationOrdering};
pub use engine::{FieldBinding, FormEngine, FormEngineBuilder, FormView, SubmitOutcome};
pub use error::{FormError, Result};
pub use persistence::{FileStorage, MemoryStorage, PersistenceBridge, SnapshotStorage};
pub use state::{FieldAdapter, FieldMap, FieldState, FormAction, FormState, FormStore};
pub use validation::{submit_fn, validator_fn, FocusTarget, SubmitHandler, ValidationPort};
