//! Validation port seams and debounce coordination

mod debounce;
mod traits;

pub use debounce::Debouncer;
pub(crate) use debounce::lock_or_recover;
pub use traits::{
    submit_fn, validator_fn, FnSubmitHandler, FnValidator, FocusTarget, LogSubmitHandler,
    SubmitHandler, ValidationPort,
};

#[cfg(test)]
pub use traits::{MockFocusTarget, MockSubmitHandler, MockValidationPort};
