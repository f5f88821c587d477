//! Trait seams for the collaborators the engine calls out to

use crate::state::FieldMap;
use anyhow::Result;
use async_trait::async_trait;
use std::future::Future;

/// Externally supplied async validation capability
///
/// Receives one field, several, or the whole form and resolves to a mapping
/// of field name to error message. A missing or empty message means valid.
/// Invalid input is expressed through the mapping; `Err` is reserved for
/// infrastructure faults.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ValidationPort: Send + Sync {
    async fn validate(&self, values: FieldMap) -> Result<FieldMap>;
}

/// Side effect run once per successful, validated submission
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SubmitHandler: Send + Sync {
    async fn submit(&self, values: FieldMap) -> Result<()>;
}

/// Handle to a focusable UI element owned by the rendering collaborator
#[cfg_attr(test, mockall::automock)]
pub trait FocusTarget: Send + Sync {
    fn focus(&self);
}

/// Adapter turning an async closure into a `ValidationPort`
pub struct FnValidator<F>(F);

/// Build a `ValidationPort` from an async closure
pub fn validator_fn<F, Fut>(f: F) -> FnValidator<F>
where
    F: Fn(FieldMap) -> Fut + Send + Sync,
    Fut: Future<Output = Result<FieldMap>> + Send,
{
    FnValidator(f)
}

#[async_trait]
impl<F, Fut> ValidationPort for FnValidator<F>
where
    F: Fn(FieldMap) -> Fut + Send + Sync,
    Fut: Future<Output = Result<FieldMap>> + Send,
{
    async fn validate(&self, values: FieldMap) -> Result<FieldMap> {
        (self.0)(values).await
    }
}

/// Adapter turning an async closure into a `SubmitHandler`
pub struct FnSubmitHandler<F>(F);

/// Build a `SubmitHandler` from an async closure
pub fn submit_fn<F, Fut>(f: F) -> FnSubmitHandler<F>
where
    F: Fn(FieldMap) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
{
    FnSubmitHandler(f)
}

#[async_trait]
impl<F, Fut> SubmitHandler for FnSubmitHandler<F>
where
    F: Fn(FieldMap) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
{
    async fn submit(&self, values: FieldMap) -> Result<()> {
        (self.0)(values).await
    }
}

/// Submit handler that only logs the submitted values
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSubmitHandler;

#[async_trait]
impl SubmitHandler for LogSubmitHandler {
    async fn submit(&self, values: FieldMap) -> Result<()> {
        tracing::info!(?values, "form submitted");
        Ok(())
    }
}
