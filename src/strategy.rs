//! Phase strategy traits.
//!
//! Every pipeline phase except Execute is a pluggable strategy. Each trait
//! is implemented for plain async closures with the matching signature, so
//! most applications never name these traits:
//!
//! ```text
//! Filter        Fn(Input, Arc<Schema>)          -> Future<Output = Input>
//! Authenticate  Fn(Input, Context)              -> Future<Output = Result<Option<Identity>, BoxError>>
//! Authorize     Fn(Input, Context)              -> Future<Output = Result<Decision, BoxError>>
//! Validate      Fn(Input, Arc<Schema>, Context) -> Future<Output = Option<ErrorSet>>
//! ```
//!
//! Implement a trait directly on your own type when the strategy carries
//! state, e.g. a token verifier holding signing keys.
//!
//! Each call receives owned values: the input is the request's typed input,
//! the context a snapshot of the request's context. A strategy cannot reach
//! another request's data, and nothing it does to its copies leaks back.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::context::{Context, Identity};
use crate::error::BoxError;
use crate::failure::ErrorSet;
use crate::input::Input;
use crate::schema::Schema;

/// Outcome of an authorize function.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn is_allow(self) -> bool {
        self == Self::Allow
    }
}

impl From<bool> for Decision {
    fn from(allowed: bool) -> Self {
        if allowed { Self::Allow } else { Self::Deny }
    }
}

// ── Traits ────────────────────────────────────────────────────────────────────

/// Coerces raw input into typed input. Must not fail: values it cannot
/// convert are left for the validator to reject.
pub trait Filter: Send + Sync + 'static {
    fn filter(&self, input: Input, schema: Arc<Schema>) -> BoxFuture<'static, Input>;
}

/// Resolves the caller. `Ok(None)` means anonymous.
pub trait Authenticate: Send + Sync + 'static {
    fn authenticate(&self, input: Input, cx: Context) -> BoxFuture<'static, Result<Option<Identity>, BoxError>>;
}

/// Decides whether the (already authenticated) caller may proceed.
pub trait Authorize: Send + Sync + 'static {
    fn authorize(&self, input: Input, cx: Context) -> BoxFuture<'static, Result<Decision, BoxError>>;
}

/// Accepts typed input (`None`) or returns a non-empty error set.
pub trait Validate: Send + Sync + 'static {
    fn validate(&self, input: Input, schema: Arc<Schema>, cx: Context) -> BoxFuture<'static, Option<ErrorSet>>;
}

// ── Closure implementations ───────────────────────────────────────────────────

impl<F, Fut> Filter for F
where
    F: Fn(Input, Arc<Schema>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Input> + Send + 'static,
{
    fn filter(&self, input: Input, schema: Arc<Schema>) -> BoxFuture<'static, Input> {
        Box::pin(self(input, schema))
    }
}

impl<F, Fut> Authenticate for F
where
    F: Fn(Input, Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<Identity>, BoxError>> + Send + 'static,
{
    fn authenticate(&self, input: Input, cx: Context) -> BoxFuture<'static, Result<Option<Identity>, BoxError>> {
        Box::pin(self(input, cx))
    }
}

impl<F, Fut> Authorize for F
where
    F: Fn(Input, Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Decision, BoxError>> + Send + 'static,
{
    fn authorize(&self, input: Input, cx: Context) -> BoxFuture<'static, Result<Decision, BoxError>> {
        Box::pin(self(input, cx))
    }
}

impl<F, Fut> Validate for F
where
    F: Fn(Input, Arc<Schema>, Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Option<ErrorSet>> + Send + 'static,
{
    fn validate(&self, input: Input, schema: Arc<Schema>, cx: Context) -> BoxFuture<'static, Option<ErrorSet>> {
        Box::pin(self(input, schema, cx))
    }
}

// ── Built-in no-op strategies ─────────────────────────────────────────────────

/// The `"none"` filter: hands raw input through untouched.
pub struct Passthrough;

impl Filter for Passthrough {
    fn filter(&self, input: Input, _schema: Arc<Schema>) -> BoxFuture<'static, Input> {
        Box::pin(async move { input })
    }
}

/// The `"none"` validator: accepts everything.
pub struct AcceptAll;

impl Validate for AcceptAll {
    fn validate(&self, _input: Input, _schema: Arc<Schema>, _cx: Context) -> BoxFuture<'static, Option<ErrorSet>> {
        Box::pin(async { None })
    }
}
