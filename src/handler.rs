//! Route handlers.
//!
//! A handler is any async function of the request's typed [`Input`] and its
//! [`Context`] returning `Result<T, Rejection>` where `T: Serialize`.
//! Routes with different handler types live in the same table, so each
//! handler is stored type-erased:
//!
//! ```text
//! async fn show(input, cx) -> Result<Message, Rejection>
//!   │  RouteDefinition::get(show)
//!   ▼
//! FnHandler(show)                  owns the concrete fn
//!   │  Arc<dyn ErasedHandler>     (BoxedHandler, cloned into every Route)
//!   ▼
//! call(input, cx) -> BoxFuture<Result<Value, Failure>>
//! ```
//!
//! Serialization of the `Ok` value happens inside the erased call, so the
//! pipeline only ever carries `serde_json::Value`.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use http::StatusCode;
use serde::Serialize;
use serde_json::Value;

use crate::context::Context;
use crate::failure::{Failure, Rejection};
use crate::input::Input;

/// Object-safe form of a handler. Public only because [`Handler`] names it.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, input: Input, cx: Context) -> BoxFuture<'static, Result<Value, Failure>>;
}

#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

/// Satisfied by every function usable as a route handler:
///
/// ```text
/// async fn name(input: Input, cx: Context) -> Result<impl Serialize, Rejection>
/// ```
///
/// Closures work too, as long as the future they return is `Send +
/// 'static` (clone what they capture into an `async move` block). Sealed:
/// it cannot be implemented outside this crate.
pub trait Handler: sealed::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod sealed {
    pub trait Sealed {}
}

impl<F, Fut, T> sealed::Sealed for F
where
    F: Fn(Input, Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, Rejection>> + Send + 'static,
    T: Serialize + Send + 'static,
{
}

impl<F, Fut, T> Handler for F
where
    F: Fn(Input, Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, Rejection>> + Send + 'static,
    T: Serialize + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

struct FnHandler<F>(F);

impl<F, Fut, T> ErasedHandler for FnHandler<F>
where
    F: Fn(Input, Context) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, Rejection>> + Send + 'static,
    T: Serialize + Send + 'static,
{
    fn call(&self, input: Input, cx: Context) -> BoxFuture<'static, Result<Value, Failure>> {
        let pending = (self.0)(input, cx);
        Box::pin(async move {
            let data = pending.await.map_err(Failure::handler)?;
            serde_json::to_value(data).map_err(|e| {
                tracing::error!("handler result is not serializable: {e}");
                Failure::handler(Rejection::new("internal error").status(StatusCode::INTERNAL_SERVER_ERROR))
            })
        })
    }
}
