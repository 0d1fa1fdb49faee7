//! Compiled routes and the request pipeline.
//!
//! ```text
//! Received → Filter → Authenticate → Authorize → Validate → Execute → Completed
//!                          │              │           │          │
//!                          └──────────────┴───────────┴──────────┴──→ Failed(Failure)
//! ```
//!
//! Authenticate and Authorize are skipped when the definition did not ask
//! for them. Each phase is awaited to completion before the next starts,
//! and the first failure ends the request: later phases never run.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::context::Context;
use crate::failure::{Failure, Phase};
use crate::handler::BoxedHandler;
use crate::input::Input;
use crate::method::Method;
use crate::schema::Schema;
use crate::strategy::{Authenticate, Authorize, Decision, Filter, Validate};

/// One endpoint with every strategy resolved.
///
/// Built once by [`Builder::build`](crate::Builder::build) and never
/// modified afterwards. Holds no per-request state, so a single `Route`
/// serves any number of concurrent requests.
pub struct Route {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) schema: Arc<Schema>,
    pub(crate) filter: Arc<dyn Filter>,
    pub(crate) authenticate: Option<Arc<dyn Authenticate>>,
    pub(crate) authorize: Option<Arc<dyn Authorize>>,
    pub(crate) validate: Arc<dyn Validate>,
    pub(crate) handler: BoxedHandler,
}

impl Route {
    pub fn method(&self) -> Method { self.method }

    /// Full path, engine prefix included.
    pub fn path(&self) -> &str { &self.path }

    pub fn schema(&self) -> &Schema { &self.schema }

    pub fn requires_authentication(&self) -> bool { self.authenticate.is_some() }

    pub fn requires_authorization(&self) -> bool { self.authorize.is_some() }

    /// Runs the pipeline for one request.
    ///
    /// `cx` is written once, by the authenticate phase, to attach the
    /// caller's identity. Every phase function gets its own copy of it.
    pub async fn run(&self, raw: Input, cx: &mut Context) -> Result<Value, Failure> {
        let input = self.filter.filter(raw, Arc::clone(&self.schema)).await;
        debug!(route = %self, phase = %Phase::Filter, "phase settled");

        if let Some(authenticate) = &self.authenticate {
            match authenticate.authenticate(input.clone(), cx.clone()).await {
                Ok(Some(identity)) => cx.set_identity(identity),
                Ok(None) => {
                    debug!(route = %self, "no identity, rejecting");
                    return Err(Failure::unauthenticated());
                }
                Err(e) => {
                    warn!(route = %self, "authenticate function failed: {e}");
                    return Err(Failure::auth_function(Phase::Authenticate));
                }
            }
            debug!(route = %self, phase = %Phase::Authenticate, "phase settled");
        }

        if let Some(authorize) = &self.authorize {
            match authorize.authorize(input.clone(), cx.clone()).await {
                Ok(Decision::Allow) => {}
                Ok(Decision::Deny) => {
                    debug!(route = %self, "authorization denied");
                    return Err(Failure::unauthorized());
                }
                Err(e) => {
                    warn!(route = %self, "authorize function failed: {e}");
                    return Err(Failure::auth_function(Phase::Authorize));
                }
            }
            debug!(route = %self, phase = %Phase::Authorize, "phase settled");
        }

        if let Some(errors) = self
            .validate
            .validate(input.clone(), Arc::clone(&self.schema), cx.clone())
            .await
            .filter(|errors| !errors.is_empty())
        {
            debug!(route = %self, invalid = errors.len(), "input rejected");
            return Err(Failure::invalid_input(errors));
        }
        debug!(route = %self, phase = %Phase::Validate, "phase settled");

        let outcome = self.handler.call(input, cx.clone()).await;
        match &outcome {
            Ok(_) => debug!(route = %self, phase = %Phase::Execute, "completed"),
            Err(failure) if failure.status().is_server_error() => {
                warn!(route = %self, status = failure.code(), "handler failed: {}", failure.message());
            }
            Err(failure) => debug!(route = %self, status = failure.code(), "handler rejected"),
        }
        outcome
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("authenticate", &self.authenticate.is_some())
            .field("authorize", &self.authorize.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;
    use crate::context::Identity;
    use crate::error::BoxError;
    use crate::failure::{ErrorSet, FailureKind, Rejection};
    use crate::filter::Coerce;
    use crate::handler::Handler;
    use crate::schema::ArgSpec;
    use crate::validate::SchemaCheck;

    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    fn route(schema: Schema, handled: Arc<AtomicUsize>) -> Route {
        let handler = move |input: Input, _cx: Context| {
            let handled = Arc::clone(&handled);
            async move {
                handled.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Rejection>(Value::Object(input.into_map()))
            }
        };
        Route {
            method: Method::Post,
            path: "/things".to_owned(),
            schema: Arc::new(schema),
            filter: Arc::new(Coerce),
            authenticate: None,
            authorize: None,
            validate: Arc::new(SchemaCheck),
            handler: handler.into_boxed_handler(),
        }
    }

    fn cx() -> Context {
        Context::new(Method::Post, "/things")
    }

    #[tokio::test]
    async fn unauthenticated_route_reaches_execute() {
        let handled = counter();
        let route = route(Schema::new().arg("n", ArgSpec::integer()), Arc::clone(&handled));

        let data = route.run(Input::from_json(json!({ "n": "10" })), &mut cx()).await.unwrap();

        assert_eq!(data, json!({ "n": 10 }));
        assert_eq!(handled.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_identity_stops_before_authorize() {
        let (handled, authorized, validated) = (counter(), counter(), counter());
        let mut route = route(Schema::new(), Arc::clone(&handled));
        route.authenticate = Some(Arc::new(|_: Input, _: Context| async { Ok::<Option<Identity>, BoxError>(None) }));
        route.authorize = Some({
            let authorized = Arc::clone(&authorized);
            Arc::new(move |_: Input, _: Context| {
                let authorized = Arc::clone(&authorized);
                async move {
                    authorized.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, BoxError>(Decision::Allow)
                }
            })
        });
        route.validate = {
            let validated = Arc::clone(&validated);
            Arc::new(move |_: Input, _: Arc<Schema>, _: Context| {
                let validated = Arc::clone(&validated);
                async move {
                    validated.fetch_add(1, Ordering::SeqCst);
                    None::<ErrorSet>
                }
            })
        };

        let failure = route.run(Input::new(), &mut cx()).await.unwrap_err();

        assert_eq!(failure.kind(), &FailureKind::Unauthenticated);
        assert_eq!(failure.code(), 401);
        assert_eq!(authorized.load(Ordering::SeqCst), 0);
        assert_eq!(validated.load(Ordering::SeqCst), 0);
        assert_eq!(handled.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn identity_is_attached_before_authorize() {
        let handled = counter();
        let mut route = route(Schema::new(), Arc::clone(&handled));
        route.authenticate = Some(Arc::new(|_: Input, _: Context| async {
            Ok::<_, BoxError>(Some(Identity::new(json!({ "id": 2 }))))
        }));
        route.authorize = Some(Arc::new(|_: Input, cx: Context| async move {
            let is_two = cx.identity().and_then(|i| i.get("id")) == Some(&json!(2));
            Ok::<_, BoxError>(Decision::from(is_two))
        }));

        let mut cx = cx();
        route.run(Input::new(), &mut cx).await.unwrap();

        assert_eq!(cx.identity(), Some(&Identity::new(json!({ "id": 2 }))));
        assert_eq!(handled.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn auth_function_errors_are_denials() {
        let handled = counter();
        let mut route = route(Schema::new(), Arc::clone(&handled));
        route.authenticate = Some(Arc::new(|_: Input, _: Context| async {
            Err::<Option<Identity>, BoxError>("token store down".into())
        }));

        let failure = route.run(Input::new(), &mut cx()).await.unwrap_err();

        assert_eq!(failure.kind(), &FailureKind::AuthFunction(Phase::Authenticate));
        assert_eq!(failure.message(), "authentication failed");
        assert_eq!(handled.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn invalid_input_never_reaches_handler() {
        let handled = counter();
        let route = route(Schema::new().arg("name", ArgSpec::string().required()), Arc::clone(&handled));

        let failure = route.run(Input::new(), &mut cx()).await.unwrap_err();

        assert_eq!(failure.data(), &json!({ "name": ["is required"] }));
        assert_eq!(handled.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn handler_rejection_keeps_its_status() {
        let mut route = route(Schema::new(), counter());
        let handler = |_: Input, _: Context| async {
            Err::<Value, _>(Rejection::new("conflict").status(http::StatusCode::CONFLICT))
        };
        route.handler = handler.into_boxed_handler();

        let failure = route.run(Input::new(), &mut cx()).await.unwrap_err();

        assert_eq!(failure.kind(), &FailureKind::Handler);
        assert_eq!(failure.code(), 409);
        assert_eq!(failure.message(), "conflict");
    }
}
