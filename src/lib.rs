//! # waypost
//!
//! Declarative API endpoints with a phased request pipeline.
//!
//! ## The model
//!
//! You describe each endpoint as a [`RouteDefinition`]: verb, arguments,
//! whether the caller must be authenticated, who may call it, and the
//! handler. The [`Builder`] holds the one global strategy set (filter,
//! authenticate, named authorize functions, validate, transport), resolves
//! every definition against it and compiles it into a [`Route`].
//! Unresolvable names fail the build, not a request.
//!
//! Each request then runs five phases, in order, stopping at the first
//! failure:
//!
//! 1. **Filter**: coerce raw strings into the declared argument types
//! 2. **Authenticate**: resolve the caller's [`Identity`] (optional)
//! 3. **Authorize**: allow or deny the caller (optional)
//! 4. **Validate**: check the typed input against the schema
//! 5. **Execute**: call the handler
//!
//! The [`Engine`] binds routes to a transport and renders every outcome
//! into one envelope: `{"success": true, "data": …}` or
//! `{"success": false, "error": {"code", "message", "data"}}`.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use waypost::{
//!     ArgSpec, BoxError, Builder, Context, Decision, EngineOptions, Identity, Input,
//!     Rejection, RouteDefinition, RouteTree,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let routes = RouteTree::new("/")
//!         .at("messages/index", RouteDefinition::post(create)
//!             .arg("text", ArgSpec::string().required().max_length(280))
//!             .authenticated())
//!         .at("messages/[id]", RouteDefinition::delete(remove)
//!             .arg("id", ArgSpec::integer().required())
//!             .authenticated()
//!             .authorize("isOwner"));
//!
//!     let app = Builder::new()
//!         .set_authenticate(authenticate)
//!         .register_authorize("isOwner", is_owner)
//!         .select_engine("hyper", EngineOptions::default().prefix("/api"))
//!         .mount(routes)
//!         .build()
//!         .expect("invalid route configuration");
//!
//!     app.serve().await.unwrap();
//! }
//!
//! async fn authenticate(_input: Input, cx: Context) -> Result<Option<Identity>, BoxError> {
//!     // Look the bearer token up in your session store.
//!     Ok(cx.header("authorization").map(|_| Identity::new(serde_json::json!({ "id": 2 }))))
//! }
//!
//! async fn is_owner(input: Input, cx: Context) -> Result<Decision, BoxError> {
//!     let caller = cx.identity().and_then(|i| i.get("id")).and_then(|id| id.as_i64());
//!     Ok(Decision::from(caller.is_some() && caller == input.i64("owner")))
//! }
//!
//! async fn create(input: Input, _cx: Context) -> Result<String, Rejection> {
//!     Ok(input.str("text").unwrap_or_default().to_owned())
//! }
//!
//! async fn remove(_input: Input, _cx: Context) -> Result<(), Rejection> {
//!     Ok(())
//! }
//! ```

mod authorize;
mod builder;
mod config;
mod context;
mod definition;
mod engine;
mod error;
mod failure;
mod handler;
mod input;
mod method;
mod response;
mod route;
mod router;
mod schema;
mod server;
mod strategy;

pub mod filter;
pub mod health;
pub mod validate;

pub use authorize::{AnyOf, AuthorizeRef};
pub use builder::{App, Builder};
pub use config::{Config, EngineConfig, EngineOptions};
pub use context::{Context, Identity};
pub use definition::{Authentication, AuthorizeSpec, RouteDefinition, RouteTree, derive_path};
pub use engine::{Engine, Transport};
pub use error::{BoxError, ConfigError, Error};
pub use failure::{ErrorSet, Failure, FailureKind, Phase, Rejection};
pub use handler::Handler;
pub use http::StatusCode;
pub use input::Input;
pub use method::{Method, UnknownMethod};
pub use response::Response;
pub use route::Route;
pub use schema::{ArgSpec, ArgType, Rules, Schema};
pub use server::{Server, shutdown_signal};
pub use strategy::{AcceptAll, Authenticate, Authorize, Decision, Filter, Passthrough, Validate};
