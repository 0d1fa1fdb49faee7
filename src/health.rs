//! Built-in Kubernetes health-check routes.
//!
//! Kubernetes asks two questions. waypost answers them.
//!
//! | Probe | Path | Question |
//! |---|---|---|
//! | **Liveness** | `/healthz` | Is the process alive? Failure → restart. |
//! | **Readiness** | `/readyz` | Can the pod serve traffic? Failure → pulled from load-balancer. |
//!
//! Register them on your builder:
//!
//! ```rust
//! use waypost::{Builder, health};
//!
//! let app = Builder::new()
//!     .route(health::liveness())
//!     .route(health::readiness())
//!     .build()
//!     .unwrap();
//! # assert_eq!(app.routes().len(), 2);
//! ```
//!
//! Both paths are absolute, so they sit under the engine prefix only.
//! Replace `readiness` with your own definition if the pod must gate on a
//! database connection or a downstream service.

use crate::context::Context;
use crate::definition::RouteDefinition;
use crate::failure::Rejection;
use crate::input::Input;

/// `GET /healthz`. Always succeeds with `"ok"`.
pub fn liveness() -> RouteDefinition {
    RouteDefinition::get(alive).path("/healthz")
}

/// `GET /readyz`. Succeeds with `"ready"`.
pub fn readiness() -> RouteDefinition {
    RouteDefinition::get(ready).path("/readyz")
}

async fn alive(_input: Input, _cx: Context) -> Result<&'static str, Rejection> {
    Ok("ok")
}

async fn ready(_input: Input, _cx: Context) -> Result<&'static str, Rejection> {
    Ok("ready")
}
