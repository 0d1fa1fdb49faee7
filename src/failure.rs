//! Request-time failure taxonomy.
//!
//! A [`Failure`] is the only value a phase can short-circuit the pipeline
//! with, and the only error the engine turns into a response. It carries
//! what the client sees (`status`, `message`, `data`) and nothing else:
//! internal details are logged where the failure is produced.

use std::collections::BTreeMap;
use std::fmt;

use http::StatusCode;
use serde_json::Value;

use crate::method::Method;

/// Validation errors keyed by argument name (`name`, `address.city`,
/// `tags[2]`). Ordered, so the same input always renders identically.
pub type ErrorSet = BTreeMap<String, Vec<String>>;

/// The pipeline phase a failure came from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Phase {
    Filter,
    Authenticate,
    Authorize,
    Validate,
    Execute,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Filter       => "filter",
            Self::Authenticate => "authenticate",
            Self::Authorize    => "authorize",
            Self::Validate     => "validate",
            Self::Execute      => "execute",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a request did not complete.
#[derive(Clone, Debug, PartialEq)]
pub enum FailureKind {
    /// Authentication was required and no identity was produced.
    Unauthenticated,
    /// An authorize function (or every member of a combinator) denied.
    Unauthorized,
    /// The validate phase rejected the typed input.
    InvalidInput(ErrorSet),
    /// The handler rejected.
    Handler,
    /// An authenticate or authorize function itself errored. Treated as
    /// denial.
    AuthFunction(Phase),
    /// The engine could not hand the request to a route: no match, an
    /// unreadable body, or a crashed pipeline task.
    Transport,
}

/// A failed request.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[error("{status}: {message}")]
pub struct Failure {
    kind: FailureKind,
    status: StatusCode,
    message: String,
    data: Value,
}

impl Failure {
    fn new(kind: FailureKind, status: StatusCode, message: impl Into<String>) -> Self {
        Self { kind, status, message: message.into(), data: Value::Null }
    }

    pub fn unauthenticated() -> Self {
        Self::new(FailureKind::Unauthenticated, StatusCode::UNAUTHORIZED, "authentication required")
    }

    pub fn unauthorized() -> Self {
        Self::new(FailureKind::Unauthorized, StatusCode::FORBIDDEN, "access denied")
    }

    /// Input rejected by validation. The error set travels as `data`.
    pub fn invalid_input(errors: ErrorSet) -> Self {
        let data = serde_json::to_value(&errors).unwrap_or(Value::Null);
        let mut failure = Self::new(
            FailureKind::InvalidInput(errors),
            StatusCode::BAD_REQUEST,
            "invalid input",
        );
        failure.data = data;
        failure
    }

    /// An authenticate/authorize function errored. The error itself is not
    /// exposed; callers log it.
    pub fn auth_function(phase: Phase) -> Self {
        match phase {
            Phase::Authenticate => Self::new(
                FailureKind::AuthFunction(phase),
                StatusCode::UNAUTHORIZED,
                "authentication failed",
            ),
            _ => Self::new(FailureKind::AuthFunction(phase), StatusCode::FORBIDDEN, "access denied"),
        }
    }

    pub(crate) fn handler(rejection: Rejection) -> Self {
        Self {
            kind: FailureKind::Handler,
            status: rejection.status.unwrap_or(StatusCode::BAD_REQUEST),
            message: rejection.message,
            data: rejection.data,
        }
    }

    pub fn not_found() -> Self {
        Self::new(FailureKind::Transport, StatusCode::NOT_FOUND, "not found")
    }

    /// The path exists under other methods. `allowed` goes out as data.
    pub fn method_not_allowed(allowed: &[Method]) -> Self {
        let mut failure = Self::new(FailureKind::Transport, StatusCode::METHOD_NOT_ALLOWED, "method not allowed");
        failure.data = serde_json::json!({ "allow": allowed.iter().map(|m| m.as_str()).collect::<Vec<_>>() });
        failure
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Transport, StatusCode::BAD_REQUEST, message)
    }

    pub fn internal() -> Self {
        Self::new(FailureKind::Transport, StatusCode::INTERNAL_SERVER_ERROR, "internal error")
    }

    pub fn kind(&self) -> &FailureKind { &self.kind }
    pub fn status(&self) -> StatusCode { self.status }
    pub fn message(&self) -> &str { &self.message }
    pub fn data(&self) -> &Value { &self.data }

    /// Numeric code rendered in the error envelope.
    pub fn code(&self) -> u16 { self.status.as_u16() }

    /// The error set, if this is an input validation failure.
    pub fn errors(&self) -> Option<&ErrorSet> {
        match &self.kind {
            FailureKind::InvalidInput(errors) => Some(errors),
            _ => None,
        }
    }
}

// ── Rejection ────────────────────────────────────────────────────────────────

/// The error half of a handler's return value.
///
/// Defaults to `400 Bad Request`. Any `std::error::Error` converts into a
/// `Rejection` with its display text as the message, so handlers can use
/// `?` on their data layer:
///
/// ```rust
/// use waypost::{Rejection, StatusCode};
///
/// let missing = Rejection::new("message not found").status(StatusCode::NOT_FOUND);
/// assert_eq!(missing.message(), "message not found");
/// ```
#[derive(Debug)]
pub struct Rejection {
    status: Option<StatusCode>,
    message: String,
    data: Value,
}

impl Rejection {
    pub fn new(message: impl Into<String>) -> Self {
        Self { status: None, message: message.into(), data: Value::Null }
    }

    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    pub fn data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    pub fn message(&self) -> &str { &self.message }
}

impl<E> From<E> for Rejection
where
    E: std::error::Error,
{
    fn from(e: E) -> Self {
        Self::new(e.to_string())
    }
}
