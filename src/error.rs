//! Unified error types.

use thiserror::Error;

/// Boxed error returned by strategy functions (authenticate, authorize,
/// custom filters and validators).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type returned by waypost's fallible infrastructure operations.
///
/// Request-level outcomes (401, 403, 400) are expressed as
/// [`Failure`](crate::Failure) values rendered into the response envelope,
/// not as `Error`s. This type surfaces build, config and socket failures.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("configuration: {0}")]
    Config(#[from] ConfigError),
}

/// A problem detected while compiling route definitions.
///
/// Always raised by [`Builder::build`](crate::Builder::build), before any
/// endpoint is bound. Never produced at request time.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("route `{route}` references unknown authorize function `{name}`")]
    UnknownAuthorize { route: String, name: String },

    #[error("unknown filter strategy `{0}`")]
    UnknownFilter(String),

    #[error("unknown validate strategy `{0}`")]
    UnknownValidate(String),

    #[error("unknown engine `{0}`")]
    UnknownEngine(String),

    #[error("route `{route}` requires authentication but no authenticate function is set")]
    MissingAuthenticate { route: String },

    #[error("route `{route}` is already defined")]
    DuplicateRoute { route: String },

    #[error("invalid route `{route}`: {reason}")]
    InvalidRoute { route: String, reason: String },
}
