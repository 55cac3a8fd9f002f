//! Error types for route registration and request handling.
//!
//! Two families of failure exist and they never mix:
//!
//! - [`RouteError`] is a programmer error detected while the route table is
//!   being built. It is returned from every registration call so start-up code
//!   can fail fast with `?`. It is never produced while serving.
//! - Handler errors are plain [`anyhow::Error`] values. They travel up the
//!   chain through [`Context::next`](crate::dispatcher::Context::next) and end
//!   at the application's error handler. [`HttpError`] is the error type
//!   handlers use when they want a specific status code in the response.

use http::StatusCode;
use thiserror::Error;

/// Result of running a handler.
pub type HandlerResult = Result<(), anyhow::Error>;

/// Route table construction failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    /// Method string was empty.
    #[error("method must not be empty")]
    EmptyMethod,

    /// Method string is not a valid HTTP method token.
    #[error("invalid HTTP method '{0}'")]
    InvalidMethod(String),

    /// Path did not begin with `/`.
    #[error("path must begin with '/' in path '{0}'")]
    InvalidPath(String),

    /// No handlers were supplied for the route.
    #[error("handler chain must not be empty for {method} {path}")]
    EmptyChain { method: String, path: String },

    /// A `:` or `*` segment without a name.
    #[error("empty parameter name in path '{0}'")]
    EmptyParamName(String),

    /// A `*name` segment followed by more path.
    #[error("wildcard must be the last segment in path '{0}'")]
    WildcardNotLast(String),

    /// The same parameter name appears twice in one template.
    #[error("duplicate parameter name '{name}' in path '{path}'")]
    DuplicateParam { name: String, path: String },

    /// The (method, template) pair already resolves to a handler chain.
    #[error("route already registered: {method} {path}")]
    DuplicateRoute { method: String, path: String },
}

/// Handler error carrying the HTTP status to respond with.
///
/// The default error handler renders it as `{"code": .., "msg": ..}` using
/// `status` for the response line. `code` defaults to the numeric status and
/// can be overridden with an application-specific code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HttpError {
    pub status: StatusCode,
    pub code: i64,
    pub message: String,
}

impl HttpError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            code: i64::from(status.as_u16()),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn with_code(mut self, code: i64) -> Self {
        self.code = code;
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}

/// A redirect was requested with a status outside `300..=308`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid redirect status code {0}")]
pub struct InvalidRedirect(pub StatusCode);

/// A cookie name that is empty or not an HTTP token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid cookie name '{0}'")]
pub struct InvalidCookieName(pub String);
