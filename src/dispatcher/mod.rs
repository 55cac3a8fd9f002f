//! # Dispatcher Module
//!
//! The dispatcher module runs the handler chain for each request and owns the
//! request lifecycle from route match to final response.
//!
//! ## Overview
//!
//! - [`App`] holds the router, the error handler and the pool of [`Context`]s
//! - [`Context`] carries one request through its chain: the request, the
//!   response being built, captured parameters, the chain cursor and a
//!   key/value [`Store`]
//! - [`CancelSignal`] lets the host tell handlers the client has gone away
//!
//! ## Request Flow
//!
//! 1. Router matches `(method, path)` → chain, parameters, template
//! 2. A Context is taken from the pool and filled
//! 3. [`Context::next`] runs the chain; middleware wrap the rest of the chain
//!    by calling `next` themselves
//! 4. A returned error goes to the error handler exactly once
//! 5. The pipeline makes sure something was written (404, 500 fallback or an
//!    implicit 200) and converts the buffered response
//! 6. The Context is reset and returned to the pool
//!
//! ## Error Handling
//!
//! - Handlers return `Result<(), anyhow::Error>`; `?` works for any error type
//! - [`HttpError`](crate::HttpError) picks the response status
//! - Anything else becomes a `500` via [`default_error_handler`]
//! - Panics are not caught here; install [`recovery`](crate::middleware::recovery)
//!
//! ## Example
//!
//! ```rust,ignore
//! use bytego::{handler, App, Routes};
//! use http::StatusCode;
//!
//! let mut app = App::new();
//! app.get("/hello/:name", [handler(|c| {
//!     let name = c.param("name").unwrap_or("world").to_string();
//!     c.string(StatusCode::OK, format!("hello {name}"))
//! })])?;
//!
//! let response = app.serve(request);
//! ```

mod cancel;
mod context;
mod cookie;
mod core;

pub use cancel::{CancelSignal, Cancelled};
pub use context::{Context, Store, MIME_FORM, MIME_HTML, MIME_JSON, MIME_TEXT};
pub use cookie::{CookieOptions, SameSite};
pub use self::core::{
    default_error_handler, error_handler, handler, App, Chain, ErrorHandler, Handler,
    INTERNAL_ERROR_BODY, NOT_FOUND_BODY,
};
pub(crate) use self::core::write_error_fallback;
