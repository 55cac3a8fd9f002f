//! # bytego
//!
//! **bytego** is the request-dispatch core of a small HTTP micro-framework: a
//! radix-tree router with named parameters and trailing wildcards, a pooled
//! per-request [`Context`], and a cooperative middleware chain with explicit
//! continuation ([`Context::next`]), short-circuit ([`Context::abort`]) and
//! centralised error handling.
//!
//! ## Architecture
//!
//! - **[`router`]** - Route templates, per-method radix trees, route groups
//! - **[`dispatcher`]** - [`App`], [`Context`], the chain cursor and the error handler
//! - **[`server`]** - Buffered response tracker and the cloneable [`AppService`]
//! - **[`middleware`]** - Recovery, request logging, CORS, request ids
//! - **[`pool`]** - Typed free-list pools for contexts and parameter buffers
//! - **[`runtime_config`]** / **[`logging`]** - Environment-driven tuning and
//!   `tracing-subscriber` setup
//!
//! The crate does not open sockets. A host server converts its requests to
//! `http::Request<Bytes>` and calls [`AppService::call`].
//!
//! ### Request Handling Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Host as Host server
//!     participant App as App::serve
//!     participant Router as Router
//!     participant Pool as Context pool
//!     participant Chain as Handler chain
//!     participant Err as Error handler
//!
//!     Host->>App: Request<Bytes>
//!     App->>Router: find(method, path)
//!     Router-->>App: chain + params + template (or miss)
//!     App->>Pool: acquire()
//!     Pool-->>App: Context (reset)
//!     App->>Chain: ctx.next()
//!     Chain->>Chain: middleware → next() → terminal
//!     alt handler returned Err
//!         Chain-->>App: Err(e)
//!         App->>Err: handle_error(e) (once)
//!     end
//!     App->>App: 404 / 500 fallback / implicit 200
//!     App-->>Host: Response<Bytes>
//!     App->>Pool: drop → reset + release
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use bytego::middleware::{logger, recovery};
//! use bytego::{handler, App, AppService, HttpError, Routes};
//! use http::StatusCode;
//!
//! let _guard = bytego::logging::init_logging()?;
//!
//! let mut app = App::new();
//! app.use_middleware([recovery(), logger()]);
//! app.get("/users/:id", [handler(|c| {
//!     let id: u64 = c
//!         .param("id")
//!         .and_then(|v| v.parse().ok())
//!         .ok_or_else(|| HttpError::bad_request("id must be numeric"))?;
//!     c.json(StatusCode::OK, &serde_json::json!({ "id": id }))
//! })])?;
//!
//! let mut api = app.group("/api/v1", []);
//! api.get("/files/*path", [handler(|c| {
//!     let path = c.param("path").unwrap_or_default().to_string();
//!     c.string(StatusCode::OK, path)
//! })])?;
//!
//! let service = AppService::new(app);
//! // for each request: service.call(request)
//! ```
//!
//! ## Route Templates
//!
//! | Segment | Matches | Example |
//! |---|---|---|
//! | literal | exact text | `/users/new` |
//! | `:name` | one non-empty segment | `/users/:id` |
//! | `*name` | rest of the path, may be empty | `/files/*path` |
//!
//! Literals beat parameters, parameters beat wildcards. Duplicate routes are
//! rejected at registration with [`RouteError::DuplicateRoute`].

pub mod dispatcher;
pub mod error;
pub mod ids;
pub mod logging;
pub mod middleware;
pub mod pool;
pub mod router;
pub mod runtime_config;
pub mod server;

pub use dispatcher::{
    default_error_handler, error_handler, handler, App, CancelSignal, Cancelled, Chain, Context,
    CookieOptions, ErrorHandler, Handler, SameSite, Store,
};
pub use error::{HandlerResult, HttpError, InvalidCookieName, InvalidRedirect, RouteError};
pub use ids::RequestId;
pub use pool::{Pool, PoolMetrics, Pooled, Reset};
pub use router::{join_path, Group, Params, RouteMatch, Router, Routes};
pub use runtime_config::RuntimeConfig;
pub use server::{AppService, ResponseTracker};
