//! Dispatcher core module - the per-request pipeline.
//!
//! [`App::serve`] is the whole request lifecycle:
//!
//! 1. Match `(method, path)` against the router.
//! 2. Acquire a pooled [`Context`] and fill it with the request, the matched
//!    chain (or the not-found chain), the captured parameters and the template.
//! 3. Run the chain with [`Context::next`].
//! 4. Route an error to the error handler, once.
//! 5. Guarantee a response: not-found body, error fallback or implicit `200`.
//! 6. Return the Context (and its parameter buffer) to their pools.

use bytes::Bytes;
use http::{Method, Request, Response, StatusCode};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, warn};

use super::cancel::CancelSignal;
use super::context::{Context, MIME_TEXT};
use crate::error::{HandlerResult, HttpError, RouteError};
use crate::ids::RequestId;
use crate::pool::Pool;
use crate::router::{Group, Router, Routes};
use crate::runtime_config::RuntimeConfig;

/// Body written when no route and no not-found handler produced a response.
pub const NOT_FOUND_BODY: &str = "404 page not found";

/// Body written when the error handler left the response uncommitted.
pub const INTERNAL_ERROR_BODY: &str = "500 internal server error";

/// A unit of work in a handler chain.
pub type Handler = Arc<dyn Fn(&mut Context) -> HandlerResult + Send + Sync>;

/// Ordered handlers for one route, shared by the route table and every
/// request that runs it.
pub type Chain = Arc<[Handler]>;

/// Process-wide error handler, called at most once per request.
pub type ErrorHandler = Arc<dyn Fn(&anyhow::Error, &mut Context) + Send + Sync>;

/// Wrap a closure as a [`Handler`].
pub fn handler<F>(f: F) -> Handler
where
    F: Fn(&mut Context) -> HandlerResult + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wrap a closure as an [`ErrorHandler`].
pub fn error_handler<F>(f: F) -> ErrorHandler
where
    F: Fn(&anyhow::Error, &mut Context) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Application-wide settings every Context can reach.
#[derive(Clone)]
pub(crate) struct AppState {
    pub error_handler: ErrorHandler,
    pub debug: bool,
}

/// Error handler used unless the application installs its own.
///
/// - [`HttpError`] → its status with `{"code": .., "msg": ..}`
/// - anything else → `500`; the message is the error text in debug mode
/// - `HEAD` requests get the status only
/// - an already committed response is left alone
pub fn default_error_handler(err: &anyhow::Error, c: &mut Context) {
    if c.response().committed() {
        error!(
            error = %err,
            status = c.response().status().as_u16(),
            "Handler error after response was committed"
        );
        return;
    }

    let (status, code, msg) = match err.downcast_ref::<HttpError>() {
        Some(http) => (http.status, http.code, http.message.clone()),
        None => {
            error!(error = %err, method = %c.method(), path = %c.path(), "Unhandled handler error");
            let status = StatusCode::INTERNAL_SERVER_ERROR;
            let msg = if c.is_debug() {
                err.to_string()
            } else {
                status.canonical_reason().unwrap_or("Internal Server Error").to_string()
            };
            (status, i64::from(status.as_u16()), msg)
        }
    };

    if c.method() == Method::HEAD {
        c.status(status);
        return;
    }
    if let Err(render_err) = c.json(status, &json!({ "code": code, "msg": msg })) {
        error!(error = %render_err, "Failed to render error response");
        c.status(status);
    }
}

/// Send the plain-text `500` when an error was handled but the error handler
/// committed nothing. An unanswered error never goes out as an implicit `200`.
pub(crate) fn write_error_fallback(c: &mut Context) {
    if !c.error_handled() || c.response().committed() {
        return;
    }
    warn!(
        request_id = ?c.request_id().map(|id| id.to_string()),
        method = %c.method(),
        path = %c.path(),
        "Error handler did not write a response, sending fallback"
    );
    c.response_mut().set_default_content_type(MIME_TEXT);
    c.status(StatusCode::INTERNAL_SERVER_ERROR);
    c.response_mut().write(INTERNAL_ERROR_BODY.as_bytes());
}

/// The application: route table, error handler and Context pool.
///
/// Build it with `&mut self` calls, then share it (directly behind an `Arc`
/// or through [`AppService`](crate::server::AppService)) and call
/// [`serve`](App::serve) from any number of threads.
pub struct App {
    router: Router,
    state: Arc<AppState>,
    contexts: Pool<Context>,
    config: RuntimeConfig,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    /// Create an application configured from the environment.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::from_env())
    }

    #[must_use]
    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            router: Router::with_params_pool(config.params_pool_max_idle),
            state: Arc::new(AppState {
                error_handler: Arc::new(default_error_handler),
                debug: config.debug,
            }),
            contexts: Pool::new(config.context_pool_max_idle, Context::new),
            config,
        }
    }

    #[must_use]
    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn router_mut(&mut self) -> &mut Router {
        &mut self.router
    }

    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Pool the per-request contexts are drawn from.
    #[must_use]
    pub fn context_pool(&self) -> &Pool<Context> {
        &self.contexts
    }

    /// Start a route group rooted at `prefix`.
    pub fn group<I>(&mut self, prefix: &str, middleware: I) -> Group<'_>
    where
        I: IntoIterator<Item = Handler>,
    {
        self.router.group(prefix, middleware)
    }

    /// Set the handlers run when no route matches.
    pub fn no_route<I>(&mut self, handlers: I) -> &mut Self
    where
        I: IntoIterator<Item = Handler>,
    {
        self.router.no_route(handlers);
        self
    }

    pub fn set_error_handler(&mut self, handler: ErrorHandler) -> &mut Self {
        Arc::make_mut(&mut self.state).error_handler = handler;
        self
    }

    pub fn set_debug(&mut self, debug: bool) -> &mut Self {
        Arc::make_mut(&mut self.state).debug = debug;
        self.config.debug = debug;
        self
    }

    #[must_use]
    pub fn is_debug(&self) -> bool {
        self.state.debug
    }

    /// Serve one request with no cancellation signal.
    pub fn serve(&self, request: Request<Bytes>) -> Response<Bytes> {
        self.serve_with_signal(request, CancelSignal::never())
    }

    /// Serve one request. Exactly one response is produced.
    pub fn serve_with_signal(&self, request: Request<Bytes>, cancel: CancelSignal) -> Response<Bytes> {
        let start = Instant::now();
        let matched = self.router.find(request.method(), request.uri().path());
        let request_id = RequestId::from_headers(request.headers());

        let mut ctx = self.contexts.acquire();
        ctx.begin(request, request_id, cancel, Arc::clone(&self.state));

        let found = matched.is_some();
        match matched {
            Some(route) => ctx.set_route(route),
            None => {
                if let Some(chain) = self.router.not_found_chain() {
                    ctx.set_handlers(Arc::clone(chain));
                }
            }
        }

        if let Err(err) = ctx.next() {
            debug!(request_id = %request_id, error = %err, "Handler chain returned an error");
            ctx.handle_error(&err);
        }
        // Covers errors a middleware handled itself and then swallowed
        write_error_fallback(&mut ctx);

        if !ctx.response().committed() {
            if found {
                ctx.status(StatusCode::OK);
            } else {
                ctx.response_mut().set_default_content_type(MIME_TEXT);
                ctx.status(StatusCode::NOT_FOUND);
                ctx.response_mut().write(NOT_FOUND_BODY.as_bytes());
            }
        }

        let elapsed = start.elapsed();
        if self.config.slow_request.is_some_and(|limit| elapsed > limit) {
            warn!(
                request_id = %request_id,
                method = %ctx.method(),
                path = %ctx.path(),
                route = ctx.route_template().unwrap_or(""),
                status = ctx.response().status().as_u16(),
                latency_ms = elapsed.as_millis() as u64,
                "Slow request"
            );
        }

        ctx.take_response()
    }
}

impl Routes for App {
    fn handle<I>(&mut self, method: &str, path: &str, handlers: I) -> Result<&mut Self, RouteError>
    where
        I: IntoIterator<Item = Handler>,
    {
        self.router.handle(method, path, handlers)?;
        Ok(self)
    }

    fn use_middleware<I>(&mut self, middleware: I) -> &mut Self
    where
        I: IntoIterator<Item = Handler>,
    {
        self.router.use_middleware(middleware);
        self
    }
}
