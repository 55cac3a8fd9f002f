//! Per-request state bag and chain cursor.
//!
//! A [`Context`] is drawn from the application's pool for every request,
//! filled by the dispatch pipeline, driven through the handler chain with
//! [`Context::next`] and reset when it returns to the pool.

use bytes::Bytes;
use http::header::{HeaderName, CONTENT_TYPE, LOCATION, SET_COOKIE};
use http::{HeaderValue, Method, Request, StatusCode};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::Any;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use super::cancel::CancelSignal;
use super::cookie::{self, CookieOptions, SameSite};
use super::core::{default_error_handler, AppState, Chain};
use crate::error::{HandlerResult, HttpError, InvalidRedirect};
use crate::ids::RequestId;
use crate::pool::{Pooled, Reset};
use crate::router::{Params, RouteMatch};
use crate::server::ResponseTracker;

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_REAL_IP: &str = "x-real-ip";

pub const MIME_TEXT: &str = "text/plain; charset=utf-8";
pub const MIME_HTML: &str = "text/html; charset=utf-8";
pub const MIME_JSON: &str = "application/json; charset=utf-8";
pub const MIME_FORM: &str = "application/x-www-form-urlencoded";

type StoreValue = Arc<dyn Any + Send + Sync>;

/// Key/value store shared by the handlers of one request.
///
/// Handlers of a request run one at a time, but a handler may hand the store
/// to background work that outlives its call, so access is guarded by a
/// `RwLock`. Cloning yields another handle to the same map.
#[derive(Clone, Default)]
pub struct Store {
    inner: Arc<RwLock<HashMap<String, StoreValue>>>,
}

impl Store {
    pub fn set<T: Any + Send + Sync>(&self, key: impl Into<String>, value: T) {
        self.inner.write().insert(key.into(), Arc::new(value));
    }

    /// Value under `key`, if present and of type `T`.
    #[must_use]
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        let value = self.inner.read().get(key).map(Arc::clone)?;
        value.downcast::<T>().ok()
    }

    pub fn remove(&self, key: &str) -> bool {
        self.inner.write().remove(key).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.inner.read().keys()).finish()
    }
}

/// The per-request context passed to every handler.
///
/// # Chain cursor
///
/// The cursor is `-1` before the chain starts. [`next`](Context::next) runs
/// every remaining handler in order; a middleware that calls `next` itself
/// wraps the rest of the chain, code after the call runs on the way out.
/// [`abort`](Context::abort) moves the cursor to [`Context::ABORT_INDEX`] so no
/// further handler runs.
pub struct Context {
    request: Request<Bytes>,
    response: ResponseTracker,
    params: Option<Pooled<Params>>,
    handlers: Option<Chain>,
    index: isize,
    route_template: Option<Arc<str>>,
    store: Option<Store>,
    error_handled: bool,
    request_id: Option<RequestId>,
    state: Option<Arc<AppState>>,
    cancel: CancelSignal,
    same_site: Option<SameSite>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("method", self.request.method())
            .field("uri", self.request.uri())
            .field("route", &self.route_template)
            .field("index", &self.index)
            .field("params", &self.params)
            .field("committed", &self.response.committed())
            .finish_non_exhaustive()
    }
}

impl Context {
    /// Cursor value after [`abort`](Context::abort). Always past the end of
    /// any real chain, and far enough from `isize::MAX` that the increments
    /// made while unwinding cannot overflow.
    pub const ABORT_INDEX: isize = isize::MAX / 2;

    #[must_use]
    pub fn new() -> Self {
        Self {
            request: Request::default(),
            response: ResponseTracker::new(),
            params: None,
            handlers: None,
            index: -1,
            route_template: None,
            store: None,
            error_handled: false,
            request_id: None,
            state: None,
            cancel: CancelSignal::never(),
            same_site: None,
        }
    }

    pub(crate) fn begin(
        &mut self,
        request: Request<Bytes>,
        request_id: RequestId,
        cancel: CancelSignal,
        state: Arc<AppState>,
    ) {
        self.request = request;
        self.request_id = Some(request_id);
        self.cancel = cancel;
        self.state = Some(state);
    }

    pub(crate) fn set_route(&mut self, matched: RouteMatch) {
        self.handlers = Some(matched.handlers);
        self.params = Some(matched.params);
        self.route_template = Some(matched.template);
    }

    pub(crate) fn set_handlers(&mut self, handlers: Chain) {
        self.handlers = Some(handlers);
    }

    // ---- chain control -------------------------------------------------

    /// Run the remaining handlers.
    ///
    /// Stops at the first error and returns it to the caller, which is the
    /// middleware that called `next` or, at the top, the dispatch pipeline.
    pub fn next(&mut self) -> HandlerResult {
        let Some(handlers) = self.handlers.as_ref().map(Arc::clone) else {
            return Ok(());
        };
        self.index += 1;
        while let Some(handler) = usize::try_from(self.index)
            .ok()
            .and_then(|i| handlers.get(i))
        {
            let result = handler(self);
            self.index += 1;
            result?;
        }
        Ok(())
    }

    /// Stop the chain: no handler after the current one runs.
    pub fn abort(&mut self) {
        self.index = Self::ABORT_INDEX;
    }

    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.index >= Self::ABORT_INDEX
    }

    /// Current chain cursor (`-1` before the chain starts).
    #[must_use]
    pub fn index(&self) -> isize {
        self.index
    }

    /// Set the status and stop the chain.
    pub fn abort_with_status(&mut self, status: StatusCode) {
        self.response.write_status(status);
        self.abort();
    }

    /// Pass `err` to the application's error handler, at most once per request.
    pub fn handle_error(&mut self, err: &anyhow::Error) {
        if self.error_handled {
            return;
        }
        self.error_handled = true;
        match self.state.as_ref().map(|s| Arc::clone(&s.error_handler)) {
            Some(handler) => handler(err, self),
            None => default_error_handler(err, self),
        }
    }

    #[must_use]
    pub fn error_handled(&self) -> bool {
        self.error_handled
    }

    #[must_use]
    pub fn is_debug(&self) -> bool {
        self.state.as_ref().is_some_and(|s| s.debug)
    }

    // ---- request -------------------------------------------------------

    #[must_use]
    pub fn request(&self) -> &Request<Bytes> {
        &self.request
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        self.request.method()
    }

    #[must_use]
    pub fn path(&self) -> &str {
        self.request.uri().path()
    }

    /// Captured path parameter, percent-decoded.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.as_ref().and_then(|p| p.get(name))
    }

    /// Captured parameters in template order.
    pub fn params(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().flat_map(|p| p.iter())
    }

    /// First value of query parameter `key`, decoded.
    #[must_use]
    pub fn query(&self, key: &str) -> Option<String> {
        let query = self.request.uri().query()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    /// First value of form field `key`: the urlencoded request body is
    /// searched before the query string.
    #[must_use]
    pub fn form(&self, key: &str) -> Option<String> {
        if self.content_type() == MIME_FORM {
            let found = url::form_urlencoded::parse(self.request.body())
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.into_owned());
            if found.is_some() {
                return found;
            }
        }
        self.query(key)
    }

    /// Value of request cookie `name`, as sent by the client.
    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<&str> {
        cookie::find_cookie(self.request.headers(), name)
    }

    /// Request header as text. `None` if absent or not visible ASCII.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.request.headers().get(name)?.to_str().ok()
    }

    /// Media type of the request body without parameters.
    #[must_use]
    pub fn content_type(&self) -> &str {
        let value = self.header(CONTENT_TYPE.as_str()).unwrap_or("");
        value
            .split([';', ' '])
            .next()
            .unwrap_or(value)
    }

    /// Client address: first `X-Forwarded-For` hop, then `X-Real-Ip`, then
    /// the peer address the host stored in the request extensions.
    #[must_use]
    pub fn client_ip(&self) -> Option<String> {
        if let Some(forwarded) = self.header(X_FORWARDED_FOR).filter(|v| !v.is_empty()) {
            let first = forwarded.split(',').next().unwrap_or(forwarded).trim();
            return Some(first.to_string());
        }
        if let Some(real_ip) = self.header(X_REAL_IP).filter(|v| !v.is_empty()) {
            return Some(real_ip.to_string());
        }
        self.request
            .extensions()
            .get::<SocketAddr>()
            .map(|addr| addr.ip().to_string())
    }

    #[must_use]
    pub fn body(&self) -> &Bytes {
        self.request.body()
    }

    /// Deserialize the JSON body. Failures become a `400` [`HttpError`].
    pub fn bind_json<T: DeserializeOwned>(&self) -> Result<T, HttpError> {
        serde_json::from_slice(self.request.body())
            .map_err(|err| HttpError::bad_request(format!("invalid JSON body: {err}")))
    }

    /// Template of the matched route, `None` on the not-found chain.
    #[must_use]
    pub fn route_template(&self) -> Option<&str> {
        self.route_template.as_deref()
    }

    #[must_use]
    pub fn request_id(&self) -> Option<RequestId> {
        self.request_id
    }

    #[must_use]
    pub fn cancellation(&self) -> &CancelSignal {
        &self.cancel
    }

    // ---- response ------------------------------------------------------

    #[must_use]
    pub fn response(&self) -> &ResponseTracker {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut ResponseTracker {
        &mut self.response
    }

    pub fn status(&mut self, status: StatusCode) {
        self.response.write_status(status);
    }

    /// Set a response header; an empty value removes it.
    pub fn set_header(&mut self, name: HeaderName, value: &str) -> HandlerResult {
        if value.is_empty() {
            self.response.remove_header(&name);
            return Ok(());
        }
        self.response.set_header(name, HeaderValue::from_str(value)?);
        Ok(())
    }

    /// Add to a comma-separated response header without repeating a value.
    pub fn append_header(&mut self, name: HeaderName, value: &str) -> HandlerResult {
        if value.is_empty() {
            return Ok(());
        }
        self.response.append_header(name, HeaderValue::from_str(value)?);
        Ok(())
    }

    pub fn remove_header(&mut self, name: &HeaderName) {
        self.response.remove_header(name);
    }

    pub fn string(&mut self, status: StatusCode, body: impl AsRef<str>) -> HandlerResult {
        self.blob(status, MIME_TEXT, body.as_ref().as_bytes())
    }

    pub fn html(&mut self, status: StatusCode, body: impl AsRef<str>) -> HandlerResult {
        self.blob(status, MIME_HTML, body.as_ref().as_bytes())
    }

    pub fn json<T: Serialize + ?Sized>(&mut self, status: StatusCode, value: &T) -> HandlerResult {
        let body = serde_json::to_vec(value)?;
        self.blob(status, MIME_JSON, &body)
    }

    /// Write `data` with `content_type` unless a handler already set one.
    pub fn blob(&mut self, status: StatusCode, content_type: &'static str, data: &[u8]) -> HandlerResult {
        self.response.set_default_content_type(content_type);
        self.response.write_status(status);
        self.response.write(data);
        Ok(())
    }

    /// Redirect to `location`. `status` must be a 3xx code up to 308.
    pub fn redirect(&mut self, status: StatusCode, location: &str) -> HandlerResult {
        if !(300..=308).contains(&status.as_u16()) {
            return Err(InvalidRedirect(status).into());
        }
        self.response.set_header(LOCATION, HeaderValue::from_str(location)?);
        self.response.write_status(status);
        Ok(())
    }

    /// `SameSite` attribute for cookies set later in this request.
    pub fn set_same_site(&mut self, same_site: SameSite) {
        self.same_site = Some(same_site);
    }

    /// Add a `Set-Cookie` header. The value is query-escaped and the path
    /// defaults to `/`.
    pub fn set_cookie(&mut self, name: &str, value: &str, options: &CookieOptions) -> HandlerResult {
        let header = cookie::render_set_cookie(name, value, options, self.same_site)?;
        self.response.add_header(SET_COOKIE, header);
        Ok(())
    }

    pub fn no_content(&mut self) {
        self.response.write_status(StatusCode::NO_CONTENT);
    }

    pub(crate) fn take_response(&mut self) -> http::Response<Bytes> {
        self.response.take_response()
    }

    // ---- store ---------------------------------------------------------

    /// Handle to this request's store, created on first use.
    pub fn store(&mut self) -> Store {
        self.store.get_or_insert_with(Store::default).clone()
    }

    pub fn set<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.store.get_or_insert_with(Store::default).set(key, value);
    }

    #[must_use]
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.store.as_ref()?.get(key)
    }
}

impl Reset for Context {
    fn reset(&mut self) {
        self.request = Request::default();
        self.response.reset();
        self.params = None;
        self.handlers = None;
        self.index = -1;
        self.route_template = None;
        self.store = None;
        self.error_handled = false;
        self.request_id = None;
        self.state = None;
        self.cancel = CancelSignal::never();
        self.same_site = None;
    }
}
