//! Router core module - route registration and the lookup hot path.
//!
//! The router owns one [`RadixTree`] per HTTP method. Registration validates
//! the method, the path and the handler chain, composes the chain with the
//! global middleware registered so far, and fails fast with a [`RouteError`].
//! Lookup walks the method's tree and fills a pooled [`Params`] buffer.

use http::Method;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::params::Params;
use super::radix::{InsertError, RadixTree, ValueVec};
use super::template;
use crate::dispatcher::{Chain, Handler};
use crate::error::RouteError;
use crate::pool::{Pool, Pooled};

/// Default number of idle [`Params`] buffers kept by the router's pool.
pub const DEFAULT_PARAMS_POOL_MAX_IDLE: usize = 1024;

/// Methods registered by [`Routes::any`].
pub const ANY_METHODS: [Method; 9] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::PATCH,
    Method::HEAD,
    Method::OPTIONS,
    Method::TRACE,
    Method::CONNECT,
];

/// Result of successfully matching a request path to a route
pub struct RouteMatch {
    /// Full handler chain: global middleware, group middleware, route handlers
    pub handlers: Chain,
    /// Captured parameters in template order, percent-decoded
    pub params: Pooled<Params>,
    /// The template the request matched (e.g. `/user/:id`)
    pub template: Arc<str>,
}

impl std::fmt::Debug for RouteMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteMatch")
            .field("handlers", &self.handlers.len())
            .field("params", &self.params)
            .field("template", &self.template)
            .finish()
    }
}

/// Registration surface shared by [`Router`], [`Group`](super::Group) and
/// [`App`](crate::App).
///
/// Every call returns `Result` so start-up code can propagate configuration
/// mistakes with `?` instead of discovering them under load.
pub trait Routes: Sized {
    /// Register `handlers` for `method` and `path`.
    fn handle<I>(&mut self, method: &str, path: &str, handlers: I) -> Result<&mut Self, RouteError>
    where
        I: IntoIterator<Item = Handler>;

    /// Append middleware applied to routes registered after this call.
    fn use_middleware<I>(&mut self, middleware: I) -> &mut Self
    where
        I: IntoIterator<Item = Handler>;

    /// Register `middleware` followed by a terminal handler.
    fn route<I>(
        &mut self,
        method: &str,
        path: &str,
        middleware: I,
        terminal: Handler,
    ) -> Result<&mut Self, RouteError>
    where
        I: IntoIterator<Item = Handler>,
    {
        self.handle(method, path, middleware.into_iter().chain(std::iter::once(terminal)))
    }

    fn get<I>(&mut self, path: &str, handlers: I) -> Result<&mut Self, RouteError>
    where
        I: IntoIterator<Item = Handler>,
    {
        self.handle(Method::GET.as_str(), path, handlers)
    }

    fn post<I>(&mut self, path: &str, handlers: I) -> Result<&mut Self, RouteError>
    where
        I: IntoIterator<Item = Handler>,
    {
        self.handle(Method::POST.as_str(), path, handlers)
    }

    fn put<I>(&mut self, path: &str, handlers: I) -> Result<&mut Self, RouteError>
    where
        I: IntoIterator<Item = Handler>,
    {
        self.handle(Method::PUT.as_str(), path, handlers)
    }

    fn delete<I>(&mut self, path: &str, handlers: I) -> Result<&mut Self, RouteError>
    where
        I: IntoIterator<Item = Handler>,
    {
        self.handle(Method::DELETE.as_str(), path, handlers)
    }

    fn patch<I>(&mut self, path: &str, handlers: I) -> Result<&mut Self, RouteError>
    where
        I: IntoIterator<Item = Handler>,
    {
        self.handle(Method::PATCH.as_str(), path, handlers)
    }

    fn head<I>(&mut self, path: &str, handlers: I) -> Result<&mut Self, RouteError>
    where
        I: IntoIterator<Item = Handler>,
    {
        self.handle(Method::HEAD.as_str(), path, handlers)
    }

    fn options<I>(&mut self, path: &str, handlers: I) -> Result<&mut Self, RouteError>
    where
        I: IntoIterator<Item = Handler>,
    {
        self.handle(Method::OPTIONS.as_str(), path, handlers)
    }

    fn trace<I>(&mut self, path: &str, handlers: I) -> Result<&mut Self, RouteError>
    where
        I: IntoIterator<Item = Handler>,
    {
        self.handle(Method::TRACE.as_str(), path, handlers)
    }

    /// Register `handlers` under every method in [`ANY_METHODS`].
    fn any<I>(&mut self, path: &str, handlers: I) -> Result<&mut Self, RouteError>
    where
        I: IntoIterator<Item = Handler>,
    {
        let handlers: Vec<Handler> = handlers.into_iter().collect();
        for method in &ANY_METHODS {
            self.handle(method.as_str(), path, handlers.iter().cloned())?;
        }
        Ok(self)
    }
}

/// Router that matches HTTP requests to handler chains using one radix tree
/// per method.
///
/// # Lifecycle
///
/// Routes are registered through `&mut self` during start-up. Once the router
/// is shared (inside an [`App`](crate::App) behind an `Arc`) it is read-only,
/// and [`find`](Router::find) is safe to call from any number of threads.
///
/// # Performance
///
/// - Route matching: O(k) where k is path length, independent of route count
/// - Captured values are collected in a stack buffer during the walk
/// - The [`Params`] handed out are drawn from a pool pre-sized to the largest
///   parameter count of any registered template
pub struct Router {
    trees: HashMap<Method, RadixTree<Chain>>,
    middleware: Vec<Handler>,
    not_found: Vec<Handler>,
    not_found_chain: Option<Chain>,
    max_params: usize,
    params_pool: Pool<Params>,
    params_pool_max_idle: usize,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("methods", &self.trees.len())
            .field("middleware", &self.middleware.len())
            .field("not_found", &self.not_found.len())
            .field("max_params", &self.max_params)
            .field("params_pool_max_idle", &self.params_pool_max_idle)
            .finish_non_exhaustive()
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    #[must_use]
    pub fn new() -> Self {
        Self::with_params_pool(DEFAULT_PARAMS_POOL_MAX_IDLE)
    }

    /// Create a router whose [`Params`] pool keeps at most `max_idle` buffers.
    #[must_use]
    pub fn with_params_pool(max_idle: usize) -> Self {
        Self {
            trees: HashMap::new(),
            middleware: Vec::new(),
            not_found: Vec::new(),
            not_found_chain: None,
            max_params: 0,
            params_pool: params_pool(max_idle, 0),
            params_pool_max_idle: max_idle,
        }
    }

    /// Register a route. `prefix` is the group middleware placed between the
    /// global middleware and `handlers`.
    pub(crate) fn add(
        &mut self,
        method: &str,
        path: &str,
        prefix: &[Handler],
        handlers: Vec<Handler>,
    ) -> Result<(), RouteError> {
        if method.is_empty() {
            return Err(RouteError::EmptyMethod);
        }
        let method = Method::from_bytes(method.as_bytes())
            .map_err(|_| RouteError::InvalidMethod(method.to_string()))?;
        if !path.starts_with('/') {
            return Err(RouteError::InvalidPath(path.to_string()));
        }
        if handlers.is_empty() {
            return Err(RouteError::EmptyChain {
                method: method.to_string(),
                path: path.to_string(),
            });
        }

        let chain = combine(&[&self.middleware, prefix, &handlers]);
        let chain_len = chain.len();
        let tree = self.trees.entry(method.clone()).or_insert_with(RadixTree::new);
        let param_count = tree.insert(path, chain).map_err(|err| match err {
            InsertError::Template(err) => err,
            InsertError::Duplicate => RouteError::DuplicateRoute {
                method: method.to_string(),
                path: path.to_string(),
            },
        })?;

        if param_count > self.max_params {
            self.max_params = param_count;
            self.params_pool = params_pool(self.params_pool_max_idle, param_count);
        }

        info!(
            method = %method,
            path = %path,
            handlers = chain_len,
            params = param_count,
            "Route registered"
        );
        Ok(())
    }

    /// Match `method` and `path` against the registered routes.
    ///
    /// `path` may be raw or percent-encoded in any casing; it is brought to
    /// the canonical encoding the templates were stored in before the walk.
    ///
    /// Returns `None` when no route matches; the caller decides what a miss
    /// means (the dispatch pipeline runs the not-found chain).
    #[must_use]
    pub fn find(&self, method: &Method, path: &str) -> Option<RouteMatch> {
        let Some(tree) = self.trees.get(method) else {
            debug!(method = %method, path = %path, "No routes registered for method");
            return None;
        };

        let canonical = template::canonical(path);
        let mut values = ValueVec::new();
        let Some(leaf) = tree.find(&canonical, &mut values) else {
            debug!(method = %method, path = %path, "No route matched");
            return None;
        };

        let mut params = self.params_pool.acquire();
        for (name, raw) in leaf.param_names.iter().zip(values) {
            params.push(Arc::clone(name), decode(raw));
        }

        debug!(
            method = %method,
            path = %path,
            route = %leaf.template,
            params = params.len(),
            "Route matched"
        );

        Some(RouteMatch {
            handlers: Arc::clone(&leaf.value),
            params,
            template: Arc::clone(&leaf.template),
        })
    }

    /// Set the handlers run when no route matches.
    ///
    /// The effective chain is the global middleware followed by `handlers`.
    pub fn no_route<I>(&mut self, handlers: I) -> &mut Self
    where
        I: IntoIterator<Item = Handler>,
    {
        self.not_found = handlers.into_iter().collect();
        self.rebuild_not_found();
        self
    }

    /// Chain for requests that matched no route, if any handler is set.
    #[must_use]
    pub fn not_found_chain(&self) -> Option<&Chain> {
        self.not_found_chain.as_ref()
    }

    fn rebuild_not_found(&mut self) {
        self.not_found_chain = if self.middleware.is_empty() && self.not_found.is_empty() {
            None
        } else {
            Some(combine(&[&self.middleware, &self.not_found]))
        };
    }

    /// Largest parameter count of any registered template.
    #[must_use]
    pub fn max_params(&self) -> usize {
        self.max_params
    }

    /// Pool backing the [`Params`] buffers handed out by [`find`](Router::find).
    #[must_use]
    pub fn params_pool(&self) -> &Pool<Params> {
        &self.params_pool
    }

    /// Registered `(method, template)` pairs, sorted by method then template.
    #[must_use]
    pub fn routes(&self) -> Vec<(Method, Arc<str>)> {
        let mut routes: Vec<(Method, Arc<str>)> = self
            .trees
            .iter()
            .flat_map(|(method, tree)| {
                tree.leaves()
                    .into_iter()
                    .map(move |leaf| (method.clone(), Arc::clone(&leaf.template)))
            })
            .collect();
        routes.sort_by(|a, b| (a.0.as_str(), &a.1).cmp(&(b.0.as_str(), &b.1)));
        routes
    }

    /// Log every registered route at info level.
    pub fn dump_routes(&self) {
        let routes = self.routes();
        info!(routes_count = routes.len(), "Routing table");
        for (method, template) in &routes {
            info!(method = %method, route = %template, "Route");
        }
    }
}

impl Routes for Router {
    fn handle<I>(&mut self, method: &str, path: &str, handlers: I) -> Result<&mut Self, RouteError>
    where
        I: IntoIterator<Item = Handler>,
    {
        self.add(method, path, &[], handlers.into_iter().collect())?;
        Ok(self)
    }

    fn use_middleware<I>(&mut self, middleware: I) -> &mut Self
    where
        I: IntoIterator<Item = Handler>,
    {
        self.middleware.extend(middleware);
        self.rebuild_not_found();
        self
    }
}

fn params_pool(max_idle: usize, capacity: usize) -> Pool<Params> {
    Pool::new(max_idle, move || Params::with_capacity(capacity))
}

/// Concatenate handler slices into one shared chain.
fn combine(parts: &[&[Handler]]) -> Chain {
    parts
        .iter()
        .flat_map(|part| part.iter().cloned())
        .collect::<Vec<_>>()
        .into()
}

/// Percent-decode a captured value, keeping the raw text if it is not valid
/// UTF-8 once decoded.
fn decode(raw: &str) -> String {
    match urlencoding::decode(raw) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => raw.to_string(),
    }
}
