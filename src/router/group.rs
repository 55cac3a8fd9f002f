//! Route groups: a base path and shared middleware applied at registration.
//!
//! A [`Group`] is purely a registration-time builder. Every route registered
//! through it is stored in the owning [`Router`] with the joined path and a
//! chain of `global middleware → group middleware → route handlers`. Nothing
//! about groups survives into the dispatch path.

use super::core::{Router, Routes};
use super::template::join_path;
use crate::dispatcher::Handler;
use crate::error::RouteError;

/// Builder that prefixes a base path and prepends middleware.
///
/// Nested groups inherit the parent's base path and middleware:
///
/// ```rust,ignore
/// let mut api = router.group("/api", [auth]);
/// let mut v1 = api.group("/v1", [audit]);
/// v1.get("/users/:id", [handler(show_user)])?; // GET /api/v1/users/:id
/// ```
pub struct Group<'r> {
    router: &'r mut Router,
    base_path: String,
    middleware: Vec<Handler>,
}

impl<'r> Group<'r> {
    pub(crate) fn new(router: &'r mut Router, base_path: String, middleware: Vec<Handler>) -> Self {
        Self {
            router,
            base_path,
            middleware,
        }
    }

    /// Create a sub-group below this one.
    pub fn group<I>(&mut self, relative: &str, middleware: I) -> Group<'_>
    where
        I: IntoIterator<Item = Handler>,
    {
        let mut combined = self.middleware.clone();
        combined.extend(middleware);
        Group::new(&mut *self.router, join_path(&self.base_path, relative), combined)
    }

    #[must_use]
    pub fn base_path(&self) -> &str {
        &self.base_path
    }
}

impl Routes for Group<'_> {
    fn handle<I>(&mut self, method: &str, path: &str, handlers: I) -> Result<&mut Self, RouteError>
    where
        I: IntoIterator<Item = Handler>,
    {
        let full_path = join_path(&self.base_path, path);
        self.router
            .add(method, &full_path, &self.middleware, handlers.into_iter().collect())?;
        Ok(self)
    }

    fn use_middleware<I>(&mut self, middleware: I) -> &mut Self
    where
        I: IntoIterator<Item = Handler>,
    {
        self.middleware.extend(middleware);
        self
    }
}

impl Router {
    /// Start a group rooted at `prefix` with shared `middleware`.
    pub fn group<I>(&mut self, prefix: &str, middleware: I) -> Group<'_>
    where
        I: IntoIterator<Item = Handler>,
    {
        Group::new(self, join_path("/", prefix), middleware.into_iter().collect())
    }
}
