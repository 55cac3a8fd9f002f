//! # Router Module
//!
//! The router module maps an incoming `(method, path)` pair to the handler
//! chain registered for it, capturing named path parameters along the way.
//!
//! ## Overview
//!
//! The router is responsible for:
//! - Parsing route templates (`/user/:id`, `/files/*path`) at registration
//! - Rejecting malformed or duplicate routes with a [`RouteError`](crate::RouteError)
//! - Composing global and group middleware into each route's chain
//! - Matching requests through a per-method radix tree
//! - Handing out pooled [`Params`] buffers for the captured values
//!
//! ## Architecture
//!
//! 1. **Registration**: templates are split into literal, parameter and
//!    wildcard segments and inserted into the tree for their method. Shared
//!    literal prefixes are stored once.
//!
//! 2. **Matching**: the tree is walked byte-wise. Literal edges beat the
//!    parameter edge, which beats the wildcard; a failed branch backtracks.
//!
//! ## Example
//!
//! ```rust,ignore
//! use bytego::{handler, Router, Routes};
//! use http::Method;
//!
//! let mut router = Router::new();
//! router.get("/user/new", [handler(|c| c.string(200, "form"))])?;
//! router.get("/user/:id", [handler(|c| {
//!     let id = c.param("id").unwrap_or_default().to_string();
//!     c.string(200, id)
//! })])?;
//!
//! let matched = router.find(&Method::GET, "/user/42").unwrap();
//! assert_eq!(matched.params.get("id"), Some("42"));
//! assert_eq!(&*matched.template, "/user/:id");
//! ```
//!
//! ## Performance
//!
//! - O(k) matching where k is the path length
//! - No heap allocation during the walk for routes with ≤8 parameters
//! - Reads are lock-free; the tree is immutable once serving starts

mod core;
mod group;
mod params;
mod radix;
mod template;
#[cfg(test)]
mod tests;

pub use self::core::{RouteMatch, Router, Routes, ANY_METHODS, DEFAULT_PARAMS_POOL_MAX_IDLE};
pub use group::Group;
pub use params::{Params, MAX_INLINE_PARAMS};
pub use template::join_path;
