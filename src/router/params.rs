use smallvec::SmallVec;
use std::sync::Arc;

use crate::pool::Reset;

/// Maximum number of path parameters stored inline before spilling to the heap.
/// Most REST APIs have ≤4 path params (e.g., /users/:id/posts/:post_id).
pub const MAX_INLINE_PARAMS: usize = 8;

/// Param Capture Buffer: ordered `(name, value)` pairs from one path match.
///
/// Order follows the left-to-right position of the parameters in the matched
/// template. Names are shared with the route table (`Arc<str>`), values are
/// owned and percent-decoded. Buffers are pooled by the router and cleared,
/// not reallocated, between requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    entries: SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>,
}

impl Params {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: SmallVec::with_capacity(capacity),
        }
    }

    /// Get a parameter value by name
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.entries.capacity()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_ref(), v.as_str()))
    }

    pub(crate) fn push(&mut self, name: Arc<str>, value: String) {
        self.entries.push((name, value));
    }
}

impl Reset for Params {
    fn reset(&mut self) {
        self.entries.clear();
    }
}
