//! Radix tree implementation for efficient HTTP route matching
//!
//! This module provides a radix tree (also called compact prefix tree) for O(k)
//! route matching where k is the path length, independent of the number of
//! registered routes.
//!
//! ## Node layout
//!
//! Every node owns a byte prefix. Literal text shared by several templates is
//! stored once: inserting `/user/new` next to `/user/list` splits the common
//! `/user/` into an intermediate node with two children. Besides its literal
//! children (indexed by their first byte) a node may carry:
//!
//! - one **parameter edge** (`:name`) consuming exactly one non-empty path
//!   segment, leading to a node that continues matching after the segment;
//! - one **wildcard leaf** (`*name`) consuming the rest of the path;
//! - one **leaf**, if a template ends exactly at this node.
//!
//! Parameter and wildcard names are not stored on the edges. Each leaf keeps
//! the ordered names of its own template, so `/users/:id/posts` and
//! `/users/:user_id/comments` share the parameter edge yet report their own
//! names.
//!
//! ## Matching precedence
//!
//! At every node the literal edge is tried first, then the parameter edge, then
//! the wildcard. Failure below an edge backtracks to the next alternative, so
//! `/user/new` beats `/user/:id` for the request `/user/new` while
//! `/user/newbie` still reaches the parameter route.
//!
//! Literal bytes are stored in the canonical percent-encoding of
//! [`template::canonical`], and [`RadixTree::find`] expects a path already in
//! that form.
//!
//! A wildcard also matches an empty remainder: `/files/*path` matches
//! `/files/` with `path = ""`, but not `/files`.

use smallvec::SmallVec;
use std::borrow::Cow;
use std::sync::Arc;

use super::params::MAX_INLINE_PARAMS;
use super::template::{self, Segment};
use crate::error::RouteError;

/// Parameter values captured during one walk, borrowed from the request path.
pub(crate) type ValueVec<'p> = SmallVec<[&'p str; MAX_INLINE_PARAMS]>;

/// Terminal data stored where a template ends.
#[derive(Debug)]
pub(crate) struct Leaf<T> {
    pub value: T,
    pub template: Arc<str>,
    pub param_names: Box<[Arc<str>]>,
}

/// Why a template could not be inserted.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum InsertError {
    Template(RouteError),
    Duplicate,
}

/// Node in the radix tree
#[derive(Debug)]
struct RadixNode<T> {
    /// Literal bytes owned by this node (empty for the root and parameter nodes)
    prefix: Vec<u8>,
    /// First byte of each literal child's prefix, parallel to `children`
    indices: Vec<u8>,
    children: Vec<RadixNode<T>>,
    param: Option<Box<RadixNode<T>>>,
    wildcard: Option<Box<Leaf<T>>>,
    leaf: Option<Box<Leaf<T>>>,
}

impl<T> RadixNode<T> {
    fn new(prefix: &[u8]) -> Self {
        Self {
            prefix: prefix.to_vec(),
            indices: Vec::new(),
            children: Vec::new(),
            param: None,
            wildcard: None,
            leaf: None,
        }
    }

    /// Split this node at `at`: the node keeps `prefix[..at]` and a single
    /// child inherits the suffix together with everything hanging below.
    fn split(&mut self, at: usize) {
        let child = RadixNode {
            prefix: self.prefix.split_off(at),
            indices: std::mem::take(&mut self.indices),
            children: std::mem::take(&mut self.children),
            param: self.param.take(),
            wildcard: self.wildcard.take(),
            leaf: self.leaf.take(),
        };
        self.indices.push(child.prefix[0]);
        self.children.push(child);
    }

    fn insert(&mut self, segments: &[Segment<'_>], leaf: Leaf<T>) -> Result<(), InsertError> {
        let Some((first, rest)) = segments.split_first() else {
            if self.leaf.is_some() {
                return Err(InsertError::Duplicate);
            }
            self.leaf = Some(Box::new(leaf));
            return Ok(());
        };

        match *first {
            Segment::Literal(text) => self.insert_literal(text.as_bytes(), rest, leaf),
            Segment::Param(_) => self
                .param
                .get_or_insert_with(|| Box::new(RadixNode::new(b"")))
                .insert(rest, leaf),
            Segment::Wildcard(_) => {
                if self.wildcard.is_some() {
                    return Err(InsertError::Duplicate);
                }
                self.wildcard = Some(Box::new(leaf));
                Ok(())
            }
        }
    }

    fn insert_literal(
        &mut self,
        text: &[u8],
        rest: &[Segment<'_>],
        leaf: Leaf<T>,
    ) -> Result<(), InsertError> {
        let Some(&first) = text.first() else {
            return self.insert(rest, leaf);
        };

        if let Some(i) = self.indices.iter().position(|&b| b == first) {
            let child = &mut self.children[i];
            let common = common_prefix_len(&child.prefix, text);
            if common < child.prefix.len() {
                child.split(common);
            }
            return child.insert_literal(&text[common..], rest, leaf);
        }

        let mut child = RadixNode::new(text);
        child.insert(rest, leaf)?;
        self.indices.push(first);
        self.children.push(child);
        Ok(())
    }

    /// Search for a matching leaf. `pos` is the byte offset in `path` where
    /// this node's children start matching.
    fn search<'s, 'p>(
        &'s self,
        path: &'p str,
        pos: usize,
        values: &mut ValueVec<'p>,
    ) -> Option<&'s Leaf<T>> {
        let rest = &path.as_bytes()[pos..];

        let Some(&first) = rest.first() else {
            if let Some(leaf) = self.leaf.as_deref() {
                return Some(leaf);
            }
            if let Some(leaf) = self.wildcard.as_deref() {
                values.push("");
                return Some(leaf);
            }
            return None;
        };

        // 1. Literal edge
        if let Some(i) = self.indices.iter().position(|&b| b == first) {
            let child = &self.children[i];
            if rest.starts_with(&child.prefix) {
                if let Some(leaf) = child.search(path, pos + child.prefix.len(), values) {
                    return Some(leaf);
                }
            }
        }

        // 2. Parameter edge: one non-empty segment
        if let Some(param) = self.param.as_deref() {
            let len = rest.iter().position(|&b| b == b'/').unwrap_or(rest.len());
            if let Some(value) = path.get(pos..pos + len).filter(|v| !v.is_empty()) {
                let mark = values.len();
                values.push(value);
                if let Some(leaf) = param.search(path, pos + len, values) {
                    return Some(leaf);
                }
                // Backtrack: drop the value if the search below failed
                values.truncate(mark);
            }
        }

        // 3. Wildcard: the rest of the path, slashes included
        if let Some(leaf) = self.wildcard.as_deref() {
            if let Some(value) = path.get(pos..) {
                values.push(value);
                return Some(leaf);
            }
        }

        None
    }

    fn for_each_leaf<'s>(&'s self, f: &mut impl FnMut(&'s Leaf<T>)) {
        if let Some(leaf) = self.leaf.as_deref() {
            f(leaf);
        }
        for child in &self.children {
            child.for_each_leaf(f);
        }
        if let Some(param) = self.param.as_deref() {
            param.for_each_leaf(f);
        }
        if let Some(leaf) = self.wildcard.as_deref() {
            f(leaf);
        }
    }
}

fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

/// Radix tree for one HTTP method.
///
/// Built during start-up and read-only afterwards; lookups take `&self` and
/// are safe to run concurrently.
#[derive(Debug)]
pub(crate) struct RadixTree<T> {
    root: RadixNode<T>,
    len: usize,
}

impl<T> RadixTree<T> {
    pub fn new() -> Self {
        Self {
            root: RadixNode::new(b""),
            len: 0,
        }
    }

    /// Insert `value` under `template`. Returns the template's parameter count.
    ///
    /// Literal text is stored in canonical percent-encoding; callers of
    /// [`find`](Self::find) pass canonical paths.
    pub fn insert(&mut self, template: &str, value: T) -> Result<usize, InsertError> {
        let parsed = template::parse(template).map_err(InsertError::Template)?;
        let literals: Vec<Cow<'_, str>> = parsed
            .iter()
            .map(|s| match *s {
                Segment::Literal(text) => template::canonical(text),
                Segment::Param(name) | Segment::Wildcard(name) => Cow::Borrowed(name),
            })
            .collect();
        let segments: Vec<Segment<'_>> = parsed
            .iter()
            .zip(&literals)
            .map(|(s, text)| match s {
                Segment::Literal(_) => Segment::Literal(text),
                other => other.clone(),
            })
            .collect();
        let param_names: Box<[Arc<str>]> = segments
            .iter()
            .filter_map(|s| match *s {
                Segment::Param(name) | Segment::Wildcard(name) => Some(Arc::from(name)),
                Segment::Literal(_) => None,
            })
            .collect();
        let count = param_names.len();
        let leaf = Leaf {
            value,
            template: Arc::from(template),
            param_names,
        };
        self.root.insert(&segments, leaf)?;
        self.len += 1;
        Ok(count)
    }

    /// Match `path`, pushing captured values in template order.
    ///
    /// On failure `values` is left as it was passed in.
    pub fn find<'s, 'p>(&'s self, path: &'p str, values: &mut ValueVec<'p>) -> Option<&'s Leaf<T>> {
        self.root.search(path, 0, values)
    }

    /// All leaves, literal routes before parameter routes at each node.
    pub fn leaves(&self) -> Vec<&Leaf<T>> {
        let mut out = Vec::with_capacity(self.len);
        self.root.for_each_leaf(&mut |leaf| out.push(leaf));
        out
    }

    pub fn len(&self) -> usize {
        self.len
    }
}
