//! # Object Pool Module
//!
//! Typed free-list pools for per-request objects. The dispatch pipeline draws a
//! [`Context`](crate::dispatcher::Context) from one pool per request and the
//! router draws a [`Params`](crate::router::Params) buffer from another for
//! every successful match.
//!
//! ## Lifecycle
//!
//! - [`Pool::acquire`] pops an idle object or builds a fresh one with the
//!   pool's factory.
//! - The returned [`Pooled`] guard derefs to the object and is the only handle
//!   to it while it is checked out.
//! - Dropping the guard calls [`Reset::reset`] and pushes the object back, unless
//!   the pool already holds `max_idle` objects, in which case it is dropped.
//!
//! Resetting on release means an idle object never holds the previous
//! request's data. Handing out an object that still referenced an old request
//! would leak data across requests.
//!
//! ## Metrics
//!
//! Every pool keeps relaxed atomic counters ([`PoolMetrics`]) for objects
//! created, acquired, released and discarded.

use parking_lot::Mutex;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Objects that can be returned to a [`Pool`].
pub trait Reset {
    /// Clear all per-use state while keeping allocated capacity.
    fn reset(&mut self);
}

/// Counters for a pool
#[derive(Debug, Default)]
pub struct PoolMetrics {
    created: AtomicU64,
    acquired: AtomicU64,
    released: AtomicU64,
    discarded: AtomicU64,
}

impl PoolMetrics {
    /// Objects built by the factory
    pub fn created(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    /// Successful `acquire` calls
    pub fn acquired(&self) -> u64 {
        self.acquired.load(Ordering::Relaxed)
    }

    /// Objects pushed back onto the free list
    pub fn released(&self) -> u64 {
        self.released.load(Ordering::Relaxed)
    }

    /// Objects dropped because the free list was full
    pub fn discarded(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }

    /// Objects currently checked out
    pub fn in_use(&self) -> u64 {
        self.acquired()
            .saturating_sub(self.released() + self.discarded())
    }
}

type Factory<T> = Box<dyn Fn() -> T + Send + Sync>;

struct PoolInner<T> {
    free: Mutex<Vec<Box<T>>>,
    factory: Factory<T>,
    max_idle: usize,
    metrics: PoolMetrics,
}

/// Concurrency-safe free-list of reusable objects.
///
/// Cloning a `Pool` yields another handle to the same free list.
pub struct Pool<T: Reset> {
    inner: Arc<PoolInner<T>>,
}

impl<T: Reset> Clone for Pool<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Reset> Pool<T> {
    /// Create a pool that keeps at most `max_idle` released objects.
    pub fn new<F>(max_idle: usize, factory: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(PoolInner {
                free: Mutex::new(Vec::with_capacity(max_idle.min(64))),
                factory: Box::new(factory),
                max_idle,
                metrics: PoolMetrics::default(),
            }),
        }
    }

    /// Check an object out of the pool.
    pub fn acquire(&self) -> Pooled<T> {
        let recycled = self.inner.free.lock().pop();
        let value = match recycled {
            Some(value) => value,
            None => {
                self.inner.metrics.created.fetch_add(1, Ordering::Relaxed);
                Box::new((self.inner.factory)())
            }
        };
        self.inner.metrics.acquired.fetch_add(1, Ordering::Relaxed);
        Pooled {
            value: Some(value),
            pool: Arc::clone(&self.inner),
        }
    }

    /// Number of objects waiting on the free list
    pub fn idle(&self) -> usize {
        self.inner.free.lock().len()
    }

    pub fn metrics(&self) -> &PoolMetrics {
        &self.inner.metrics
    }
}

/// Checked-out pool object. Returns itself to the pool on drop.
pub struct Pooled<T: Reset> {
    value: Option<Box<T>>,
    pool: Arc<PoolInner<T>>,
}

impl<T: Reset> Deref for Pooled<T> {
    type Target = T;

    fn deref(&self) -> &T {
        // Only `drop` takes the value out.
        match self.value.as_deref() {
            Some(value) => value,
            None => unreachable!("pooled value accessed after release"),
        }
    }
}

impl<T: Reset> DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut T {
        match self.value.as_deref_mut() {
            Some(value) => value,
            None => unreachable!("pooled value accessed after release"),
        }
    }
}

impl<T: Reset + std::fmt::Debug> std::fmt::Debug for Pooled<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.value.fmt(f)
    }
}

impl<T: Reset> Drop for Pooled<T> {
    fn drop(&mut self) {
        let Some(mut value) = self.value.take() else {
            return;
        };
        value.reset();
        let mut free = self.pool.free.lock();
        if free.len() < self.pool.max_idle {
            free.push(value);
            self.pool.metrics.released.fetch_add(1, Ordering::Relaxed);
        } else {
            drop(free);
            self.pool.metrics.discarded.fetch_add(1, Ordering::Relaxed);
        }
    }
}
