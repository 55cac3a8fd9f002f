//! Cooperative cancellation for in-flight requests.
//!
//! The dispatch pipeline never preempts a handler. The host passes a
//! [`CancelSignal`] with each request (for example, tripped when the client
//! disconnects) and long-running handlers poll it between units of work.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Error returned by [`CancelSignal::check`] once the request is cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("request cancelled")]
pub struct Cancelled;

/// Cancellation flag and optional deadline shared between host and handlers.
///
/// Cloning yields another handle to the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    flag: Option<Arc<AtomicBool>>,
    deadline: Option<Instant>,
}

impl CancelSignal {
    /// A signal that never fires.
    #[must_use]
    pub fn never() -> Self {
        Self::default()
    }

    /// A signal that fires when [`cancel`](Self::cancel) is called on any clone.
    #[must_use]
    pub fn new() -> Self {
        Self {
            flag: Some(Arc::new(AtomicBool::new(false))),
            deadline: None,
        }
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Trip the signal. No effect on a [`never`](Self::never) signal.
    pub fn cancel(&self) {
        if let Some(flag) = &self.flag {
            flag.store(true, Ordering::Release);
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        let tripped = self
            .flag
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Acquire));
        tripped || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// `Err(Cancelled)` once the signal has fired, for use with `?`.
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}
