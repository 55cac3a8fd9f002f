use std::any::Any;
use std::backtrace::Backtrace;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use thiserror::Error;
use tracing::error;

use crate::dispatcher::{handler, Context, Handler};

/// Called after a panic was caught and the chain aborted.
pub type RecoveryFn = Arc<dyn Fn(&mut Context, anyhow::Error) + Send + Sync>;

/// A panic caught by [`recovery`], converted to an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("panic: {message}")]
pub struct PanicError {
    pub message: String,
}

impl PanicError {
    fn from_payload(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self { message }
    }
}

/// Catch panics from the rest of the chain and hand them to the error handler.
pub fn recovery() -> Handler {
    recovery_with(Arc::new(|c: &mut Context, err: anyhow::Error| {
        c.handle_error(&err);
    }))
}

/// Catch panics from the rest of the chain and pass them to `on_panic`.
///
/// The chain is aborted before `on_panic` runs. The middleware itself then
/// returns `Ok(())`: the panic has been dealt with.
pub fn recovery_with(on_panic: RecoveryFn) -> Handler {
    handler(move |c| {
        let payload = match panic::catch_unwind(AssertUnwindSafe(|| c.next())) {
            Ok(result) => return result,
            Err(payload) => payload,
        };
        let err = PanicError::from_payload(payload.as_ref());
        let backtrace = Backtrace::force_capture();
        error!(
            request_id = ?c.request_id().map(|id| id.to_string()),
            method = %c.method(),
            path = %c.path(),
            panic = %err.message,
            backtrace = %backtrace,
            "Handler panicked"
        );
        c.abort();
        on_panic(c, err.into());
        Ok(())
    })
}
