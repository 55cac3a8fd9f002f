//! Built-in middleware.
//!
//! Middleware are ordinary [`Handler`](crate::Handler)s: code before
//! `c.next()` runs on the way in, code after it on the way out. Register them
//! globally with `use_middleware` or on a group.
//!
//! ```rust,ignore
//! use bytego::middleware::{logger, recovery, request_id};
//!
//! app.use_middleware([recovery(), request_id(), logger()]);
//! ```

mod cors;
mod logger;
mod recovery;
mod request_id;

pub use cors::{cors, CorsConfig, CorsConfigError};
pub use logger::{logger, logger_with, LoggerConfig};
pub use recovery::{recovery, recovery_with, PanicError, RecoveryFn};
pub use request_id::request_id;
