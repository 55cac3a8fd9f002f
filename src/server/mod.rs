//! Host-facing surface: the buffered response writer and the cloneable
//! service handle a server calls for every request.

pub mod response;
pub mod service;

pub use response::ResponseTracker;
pub use service::AppService;
