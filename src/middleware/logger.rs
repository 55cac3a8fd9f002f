use http::header::{CONTENT_LENGTH, HOST};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use crate::dispatcher::{handler, write_error_fallback, Handler};

/// Options for [`logger_with`].
#[derive(Debug, Clone, Default)]
pub struct LoggerConfig {
    /// Request paths that are served but not logged (health checks, probes)
    pub skip_paths: Vec<String>,
}

impl LoggerConfig {
    #[must_use]
    pub fn skip_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skip_paths.extend(paths.into_iter().map(Into::into));
        self
    }
}

/// Log one event per request with [`LoggerConfig::default`].
pub fn logger() -> Handler {
    logger_with(LoggerConfig::default())
}

/// Time the rest of the chain and log one structured event per request.
///
/// An error returned by the chain is passed to the error handler here, so the
/// logged status is the one the client receives. The error is not returned
/// further up.
pub fn logger_with(config: LoggerConfig) -> Handler {
    let skip: Arc<HashSet<String>> = Arc::new(config.skip_paths.into_iter().collect());

    handler(move |c| {
        let start = Instant::now();
        let result = c.next();
        if let Err(err) = &result {
            c.handle_error(err);
        }
        write_error_fallback(c);
        if skip.contains(c.path()) {
            return Ok(());
        }

        let latency = start.elapsed();
        let bytes_in = c
            .header(CONTENT_LENGTH.as_str())
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or_else(|| c.body().len());
        let status = c.response().status().as_u16();
        let error = result.as_ref().err().map(ToString::to_string);

        macro_rules! request_event {
            ($level:ident) => {
                tracing::$level!(
                    request_id = ?c.request_id().map(|id| id.to_string()),
                    remote_ip = ?c.client_ip(),
                    host = c.header(HOST.as_str()).unwrap_or(""),
                    method = %c.method(),
                    uri = %c.request().uri(),
                    route = c.route_template().unwrap_or(""),
                    status,
                    latency_us = latency.as_micros() as u64,
                    bytes_in,
                    bytes_out = c.response().size(),
                    error = ?error,
                    "Request completed"
                )
            };
        }

        match status {
            500..=u16::MAX => request_event!(error),
            400..=499 => request_event!(warn),
            _ => request_event!(info),
        }
        Ok(())
    })
}
