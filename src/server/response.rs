use bytes::{Bytes, BytesMut};
use http::header::{HeaderName, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue, Response, StatusCode};
use tracing::warn;

use crate::pool::Reset;

/// Buffered response writer that records commitment and bytes written.
///
/// The first status write, explicit or implied by the first body write,
/// commits the response. After that, status and header changes are ignored
/// with a warning instead of failing the request.
#[derive(Debug, Default)]
pub struct ResponseTracker {
    status: StatusCode,
    headers: HeaderMap,
    body: BytesMut,
    committed: bool,
    size: usize,
}

impl ResponseTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the status and commit the response. No-op once committed.
    pub fn write_status(&mut self, status: StatusCode) {
        if self.committed {
            warn!(
                current = self.status.as_u16(),
                attempted = status.as_u16(),
                "Response already committed, status change ignored"
            );
            return;
        }
        self.status = status;
        self.committed = true;
    }

    /// Append `data` to the body, committing with `200` if nothing has been
    /// committed yet. Returns the number of bytes written.
    pub fn write(&mut self, data: &[u8]) -> usize {
        if !self.committed {
            self.write_status(StatusCode::OK);
        }
        self.body.extend_from_slice(data);
        self.size += data.len();
        data.len()
    }

    #[must_use]
    pub fn committed(&self) -> bool {
        self.committed
    }

    /// Bytes written to the body so far
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Committed status, or `200` if nothing is committed yet
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Replace a header. Ignored with a warning once committed.
    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        if self.reject_header_change(&name) {
            return;
        }
        self.headers.insert(name, value);
    }

    /// Set `Content-Type` unless a handler already chose one.
    pub fn set_default_content_type(&mut self, value: &'static str) {
        if !self.headers.contains_key(CONTENT_TYPE) && !self.committed {
            self.headers.insert(CONTENT_TYPE, HeaderValue::from_static(value));
        }
    }

    /// Add `value` to a comma-separated header unless it is already listed.
    pub fn append_header(&mut self, name: HeaderName, value: HeaderValue) {
        if self.reject_header_change(&name) {
            return;
        }
        let existing = match self.headers.get(&name) {
            None => {
                self.headers.insert(name, value);
                return;
            }
            Some(existing) => existing.to_str().map(str::to_owned),
        };
        match (existing, value.to_str()) {
            (Ok(existing), Ok(new)) => {
                if existing.split(',').any(|v| v.trim().eq_ignore_ascii_case(new)) {
                    return;
                }
                if let Ok(joined) = HeaderValue::from_str(&format!("{existing}, {new}")) {
                    self.headers.insert(name, joined);
                }
            }
            _ => {
                self.headers.append(name, value);
            }
        }
    }

    /// Add another field line for `name`, keeping existing ones
    /// (`Set-Cookie`). Ignored with a warning once committed.
    pub fn add_header(&mut self, name: HeaderName, value: HeaderValue) {
        if self.reject_header_change(&name) {
            return;
        }
        self.headers.append(name, value);
    }

    pub fn remove_header(&mut self, name: &HeaderName) {
        if self.reject_header_change(name) {
            return;
        }
        self.headers.remove(name);
    }

    fn reject_header_change(&self, name: &HeaderName) -> bool {
        if self.committed {
            warn!(
                header = %name,
                status = self.status.as_u16(),
                "Response already committed, header change ignored"
            );
        }
        self.committed
    }

    /// Move the buffered response out, leaving the tracker empty.
    pub fn take_response(&mut self) -> Response<Bytes> {
        let mut response = Response::new(self.body.split().freeze());
        *response.status_mut() = self.status;
        *response.headers_mut() = std::mem::take(&mut self.headers);
        response
    }
}

impl std::io::Write for ResponseTracker {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        Ok(ResponseTracker::write(self, buf))
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Reset for ResponseTracker {
    fn reset(&mut self) {
        self.status = StatusCode::OK;
        self.headers.clear();
        self.body.clear();
        self.committed = false;
        self.size = 0;
    }
}
