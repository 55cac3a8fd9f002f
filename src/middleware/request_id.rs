use crate::dispatcher::{handler, Handler};
use crate::ids::REQUEST_ID_HEADER;

/// Echo the request id in the `X-Request-ID` response header.
///
/// The id is the caller's own `X-Request-ID` when it is a valid ULID, so a
/// client can correlate its logs with ours.
pub fn request_id() -> Handler {
    handler(|c| {
        if let Some(id) = c.request_id() {
            c.response_mut()
                .set_header(REQUEST_ID_HEADER.clone(), id.to_header_value());
        }
        c.next()
    })
}
