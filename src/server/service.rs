use bytes::Bytes;
use http::{Request, Response};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::dispatcher::{App, CancelSignal};

/// Cloneable, thread-safe entry point for a host server.
///
/// Wraps a finished [`App`] in an `Arc`. Once wrapped, the route table can no
/// longer change: there is no `&mut App` left to register through.
#[derive(Clone)]
pub struct AppService {
    app: Arc<App>,
}

impl From<App> for AppService {
    fn from(app: App) -> Self {
        Self::new(app)
    }
}

impl AppService {
    #[must_use]
    pub fn new(app: App) -> Self {
        Self { app: Arc::new(app) }
    }

    #[must_use]
    pub fn app(&self) -> &App {
        &self.app
    }

    /// Serve one request.
    pub fn call(&self, request: Request<Bytes>) -> Response<Bytes> {
        self.app.serve(request)
    }

    /// Serve one request received from `peer`, with the host's cancel signal.
    ///
    /// The peer address is stored in the request extensions, where
    /// [`Context::client_ip`](crate::Context::client_ip) finds it.
    pub fn call_from(
        &self,
        mut request: Request<Bytes>,
        peer: SocketAddr,
        cancel: CancelSignal,
    ) -> Response<Bytes> {
        request.extensions_mut().insert(peer);
        self.app.serve_with_signal(request, cancel)
    }
}
