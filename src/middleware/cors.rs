//! CORS middleware.
//!
//! ## Origin matching
//!
//! Each entry of [`CorsConfig::allow_origins`] is tried in order:
//!
//! - `*` allows any origin. With credentials enabled the request's own origin
//!   is echoed, since browsers reject `*` on credentialed requests.
//! - an exact origin (`https://example.com`) allows only itself.
//! - `scheme://*.domain` allows any subdomain of `domain` over `scheme`
//!   (`https://*.example.com` allows `https://api.example.com`, not
//!   `https://example.com`).
//!
//! Requests without an `Origin` header pass through untouched. A disallowed
//! origin gets `403` and the chain is aborted.
//!
//! ## Preflight
//!
//! `OPTIONS` requests with an allowed origin are answered here with `204` and
//! the allow headers; the chain is aborted.

use http::header::{
    HeaderName, ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS,
    ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_EXPOSE_HEADERS,
    ACCESS_CONTROL_MAX_AGE, ACCESS_CONTROL_REQUEST_HEADERS, ACCESS_CONTROL_REQUEST_METHOD, ORIGIN,
    VARY,
};
use http::{HeaderValue, Method, StatusCode};
use thiserror::Error;

use crate::dispatcher::{handler, Handler};

const DEFAULT_MAX_AGE: u32 = 12 * 60 * 60;

/// CORS configuration error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CorsConfigError {
    /// A configured value cannot be sent as a header value.
    #[error("CORS configuration error: invalid value for {header}: '{value}'")]
    InvalidHeaderValue { header: HeaderName, value: String },
}

/// Options for [`cors`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsConfig {
    /// Allowed origins. Default `["*"]`
    pub allow_origins: Vec<String>,
    /// `Access-Control-Allow-Methods` on preflight.
    /// Default `GET, POST, HEAD, PUT, DELETE, PATCH`
    pub allow_methods: Vec<Method>,
    /// `Access-Control-Allow-Headers` on preflight. When empty, the request's
    /// `Access-Control-Request-Headers` is echoed. Default `["Content-Type"]`
    pub allow_headers: Vec<String>,
    /// Send `Access-Control-Allow-Credentials: true`. Default `false`
    pub allow_credentials: bool,
    /// `Access-Control-Expose-Headers` on simple requests. Default empty
    pub expose_headers: Vec<String>,
    /// Preflight cache lifetime in seconds. Default 12 hours
    pub max_age: u32,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origins: vec!["*".to_string()],
            allow_methods: vec![
                Method::GET,
                Method::POST,
                Method::HEAD,
                Method::PUT,
                Method::DELETE,
                Method::PATCH,
            ],
            allow_headers: vec!["Content-Type".to_string()],
            allow_credentials: false,
            expose_headers: Vec::new(),
            max_age: DEFAULT_MAX_AGE,
        }
    }
}

impl CorsConfig {
    /// Allowed origin value to send back for `origin`, if any.
    fn allowed_origin<'a>(&'a self, origin: &'a str) -> Option<&'a str> {
        for allowed in &self.allow_origins {
            if allowed == "*" {
                return Some(if self.allow_credentials { origin } else { "*" });
            }
            if allowed == origin {
                return Some(allowed);
            }
            if match_subdomain(origin, allowed) {
                return Some(origin);
            }
        }
        None
    }
}

/// `origin` is a strict subdomain of a `scheme://*.domain` pattern.
fn match_subdomain(origin: &str, pattern: &str) -> bool {
    let Some((pattern_scheme, pattern_host)) = pattern.split_once("://") else {
        return false;
    };
    let Some(domain) = pattern_host.strip_prefix("*.") else {
        return false;
    };
    let Some((scheme, host)) = origin.split_once("://") else {
        return false;
    };
    scheme.eq_ignore_ascii_case(pattern_scheme)
        && host
            .strip_suffix(domain)
            .and_then(|rest| rest.strip_suffix('.'))
            .is_some_and(|sub| !sub.is_empty())
}

fn joined(header: &HeaderName, values: &[String]) -> Result<Option<HeaderValue>, CorsConfigError> {
    if values.is_empty() {
        return Ok(None);
    }
    let value = values.join(",");
    HeaderValue::from_str(&value)
        .map(Some)
        .map_err(|_| CorsConfigError::InvalidHeaderValue {
            header: header.clone(),
            value,
        })
}

/// Build the CORS middleware. Empty `allow_origins`/`allow_methods` and a
/// zero `max_age` fall back to the defaults.
pub fn cors(config: CorsConfig) -> Result<Handler, CorsConfigError> {
    let defaults = CorsConfig::default();
    let mut cfg = config;
    if cfg.allow_origins.is_empty() {
        cfg.allow_origins = defaults.allow_origins;
    }
    if cfg.allow_methods.is_empty() {
        cfg.allow_methods = defaults.allow_methods;
    }
    if cfg.max_age == 0 {
        cfg.max_age = defaults.max_age;
    }

    let methods: Vec<String> = cfg.allow_methods.iter().map(ToString::to_string).collect();
    let allow_methods = joined(&ACCESS_CONTROL_ALLOW_METHODS, &methods)?;
    let allow_headers = joined(&ACCESS_CONTROL_ALLOW_HEADERS, &cfg.allow_headers)?;
    let expose_headers = joined(&ACCESS_CONTROL_EXPOSE_HEADERS, &cfg.expose_headers)?;
    let max_age = HeaderValue::from(cfg.max_age);
    let credentials = HeaderValue::from_static("true");

    Ok(handler(move |c| {
        let Some(origin) = c.header(ORIGIN.as_str()).filter(|o| !o.is_empty()) else {
            return Ok(());
        };
        let Some(allow_origin) = cfg.allowed_origin(origin) else {
            c.abort_with_status(StatusCode::FORBIDDEN);
            return Ok(());
        };
        let allow_origin = HeaderValue::from_str(allow_origin)?;
        let preflight = c.method() == Method::OPTIONS;
        let request_headers = c
            .request()
            .headers()
            .get(ACCESS_CONTROL_REQUEST_HEADERS)
            .cloned();

        let res = c.response_mut();
        res.append_header(VARY, HeaderValue::from_static("Origin"));
        res.set_header(ACCESS_CONTROL_ALLOW_ORIGIN, allow_origin);
        if cfg.allow_credentials {
            res.set_header(ACCESS_CONTROL_ALLOW_CREDENTIALS, credentials.clone());
        }

        if !preflight {
            if let Some(expose) = &expose_headers {
                res.set_header(ACCESS_CONTROL_EXPOSE_HEADERS, expose.clone());
            }
            return c.next();
        }

        res.append_header(VARY, HeaderValue::from_name(ACCESS_CONTROL_REQUEST_METHOD));
        res.append_header(VARY, HeaderValue::from_name(ACCESS_CONTROL_REQUEST_HEADERS));
        if let Some(methods) = &allow_methods {
            res.set_header(ACCESS_CONTROL_ALLOW_METHODS, methods.clone());
        }
        match (&allow_headers, request_headers) {
            (Some(headers), _) => res.set_header(ACCESS_CONTROL_ALLOW_HEADERS, headers.clone()),
            (None, Some(requested)) => res.set_header(ACCESS_CONTROL_ALLOW_HEADERS, requested),
            (None, None) => {}
        }
        res.set_header(ACCESS_CONTROL_MAX_AGE, max_age.clone());
        c.abort_with_status(StatusCode::NO_CONTENT);
        Ok(())
    }))
}
