//! Request cookie lookup and `Set-Cookie` rendering.

use http::header::COOKIE;
use http::{HeaderMap, HeaderValue};
use std::fmt::Write as _;

use crate::error::InvalidCookieName;

/// `SameSite` attribute applied to cookies set through a [`Context`](super::Context).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Lax,
    Strict,
    None,
}

impl SameSite {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SameSite::Lax => "Lax",
            SameSite::Strict => "Strict",
            SameSite::None => "None",
        }
    }
}

/// Attributes of a cookie written by [`Context::set_cookie`](super::Context::set_cookie).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieOptions {
    /// Seconds until expiry. `0` leaves `Max-Age` out (session cookie), a
    /// negative value deletes the cookie (`Max-Age=0`).
    pub max_age: i64,
    /// Defaults to `/` when empty
    pub path: String,
    pub domain: String,
    pub secure: bool,
    pub http_only: bool,
}

fn is_token(name: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(|b| {
            b.is_ascii_alphanumeric()
                || matches!(
                    b,
                    b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.' | b'^' | b'_'
                        | b'`' | b'|' | b'~'
                )
        })
}

/// Value of the first cookie called `name` across all `Cookie` headers.
///
/// The value is returned as sent, without unescaping.
pub(crate) fn find_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|line| line.split(';'))
        .find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key.trim() == name).then(|| value.trim().trim_matches('"'))
        })
}

/// Render a `Set-Cookie` header value. The cookie value is query-escaped.
pub(crate) fn render_set_cookie(
    name: &str,
    value: &str,
    options: &CookieOptions,
    same_site: Option<SameSite>,
) -> Result<HeaderValue, anyhow::Error> {
    if !is_token(name) {
        return Err(InvalidCookieName(name.to_string()).into());
    }
    let escaped: String = url::form_urlencoded::byte_serialize(value.as_bytes()).collect();
    let path = if options.path.is_empty() { "/" } else { options.path.as_str() };

    let mut cookie = format!("{name}={escaped}; Path={path}");
    if !options.domain.is_empty() {
        write!(cookie, "; Domain={}", options.domain)?;
    }
    if options.max_age > 0 {
        write!(cookie, "; Max-Age={}", options.max_age)?;
    } else if options.max_age < 0 {
        cookie.push_str("; Max-Age=0");
    }
    if options.http_only {
        cookie.push_str("; HttpOnly");
    }
    if options.secure {
        cookie.push_str("; Secure");
    }
    if let Some(same_site) = same_site {
        write!(cookie, "; SameSite={}", same_site.as_str())?;
    }
    Ok(HeaderValue::from_str(&cookie)?)
}
