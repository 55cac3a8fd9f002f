//! Route template parsing and path joining.
//!
//! A template such as `/user/:id/*rest` is decomposed once at registration
//! time into [`Segment`]s: literal runs of text, `:name` parameters and a
//! trailing `*name` wildcard. `:` and `*` are only special at the start of a
//! path segment.
//!
//! Literal text and request paths are compared in one canonical
//! percent-encoding, so `/wiki/東京` is reached by `/wiki/%E6%9D%B1%E4%BA%AC`
//! and `%7e` matches `~`. See [`canonical`].

use std::borrow::Cow;

use crate::error::RouteError;

/// One piece of a parsed route template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Segment<'a> {
    /// Literal text, may span several path segments (`/api/v1/`).
    Literal(&'a str),
    /// Named parameter consuming exactly one non-empty path segment.
    Param(&'a str),
    /// Named wildcard consuming the rest of the path.
    Wildcard(&'a str),
}

/// Parse a template into segments, validating parameter names and wildcard
/// placement. The caller has already checked the leading `/`.
pub(crate) fn parse(template: &str) -> Result<Vec<Segment<'_>>, RouteError> {
    let mut segments = Vec::new();
    let mut names: Vec<&str> = Vec::new();
    let bytes = template.as_bytes();
    let mut literal_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let starts_segment = i > 0 && bytes[i - 1] == b'/';
        let marker = bytes[i];
        if !starts_segment || (marker != b':' && marker != b'*') {
            i += 1;
            continue;
        }

        if literal_start < i {
            segments.push(Segment::Literal(&template[literal_start..i]));
        }
        let end = template[i..]
            .find('/')
            .map_or(template.len(), |offset| i + offset);
        let name = &template[i + 1..end];
        if name.is_empty() {
            return Err(RouteError::EmptyParamName(template.to_string()));
        }
        if names.contains(&name) {
            return Err(RouteError::DuplicateParam {
                name: name.to_string(),
                path: template.to_string(),
            });
        }
        names.push(name);

        if marker == b'*' {
            if end != template.len() {
                return Err(RouteError::WildcardNotLast(template.to_string()));
            }
            segments.push(Segment::Wildcard(name));
        } else {
            segments.push(Segment::Param(name));
        }
        i = end;
        literal_start = end;
    }

    if literal_start < template.len() {
        segments.push(Segment::Literal(&template[literal_start..]));
    }
    Ok(segments)
}

/// Join a group base path and a relative path.
///
/// Duplicate slashes at the seam (and anywhere else) collapse to one, a
/// missing slash is inserted, and a trailing slash on `relative` is kept.
#[must_use]
pub fn join_path(base: &str, relative: &str) -> String {
    if relative.is_empty() {
        return normalize(base);
    }
    let mut joined = String::with_capacity(base.len() + relative.len() + 1);
    joined.push_str(base.trim_end_matches('/'));
    joined.push('/');
    joined.push_str(relative.trim_start_matches('/'));
    normalize(&joined)
}

fn normalize(path: &str) -> String {
    let mut out = String::with_capacity(path.len() + 1);
    if !path.starts_with('/') {
        out.push('/');
    }
    let mut last_slash = false;
    for ch in path.chars() {
        if ch == '/' {
            if last_slash {
                continue;
            }
            last_slash = true;
        } else {
            last_slash = false;
        }
        out.push(ch);
    }
    out
}

const HEX_UPPER: &[u8; 16] = b"0123456789ABCDEF";

/// Bytes kept as-is in a canonical path: RFC 3986 `pchar` without escapes,
/// plus the `/` separator.
fn is_path_safe(b: u8) -> bool {
    b.is_ascii_alphanumeric()
        || matches!(
            b,
            b'-' | b'.' | b'_' | b'~' | b'!' | b'$' | b'&' | b'\'' | b'(' | b')' | b'*' | b'+'
                | b',' | b';' | b'=' | b':' | b'@' | b'/'
        )
}

fn hex_value(b: u8) -> Option<u8> {
    char::from(b)
        .to_digit(16)
        .and_then(|d| u8::try_from(d).ok())
}

fn push_escaped(out: &mut String, b: u8) {
    out.push('%');
    out.push(char::from(HEX_UPPER[usize::from(b >> 4)]));
    out.push(char::from(HEX_UPPER[usize::from(b & 0x0f)]));
}

/// Canonical percent-encoding of a path or literal template text.
///
/// Escapes of safe bytes are decoded, every other byte (non-ASCII, space, a
/// stray `%`) is escaped with uppercase hex, and an escaped `/` stays escaped
/// so it never acts as a separator. Already canonical input is borrowed.
pub(crate) fn canonical(path: &str) -> Cow<'_, str> {
    let bytes = path.as_bytes();
    if bytes.iter().all(|&b| is_path_safe(b)) {
        return Cow::Borrowed(path);
    }

    let mut out = String::with_capacity(path.len() + 16);
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'%' {
            let escaped = match (bytes.get(i + 1), bytes.get(i + 2)) {
                (Some(&hi), Some(&lo)) => hex_value(hi).zip(hex_value(lo)).map(|(h, l)| (h << 4) | l),
                _ => None,
            };
            if let Some(decoded) = escaped {
                if decoded != b'/' && is_path_safe(decoded) {
                    out.push(char::from(decoded));
                } else {
                    push_escaped(&mut out, decoded);
                }
                i += 3;
                continue;
            }
        }
        if is_path_safe(b) {
            out.push(char::from(b));
        } else {
            push_escaped(&mut out, b);
        }
        i += 1;
    }
    Cow::Owned(out)
}
