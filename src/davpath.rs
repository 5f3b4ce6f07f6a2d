//! Mapping request URIs to backend-relative paths.
//!
//! The mount point must start and end with `/`. A request path is
//! percent-decoded, checked against path traversal, and must be contained
//! in the mount point. As a special case for clients that strip the
//! trailing slash (e.g. Microsoft), a path equal to the mount point minus
//! its final slash maps to the root collection.

use http::StatusCode;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::errors::DavError;

/// RFC 3986: everything that is not an unreserved character, a
/// sub-delimiter, `:`, `@` or `/` gets escaped in a path.
const PATH_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'!')
    .remove(b'$')
    .remove(b'&')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'*')
    .remove(b'+')
    .remove(b',')
    .remove(b';')
    .remove(b'=')
    .remove(b':')
    .remove(b'@')
    .remove(b'/');

/// Escape a path (or path segment) into URI form.
pub fn uri_escape_path(s: &str) -> String {
    utf8_percent_encode(s, PATH_ESCAPE).to_string()
}

/// Strict percent-decoding. Fails on truncated or non-hex escape
/// sequences, on an encoded NUL byte, and on non-UTF-8 results.
pub fn uri_unescape(s: &str) -> Option<String> {
    let mut out = Vec::with_capacity(s.len());
    let mut bytes = s.bytes();
    while let Some(b) = bytes.next() {
        if b == b'%' {
            let hi = hex_digit(bytes.next()?)?;
            let lo = hex_digit(bytes.next()?)?;
            let decoded = (hi << 4) | lo;
            if decoded == 0 {
                return None;
            }
            out.push(decoded);
        } else {
            out.push(b);
        }
    }
    String::from_utf8(out).ok()
}

fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Why a request path could not be mapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// Undecodable or traversing outside its directory: 400.
    Malformed,
    /// Outside the configured mount point: 403. Distinct from `Malformed`
    /// because COPY/MOVE destination validation relies on it.
    Outside,
}

impl From<ParseError> for DavError {
    fn from(e: ParseError) -> Self {
        match e {
            ParseError::Malformed => DavError::Status(StatusCode::BAD_REQUEST),
            ParseError::Outside => DavError::Status(StatusCode::FORBIDDEN),
        }
    }
}

/// A validated, mount-point-relative request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DavPath {
    /// Decoded path relative to the mount point, no leading or
    /// trailing slash. Empty for the root collection.
    rel: String,
    /// The original URI ended with a slash.
    collection: bool,
}

impl DavPath {
    /// Validate and map a raw (escaped) URI path against a mount point.
    pub fn parse(uri_path: &str, prefix: &str) -> Result<DavPath, ParseError> {
        debug_assert!(prefix.starts_with('/') && prefix.ends_with('/'));

        let decoded = uri_unescape(uri_path).ok_or(ParseError::Malformed)?;

        // Deliberately crude traversal guard; the path is not normalized.
        if decoded.contains("/../") || decoded.ends_with("/..") {
            return Err(ParseError::Malformed);
        }

        let collection = decoded.ends_with('/');

        let rel = if let Some(rest) = decoded.strip_prefix(prefix) {
            rest
        } else if decoded == prefix[..prefix.len() - 1] {
            ""
        } else {
            return Err(ParseError::Outside);
        };

        let rel = rel.strip_suffix('/').unwrap_or(rel);

        Ok(DavPath {
            rel: rel.to_string(),
            collection,
        })
    }

    /// The backend-relative key ("" for the root collection).
    pub fn rel(&self) -> &str {
        &self.rel
    }

    /// Did the original URI carry a trailing slash?
    pub fn is_collection(&self) -> bool {
        self.collection
    }
}
