//! Typed versions of the WebDAV-specific request headers.

use headers::{self, Header, HeaderName, HeaderValue};

lazy_static! {
    static ref DEPTH: HeaderName = HeaderName::from_static("depth");
    static ref DESTINATION: HeaderName = HeaderName::from_static("destination");
    static ref OVERWRITE: HeaderName = HeaderName::from_static("overwrite");
}

/// The `Depth` request header (RFC 4918 10.2).
///
/// `infinity` is represented as `u32::MAX`; PROPFIND clamps it to the
/// configured recursion bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Depth(pub u32);

impl Depth {
    pub const INFINITY: Depth = Depth(u32::MAX);
}

impl Header for Depth {
    fn name() -> &'static HeaderName {
        &DEPTH
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        let value = values.next().ok_or_else(headers::Error::invalid)?;
        let s = value.to_str().map_err(|_| headers::Error::invalid())?;
        if s.eq_ignore_ascii_case("infinity") {
            return Ok(Depth::INFINITY);
        }
        s.parse().map(Depth).map_err(|_| headers::Error::invalid())
    }

    fn encode<E: Extend<HeaderValue>>(&self, values: &mut E) {
        let value = if *self == Depth::INFINITY {
            HeaderValue::from_static("infinity")
        } else {
            HeaderValue::from_str(&self.0.to_string()).unwrap()
        };
        values.extend(std::iter::once(value));
    }
}

/// The raw `Destination` request header of COPY/MOVE. The value is
/// mapped through the same URI validation as the request path.
#[derive(Debug, Clone)]
pub struct Destination(pub String);

impl Header for Destination {
    fn name() -> &'static HeaderName {
        &DESTINATION
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        let value = values.next().ok_or_else(headers::Error::invalid)?;
        let s = value.to_str().map_err(|_| headers::Error::invalid())?;
        Ok(Destination(s.to_string()))
    }

    fn encode<E: Extend<HeaderValue>>(&self, values: &mut E) {
        if let Ok(value) = HeaderValue::from_str(&self.0) {
            values.extend(std::iter::once(value));
        }
    }
}

/// The `Overwrite` request header (RFC 4918 10.6): "T" or "F".
/// Absent means overwrite; so does anything not starting with `F`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overwrite(pub bool);

impl Header for Overwrite {
    fn name() -> &'static HeaderName {
        &OVERWRITE
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        let value = values.next().ok_or_else(headers::Error::invalid)?;
        let overwrite = !matches!(value.as_bytes().first(), Some(b'F') | Some(b'f'));
        Ok(Overwrite(overwrite))
    }

    fn encode<E: Extend<HeaderValue>>(&self, values: &mut E) {
        let value = HeaderValue::from_static(if self.0 { "T" } else { "F" });
        values.extend(std::iter::once(value));
    }
}
