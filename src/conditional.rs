//! Conditional request evaluation.
//!
//! Pure functions over a [`Stat`] snapshot. Each check either passes or
//! produces a [`Terminal`] outcome which the caller turns into the
//! response; nothing here writes headers or body bytes, so a
//! short-circuited request never has partial output.

use http::{HeaderMap, StatusCode};

use crate::fs::Stat;
use crate::util::parse_http_date;

/// A precondition decided the request: stop processing and respond.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Terminal {
    Status(StatusCode),
    /// 304, with the resource's ETag.
    NotModified(String),
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name)?.to_str().ok()
}

/// RFC 7232 "list contains" semantics: comma-separated members,
/// optionally weak-prefixed, compared as opaque quoted strings.
fn list_contains(list: &str, etag: &str) -> bool {
    list.split(',')
        .map(str::trim)
        .map(|m| m.strip_prefix("W/").unwrap_or(m))
        .any(|m| m == etag)
}

/// `false` if there is an `If-Match` header and it does not match.
pub(crate) fn check_if_match(headers: &HeaderMap, stat: Option<&Stat>) -> bool {
    match header(headers, "if-match") {
        None | Some("*") => true,
        Some(list) => match stat {
            Some(stat) => list_contains(list, &stat.etag()),
            None => false,
        },
    }
}

/// `false` if there is an `If-None-Match` header and it matches.
pub(crate) fn check_if_none_match(headers: &HeaderMap, stat: Option<&Stat>) -> bool {
    match header(headers, "if-none-match") {
        None => true,
        Some(_) if stat.is_none() => true,
        Some("*") => false,
        Some(list) => !list_contains(list, &stat.unwrap().etag()),
    }
}

fn check_if_modified_since(headers: &HeaderMap, stat: &Stat) -> Result<(), Terminal> {
    let Some(value) = header(headers, "if-modified-since") else {
        return Ok(());
    };
    let Some(t) = parse_http_date(value) else {
        return Err(Terminal::Status(StatusCode::BAD_REQUEST));
    };
    if stat.modified < t {
        return Err(Terminal::NotModified(stat.etag()));
    }
    Ok(())
}

fn check_if_unmodified_since(headers: &HeaderMap, stat: &Stat) -> Result<(), Terminal> {
    let Some(value) = header(headers, "if-unmodified-since") else {
        return Ok(());
    };
    let Some(t) = parse_http_date(value) else {
        return Err(Terminal::Status(StatusCode::BAD_REQUEST));
    };
    if stat.modified >= t {
        return Err(Terminal::Status(StatusCode::PRECONDITION_FAILED));
    }
    Ok(())
}

/// The full precondition chain for GET/HEAD, in evaluation order.
pub(crate) fn check_get_preconditions(headers: &HeaderMap, stat: &Stat) -> Result<(), Terminal> {
    check_if_modified_since(headers, stat)?;
    check_if_unmodified_since(headers, stat)?;
    if !check_if_match(headers, Some(stat)) {
        return Err(Terminal::Status(StatusCode::PRECONDITION_FAILED));
    }
    if !check_if_none_match(headers, Some(stat)) {
        return Err(Terminal::NotModified(stat.etag()));
    }
    Ok(())
}

/// If-Match/If-None-Match for state-changing methods; the resource may
/// not exist yet. Failures are 412, never 304.
pub(crate) fn check_write_preconditions(
    headers: &HeaderMap,
    stat: Option<&Stat>,
) -> Result<(), Terminal> {
    if !check_if_match(headers, stat) || !check_if_none_match(headers, stat) {
        return Err(Terminal::Status(StatusCode::PRECONDITION_FAILED));
    }
    Ok(())
}

/// Outcome of evaluating `Range` (+ `If-Range`) against a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HttpRange {
    /// No Range header, or the header is ignored (failed If-Range check,
    /// multi-range, non-bytes unit, unparseable spec).
    None,
    /// Single byte range; `end` is exclusive, `skip < end <= size`.
    Valid { skip: u64, end: u64 },
    /// Unsatisfiable against the actual resource size: 416.
    Invalid,
}

pub(crate) fn eval_range(headers: &HeaderMap, stat: &Stat) -> HttpRange {
    let Some(range) = header(headers, "range") else {
        return HttpRange::None;
    };
    if let Some(if_range) = header(headers, "if-range") {
        if !check_if_range(if_range, stat) {
            return HttpRange::None;
        }
    }
    parse_range(range, stat.len)
}

/// RFC 7233 3.2: a date validator must exactly equal the modification
/// time (at HTTP-date precision); anything unparseable as a date is
/// compared as an ETag.
fn check_if_range(value: &str, stat: &Stat) -> bool {
    match parse_http_date(value) {
        Some(t) => stat.modified_sec() == t,
        None => value == stat.etag(),
    }
}

fn parse_range(header: &str, size: u64) -> HttpRange {
    let Some(spec) = header.strip_prefix("bytes=") else {
        return HttpRange::None;
    };
    if spec.contains(',') {
        // multipart/byteranges is not supported.
        return HttpRange::None;
    }
    let Some((first, last)) = spec.split_once('-') else {
        return HttpRange::None;
    };
    let (first, last) = (first.trim(), last.trim());

    if first.is_empty() {
        // suffix form: the final N bytes.
        let Ok(n) = last.parse::<u64>() else {
            return HttpRange::None;
        };
        if n == 0 || size == 0 {
            return HttpRange::Invalid;
        }
        return HttpRange::Valid {
            skip: size.saturating_sub(n),
            end: size,
        };
    }

    let Ok(skip) = first.parse::<u64>() else {
        return HttpRange::None;
    };
    if skip >= size {
        return HttpRange::Invalid;
    }
    let end = if last.is_empty() {
        size
    } else {
        let Ok(last) = last.parse::<u64>() else {
            return HttpRange::None;
        };
        if last < skip {
            return HttpRange::None;
        }
        (last + 1).min(size)
    };
    HttpRange::Valid { skip, end }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    fn stat() -> Stat {
        // mtime 2020-02-12 12:00:00 UTC
        Stat::synthetic(1000, 1581508800)
    }

    #[test]
    fn test_if_match() {
        let stat = stat();
        let etag = stat.etag();
        assert!(check_if_match(&headers(&[]), Some(&stat)));
        assert!(check_if_match(&headers(&[("if-match", "*")]), Some(&stat)));
        assert!(check_if_match(&headers(&[("if-match", &etag)]), Some(&stat)));
        assert!(check_if_match(
            &headers(&[("if-match", &format!("\"xyz\", {etag}"))]),
            Some(&stat)
        ));
        assert!(!check_if_match(
            &headers(&[("if-match", "\"xyz\"")]),
            Some(&stat)
        ));
        // nonexistent resource: only "*" or absence passes.
        assert!(check_if_match(&headers(&[]), None));
        assert!(check_if_match(&headers(&[("if-match", "*")]), None));
        assert!(!check_if_match(&headers(&[("if-match", "\"abc\"")]), None));
    }

    #[test]
    fn test_if_none_match() {
        let stat = stat();
        let etag = stat.etag();
        assert!(check_if_none_match(&headers(&[]), Some(&stat)));
        assert!(!check_if_none_match(
            &headers(&[("if-none-match", "*")]),
            Some(&stat)
        ));
        assert!(!check_if_none_match(
            &headers(&[("if-none-match", &etag)]),
            Some(&stat)
        ));
        assert!(!check_if_none_match(
            &headers(&[("if-none-match", &format!("W/{etag}"))]),
            Some(&stat)
        ));
        assert!(check_if_none_match(
            &headers(&[("if-none-match", "\"xyz\"")]),
            Some(&stat)
        ));
        assert!(check_if_none_match(&headers(&[("if-none-match", "*")]), None));
    }

    #[test]
    fn test_precondition_matrix() {
        let stat = stat();
        let etag = stat.etag();

        assert_eq!(
            check_get_preconditions(&headers(&[("if-match", &etag)]), &stat),
            Ok(())
        );
        assert_eq!(
            check_get_preconditions(&headers(&[("if-match", "\"xyz\"")]), &stat),
            Err(Terminal::Status(StatusCode::PRECONDITION_FAILED))
        );
        assert_eq!(
            check_get_preconditions(&headers(&[("if-none-match", &etag)]), &stat),
            Err(Terminal::NotModified(etag.clone()))
        );

        // one hour before / after mtime.
        let earlier = "Wed, 12 Feb 2020 11:00:00 GMT";
        let later = "Wed, 12 Feb 2020 13:00:00 GMT";
        assert_eq!(
            check_get_preconditions(&headers(&[("if-modified-since", earlier)]), &stat),
            Ok(())
        );
        assert_eq!(
            check_get_preconditions(&headers(&[("if-modified-since", later)]), &stat),
            Err(Terminal::NotModified(etag.clone()))
        );
        assert_eq!(
            check_get_preconditions(&headers(&[("if-modified-since", "bogus")]), &stat),
            Err(Terminal::Status(StatusCode::BAD_REQUEST))
        );
        assert_eq!(
            check_get_preconditions(&headers(&[("if-unmodified-since", later)]), &stat),
            Ok(())
        );
        assert_eq!(
            check_get_preconditions(&headers(&[("if-unmodified-since", earlier)]), &stat),
            Err(Terminal::Status(StatusCode::PRECONDITION_FAILED))
        );
    }

    #[test]
    fn test_range_correctness() {
        let stat = stat();
        assert_eq!(
            eval_range(&headers(&[("range", "bytes=0-99")]), &stat),
            HttpRange::Valid { skip: 0, end: 100 }
        );
        assert_eq!(
            eval_range(&headers(&[("range", "bytes=900-")]), &stat),
            HttpRange::Valid { skip: 900, end: 1000 }
        );
        assert_eq!(
            eval_range(&headers(&[("range", "bytes=2000-")]), &stat),
            HttpRange::Invalid
        );
        assert_eq!(
            eval_range(&headers(&[("range", "bytes=0-5000")]), &stat),
            HttpRange::Valid { skip: 0, end: 1000 }
        );
        assert_eq!(
            eval_range(&headers(&[("range", "bytes=-100")]), &stat),
            HttpRange::Valid { skip: 900, end: 1000 }
        );
        // multi-range and garbage downgrade to NONE.
        assert_eq!(
            eval_range(&headers(&[("range", "bytes=0-1,5-6")]), &stat),
            HttpRange::None
        );
        assert_eq!(
            eval_range(&headers(&[("range", "lines=0-1")]), &stat),
            HttpRange::None
        );
        assert_eq!(eval_range(&headers(&[]), &stat), HttpRange::None);
    }

    #[test]
    fn test_if_range() {
        let stat = stat();
        let etag = stat.etag();

        // matching ETag validator: range honored.
        assert_eq!(
            eval_range(
                &headers(&[("range", "bytes=0-99"), ("if-range", &etag)]),
                &stat
            ),
            HttpRange::Valid { skip: 0, end: 100 }
        );
        // mismatching ETag: range ignored.
        assert_eq!(
            eval_range(
                &headers(&[("range", "bytes=0-99"), ("if-range", "\"xyz\"")]),
                &stat
            ),
            HttpRange::None
        );
        // exact date match honored, off-by-one ignored.
        assert_eq!(
            eval_range(
                &headers(&[
                    ("range", "bytes=0-99"),
                    ("if-range", "Wed, 12 Feb 2020 12:00:00 GMT")
                ]),
                &stat
            ),
            HttpRange::Valid { skip: 0, end: 100 }
        );
        assert_eq!(
            eval_range(
                &headers(&[
                    ("range", "bytes=0-99"),
                    ("if-range", "Wed, 12 Feb 2020 12:00:01 GMT")
                ]),
                &stat
            ),
            HttpRange::None
        );
    }
}
