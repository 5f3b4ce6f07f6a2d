use std::time::SystemTime;

use http::{Request, Response, StatusCode};
use time::PrimitiveDateTime;
use xml::reader::{EventReader, XmlEvent};

use crate::body::Body;
use crate::errors::{io_status, DavError};
use crate::fs::Resource;
use crate::multistatus::{status_line, XmlWriter};
use crate::util::parse_http_date;
use crate::DavResult;

// Properties that actually map onto filesystem timestamps. Everything
// else is echoed back in the 404 propstat group.
const PROP_LASTMODIFIED: &str = "DAV:|getlastmodified";
const PROP_WIN32_MTIME: &str = "urn:schemas-microsoft-com:|Win32LastModifiedTime";
const PROP_WIN32_ATIME: &str = "urn:schemas-microsoft-com:|Win32LastAccessTime";

struct PropUpdate {
    key: String,
    value: String,
}

#[derive(PartialEq)]
enum State {
    Root,
    Prop,
    PropName,
}

/// Pull the `<D:prop>` children out of a propertyupdate document.
/// Keys are `"namespace|localname"`; the value is the immediate
/// character content. Nested markup below a property is skipped.
fn parse_propertyupdate(body: &[u8]) -> DavResult<Vec<PropUpdate>> {
    let mut props = Vec::new();
    let mut state = State::Root;
    let mut depth = 0usize;
    let mut key = String::new();
    let mut value = String::new();

    for event in EventReader::new(body) {
        match event? {
            XmlEvent::StartElement { name, .. } => match state {
                State::Root => {
                    if name.namespace.as_deref() == Some("DAV:") && name.local_name == "prop" {
                        state = State::Prop;
                    }
                }
                State::Prop => {
                    key = match &name.namespace {
                        Some(ns) => format!("{ns}|{}", name.local_name),
                        None => name.local_name.clone(),
                    };
                    value.clear();
                    depth = 0;
                    state = State::PropName;
                }
                State::PropName => depth += 1,
            },
            XmlEvent::Characters(text) => {
                if state == State::PropName && depth == 0 {
                    value.push_str(&text);
                }
            }
            XmlEvent::EndElement { name } => match state {
                State::PropName => {
                    if depth == 0 {
                        props.push(PropUpdate {
                            key: std::mem::take(&mut key),
                            value: std::mem::take(&mut value),
                        });
                        state = State::Prop;
                    } else {
                        depth -= 1;
                    }
                }
                State::Prop => {
                    if name.namespace.as_deref() == Some("DAV:") && name.local_name == "prop" {
                        state = State::Root;
                    }
                }
                State::Root => {}
            },
            _ => {}
        }
    }
    Ok(props)
}

/// The Windows redirector timestamp format, e.g.
/// `Wed, 12 Feb 2020 12:00:00 GMT`.
fn parse_win32_timestamp(value: &str) -> Option<SystemTime> {
    let fmt = time::macros::format_description!(
        "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
    );
    let dt = PrimitiveDateTime::parse(value.trim(), fmt).ok()?;
    Some(dt.assume_utc().into())
}

impl crate::DavHandler {
    pub(crate) async fn handle_proppatch(
        &self,
        req: &Request<()>,
        body: &[u8],
        resource: Resource,
    ) -> DavResult<Response<Body>> {
        if !resource.exists() {
            return Err(resource.error_status().into());
        }

        let props = parse_propertyupdate(body)?;

        let mut mtime: Option<SystemTime> = None;
        let mut atime: Option<SystemTime> = None;
        let mut results: Vec<(String, StatusCode)> = Vec::new();

        for prop in props {
            let status = match prop.key.as_str() {
                PROP_LASTMODIFIED => match parse_http_date(&prop.value) {
                    Some(t) => {
                        mtime = Some(t);
                        StatusCode::OK
                    }
                    None => StatusCode::BAD_REQUEST,
                },
                PROP_WIN32_MTIME => match parse_win32_timestamp(&prop.value) {
                    Some(t) => {
                        mtime = Some(t);
                        StatusCode::OK
                    }
                    None => StatusCode::BAD_REQUEST,
                },
                PROP_WIN32_ATIME => match parse_win32_timestamp(&prop.value) {
                    Some(t) => {
                        atime = Some(t);
                        StatusCode::OK
                    }
                    None => StatusCode::BAD_REQUEST,
                },
                _ => StatusCode::NOT_FOUND,
            };
            results.push((prop.key, status));
        }

        // All accepted timestamps go down in one call, so they share
        // one success or failure status.
        if mtime.is_some() || atime.is_some() {
            let path = resource.path().to_path_buf();
            let applied = tokio::task::spawn_blocking(move || {
                let file = std::fs::File::open(&path)?;
                let mut times = std::fs::FileTimes::new();
                if let Some(t) = mtime {
                    times = times.set_modified(t);
                }
                if let Some(t) = atime {
                    times = times.set_accessed(t);
                }
                file.set_times(times)
            })
            .await
            .map_err(|_| DavError::Status(StatusCode::INTERNAL_SERVER_ERROR))?;

            if let Err(e) = applied {
                debug!("PROPPATCH set_times failed on {:?}: {}", resource.path(), e);
                let status = io_status(&e);
                for result in results.iter_mut() {
                    if result.1 == StatusCode::OK {
                        result.1 = status;
                    }
                }
            }
        }

        let mut w = XmlWriter::new();
        w.begin_multistatus()?;
        w.open("D:response")?;
        w.href(req.uri().path())?;

        let mut statuses: Vec<StatusCode> = Vec::new();
        for (_, status) in &results {
            if !statuses.contains(status) {
                statuses.push(*status);
            }
        }
        for status in statuses {
            w.open("D:propstat")?;
            w.text_element("D:status", &status_line(status))?;
            w.open("D:prop")?;
            for (key, s) in &results {
                if *s == status {
                    w.empty_prop(key)?;
                }
            }
            w.close()?;
            w.close()?;
        }
        w.close()?;
        w.end_multistatus()?;

        Ok(Response::builder()
            .status(StatusCode::MULTI_STATUS)
            .header("content-type", "text/xml; charset=\"utf-8\"")
            .body(Body::from(w.take()))
            .unwrap())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_propertyupdate() {
        let body = br#"<?xml version="1.0"?>
            <D:propertyupdate xmlns:D="DAV:" xmlns:Z="urn:schemas-microsoft-com:">
              <D:set><D:prop>
                <Z:Win32LastModifiedTime>Wed, 12 Feb 2020 12:00:00 GMT</Z:Win32LastModifiedTime>
                <D:getlastmodified>Wed, 12 Feb 2020 12:00:00 GMT</D:getlastmodified>
                <Z:Win32FileAttributes>00000020</Z:Win32FileAttributes>
              </D:prop></D:set>
            </D:propertyupdate>"#;
        let props = parse_propertyupdate(body).unwrap();
        assert_eq!(props.len(), 3);
        assert_eq!(props[0].key, PROP_WIN32_MTIME);
        assert_eq!(props[0].value, "Wed, 12 Feb 2020 12:00:00 GMT");
        assert_eq!(props[1].key, PROP_LASTMODIFIED);
        assert_eq!(props[2].key, "urn:schemas-microsoft-com:|Win32FileAttributes");
    }

    #[test]
    fn test_parse_propertyupdate_nested_markup_skipped() {
        let body = br#"<D:propertyupdate xmlns:D="DAV:">
            <D:set><D:prop>
              <D:displayname><x>deep</x>name</D:displayname>
            </D:prop></D:set>
          </D:propertyupdate>"#;
        let props = parse_propertyupdate(body).unwrap();
        assert_eq!(props.len(), 1);
        assert_eq!(props[0].key, "DAV:|displayname");
        assert_eq!(props[0].value, "name");
    }

    #[test]
    fn test_parse_propertyupdate_malformed() {
        assert!(parse_propertyupdate(b"<unterminated").is_err());
    }

    #[test]
    fn test_parse_win32_timestamp() {
        let t = parse_win32_timestamp("Wed, 12 Feb 2020 12:00:00 GMT").unwrap();
        let secs = t
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap()
            .as_secs();
        assert_eq!(secs, 1581508800);
        assert!(parse_win32_timestamp("12 Feb 2020").is_none());
        assert!(parse_win32_timestamp("").is_none());
    }
}
