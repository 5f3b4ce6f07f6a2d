use std::io;

use http::{Request, Response, StatusCode};
use xml::reader::{EventReader, XmlEvent};

use crate::body::Body;
use crate::fs::Resource;
use crate::multistatus::XmlWriter;
use crate::DavResult;

// Locking is simulated: a grant is always returned with this fixed
// token, which UNLOCK accepts unconditionally. Windows and macOS
// clients refuse to write without it.
const LOCK_TOKEN: &str = "opaquelocktoken:dummy";

#[derive(PartialEq)]
enum State {
    Root,
    Owner,
    OwnerHref,
}

/// Pull the `<D:owner><D:href>` value out of a lockinfo request body,
/// so the grant can echo it back. Anything else in the document is
/// ignored.
fn parse_lockinfo_owner(body: &[u8]) -> DavResult<Option<String>> {
    if body.is_empty() {
        return Ok(None);
    }
    let mut state = State::Root;
    let mut owner = String::new();

    for event in EventReader::new(body) {
        match event? {
            XmlEvent::StartElement { name, .. } => {
                let dav = name.namespace.as_deref() == Some("DAV:");
                match state {
                    State::Root if dav && name.local_name == "owner" => state = State::Owner,
                    State::Owner if dav && name.local_name == "href" => state = State::OwnerHref,
                    _ => {}
                }
            }
            XmlEvent::Characters(text) => {
                if state == State::OwnerHref {
                    owner.push_str(&text);
                }
            }
            XmlEvent::EndElement { name } => {
                let dav = name.namespace.as_deref() == Some("DAV:");
                match state {
                    State::OwnerHref if dav && name.local_name == "href" => state = State::Owner,
                    State::Owner if dav && name.local_name == "owner" => state = State::Root,
                    _ => {}
                }
            }
            _ => {}
        }
    }
    Ok(if owner.is_empty() { None } else { Some(owner) })
}

fn lockdiscovery_body(owner: Option<&str>) -> io::Result<bytes::Bytes> {
    let mut w = XmlWriter::new();
    w.open_ns("D:prop", "D", "DAV:")?;
    w.open("D:lockdiscovery")?;
    w.open("D:activelock")?;
    w.open("D:locktype")?;
    w.empty("D:write")?;
    w.close()?;
    w.open("D:lockscope")?;
    w.empty("D:exclusive")?;
    w.close()?;
    w.text_element("D:depth", "infinity")?;
    if let Some(owner) = owner {
        w.open("D:owner")?;
        w.href(owner)?;
        w.close()?;
    }
    w.open("D:locktoken")?;
    w.href(LOCK_TOKEN)?;
    w.close()?;
    w.close()?; // D:activelock
    w.close()?; // D:lockdiscovery
    w.close()?; // D:prop
    Ok(w.take())
}

impl crate::DavHandler {
    pub(crate) async fn handle_lock(
        &self,
        req: &Request<()>,
        body: &[u8],
        resource: Resource,
    ) -> DavResult<Response<Body>> {
        // A refresh carries an If header and an empty body. The grant
        // is unconditional either way, so just skip body parsing.
        let refresh = req.headers().contains_key("if");
        let owner = if refresh {
            None
        } else {
            parse_lockinfo_owner(body)?
        };

        // LOCK on an unmapped URL creates an empty resource. The
        // exclusive create keeps a concurrent PUT's data intact.
        let mut created = false;
        if !refresh && !resource.exists() {
            let mut opts = self.inner.fs.write_options();
            opts.create_new(true);
            match opts.open(resource.path()).await {
                Ok(_) => created = true,
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
                Err(e) => {
                    let errno = e.raw_os_error().unwrap_or(0);
                    if errno == libc::EEXIST || errno == libc::EISDIR {
                        // lost the race, the resource is there now.
                    } else if errno == libc::ENOENT || errno == libc::ENOTDIR {
                        return Err(StatusCode::CONFLICT.into());
                    } else {
                        return Err(e.into());
                    }
                }
            }
        }

        let body = lockdiscovery_body(owner.as_deref())?;
        let status = if created {
            StatusCode::CREATED
        } else {
            StatusCode::OK
        };
        Ok(Response::builder()
            .status(status)
            .header("content-type", "text/xml; charset=\"utf-8\"")
            .header("lock-token", format!("<{LOCK_TOKEN}>"))
            .body(Body::from(body))
            .unwrap())
    }

    pub(crate) async fn handle_unlock(&self, _req: &Request<()>) -> DavResult<Response<Body>> {
        Ok(Response::builder()
            .status(StatusCode::NO_CONTENT)
            .header("content-length", "0")
            .body(Body::empty())
            .unwrap())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lockinfo_owner() {
        let body = br#"<?xml version="1.0"?>
            <D:lockinfo xmlns:D="DAV:">
              <D:lockscope><D:exclusive/></D:lockscope>
              <D:locktype><D:write/></D:locktype>
              <D:owner><D:href>http://example.com/~user</D:href></D:owner>
            </D:lockinfo>"#;
        let owner = parse_lockinfo_owner(body).unwrap();
        assert_eq!(owner.as_deref(), Some("http://example.com/~user"));
    }

    #[test]
    fn test_parse_lockinfo_no_owner() {
        let body = br#"<D:lockinfo xmlns:D="DAV:">
              <D:lockscope><D:exclusive/></D:lockscope>
            </D:lockinfo>"#;
        assert_eq!(parse_lockinfo_owner(body).unwrap(), None);
    }

    #[test]
    fn test_parse_lockinfo_malformed() {
        assert!(parse_lockinfo_owner(b"<nope").is_err());
    }

    #[test]
    fn test_lockdiscovery_body() {
        let body = lockdiscovery_body(Some("http://example.com/me")).unwrap();
        let s = std::str::from_utf8(&body).unwrap();
        assert!(s.contains("<D:lockdiscovery>"));
        assert!(s.contains("<D:exclusive"));
        assert!(s.contains("<D:href>opaquelocktoken:dummy</D:href>"));
        assert!(s.contains("http://example.com/me"));
    }
}
