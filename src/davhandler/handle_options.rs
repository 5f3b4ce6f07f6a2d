use headers::HeaderMapExt;
use http::{Request, Response};

use crate::body::Body;
use crate::fs::Resource;
use crate::util::DavMethod;
use crate::DavResult;

// Fixed method lists, picked purely by what the resource is.
const ALLOW_NEW: &[(&str, DavMethod)] = &[
    ("OPTIONS", DavMethod::OPTIONS),
    ("MKCOL", DavMethod::MKCOL),
    ("PUT", DavMethod::PUT),
    ("LOCK", DavMethod::LOCK),
];

const ALLOW_FILE: &[(&str, DavMethod)] = &[
    ("OPTIONS", DavMethod::OPTIONS),
    ("GET", DavMethod::GET),
    ("HEAD", DavMethod::HEAD),
    ("DELETE", DavMethod::DELETE),
    ("PROPFIND", DavMethod::PROPFIND),
    ("PROPPATCH", DavMethod::PROPPATCH),
    ("COPY", DavMethod::COPY),
    ("MOVE", DavMethod::MOVE),
    ("PUT", DavMethod::PUT),
    ("LOCK", DavMethod::LOCK),
    ("UNLOCK", DavMethod::UNLOCK),
];

const ALLOW_DIRECTORY: &[(&str, DavMethod)] = &[
    ("OPTIONS", DavMethod::OPTIONS),
    ("DELETE", DavMethod::DELETE),
    ("PROPFIND", DavMethod::PROPFIND),
    ("PROPPATCH", DavMethod::PROPPATCH),
    ("COPY", DavMethod::COPY),
    ("MOVE", DavMethod::MOVE),
    ("LOCK", DavMethod::LOCK),
    ("UNLOCK", DavMethod::UNLOCK),
];

impl crate::DavHandler {
    pub(crate) async fn handle_options(
        &self,
        _req: &Request<()>,
        resource: &Resource,
    ) -> DavResult<Response<Body>> {
        let mut res = Response::new(Body::empty());
        let h = res.headers_mut();

        // RFC 4918 10.1
        h.insert("dav", self.inner.dav_header.parse().unwrap());
        h.insert("ms-author-via", "DAV".parse().unwrap());
        h.typed_insert(headers::ContentLength(0));

        let allow = if !resource.exists() {
            ALLOW_NEW
        } else if resource.is_dir() {
            ALLOW_DIRECTORY
        } else {
            ALLOW_FILE
        };

        let allowed: Vec<&str> = allow
            .iter()
            .filter(|(_, m)| self.inner.allow.contains(*m))
            .map(|(name, _)| *name)
            .collect();
        h.insert("allow", allowed.join(",").parse().unwrap());

        Ok(res)
    }
}
