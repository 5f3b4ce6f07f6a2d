use std::io;

use http::{Response, StatusCode};

use crate::body::Body;
use crate::errors::DavError;
use crate::fs::Resource;
use crate::DavResult;

impl crate::DavHandler {
    /// Create exactly one new directory; no implicit parent creation.
    pub(crate) async fn handle_mkcol(&self, resource: Resource) -> DavResult<Response<Body>> {
        if let Err(e) = self.inner.fs.create_dir(resource.path()).await {
            // an existing entry, or a file in an intermediate segment,
            // is a conflict rather than a server error.
            return Err(match e.raw_os_error() {
                Some(libc::EEXIST) | Some(libc::ENOTDIR) => {
                    DavError::Status(StatusCode::CONFLICT)
                }
                _ if e.kind() == io::ErrorKind::AlreadyExists => {
                    DavError::Status(StatusCode::CONFLICT)
                }
                _ => e.into(),
            });
        }

        Ok(Response::builder()
            .status(StatusCode::CREATED)
            .header("content-length", "0")
            .body(Body::empty())
            .unwrap())
    }
}
