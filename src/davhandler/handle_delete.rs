use http::{Response, StatusCode};

use crate::body::Body;
use crate::fs::Resource;
use crate::DavResult;

impl crate::DavHandler {
    pub(crate) async fn handle_delete(&self, resource: Resource) -> DavResult<Response<Body>> {
        if !resource.exists() {
            return Err(resource.error_status().into());
        }

        // Files are unlinked directly; directories take a recursive
        // walk. "Already gone" along the way counts as success.
        self.inner.fs.remove_tree(resource.path()).await?;

        Ok(Response::builder()
            .status(StatusCode::NO_CONTENT)
            .header("content-length", "0")
            .body(Body::empty())
            .unwrap())
    }
}
