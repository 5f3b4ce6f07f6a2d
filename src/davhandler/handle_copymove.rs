use headers::HeaderMapExt;
use http::{Request, Response, StatusCode};
use url::Url;

use crate::body::Body;
use crate::davheaders::{Destination, Overwrite};
use crate::davpath::DavPath;
use crate::errors::DavError;
use crate::fs::{device_of, Resource};
use crate::util::DavMethod;
use crate::DavResult;

/// Extract the URI path from a Destination value, which may be an
/// absolute URL.
fn destination_path(dest: &str) -> DavResult<String> {
    if dest.starts_with("http://") || dest.starts_with("https://") {
        let url = Url::parse(dest).map_err(|_| DavError::Status(StatusCode::BAD_REQUEST))?;
        Ok(url.path().to_string())
    } else {
        Ok(dest.to_string())
    }
}

impl crate::DavHandler {
    pub(crate) async fn handle_copymove(
        &self,
        req: &Request<()>,
        method: DavMethod,
        resource: Resource,
    ) -> DavResult<Response<Body>> {
        if !resource.exists() {
            return Err(resource.error_status().into());
        }

        let dest = req
            .headers()
            .typed_get::<Destination>()
            .ok_or(DavError::Status(StatusCode::BAD_REQUEST))?;
        let dest_path = destination_path(&dest.0)?;
        // The destination goes through the same validation as the
        // request path; outside the mount point is 403, not 404.
        let dest_path = DavPath::parse(&dest_path, &self.inner.prefix)?;
        let dest = self.inner.fs.map(&dest_path).await;

        // The destination must not be the source itself, nor anything
        // below it: a tree copy into its own subtree would enumerate
        // the partially written destination and recurse without end.
        if dest.path().starts_with(resource.path()) {
            return Err(StatusCode::FORBIDDEN.into());
        }

        let overwrite = req
            .headers()
            .typed_get::<Overwrite>()
            .map(|o| o.0)
            .unwrap_or(true);
        let dest_existed = dest.exists();
        if dest_existed && !overwrite {
            // fail atomically instead of partially overwriting.
            return Err(StatusCode::PRECONDITION_FAILED.into());
        }

        match method {
            DavMethod::COPY => {
                if resource.is_dir() {
                    let meta = tokio::fs::metadata(resource.path()).await?;
                    self.inner
                        .fs
                        .copy_tree(resource.path(), dest.path(), device_of(&meta))
                        .await?;
                } else {
                    tokio::fs::copy(resource.path(), dest.path()).await?;
                }
            }
            DavMethod::MOVE => {
                match tokio::fs::rename(resource.path(), dest.path()).await {
                    Ok(()) => {}
                    // webdav allows a move from a directory over a file.
                    Err(e)
                        if e.raw_os_error() == Some(libc::ENOTDIR) && resource.is_dir() =>
                    {
                        let _ = tokio::fs::remove_file(dest.path()).await;
                        tokio::fs::rename(resource.path(), dest.path()).await?;
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            _ => unreachable!(),
        }

        let status = if dest_existed {
            StatusCode::NO_CONTENT
        } else {
            StatusCode::CREATED
        };
        Ok(Response::builder()
            .status(status)
            .header("content-length", "0")
            .body(Body::empty())
            .unwrap())
    }
}
