use std::error::Error as StdError;

use bytes::buf::Buf;
use http::{Request, Response, StatusCode};
use http_body::Body as HttpBody;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::body::Body;
use crate::conditional::check_write_preconditions;
use crate::davhandler::terminal_response;
use crate::errors::DavError;
use crate::fs::Resource;
use crate::DavResult;

impl crate::DavHandler {
    /// Stream the request body into a temporary file next to the target
    /// and atomically rename over it. A failed transfer leaves the
    /// original file, if any, untouched.
    pub(crate) async fn handle_put<ReqBody, ReqData, ReqError>(
        &self,
        req: &Request<()>,
        body: ReqBody,
        resource: Resource,
    ) -> DavResult<Response<Body>>
    where
        ReqBody: HttpBody<Data = ReqData, Error = ReqError>,
        ReqData: Buf + Send + 'static,
        ReqError: StdError + Send + Sync + 'static,
    {
        if resource.is_dir() {
            return Err(StatusCode::METHOD_NOT_ALLOWED.into());
        }

        if let Err(t) = check_write_preconditions(req.headers(), resource.stat()) {
            return Ok(terminal_response(t));
        }

        let path = resource.path();
        let dir = path
            .parent()
            .ok_or(DavError::Status(StatusCode::FORBIDDEN))?;
        let name = path
            .file_name()
            .ok_or(DavError::Status(StatusCode::FORBIDDEN))?;

        let tmp = dir.join(format!(
            ".{}.{}.tmp",
            name.to_string_lossy(),
            Uuid::new_v4().simple()
        ));

        let mut opt = self.inner.fs.write_options();
        opt.create_new(true);
        let mut file = opt.open(&tmp).await?;

        let result = copy_body(body, &mut file).await;
        drop(file);

        match result {
            Ok(()) => {}
            Err(e) => {
                let _ = tokio::fs::remove_file(&tmp).await;
                return Err(e);
            }
        }

        if let Err(e) = tokio::fs::rename(&tmp, path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        // 201 whether this created or overwrote (RFC 4918 9.7.1).
        Ok(Response::builder()
            .status(StatusCode::CREATED)
            .header("content-length", "0")
            .body(Body::empty())
            .unwrap())
    }
}

async fn copy_body<ReqBody, ReqData, ReqError>(
    body: ReqBody,
    file: &mut tokio::fs::File,
) -> DavResult<()>
where
    ReqBody: HttpBody<Data = ReqData, Error = ReqError>,
    ReqData: Buf + Send + 'static,
    ReqError: StdError + Send + Sync + 'static,
{
    pin_utils::pin_mut!(body);
    while let Some(res) = body.data().await {
        let mut buf = match res {
            Ok(buf) => buf,
            Err(e) => {
                debug!("PUT body transfer failed: {e}");
                // body partially read: the connection is unusable.
                return Err(DavError::StatusClose(StatusCode::INTERNAL_SERVER_ERROR));
            }
        };
        while buf.has_remaining() {
            let chunk = buf.chunk();
            let n = chunk.len();
            file.write_all(chunk).await?;
            buf.advance(n);
        }
    }
    file.flush().await?;
    Ok(())
}
