use std::io::SeekFrom;

use async_stream::stream;
use bytes::BytesMut;
use headers::HeaderMapExt;
use http::{Request, Response, StatusCode};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::body::Body;
use crate::conditional::{check_get_preconditions, eval_range, HttpRange};
use crate::davhandler::terminal_response;
use crate::fs::{Resource, Stat};
use crate::DavResult;

pub(crate) const READ_BUF_SIZE: usize = 65536;

impl crate::DavHandler {
    pub(crate) async fn handle_get(
        &self,
        req: &Request<()>,
        resource: Resource,
        head: bool,
    ) -> DavResult<Response<Body>> {
        // Open first, then fstat through the descriptor: a path-based
        // stat followed by open would race against concurrent
        // rename/delete.
        let mut file = tokio::fs::File::open(resource.path()).await?;
        let stat = Stat::from_metadata(&file.metadata().await?);

        if !stat.is_file() {
            return Err(StatusCode::METHOD_NOT_ALLOWED.into());
        }

        if let Err(t) = check_get_preconditions(req.headers(), &stat) {
            return Ok(terminal_response(t));
        }

        let range = eval_range(req.headers(), &stat);

        let mut res = Response::new(Body::empty());
        let h = res.headers_mut();
        let ct = mime_guess::from_path(resource.path()).first_or_octet_stream();
        h.typed_insert(headers::ContentType::from(ct));
        h.typed_insert(headers::AcceptRanges::bytes());
        h.typed_insert(headers::LastModified::from(stat.modified));
        h.insert("etag", stat.etag().parse().unwrap());

        let (skip, end) = match range {
            HttpRange::None => (0, stat.len),
            HttpRange::Valid { skip, end } => {
                *res.status_mut() = StatusCode::PARTIAL_CONTENT;
                let cr = format!("bytes {}-{}/{}", skip, end - 1, stat.len);
                res.headers_mut().insert("content-range", cr.parse().unwrap());
                (skip, end)
            }
            HttpRange::Invalid => {
                *res.status_mut() = StatusCode::RANGE_NOT_SATISFIABLE;
                let cr = format!("bytes */{}", stat.len);
                let h = res.headers_mut();
                h.insert("content-range", cr.parse().unwrap());
                h.typed_insert(headers::ContentLength(0));
                return Ok(res);
            }
        };

        res.headers_mut()
            .typed_insert(headers::ContentLength(end - skip));

        if head {
            return Ok(res);
        }

        if skip > 0 {
            file.seek(SeekFrom::Start(skip)).await?;
        }

        let buf_size = self.inner.read_buf_size as u64;
        *res.body_mut() = Body::stream(stream! {
            let mut remaining = end - skip;
            while remaining > 0 {
                let chunk = remaining.min(buf_size) as usize;
                let mut buf = BytesMut::with_capacity(chunk);
                match file.read_buf(&mut buf).await {
                    Ok(0) => break,
                    Ok(_) => {
                        remaining -= buf.len() as u64;
                        yield Ok(buf.freeze());
                    }
                    Err(e) => {
                        // headers are out; all we can do is stop writing.
                        debug!("GET body read failed: {e}");
                        yield Err(e);
                        break;
                    }
                }
            }
        });

        Ok(res)
    }
}
