use std::io;
use std::path::PathBuf;

use bytes::Bytes;
use futures_channel::mpsc::{self, UnboundedSender};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use headers::HeaderMapExt;
use http::{Request, Response, StatusCode};

use crate::body::Body;
use crate::davheaders::Depth;
use crate::davpath::uri_escape_path;
use crate::fs::{Resource, Stat};
use crate::multistatus::XmlWriter;
use crate::util::systemtime_to_httpdate;
use crate::DavResult;

/// Recursion bound applied to `Depth: infinity`. Purely resource
/// exhaustion protection, configurable on the builder.
pub(crate) const PROPFIND_MAX_DEPTH: u32 = 16;

/// Cap on enumerated entries per directory listing.
pub(crate) const PROPFIND_MAX_ENTRIES: usize = 8192;

type Tx = UnboundedSender<io::Result<Bytes>>;

/// Ship the XML accumulated so far. Fails when the peer has gone away,
/// which aborts the walk promptly.
fn send_chunk(tx: &Tx, w: &mut XmlWriter) -> io::Result<()> {
    let chunk = w.take();
    if chunk.is_empty() {
        return Ok(());
    }
    tx.unbounded_send(Ok(chunk))
        .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "response receiver dropped"))
}

impl crate::DavHandler {
    pub(crate) async fn handle_propfind(
        &self,
        req: &Request<()>,
        resource: Resource,
    ) -> DavResult<Response<Body>> {
        let Some(stat) = resource.stat().cloned() else {
            return Err(resource.error_status().into());
        };

        let depth = req
            .headers()
            .typed_get::<Depth>()
            .unwrap_or(Depth(0))
            .0
            .min(self.inner.propfind_depth);
        let max_entries = self.inner.propfind_entries;
        let uri = req.uri().path().to_string();
        let path = resource.path().to_path_buf();

        // The multistatus body is generated incrementally: status and
        // headers go out first, then one chunk per visited node.
        let (tx, rx) = mpsc::unbounded();
        tokio::spawn(async move {
            let mut w = XmlWriter::new();
            let result = walk(&mut w, &tx, path, uri, stat, depth, max_entries).await;
            if let Err(e) = result {
                debug!("PROPFIND tree walk aborted: {e}");
                let _ = tx.unbounded_send(Err(e));
            }
        });

        Ok(Response::builder()
            .status(StatusCode::MULTI_STATUS)
            .header("content-type", "text/xml; charset=\"utf-8\"")
            .body(Body::stream(rx))
            .unwrap())
    }
}

async fn walk(
    w: &mut XmlWriter,
    tx: &Tx,
    path: PathBuf,
    uri: String,
    stat: Stat,
    depth: u32,
    max_entries: usize,
) -> io::Result<()> {
    w.begin_multistatus()?;
    propfind_node(w, tx, path, uri, stat, depth, max_entries).await?;
    w.end_multistatus()?;
    send_chunk(tx, w)
}

fn propfind_node<'a>(
    w: &'a mut XmlWriter,
    tx: &'a Tx,
    path: PathBuf,
    uri: String,
    stat: Stat,
    depth: u32,
    max_entries: usize,
) -> BoxFuture<'a, io::Result<()>> {
    async move {
        w.open_response_prop(&uri, StatusCode::OK)?;
        if stat.is_dir() {
            w.resourcetype_collection()?;
        } else if stat.is_file() {
            w.text_element("D:getcontentlength", &stat.len.to_string())?;
        }
        w.text_element("D:getlastmodified", &systemtime_to_httpdate(stat.modified))?;
        w.close_response_prop()?;
        send_chunk(tx, w)?;

        if depth == 0 || !stat.is_dir() {
            return Ok(());
        }

        // directory hrefs always end with a slash; fix up the
        // user-supplied URI if necessary.
        let mut uri = uri;
        if !uri.ends_with('/') {
            uri.push('/');
        }

        let mut names = Vec::new();
        if let Ok(mut read_dir) = tokio::fs::read_dir(&path).await {
            while let Ok(Some(entry)) = read_dir.next_entry().await {
                names.push(entry.file_name());
                if names.len() >= max_entries {
                    break;
                }
            }
        }
        // deterministic listing order.
        names.sort();

        for name in names {
            let sub_path = path.join(&name);
            // an entry that cannot be stat'ed is skipped, not fatal.
            let Ok(meta) = tokio::fs::metadata(&sub_path).await else {
                continue;
            };
            let sub_stat = Stat::from_metadata(&meta);
            let mut sub_uri = format!("{uri}{}", uri_escape_path(&name.to_string_lossy()));
            if sub_stat.is_dir() {
                sub_uri.push('/');
            }
            propfind_node(&mut *w, tx, sub_path, sub_uri, sub_stat, depth - 1, max_entries)
                .await?;
        }
        Ok(())
    }
    .boxed()
}
