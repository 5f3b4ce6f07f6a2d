//
// This module contains the main entry point of the library,
// DavHandler.
//
use std::error::Error as StdError;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use bytes::buf::Buf;
use http::{Request, Response, StatusCode};
use http_body::Body as HttpBody;

use crate::body::Body;
use crate::conditional::Terminal;
use crate::davpath::DavPath;
use crate::errors::DavError;
use crate::fs::LocalFs;
use crate::util::{dav_method, DavMethod};
use crate::DavResult;

pub mod handle_copymove;
pub mod handle_delete;
pub mod handle_gethead;
use handle_gethead::READ_BUF_SIZE;
pub mod handle_lock;
pub mod handle_mkcol;
pub mod handle_options;
pub mod handle_propfind;
use handle_propfind::{PROPFIND_MAX_DEPTH, PROPFIND_MAX_ENTRIES};
pub mod handle_proppatch;
pub mod handle_put;

/// Pre-read request bodies (PROPFIND/PROPPATCH/LOCK) beyond this are 413.
const MAX_XML_BODY: usize = 65536;

/// Configuration of the handler.
#[derive(Clone)]
pub struct DavBuilder {
    /// Mount point prefix, stripped off when mapping request paths.
    prefix: String,
    /// Document root served by the filesystem backend.
    root: PathBuf,
    /// Are created files world-readable?
    public: bool,
    /// Set of allowed methods (defaults to "all methods").
    allow: DavMethod,
    /// Value of the `DAV` capability response header.
    dav_header: String,
    /// Recursion bound for PROPFIND `Depth: infinity`.
    propfind_depth: u32,
    /// Cap on enumerated entries per directory listing.
    propfind_entries: usize,
    /// Read buffer size in bytes for GET streaming.
    read_buf_size: usize,
}

impl DavBuilder {
    /// Create a new configuration builder serving `root`.
    pub fn new(root: impl Into<PathBuf>) -> DavBuilder {
        Self {
            prefix: "/".to_string(),
            root: root.into(),
            public: false,
            allow: DavMethod::all(),
            dav_header: "1".to_string(),
            propfind_depth: PROPFIND_MAX_DEPTH,
            propfind_entries: PROPFIND_MAX_ENTRIES,
            read_buf_size: READ_BUF_SIZE,
        }
    }

    /// Use the configuration that was built to generate a DavHandler.
    pub fn build(self) -> DavHandler {
        self.into()
    }

    /// Mount point prefix; it is normalized to start and end with `/`.
    pub fn mount_point(mut self, prefix: impl Into<String>) -> Self {
        let mut prefix = prefix.into();
        if !prefix.starts_with('/') {
            prefix.insert(0, '/');
        }
        if !prefix.ends_with('/') {
            prefix.push('/');
        }
        self.prefix = prefix;
        self
    }

    /// Make created files and directories publically readable
    /// (mode 644/755 rather than 600/700).
    pub fn public(mut self, public: bool) -> Self {
        self.public = public;
        self
    }

    /// Which methods to allow (default is all methods).
    pub fn methods(mut self, allow: DavMethod) -> Self {
        self.allow = allow;
        self
    }

    /// Value of the `DAV` capability header (default `"1"`).
    pub fn dav_header(mut self, dav: impl Into<String>) -> Self {
        self.dav_header = dav.into();
        self
    }

    /// Maximum PROPFIND recursion depth.
    pub fn propfind_depth(mut self, depth: u32) -> Self {
        self.propfind_depth = depth;
        self
    }

    /// Maximum number of entries enumerated per directory in PROPFIND.
    pub fn propfind_entries(mut self, entries: usize) -> Self {
        self.propfind_entries = entries;
        self
    }

    /// Read buffer size in bytes.
    pub fn read_buf_size(mut self, size: usize) -> Self {
        self.read_buf_size = size;
        self
    }
}

pub(crate) struct DavInner {
    pub(crate) prefix: String,
    pub(crate) fs: LocalFs,
    pub(crate) allow: DavMethod,
    pub(crate) dav_header: String,
    pub(crate) propfind_depth: u32,
    pub(crate) propfind_entries: usize,
    pub(crate) read_buf_size: usize,
}

/// The webdav handler struct.
///
/// Use [`DavHandler::builder`] to configure and instantiate one; the
/// `handle` method does the actual work.
#[derive(Clone)]
pub struct DavHandler {
    pub(crate) inner: Arc<DavInner>,
}

impl From<DavBuilder> for DavHandler {
    fn from(cfg: DavBuilder) -> Self {
        Self {
            inner: Arc::new(DavInner {
                prefix: cfg.prefix,
                fs: LocalFs::new(cfg.root, cfg.public),
                allow: cfg.allow,
                dav_header: cfg.dav_header,
                propfind_depth: cfg.propfind_depth,
                propfind_entries: cfg.propfind_entries,
                read_buf_size: cfg.read_buf_size,
            }),
        }
    }
}

/// Turn a short-circuited precondition outcome into its response.
/// No body bytes have been produced at this point.
pub(crate) fn terminal_response(t: Terminal) -> Response<Body> {
    match t {
        Terminal::Status(status) => Response::builder()
            .status(status)
            .header("content-length", "0")
            .body(Body::empty())
            .unwrap(),
        Terminal::NotModified(etag) => Response::builder()
            .status(StatusCode::NOT_MODIFIED)
            .header("etag", etag)
            .body(Body::empty())
            .unwrap(),
    }
}

impl DavHandler {
    /// Return a configuration builder serving `root`.
    pub fn builder(root: impl Into<PathBuf>) -> DavBuilder {
        DavBuilder::new(root)
    }

    /// Handle a webdav request.
    pub async fn handle<ReqBody, ReqData, ReqError>(&self, req: Request<ReqBody>) -> Response<Body>
    where
        ReqData: Buf + Send + 'static,
        ReqError: StdError + Send + Sync + 'static,
        ReqBody: HttpBody<Data = ReqData, Error = ReqError>,
    {
        // Turn any DavError results into a HTTP error response.
        match self.handle2(req).await {
            Ok(resp) => {
                debug!("== END REQUEST result {}", resp.status());
                resp
            }
            Err(err) => {
                debug!("== END REQUEST result {:?}", err);
                let mut resp = Response::builder()
                    .header("content-length", "0")
                    .status(err.statuscode());
                if err.must_close() {
                    resp = resp.header("connection", "close");
                }
                resp.body(Body::empty()).unwrap()
            }
        }
    }

    // drain the request body and return it, bounded.
    pub(crate) async fn read_request<ReqBody, ReqData, ReqError>(
        &self,
        body: ReqBody,
        max_size: usize,
    ) -> DavResult<Vec<u8>>
    where
        ReqBody: HttpBody<Data = ReqData, Error = ReqError>,
        ReqData: Buf + Send + 'static,
        ReqError: StdError + Send + Sync + 'static,
    {
        let mut data = Vec::new();
        pin_utils::pin_mut!(body);
        while let Some(res) = body.data().await {
            let mut buf = res.map_err(|_| {
                DavError::IoError(io::Error::new(io::ErrorKind::UnexpectedEof, "UnexpectedEof"))
            })?;
            while buf.has_remaining() {
                if data.len() + buf.remaining() > max_size {
                    return Err(DavError::StatusClose(StatusCode::PAYLOAD_TOO_LARGE));
                }
                let b = buf.chunk();
                let l = b.len();
                data.extend_from_slice(b);
                buf.advance(l);
            }
        }
        Ok(data)
    }

    // internal dispatcher.
    async fn handle2<ReqBody, ReqData, ReqError>(
        &self,
        req: Request<ReqBody>,
    ) -> DavResult<Response<Body>>
    where
        ReqBody: HttpBody<Data = ReqData, Error = ReqError>,
        ReqData: Buf + Send + 'static,
        ReqError: StdError + Send + Sync + 'static,
    {
        let (req, body) = {
            let (parts, body) = req.into_parts();
            (Request::from_parts(parts, ()), body)
        };

        // translate HTTP method to Webdav method.
        let method = match dav_method(req.method()) {
            Ok(m) => m,
            Err(e) => {
                debug!("refusing method {} request {}", req.method(), req.uri());
                return Err(e);
            }
        };

        // see if method is allowed.
        if !self.inner.allow.contains(method) {
            debug!("method {} not allowed on request {}", req.method(), req.uri());
            return Err(DavError::StatusClose(StatusCode::METHOD_NOT_ALLOWED));
        }

        // make sure the request path is valid.
        let path = DavPath::parse(req.uri().path(), &self.inner.prefix)?;

        // PUT is the only handler that reads the body itself. All the
        // other handlers either expect no body, or a pre-read Vec<u8>.
        let (body_strm, body_data) = match method {
            DavMethod::PUT => (Some(body), Vec::new()),
            _ => (None, self.read_request(body, MAX_XML_BODY).await?),
        };

        // Not all methods accept a body.
        match method {
            DavMethod::PUT | DavMethod::PROPFIND | DavMethod::PROPPATCH | DavMethod::LOCK => {}
            _ => {
                if !body_data.is_empty() {
                    return Err(StatusCode::UNSUPPORTED_MEDIA_TYPE.into());
                }
            }
        }

        debug!("== START REQUEST {:?} {}", method, req.uri());

        // one stat per request; the resource snapshot the handlers consume.
        let resource = self.inner.fs.map(&path).await;

        // A trailing slash is reserved for collections.
        if path.is_collection() {
            if method == DavMethod::PUT {
                return Err(StatusCode::METHOD_NOT_ALLOWED.into());
            }
            if resource.exists() && !resource.is_dir() {
                return Err(StatusCode::NOT_FOUND.into());
            }
        }

        match method {
            DavMethod::OPTIONS => self.handle_options(&req, &resource).await,
            DavMethod::PROPFIND => self.handle_propfind(&req, resource).await,
            DavMethod::PROPPATCH => self.handle_proppatch(&req, &body_data, resource).await,
            DavMethod::MKCOL => self.handle_mkcol(resource).await,
            DavMethod::DELETE => self.handle_delete(resource).await,
            DavMethod::LOCK => self.handle_lock(&req, &body_data, resource).await,
            DavMethod::UNLOCK => self.handle_unlock(&req).await,
            DavMethod::HEAD | DavMethod::GET => {
                self.handle_get(&req, resource, method == DavMethod::HEAD).await
            }
            DavMethod::COPY | DavMethod::MOVE => {
                self.handle_copymove(&req, method, resource).await
            }
            DavMethod::PUT => self.handle_put(&req, body_strm.unwrap(), resource).await,
            _ => Err(DavError::UnknownDavMethod),
        }
    }
}
