//! ## Async HTTP/Webdav frontend for a local directory
//!
//! [`Webdav`] (RFC4918) is HTTP (GET/HEAD/PUT/DELETE) plus a set of
//! extension methods (PROPFIND, MKCOL, COPY, MOVE, etc) that manage
//! collections, list their contents, and rename or copy items.
//!
//! This library is a `handler` in the `http` sense: it takes a
//! `http::Request`, maps it onto a directory tree on the local
//! filesystem under a configurable mount point, and produces a
//! `http::Response`. It speaks enough of the protocol that Linux,
//! Windows and macOS can all mount it as a network share: class 1
//! WebDAV plus simulated LOCK/UNLOCK, which is the minimum the
//! Windows and macOS clients insist on before they allow writes.
//!
//! The relevant parts of the HTTP RFCs are implemented as well:
//! conditional requests (If-Match, If-None-Match, If-Modified-Since,
//! If-Unmodified-Since, If-Range) and single-range partial transfers
//! (Range).
//!
//! The handler works with the standard types from the `http` and
//! `http_body` crates, so it plugs straight into http libraries and
//! frameworks built on those types.
//!
//! ## Example.
//!
//! Serve the /tmp directory below the /dav/ prefix:
//!
//! ```no_run
//! use dav_front::{body::Body, DavHandler};
//!
//! #[tokio::main]
//! async fn main() {
//!     let dav = DavHandler::builder("/tmp")
//!         .mount_point("/dav/")
//!         .public(true)
//!         .build();
//!
//!     let req = http::Request::builder()
//!         .method("PROPFIND")
//!         .uri("/dav/")
//!         .header("depth", "1")
//!         .body(Body::empty())
//!         .unwrap();
//!     let resp = dav.handle(req).await;
//!     println!("{}", resp.status());
//! }
//! ```
//!
//! [`Webdav`]: https://tools.ietf.org/html/rfc4918

#[macro_use]
extern crate log;
#[macro_use]
extern crate lazy_static;

mod conditional;
mod davhandler;
mod davheaders;
mod errors;
mod multistatus;
mod util;

pub mod body;
pub mod davpath;
pub mod fs;

pub use crate::davhandler::{DavBuilder, DavHandler};
pub use crate::errors::{DavError, DavResult};
pub use crate::util::DavMethod;
