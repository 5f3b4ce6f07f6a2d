//! Local filesystem backend.
//!
//! A [`Resource`] is a point-in-time snapshot of "the thing at a mapped
//! path": it is constructed once per request by [`LocalFs::map`] and
//! consumed read-only by the method handlers.

use std::io;
#[cfg(unix)]
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use http::StatusCode;

use crate::davpath::DavPath;
use crate::errors::io_status;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    File,
    Directory,
    Other,
}

/// Stat snapshot of an existing filesystem entity.
#[derive(Debug, Clone)]
pub struct Stat {
    pub kind: FileKind,
    pub len: u64,
    pub modified: SystemTime,
    pub accessed: SystemTime,
    dev: u64,
    ino: u64,
    mtime_sec: i64,
    mtime_nsec: u32,
}

impl Stat {
    pub(crate) fn from_metadata(meta: &std::fs::Metadata) -> Stat {
        let kind = if meta.is_file() {
            FileKind::File
        } else if meta.is_dir() {
            FileKind::Directory
        } else {
            FileKind::Other
        };
        #[cfg(unix)]
        let (dev, ino, mtime_sec, mtime_nsec) =
            (meta.dev(), meta.ino(), meta.mtime(), meta.mtime_nsec() as u32);
        #[cfg(not(unix))]
        let (dev, ino, mtime_sec, mtime_nsec) = {
            let t = meta
                .modified()
                .ok()
                .and_then(|m| m.duration_since(UNIX_EPOCH).ok())
                .unwrap_or_default();
            (0, 0, t.as_secs() as i64, t.subsec_nanos())
        };
        Stat {
            kind,
            len: meta.len(),
            modified: meta.modified().unwrap_or(UNIX_EPOCH),
            accessed: meta.accessed().unwrap_or(UNIX_EPOCH),
            dev,
            ino,
            mtime_sec,
            mtime_nsec,
        }
    }

    pub fn is_file(&self) -> bool {
        self.kind == FileKind::File
    }

    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }

    pub fn etag(&self) -> String {
        make_etag(self.dev, self.ino, self.mtime_sec, self.mtime_nsec)
    }

    #[cfg(test)]
    pub(crate) fn synthetic(len: u64, mtime_sec: i64) -> Stat {
        Stat {
            kind: FileKind::File,
            len,
            modified: UNIX_EPOCH + Duration::from_secs(mtime_sec as u64),
            accessed: UNIX_EPOCH,
            dev: 1,
            ino: 42,
            mtime_sec,
            mtime_nsec: 0,
        }
    }

    /// Modification time truncated to whole seconds, the precision of an
    /// HTTP-date. Used by the If-Range exact-match rule.
    pub fn modified_sec(&self) -> SystemTime {
        if self.mtime_sec >= 0 {
            UNIX_EPOCH + Duration::from_secs(self.mtime_sec as u64)
        } else {
            UNIX_EPOCH
        }
    }
}

/// Build the opaque entity tag from the resource identity triple.
///
/// Stable across requests for an unchanged file; changes whenever the
/// device, the inode or the modification time changes.
pub fn make_etag(dev: u64, ino: u64, mtime_sec: i64, mtime_nsec: u32) -> String {
    let mtime = (mtime_sec as u64)
        .wrapping_mul(1_000_000_000)
        .wrapping_add(mtime_nsec as u64);
    format!("\"{dev:x}-{ino:x}-{mtime:x}\"")
}

/// A mapped filesystem entity.
#[derive(Debug)]
pub struct Resource {
    path: PathBuf,
    stat: Option<Stat>,
    /// Set only when the lookup failed for a reason other than
    /// "does not exist" (e.g. permission denied).
    error: Option<io::Error>,
}

impl Resource {
    pub fn exists(&self) -> bool {
        self.stat.is_some()
    }

    pub fn is_dir(&self) -> bool {
        self.stat.as_ref().map(Stat::is_dir).unwrap_or(false)
    }

    pub fn is_file(&self) -> bool {
        self.stat.as_ref().map(Stat::is_file).unwrap_or(false)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn stat(&self) -> Option<&Stat> {
        self.stat.as_ref()
    }

    /// The status describing why this resource is unusable: the mapped
    /// lookup error, or plain 404.
    pub fn error_status(&self) -> StatusCode {
        match &self.error {
            Some(e) => io_status(e),
            None => StatusCode::NOT_FOUND,
        }
    }
}

/// Serves a directory on the local filesystem.
///
/// If `public` is true, created files and directories are world-readable
/// (mode 644/755), otherwise private (600/700). Umask still applies.
pub struct LocalFs {
    root: PathBuf,
    public: bool,
}

impl LocalFs {
    pub fn new(root: impl Into<PathBuf>, public: bool) -> LocalFs {
        LocalFs {
            root: root.into(),
            public,
        }
    }

    fn abs_path(&self, path: &DavPath) -> PathBuf {
        if path.rel().is_empty() {
            self.root.clone()
        } else {
            self.root.join(path.rel())
        }
    }

    /// Map a validated request path to a [`Resource`], performing the
    /// one stat of the request.
    pub async fn map(&self, path: &DavPath) -> Resource {
        let path = self.abs_path(path);
        match tokio::fs::metadata(&path).await {
            Ok(meta) => Resource {
                path,
                stat: Some(Stat::from_metadata(&meta)),
                error: None,
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => Resource {
                path,
                stat: None,
                error: None,
            },
            Err(e) => Resource {
                path,
                stat: None,
                error: Some(e),
            },
        }
    }

    pub(crate) fn file_mode(&self) -> u32 {
        if self.public {
            0o644
        } else {
            0o600
        }
    }

    pub(crate) async fn create_dir(&self, path: &Path) -> io::Result<()> {
        trace!("FS: create_dir {path:?}");
        #[allow(unused_mut)]
        let mut dir = tokio::fs::DirBuilder::new();
        #[cfg(unix)]
        dir.mode(if self.public { 0o755 } else { 0o700 });
        dir.create(path).await
    }

    pub(crate) fn write_options(&self) -> tokio::fs::OpenOptions {
        let mut opt = tokio::fs::OpenOptions::new();
        opt.write(true);
        #[cfg(unix)]
        opt.mode(self.file_mode());
        opt
    }

    /// Recursively remove a file or directory tree. "Already gone" is
    /// success at every level.
    pub(crate) fn remove_tree<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, io::Result<()>> {
        async move {
            trace!("FS: remove_tree {path:?}");
            let meta = match tokio::fs::symlink_metadata(path).await {
                Ok(meta) => meta,
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
                Err(e) => return Err(e),
            };
            if !meta.is_dir() {
                return ignore_not_found(tokio::fs::remove_file(path).await);
            }
            let mut read_dir = tokio::fs::read_dir(path).await?;
            while let Some(entry) = read_dir.next_entry().await? {
                let ft = entry.file_type().await?;
                let sub = entry.path();
                if ft.is_dir() {
                    self.remove_tree(&sub).await?;
                } else {
                    ignore_not_found(tokio::fs::remove_file(&sub).await)?;
                }
            }
            ignore_not_found(tokio::fs::remove_dir(path).await)
        }
        .boxed()
    }

    /// Recursively copy a directory tree. Entries on a different device
    /// than `src_dev` are skipped: a tree copy never silently crosses a
    /// mount boundary.
    pub(crate) fn copy_tree<'a>(
        &'a self,
        from: &'a Path,
        to: &'a Path,
        src_dev: u64,
    ) -> BoxFuture<'a, io::Result<()>> {
        async move {
            trace!("FS: copy_tree {from:?} {to:?}");
            match self.create_dir(to).await {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
                Err(e) => return Err(e),
            }
            let mut read_dir = tokio::fs::read_dir(from).await?;
            while let Some(entry) = read_dir.next_entry().await? {
                let meta = entry.metadata().await?;
                if device_of(&meta) != src_dev {
                    debug!("copy_tree: skipping {:?} on foreign device", entry.path());
                    continue;
                }
                let sub_from = entry.path();
                let sub_to = to.join(entry.file_name());
                if meta.is_dir() {
                    self.copy_tree(&sub_from, &sub_to, src_dev).await?;
                } else if meta.is_file() {
                    tokio::fs::copy(&sub_from, &sub_to).await?;
                }
            }
            Ok(())
        }
        .boxed()
    }
}

#[cfg(unix)]
pub(crate) fn device_of(meta: &std::fs::Metadata) -> u64 {
    meta.dev()
}

#[cfg(not(unix))]
pub(crate) fn device_of(_meta: &std::fs::Metadata) -> u64 {
    0
}

fn ignore_not_found(r: io::Result<()>) -> io::Result<()> {
    match r {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
