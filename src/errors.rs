//
// The error type of the handler, and the errno -> HTTP status taxonomy
// shared by every method handler.
//
use std::error::Error;
use std::fmt;
use std::io;

use http::StatusCode;

#[derive(Debug)]
pub enum DavError {
    /// Terminal response with this status.
    Status(StatusCode),
    /// Same, but the connection cannot be re-used (body partially read).
    StatusClose(StatusCode),
    /// HTTP method not recognized at all.
    UnknownDavMethod,
    /// Request body was not well-formed XML.
    XmlParseError,
    /// Filesystem failure, translated via `io_status()`.
    IoError(io::Error),
}

pub type DavResult<T> = Result<T, DavError>;

/// Map an OS-level failure to a protocol status.
///
/// Precondition and range failures (304/412/416) are valid protocol
/// outcomes with their own fixed statuses and never go through this table.
pub(crate) fn io_status(e: &io::Error) -> StatusCode {
    match e.raw_os_error() {
        Some(libc::ENOENT) | Some(libc::ENOTDIR) => StatusCode::NOT_FOUND,
        Some(libc::EACCES) | Some(libc::EPERM) | Some(libc::EROFS) => StatusCode::FORBIDDEN,
        Some(libc::ENAMETOOLONG) => StatusCode::URI_TOO_LONG,
        Some(libc::ENOSPC) => StatusCode::INSUFFICIENT_STORAGE,
        Some(libc::ENOTEMPTY) | Some(libc::EBUSY) => StatusCode::FAILED_DEPENDENCY,
        Some(libc::EINVAL) => StatusCode::BAD_REQUEST,
        Some(libc::EEXIST) | Some(libc::EISDIR) => StatusCode::CONFLICT,
        Some(_) => StatusCode::INTERNAL_SERVER_ERROR,
        None => match e.kind() {
            io::ErrorKind::NotFound => StatusCode::NOT_FOUND,
            io::ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
            io::ErrorKind::AlreadyExists => StatusCode::CONFLICT,
            io::ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        },
    }
}

impl DavError {
    pub fn statuscode(&self) -> StatusCode {
        match self {
            DavError::Status(code) => *code,
            DavError::StatusClose(code) => *code,
            DavError::UnknownDavMethod => StatusCode::METHOD_NOT_ALLOWED,
            DavError::XmlParseError => StatusCode::BAD_REQUEST,
            DavError::IoError(e) => io_status(e),
        }
    }

    pub fn must_close(&self) -> bool {
        matches!(self, DavError::StatusClose(_))
    }
}

impl fmt::Display for DavError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DavError::Status(code) => write!(f, "{code}"),
            DavError::StatusClose(code) => write!(f, "{code} (close)"),
            DavError::UnknownDavMethod => write!(f, "unknown HTTP method"),
            DavError::XmlParseError => write!(f, "XML parse error"),
            DavError::IoError(e) => write!(f, "{e}"),
        }
    }
}

impl Error for DavError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DavError::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StatusCode> for DavError {
    fn from(code: StatusCode) -> Self {
        DavError::Status(code)
    }
}

impl From<io::Error> for DavError {
    fn from(e: io::Error) -> Self {
        DavError::IoError(e)
    }
}

impl From<xml::reader::Error> for DavError {
    fn from(_: xml::reader::Error) -> Self {
        DavError::XmlParseError
    }
}

impl From<xml::writer::Error> for DavError {
    fn from(e: xml::writer::Error) -> Self {
        match e {
            xml::writer::Error::Io(e) => DavError::IoError(e),
            _ => DavError::Status(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn os(errno: i32) -> io::Error {
        io::Error::from_raw_os_error(errno)
    }

    #[test]
    fn test_errno_taxonomy() {
        assert_eq!(io_status(&os(libc::ENOENT)), StatusCode::NOT_FOUND);
        assert_eq!(io_status(&os(libc::ENOTDIR)), StatusCode::NOT_FOUND);
        assert_eq!(io_status(&os(libc::EACCES)), StatusCode::FORBIDDEN);
        assert_eq!(io_status(&os(libc::EROFS)), StatusCode::FORBIDDEN);
        assert_eq!(io_status(&os(libc::ENAMETOOLONG)), StatusCode::URI_TOO_LONG);
        assert_eq!(io_status(&os(libc::ENOSPC)), StatusCode::INSUFFICIENT_STORAGE);
        assert_eq!(io_status(&os(libc::ENOTEMPTY)), StatusCode::FAILED_DEPENDENCY);
        assert_eq!(io_status(&os(libc::EBUSY)), StatusCode::FAILED_DEPENDENCY);
        assert_eq!(io_status(&os(libc::EINVAL)), StatusCode::BAD_REQUEST);
        assert_eq!(io_status(&os(libc::EEXIST)), StatusCode::CONFLICT);
        assert_eq!(io_status(&os(libc::EISDIR)), StatusCode::CONFLICT);
        assert_eq!(io_status(&os(libc::EIO)), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
