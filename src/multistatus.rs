//! Streaming builder for the WebDAV multistatus/propstat XML vocabulary.
//!
//! A thin layer over `xml-rs`'s `EventWriter`: the emitter escapes all
//! character data and keeps elements balanced, and the accumulated
//! output can be taken out incrementally as [`Bytes`] chunks so a large
//! PROPFIND response is never held in memory as one document.

use std::io;

use bytes::Bytes;
use http::StatusCode;
use xml::writer::{EmitterConfig, EventWriter, XmlEvent};

use crate::util::MemBuffer;

pub(crate) struct XmlWriter {
    w: EventWriter<MemBuffer>,
}

fn werr(e: xml::writer::Error) -> io::Error {
    match e {
        xml::writer::Error::Io(e) => e,
        other => io::Error::new(io::ErrorKind::InvalidData, other.to_string()),
    }
}

impl XmlWriter {
    pub fn new() -> XmlWriter {
        let w = EmitterConfig::new()
            .write_document_declaration(true)
            .perform_indent(false)
            .create_writer(MemBuffer::new());
        XmlWriter { w }
    }

    /// Take the output accumulated so far.
    pub fn take(&mut self) -> Bytes {
        self.w.inner_mut().take()
    }

    pub fn open(&mut self, name: &str) -> io::Result<()> {
        self.w.write(XmlEvent::start_element(name)).map_err(werr)
    }

    /// Open an element carrying a namespace declaration.
    pub fn open_ns(&mut self, name: &str, prefix: &str, uri: &str) -> io::Result<()> {
        self.w
            .write(XmlEvent::start_element(name).ns(prefix, uri))
            .map_err(werr)
    }

    pub fn close(&mut self) -> io::Result<()> {
        self.w.write(XmlEvent::end_element()).map_err(werr)
    }

    pub fn empty(&mut self, name: &str) -> io::Result<()> {
        self.open(name)?;
        self.close()
    }

    /// An empty element for a `"namespace|localname"` property key,
    /// serialized with a synthesized `X:` prefix bound to the namespace.
    pub fn empty_prop(&mut self, key: &str) -> io::Result<()> {
        let (ns, local) = key.split_once('|').unwrap_or(("DAV:", key));
        self.open_ns(&format!("X:{local}"), "X", ns)?;
        self.close()
    }

    pub fn text_element(&mut self, name: &str, value: &str) -> io::Result<()> {
        self.open(name)?;
        self.w.write(XmlEvent::characters(value)).map_err(werr)?;
        self.close()
    }

    pub fn begin_multistatus(&mut self) -> io::Result<()> {
        self.open_ns("D:multistatus", "D", "DAV:")
    }

    pub fn end_multistatus(&mut self) -> io::Result<()> {
        self.close()
    }

    pub fn href(&mut self, uri: &str) -> io::Result<()> {
        self.text_element("D:href", uri)
    }

    pub fn resourcetype_collection(&mut self) -> io::Result<()> {
        self.open("D:resourcetype")?;
        self.empty("D:collection")?;
        self.close()
    }

    /// `<D:response><D:href>..</D:href><D:propstat><D:status>..</D:status><D:prop>`
    pub fn open_response_prop(&mut self, uri: &str, status: StatusCode) -> io::Result<()> {
        self.open("D:response")?;
        self.href(uri)?;
        self.open("D:propstat")?;
        self.text_element("D:status", &status_line(status))?;
        self.open("D:prop")
    }

    pub fn close_response_prop(&mut self) -> io::Result<()> {
        self.close()?; // D:prop
        self.close()?; // D:propstat
        self.close() // D:response
    }
}

pub(crate) fn status_line(status: StatusCode) -> String {
    format!(
        "HTTP/1.1 {} {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("")
    )
}
