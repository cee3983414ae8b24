//! Response writer wrapper.
//!
//! Handlers write through a [`ResponseWriter`], which holds the status code
//! and headers until the first body byte (or an explicit
//! [`ResponseWriter::write_header_now`]) and only then hands them to the
//! underlying [`ResponseSink`].

use bytes::{Bytes, BytesMut};
use http::{HeaderMap, HeaderValue, StatusCode};
use parking_lot::Mutex;
use std::fmt;
use std::io;
use std::sync::Arc;
use tracing::warn;

const NO_WRITTEN: i64 = -1;

/// Destination of a response: whatever actually talks to the client.
#[cfg_attr(test, mockall::automock)]
pub trait ResponseSink: Send {
    /// Commits the status line and headers. Called at most once.
    fn send_head(&mut self, status: StatusCode, headers: HeaderMap) -> io::Result<()>;

    fn send_chunk(&mut self, chunk: Bytes) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()>;
}

pub struct ResponseWriter {
    sink: Option<Box<dyn ResponseSink>>,
    status: StatusCode,
    headers: HeaderMap,
    size: i64,
}

impl ResponseWriter {
    pub(crate) fn new() -> Self {
        Self { sink: None, status: StatusCode::OK, headers: HeaderMap::new(), size: NO_WRITTEN }
    }

    pub(crate) fn reset(&mut self, sink: Option<Box<dyn ResponseSink>>) {
        self.sink = sink;
        self.status = StatusCode::OK;
        self.headers.clear();
        self.size = NO_WRITTEN;
    }

    /// A writer for a detached context: same pending state, no sink.
    pub(crate) fn detached(&self) -> Self {
        Self { sink: None, status: self.status, headers: self.headers.clone(), size: self.size }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Number of body bytes written, or -1 while the header is not committed.
    pub fn size(&self) -> i64 {
        self.size
    }

    /// Whether the status and headers were already sent.
    pub fn written(&self) -> bool {
        self.size != NO_WRITTEN
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Headers can be changed until the response is committed; later changes
    /// never reach the client.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub(crate) fn has_content_type(&self) -> bool {
        self.headers.contains_key(http::header::CONTENT_TYPE)
    }

    /// Sets `Content-Type` unless the handler already chose one.
    pub(crate) fn set_content_type(&mut self, value: HeaderValue) {
        if !self.has_content_type() {
            self.headers.insert(http::header::CONTENT_TYPE, value);
        }
    }

    /// Sets the pending status code. Ignored once the header is committed.
    pub fn write_header(&mut self, status: StatusCode) {
        if self.status == status {
            return;
        }
        if self.written() {
            warn!(current = %self.status, wanted = %status, "headers were already written, status code can not be overridden");
            return;
        }
        self.status = status;
    }

    /// Commits status and headers if not done yet.
    pub fn write_header_now(&mut self) -> io::Result<()> {
        if self.written() {
            return Ok(());
        }
        self.size = 0;
        let status = self.status;
        let headers = self.headers.clone();
        self.sink_mut()?.send_head(status, headers)
    }

    pub fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.write_bytes(Bytes::copy_from_slice(data))
    }

    pub fn write_string(&mut self, s: &str) -> io::Result<usize> {
        self.write(s.as_bytes())
    }

    pub fn write_bytes(&mut self, data: Bytes) -> io::Result<usize> {
        self.write_header_now()?;
        let n = data.len();
        if n == 0 {
            return Ok(0);
        }
        self.sink_mut()?.send_chunk(data)?;
        self.size += i64::try_from(n).unwrap_or(i64::MAX);
        Ok(n)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.write_header_now()?;
        self.sink_mut()?.flush()
    }

    fn sink_mut(&mut self) -> io::Result<&mut Box<dyn ResponseSink>> {
        self.sink.as_mut().ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "response writer is detached"))
    }
}

impl io::Write for ResponseWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        ResponseWriter::write(self, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        ResponseWriter::flush(self)
    }
}

impl fmt::Debug for ResponseWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseWriter")
            .field("status", &self.status)
            .field("size", &self.size)
            .field("attached", &self.sink.is_some())
            .finish()
    }
}

/// In-memory response capture.
///
/// Cloning a recorder shares the captured state, so one handle can be given
/// to the engine (through [`Recorder::sink`]) while another inspects it.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    inner: Arc<Mutex<Recorded>>,
}

#[derive(Debug, Default)]
struct Recorded {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: BytesMut,
    flushed: bool,
}

struct RecorderSink {
    inner: Arc<Mutex<Recorded>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sink(&self) -> Box<dyn ResponseSink> {
        Box::new(RecorderSink { inner: Arc::clone(&self.inner) })
    }

    /// The committed status, 200 when nothing was committed.
    pub fn status(&self) -> StatusCode {
        self.inner.lock().status.unwrap_or(StatusCode::OK)
    }

    pub fn committed(&self) -> bool {
        self.inner.lock().status.is_some()
    }

    pub fn headers(&self) -> HeaderMap {
        self.inner.lock().headers.clone()
    }

    pub fn header(&self, name: &str) -> Option<String> {
        self.inner.lock().headers.get(name).and_then(|value| value.to_str().ok()).map(str::to_string)
    }

    pub fn body(&self) -> Bytes {
        Bytes::copy_from_slice(&self.inner.lock().body)
    }

    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.inner.lock().body).into_owned()
    }

    pub fn flushed(&self) -> bool {
        self.inner.lock().flushed
    }
}

impl ResponseSink for RecorderSink {
    fn send_head(&mut self, status: StatusCode, headers: HeaderMap) -> io::Result<()> {
        let mut recorded = self.inner.lock();
        recorded.status = Some(status);
        recorded.headers = headers;
        Ok(())
    }

    fn send_chunk(&mut self, chunk: Bytes) -> io::Result<()> {
        self.inner.lock().body.extend_from_slice(&chunk);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.lock().flushed = true;
        Ok(())
    }
}
