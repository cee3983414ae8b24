use crate::binding::{MIME_JSON, MIME_XML, MIME_XML2};
use crate::context::{Context, ContextError, ErrorKind};
use crate::cookie::{self, Cookie, SameSite};
use crate::fs::{self, Dir};
use crate::render::{
    self, AsciiJson, Data, IndentedJson, Json, Jsonp, PureJson, Reader, Redirect, Render, SecureJson, SseEvent, Text, Xml,
};
use crate::writer::ResponseWriter;
use bytes::Bytes;
use http::header::{CONTENT_DISPOSITION, HeaderName, SET_COOKIE};
use http::{HeaderValue, StatusCode};
use serde::Serialize;
use std::error::Error as StdError;
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Data offered to [`Context::negotiate`] together with the formats it can
/// be rendered in.
#[derive(Debug)]
pub struct Negotiate<'a, T: ?Sized> {
    pub offered: &'a [&'a str],
    pub data: &'a T,
}

impl Context {
    /// Sets the response status code.
    pub fn status(&mut self, code: StatusCode) {
        self.writer.write_header(code);
    }

    /// Sets a response header; an empty value removes it.
    pub fn header(&mut self, key: &str, value: &str) {
        let Ok(name) = HeaderName::from_bytes(key.as_bytes()) else {
            warn!(key, "ignoring invalid header name");
            return;
        };
        if value.is_empty() {
            self.writer.headers_mut().remove(name);
            return;
        }
        match HeaderValue::from_str(value) {
            Ok(value) => {
                self.writer.headers_mut().insert(name, value);
            }
            Err(_) => warn!(key, "ignoring invalid header value"),
        }
    }

    /// Value of a request header, empty when absent.
    pub fn get_header(&self, key: &str) -> &str {
        self.request_header(key)
    }

    /// SameSite attribute for cookies set afterwards without one.
    pub fn set_same_site(&mut self, same_site: SameSite) {
        self.same_site = Some(same_site);
    }

    /// Appends a `Set-Cookie` header. The path defaults to `/`.
    pub fn set_cookie(&mut self, mut cookie: Cookie) {
        if cookie.path.as_deref().is_none_or(str::is_empty) {
            cookie.path = Some("/".to_string());
        }
        if cookie.same_site.is_none() {
            cookie.same_site = self.same_site;
        }
        match HeaderValue::from_str(&cookie.to_string()) {
            Ok(value) => {
                self.writer.headers_mut().append(SET_COOKIE, value);
            }
            Err(_) => warn!(name = %cookie.name, "ignoring invalid cookie"),
        }
    }

    /// Writes the status, then the rendered body.
    ///
    /// Statuses that forbid a body only get their headers. A failing renderer
    /// records an [`ErrorKind::Render`] error and aborts the chain.
    pub fn render<R: Render>(&mut self, code: StatusCode, r: R) {
        self.render_with(Some(code), r);
    }

    fn render_with<R: Render>(&mut self, code: Option<StatusCode>, r: R) {
        if let Some(code) = code {
            self.status(code);
            if !render::body_allowed_for_status(code) {
                r.write_content_type(&mut self.writer);
                if let Err(e) = self.writer.write_header_now() {
                    debug!(cause = %e, "failed to write response header");
                }
                return;
            }
        }

        if let Err(e) = r.render(&mut self.writer) {
            self.error(e).set_kind(ErrorKind::Render);
            self.abort();
        }
    }

    /// Serializes `data` as JSON with HTML characters escaped.
    pub fn json<T: Serialize + ?Sized>(&mut self, code: StatusCode, data: &T) {
        self.render(code, Json { data });
    }

    /// Pretty printed JSON; costly, meant for debugging.
    pub fn indented_json<T: Serialize + ?Sized>(&mut self, code: StatusCode, data: &T) {
        self.render(code, IndentedJson { data });
    }

    /// JSON whose arrays get the configured prefix, see
    /// [`EngineConfig::secure_json_prefix`](crate::config::EngineConfig::secure_json_prefix).
    pub fn secure_json<T: Serialize + ?Sized>(&mut self, code: StatusCode, data: &T) {
        let config = Arc::clone(&self.config);
        self.render(code, SecureJson { prefix: &config.secure_json_prefix, data });
    }

    /// JSON wrapped in the function named by the `callback` query parameter;
    /// plain JSON without one.
    pub fn jsonp<T: Serialize + ?Sized>(&mut self, code: StatusCode, data: &T) {
        let callback = self.query("callback");
        if callback.is_empty() {
            self.render(code, Json { data });
        } else {
            self.render(code, Jsonp { callback: &callback, data });
        }
    }

    pub fn ascii_json<T: Serialize + ?Sized>(&mut self, code: StatusCode, data: &T) {
        self.render(code, AsciiJson { data });
    }

    /// JSON with `<`, `>` and `&` left literal.
    pub fn pure_json<T: Serialize + ?Sized>(&mut self, code: StatusCode, data: &T) {
        self.render(code, PureJson { data });
    }

    pub fn xml<T: Serialize + ?Sized>(&mut self, code: StatusCode, data: &T) {
        self.render(code, Xml { data });
    }

    /// Writes text; use `format_args!` for formatted output.
    pub fn string(&mut self, code: StatusCode, data: impl fmt::Display) {
        self.render(code, Text { data });
    }

    pub fn data(&mut self, code: StatusCode, content_type: &str, data: impl Into<Bytes>) {
        self.render(code, Data { content_type, data: data.into() });
    }

    /// Copies `reader` into the response.
    pub fn data_from_reader<R: Read>(
        &mut self,
        code: StatusCode,
        content_length: Option<u64>,
        content_type: &str,
        reader: R,
        extra_headers: &[(&str, &str)],
    ) {
        self.render(code, Reader { content_type, content_length, headers: extra_headers, reader });
    }

    /// Redirects to `location` with a 3xx status (or 201).
    pub fn redirect(&mut self, code: StatusCode, location: &str) {
        let request = Arc::clone(&self.request);
        self.render_with(None, Redirect { code, method: request.method(), location });
    }

    /// Writes one server-sent event; strings are sent as they are, other
    /// values as JSON.
    pub fn sse_event<T: Serialize + ?Sized>(&mut self, name: &str, data: &T) {
        match SseEvent::json(data) {
            Ok(event) => self.render_with(None, event.event(name)),
            Err(e) => {
                self.error(e).set_kind(ErrorKind::Render);
                self.abort();
            }
        }
    }

    /// Calls `step` until it returns false, flushing after every call.
    ///
    /// Returns true when the client went away in the middle of the stream.
    pub fn stream<F>(&mut self, mut step: F) -> bool
    where
        F: FnMut(&mut ResponseWriter) -> bool,
    {
        loop {
            let keep_open = step(&mut self.writer);
            if let Err(e) = self.writer.flush() {
                debug!(cause = %e, "client went away while streaming");
                return true;
            }
            if !keep_open {
                return false;
            }
        }
    }

    /// Serves a file from the local file system.
    pub fn file(&mut self, path: impl AsRef<Path>) {
        fs::serve_file(self, path.as_ref());
    }

    /// Serves `filepath` from `dir`, as a file server mounted on `dir` would.
    pub fn file_from_fs(&mut self, filepath: &str, dir: &Dir) {
        fs::serve_from_dir(self, filepath, dir);
    }

    /// Serves a file as a download named `filename`.
    pub fn file_attachment(&mut self, path: impl AsRef<Path>, filename: &str) {
        let disposition = if filename.is_ascii() {
            format!("attachment; filename=\"{}\"", filename.replace('\\', "\\\\").replace('"', "\\\""))
        } else {
            format!("attachment; filename*=UTF-8''{}", cookie::query_escape(filename))
        };
        match HeaderValue::from_str(&disposition) {
            Ok(value) => {
                self.writer.headers_mut().insert(CONTENT_DISPOSITION, value);
            }
            Err(_) => warn!(filename, "ignoring invalid attachment name"),
        }
        fs::serve_file(self, path.as_ref());
    }

    /// Renders `config.data` in the format preferred by the client.
    ///
    /// Aborts with 406 when none of the offered formats is accepted.
    pub fn negotiate<T: Serialize + ?Sized>(&mut self, code: StatusCode, config: Negotiate<'_, T>) {
        match self.negotiate_format(config.offered) {
            Some(MIME_JSON) => self.json(code, config.data),
            Some(MIME_XML | MIME_XML2) => self.xml(code, config.data),
            _ => {
                self.abort_with_error(StatusCode::NOT_ACCEPTABLE, "the accepted formats are not offered by the server");
            }
        }
    }

    /// Aborts the chain and commits `code` with an empty body.
    pub fn abort_with_status(&mut self, code: StatusCode) {
        self.status(code);
        if let Err(e) = self.writer.write_header_now() {
            debug!(cause = %e, "failed to write response header");
        }
        self.abort();
    }

    /// Aborts the chain and writes `data` as JSON.
    pub fn abort_with_status_json<T: Serialize + ?Sized>(&mut self, code: StatusCode, data: &T) {
        self.abort();
        self.json(code, data);
    }

    pub fn abort_with_status_pure_json<T: Serialize + ?Sized>(&mut self, code: StatusCode, data: &T) {
        self.abort();
        self.pure_json(code, data);
    }

    /// Aborts with `code` and records `err`, returning it for decoration.
    pub fn abort_with_error<E>(&mut self, code: StatusCode, err: E) -> &mut ContextError
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        self.abort_with_status(code);
        self.error(err)
    }
}
