//! Static file serving.
//!
//! Files are streamed from disk with a guessed content type. `Last-Modified`
//! and `If-Modified-Since` are honored, directories resolve to their
//! `index.html`, and request paths climbing with `..` are rejected.

use crate::context::Context;
use crate::handler::Handler;
use crate::path::clean_path;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, IF_MODIFIED_SINCE, LAST_MODIFIED, LOCATION, X_CONTENT_TYPE_OPTIONS};
use http::{HeaderValue, Method, StatusCode};
use std::fs::{self, File, Metadata};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

const INDEX_PAGE: &str = "index.html";

/// A directory tree served read-only. Names are cleaned before they are
/// joined to the root, so they never resolve outside of it.
#[derive(Debug, Clone)]
pub struct Dir {
    root: PathBuf,
}

impl Dir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The local path of `name`, a slash separated path relative to the root.
    pub fn resolve(&self, name: &str) -> PathBuf {
        let cleaned = clean_path(&format!("/{name}"));
        self.root.join(cleaned.trim_start_matches('/'))
    }
}

/// Serves the single file (or directory index) at `path`.
pub(crate) fn serve_file(ctx: &mut Context, path: &Path) {
    let url = ctx.path().to_string();
    if contains_dot_dot(&url) {
        write_error(ctx, StatusCode::BAD_REQUEST, "invalid URL path");
        return;
    }
    serve(ctx, path, &url, false);
}

/// Serves `filepath` out of `dir` as if the request path were `filepath`.
pub(crate) fn serve_from_dir(ctx: &mut Context, filepath: &str, dir: &Dir) {
    let url = clean_path(filepath);
    serve(ctx, &dir.resolve(&url), &url, true);
}

/// Handler behind [`RouterGroup::static_dir`](crate::router::RouterGroup::static_dir).
///
/// Unknown files hand the request to the engine's no-route chain.
pub(crate) fn static_handler(dir: Dir) -> impl Handler {
    move |ctx: &mut Context| {
        let url = clean_path(ctx.param("filepath"));
        let path = dir.resolve(&url);
        if fs::metadata(&path).is_err() {
            ctx.status(StatusCode::NOT_FOUND);
            ctx.handlers = ctx.no_route.clone();
            // next() moves the index onto the first no-route handler
            ctx.index = -1;
            return;
        }
        serve(ctx, &path, &url, true);
    }
}

fn contains_dot_dot(url: &str) -> bool {
    url.contains("..") && url.split(['/', '\\']).any(|segment| segment == "..")
}

fn serve(ctx: &mut Context, path: &Path, url: &str, redirect: bool) {
    if redirect && url.ends_with("/index.html") {
        local_redirect(ctx, "./");
        return;
    }

    let meta = match fs::metadata(path) {
        Ok(meta) => meta,
        Err(e) => {
            write_io_error(ctx, &e);
            return;
        }
    };

    let (path, meta) = if meta.is_dir() {
        if !url.ends_with('/') {
            let base = url.rsplit('/').next().unwrap_or_default();
            local_redirect(ctx, &format!("{base}/"));
            return;
        }
        let index = path.join(INDEX_PAGE);
        match fs::metadata(&index) {
            Ok(meta) if meta.is_file() => (index, meta),
            // no directory listings
            _ => {
                write_error(ctx, StatusCode::NOT_FOUND, "404 page not found");
                return;
            }
        }
    } else {
        (path.to_path_buf(), meta)
    };

    if not_modified(ctx, &meta) {
        let headers = ctx.writer.headers_mut();
        headers.remove(CONTENT_TYPE);
        headers.remove(CONTENT_LENGTH);
        ctx.status(StatusCode::NOT_MODIFIED);
        if let Err(e) = ctx.writer.write_header_now() {
            debug!(cause = %e, "failed to write response header");
        }
        return;
    }

    let mut file = match File::open(&path) {
        Ok(file) => file,
        Err(e) => {
            write_io_error(ctx, &e);
            return;
        }
    };

    let headers = ctx.writer.headers_mut();
    if let Some(modified) = meta.modified().ok().filter(|time| *time > UNIX_EPOCH)
        && let Ok(value) = HeaderValue::from_str(&httpdate::fmt_http_date(modified))
    {
        headers.insert(LAST_MODIFIED, value);
    }
    if !headers.contains_key(CONTENT_TYPE) {
        headers.insert(CONTENT_TYPE, content_type(&path));
    }
    headers.insert(CONTENT_LENGTH, HeaderValue::from(meta.len()));

    if ctx.method() == Method::HEAD {
        if let Err(e) = ctx.writer.write_header_now() {
            debug!(cause = %e, "failed to write response header");
        }
        return;
    }

    if let Err(e) = io::copy(&mut file, &mut ctx.writer) {
        debug!(path = %path.display(), cause = %e, "failed to send file");
    }
}

fn content_type(path: &Path) -> HeaderValue {
    let Some(mime) = mime_guess::from_path(path).first() else {
        return HeaderValue::from_static("application/octet-stream");
    };
    let value = if mime.type_() == mime::TEXT || mime.subtype() == mime::JAVASCRIPT {
        format!("{}; charset=utf-8", mime.essence_str())
    } else {
        mime.essence_str().to_string()
    };
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"))
}

/// Whether the client copy is at least as new as `meta`, to the second.
fn not_modified(ctx: &Context, meta: &Metadata) -> bool {
    if ctx.method() != Method::GET && ctx.method() != Method::HEAD {
        return false;
    }
    let Some(since) = ctx.headers().get(IF_MODIFIED_SINCE).and_then(|value| value.to_str().ok()) else {
        return false;
    };
    let (Ok(since), Ok(modified)) = (httpdate::parse_http_date(since), meta.modified()) else {
        return false;
    };
    secs(modified) <= secs(since)
}

fn secs(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or_default()
}

fn local_redirect(ctx: &mut Context, target: &str) {
    let target = match ctx.uri().query() {
        Some(query) if !query.is_empty() => format!("{target}?{query}"),
        _ => target.to_string(),
    };
    match HeaderValue::from_str(&target) {
        Ok(value) => {
            ctx.writer.headers_mut().insert(LOCATION, value);
            ctx.abort_with_status(StatusCode::MOVED_PERMANENTLY);
        }
        Err(_) => write_error(ctx, StatusCode::BAD_REQUEST, "invalid URL path"),
    }
}

fn write_io_error(ctx: &mut Context, e: &io::Error) {
    match e.kind() {
        ErrorKind::NotFound => write_error(ctx, StatusCode::NOT_FOUND, "404 page not found"),
        ErrorKind::PermissionDenied => write_error(ctx, StatusCode::FORBIDDEN, "403 Forbidden"),
        _ => {
            debug!(cause = %e, "failed to open file");
            write_error(ctx, StatusCode::INTERNAL_SERVER_ERROR, "500 Internal Server Error");
        }
    }
}

fn write_error(ctx: &mut Context, code: StatusCode, message: &str) {
    let headers = ctx.writer.headers_mut();
    headers.remove(LAST_MODIFIED);
    headers.remove(CONTENT_LENGTH);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    ctx.string(code, format_args!("{message}\n"));
}
