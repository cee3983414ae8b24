//! Error types surfaced by route registration, binding, rendering and the server.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Failure while registering a route; fatal at boot by convention.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("path must begin with '/' in path '{path}'")]
    PathMustBeginWithSlash { path: String },

    #[error("there must be at least one handler for path '{path}'")]
    NoHandlers { path: String },

    #[error("too many handlers: {count}, the chain is limited to {max}")]
    TooManyHandlers { count: usize, max: usize },

    #[error("wildcards must be named with a non-empty name in path '{path}'")]
    EmptyWildcardName { path: String },

    #[error("only one wildcard per path segment is allowed, has: '{segment}' in path '{path}'")]
    MultipleWildcards { segment: String, path: String },

    #[error("catch-all routes are only allowed at the end of the path in path '{path}'")]
    CatchAllNotAtEnd { path: String },

    #[error("no / before catch-all in path '{path}'")]
    NoSlashBeforeCatchAll { path: String },

    #[error("'{segment}' in new path '{path}' conflicts with existing wildcard '{wildcard}' in existing prefix '{prefix}'")]
    Conflict { segment: String, path: String, wildcard: String, prefix: String },

    #[error("catch-all wildcard '{segment}' in new path '{path}' conflicts with existing path segment '{existing}' in existing prefix '{prefix}'")]
    CatchAllConflict { segment: String, path: String, existing: String, prefix: String },

    #[error("handlers are already registered for path '{path}'")]
    DuplicateRoute { path: String },

    #[error("URL parameters can not be used when serving a static file or folder: '{path}'")]
    WildcardInStaticPath { path: String },
}

impl RouteError {
    pub(crate) fn conflict<S: ToString>(segment: S, path: S, wildcard: S, prefix: S) -> Self {
        Self::Conflict {
            segment: segment.to_string(),
            path: path.to_string(),
            wildcard: wildcard.to_string(),
            prefix: prefix.to_string(),
        }
    }
}

/// Failure while decoding a request into a target value.
#[derive(Error, Debug)]
pub enum BindError {
    #[error("invalid request: the body is empty")]
    EmptyBody,

    #[error("json: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    #[error("xml: {source}")]
    Xml {
        #[from]
        source: quick_xml::DeError,
    },

    /// Malformed URL-encoded body or query string.
    #[error("form: {source}")]
    Form {
        #[from]
        source: serde_urlencoded::de::Error,
    },

    /// Flattened pairs (query, form, headers or URI parameters) did not
    /// fit the target type.
    #[error("query: {source}")]
    Query {
        #[from]
        source: serde_qs::Error,
    },

    #[error("multipart: {message}")]
    Multipart { message: String },

    #[error("{message}")]
    Validation { message: String },

    #[error("io: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl BindError {
    pub fn validation<S: ToString>(message: S) -> Self {
        Self::Validation { message: message.to_string() }
    }

    pub(crate) fn multipart<S: ToString>(message: S) -> Self {
        Self::Multipart { message: message.to_string() }
    }
}

impl From<multer::Error> for BindError {
    fn from(e: multer::Error) -> Self {
        BindError::multipart(e)
    }
}

/// Failure while writing a response body.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("json: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    #[error("xml: {source}")]
    Xml {
        #[from]
        source: quick_xml::SeError,
    },

    #[error("io: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    #[error("cannot redirect with status code {code}")]
    InvalidRedirectCode { code: u16 },

    #[error("invalid header value for '{name}'")]
    InvalidHeader { name: &'static str },
}

/// Failure while parsing the trusted proxy list.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid trusted proxy '{value}'")]
pub struct ProxyError {
    pub value: String,
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind { addr: SocketAddr, source: io::Error },

    #[error("address must resolve to at least one socket address")]
    MissingAddress,

    #[error("in-flight requests did not finish within {timeout:?}")]
    ShutdownTimeout { timeout: Duration },

    #[error("server task failed: {message}")]
    Task { message: String },
}
