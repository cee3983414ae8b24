//! Request head shared by a context and its detached copies.

use http::request::Parts;
use http::{Extensions, HeaderMap, Method, Request, Uri, Version};
use std::net::SocketAddr;

/// Peer address of the connection a request arrived on, stored in the
/// request extensions by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteAddr(pub SocketAddr);

/// The request without its body.
///
/// The body is owned by the context so it can be taken exactly once.
#[derive(Debug, Default)]
pub struct RequestHeader {
    head: Request<()>,
}

impl RequestHeader {
    pub fn method(&self) -> &Method {
        self.head.method()
    }

    pub fn uri(&self) -> &Uri {
        self.head.uri()
    }

    pub fn version(&self) -> Version {
        self.head.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.head.headers()
    }

    pub fn extensions(&self) -> &Extensions {
        self.head.extensions()
    }

    /// The peer address, when the server recorded one.
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.extensions().get::<RemoteAddr>().map(|addr| addr.0)
    }

    /// First value of header `key`; empty when absent or not visible ASCII.
    pub fn header_str(&self, key: &str) -> &str {
        self.headers().get(key).and_then(|value| value.to_str().ok()).unwrap_or_default()
    }
}

impl From<Parts> for RequestHeader {
    fn from(parts: Parts) -> Self {
        Self { head: Request::from_parts(parts, ()) }
    }
}
