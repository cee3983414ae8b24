//! Response renderers.
//!
//! Every renderer knows its content type and how to serialize itself into a
//! [`ResponseWriter`]. The context picks one per response method; there is no
//! registry.

mod json;
mod reader;
mod redirect;
mod sse;
mod text;
mod xml;

pub use json::{AsciiJson, IndentedJson, Json, Jsonp, PureJson, SecureJson};
pub use reader::Reader;
pub use redirect::Redirect;
pub use sse::SseEvent;
pub use text::{Data, Text};
pub use xml::Xml;

pub(crate) use json::is_valid_callback;

use crate::error::RenderError;
use crate::writer::ResponseWriter;
use http::StatusCode;

pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";
pub const ASCII_JSON_CONTENT_TYPE: &str = "application/json";
pub const JSONP_CONTENT_TYPE: &str = "application/javascript; charset=utf-8";
pub const XML_CONTENT_TYPE: &str = "application/xml; charset=utf-8";
pub const PLAIN_CONTENT_TYPE: &str = "text/plain; charset=utf-8";
pub const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";
pub const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream";

pub trait Render {
    /// Writes the content type (if unset) and the serialized body.
    fn render(self, w: &mut ResponseWriter) -> Result<(), RenderError>
    where
        Self: Sized;

    fn write_content_type(&self, w: &mut ResponseWriter);
}

/// Statuses that must not carry a body.
pub(crate) fn body_allowed_for_status(status: StatusCode) -> bool {
    !(status.is_informational() || status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_allowed_for_status() {
        assert!(!body_allowed_for_status(StatusCode::CONTINUE));
        assert!(!body_allowed_for_status(StatusCode::SWITCHING_PROTOCOLS));
        assert!(!body_allowed_for_status(StatusCode::NO_CONTENT));
        assert!(!body_allowed_for_status(StatusCode::NOT_MODIFIED));
        assert!(body_allowed_for_status(StatusCode::OK));
        assert!(body_allowed_for_status(StatusCode::NOT_FOUND));
        assert!(body_allowed_for_status(StatusCode::INTERNAL_SERVER_ERROR));
    }
}
