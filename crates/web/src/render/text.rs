use crate::error::RenderError;
use crate::render::{PLAIN_CONTENT_TYPE, Render};
use crate::writer::ResponseWriter;
use bytes::Bytes;
use http::HeaderValue;
use std::fmt::{self, Write as _};
use tracing::warn;

/// Plain text. Formatted output is produced by passing `format_args!`.
#[derive(Debug)]
pub struct Text<D> {
    pub data: D,
}

impl<D: fmt::Display> Render for Text<D> {
    fn render(self, w: &mut ResponseWriter) -> Result<(), RenderError> {
        self.write_content_type(w);
        let mut body = String::new();
        // writing into a String only fails if Display itself does
        if write!(body, "{}", self.data).is_err() {
            return Err(RenderError::Io { source: std::io::Error::other("formatter error") });
        }
        w.write_bytes(Bytes::from(body))?;
        Ok(())
    }

    fn write_content_type(&self, w: &mut ResponseWriter) {
        w.set_content_type(HeaderValue::from_static(PLAIN_CONTENT_TYPE));
    }
}

/// Raw bytes with a caller chosen content type.
#[derive(Debug)]
pub struct Data<'a> {
    pub content_type: &'a str,
    pub data: Bytes,
}

impl Render for Data<'_> {
    fn render(self, w: &mut ResponseWriter) -> Result<(), RenderError> {
        if !self.content_type.is_empty() && HeaderValue::from_str(self.content_type).is_err() {
            return Err(RenderError::InvalidHeader { name: "content-type" });
        }
        self.write_content_type(w);
        w.write_bytes(self.data)?;
        Ok(())
    }

    fn write_content_type(&self, w: &mut ResponseWriter) {
        if self.content_type.is_empty() {
            return;
        }
        match HeaderValue::from_str(self.content_type) {
            Ok(value) => w.set_content_type(value),
            Err(_) => warn!(content_type = self.content_type, "ignoring invalid content type"),
        }
    }
}
