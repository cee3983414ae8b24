use crate::error::RenderError;
use crate::render::Render;
use crate::writer::ResponseWriter;
use http::header::{CONTENT_LENGTH, HeaderName};
use http::HeaderValue;
use std::io::{self, Read};
use tracing::warn;

/// Copies a reader into the response, optionally announcing its length and
/// adding extra headers first.
pub struct Reader<'a, R> {
    pub content_type: &'a str,
    pub content_length: Option<u64>,
    pub headers: &'a [(&'a str, &'a str)],
    pub reader: R,
}

impl<R: Read> Render for Reader<'_, R> {
    fn render(mut self, w: &mut ResponseWriter) -> Result<(), RenderError> {
        self.write_content_type(w);
        if let Some(length) = self.content_length {
            w.headers_mut().insert(CONTENT_LENGTH, HeaderValue::from(length));
        }
        for (name, value) in self.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| RenderError::InvalidHeader { name: "extra header" })?;
            let value = HeaderValue::from_str(value).map_err(|_| RenderError::InvalidHeader { name: "extra header" })?;
            w.headers_mut().insert(name, value);
        }
        io::copy(&mut self.reader, w)?;
        Ok(())
    }

    fn write_content_type(&self, w: &mut ResponseWriter) {
        match HeaderValue::from_str(self.content_type) {
            Ok(value) => w.set_content_type(value),
            Err(_) => warn!(content_type = self.content_type, "ignoring invalid content type"),
        }
    }
}
