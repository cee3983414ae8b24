use crate::error::RenderError;
use crate::render::{Render, XML_CONTENT_TYPE};
use crate::writer::ResponseWriter;
use bytes::Bytes;
use http::HeaderValue;
use serde::Serialize;

/// XML through `quick_xml`; the root element is named after the type.
#[derive(Debug)]
pub struct Xml<'a, T: ?Sized> {
    pub data: &'a T,
}

impl<T: Serialize + ?Sized> Render for Xml<'_, T> {
    fn render(self, w: &mut ResponseWriter) -> Result<(), RenderError> {
        self.write_content_type(w);
        let body = quick_xml::se::to_string(self.data)?;
        w.write_bytes(Bytes::from(body))?;
        Ok(())
    }

    fn write_content_type(&self, w: &mut ResponseWriter) {
        w.set_content_type(HeaderValue::from_static(XML_CONTENT_TYPE));
    }
}
