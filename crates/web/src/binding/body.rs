use crate::binding::{Binding, BindingBody};
use crate::context::Context;
use crate::error::BindError;
use serde::de::DeserializeOwned;

/// Decodes a JSON body with `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Json;

/// Decodes an XML body with `quick_xml`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Xml;

impl Binding for Json {
    fn name(&self) -> &'static str {
        "json"
    }

    fn bind<T: DeserializeOwned>(&self, ctx: &mut Context) -> Result<T, BindError> {
        let body = ctx.take_body().ok_or(BindError::EmptyBody)?;
        self.bind_body(&body)
    }
}

impl BindingBody for Json {
    fn bind_body<T: DeserializeOwned>(&self, body: &[u8]) -> Result<T, BindError> {
        Ok(serde_json::from_slice(body)?)
    }
}

impl Binding for Xml {
    fn name(&self) -> &'static str {
        "xml"
    }

    fn bind<T: DeserializeOwned>(&self, ctx: &mut Context) -> Result<T, BindError> {
        let body = ctx.take_body().ok_or(BindError::EmptyBody)?;
        self.bind_body(&body)
    }
}

impl BindingBody for Xml {
    fn bind_body<T: DeserializeOwned>(&self, body: &[u8]) -> Result<T, BindError> {
        Ok(quick_xml::de::from_reader(body)?)
    }
}
