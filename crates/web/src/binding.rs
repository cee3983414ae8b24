//! Request binding: decoding a request into a typed value.
//!
//! A [`Binding`] turns (parts of) the request held by a [`Context`] into a
//! `serde` target. Bodies go through `serde_json` or `quick_xml`; flattened
//! key/value sources (query, form, headers, URI parameters) go through
//! `serde_qs`, so nested and indexed keys like `ids[0]=1` work everywhere.
//!
//! ```ignore
//! #[derive(Deserialize)]
//! struct Login {
//!     user: String,
//!     password: String,
//! }
//!
//! fn login(ctx: &mut Context) {
//!     let Some(login) = ctx.bind::<Login>() else {
//!         return;
//!     };
//!     ctx.json(StatusCode::OK, &json!({"user": login.user}));
//! }
//! ```

mod body;
mod pairs;

pub use body::{Json, Xml};
pub use pairs::{Form, FormMultipart, FormPost, Header, Query, Uri};

use crate::context::Context;
use crate::error::BindError;
use http::Method;
use serde::de::DeserializeOwned;
use std::any::Any;

pub const MIME_JSON: &str = "application/json";
pub const MIME_HTML: &str = "text/html";
pub const MIME_XML: &str = "application/xml";
pub const MIME_XML2: &str = "text/xml";
pub const MIME_PLAIN: &str = "text/plain";
pub const MIME_POST_FORM: &str = "application/x-www-form-urlencoded";
pub const MIME_MULTIPART_POST_FORM: &str = "multipart/form-data";

/// Decodes a request into `T`.
pub trait Binding {
    fn name(&self) -> &'static str;

    fn bind<T: DeserializeOwned>(&self, ctx: &mut Context) -> Result<T, BindError>;
}

/// A binding that can also decode an already read body.
pub trait BindingBody: Binding {
    fn bind_body<T: DeserializeOwned>(&self, body: &[u8]) -> Result<T, BindError>;
}

/// Checks a decoded value. Implementations usually downcast to the types they
/// know about and accept everything else.
pub trait StructValidator: Send + Sync {
    fn validate_struct(&self, value: &dyn Any) -> Result<(), BindError>;
}

impl<F> StructValidator for F
where
    F: Fn(&dyn Any) -> Result<(), BindError> + Send + Sync,
{
    fn validate_struct(&self, value: &dyn Any) -> Result<(), BindError> {
        (self)(value)
    }
}

/// The bindings selectable at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Json,
    Xml,
    Form,
    FormPost,
    FormMultipart,
    Query,
    Header,
    Uri,
}

impl Binding for BindingKind {
    fn name(&self) -> &'static str {
        match self {
            BindingKind::Json => Json.name(),
            BindingKind::Xml => Xml.name(),
            BindingKind::Form => Form.name(),
            BindingKind::FormPost => FormPost.name(),
            BindingKind::FormMultipart => FormMultipart.name(),
            BindingKind::Query => Query.name(),
            BindingKind::Header => Header.name(),
            BindingKind::Uri => Uri.name(),
        }
    }

    fn bind<T: DeserializeOwned>(&self, ctx: &mut Context) -> Result<T, BindError> {
        match self {
            BindingKind::Json => Json.bind(ctx),
            BindingKind::Xml => Xml.bind(ctx),
            BindingKind::Form => Form.bind(ctx),
            BindingKind::FormPost => FormPost.bind(ctx),
            BindingKind::FormMultipart => FormMultipart.bind(ctx),
            BindingKind::Query => Query.bind(ctx),
            BindingKind::Header => Header.bind(ctx),
            BindingKind::Uri => Uri.bind(ctx),
        }
    }
}

/// Picks a binding from the method and the media type of the body.
///
/// GET requests always bind the form (which includes the query string).
pub fn default_binding(method: &Method, content_type: &str) -> BindingKind {
    if method == Method::GET {
        return BindingKind::Form;
    }

    match content_type {
        MIME_JSON => BindingKind::Json,
        MIME_XML | MIME_XML2 => BindingKind::Xml,
        MIME_MULTIPART_POST_FORM => BindingKind::FormMultipart,
        _ => BindingKind::Form,
    }
}
