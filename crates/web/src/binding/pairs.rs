use crate::binding::Binding;
use crate::context::Context;
use crate::error::BindError;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::de::DeserializeOwned;
use std::collections::HashSet;

/// Query string and form body together; the body may be URL-encoded or
/// multipart.
#[derive(Debug, Clone, Copy, Default)]
pub struct Form;

/// Form body only.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormPost;

/// Values of a multipart body.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormMultipart;

/// Query string only.
#[derive(Debug, Clone, Copy, Default)]
pub struct Query;

/// Request headers, keyed by their lower case names.
#[derive(Debug, Clone, Copy, Default)]
pub struct Header;

/// Path parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct Uri;

// brackets stay readable so nested keys survive re-encoding
const KEY_VALUE: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~').remove(b'[').remove(b']');

/// Encodes pairs as a query string.
pub(crate) fn encode_pairs<'a, I>(pairs: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut encoded = String::new();
    for (key, value) in pairs {
        if !encoded.is_empty() {
            encoded.push('&');
        }
        encoded.extend(utf8_percent_encode(key, KEY_VALUE));
        encoded.push('=');
        encoded.extend(utf8_percent_encode(value, KEY_VALUE));
    }
    encoded
}

fn join(query: &str, form: &str) -> String {
    match (query.is_empty(), form.is_empty()) {
        (true, _) => form.to_string(),
        (_, true) => query.to_string(),
        _ => format!("{query}&{form}"),
    }
}

fn decode<T: DeserializeOwned>(encoded: &str) -> Result<T, BindError> {
    Ok(serde_qs::from_str(encoded)?)
}

fn encoded_post_form(ctx: &mut Context) -> Result<String, BindError> {
    let values = ctx.form_values()?;
    Ok(encode_pairs(values.iter().flat_map(|(key, values)| values.iter().map(move |value| (key.as_str(), value.as_str())))))
}

impl Binding for Form {
    fn name(&self) -> &'static str {
        "form"
    }

    fn bind<T: DeserializeOwned>(&self, ctx: &mut Context) -> Result<T, BindError> {
        let form = encoded_post_form(ctx)?;
        let query = ctx.uri().query().unwrap_or_default().to_string();
        decode(&join(&query, &form))
    }
}

impl Binding for FormPost {
    fn name(&self) -> &'static str {
        "form-urlencoded"
    }

    fn bind<T: DeserializeOwned>(&self, ctx: &mut Context) -> Result<T, BindError> {
        decode(&encoded_post_form(ctx)?)
    }
}

impl Binding for FormMultipart {
    fn name(&self) -> &'static str {
        "multipart/form-data"
    }

    fn bind<T: DeserializeOwned>(&self, ctx: &mut Context) -> Result<T, BindError> {
        let form = ctx.multipart_form()?;
        let encoded =
            encode_pairs(form.values().iter().flat_map(|(key, values)| values.iter().map(move |value| (key.as_str(), value.as_str()))));
        decode(&encoded)
    }
}

impl Binding for Query {
    fn name(&self) -> &'static str {
        "query"
    }

    fn bind<T: DeserializeOwned>(&self, ctx: &mut Context) -> Result<T, BindError> {
        decode(ctx.uri().query().unwrap_or_default())
    }
}

impl Binding for Header {
    fn name(&self) -> &'static str {
        "header"
    }

    fn bind<T: DeserializeOwned>(&self, ctx: &mut Context) -> Result<T, BindError> {
        let mut seen = HashSet::new();
        let pairs = ctx
            .headers()
            .iter()
            .filter(|(name, _)| seen.insert(*name))
            .filter_map(|(name, value)| value.to_str().ok().map(|value| (name.as_str(), value)));
        decode(&encode_pairs(pairs))
    }
}

impl Binding for Uri {
    fn name(&self) -> &'static str {
        "uri"
    }

    fn bind<T: DeserializeOwned>(&self, ctx: &mut Context) -> Result<T, BindError> {
        let pairs = ctx.params().iter().map(|param| (param.key.as_str(), param.value.as_str()));
        decode(&encode_pairs(pairs))
    }
}
