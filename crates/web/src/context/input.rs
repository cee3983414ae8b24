use crate::binding::{self, Binding, BindingBody, MIME_MULTIPART_POST_FORM, MIME_POST_FORM};
use crate::context::{BODY_BYTES_KEY, Context, ErrorKind};
use crate::cookie;
use crate::error::BindError;
use crate::multipart::{self, FileHeader, MultipartForm};
use bytes::Bytes;
use http::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::any::Any;
use std::collections::HashMap;
use std::io;
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// A parsed query string or form: every key with all its values.
pub type Values = HashMap<String, Vec<String>>;

fn parse_values(raw: &[u8]) -> Result<Values, BindError> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(raw)?;
    let mut values = Values::new();
    for (key, value) in pairs {
        values.entry(key).or_default().push(value);
    }
    Ok(values)
}

/// Collects `key[sub]=value` entries into `sub -> first value`.
fn bracket_map(values: &Values, key: &str) -> Option<HashMap<String, String>> {
    let mut dict = HashMap::new();
    let mut exists = false;
    for (k, v) in values {
        let Some(i) = k.find('[') else {
            continue;
        };
        if i == 0 || &k[..i] != key {
            continue;
        }
        let rest = &k[i + 1..];
        if let Some(j) = rest.find(']').filter(|&j| j >= 1) {
            exists = true;
            if let Some(first) = v.first() {
                dict.insert(rest[..j].to_string(), first.clone());
            }
        }
    }
    exists.then_some(dict)
}

/// Splits an `Accept` header into media ranges, dropping parameters.
fn parse_accept(header: &str) -> Vec<String> {
    header
        .split(',')
        .map(|part| part.split(';').next().unwrap_or_default().trim())
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

impl Context {
    fn query_values(&mut self) -> &Values {
        let query = self.request.uri().query().unwrap_or_default();
        self.query_cache.get_or_insert_with(|| parse_values(query.as_bytes()).unwrap_or_default())
    }

    /// First value of a query parameter, empty when absent.
    ///
    /// For `/path?id=1234&name=Manu&value=` `query("id")` is `"1234"` and
    /// both `query("value")` and `query("wtf")` are `""`.
    pub fn query(&mut self, key: &str) -> String {
        self.get_query(key).unwrap_or_default()
    }

    pub fn default_query(&mut self, key: &str, default: &str) -> String {
        self.get_query(key).unwrap_or_else(|| default.to_string())
    }

    /// Like [`Context::query`] but tells an empty value apart from a missing key.
    pub fn get_query(&mut self, key: &str) -> Option<String> {
        self.query_values().get(key).and_then(|values| values.first()).cloned()
    }

    pub fn query_array(&mut self, key: &str) -> Vec<String> {
        self.get_query_array(key).unwrap_or_default()
    }

    pub fn get_query_array(&mut self, key: &str) -> Option<Vec<String>> {
        self.query_values().get(key).cloned()
    }

    /// The map encoded with bracket keys, e.g. `ids[a]=1&ids[b]=2`.
    pub fn query_map(&mut self, key: &str) -> HashMap<String, String> {
        self.get_query_map(key).unwrap_or_default()
    }

    pub fn get_query_map(&mut self, key: &str) -> Option<HashMap<String, String>> {
        bracket_map(self.query_values(), key)
    }

    /// The parsed form body; URL-encoded and multipart bodies are supported.
    pub(crate) fn form_values(&mut self) -> Result<&Values, BindError> {
        if self.form_cache.is_none() {
            let mut values = Values::new();
            let content_type = self.content_type().to_string();
            match content_type.as_str() {
                MIME_POST_FORM => {
                    if let Some(body) = self.body.take() {
                        values = parse_values(&body)?;
                    }
                }
                MIME_MULTIPART_POST_FORM => {
                    let form = self.multipart_form()?;
                    for (key, vs) in form.values() {
                        values.entry(key.clone()).or_default().extend(vs.iter().cloned());
                    }
                }
                _ => {}
            }
            self.form_cache = Some(values);
        }
        Ok(self.form_cache.get_or_insert_with(Values::new))
    }

    fn post_values(&mut self) -> &Values {
        if let Err(e) = self.form_values().map(|_| ()) {
            debug!(cause = %e, "error on parse form body");
            self.form_cache = Some(Values::new());
        }
        self.form_cache.get_or_insert_with(Values::new)
    }

    /// First value of a form field, empty when absent.
    pub fn post_form(&mut self, key: &str) -> String {
        self.get_post_form(key).unwrap_or_default()
    }

    pub fn default_post_form(&mut self, key: &str, default: &str) -> String {
        self.get_post_form(key).unwrap_or_else(|| default.to_string())
    }

    pub fn get_post_form(&mut self, key: &str) -> Option<String> {
        self.post_values().get(key).and_then(|values| values.first()).cloned()
    }

    pub fn post_form_array(&mut self, key: &str) -> Vec<String> {
        self.get_post_form_array(key).unwrap_or_default()
    }

    pub fn get_post_form_array(&mut self, key: &str) -> Option<Vec<String>> {
        self.post_values().get(key).cloned()
    }

    pub fn post_form_map(&mut self, key: &str) -> HashMap<String, String> {
        self.get_post_form_map(key).unwrap_or_default()
    }

    pub fn get_post_form_map(&mut self, key: &str) -> Option<HashMap<String, String>> {
        bracket_map(self.post_values(), key)
    }

    /// Parses a `multipart/form-data` body once; later calls return the same
    /// form.
    pub fn multipart_form(&mut self) -> Result<Arc<MultipartForm>, BindError> {
        if let Some(form) = &self.multipart {
            return Ok(Arc::clone(form));
        }
        let content_type = self.request_header("content-type").to_string();
        let body = self.body.take().ok_or(BindError::EmptyBody)?;
        let form = Arc::new(multipart::parse(&content_type, body, self.config.max_multipart_memory)?);
        self.multipart = Some(Arc::clone(&form));
        Ok(form)
    }

    /// The first file uploaded under `name`.
    pub fn form_file(&mut self, name: &str) -> Option<FileHeader> {
        match self.multipart_form() {
            Ok(form) => form.file(name).cloned(),
            Err(e) => {
                debug!(cause = %e, "error on parse multipart form");
                None
            }
        }
    }

    /// Stores an uploaded file at `dst`, creating parent directories.
    pub fn save_uploaded_file(&self, file: &FileHeader, dst: impl AsRef<Path>) -> io::Result<u64> {
        file.save_to(dst)
    }

    pub(crate) fn take_body(&mut self) -> Option<Bytes> {
        self.body.take()
    }

    /// Takes the raw request body; `None` once it has been consumed.
    pub fn get_raw_data(&mut self) -> Option<Bytes> {
        self.take_body()
    }

    /// Takes the raw request body, empty once it has been consumed.
    pub fn raw_data(&mut self) -> Bytes {
        self.take_body().unwrap_or_default()
    }

    fn validate<T: Any>(&self, value: &T) -> Result<(), BindError> {
        match &self.config.validator {
            Some(validator) => validator.validate_struct(value),
            None => Ok(()),
        }
    }

    /// Binds with the binding chosen from method and content type, see
    /// [`binding::default_binding`]. On failure the request is aborted with
    /// 400 and `{"error": ...}`, and the error is recorded with
    /// [`ErrorKind::Bind`].
    pub fn bind<T: DeserializeOwned + 'static>(&mut self) -> Option<T> {
        let b = binding::default_binding(self.method(), self.content_type());
        self.bind_with(&b)
    }

    pub fn bind_json<T: DeserializeOwned + 'static>(&mut self) -> Option<T> {
        self.bind_with(&binding::Json)
    }

    pub fn bind_xml<T: DeserializeOwned + 'static>(&mut self) -> Option<T> {
        self.bind_with(&binding::Xml)
    }

    pub fn bind_query<T: DeserializeOwned + 'static>(&mut self) -> Option<T> {
        self.bind_with(&binding::Query)
    }

    pub fn bind_header<T: DeserializeOwned + 'static>(&mut self) -> Option<T> {
        self.bind_with(&binding::Header)
    }

    pub fn bind_uri<T: DeserializeOwned + 'static>(&mut self) -> Option<T> {
        self.bind_with(&binding::Uri)
    }

    pub fn bind_with<T, B>(&mut self, b: &B) -> Option<T>
    where
        T: DeserializeOwned + 'static,
        B: Binding,
    {
        match self.should_bind_with(b) {
            Ok(value) => Some(value),
            Err(e) => {
                let body = json!({"error": e.to_string()});
                self.abort_with_status_json(StatusCode::BAD_REQUEST, &body);
                self.error(e).set_kind(ErrorKind::Bind);
                None
            }
        }
    }

    /// Like [`Context::bind`] but leaves the response alone on failure.
    pub fn should_bind<T: DeserializeOwned + 'static>(&mut self) -> Result<T, BindError> {
        let b = binding::default_binding(self.method(), self.content_type());
        self.should_bind_with(&b)
    }

    pub fn should_bind_json<T: DeserializeOwned + 'static>(&mut self) -> Result<T, BindError> {
        self.should_bind_with(&binding::Json)
    }

    pub fn should_bind_xml<T: DeserializeOwned + 'static>(&mut self) -> Result<T, BindError> {
        self.should_bind_with(&binding::Xml)
    }

    pub fn should_bind_query<T: DeserializeOwned + 'static>(&mut self) -> Result<T, BindError> {
        self.should_bind_with(&binding::Query)
    }

    pub fn should_bind_header<T: DeserializeOwned + 'static>(&mut self) -> Result<T, BindError> {
        self.should_bind_with(&binding::Header)
    }

    pub fn should_bind_uri<T: DeserializeOwned + 'static>(&mut self) -> Result<T, BindError> {
        self.should_bind_with(&binding::Uri)
    }

    pub fn should_bind_with<T, B>(&mut self, b: &B) -> Result<T, BindError>
    where
        T: DeserializeOwned + 'static,
        B: Binding,
    {
        let value = b.bind(self)?;
        self.validate(&value)?;
        Ok(value)
    }

    /// Binds from the body and keeps the body under [`BODY_BYTES_KEY`], so the
    /// same body can be bound again, e.g. first as one type and then as
    /// another.
    pub fn should_bind_body_with<T, B>(&mut self, b: &B) -> Result<T, BindError>
    where
        T: DeserializeOwned + 'static,
        B: BindingBody,
    {
        let body = match self.get::<Bytes>(BODY_BYTES_KEY) {
            Some(body) => body,
            None => {
                let body = self.take_body().ok_or(BindError::EmptyBody)?;
                self.set(BODY_BYTES_KEY, body.clone());
                body
            }
        };
        let value = b.bind_body(&body)?;
        self.validate(&value)?;
        Ok(value)
    }

    pub fn should_bind_body_with_json<T: DeserializeOwned + 'static>(&mut self) -> Result<T, BindError> {
        self.should_bind_body_with(&binding::Json)
    }

    pub fn should_bind_body_with_xml<T: DeserializeOwned + 'static>(&mut self) -> Result<T, BindError> {
        self.should_bind_body_with(&binding::Xml)
    }

    /// The address of the connected peer.
    pub fn remote_ip(&self) -> Option<IpAddr> {
        self.request.remote_addr().map(|addr| addr.ip())
    }

    /// Best effort client address.
    ///
    /// A configured trusted platform header wins. Otherwise, when the peer is
    /// a trusted proxy, the forwarding headers are consulted in order, and
    /// finally the peer address is used.
    pub fn client_ip(&self) -> Option<String> {
        if let Some(platform) = &self.config.trusted_platform {
            let value = self.request_header(platform);
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }

        let remote = self.remote_ip()?;
        if self.config.forwarded_by_client_ip && self.config.is_trusted_proxy(remote) {
            for header in &self.config.remote_ip_headers {
                if let Some(ip) = self.config.validate_forwarded(self.request_header(header)) {
                    return Some(ip);
                }
            }
        }
        Some(remote.to_string())
    }

    /// Value of a request cookie, unescaped.
    pub fn cookie(&self, name: &str) -> Option<String> {
        cookie::find(self.headers(), name)
    }

    /// Returns the first of `offered` accepted by the client, the first offer
    /// when the client accepts anything, and `None` when nothing fits.
    pub fn negotiate_format<'a>(&mut self, offered: &[&'a str]) -> Option<&'a str> {
        let first = *offered.first()?;
        if self.accepted.is_none() {
            self.accepted = Some(parse_accept(self.request_header("accept")));
        }
        let accepted = self.accepted.as_deref().unwrap_or_default();
        if accepted.is_empty() {
            return Some(first);
        }

        for accept in accepted {
            let accept = accept.as_bytes();
            for &offer in offered {
                let bytes = offer.as_bytes();
                let mut i = 0;
                while i < accept.len() && i < bytes.len() {
                    if accept[i] == b'*' || bytes[i] == b'*' {
                        return Some(offer);
                    }
                    if accept[i] != bytes[i] {
                        break;
                    }
                    i += 1;
                }
                if i == accept.len() {
                    return Some(offer);
                }
            }
        }
        None
    }

    /// Overrides the formats parsed from `Accept`.
    pub fn set_accepted<I, S>(&mut self, formats: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.accepted = Some(formats.into_iter().map(Into::into).collect());
    }
}
