//! Errors attached to a context while a chain runs.

use serde_json::{Map, Value};
use std::error::Error as StdError;
use std::fmt;

/// Classification of an error recorded on a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Recorded by a failed `bind*` call.
    Bind,
    /// Recorded by a failed render.
    Render,
    /// Default kind; not meant to be shown to clients.
    Private,
    /// Safe to expose to clients.
    Public,
    /// Matches every kind when filtering.
    Any,
}

impl ErrorKind {
    fn matches(self, filter: ErrorKind) -> bool {
        filter == ErrorKind::Any || self == filter
    }
}

/// An error recorded with [`Context::error`](crate::Context::error).
#[derive(Debug)]
pub struct ContextError {
    err: Box<dyn StdError + Send + Sync>,
    kind: ErrorKind,
    meta: Option<Value>,
}

impl ContextError {
    pub fn new<E>(err: E, kind: ErrorKind) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        Self { err: err.into(), kind, meta: None }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn set_kind(&mut self, kind: ErrorKind) -> &mut Self {
        self.kind = kind;
        self
    }

    pub fn meta(&self) -> Option<&Value> {
        self.meta.as_ref()
    }

    pub fn set_meta(&mut self, meta: Value) -> &mut Self {
        self.meta = Some(meta);
        self
    }

    pub fn is_kind(&self, kind: ErrorKind) -> bool {
        self.kind.matches(kind)
    }

    pub fn inner(&self) -> &(dyn StdError + Send + Sync + 'static) {
        &*self.err
    }

    /// JSON view: an object meta is extended with an `error` entry unless it
    /// already has one, other meta values are returned as is, and without
    /// meta the result is `{"error": message}`.
    pub fn json(&self) -> Value {
        match &self.meta {
            Some(Value::Object(meta)) => {
                let mut object = meta.clone();
                object.entry("error").or_insert_with(|| Value::String(self.err.to_string()));
                Value::Object(object)
            }
            Some(meta) => meta.clone(),
            None => {
                let mut object = Map::new();
                object.insert("error".to_string(), Value::String(self.err.to_string()));
                Value::Object(object)
            }
        }
    }
}

impl fmt::Display for ContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.err, f)
    }
}

impl StdError for ContextError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&*self.err)
    }
}

/// Errors recorded on a context, in order.
#[derive(Debug, Default)]
pub struct Errors {
    inner: Vec<ContextError>,
}

impl Errors {
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ContextError> {
        self.inner.iter()
    }

    pub fn last(&self) -> Option<&ContextError> {
        self.inner.last()
    }

    pub fn by_kind(&self, kind: ErrorKind) -> Vec<&ContextError> {
        self.inner.iter().filter(|e| e.is_kind(kind)).collect()
    }

    pub fn messages(&self) -> Vec<String> {
        self.inner.iter().map(ToString::to_string).collect()
    }

    /// `null` when empty, the single error's JSON for one error, an array
    /// otherwise.
    pub fn json(&self) -> Value {
        match self.inner.as_slice() {
            [] => Value::Null,
            [only] => only.json(),
            all => Value::Array(all.iter().map(ContextError::json).collect()),
        }
    }

    pub(crate) fn push(&mut self, err: ContextError) -> &mut ContextError {
        self.inner.push(err);
        let last = self.inner.len() - 1;
        &mut self.inner[last]
    }

    pub(crate) fn clear(&mut self) {
        self.inner.clear();
    }
}

impl<'a> IntoIterator for &'a Errors {
    type Item = &'a ContextError;
    type IntoIter = std::slice::Iter<'a, ContextError>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Display for Errors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.inner.iter().enumerate() {
            writeln!(f, "Error #{:02}: {}", i + 1, err)?;
            if let Some(meta) = &err.meta {
                writeln!(f, "     Meta: {meta}")?;
            }
        }
        Ok(())
    }
}
