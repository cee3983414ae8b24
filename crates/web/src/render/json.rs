use crate::error::RenderError;
use crate::render::{ASCII_JSON_CONTENT_TYPE, JSON_CONTENT_TYPE, JSONP_CONTENT_TYPE, Render};
use crate::writer::ResponseWriter;
use bytes::Bytes;
use http::HeaderValue;
use serde::Serialize;
use serde_json::ser::{CompactFormatter, Formatter, PrettyFormatter};
use std::io::{self, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Escape {
    /// `<`, `>`, `&`, U+2028 and U+2029 become `\uXXXX`.
    Html,
    /// Html, plus every non-ASCII code point.
    Ascii,
}

/// Delegates layout to `inner` and escapes string contents.
struct Escaping<F> {
    inner: F,
    escape: Escape,
}

impl<F: Formatter> Formatter for Escaping<F> {
    fn begin_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.begin_array(writer)
    }

    fn end_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_array(writer)
    }

    fn begin_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        self.inner.begin_array_value(writer, first)
    }

    fn end_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_array_value(writer)
    }

    fn begin_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.begin_object(writer)
    }

    fn end_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_object(writer)
    }

    fn begin_object_key<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        self.inner.begin_object_key(writer, first)
    }

    fn end_object_key<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_object_key(writer)
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.begin_object_value(writer)
    }

    fn end_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_object_value(writer)
    }

    fn write_string_fragment<W: ?Sized + io::Write>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()> {
        let bytes = fragment.as_bytes();
        let mut start = 0;
        for (i, c) in fragment.char_indices() {
            let escaped = matches!(c, '<' | '>' | '&' | '\u{2028}' | '\u{2029}') || (self.escape == Escape::Ascii && !c.is_ascii());
            if !escaped {
                continue;
            }
            if start < i {
                writer.write_all(&bytes[start..i])?;
            }
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                write!(writer, "\\u{unit:04x}")?;
            }
            start = i + c.len_utf8();
        }
        if start < bytes.len() {
            writer.write_all(&bytes[start..])?;
        }
        Ok(())
    }
}

fn to_vec_with<T, F>(value: &T, formatter: F) -> serde_json::Result<Vec<u8>>
where
    T: Serialize + ?Sized,
    F: Formatter,
{
    let mut out = Vec::with_capacity(128);
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut serializer)?;
    Ok(out)
}

fn html_escaped<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<Vec<u8>> {
    to_vec_with(value, Escaping { inner: CompactFormatter, escape: Escape::Html })
}

/// Only identifier-ish callbacks are echoed back into a script.
pub(crate) fn is_valid_callback(callback: &str) -> bool {
    !callback.is_empty() && callback.bytes().all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'$' | b'.'))
}

/// HTML-escaped, newline terminated JSON.
#[derive(Debug)]
pub struct Json<'a, T: ?Sized> {
    pub data: &'a T,
}

impl<T: Serialize + ?Sized> Render for Json<'_, T> {
    fn render(self, w: &mut ResponseWriter) -> Result<(), RenderError> {
        self.write_content_type(w);
        let mut body = html_escaped(self.data)?;
        body.push(b'\n');
        w.write_bytes(Bytes::from(body))?;
        Ok(())
    }

    fn write_content_type(&self, w: &mut ResponseWriter) {
        w.set_content_type(HeaderValue::from_static(JSON_CONTENT_TYPE));
    }
}

/// HTML-escaped JSON pretty printed with a four space indent.
#[derive(Debug)]
pub struct IndentedJson<'a, T: ?Sized> {
    pub data: &'a T,
}

impl<T: Serialize + ?Sized> Render for IndentedJson<'_, T> {
    fn render(self, w: &mut ResponseWriter) -> Result<(), RenderError> {
        self.write_content_type(w);
        let body = to_vec_with(self.data, Escaping { inner: PrettyFormatter::with_indent(b"    "), escape: Escape::Html })?;
        w.write_bytes(Bytes::from(body))?;
        Ok(())
    }

    fn write_content_type(&self, w: &mut ResponseWriter) {
        w.set_content_type(HeaderValue::from_static(JSON_CONTENT_TYPE));
    }
}

/// JSON whose top-level arrays are prefixed to defeat array hijacking.
#[derive(Debug)]
pub struct SecureJson<'a, T: ?Sized> {
    pub prefix: &'a str,
    pub data: &'a T,
}

impl<T: Serialize + ?Sized> Render for SecureJson<'_, T> {
    fn render(self, w: &mut ResponseWriter) -> Result<(), RenderError> {
        self.write_content_type(w);
        let json = html_escaped(self.data)?;
        let mut body = Vec::with_capacity(self.prefix.len() + json.len() + 1);
        if json.first() == Some(&b'[') {
            body.extend_from_slice(self.prefix.as_bytes());
        }
        body.extend_from_slice(&json);
        body.push(b'\n');
        w.write_bytes(Bytes::from(body))?;
        Ok(())
    }

    fn write_content_type(&self, w: &mut ResponseWriter) {
        w.set_content_type(HeaderValue::from_static(JSON_CONTENT_TYPE));
    }
}

/// `callback(json);`, or bare JSON when the callback is not a plain
/// identifier path.
#[derive(Debug)]
pub struct Jsonp<'a, T: ?Sized> {
    pub callback: &'a str,
    pub data: &'a T,
}

impl<T: Serialize + ?Sized> Render for Jsonp<'_, T> {
    fn render(self, w: &mut ResponseWriter) -> Result<(), RenderError> {
        self.write_content_type(w);
        let json = html_escaped(self.data)?;
        if !is_valid_callback(self.callback) {
            w.write_bytes(Bytes::from(json))?;
            return Ok(());
        }

        let mut body = Vec::with_capacity(self.callback.len() + json.len() + 3);
        body.extend_from_slice(self.callback.as_bytes());
        body.push(b'(');
        body.extend_from_slice(&json);
        body.extend_from_slice(b");");
        w.write_bytes(Bytes::from(body))?;
        Ok(())
    }

    fn write_content_type(&self, w: &mut ResponseWriter) {
        if is_valid_callback(self.callback) {
            w.set_content_type(HeaderValue::from_static(JSONP_CONTENT_TYPE));
        } else {
            w.set_content_type(HeaderValue::from_static(JSON_CONTENT_TYPE));
        }
    }
}

/// JSON restricted to ASCII: other code points become `\uXXXX` escapes.
#[derive(Debug)]
pub struct AsciiJson<'a, T: ?Sized> {
    pub data: &'a T,
}

impl<T: Serialize + ?Sized> Render for AsciiJson<'_, T> {
    fn render(self, w: &mut ResponseWriter) -> Result<(), RenderError> {
        self.write_content_type(w);
        let body = to_vec_with(self.data, Escaping { inner: CompactFormatter, escape: Escape::Ascii })?;
        w.write_bytes(Bytes::from(body))?;
        Ok(())
    }

    fn write_content_type(&self, w: &mut ResponseWriter) {
        w.set_content_type(HeaderValue::from_static(ASCII_JSON_CONTENT_TYPE));
    }
}

/// JSON with HTML characters left as they are.
#[derive(Debug)]
pub struct PureJson<'a, T: ?Sized> {
    pub data: &'a T,
}

impl<T: Serialize + ?Sized> Render for PureJson<'_, T> {
    fn render(self, w: &mut ResponseWriter) -> Result<(), RenderError> {
        self.write_content_type(w);
        let mut body = serde_json::to_vec(self.data)?;
        body.push(b'\n');
        w.write_bytes(Bytes::from(body))?;
        Ok(())
    }

    fn write_content_type(&self, w: &mut ResponseWriter) {
        w.set_content_type(HeaderValue::from_static(JSON_CONTENT_TYPE));
    }
}
