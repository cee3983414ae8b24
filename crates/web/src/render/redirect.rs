use crate::error::RenderError;
use crate::render::{HTML_CONTENT_TYPE, Render};
use crate::writer::ResponseWriter;
use bytes::Bytes;
use http::header::LOCATION;
use http::{HeaderValue, Method, StatusCode};

/// Sets `Location` and a 3xx (or 201) status.
#[derive(Debug)]
pub struct Redirect<'a> {
    pub code: StatusCode,
    pub method: &'a Method,
    pub location: &'a str,
}

impl Render for Redirect<'_> {
    fn render(self, w: &mut ResponseWriter) -> Result<(), RenderError> {
        if !(self.code.is_redirection() || self.code == StatusCode::CREATED) {
            return Err(RenderError::InvalidRedirectCode { code: self.code.as_u16() });
        }
        let location = HeaderValue::from_str(self.location).map_err(|_| RenderError::InvalidHeader { name: "location" })?;
        w.headers_mut().insert(LOCATION, location);
        w.write_header(self.code);

        // browsers that ignore Location still get something to click
        if self.method == Method::GET || self.method == Method::HEAD {
            self.write_content_type(w);
            let reason = self.code.canonical_reason().unwrap_or_default();
            let body = format!("<a href=\"{}\">{}</a>.\n\n", html_escape(self.location), reason);
            w.write_bytes(Bytes::from(body))?;
        } else {
            w.write_header_now()?;
        }
        Ok(())
    }

    fn write_content_type(&self, w: &mut ResponseWriter) {
        w.set_content_type(HeaderValue::from_static(HTML_CONTENT_TYPE));
    }
}

fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::test_support::recorded_writer;

    #[test]
    fn test_render_redirect() {
        let (mut w, recorder) = recorded_writer();
        let redirect = Redirect { code: StatusCode::MOVED_PERMANENTLY, method: &Method::GET, location: "/new/location" };

        assert!(redirect.render(&mut w).is_ok());
        assert_eq!(recorder.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(recorder.header("location").as_deref(), Some("/new/location"));
        assert_eq!(recorder.body_string(), "<a href=\"/new/location\">Moved Permanently</a>.\n\n");
    }

    #[test]
    fn test_render_redirect_without_body() {
        let (mut w, recorder) = recorded_writer();
        let redirect = Redirect { code: StatusCode::TEMPORARY_REDIRECT, method: &Method::POST, location: "/new" };

        assert!(redirect.render(&mut w).is_ok());
        assert_eq!(recorder.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(recorder.header("location").as_deref(), Some("/new"));
        assert_eq!(recorder.body_string(), "");

        let (mut w, recorder) = recorded_writer();
        let redirect = Redirect { code: StatusCode::CREATED, method: &Method::POST, location: "/items/1" };
        assert!(redirect.render(&mut w).is_ok());
        assert_eq!(recorder.status(), StatusCode::CREATED);
    }

    #[test]
    fn test_render_redirect_rejects_status() {
        for code in [StatusCode::OK, StatusCode::NOT_FOUND] {
            let (mut w, recorder) = recorded_writer();
            let redirect = Redirect { code, method: &Method::GET, location: "/new" };
            assert!(matches!(redirect.render(&mut w), Err(RenderError::InvalidRedirectCode { .. })));
            assert!(!recorder.committed());
        }
    }
}
