use crate::error::RenderError;
use crate::render::{EVENT_STREAM_CONTENT_TYPE, Render};
use crate::writer::ResponseWriter;
use bytes::Bytes;
use http::HeaderValue;
use http::header::CACHE_CONTROL;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

/// One server-sent event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    // https://html.spec.whatwg.org/multipage/server-sent-events.html#concept-event-stream-last-event-id
    pub id: Option<String>,
    pub event: Option<String>,
    pub retry: Option<Duration>,
    pub data: String,
}

impl SseEvent {
    pub fn new(data: impl Into<String>) -> Self {
        Self { data: data.into(), ..Self::default() }
    }

    /// Strings are sent as is, every other value as JSON.
    pub fn json<T: Serialize + ?Sized>(data: &T) -> serde_json::Result<Self> {
        let data = match serde_json::to_value(data)? {
            Value::String(s) => s,
            other => other.to_string(),
        };
        Ok(Self::new(data))
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn event(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }

    pub fn retry(mut self, retry: Duration) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn encode(&self) -> String {
        let mut string = String::with_capacity(self.data.len() + 16);

        if let Some(id) = &self.id {
            string.push_str("id: ");
            push_field(&mut string, id);
            string.push('\n');
        }

        if let Some(event) = &self.event {
            string.push_str("event: ");
            push_field(&mut string, event);
            string.push('\n');
        }

        if let Some(retry) = self.retry {
            string.push_str(&format!("retry: {}\n", retry.as_millis()));
        }

        if self.data.is_empty() {
            string.push_str("data: \n");
        }
        for line in self.data.lines() {
            string.push_str("data: ");
            string.push_str(line);
            string.push('\n');
        }

        string.push('\n');
        string
    }
}

/// Line breaks would end the field early.
fn push_field(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
}

impl Render for SseEvent {
    fn render(self, w: &mut ResponseWriter) -> Result<(), RenderError> {
        self.write_content_type(w);
        w.write_bytes(Bytes::from(self.encode()))?;
        Ok(())
    }

    fn write_content_type(&self, w: &mut ResponseWriter) {
        w.set_content_type(HeaderValue::from_static(EVENT_STREAM_CONTENT_TYPE));
        if !w.headers().contains_key(CACHE_CONTROL) {
            w.headers_mut().insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::test_support::recorded_writer;
    use serde_json::json;

    #[test]
    fn test_encode() {
        assert_eq!(SseEvent::new("hello").event("message").encode(), "event: message\ndata: hello\n\n");
        assert_eq!(SseEvent::new("a\nb").id("7").encode(), "id: 7\ndata: a\ndata: b\n\n");
        assert_eq!(SseEvent::new("").retry(Duration::from_secs(3)).encode(), "retry: 3000\ndata: \n\n");
        assert_eq!(SseEvent::new("x").event("bad\nname").encode(), "event: bad\\nname\ndata: x\n\n");
    }

    #[test]
    fn test_json_data() {
        let event = SseEvent::json(&json!({"foo": "bar"})).unwrap().event("update");
        assert_eq!(event.encode(), "event: update\ndata: {\"foo\":\"bar\"}\n\n");

        let event = SseEvent::json("plain text").unwrap();
        assert_eq!(event.data, "plain text");

        let event = SseEvent::json(&42).unwrap();
        assert_eq!(event.data, "42");
    }

    #[test]
    fn test_render_sse() {
        let (mut w, recorder) = recorded_writer();
        assert!(SseEvent::new("hi").event("greeting").render(&mut w).is_ok());

        assert_eq!(recorder.body_string(), "event: greeting\ndata: hi\n\n");
        assert_eq!(recorder.header("content-type").as_deref(), Some("text/event-stream"));
        assert_eq!(recorder.header("cache-control").as_deref(), Some("no-cache"));
    }
}
