//! The per-request context.
//!
//! A [`Context`] carries the request, the response writer, the matched
//! parameters and the handler chain. Contexts are pooled by the engine and
//! fully reset before every request.

mod errors;
mod input;
mod output;

pub use errors::{ContextError, ErrorKind, Errors};
pub use input::Values;
pub use output::Negotiate;

use crate::config::EngineConfig;
use crate::cookie::SameSite;
use crate::handler::{ABORT_INDEX, HandlerFunc, HandlersChain};
use crate::multipart::MultipartForm;
use crate::params::Params;
use crate::request::RequestHeader;
use crate::writer::{ResponseSink, ResponseWriter};
use bytes::Bytes;
use http::{HeaderMap, Method, Request, Uri};
use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Key under which the request body is cached by
/// [`Context::should_bind_body_with`].
pub const BODY_BYTES_KEY: &str = "micro_engine/bodybytes";

type KeyMap = HashMap<String, Arc<dyn Any + Send + Sync>>;

pub struct Context {
    pub(crate) writer: ResponseWriter,
    pub(crate) request: Arc<RequestHeader>,
    pub(crate) body: Option<Bytes>,
    pub(crate) params: Params,
    pub(crate) handlers: HandlersChain,
    pub(crate) index: i8,
    pub(crate) full_path: Option<Arc<str>>,
    keys: Arc<RwLock<KeyMap>>,
    errors: Errors,
    query_cache: Option<Values>,
    form_cache: Option<Values>,
    multipart: Option<Arc<MultipartForm>>,
    accepted: Option<Vec<String>>,
    same_site: Option<SameSite>,
    pub(crate) config: Arc<EngineConfig>,
    /// Chain used when a static file handler falls through to 404.
    pub(crate) no_route: HandlersChain,
}

impl Context {
    pub(crate) fn new(config: Arc<EngineConfig>) -> Self {
        Self {
            writer: ResponseWriter::new(),
            request: Arc::new(RequestHeader::default()),
            body: None,
            params: Params::new(),
            handlers: HandlersChain::empty(),
            index: -1,
            full_path: None,
            keys: Arc::default(),
            errors: Errors::default(),
            query_cache: None,
            form_cache: None,
            multipart: None,
            accepted: None,
            same_site: None,
            config,
            no_route: HandlersChain::empty(),
        }
    }

    /// Prepares a pooled context for a new request.
    pub(crate) fn reset(&mut self, request: Request<Bytes>, sink: Box<dyn ResponseSink>) {
        let (parts, body) = request.into_parts();
        self.request = Arc::new(RequestHeader::from(parts));
        self.body = Some(body);
        self.writer.reset(Some(sink));
        self.params.clear();
        self.handlers = HandlersChain::empty();
        self.index = -1;
        self.full_path = None;
        // a detached copy may still hold the previous map
        if Arc::strong_count(&self.keys) == 1 {
            self.keys.write().clear();
        } else {
            self.keys = Arc::default();
        }
        self.errors.clear();
        self.query_cache = None;
        self.form_cache = None;
        self.multipart = None;
        self.accepted = None;
        self.same_site = None;
        self.no_route = HandlersChain::empty();
    }

    /// Drops everything tied to the finished request, closing the response.
    pub(crate) fn release(&mut self) {
        self.writer.reset(None);
        self.body = None;
        self.multipart = None;
        self.handlers = HandlersChain::empty();
    }

    /// Returns a copy that can safely outlive the request, e.g. when handed
    /// to a background task.
    ///
    /// The copy shares the request and the keys, owns a deep copy of the
    /// parameters, has no handlers and a writer that is not connected to the
    /// client.
    pub fn copy(&self) -> Context {
        Context {
            writer: self.writer.detached(),
            request: Arc::clone(&self.request),
            body: None,
            params: self.params.clone(),
            handlers: HandlersChain::empty(),
            index: ABORT_INDEX,
            full_path: self.full_path.clone(),
            keys: Arc::clone(&self.keys),
            errors: Errors::default(),
            query_cache: None,
            form_cache: None,
            multipart: None,
            accepted: None,
            same_site: self.same_site,
            config: Arc::clone(&self.config),
            no_route: HandlersChain::empty(),
        }
    }

    /// Runs the pending handlers of the chain. Meant to be called from
    /// middleware: work before the call happens on the way in, work after it
    /// on the way out.
    pub fn next(&mut self) {
        self.index = self.index.saturating_add(1);
        // a handler may swap the chain, e.g. a static file falling back to 404
        while let Some(handler) = usize::try_from(self.index).ok().and_then(|i| self.handlers.get(i)).cloned() {
            handler.handle(self);
            self.index = self.index.saturating_add(1);
        }
    }

    /// Prevents pending handlers from running. Handlers already on the stack
    /// keep running their remaining code.
    pub fn abort(&mut self) {
        self.index = ABORT_INDEX;
    }

    pub fn is_aborted(&self) -> bool {
        self.index >= ABORT_INDEX
    }

    /// Name of the main (last) handler of the chain.
    pub fn handler_name(&self) -> &'static str {
        self.handlers.last().map(|h| h.name()).unwrap_or_default()
    }

    pub fn handler_names(&self) -> Vec<&'static str> {
        self.handlers.names()
    }

    /// The main (last) handler of the chain.
    pub fn handler(&self) -> Option<HandlerFunc> {
        self.handlers.last().cloned()
    }

    /// The matched route pattern, e.g. `/user/:id`; empty when nothing matched.
    pub fn full_path(&self) -> &str {
        self.full_path.as_deref().unwrap_or_default()
    }

    /// Records an error of kind [`ErrorKind::Private`] and returns it for
    /// further decoration. Middleware can inspect all errors once the chain
    /// returned, e.g. to log them.
    pub fn error<E>(&mut self, err: E) -> &mut ContextError
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        self.errors.push(ContextError::new(err, ErrorKind::Private))
    }

    pub fn errors(&self) -> &Errors {
        &self.errors
    }

    /// Stores a value for this request. Values are shared with copies made by
    /// [`Context::copy`].
    pub fn set<V: Any + Send + Sync>(&self, key: impl Into<String>, value: V) {
        self.keys.write().insert(key.into(), Arc::new(value));
    }

    pub fn get<V: Any + Clone>(&self, key: &str) -> Option<V> {
        self.keys.read().get(key).and_then(|value| value.downcast_ref::<V>()).cloned()
    }

    pub fn get_raw(&self, key: &str) -> Option<Arc<dyn Any + Send + Sync>> {
        self.keys.read().get(key).cloned()
    }

    /// Like [`Context::get`].
    ///
    /// # Panics
    ///
    /// When the key is absent or holds another type.
    pub fn must_get<V: Any + Clone>(&self, key: &str) -> V {
        match self.get(key) {
            Some(value) => value,
            None => panic!("key \"{key}\" does not exist"),
        }
    }

    pub fn exists(&self, key: &str) -> bool {
        self.keys.read().contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.keys.read().keys().cloned().collect()
    }

    pub fn get_string(&self, key: &str) -> String {
        self.get(key).unwrap_or_default()
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key).unwrap_or_default()
    }

    pub fn get_i64(&self, key: &str) -> i64 {
        self.get(key).unwrap_or_default()
    }

    pub fn get_u64(&self, key: &str) -> u64 {
        self.get(key).unwrap_or_default()
    }

    pub fn get_f64(&self, key: &str) -> f64 {
        self.get(key).unwrap_or_default()
    }

    pub fn get_duration(&self, key: &str) -> Duration {
        self.get(key).unwrap_or_default()
    }

    pub fn get_string_slice(&self, key: &str) -> Vec<String> {
        self.get(key).unwrap_or_default()
    }

    pub fn get_string_map(&self, key: &str) -> HashMap<String, String> {
        self.get(key).unwrap_or_default()
    }

    pub fn deadline(&self) -> Option<Instant> {
        None
    }

    /// Resolves when the request is cancelled, which never happens.
    pub fn done(&self) -> futures::future::Pending<()> {
        futures::future::pending()
    }

    pub fn err(&self) -> Option<&(dyn StdError + Send + Sync)> {
        None
    }

    pub fn value(&self, key: &str) -> Option<Arc<dyn Any + Send + Sync>> {
        self.get_raw(key)
    }

    pub fn request(&self) -> &RequestHeader {
        &self.request
    }

    pub fn method(&self) -> &Method {
        self.request.method()
    }

    pub fn uri(&self) -> &Uri {
        self.request.uri()
    }

    pub fn path(&self) -> &str {
        self.request.uri().path()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.request.headers()
    }

    /// First value of a request header, empty when absent.
    pub fn request_header(&self, key: &str) -> &str {
        self.request.header_str(key)
    }

    /// The media type of the body, without parameters.
    pub fn content_type(&self) -> &str {
        let value = self.request_header("content-type");
        value.split([';', ' ']).next().unwrap_or_default().trim()
    }

    pub fn is_websocket(&self) -> bool {
        self.request_header("connection").to_ascii_lowercase().contains("upgrade")
            && self.request_header("upgrade").eq_ignore_ascii_case("websocket")
    }

    /// Value of a path parameter, empty when absent.
    pub fn param(&self, key: &str) -> &str {
        self.params.by_name(key)
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Adds a path parameter; mostly useful in tests.
    pub fn add_param(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.params.push(key, value);
    }

    pub fn writer(&mut self) -> &mut ResponseWriter {
        &mut self.writer
    }

    pub fn response(&self) -> &ResponseWriter {
        &self.writer
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("method", self.method())
            .field("uri", self.uri())
            .field("full_path", &self.full_path())
            .field("params", &self.params)
            .field("index", &self.index)
            .field("handlers", &self.handlers.len())
            .field("writer", &self.writer)
            .field("errors", &self.errors.len())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::writer::Recorder;

    pub fn context_for(request: Request<Bytes>) -> (Context, Recorder) {
        context_with(request, EngineConfig::default())
    }

    pub fn context_with(request: Request<Bytes>, config: EngineConfig) -> (Context, Recorder) {
        let recorder = Recorder::new();
        let mut ctx = Context::new(Arc::new(config));
        ctx.reset(request, recorder.sink());
        (ctx, recorder)
    }

    pub fn get(uri: &str) -> Request<Bytes> {
        Request::builder().uri(uri).body(Bytes::new()).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{context_for, get};
    use super::*;
    use http::StatusCode;
    use parking_lot::Mutex;


    #[test]
    fn test_next_runs_in_order_and_unwinds() {
        let trace = Arc::new(Mutex::new(String::new()));
        let (t1, t2, t3) = (trace.clone(), trace.clone(), trace.clone());

        let (mut ctx, _) = context_for(get("/"));
        let handlers: Vec<HandlerFunc> = vec![
            Arc::new(move |ctx: &mut Context| {
                t1.lock().push('A');
                ctx.next();
                t1.lock().push('a');
            }),
            Arc::new(move |ctx: &mut Context| {
                t2.lock().push('B');
                ctx.next();
                t2.lock().push('b');
            }),
            Arc::new(move |_: &mut Context| t3.lock().push('C')),
        ];
        ctx.handlers = HandlersChain::from(handlers);
        ctx.next();

        assert_eq!(*trace.lock(), "ABCba");
    }

    #[test]
    fn test_abort_stops_pending_handlers() {
        let trace = Arc::new(Mutex::new(String::new()));
        let (t1, t2) = (trace.clone(), trace.clone());

        let (mut ctx, recorder) = context_for(get("/"));
        let handlers: Vec<HandlerFunc> = vec![
            Arc::new(move |ctx: &mut Context| {
                t1.lock().push('A');
                ctx.abort_with_status(StatusCode::UNAUTHORIZED);
                t1.lock().push('a');
            }),
            Arc::new(move |_: &mut Context| t2.lock().push('B')),
        ];
        ctx.handlers = HandlersChain::from(handlers);
        ctx.next();

        assert_eq!(*trace.lock(), "Aa");
        assert!(ctx.is_aborted());
        assert_eq!(recorder.status(), StatusCode::UNAUTHORIZED);
        assert!(recorder.committed());
    }

    #[test]
    fn test_handler_names() {
        fn first(_: &mut Context) {}
        fn main_handler(_: &mut Context) {}

        let (mut ctx, _) = context_for(get("/"));
        assert_eq!(ctx.handler_name(), "");
        let handlers: Vec<HandlerFunc> = vec![Arc::new(first), Arc::new(main_handler)];
        ctx.handlers = HandlersChain::from(handlers);

        assert!(ctx.handler_name().ends_with("main_handler"));
        assert_eq!(ctx.handler_names().len(), 2);
        assert!(ctx.handler().is_some());
    }

    #[test]
    fn test_keys() {
        let (ctx, _) = context_for(get("/"));

        ctx.set("foo", "bar".to_string());
        ctx.set("count", 3i64);
        ctx.set("ok", true);
        ctx.set("ratio", 0.5f64);
        ctx.set("ttl", Duration::from_secs(1));
        ctx.set("list", vec!["a".to_string()]);

        assert_eq!(ctx.get::<String>("foo").as_deref(), Some("bar"));
        assert_eq!(ctx.get::<i64>("foo"), None);
        assert_eq!(ctx.must_get::<String>("foo"), "bar");
        assert!(ctx.exists("foo"));
        assert!(!ctx.exists("nope"));

        assert_eq!(ctx.get_string("foo"), "bar");
        assert_eq!(ctx.get_i64("count"), 3);
        assert_eq!(ctx.get_u64("count"), 0);
        assert!(ctx.get_bool("ok"));
        assert_eq!(ctx.get_f64("ratio"), 0.5);
        assert_eq!(ctx.get_duration("ttl"), Duration::from_secs(1));
        assert_eq!(ctx.get_string_slice("list"), ["a"]);
        assert!(ctx.get_string_map("missing").is_empty());
        assert!(ctx.value("foo").is_some());

        let mut keys = ctx.keys();
        keys.sort();
        assert_eq!(keys, ["count", "foo", "list", "ok", "ratio", "ttl"]);
    }

    #[test]
    #[should_panic(expected = "key \"missing\" does not exist")]
    fn test_must_get_panics() {
        let (ctx, _) = context_for(get("/"));
        let _: String = ctx.must_get("missing");
    }

    #[test]
    fn test_copy() {
        let (mut ctx, recorder) = context_for(get("/hola?x=1"));
        ctx.add_param("id", "7");
        ctx.full_path = Some(Arc::from("/hola"));
        ctx.set("foo", "bar".to_string());

        let mut copy = ctx.copy();
        assert!(copy.is_aborted());
        assert_eq!(copy.param("id"), "7");
        assert_eq!(copy.full_path(), "/hola");
        assert_eq!(copy.uri(), "/hola?x=1");
        assert_eq!(copy.get_string("foo"), "bar");

        // keys are shared, params are not
        copy.set("from_copy", 1i64);
        assert_eq!(ctx.get_i64("from_copy"), 1);
        copy.params.set("id", "8");
        assert_eq!(ctx.param("id"), "7");

        // the copy cannot reach the client
        assert!(copy.writer().write_string("late").is_err());
        assert!(!recorder.committed());
    }

    #[test]
    fn test_reset_clears_state() {
        let (mut ctx, _) = context_for(get("/a?x=1"));
        ctx.add_param("id", "1");
        ctx.set("foo", "bar".to_string());
        ctx.error("boom");
        ctx.abort();
        let copy = ctx.copy();

        let recorder = crate::writer::Recorder::new();
        ctx.reset(get("/b"), recorder.sink());

        assert_eq!(ctx.path(), "/b");
        assert!(ctx.params().is_empty());
        assert!(!ctx.exists("foo"));
        assert!(ctx.errors().is_empty());
        assert!(!ctx.is_aborted());
        assert_eq!(ctx.full_path(), "");
        assert_eq!(ctx.query("x"), "");
        // the copy still sees the old keys and is unaffected by the new request
        assert_eq!(copy.get_string("foo"), "bar");
        ctx.set("foo", "new".to_string());
        assert_eq!(copy.get_string("foo"), "bar");
    }

    #[test]
    fn test_errors() {
        let (mut ctx, _) = context_for(get("/"));
        ctx.error("first");
        ctx.error(std::io::Error::other("second")).set_kind(ErrorKind::Public);

        assert_eq!(ctx.errors().len(), 2);
        assert_eq!(ctx.errors().by_kind(ErrorKind::Public).len(), 1);
        assert_eq!(ctx.errors().last().map(|e| e.kind()), Some(ErrorKind::Public));
    }

    #[test]
    fn test_request_accessors() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/upload?x=1")
            .header("content-type", "application/json; charset=utf-8")
            .header("connection", "keep-alive, Upgrade")
            .header("upgrade", "websocket")
            .body(Bytes::new())
            .unwrap();
        let (ctx, _) = context_for(request);

        assert_eq!(ctx.method(), Method::POST);
        assert_eq!(ctx.path(), "/upload");
        assert_eq!(ctx.content_type(), "application/json");
        assert!(ctx.is_websocket());
        assert_eq!(ctx.request_header("x-missing"), "");
        assert_eq!(ctx.param("missing"), "");
        assert!(ctx.deadline().is_none());
        assert!(ctx.err().is_none());
    }
}
