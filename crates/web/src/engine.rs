//! The engine: route table, global middleware, configuration and the context
//! pool.
//!
//! [`Engine::handle_request`] is the entry point a server calls once per request. It
//! takes a pooled [`Context`], finds the handler chain for the request in the
//! per-method trees, runs it, commits the response and puts the context back.

use crate::config::EngineConfig;
use crate::context::Context;
use crate::error::{ProxyError, RouteError};
use crate::handler::{HandlerFunc, HandlersChain, IntoHandlers};
use crate::middleware::{logger, recovery};
use crate::params::Params;
use crate::path::{clean_path, remove_repeated_char, unescape_path};
use crate::router::{RouterGroup, Routes};
use crate::binding::StructValidator;
use crate::tree::{self, MethodTrees, RouteInfo};
use crate::writer::{Recorder, ResponseSink};
use bytes::Bytes;
use http::header::{ALLOW, CONTENT_TYPE};
use http::{HeaderValue, Method, Request, StatusCode};
use parking_lot::Mutex;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

const DEFAULT_400_BODY: &str = "400 bad request";
const DEFAULT_404_BODY: &str = "404 page not found";
const DEFAULT_405_BODY: &str = "405 method not allowed";

pub struct Engine {
    trees: MethodTrees,
    /// Global middleware, the handlers of the root group.
    handlers: Vec<HandlerFunc>,
    no_route: HandlersChain,
    no_method: HandlersChain,
    all_no_route: HandlersChain,
    all_no_method: HandlersChain,
    config: Arc<EngineConfig>,
    max_params: usize,
    pool: Mutex<Vec<Context>>,
}

impl Engine {
    /// An engine without any middleware.
    pub fn new() -> Self {
        Self {
            trees: MethodTrees::default(),
            handlers: Vec::new(),
            no_route: HandlersChain::empty(),
            no_method: HandlersChain::empty(),
            all_no_route: HandlersChain::empty(),
            all_no_method: HandlersChain::empty(),
            config: Arc::new(EngineConfig::default()),
            max_params: 0,
            pool: Mutex::new(Vec::new()),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        *self.config_mut() = config;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Configuration is meant to be changed before serving; pooled contexts
    /// holding the previous one are dropped.
    pub fn config_mut(&mut self) -> &mut EngineConfig {
        self.pool.get_mut().clear();
        Arc::make_mut(&mut self.config)
    }

    pub fn redirect_trailing_slash(&mut self, enabled: bool) -> &mut Self {
        self.config_mut().redirect_trailing_slash = enabled;
        self
    }

    pub fn redirect_fixed_path(&mut self, enabled: bool) -> &mut Self {
        self.config_mut().redirect_fixed_path = enabled;
        self
    }

    pub fn handle_method_not_allowed(&mut self, enabled: bool) -> &mut Self {
        self.config_mut().handle_method_not_allowed = enabled;
        self
    }

    pub fn forwarded_by_client_ip(&mut self, enabled: bool) -> &mut Self {
        self.config_mut().forwarded_by_client_ip = enabled;
        self
    }

    pub fn use_raw_path(&mut self, enabled: bool) -> &mut Self {
        self.config_mut().use_raw_path = enabled;
        self
    }

    pub fn unescape_path_values(&mut self, enabled: bool) -> &mut Self {
        self.config_mut().unescape_path_values = enabled;
        self
    }

    pub fn remove_extra_slash(&mut self, enabled: bool) -> &mut Self {
        self.config_mut().remove_extra_slash = enabled;
        self
    }

    pub fn max_multipart_memory(&mut self, bytes: u64) -> &mut Self {
        self.config_mut().max_multipart_memory = bytes;
        self
    }

    pub fn secure_json_prefix(&mut self, prefix: impl Into<String>) -> &mut Self {
        self.config_mut().secure_json_prefix = prefix.into();
        self
    }

    /// Header set by a trusted platform (see [`crate::config::PLATFORM_CLOUDFLARE`]).
    pub fn trusted_platform(&mut self, header: impl Into<String>) -> &mut Self {
        self.config_mut().trusted_platform = Some(header.into());
        self
    }

    pub fn set_trusted_proxies<I, S>(&mut self, proxies: I) -> Result<&mut Self, ProxyError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.config_mut().set_trusted_proxies(proxies)?;
        Ok(self)
    }

    pub fn validator(&mut self, validator: impl StructValidator + 'static) -> &mut Self {
        self.config_mut().validator = Some(Arc::new(validator));
        self
    }

    /// Adds global middleware. It applies to routes registered afterwards and
    /// to the 404 and 405 handlers.
    pub fn use_middleware<H: IntoHandlers>(&mut self, middleware: H) -> &mut Self {
        self.handlers.extend(middleware.into_handlers());
        self.rebuild_404_handlers();
        self.rebuild_405_handlers();
        self
    }

    /// Handlers for requests no route matches. Without any, a plain text
    /// `404 page not found` is written.
    pub fn no_route<H: IntoHandlers>(&mut self, handlers: H) -> &mut Self {
        self.no_route = HandlersChain::from(handlers.into_handlers());
        self.rebuild_404_handlers();
        self
    }

    /// Handlers for paths that exist under other methods only, see
    /// [`EngineConfig::handle_method_not_allowed`].
    pub fn no_method<H: IntoHandlers>(&mut self, handlers: H) -> &mut Self {
        self.no_method = HandlersChain::from(handlers.into_handlers());
        self.rebuild_405_handlers();
        self
    }

    fn combined(&self, tail: &HandlersChain) -> HandlersChain {
        match HandlersChain::combine(&self.handlers, tail.as_slice().to_vec()) {
            Ok(chain) => chain,
            Err(e) => panic!("{e}"),
        }
    }

    fn rebuild_404_handlers(&mut self) {
        self.all_no_route = self.combined(&self.no_route);
    }

    fn rebuild_405_handlers(&mut self) {
        self.all_no_method = self.combined(&self.no_method);
    }

    /// A group below the root, inheriting the global middleware.
    pub fn group<H: IntoHandlers>(&mut self, relative_path: &str, middleware: H) -> RouterGroup<'_> {
        let mut handlers = self.handlers.clone();
        handlers.extend(middleware.into_handlers());
        let base_path = crate::path::join_paths("/", relative_path);
        RouterGroup::new(self, base_path, handlers)
    }

    pub(crate) fn add_route(&mut self, method: Method, path: &str, handlers: HandlersChain) -> Result<(), RouteError> {
        if !path.starts_with('/') {
            return Err(RouteError::PathMustBeginWithSlash { path: path.to_string() });
        }
        if handlers.is_empty() {
            return Err(RouteError::NoHandlers { path: path.to_string() });
        }

        let handler = handlers.last().map(|h| h.name()).unwrap_or_default();
        let count = handlers.len();
        self.trees.get_or_insert(&method).add_route(path, handlers)?;
        debug!(%method, path, handler, handlers = count, "route registered");

        self.max_params = self.max_params.max(tree::count_params(path));
        Ok(())
    }

    /// Every registered route.
    pub fn routes(&self) -> Vec<RouteInfo> {
        self.trees.routes()
    }

    fn allocate_context(&self) -> Context {
        let mut ctx = Context::new(Arc::clone(&self.config));
        ctx.params.reserve(self.max_params);
        ctx
    }

    /// Serves one request, writing the response into `sink`.
    pub fn handle_request(&self, request: Request<Bytes>, sink: Box<dyn ResponseSink>) {
        let pooled = self.pool.lock().pop();
        let mut ctx = pooled.unwrap_or_else(|| self.allocate_context());
        ctx.reset(request, sink);

        self.handle_http_request(&mut ctx);

        ctx.release();
        self.pool.lock().push(ctx);
    }

    /// Serves one request into an in-memory [`Recorder`].
    pub fn handle_recorded(&self, request: Request<Bytes>) -> Recorder {
        let recorder = Recorder::new();
        self.handle_request(request, recorder.sink());
        recorder
    }

    /// A context wired to a [`Recorder`], for exercising handlers and
    /// middleware without routing.
    pub fn test_context(&self, request: Request<Bytes>) -> (Context, Recorder) {
        let recorder = Recorder::new();
        let mut ctx = self.allocate_context();
        ctx.reset(request, recorder.sink());
        ctx.no_route = self.no_route.clone();
        (ctx, recorder)
    }

    fn handle_http_request(&self, ctx: &mut Context) {
        let config = &self.config;
        let method = ctx.method().clone();

        let (mut path, unescape) = if config.use_raw_path {
            (ctx.path().to_string(), config.unescape_path_values)
        } else {
            let Some(decoded) = unescape_path(ctx.path()).map(Cow::into_owned) else {
                debug!(path = ctx.path(), "undecodable request path");
                ctx.handlers = HandlersChain::empty();
                serve_error(ctx, StatusCode::BAD_REQUEST, DEFAULT_400_BODY);
                return;
            };
            (decoded, false)
        };
        if config.remove_extra_slash {
            path = clean_path(&path);
        }

        ctx.no_route = self.no_route.clone();

        if let Some(root) = self.trees.get(&method) {
            let value = root.get_value(&path, &mut ctx.params, unescape);
            if let Some(handlers) = value.handlers {
                ctx.handlers = handlers.clone();
                ctx.full_path = value.full_path.cloned();
                ctx.next();
                commit(ctx);
                return;
            }
            ctx.params.clear();

            if method != Method::CONNECT && path != "/" {
                if value.tsr && config.redirect_trailing_slash {
                    redirect_trailing_slash(ctx);
                    return;
                }
                if config.redirect_fixed_path && redirect_fixed_path(ctx, root, &path, config.redirect_trailing_slash) {
                    return;
                }
            }
        }

        if config.handle_method_not_allowed {
            let allowed = self.allowed_methods(&method, &path, unescape, &mut ctx.params);
            if !allowed.is_empty() {
                ctx.handlers = self.all_no_method.clone();
                if let Ok(value) = HeaderValue::from_str(&allowed.join(", ")) {
                    ctx.writer.headers_mut().insert(ALLOW, value);
                }
                serve_error(ctx, StatusCode::METHOD_NOT_ALLOWED, DEFAULT_405_BODY);
                return;
            }
        }

        ctx.handlers = self.all_no_route.clone();
        serve_error(ctx, StatusCode::NOT_FOUND, DEFAULT_404_BODY);
    }

    fn allowed_methods(&self, method: &Method, path: &str, unescape: bool, scratch: &mut Params) -> Vec<String> {
        let mut allowed = Vec::new();
        for (other, root) in self.trees.iter() {
            if other == method {
                continue;
            }
            let found = root.get_value(path, scratch, unescape).handlers.is_some();
            scratch.clear();
            if found {
                allowed.push(other.to_string());
            }
        }
        allowed
    }
}

impl Default for Engine {
    /// An engine with [`logger`] and [`recovery`] installed.
    fn default() -> Self {
        let mut engine = Engine::new();
        engine.use_middleware((logger(), recovery()));
        engine
    }
}

impl Routes for Engine {
    fn base_path(&self) -> &str {
        "/"
    }

    fn try_handle<H: IntoHandlers>(&mut self, method: Method, relative_path: &str, handlers: H) -> Result<&mut Self, RouteError> {
        let absolute_path = crate::path::join_paths("/", relative_path);
        let handlers = HandlersChain::combine(&self.handlers, handlers.into_handlers())?;
        self.add_route(method, &absolute_path, handlers)?;
        Ok(self)
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("routes", &self.routes().len())
            .field("middleware", &self.handlers.len())
            .field("max_params", &self.max_params)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn commit(ctx: &mut Context) {
    if let Err(e) = ctx.writer.write_header_now() {
        debug!(cause = %e, "failed to write response header");
    }
}

/// Runs the chain already set on `ctx` with `code` preset, then writes the
/// default body unless a handler responded or changed the status.
fn serve_error(ctx: &mut Context, code: StatusCode, default_message: &str) {
    ctx.status(code);
    ctx.next();
    if ctx.writer.written() {
        return;
    }
    if ctx.writer.status() == code {
        ctx.writer.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        if let Err(e) = ctx.writer.write_string(default_message) {
            debug!(cause = %e, "cannot write message to writer during serve error");
        }
        return;
    }
    commit(ctx);
}

fn redirect_trailing_slash(ctx: &mut Context) {
    let mut path = ctx.path().to_string();

    let prefix = ctx.request_header("x-forwarded-prefix");
    if !prefix.is_empty() {
        let prefix: String = clean_path(prefix).chars().filter(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '-')).collect();
        let prefix = remove_repeated_char(&prefix, '/');
        path = format!("{}{path}", prefix.trim_end_matches('/'));
    }

    let target = match path.strip_suffix('/') {
        Some(stripped) if path.len() > 1 => stripped.to_string(),
        _ => format!("{path}/"),
    };
    redirect_request(ctx, &target);
}

fn redirect_fixed_path(ctx: &mut Context, root: &tree::Node, path: &str, trailing_slash: bool) -> bool {
    match root.find_case_insensitive_path(&clean_path(path), trailing_slash) {
        Some(fixed) => {
            redirect_request(ctx, &fixed);
            true
        }
        None => false,
    }
}

/// 301 for `GET`, 307 otherwise so the method and body are replayed.
fn redirect_request(ctx: &mut Context, path: &str) {
    let code = if ctx.method() == Method::GET { StatusCode::MOVED_PERMANENTLY } else { StatusCode::TEMPORARY_REDIRECT };
    let location = match ctx.uri().query() {
        Some(query) => format!("{path}?{query}"),
        None => path.to_string(),
    };
    debug!(code = code.as_u16(), from = ctx.path(), to = %location, "redirecting request");
    ctx.redirect(code, &location);
    commit(ctx);
}
