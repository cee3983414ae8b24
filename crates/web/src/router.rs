//! Route registration.
//!
//! The [`Engine`] is the root group, mounted on `/`. [`RouterGroup`]s borrow
//! the engine mutably and add a base path and middleware to everything
//! registered through them:
//!
//! ```ignore
//! let mut engine = Engine::new();
//! let mut v1 = engine.group("/v1", logger());
//! v1.get("/users/:id", show_user);
//! v1.group("/admin", auth).post("/users", create_user);
//! ```

use crate::context::Context;
use crate::engine::Engine;
use crate::error::RouteError;
use crate::fs::{self, Dir};
use crate::handler::{HandlerFunc, HandlersChain, IntoHandlers};
use crate::path::join_paths;
use http::Method;
use std::fmt;
use std::path::PathBuf;

/// Methods registered by [`Routes::any`].
pub const ANY_METHODS: [Method; 9] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::HEAD,
    Method::OPTIONS,
    Method::DELETE,
    Method::CONNECT,
    Method::TRACE,
];

/// Registration surface shared by the engine and its groups.
///
/// The `try_*` methods report invalid or conflicting routes; the others panic
/// with the same message, since a broken route table is a programming error
/// that should stop the process at boot.
pub trait Routes: Sized {
    /// Absolute path every route of this group is mounted under.
    fn base_path(&self) -> &str;

    /// Registers `handlers`, after the group middleware, for `method` at the
    /// base path joined with `relative_path`.
    fn try_handle<H: IntoHandlers>(&mut self, method: Method, relative_path: &str, handlers: H) -> Result<&mut Self, RouteError>;

    fn handle<H: IntoHandlers>(&mut self, method: Method, relative_path: &str, handlers: H) -> &mut Self {
        match self.try_handle(method, relative_path, handlers) {
            Ok(this) => this,
            Err(e) => panic!("{e}"),
        }
    }

    fn get<H: IntoHandlers>(&mut self, relative_path: &str, handlers: H) -> &mut Self {
        self.handle(Method::GET, relative_path, handlers)
    }

    fn post<H: IntoHandlers>(&mut self, relative_path: &str, handlers: H) -> &mut Self {
        self.handle(Method::POST, relative_path, handlers)
    }

    fn put<H: IntoHandlers>(&mut self, relative_path: &str, handlers: H) -> &mut Self {
        self.handle(Method::PUT, relative_path, handlers)
    }

    fn delete<H: IntoHandlers>(&mut self, relative_path: &str, handlers: H) -> &mut Self {
        self.handle(Method::DELETE, relative_path, handlers)
    }

    fn patch<H: IntoHandlers>(&mut self, relative_path: &str, handlers: H) -> &mut Self {
        self.handle(Method::PATCH, relative_path, handlers)
    }

    fn head<H: IntoHandlers>(&mut self, relative_path: &str, handlers: H) -> &mut Self {
        self.handle(Method::HEAD, relative_path, handlers)
    }

    fn options<H: IntoHandlers>(&mut self, relative_path: &str, handlers: H) -> &mut Self {
        self.handle(Method::OPTIONS, relative_path, handlers)
    }

    /// Registers the same handlers for `methods`.
    fn try_match_methods<H: IntoHandlers>(&mut self, methods: &[Method], relative_path: &str, handlers: H) -> Result<&mut Self, RouteError> {
        let handlers = handlers.into_handlers();
        for method in methods {
            self.try_handle(method.clone(), relative_path, handlers.clone())?;
        }
        Ok(self)
    }

    fn match_methods<H: IntoHandlers>(&mut self, methods: &[Method], relative_path: &str, handlers: H) -> &mut Self {
        match self.try_match_methods(methods, relative_path, handlers) {
            Ok(this) => this,
            Err(e) => panic!("{e}"),
        }
    }

    /// Registers the handlers for every method in [`ANY_METHODS`].
    fn try_any<H: IntoHandlers>(&mut self, relative_path: &str, handlers: H) -> Result<&mut Self, RouteError> {
        self.try_match_methods(&ANY_METHODS, relative_path, handlers)
    }

    fn any<H: IntoHandlers>(&mut self, relative_path: &str, handlers: H) -> &mut Self {
        self.match_methods(&ANY_METHODS, relative_path, handlers)
    }

    /// Serves one local file at `relative_path` for `GET` and `HEAD`.
    fn try_static_file(&mut self, relative_path: &str, filepath: impl Into<PathBuf>) -> Result<&mut Self, RouteError> {
        reject_wildcards(relative_path)?;
        let filepath = filepath.into();
        let handler = move |ctx: &mut Context| ctx.file(&filepath);
        let handlers = handler.into_handlers();
        self.try_handle(Method::GET, relative_path, handlers.clone())?;
        self.try_handle(Method::HEAD, relative_path, handlers)
    }

    fn static_file(&mut self, relative_path: &str, filepath: impl Into<PathBuf>) -> &mut Self {
        match self.try_static_file(relative_path, filepath) {
            Ok(this) => this,
            Err(e) => panic!("{e}"),
        }
    }

    /// Serves the tree under `root` below `relative_path` for `GET` and
    /// `HEAD`. Missing files run the engine's no-route handlers.
    fn try_static_dir(&mut self, relative_path: &str, root: impl Into<PathBuf>) -> Result<&mut Self, RouteError> {
        reject_wildcards(relative_path)?;
        let pattern = join_paths(relative_path, "/*filepath");
        let handlers = fs::static_handler(Dir::new(root)).into_handlers();
        self.try_handle(Method::GET, &pattern, handlers.clone())?;
        self.try_handle(Method::HEAD, &pattern, handlers)
    }

    fn static_dir(&mut self, relative_path: &str, root: impl Into<PathBuf>) -> &mut Self {
        match self.try_static_dir(relative_path, root) {
            Ok(this) => this,
            Err(e) => panic!("{e}"),
        }
    }
}

fn reject_wildcards(relative_path: &str) -> Result<(), RouteError> {
    if relative_path.contains([':', '*']) {
        return Err(RouteError::WildcardInStaticPath { path: relative_path.to_string() });
    }
    Ok(())
}

/// Routes sharing a base path and middleware.
pub struct RouterGroup<'e> {
    engine: &'e mut Engine,
    base_path: String,
    handlers: Vec<HandlerFunc>,
}

impl<'e> RouterGroup<'e> {
    pub(crate) fn new(engine: &'e mut Engine, base_path: String, handlers: Vec<HandlerFunc>) -> Self {
        Self { engine, base_path, handlers }
    }

    /// Adds middleware to the group. Routes registered before the call are
    /// not affected.
    pub fn use_middleware<H: IntoHandlers>(&mut self, middleware: H) -> &mut Self {
        self.handlers.extend(middleware.into_handlers());
        self
    }

    /// A nested group: base paths are joined, middleware is appended.
    pub fn group<H: IntoHandlers>(&mut self, relative_path: &str, middleware: H) -> RouterGroup<'_> {
        let mut handlers = self.handlers.clone();
        handlers.extend(middleware.into_handlers());
        RouterGroup::new(self.engine, join_paths(&self.base_path, relative_path), handlers)
    }

    pub fn handlers(&self) -> &[HandlerFunc] {
        &self.handlers
    }
}

impl Routes for RouterGroup<'_> {
    fn base_path(&self) -> &str {
        &self.base_path
    }

    fn try_handle<H: IntoHandlers>(&mut self, method: Method, relative_path: &str, handlers: H) -> Result<&mut Self, RouteError> {
        let absolute_path = join_paths(&self.base_path, relative_path);
        let handlers = HandlersChain::combine(&self.handlers, handlers.into_handlers())?;
        self.engine.add_route(method, &absolute_path, handlers)?;
        Ok(self)
    }
}

impl fmt::Debug for RouterGroup<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterGroup").field("base_path", &self.base_path).field("handlers", &self.handlers.len()).finish()
    }
}
