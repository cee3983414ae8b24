//! A small HTTP framework core: a radix-tree router with per-method trees,
//! middleware chains with cooperative `next`/`abort`, a pooled request
//! [`Context`], response renderers and request bindings, served over hyper.
//!
//! ```no_run
//! use micro_engine::{Context, Engine, Routes, Server};
//! use http::StatusCode;
//!
//! # async fn run() -> Result<(), micro_engine::error::ServerError> {
//! let mut engine = Engine::default();
//! engine.get("/hello/:name", |ctx: &mut Context| {
//!     let greeting = format!("hello {}", ctx.param("name"));
//!     ctx.string(StatusCode::OK, greeting);
//! });
//!
//! Server::new(engine).run("127.0.0.1:8080").await
//! # }
//! ```

mod context;
mod cookie;
mod engine;
mod fs;
mod handler;
mod multipart;
mod params;
mod request;
mod router;
mod server;
mod tree;
mod writer;

pub mod binding;
pub mod config;
pub mod error;
pub mod middleware;
pub mod path;
pub mod render;

pub use context::{BODY_BYTES_KEY, Context, ContextError, ErrorKind, Errors, Negotiate, Values};
pub use cookie::{Cookie, SameSite};
pub use engine::Engine;
pub use fs::Dir;
pub use handler::{Handler, HandlerFunc, HandlersChain, IntoHandlers};
pub use multipart::{FileHeader, MultipartForm};
pub use params::{Param, Params};
pub use request::{RemoteAddr, RequestHeader};
pub use router::{ANY_METHODS, RouterGroup, Routes};
pub use server::{ResponseBody, Server, ServerHandle};
pub use tree::RouteInfo;
pub use writer::{Recorder, ResponseSink, ResponseWriter};

use tracing::Level;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::FmtSubscriber;

/// Installs a formatting subscriber printing events up to `level`.
///
/// Fails when a global subscriber is already installed.
pub fn init_tracing(level: Level) -> Result<(), SetGlobalDefaultError> {
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)
}
