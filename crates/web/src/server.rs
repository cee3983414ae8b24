//! HTTP/1 server adapter on top of hyper.
//!
//! Each connection is served by hyper; each request body is collected and the
//! synchronous [`Engine::handle_request`] runs on a blocking worker. The response head
//! travels back through a oneshot channel and body chunks through a bounded
//! channel, so streamed output reaches the client as it is flushed.

use crate::engine::Engine;
use crate::error::ServerError;
use crate::request::RemoteAddr;
use crate::writer::ResponseSink;
use bytes::Bytes;
use futures::StreamExt;
use http::{HeaderMap, Request, Response, StatusCode};
use http_body::Frame;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, StreamBody};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use hyper_util::server::graceful::GracefulShutdown;
use std::convert::Infallible;
use std::fmt;
use std::future::{self, Future};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Body chunks buffered between a handler and the connection.
const BODY_CHANNEL_CAPACITY: usize = 16;

pub type ResponseBody = UnsyncBoxBody<Bytes, Infallible>;

pub struct Server {
    engine: Arc<Engine>,
}

impl Server {
    pub fn new(engine: Engine) -> Self {
        Self { engine: Arc::new(engine) }
    }

    /// Binds `address` and serves until the process exits. Only returns on a
    /// bind failure.
    pub async fn run<A: ToSocketAddrs>(self, address: A) -> Result<(), ServerError> {
        let listener = bind(address).await?;
        serve(self.engine, listener, future::pending()).await;
        Ok(())
    }

    /// Binds `address` and serves in a background task.
    pub async fn spawn<A: ToSocketAddrs>(self, address: A) -> Result<ServerHandle, ServerError> {
        let listener = bind(address).await?;
        let local_addr = listener.local_addr().map_err(|source| ServerError::Bind { addr: unspecified(), source })?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(serve(self.engine, listener, async move {
            // a dropped handle stops the server as well
            let _ = shutdown_rx.await;
        }));

        Ok(ServerHandle { local_addr, shutdown_tx, task })
    }
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server").field("engine", &self.engine).finish()
    }
}

/// A running server started by [`Server::spawn`].
#[derive(Debug)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting connections, lets live connections finish their
    /// current request and waits up to `timeout` for them.
    pub async fn shutdown(self, timeout: Duration) -> Result<(), ServerError> {
        let _ = self.shutdown_tx.send(());
        match tokio::time::timeout(timeout, self.task).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ServerError::Task { message: e.to_string() }),
            Err(_elapsed) => Err(ServerError::ShutdownTimeout { timeout }),
        }
    }
}

fn unspecified() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 0))
}

async fn bind<A: ToSocketAddrs>(address: A) -> Result<TcpListener, ServerError> {
    let addresses: Vec<SocketAddr> = match tokio::net::lookup_host(address).await {
        Ok(resolved) => resolved.collect(),
        Err(e) => {
            warn!(cause = %e, "failed to resolve listen address");
            Vec::new()
        }
    };
    let first = *addresses.first().ok_or(ServerError::MissingAddress)?;

    let listener = TcpListener::bind(addresses.as_slice()).await.map_err(|source| ServerError::Bind { addr: first, source })?;
    info!(address = ?listener.local_addr().ok(), "start listening");
    Ok(listener)
}

async fn serve(engine: Arc<Engine>, listener: TcpListener, signal: impl Future<Output = ()>) {
    let graceful = GracefulShutdown::new();
    tokio::pin!(signal);

    loop {
        let (tcp_stream, remote_addr) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(stream_and_addr) => stream_and_addr,
                Err(e) => {
                    warn!(cause = %e, "failed to accept");
                    continue;
                }
            },
            () = &mut signal => break,
        };

        let engine = Arc::clone(&engine);
        let service = service_fn(move |request| dispatch(Arc::clone(&engine), remote_addr, request));
        let connection = http1::Builder::new().serve_connection(TokioIo::new(tcp_stream), service);
        let connection = graceful.watch(connection);

        tokio::spawn(async move {
            match connection.await {
                Ok(()) => debug!(%remote_addr, "connection closed"),
                Err(e) => debug!(%remote_addr, cause = %e, "connection closed with error"),
            }
        });
    }

    drop(listener);
    info!("stop accepting, waiting for live connections");
    graceful.shutdown().await;
    info!("server stopped");
}

async fn dispatch(engine: Arc<Engine>, remote_addr: SocketAddr, request: Request<Incoming>) -> Result<Response<ResponseBody>, Infallible> {
    let (mut parts, body) = request.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            debug!(cause = %e, "failed to read request body");
            return Ok(empty_response(StatusCode::BAD_REQUEST));
        }
    };
    parts.extensions.insert(RemoteAddr(remote_addr));
    let request = Request::from_parts(parts, body);

    let (head_tx, head_rx) = oneshot::channel();
    let (body_tx, mut body_rx) = mpsc::channel(BODY_CHANNEL_CAPACITY);
    let sink = ChannelSink { head: Some(head_tx), body: body_tx };

    let task = tokio::task::spawn_blocking(move || engine.handle_request(request, Box::new(sink)));

    let Ok((status, headers)) = head_rx.await else {
        // the sink was dropped before a head was sent: the handler panicked
        if let Err(e) = task.await {
            error!(cause = %e, "request handler failed");
        }
        return Ok(empty_response(StatusCode::INTERNAL_SERVER_ERROR));
    };

    let stream = futures::stream::poll_fn(move |cx| body_rx.poll_recv(cx)).map(|chunk| Ok::<_, Infallible>(Frame::data(chunk)));

    let mut response = Response::new(StreamBody::new(stream).boxed_unsync());
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    Ok(response)
}

fn empty_response(status: StatusCode) -> Response<ResponseBody> {
    let mut response = Response::new(Empty::new().boxed_unsync());
    *response.status_mut() = status;
    response
}

/// Bridges the synchronous writer to the connection task.
struct ChannelSink {
    head: Option<oneshot::Sender<(StatusCode, HeaderMap)>>,
    body: mpsc::Sender<Bytes>,
}

fn closed() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "client connection closed")
}

impl ResponseSink for ChannelSink {
    fn send_head(&mut self, status: StatusCode, headers: HeaderMap) -> io::Result<()> {
        let head = self.head.take().ok_or_else(|| io::Error::other("response head already sent"))?;
        head.send((status, headers)).map_err(|_unsent| closed())
    }

    fn send_chunk(&mut self, chunk: Bytes) -> io::Result<()> {
        self.body.blocking_send(chunk).map_err(|_unsent| closed())
    }

    fn flush(&mut self) -> io::Result<()> {
        // chunks are handed over as soon as they are written
        if self.body.is_closed() { Err(closed()) } else { Ok(()) }
    }
}
