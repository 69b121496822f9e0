//! # HTTP Server
//!
//! Runs a [`MiddlewareChain`] behind Hyper and Tokio.
//!
//! ## Key Features
//!
//! - Async request handling with Tokio runtime
//! - Graceful shutdown on Ctrl-C with a drain timeout
//! - Connection keep-alive support
//! - Request body size limit (`413 Payload Too Large`), enforced while the
//!   body streams in
//! - In-process requests for tests ([`Server::test_request`]), built by the
//!   same code as network requests

use crate::error::{Error, Result};
use crate::host::{Context, MiddlewareChain};
use crate::json::parse_body;
use crate::request::StringMap;
use crate::route::Method;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Body;
pub use hyper::body::Bytes;
use hyper::header::{HeaderName, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::StatusCode;
use hyper_util::rt::TokioIo;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::error::Error as StdError;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// HTTP Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to
    pub address: SocketAddr,
    /// Enable keep-alive connections
    pub keep_alive: bool,
    /// Shutdown timeout for graceful shutdown (default: 30 seconds)
    pub shutdown_timeout: Duration,
    /// Max request body size in bytes
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: ([127, 0, 0, 1], 8000).into(),
            keep_alive: true,
            shutdown_timeout: Duration::from_secs(30),
            max_body_size: 1024 * 1024,
        }
    }
}

/// HTTP server running one middleware chain
pub struct Server {
    config: ServerConfig,
    chain: Arc<MiddlewareChain>,
}

impl Server {
    /// Serve `chain` with the default configuration
    #[must_use]
    pub fn new(chain: MiddlewareChain) -> Self {
        Self {
            config: ServerConfig::default(),
            chain: Arc::new(chain),
        }
    }

    /// Replace the configuration
    #[must_use]
    pub fn with_config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Bind the server to an address
    #[must_use]
    pub const fn bind(mut self, addr: SocketAddr) -> Self {
        self.config.address = addr;
        self
    }

    /// Set max request body size
    pub fn set_max_body_size(&mut self, bytes: usize) {
        self.config.max_body_size = bytes;
    }

    /// Current configuration
    #[must_use]
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Start the server with graceful shutdown
    ///
    /// # Errors
    ///
    /// Returns `Error::BindError` if the address cannot be bound, or an IO
    /// error from the listener.
    pub async fn serve(&self) -> Result<()> {
        let addr = self.config.address;
        let bind_error = |source: std::io::Error| Error::BindError {
            address: addr.to_string(),
            source,
        };

        let socket = if addr.is_ipv4() {
            tokio::net::TcpSocket::new_v4()
        } else {
            tokio::net::TcpSocket::new_v6()
        }
        .map_err(bind_error)?;
        socket.set_reuseaddr(true).map_err(bind_error)?;
        socket.bind(addr).map_err(bind_error)?;
        let listener = socket.listen(1024)?;

        info!(address = %addr, "Server listening");

        let active = Arc::new(AtomicUsize::new(0));
        let max_body_size = self.config.max_body_size;
        let keep_alive = self.config.keep_alive;

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    let (stream, remote_addr) = accept_result?;
                    let io = TokioIo::new(stream);
                    let chain = Arc::clone(&self.chain);
                    let active = Arc::clone(&active);

                    tokio::task::spawn(async move {
                        active.fetch_add(1, Ordering::Relaxed);

                        let service = service_fn(move |req| {
                            let chain = Arc::clone(&chain);
                            async move { handle_request(req, &chain, remote_addr, max_body_size).await }
                        });
                        if let Err(err) = http1::Builder::new()
                            .keep_alive(keep_alive)
                            .serve_connection(io, service)
                            .await
                        {
                            error!(error = ?err, "Error serving connection");
                        }

                        active.fetch_sub(1, Ordering::Relaxed);
                    });
                }
                () = shutdown_signal() => {
                    info!("Shutdown signal received, stopping server...");
                    break;
                }
            }
        }

        let drain = async {
            while active.load(Ordering::Relaxed) > 0 {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        };
        if tokio::time::timeout(self.config.shutdown_timeout, drain).await.is_err() {
            warn!(
                connections = active.load(Ordering::Relaxed),
                "Shutdown timeout elapsed with connections still open"
            );
        }
        Ok(())
    }

    /// Run a request through the chain without the network stack
    ///
    /// `target` is the path plus optional query string. The returned context
    /// carries the response status, body and headers.
    pub async fn test_request(
        &self,
        method: Method,
        target: &str,
        headers: StringMap,
        body: Option<Bytes>,
    ) -> Context {
        let body = body.unwrap_or_default();
        let headers = headers.iter().map(|(name, value)| (name.as_str(), value.as_str()));
        let mut ctx = match build_context(method, target, headers, &body, self.config.max_body_size) {
            Ok(ctx) => ctx,
            Err(err) => {
                let mut ctx = Context::new(method, target);
                let (status, payload) = rejection(&err);
                ctx.set_status(status);
                ctx.set_body(payload);
                return ctx;
            }
        };
        ctx.set_header("x-client-ip", "test");

        self.chain.handle(&mut ctx).await;
        ctx
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "Failed to install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
}

async fn handle_request<B>(
    req: hyper::Request<B>,
    chain: &MiddlewareChain,
    remote_addr: SocketAddr,
    max_body_size: usize,
) -> std::result::Result<hyper::Response<Full<Bytes>>, Infallible>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let mut ctx = match context_from_hyper(req, max_body_size).await {
        Ok(ctx) => ctx,
        Err(err) => {
            warn!(method = %method, path = %path, error = %err, "Rejected request");
            return Ok(error_response(&err));
        }
    };
    ctx.set_header("x-client-ip", remote_addr.ip().to_string());

    chain.handle(&mut ctx).await;

    info!(
        remote = %remote_addr,
        method = %method,
        path = %path,
        status = ctx.response_status(),
        "Request handled"
    );
    Ok(into_hyper(&ctx))
}

async fn context_from_hyper<B>(req: hyper::Request<B>, max_body_size: usize) -> Result<Context>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let (parts, body) = req.into_parts();
    let method = Method::try_from(&parts.method).map_err(|e| Error::http(405, json!({ "error": e.to_string() })))?;
    let target = parts
        .uri
        .path_and_query()
        .map_or_else(|| parts.uri.path().to_string(), |pq| pq.as_str().to_string());

    if parts
        .headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())
        .is_some_and(|len| len > max_body_size)
    {
        return Err(Error::PayloadTooLarge { limit: max_body_size });
    }

    let bytes = Limited::new(body, max_body_size)
        .collect()
        .await
        .map_err(|err| body_error(err, max_body_size))?
        .to_bytes();

    let headers = parts
        .headers
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|value| (name.as_str(), value)));
    build_context(method, &target, headers, &bytes, max_body_size)
}

fn body_error(err: Box<dyn StdError + Send + Sync>, limit: usize) -> Error {
    if err.is::<LengthLimitError>() {
        return Error::PayloadTooLarge { limit };
    }
    match err.downcast::<hyper::Error>() {
        Ok(err) => Error::Hyper(*err),
        Err(err) => Error::InvalidBody {
            reason: err.to_string(),
        },
    }
}

/// Context for one request, from either transport
///
/// Enforces the body limit and parses the JSON body.
fn build_context<'h>(
    method: Method,
    target: &str,
    headers: impl IntoIterator<Item = (&'h str, &'h str)>,
    body: &[u8],
    max_body_size: usize,
) -> Result<Context> {
    if body.len() > max_body_size {
        return Err(Error::PayloadTooLarge { limit: max_body_size });
    }

    let mut ctx = Context::new(method, target);
    for (name, value) in headers {
        ctx.set_header(name, value);
    }
    Ok(ctx.with_body(parse_body(body)?))
}

/// Status and payload for a request the chain never saw
fn rejection(err: &Error) -> (u16, Value) {
    let payload = match err {
        Error::Http { payload, .. } => payload.clone(),
        other => json!({ "error": other.to_string() }),
    };
    (err.status(), payload)
}

fn error_response(err: &Error) -> hyper::Response<Full<Bytes>> {
    let (status, payload) = rejection(err);
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    json_response(status, &payload)
}

fn json_response(status: StatusCode, payload: &Value) -> hyper::Response<Full<Bytes>> {
    let body = serde_json::to_vec(payload).unwrap_or_default();
    let mut response = hyper::Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

fn into_hyper(ctx: &Context) -> hyper::Response<Full<Bytes>> {
    let status = StatusCode::from_u16(ctx.response_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = match ctx.response_body() {
        Some(body) => json_response(status, body),
        None => {
            let mut response = hyper::Response::new(Full::new(Bytes::new()));
            *response.status_mut() = status;
            response
        }
    };

    for (name, value) in ctx.response_headers() {
        if let (Ok(name), Ok(value)) = (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            response.headers_mut().insert(name, value);
        }
    }
    response
}
