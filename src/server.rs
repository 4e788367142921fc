//! The hyper front end.
//!
//! Connections are accepted and parsed on the tokio runtime. Each request
//! is then handed to a blocking worker thread, where the [`Service`] runs
//! synchronously. A panicking service yields a `500` and leaves the
//! connection usable.

use std::convert::Infallible;
use std::future::Future;
use std::io;
use std::net::{self, SocketAddr};
use std::sync::Arc;

use hyper::server::conn::AddrStream;
use hyper::service::{make_service_fn, service_fn};
use hyper::StatusCode;

use crate::config::ServerConfig;
use crate::error::Result;
use crate::http::{text, Body, Request, Response};

/// Addresses of the connection a request arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub peer_addr: SocketAddr,
    pub local_addr: SocketAddr,
}

/// Something that turns a request into a response on a worker thread.
///
/// Implemented for closures, and for [`AppService`](crate::AppService),
/// which files `info` in the request extensions for
/// [`RequestExt::connection_info`](crate::RequestExt::connection_info).
pub trait Service: Send + Sync + 'static {
    fn call(&self, request: Request, info: ConnectionInfo) -> Response;
}

impl<F> Service for F
where
    F: Fn(Request, ConnectionInfo) -> Response + Send + Sync + 'static,
{
    fn call(&self, request: Request, info: ConnectionInfo) -> Response {
        (self)(request, info)
    }
}

enum Listen {
    Addr(String),
    Config,
    Listener(net::TcpListener),
}

/// An HTTP server.
///
/// ```no_run
/// use trellis::{text, ConnectionInfo, Request, Server};
///
/// #[tokio::main]
/// async fn main() -> trellis::Result<()> {
///     Server::bind("127.0.0.1:3000")
///         .serve(|_req: Request, _info: ConnectionInfo| text(200, "Hello World!"))
///         .await
/// }
/// ```
pub struct Server {
    listen: Listen,
    config: ServerConfig,
}

impl Server {
    /// A server listening on `addr`, resolved when serving starts.
    pub fn bind(addr: impl Into<String>) -> Self {
        Self {
            listen: Listen::Addr(addr.into()),
            config: ServerConfig::default(),
        }
    }

    /// A server listening on the configured host and port.
    pub fn from_config(config: ServerConfig) -> Self {
        Self {
            listen: Listen::Config,
            config,
        }
    }

    /// A server accepting connections from an already bound listener.
    pub fn from_listener(listener: net::TcpListener) -> Self {
        Self {
            listen: Listen::Listener(listener),
            config: ServerConfig::default(),
        }
    }

    /// Replaces the protocol settings; the listen address is unchanged.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Serves until the listener fails.
    pub async fn serve<S: Service>(self, service: S) -> Result<()> {
        self.serve_with_shutdown(service, std::future::pending()).await
    }

    /// Serves until `signal` resolves, then stops accepting connections and
    /// waits for in-flight requests to finish.
    pub async fn serve_with_shutdown<S, F>(self, service: S, signal: F) -> Result<()>
    where
        S: Service,
        F: Future<Output = ()>,
    {
        let builder = match self.listen {
            Listen::Addr(addr) => {
                let addr = resolve(&addr)?;
                hyper::Server::try_bind(&addr)?
            }
            Listen::Config => hyper::Server::try_bind(&self.config.addr()?)?,
            Listen::Listener(listener) => {
                listener.set_nonblocking(true)?;
                hyper::Server::from_tcp(listener)?
            }
        };

        let config = &self.config;
        let builder = builder
            .http1_keepalive(config.http1_keep_alive)
            .http1_half_close(config.http1_half_close)
            .http1_max_buf_size(config.http1_max_buf_size)
            .http1_pipeline_flush(config.http1_pipeline_flush)
            .http1_writev(config.http1_writev)
            .http1_title_case_headers(config.http1_title_case_headers)
            .http1_preserve_header_case(config.http1_preserve_header_case)
            .http1_only(config.http1_only);

        #[cfg(feature = "http2")]
        let builder = builder
            .http2_only(config.http2_only)
            .http2_initial_stream_window_size(config.http2_initial_stream_window_size)
            .http2_initial_connection_window_size(config.http2_initial_connection_window_size)
            .http2_adaptive_window(config.http2_adaptive_window)
            .http2_max_frame_size(config.http2_max_frame_size)
            .http2_max_concurrent_streams(config.http2_max_concurrent_streams)
            .http2_max_send_buf_size(config.http2_max_send_buf_size);

        let service = Arc::new(service);
        let make_service = make_service_fn(move |conn: &AddrStream| {
            let service = service.clone();
            let info = ConnectionInfo {
                peer_addr: conn.remote_addr(),
                local_addr: conn.local_addr(),
            };
            async move {
                Ok::<_, Infallible>(service_fn(move |request: hyper::Request<hyper::Body>| {
                    let service = service.clone();
                    async move { Ok::<_, Infallible>(respond(service, request, info).await) }
                }))
            }
        });

        let server = builder.serve(make_service);
        log::info!("listening on http://{}", server.local_addr());
        server.with_graceful_shutdown(signal).await?;
        log::info!("server stopped");
        Ok(())
    }
}

async fn respond<S: Service>(
    service: Arc<S>,
    request: hyper::Request<hyper::Body>,
    info: ConnectionInfo,
) -> hyper::Response<hyper::Body> {
    let request = request.map(Body);
    let response = match tokio::task::spawn_blocking(move || service.call(request, info)).await {
        Ok(response) => response,
        Err(err) => {
            log::error!("request handler failed: {}", err);
            text(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        }
    };
    response.map(|body| body.0)
}

fn resolve(addr: &str) -> io::Result<SocketAddr> {
    net::ToSocketAddrs::to_socket_addrs(addr)?
        .next()
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{addr} does not resolve to an address"),
            )
        })
}
