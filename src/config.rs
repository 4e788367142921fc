use serde::Deserialize;
use std::convert::TryFrom;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

/// Configuration for the HTTP server and the blocking worker pool.
///
/// Missing keys fall back to [`ServerConfig::default`]. Values are read
/// from an optional `trellis` config file and from environment variables
/// prefixed with `TRELLIS_`, e.g. `TRELLIS_PORT=9000`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Maximum number of blocking worker threads running handlers.
    /// Defaults to CPU count * 15.
    pub max_workers: usize,
    /// Seconds an idle worker thread is kept alive.
    pub worker_keep_alive_secs: u64,
    pub host: String,
    pub port: u16,
    /// Percent-decode request paths before routing.
    pub decode_paths: bool,
    pub http1_keep_alive: bool,
    pub http1_half_close: bool,
    /// Maximum buffer size for HTTP/1.x requests, 512kb by default.
    pub http1_max_buf_size: usize,
    pub http1_pipeline_flush: bool,
    pub http1_writev: bool,
    pub http1_title_case_headers: bool,
    pub http1_preserve_header_case: bool,
    pub http1_only: bool,
    #[cfg(feature = "http2")]
    pub http2_only: bool,
    #[cfg(feature = "http2")]
    pub http2_initial_stream_window_size: Option<u32>,
    #[cfg(feature = "http2")]
    pub http2_initial_connection_window_size: Option<u32>,
    #[cfg(feature = "http2")]
    pub http2_adaptive_window: bool,
    #[cfg(feature = "http2")]
    pub http2_max_frame_size: Option<u32>,
    #[cfg(feature = "http2")]
    pub http2_max_concurrent_streams: Option<u32>,
    #[cfg(feature = "http2")]
    pub http2_max_send_buf_size: usize,
}

impl TryFrom<config::Config> for ServerConfig {
    type Error = config::ConfigError;

    fn try_from(config: config::Config) -> Result<Self, Self::Error> {
        config.try_deserialize()
    }
}

impl ServerConfig {
    /// Loads configuration from the environment.
    ///
    /// This will:
    /// 1. Load environment variables from a `.env` file if present
    /// 2. Read a `trellis` config file (`trellis.toml`, `trellis.json`, ...)
    ///    if one exists in the working directory
    /// 3. Override with environment variables prefixed with `TRELLIS_`
    ///
    /// # Errors
    /// Returns a ConfigError if a source cannot be read or a value has the
    /// wrong type.
    pub fn new() -> Result<Self, config::ConfigError> {
        dotenv::dotenv().ok();

        config::Config::builder()
            .add_source(config::File::with_name("trellis").required(false))
            .add_source(config::Environment::with_prefix("TRELLIS"))
            .build()?
            .try_into()
    }

    /// Loads configuration from a single file; the format follows the
    /// extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .build()?
            .try_into()
    }

    pub fn worker_keep_alive(&self) -> Duration {
        Duration::from_secs(self.worker_keep_alive_secs)
    }

    /// Resolves `host:port` into a socket address.
    pub fn addr(&self) -> io::Result<SocketAddr> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("{}:{} does not resolve to an address", self.host, self.port),
                )
            })
    }

    /// Builds the tokio runtime the server runs on. Handlers execute on its
    /// blocking pool, bounded by `max_workers`.
    pub fn runtime(&self) -> io::Result<tokio::runtime::Runtime> {
        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("trellis-worker")
            .max_blocking_threads(self.max_workers.max(1))
            .thread_keep_alive(self.worker_keep_alive())
            .build()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_workers: num_cpus::get() * 15,
            worker_keep_alive_secs: 6,
            host: String::from("127.0.0.1"),
            port: 3000,
            decode_paths: true,
            http1_keep_alive: true,
            http1_half_close: false,
            http1_max_buf_size: 524_288,
            http1_pipeline_flush: false,
            http1_writev: true,
            http1_title_case_headers: false,
            http1_preserve_header_case: false,
            http1_only: false,
            #[cfg(feature = "http2")]
            http2_only: false,
            #[cfg(feature = "http2")]
            http2_initial_stream_window_size: None,
            #[cfg(feature = "http2")]
            http2_initial_connection_window_size: None,
            #[cfg(feature = "http2")]
            http2_adaptive_window: true,
            #[cfg(feature = "http2")]
            http2_max_frame_size: None,
            #[cfg(feature = "http2")]
            http2_max_concurrent_streams: None,
            #[cfg(feature = "http2")]
            http2_max_send_buf_size: 524_288,
        }
    }
}
