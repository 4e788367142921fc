#![allow(clippy::return_self_not_must_use)]
#![doc = include_str!("../README.md")]

//! ## Architecture
//!
//! - `Router`: the route table. Resolves `(method, path)` to a route with
//!   its placeholder values bound, or to a typed 404/405 error
//! - `App`: registration-phase builder for routes, controllers and middleware
//! - `AppService`: the frozen application; runs middleware, dispatches to
//!   the matched handler and renders errors
//! - `Server`: hyper front end that runs each request on a blocking worker
//!
//! ## Configuration
//! Server settings can be configured via:
//! - Environment variables (prefixed with `TRELLIS_`)
//! - Configuration file (`trellis.toml`)
//! - Builder pattern API
//!
//! ## Features
//! - `http2`: Enables HTTP/2 support (enabled by default)

pub use crate::app::{default_error_response, App, AppService};
pub use crate::config::ServerConfig;
pub use crate::error::{Error, RegistrationError, Result, RouterError, UrlError};
pub use crate::handler::{Constructor, Controller, Endpoint, Handler};
pub use crate::http::{text, Body, BodyReader, Bytes, Request, RequestExt, Response, ResponseBuilder};
pub use crate::middleware::{FnMiddleware, Middleware, Next, RequestLogger};
pub use crate::route::{Attributes, MatchedRoute, Route};
pub use crate::router::Router;
pub use crate::server::{ConnectionInfo, Server, Service};

mod app;
mod config;
mod error;
mod handler;
mod http;
mod middleware;
mod pattern;
mod route;
mod router;
mod server;

// Re-export common types
pub use hyper;
pub use hyper::Method;
