//! Application builder and request dispatcher.
//!
//! An [`App`] collects routes, middleware and an error handler. Calling
//! [`App::into_service`] freezes it: the router moves behind an `Arc` and
//! can no longer change, so every request sees the same route table.

use std::fmt;
use std::sync::Arc;

use hyper::header::{HeaderValue, ALLOW};

use crate::config::ServerConfig;
use crate::error::{Error, RegistrationError, Result};
use crate::handler::{Controller, Endpoint, Handler};
use crate::http::{text, Request, Response};
use crate::middleware::{FnMiddleware, Middleware, Next};
use crate::route::{MatchedRoute, Route};
use crate::router::Router;
use crate::server::{ConnectionInfo, Server, Service};

type ErrorHandler = dyn Fn(Error) -> Response + Send + Sync;

/// Registration-phase application builder.
///
/// ```
/// use trellis::{text, App, Request, RequestExt};
///
/// let mut app = App::new();
/// app.get("/hello/{name}", |request: Request| {
///     let name = request.attribute("name").unwrap_or("stranger").to_owned();
///     text(200, format!("Hello {name}"))
/// })
/// .unwrap();
///
/// let service = app.into_service();
/// assert_eq!(service.router().len(), 1);
/// ```
pub struct App {
    router: Router<Endpoint>,
    middleware: Vec<Arc<dyn Middleware>>,
    error_handler: Arc<ErrorHandler>,
    config: ServerConfig,
}

macro_rules! method_shortcuts {
    ($($fn_name:ident),* $(,)?) => {
        $(
            #[doc = concat!("Registers `f` for `", stringify!($fn_name), "` requests on `path`.")]
            pub fn $fn_name<F>(&mut self, path: &str, f: F) -> std::result::Result<(), RegistrationError>
            where
                F: Fn(Request) -> Response + Send + Sync + 'static,
            {
                self.register(Route::$fn_name(path), f)
            }
        )*
    };
}

impl App {
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    pub fn with_config(config: ServerConfig) -> Self {
        Self {
            router: Router::new(),
            middleware: Vec::new(),
            error_handler: Arc::new(default_error_response),
            config,
        }
    }

    /// An application configured from `.env`, the `trellis` config file
    /// and `TRELLIS_*` variables.
    pub fn from_env() -> Result<Self> {
        Ok(Self::with_config(ServerConfig::new()?))
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Attaches `handler` to `route` and registers it.
    pub fn register(
        &mut self,
        route: Route,
        handler: impl Into<Handler>,
    ) -> std::result::Result<(), RegistrationError> {
        let endpoint = handler.into().resolve();
        log::debug!("attaching {} to {}", endpoint.label(), route.path());
        self.router.add(route.with_handler(endpoint))
    }

    /// Registers `f` on an arbitrary route.
    pub fn on<F>(&mut self, route: Route, f: F) -> std::result::Result<(), RegistrationError>
    where
        F: Fn(Request) -> Response + Send + Sync + 'static,
    {
        self.register(route, f)
    }

    /// Registers a controller type under its own route. A fresh controller
    /// is built for every request.
    pub fn controller<C: Controller + Default>(
        &mut self,
    ) -> std::result::Result<(), RegistrationError> {
        self.register(C::route(), Handler::constructor::<C>())
    }

    method_shortcuts!(get, post, put, patch, delete, options, head);

    /// Appends a middleware. The first one added is the outermost.
    pub fn wrap(&mut self, middleware: impl Middleware) -> &mut Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Appends a closure middleware.
    pub fn wrap_fn<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(Request, Next<'_>) -> Result<Response> + Send + Sync + 'static,
    {
        self.wrap(FnMiddleware(f))
    }

    /// Replaces the handler that turns pipeline errors into responses.
    pub fn on_error<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(Error) -> Response + Send + Sync + 'static,
    {
        self.error_handler = Arc::new(f);
        self
    }

    pub fn router(&self) -> &Router<Endpoint> {
        &self.router
    }

    /// Ends registration.
    pub fn into_service(self) -> AppService {
        log::debug!(
            "application frozen with {} routes and {} middleware",
            self.router.len(),
            self.middleware.len()
        );
        AppService {
            inner: Arc::new(Inner {
                router: self.router,
                middleware: self.middleware,
                error_handler: self.error_handler,
                decode_paths: self.config.decode_paths,
            }),
        }
    }

    /// Serves the application on the configured address.
    pub async fn serve(self) -> Result<()> {
        let server = Server::from_config(self.config.clone());
        server.serve(self.into_service()).await
    }

    /// Builds a runtime from the configuration and serves until Ctrl-C.
    pub fn run(self) -> Result<()> {
        let runtime = self.config.runtime()?;
        let server = Server::from_config(self.config.clone());
        let service = self.into_service();
        runtime.block_on(server.serve_with_shutdown(service, async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                log::error!("failed to listen for shutdown signal: {}", err);
                std::future::pending::<()>().await;
            }
        }))
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("routes", &self.router.len())
            .field("middleware", &self.middleware.len())
            .field("config", &self.config)
            .finish()
    }
}

struct Inner {
    router: Router<Endpoint>,
    middleware: Vec<Arc<dyn Middleware>>,
    error_handler: Arc<ErrorHandler>,
    decode_paths: bool,
}

/// A frozen application, shared by every request.
#[derive(Clone)]
pub struct AppService {
    inner: Arc<Inner>,
}

impl AppService {
    pub fn router(&self) -> &Router<Endpoint> {
        &self.inner.router
    }

    /// Runs a request through the middleware chain and the router, turning
    /// any error into a response.
    pub fn handle(&self, request: Request) -> Response {
        let dispatch = |request: Request| self.dispatch(request);
        match Next::new(&self.inner.middleware, &dispatch).run(request) {
            Ok(response) => response,
            Err(err) => (self.inner.error_handler)(err),
        }
    }

    fn dispatch(&self, mut request: Request) -> Result<Response> {
        let route = {
            let method = request.method().as_str();
            let path = request.uri().path();
            if self.inner.decode_paths {
                self.inner.router.find_encoded(method, path)?
            } else {
                self.inner.router.find(method, path)?
            }
        };

        let name = route.name();
        let endpoint = route.handler().cloned().ok_or_else(|| {
            Error::from(RegistrationError::MissingHandler { name: name.clone() })
        })?;
        log::debug!("{} {} -> {}", request.method(), request.uri().path(), name);

        let extensions = request.extensions_mut();
        extensions.insert(route.attributes().clone());
        extensions.insert(MatchedRoute(name));

        Ok(endpoint.invoke(request))
    }
}

impl Service for AppService {
    fn call(&self, mut request: Request, info: ConnectionInfo) -> Response {
        request.extensions_mut().insert(info);
        self.handle(request)
    }
}

impl fmt::Debug for AppService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppService")
            .field("routes", &self.inner.router.len())
            .field("middleware", &self.inner.middleware.len())
            .finish()
    }
}

/// 404 and 405 for routing failures (405 carries `Allow`), 500 otherwise.
pub fn default_error_response(err: Error) -> Response {
    let status = err.status_code();
    match &err {
        Error::Routing(routing) => {
            log::warn!("{}", routing);
            let mut response = text(status, status.canonical_reason().unwrap_or_default());
            if let Some(allow) = routing.allow_header() {
                if let Ok(value) = HeaderValue::from_str(&allow) {
                    response.headers_mut().insert(ALLOW, value);
                }
            }
            response
        }
        _ => {
            log::error!("request failed: {}", err);
            text(status, "Internal Server Error")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{Body, RequestExt};
    use hyper::{Method, StatusCode};

    fn request(method: Method, uri: &str) -> Request {
        let mut request = Request::new(Body::empty());
        *request.method_mut() = method;
        *request.uri_mut() = uri.parse().unwrap();
        request
    }

    fn body(response: Response) -> String {
        response.into_body().into_string().unwrap()
    }

    #[test]
    fn test_dispatch_binds_attributes() {
        let mut app = App::new();
        app.get("/hello/{name}", |request: Request| {
            let name = request.attribute("name").unwrap_or_default().to_owned();
            let route = request.route_name().unwrap_or_default().to_owned();
            text(200, format!("{name} via {route}"))
        })
        .unwrap();
        let service = app.into_service();

        let response = service.handle(request(Method::GET, "/hello/world?x=1"));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body(response), "world via GET /hello/{name}");
    }

    #[test]
    fn test_path_is_percent_decoded() {
        let mut app = App::new();
        app.get("/hello/{name}", |request: Request| {
            text(200, request.attribute("name").unwrap_or_default().to_owned())
        })
        .unwrap();
        let service = app.into_service();

        let response = service.handle(request(Method::GET, "/hello/j%C3%BCrgen%20k"));
        assert_eq!(body(response), "jürgen k");

        // An encoded slash stays inside its segment.
        let response = service.handle(request(Method::GET, "/hello/a%2Fb"));
        assert_eq!(body(response), "a/b");
        let response = service.handle(request(Method::GET, "/hello/a/b"));
        assert_eq!(response.status(), 404);
    }

    #[test]
    fn test_decoding_can_be_disabled() {
        let config = ServerConfig {
            decode_paths: false,
            ..ServerConfig::default()
        };
        let mut app = App::with_config(config);
        app.get("/files/{name}", |request: Request| {
            text(200, request.attribute("name").unwrap_or_default().to_owned())
        })
        .unwrap();
        let service = app.into_service();

        let response = service.handle(request(Method::GET, "/files/a%2Fb"));
        assert_eq!(body(response), "a%2Fb");
    }

    #[test]
    fn test_routing_errors_become_responses() {
        let mut app = App::new();
        app.get("/items", |_req: Request| text(200, "list")).unwrap();
        app.post("/items", |_req: Request| text(201, "created")).unwrap();
        let service = app.into_service();

        let response = service.handle(request(Method::GET, "/missing"));
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().get(ALLOW).is_none());
        assert_eq!(body(response), "Not Found");

        let response = service.handle(request(Method::DELETE, "/items"));
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers().get(ALLOW).unwrap(), "GET, POST");
    }

    #[test]
    fn test_custom_error_handler() {
        let mut app = App::new();
        app.on_error(|err: Error| text(err.status_code(), format!("custom: {err}")));
        let service = app.into_service();

        let response = service.handle(request(Method::GET, "/nothing"));
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body(response), "custom: no route matches path /nothing");
    }

    #[test]
    fn test_middleware_wraps_dispatch() {
        let mut app = App::new();
        app.get("/", |_req: Request| text(200, "root")).unwrap();
        app.wrap_fn(|request, next| {
            let mut response = next.run(request)?;
            response
                .headers_mut()
                .insert("x-powered-by", HeaderValue::from_static("trellis"));
            Ok(response)
        });
        let service = app.into_service();

        let response = service.handle(request(Method::GET, "/"));
        assert_eq!(response.headers().get("x-powered-by").unwrap(), "trellis");

        // Middleware also sees requests that fail to route.
        let response = service.handle(request(Method::GET, "/nope"));
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_registration_errors_surface() {
        let mut app = App::new();
        app.get("/x", |_req: Request| text(200, "x")).unwrap();
        let err = app.get("/x", |_req: Request| text(200, "y")).unwrap_err();
        assert_eq!(err, RegistrationError::DuplicateName("GET /x".into()));

        let err = app
            .on(Route::get("/y/{id}").named("y"), |_req: Request| text(200, "y"))
            .and_then(|_| app.on(Route::get("/y/{other}"), |_req: Request| text(200, "z")))
            .unwrap_err();
        assert!(matches!(err, RegistrationError::Conflict { .. }));
    }

    #[test]
    fn test_connection_info_is_attached() {
        let mut app = App::new();
        app.get("/who", |request: Request| {
            let peer = request.connection_info().map(|info| info.peer_addr.to_string());
            text(200, peer.unwrap_or_default())
        })
        .unwrap();
        let service = app.into_service();
        let info = ConnectionInfo {
            peer_addr: "10.1.2.3:4444".parse().unwrap(),
            local_addr: "127.0.0.1:3000".parse().unwrap(),
        };

        let response = service.call(request(Method::GET, "/who"), info);
        assert_eq!(body(response), "10.1.2.3:4444");
    }
}
