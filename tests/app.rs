use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use trellis::hyper::header::ALLOW;
use trellis::{
    text, App, Body, Controller, Error, Method, Middleware, Next, Request, RequestExt, Response,
    Result, Route,
};

fn request(method: Method, uri: &str) -> Request {
    let mut request = Request::new(Body::empty());
    *request.method_mut() = method;
    *request.uri_mut() = uri.parse().unwrap();
    request
}

fn body(response: Response) -> String {
    response.into_body().into_string().unwrap()
}

#[derive(Default)]
struct Goodbye;

impl Controller for Goodbye {
    fn route() -> Route {
        Route::get("/goodbye")
    }

    fn handle(&self, _request: Request) -> Response {
        text(200, "Goodbye cruel world!")
    }
}

/// Rejects requests lacking an `x-api-key` header before they reach routing.
struct RequireKey {
    rejected: Arc<AtomicUsize>,
}

impl Middleware for RequireKey {
    fn process(&self, request: Request, next: Next<'_>) -> Result<Response> {
        if request.headers().contains_key("x-api-key") {
            next.run(request)
        } else {
            self.rejected.fetch_add(1, Ordering::SeqCst);
            Ok(text(401, "missing key"))
        }
    }
}

#[test]
fn hello_scenario_end_to_end() {
    let mut app = App::new();
    app.get("/hello/{name}", |request: Request| {
        text(200, format!("Hello {}", request.attribute("name").unwrap_or("?")))
    })
    .unwrap();
    let service = app.into_service();

    let response = service.handle(request(Method::GET, "/hello/world"));
    assert_eq!(response.status(), 200);
    assert_eq!(body(response), "Hello world");

    let response = service.handle(request(Method::POST, "/hello/world"));
    assert_eq!(response.status(), 405);
    assert_eq!(response.headers().get(ALLOW).unwrap(), "GET");

    let response = service.handle(request(Method::GET, "/goodbye"));
    assert_eq!(response.status(), 404);
}

#[test]
fn controllers_and_closures_share_a_table() {
    let mut app = App::new();
    app.controller::<Goodbye>().unwrap();
    app.on(
        Route::new("/echo", [Method::POST, Method::PUT]).named("echo"),
        |request: Request| match request.into_body().into_string() {
            Ok(content) => text(200, content),
            Err(_) => text(400, "invalid body"),
        },
    )
    .unwrap();

    assert_eq!(app.router().url_for("echo", &[]).unwrap(), "/echo");
    assert_eq!(
        app.controller::<Goodbye>().unwrap_err().to_string(),
        "a route named \"GET /goodbye\" is already registered"
    );

    let service = app.into_service();
    let response = service.handle(request(Method::GET, "/goodbye"));
    assert_eq!(body(response), "Goodbye cruel world!");

    let mut echo = request(Method::PUT, "/echo");
    *echo.body_mut() = Body::new("ping");
    assert_eq!(body(service.handle(echo)), "ping");
}

#[test]
fn middleware_can_short_circuit_routing() {
    let rejected = Arc::new(AtomicUsize::new(0));
    let mut app = App::new();
    app.get("/secret", |_req: Request| text(200, "s3cr3t")).unwrap();
    app.wrap(RequireKey {
        rejected: rejected.clone(),
    });
    let service = app.into_service();

    let response = service.handle(request(Method::GET, "/secret"));
    assert_eq!(response.status(), 401);

    // Unknown paths are rejected by the middleware too, before routing.
    let response = service.handle(request(Method::GET, "/unknown"));
    assert_eq!(response.status(), 401);
    assert_eq!(rejected.load(Ordering::SeqCst), 2);

    let mut authorized = request(Method::GET, "/secret");
    authorized
        .headers_mut()
        .insert("x-api-key", "k".parse().unwrap());
    assert_eq!(body(service.handle(authorized)), "s3cr3t");
}

#[test]
fn middleware_errors_reach_the_error_handler() {
    let mut app = App::new();
    app.get("/", |_req: Request| text(200, "root")).unwrap();
    app.wrap_fn(|request, next| {
        if request.uri().query() == Some("fail") {
            return Err(Error::handler("refused by middleware"));
        }
        next.run(request)
    });
    let service = app.into_service();

    let response = service.handle(request(Method::GET, "/?fail"));
    assert_eq!(response.status(), 500);
    assert_eq!(body(response), "Internal Server Error");

    let response = service.handle(request(Method::GET, "/"));
    assert_eq!(body(response), "root");
}

#[test]
fn service_clones_share_the_frozen_table() {
    let mut app = App::new();
    app.get("/ping", |_req: Request| text(200, "pong")).unwrap();
    let service = app.into_service();
    let clone = service.clone();

    let handle = std::thread::spawn(move || body(clone.handle(request(Method::GET, "/ping"))));
    assert_eq!(handle.join().unwrap(), "pong");
    assert_eq!(service.router().len(), 1);
}

#[test]
fn reverse_routed_urls_dispatch_to_their_route() {
    let mut app = App::new();
    app.on(
        Route::get("/files/{name}").named("file"),
        |request: Request| text(200, request.attribute("name").unwrap_or_default().to_owned()),
    )
    .unwrap();

    let url = app.router().url_for("file", &[("name", "a/b")]).unwrap();
    assert_eq!(url, "/files/a%2Fb");

    let service = app.into_service();
    let response = service.handle(request(Method::GET, &url));
    assert_eq!(response.status(), 200);
    assert_eq!(body(response), "a/b");
}
