//! Controllers registered by type, next to a closure route, behind an
//! authentication middleware.

use trellis::{text, App, Controller, Request, RequestExt, Response, Route, Server};

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

#[derive(Default)]
struct ShowUser;

impl Controller for ShowUser {
    fn route() -> Route {
        Route::get("/users/{id}").named("user")
    }

    fn handle(&self, request: Request) -> Response {
        match request.attribute("id").map(str::parse::<u32>) {
            Some(Ok(id)) => text(200, format!("user #{id}")),
            _ => text(400, "user id must be a number"),
        }
    }
}

#[tokio::main]
async fn main() -> trellis::Result<()> {
    let mut app = App::new();
    app.controller::<Goodbye>()?;
    app.controller::<ShowUser>()?;
    app.post("/users", |_req: Request| text(201, "created"))?;

    app.wrap_fn(|request, next| {
        if request.method() != "GET" && !request.headers().contains_key("authorization") {
            return Ok(text(401, "authorization required"));
        }
        next.run(request)
    });

    println!("GET /users/1 is served at {}", app.router().url_for("user", &[("id", "1")])?);

    let server = Server::bind("127.0.0.1:3000").config(app.config().clone());
    server
        .serve_with_shutdown(app.into_service(), async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await
}
