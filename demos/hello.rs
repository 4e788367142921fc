//! A small application showing routing, path parameters and shared state.
//!
//! Run with `cargo run --example hello`, then try:
//! - `curl localhost:3000/`
//! - `curl localhost:3000/hello/your-name`
//! - `curl localhost:3000/counter` (increments on each visit)
//! - `curl -X POST localhost:3000/hello/x` (405 with an `Allow` header)

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use trellis::{text, App, Request, RequestExt, RequestLogger};

fn main() -> trellis::Result<()> {
    let mut app = App::from_env()?;
    app.wrap(RequestLogger);

    app.get("/", |_req: Request| text(200, "Welcome to trellis!"))?;

    app.get("/hello/{name}", |request: Request| {
        let name = request.attribute("name").unwrap_or("world").to_owned();
        text(200, format!("Hello, {name}!"))
    })?;

    let counter = Arc::new(AtomicUsize::new(0));
    app.get("/counter", move |_req: Request| {
        let count = counter.fetch_add(1, Ordering::SeqCst) + 1;
        text(200, format!("Counter: {count}"))
    })?;

    let config = app.config();
    println!("Server running at http://{}:{}", config.host, config.port);

    app.run()
}
