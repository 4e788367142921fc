use std::sync::Arc;
use std::time::Instant;

use crate::error::Result;
use crate::http::{Request, Response};

/// A step in the request pipeline.
///
/// Each middleware receives the request and the rest of the chain. It may
/// answer directly, or call [`Next::run`] and post-process the response.
/// Errors propagate outwards to the application's error handler.
pub trait Middleware: Send + Sync + 'static {
    fn process(&self, request: Request, next: Next<'_>) -> Result<Response>;
}

type Dispatch<'a> = dyn Fn(Request) -> Result<Response> + Sync + 'a;

/// The remainder of the middleware chain, ending in route dispatch.
pub struct Next<'a> {
    chain: &'a [Arc<dyn Middleware>],
    endpoint: &'a Dispatch<'a>,
}

impl<'a> Next<'a> {
    pub(crate) fn new(chain: &'a [Arc<dyn Middleware>], endpoint: &'a Dispatch<'a>) -> Self {
        Self { chain, endpoint }
    }

    pub fn run(self, request: Request) -> Result<Response> {
        match self.chain.split_first() {
            Some((head, rest)) => head.process(request, Next::new(rest, self.endpoint)),
            None => (self.endpoint)(request),
        }
    }
}

/// Adapts a closure into a [`Middleware`].
pub struct FnMiddleware<F>(pub F);

impl<F> Middleware for FnMiddleware<F>
where
    F: Fn(Request, Next<'_>) -> Result<Response> + Send + Sync + 'static,
{
    fn process(&self, request: Request, next: Next<'_>) -> Result<Response> {
        (self.0)(request, next)
    }
}

/// Logs one line per request at `info` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestLogger;

impl Middleware for RequestLogger {
    fn process(&self, request: Request, next: Next<'_>) -> Result<Response> {
        let method = request.method().clone();
        let path = request.uri().path().to_owned();
        let started = Instant::now();

        let result = next.run(request);
        match &result {
            Ok(response) => log::info!(
                "{method} {path} -> {} in {:?}",
                response.status().as_u16(),
                started.elapsed()
            ),
            Err(err) => log::info!(
                "{method} {path} -> {} ({err}) in {:?}",
                err.status_code().as_u16(),
                started.elapsed()
            ),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::http::{text, Body};
    use std::sync::Mutex;

    struct Tag(&'static str, Arc<Mutex<Vec<&'static str>>>);

    impl Middleware for Tag {
        fn process(&self, request: Request, next: Next<'_>) -> Result<Response> {
            self.1.lock().unwrap().push(self.0);
            let mut response = next.run(request)?;
            response
                .headers_mut()
                .append("x-tag", self.0.parse().unwrap());
            Ok(response)
        }
    }

    #[test]
    fn test_chain_runs_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let chain: Vec<Arc<dyn Middleware>> = vec![
            Arc::new(Tag("outer", seen.clone())),
            Arc::new(Tag("inner", seen.clone())),
        ];
        let endpoint = |_req: Request| -> Result<Response> { Ok(text(200, "done")) };

        let response = Next::new(&chain, &endpoint)
            .run(Request::new(Body::empty()))
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["outer", "inner"]);
        let tags: Vec<_> = response.headers().get_all("x-tag").iter().collect();
        assert_eq!(tags, vec!["inner", "outer"]);
    }

    fn deny(_request: Request, _next: Next<'_>) -> Result<Response> {
        Err(Error::handler("denied"))
    }

    #[test]
    fn test_short_circuit() {
        let chain: Vec<Arc<dyn Middleware>> = vec![Arc::new(FnMiddleware(deny))];
        let endpoint = |_req: Request| -> Result<Response> { panic!("endpoint must not run") };

        let err = Next::new(&chain, &endpoint)
            .run(Request::new(Body::empty()))
            .unwrap_err();
        assert_eq!(err.to_string(), "denied");
    }

    #[test]
    fn test_request_logger_passes_through() {
        let chain: Vec<Arc<dyn Middleware>> = vec![Arc::new(RequestLogger)];
        let endpoint = |_req: Request| -> Result<Response> { Ok(text(204, "")) };
        let response = Next::new(&chain, &endpoint)
            .run(Request::new(Body::empty()))
            .unwrap();
        assert_eq!(response.status(), 204);
    }
}
