use core::fmt;
use std::io::{self, Read};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::{cmp, debug_assert};

use futures::Stream;
use hyper::body::HttpBody;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::StatusCode;

use crate::route::{Attributes, MatchedRoute};
use crate::server::ConnectionInfo;

pub use hyper::body::Bytes;

/// An HTTP request carrying a trellis [`Body`].
pub type Request = hyper::Request<Body>;

/// An HTTP response.
///
/// Build one with [`text`] for the common case, or with a
/// [`ResponseBuilder`]:
///
/// ```
/// # use trellis::{ResponseBuilder, Body};
/// let response = ResponseBuilder::new()
///     .status(404)
///     .header("X-Custom-Foo", "Bar")
///     .body(Body::new("Page not found."))
///     .unwrap();
/// ```
pub type Response = hyper::Response<Body>;

pub type ResponseBuilder = hyper::http::response::Builder;

/// Builds a `text/plain` response with the given status.
///
/// An invalid status code is logged and yields a `500`.
pub fn text<S>(status: S, body: impl Into<Bytes>) -> Response
where
    StatusCode: TryFrom<S>,
    <StatusCode as TryFrom<S>>::Error: fmt::Display,
{
    let status = match StatusCode::try_from(status) {
        Ok(status) => status,
        Err(err) => {
            log::warn!("text response with {}, answering 500 instead", err);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    let mut response = Response::new(Body::new(body));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

/// Access to what the dispatcher attached to a routed request.
pub trait RequestExt {
    /// Value bound to the `{name}` placeholder of the matched route.
    fn attribute(&self, name: &str) -> Option<&str>;

    /// Every placeholder value bound by the matched route.
    fn attributes(&self) -> Option<&Attributes>;

    /// Name of the route that matched this request.
    fn route_name(&self) -> Option<&str>;

    /// Peer and local addresses, when served over a socket.
    fn connection_info(&self) -> Option<&ConnectionInfo>;
}

impl RequestExt for Request {
    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes().and_then(|attributes| attributes.get(name))
    }

    fn attributes(&self) -> Option<&Attributes> {
        self.extensions().get::<Attributes>()
    }

    fn route_name(&self) -> Option<&str> {
        self.extensions()
            .get::<MatchedRoute>()
            .map(|matched| matched.0.as_str())
    }

    fn connection_info(&self) -> Option<&ConnectionInfo> {
        self.extensions().get::<ConnectionInfo>()
    }
}

/// A streaming HTTP body used for both requests and responses.
///
/// Handlers run on blocking worker threads, so the body is read
/// synchronously: iterate over it chunk by chunk, wrap it in a
/// [`BodyReader`], or collect it with [`Body::into_string`].
///
/// ```rust
/// # use trellis::{text, Request, Response, Body};
/// fn echo(request: Request) -> Response {
///     match request.into_body().into_string() {
///         Ok(content) => text(200, content),
///         Err(_) => text(400, "body is not valid UTF-8"),
///     }
/// }
/// ```
pub struct Body(pub(crate) hyper::Body);

impl Body {
    /// Create a body from a string or bytes.
    pub fn new(data: impl Into<Bytes>) -> Body {
        Body(hyper::Body::from(data.into()))
    }

    pub fn empty() -> Body {
        Body(hyper::Body::empty())
    }

    /// Create a body from an implementor of [`io::Read`].
    pub fn wrap_reader<R>(reader: R) -> Body
    where
        R: io::Read + Send + 'static,
    {
        Body(hyper::Body::wrap_stream(ReaderStream::new(reader)))
    }

    /// Creates a [`BodyReader`] that implements [`std::io::Read`].
    pub fn reader(&mut self) -> BodyReader<'_> {
        BodyReader {
            body: self,
            prev_bytes: Bytes::new(),
        }
    }

    /// Reads the whole body as UTF-8.
    pub fn into_string(mut self) -> io::Result<String> {
        let mut content = String::new();
        self.reader().read_to_string(&mut content)?;
        Ok(content)
    }
}

impl<T> From<T> for Body
where
    Bytes: From<T>,
{
    fn from(data: T) -> Body {
        Body::new(data)
    }
}

impl Iterator for Body {
    type Item = io::Result<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        futures::executor::block_on(self.0.data())
            .map(|res| res.map_err(|err| io::Error::new(io::ErrorKind::Other, err)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        Stream::size_hint(&self.0)
    }
}

/// A synchronous reader over a [`Body`].
pub struct BodyReader<'b> {
    body: &'b mut Body,
    prev_bytes: Bytes,
}

impl<'b> std::io::Read for BodyReader<'b> {
    fn read(&mut self, mut buf: &mut [u8]) -> io::Result<usize> {
        let mut written = 0;
        loop {
            if buf.is_empty() {
                return Ok(written);
            }

            if !self.prev_bytes.is_empty() {
                let chunk_size = cmp::min(buf.len(), self.prev_bytes.len());
                let prev_bytes_start = self.prev_bytes.split_to(chunk_size);
                buf[..chunk_size].copy_from_slice(&prev_bytes_start[..]);
                buf = &mut buf[chunk_size..];
                written += chunk_size;
                continue;
            }

            if written != 0 {
                return Ok(written);
            }

            debug_assert!(self.prev_bytes.is_empty());

            self.prev_bytes = match self.body.next() {
                Some(next) => next?,
                None => return Ok(written),
            }
        }
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Default for Body {
    fn default() -> Self {
        Self::empty()
    }
}

impl HttpBody for Body {
    type Data = Bytes;
    type Error = hyper::Error;

    fn poll_data(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Self::Data, Self::Error>>> {
        Pin::new(&mut self.0).poll_data(cx)
    }

    fn poll_trailers(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<hyper::HeaderMap>, Self::Error>> {
        Pin::new(&mut self.0).poll_trailers(cx)
    }
}

/// Adapts a blocking [`io::Read`] into a chunk stream for hyper.
struct ReaderStream<R> {
    reader: Option<R>,
    buf: Vec<u8>,
}

const CAP: usize = 4096;

impl<R> ReaderStream<R> {
    fn new(reader: R) -> Self {
        Self {
            reader: Some(reader),
            buf: vec![0; CAP],
        }
    }
}

impl<R> Unpin for ReaderStream<R> {}

impl<R> Stream for ReaderStream<R>
where
    R: io::Read,
{
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let ReaderStream { reader, buf } = &mut *self;

        let reader = match reader {
            Some(reader) => reader,
            None => return Poll::Ready(None),
        };

        if buf.len() < CAP {
            buf.resize(CAP, 0);
        }

        match reader.read(buf) {
            Err(err) => {
                self.reader.take();
                Poll::Ready(Some(Err(err)))
            }
            Ok(0) => {
                self.reader.take();
                Poll::Ready(None)
            }
            Ok(n) => {
                let remaining = buf.split_off(n);
                let chunk = std::mem::replace(buf, remaining);
                Poll::Ready(Some(Ok(Bytes::from(chunk))))
            }
        }
    }
}
