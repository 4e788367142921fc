use std::fmt;
use std::sync::Arc;

use crate::http::{Request, Response};
use crate::route::Route;

/// A type that owns its route and handles the requests sent to it.
///
/// ```
/// use trellis::{text, App, Controller, Request, Response, Route};
///
/// #[derive(Default)]
/// struct Goodbye;
///
/// impl Controller for Goodbye {
///     fn route() -> Route {
///         Route::get("/goodbye")
///     }
///
///     fn handle(&self, _request: Request) -> Response {
///         text(200, "Goodbye cruel world!")
///     }
/// }
///
/// let mut app = App::new();
/// app.controller::<Goodbye>().unwrap();
/// ```
pub trait Controller: Send + Sync + 'static {
    /// The route this controller is registered under.
    fn route() -> Route
    where
        Self: Sized;

    fn handle(&self, request: Request) -> Response;
}

type Invoke = dyn Fn(Request) -> Response + Send + Sync;

/// The handler representations accepted at registration.
///
/// Both are resolved into an [`Endpoint`] when the route is registered, so
/// dispatch never has to inspect which kind it was given.
pub enum Handler {
    /// A closure, or a controller instance shared across requests.
    Function(Arc<Invoke>),
    /// A controller type, constructed afresh for every request.
    Constructor(Constructor),
}

/// Named reference to a controller constructor.
#[derive(Clone, Copy)]
pub struct Constructor {
    name: &'static str,
    build: fn() -> Box<dyn Controller>,
}

impl Constructor {
    pub fn name(&self) -> &'static str {
        self.name
    }
}

fn build<C: Controller + Default>() -> Box<dyn Controller> {
    Box::new(C::default())
}

impl Handler {
    pub fn function<F>(f: F) -> Self
    where
        F: Fn(Request) -> Response + Send + Sync + 'static,
    {
        Handler::Function(Arc::new(f))
    }

    pub fn instance<C: Controller>(controller: C) -> Self {
        Handler::Function(Arc::new(move |request: Request| controller.handle(request)))
    }

    pub fn constructor<C: Controller + Default>() -> Self {
        Handler::Constructor(Constructor {
            name: std::any::type_name::<C>(),
            build: build::<C>,
        })
    }

    /// Collapses the handler into the uniform invocable stored on routes.
    pub fn resolve(self) -> Endpoint {
        match self {
            Handler::Function(invoke) => Endpoint {
                label: Arc::from("closure"),
                invoke,
            },
            Handler::Constructor(constructor) => Endpoint {
                label: Arc::from(constructor.name),
                invoke: Arc::new(move |request: Request| (constructor.build)().handle(request)),
            },
        }
    }
}

impl<F> From<F> for Handler
where
    F: Fn(Request) -> Response + Send + Sync + 'static,
{
    fn from(f: F) -> Self {
        Handler::function(f)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handler::Function(_) => f.write_str("Handler::Function"),
            Handler::Constructor(c) => write!(f, "Handler::Constructor({})", c.name),
        }
    }
}

/// A resolved handler: cheap to clone, callable from any worker thread.
#[derive(Clone)]
pub struct Endpoint {
    label: Arc<str>,
    invoke: Arc<Invoke>,
}

impl Endpoint {
    pub fn invoke(&self, request: Request) -> Response {
        (self.invoke)(request)
    }

    /// `"closure"` for functions, the controller type name otherwise.
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Endpoint").field(&self.label).finish()
    }
}
