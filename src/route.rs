use std::fmt;

use hyper::Method;

use crate::error::RegistrationError;
use crate::handler::Endpoint;

/// Placeholder values bound by a successful match, in pattern order.
///
/// The dispatcher stores a copy in the request extensions so handlers can
/// read them through [`RequestExt::attribute`](crate::RequestExt::attribute).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes(Vec<(String, String)>);

impl Attributes {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K, V> FromIterator<(K, V)> for Attributes
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Attributes(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Name of the route that served a request, stored in the request
/// extensions by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedRoute(pub String);

/// A route descriptor: path pattern, accepted methods, name and handler.
///
/// Routes are built with one of the method constructors, optionally named,
/// and given a handler before they are registered:
///
/// ```
/// # use trellis::{Route, Router};
/// let mut router = Router::new();
/// router.add(Route::get("/hello/{name}").with_handler("hello")).unwrap();
///
/// let matched = router.find("GET", "/hello/world").unwrap();
/// assert_eq!(matched.name(), "GET /hello/{name}");
/// assert_eq!(matched.attributes().get("name"), Some("world"));
/// ```
///
/// A route with bound attributes is a copy of the registered one; the
/// route table itself never changes on lookup.
#[derive(Clone)]
pub struct Route<H = Endpoint> {
    path: String,
    methods: Vec<Method>,
    name: Option<String>,
    handler: Option<H>,
    attributes: Attributes,
}

macro_rules! method_constructors {
    ($($fn_name:ident => $method:ident),* $(,)?) => {
        $(
            #[doc = concat!("A route accepting `", stringify!($method), "` requests on `path`.")]
            pub fn $fn_name(path: impl Into<String>) -> Self {
                Self::new(path, [Method::$method])
            }
        )*
    };
}

impl<H> Route<H> {
    /// A route accepting each of `methods` on `path`. Duplicate methods are
    /// dropped; order is kept.
    pub fn new(path: impl Into<String>, methods: impl IntoIterator<Item = Method>) -> Self {
        let mut unique = Vec::new();
        for method in methods {
            if !unique.contains(&method) {
                unique.push(method);
            }
        }

        Self {
            path: path.into(),
            methods: unique,
            name: None,
            handler: None,
            attributes: Attributes::default(),
        }
    }

    /// Like [`Route::new`], but from method tokens such as `"get"`. Tokens
    /// are case-insensitive and normalized to uppercase.
    pub fn with_method_tokens<S: AsRef<str>>(
        path: impl Into<String>,
        tokens: &[S],
    ) -> Result<Self, RegistrationError> {
        let methods = tokens
            .iter()
            .map(|token| {
                let upper = token.as_ref().trim().to_ascii_uppercase();
                if upper.is_empty() {
                    return Err(RegistrationError::InvalidMethod(token.as_ref().to_owned()));
                }
                Method::from_bytes(upper.as_bytes())
                    .map_err(|_| RegistrationError::InvalidMethod(token.as_ref().to_owned()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::new(path, methods))
    }

    method_constructors! {
        get => GET,
        post => POST,
        put => PUT,
        patch => PATCH,
        delete => DELETE,
        options => OPTIONS,
        head => HEAD,
    }

    /// Gives the route an explicit name instead of the derived one.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Attaches the handler invoked when this route matches.
    pub fn with_handler(mut self, handler: H) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Returns a copy of this route bound to the given attribute values.
    pub fn with_attributes(&self, attributes: Attributes) -> Self
    where
        H: Clone,
    {
        Self {
            attributes,
            ..self.clone()
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    pub fn accepts(&self, method: &str) -> bool {
        self.methods.iter().any(|m| m.as_str() == method)
    }

    /// The explicit name, or one derived from the methods and path, e.g.
    /// `"GET|HEAD /hello/{name}"`.
    pub fn name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => generate_name(&self.path, &self.methods),
        }
    }

    pub fn handler(&self) -> Option<&H> {
        self.handler.as_ref()
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name)
    }
}

fn generate_name(path: &str, methods: &[Method]) -> String {
    let methods = methods
        .iter()
        .map(Method::as_str)
        .collect::<Vec<_>>()
        .join("|");
    format!("{methods} {path}")
}

impl<H> fmt::Debug for Route<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("name", &self.name())
            .field("path", &self.path)
            .field("methods", &self.methods)
            .field("has_handler", &self.handler.is_some())
            .field("attributes", &self.attributes)
            .finish()
    }
}
