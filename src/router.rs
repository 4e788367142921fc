//! The route table.
//!
//! Routes are registered up front with [`Router::add`] and looked up with
//! [`Router::find`]. Lookup first collects every route whose path shape
//! fits the request path, regardless of method. An empty set is a
//! `NotFound`. A non-empty set where no route accepts the method is a
//! `MethodNotAllowed`.
//!
//! When several routes accept the request, the one with the most literal
//! segments wins, and among equally specific routes the earliest
//! registration wins. So with `GET /hello/{name}` and `GET /hello/static`
//! registered in either order, `/hello/static` goes to the literal route.

use std::borrow::Cow;
use std::collections::HashMap;

use hyper::Method;

use crate::error::{RegistrationError, RouterError, UrlError};
use crate::handler::Endpoint;
use crate::pattern::{split_path, PathPattern, Segment, Shape};
use crate::route::{Attributes, Route};

struct Entry<H> {
    name: String,
    route: Route<H>,
    pattern: PathPattern,
    shape: Shape,
}

/// Table of registered routes.
///
/// `find` only needs `&self`, so a router shared behind an `Arc` once
/// registration is over can serve any number of threads.
pub struct Router<H = Endpoint> {
    entries: Vec<Entry<H>>,
    names: HashMap<String, usize>,
}

impl<H> Router<H> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            names: HashMap::new(),
        }
    }

    /// Registers a route.
    ///
    /// # Errors
    /// Fails without modifying the table when the pattern is malformed, the
    /// route has no methods or no handler, its name is taken, or another
    /// route already serves the same path shape for one of its methods.
    pub fn add(&mut self, route: Route<H>) -> Result<(), RegistrationError> {
        let pattern = PathPattern::parse(route.path())?;
        let name = route.name();

        if route.methods().is_empty() {
            return Err(RegistrationError::EmptyMethods {
                path: route.path().to_owned(),
            });
        }
        if route.handler().is_none() {
            return Err(RegistrationError::MissingHandler { name });
        }
        if self.names.contains_key(&name) {
            return Err(RegistrationError::DuplicateName(name));
        }

        let shape = pattern.shape();
        for entry in self.entries.iter().filter(|entry| entry.shape == shape) {
            if let Some(method) = route
                .methods()
                .iter()
                .find(|method| entry.route.methods().contains(method))
            {
                return Err(RegistrationError::Conflict {
                    method: method.clone(),
                    path: route.path().to_owned(),
                    existing: entry.name.clone(),
                });
            }
        }

        log::debug!("registered route {name:?} ({})", pattern);
        self.names.insert(name.clone(), self.entries.len());
        self.entries.push(Entry {
            name,
            route,
            pattern,
            shape,
        });
        Ok(())
    }

    /// Resolves a request to a registered route with its attributes bound.
    ///
    /// `method` is matched case-insensitively. `path` must already be
    /// percent-decoded and stripped of its query string.
    ///
    /// # Errors
    /// [`RouterError::NotFound`] if no route has the shape of `path`;
    /// [`RouterError::MethodNotAllowed`] if some do, but none accept
    /// `method`.
    pub fn find(&self, method: &str, path: &str) -> Result<Route<H>, RouterError>
    where
        H: Clone,
    {
        let parts = split_path(path);
        self.lookup(method, path, parts.as_deref())
    }

    /// Like [`find`](Router::find), for a path as it arrived on the wire.
    ///
    /// The path is split on `/` first and each segment is percent-decoded
    /// afterwards, so an encoded `%2F` stays inside its segment. A segment
    /// that does not decode to UTF-8 is matched as is. Errors report the
    /// path undecoded.
    pub fn find_encoded(&self, method: &str, path: &str) -> Result<Route<H>, RouterError>
    where
        H: Clone,
    {
        let parts: Option<Vec<Cow<'_, str>>> = split_path(path).map(|parts| {
            parts
                .into_iter()
                .map(|part| urlencoding::decode(part).unwrap_or(Cow::Borrowed(part)))
                .collect()
        });
        self.lookup(method, path, parts.as_deref())
    }

    /// Methods accepted by any route whose shape fits `path`, in
    /// registration order.
    pub fn allowed_methods(&self, path: &str) -> Vec<Method> {
        match split_path(path) {
            Some(parts) => self.allowed_for(&parts),
            None => Vec::new(),
        }
    }

    fn lookup<S>(
        &self,
        method: &str,
        path: &str,
        parts: Option<&[S]>,
    ) -> Result<Route<H>, RouterError>
    where
        H: Clone,
        S: AsRef<str>,
    {
        let Some(parts) = parts else {
            return Err(RouterError::NotFound {
                path: path.to_owned(),
            });
        };

        let method = method.to_ascii_uppercase();
        let mut shape_matched = false;
        let mut best: Option<(&Entry<H>, Vec<(&str, &str)>)> = None;

        for entry in &self.entries {
            let Some(captures) = entry.pattern.captures(parts) else {
                continue;
            };
            shape_matched = true;

            if !entry.route.accepts(&method) {
                continue;
            }

            let more_specific = match &best {
                Some((current, _)) => {
                    entry.pattern.specificity() > current.pattern.specificity()
                }
                None => true,
            };
            if more_specific {
                best = Some((entry, captures));
            }
        }

        match best {
            Some((entry, captures)) => {
                log::trace!("{method} {path} matched route {:?}", entry.name);
                Ok(entry.route.with_attributes(captures.into_iter().collect()))
            }
            None if shape_matched => Err(RouterError::MethodNotAllowed {
                path: path.to_owned(),
                method,
                allowed: self.allowed_for(parts),
            }),
            None => Err(RouterError::NotFound {
                path: path.to_owned(),
            }),
        }
    }

    fn allowed_for<S: AsRef<str>>(&self, parts: &[S]) -> Vec<Method> {
        let mut allowed: Vec<Method> = Vec::new();
        for entry in &self.entries {
            if entry.pattern.captures(parts).is_none() {
                continue;
            }
            for method in entry.route.methods() {
                if !allowed.contains(method) {
                    allowed.push(method.clone());
                }
            }
        }
        allowed
    }

    /// The registered route with the given name.
    pub fn route(&self, name: &str) -> Option<&Route<H>> {
        self.names.get(name).map(|&index| &self.entries[index].route)
    }

    /// Registered routes in registration order.
    pub fn routes(&self) -> impl Iterator<Item = &Route<H>> {
        self.entries.iter().map(|entry| &entry.route)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Builds the path of a named route, filling its placeholders from
    /// `params`. Values are percent-encoded, `/` included, so the result
    /// routes back to this route through [`find_encoded`](Router::find_encoded).
    ///
    /// ```
    /// # use trellis::{Route, Router};
    /// let mut router = Router::new();
    /// router.add(Route::get("/users/{id}").named("user").with_handler(())).unwrap();
    /// assert_eq!(router.url_for("user", &[("id", "a b")]).unwrap(), "/users/a%20b");
    /// ```
    pub fn url_for(&self, name: &str, params: &[(&str, &str)]) -> Result<String, UrlError> {
        let index = self
            .names
            .get(name)
            .ok_or_else(|| UrlError::UnknownRoute(name.to_owned()))?;
        let segments = self.entries[*index].pattern.segments();

        if segments.is_empty() {
            return Ok("/".to_owned());
        }

        let mut url = String::new();
        for segment in segments {
            url.push('/');
            match segment {
                Segment::Literal(literal) => url.push_str(literal),
                Segment::Placeholder(parameter) => {
                    let value = params
                        .iter()
                        .find(|(key, _)| key == parameter)
                        .map(|(_, value)| *value)
                        .ok_or_else(|| UrlError::MissingParameter {
                            route: name.to_owned(),
                            parameter: parameter.clone(),
                        })?;
                    url.push_str(&urlencoding::encode(value));
                }
            }
        }
        Ok(url)
    }
}

impl<H> Default for Router<H> {
    fn default() -> Self {
        Self::new()
    }
}
