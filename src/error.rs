use std::io;

use hyper::{Method, StatusCode};
use thiserror::Error;

/// Failure to resolve a request to a registered route.
///
/// Both variants are recoverable: the dispatcher turns them into a
/// `404 Not Found` or a `405 Method Not Allowed` response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouterError {
    /// No registered pattern has the shape of the requested path.
    #[error("no route matches path {path}")]
    NotFound { path: String },

    /// At least one pattern has the shape of the path, but none of them
    /// accept the requested method.
    #[error("method {method} not allowed for path {path}")]
    MethodNotAllowed {
        path: String,
        method: String,
        /// Union of the methods of every shape-matching route, in
        /// registration order.
        allowed: Vec<Method>,
    },
}

impl RouterError {
    /// The HTTP status this error should be reported with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            RouterError::NotFound { .. } => StatusCode::NOT_FOUND,
            RouterError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
        }
    }

    /// Value for the `Allow` response header, if any.
    pub fn allow_header(&self) -> Option<String> {
        match self {
            RouterError::MethodNotAllowed { allowed, .. } => Some(
                allowed
                    .iter()
                    .map(Method::as_str)
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
            RouterError::NotFound { .. } => None,
        }
    }
}

/// Rejected route registration. Raised by `Router::add`, never by `find`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("invalid route pattern {path:?}: {reason}")]
    InvalidPattern { path: String, reason: String },

    #[error("invalid method token {0:?}")]
    InvalidMethod(String),

    #[error("route {path:?} accepts no methods")]
    EmptyMethods { path: String },

    #[error("route {name:?} has no handler attached")]
    MissingHandler { name: String },

    #[error("a route named {0:?} is already registered")]
    DuplicateName(String),

    /// Another route already serves the same path shape for this method.
    #[error("{method} {path} conflicts with registered route {existing:?}")]
    Conflict {
        method: Method,
        path: String,
        existing: String,
    },
}

/// Failure to build a URL from a named route.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlError {
    #[error("no route named {0:?}")]
    UnknownRoute(String),

    #[error("route {route:?} requires parameter {parameter:?}")]
    MissingParameter { route: String, parameter: String },
}

/// Umbrella error for the application layer.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Routing(#[from] RouterError),

    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    Url(#[from] UrlError),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("server error: {0}")]
    Server(#[from] hyper::Error),

    /// Raised by user middleware or handlers that need to abort the chain.
    #[error("{0}")]
    Handler(String),

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Builds an error from inside middleware.
    pub fn handler(message: impl Into<String>) -> Self {
        Error::Handler(message.into())
    }

    /// The HTTP status this error should be reported with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Routing(err) => err.status_code(),
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Type alias for Results using the crate's umbrella error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routing_status_codes() {
        let not_found = RouterError::NotFound { path: "/x".into() };
        assert_eq!(not_found.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(not_found.allow_header(), None);

        let not_allowed = RouterError::MethodNotAllowed {
            path: "/x".into(),
            method: "DELETE".into(),
            allowed: vec![Method::GET, Method::POST],
        };
        assert_eq!(not_allowed.status_code(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(not_allowed.allow_header().as_deref(), Some("GET, POST"));
    }

    /// Routing errors keep their status through the umbrella type; the rest
    /// collapse to 500.
    #[test]
    fn test_error_conversion() {
        let err = Error::from(RouterError::NotFound { path: "/".into() });
        assert!(matches!(err, Error::Routing(_)));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

        let io_err = io::Error::new(io::ErrorKind::Other, "test error");
        let err = Error::from(io_err);
        assert_eq!(err.to_string(), "io error: test error");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_registration_messages() {
        let err = RegistrationError::Conflict {
            method: Method::GET,
            path: "/a/{b}".into(),
            existing: "GET /a/{id}".into(),
        };
        assert_eq!(
            err.to_string(),
            "GET /a/{b} conflicts with registered route \"GET /a/{id}\""
        );
    }
}
