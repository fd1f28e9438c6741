//! Request routing and path matching.
//!
//! Maps a method and path to an [`Operation`], extracting `{param}`
//! segments along the way. A path that matches some route under a different
//! method resolves to [`Resolution::MethodNotAllowed`] so the server can
//! answer 405 instead of 404.
//!
//! # Example
//!
//! ```rust
//! use http::Method;
//! use portcullis_server::{Operation, Resolution, Router};
//!
//! let router = Router::gateway(true);
//!
//! match router.resolve(&Method::GET, "/api/v1/user/u-42") {
//!     Resolution::Matched(m) => {
//!         assert_eq!(m.operation(), Operation::GetUserProfile);
//!         assert_eq!(m.param("userId"), Some("u-42"));
//!     }
//!     other => panic!("unexpected {other:?}"),
//! }
//!
//! assert_eq!(router.resolve(&Method::DELETE, "/health"), Resolution::MethodNotAllowed);
//! assert_eq!(router.resolve(&Method::GET, "/nope"), Resolution::NotFound);
//! ```

use std::collections::HashMap;
use std::fmt;

use http::Method;

/// Every operation the gateway serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `GET /health`
    Health,
    /// `GET /metrics`
    Metrics,
    /// `POST /api/v1/auth/token`
    Authenticate,
    /// `POST /api/v1/user`
    CreateUser,
    /// `GET /api/v1/user/{userId}`
    GetUserProfile,
    /// `POST /api/v1/account`
    CreateAccount,
    /// `GET /api/v1/accounts/{accountId}`
    FindAccount,
}

impl Operation {
    /// Stable identifier used in logs.
    #[must_use]
    pub const fn operation_id(self) -> &'static str {
        match self {
            Self::Health => "health",
            Self::Metrics => "metrics",
            Self::Authenticate => "authenticate",
            Self::CreateUser => "createUser",
            Self::GetUserProfile => "getUserProfile",
            Self::CreateAccount => "createAccount",
            Self::FindAccount => "findAccount",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.operation_id())
    }
}

/// A matched route with its path parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    operation: Operation,
    params: HashMap<String, String>,
}

impl RouteMatch {
    /// Creates a route match.
    #[must_use]
    pub fn new(operation: Operation, params: HashMap<String, String>) -> Self {
        Self { operation, params }
    }

    /// The matched operation.
    #[must_use]
    pub const fn operation(&self) -> Operation {
        self.operation
    }

    /// All extracted path parameters.
    #[must_use]
    pub const fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    /// A path parameter by name.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

/// Outcome of [`Router::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A route matched both path and method.
    Matched(RouteMatch),
    /// The path is known but not under this method.
    MethodNotAllowed,
    /// No route has this path.
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PathSegment {
    Literal(String),
    Param(String),
}

#[derive(Debug, Clone)]
struct Route {
    method: Method,
    segments: Vec<PathSegment>,
    operation: Operation,
}

impl Route {
    fn new(method: Method, pattern: &str, operation: Operation) -> Self {
        Self {
            method,
            segments: parse_segments(pattern),
            operation,
        }
    }

    fn match_path(&self, path: &[&str]) -> Option<HashMap<String, String>> {
        if path.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::new();
        for (pattern, actual) in self.segments.iter().zip(path) {
            match pattern {
                PathSegment::Literal(expected) => {
                    if expected != actual {
                        return None;
                    }
                }
                PathSegment::Param(name) => {
                    params.insert(name.clone(), (*actual).to_string());
                }
            }
        }
        Some(params)
    }
}

fn parse_segments(pattern: &str) -> Vec<PathSegment> {
    split_path(pattern)
        .into_iter()
        .map(|s| match s.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            Some(name) => PathSegment::Param(name.to_string()),
            None => PathSegment::Literal(s.to_string()),
        })
        .collect()
}

fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// HTTP request router. First registered match wins.
#[derive(Debug, Clone, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    /// Creates an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The gateway's route table. `/metrics` is only served when metrics are on.
    #[must_use]
    pub fn gateway(metrics_enabled: bool) -> Self {
        let mut router = Self::new();
        router.add_route(Method::GET, "/health", Operation::Health);
        if metrics_enabled {
            router.add_route(Method::GET, "/metrics", Operation::Metrics);
        }
        router.add_route(Method::POST, "/api/v1/auth/token", Operation::Authenticate);
        router.add_route(Method::POST, "/api/v1/user", Operation::CreateUser);
        router.add_route(Method::GET, "/api/v1/user/{userId}", Operation::GetUserProfile);
        router.add_route(Method::POST, "/api/v1/account", Operation::CreateAccount);
        router.add_route(Method::GET, "/api/v1/accounts/{accountId}", Operation::FindAccount);
        router
    }

    /// Registers a route.
    pub fn add_route(&mut self, method: Method, pattern: &str, operation: Operation) {
        self.routes.push(Route::new(method, pattern, operation));
    }

    /// Resolves a request to an operation.
    #[must_use]
    pub fn resolve(&self, method: &Method, path: &str) -> Resolution {
        let segments = split_path(path);
        let mut path_known = false;

        for route in &self.routes {
            if let Some(params) = route.match_path(&segments) {
                if route.method == *method {
                    return Resolution::Matched(RouteMatch::new(route.operation, params));
                }
                path_known = true;
            }
        }

        if path_known {
            Resolution::MethodNotAllowed
        } else {
            Resolution::NotFound
        }
    }

    /// Returns `true` if some route serves `operation`.
    #[must_use]
    pub fn has_operation(&self, operation: Operation) -> bool {
        self.routes.iter().any(|r| r.operation == operation)
    }

    /// Number of registered routes.
    #[must_use]
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }
}
