//! Radix-tree request router.
//!
//! One tree per HTTP method. O(path-length) lookup. You register a path, you
//! get a handler. Route matching itself is [`matchit`]'s job.

use std::collections::HashMap;
use std::sync::Arc;

use http::{Method, StatusCode};
use matchit::Router as MatchitRouter;

use crate::handler::{BoxFuture, BoxedHandler, Handler, Service};
use crate::request::Request;
use crate::response::Response;

/// The application router.
///
/// Build it once at startup, then either hand it straight to
/// [`Server::serve`](crate::Server::serve) or wrap it with
/// [`Prometheus::wrap_handler`](crate::middleware::prometheus::Prometheus::wrap_handler)
/// first. Each registration returns `self` so calls chain naturally.
pub struct Router {
    routes: HashMap<Method, MatchitRouter<BoxedHandler>>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: HashMap::new() }
    }

    /// Register a handler for a method + path pair. Returns `self` for chaining.
    ///
    /// Path parameters use `{name}` syntax; `req.param("name")` retrieves them:
    ///
    /// ```rust,no_run
    /// # use tsu_prometheus::{Request, Response, Router};
    /// # use http::Method;
    /// # async fn get_user(_: Request) -> Response { Response::text("") }
    /// # async fn create_user(_: Request) -> Response { Response::text("") }
    /// Router::new()
    ///     .on(Method::GET,  "/users/{id}", get_user)
    ///     .on(Method::POST, "/users",      create_user);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid route pattern or conflicts with one
    /// already registered for `method`.
    pub fn on(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.routes
            .entry(method)
            .or_default()
            .insert(path, handler.into_boxed_handler())
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self
    }

    /// Shorthand for `on(Method::GET, path, handler)`.
    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::GET, path, handler)
    }

    /// Shorthand for `on(Method::POST, path, handler)`.
    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::POST, path, handler)
    }

    /// Routes one request to its handler, answering `404 Not Found` when no
    /// route matches the method and path.
    ///
    /// The lookup happens eagerly; only the handler itself runs inside the
    /// returned future.
    pub fn dispatch(&self, mut req: Request) -> BoxFuture {
        let Some((handler, params)) = self.lookup(&req.method, req.uri.path()) else {
            return Box::pin(async { Response::status(StatusCode::NOT_FOUND) });
        };
        req.params = params;
        handler.call(req)
    }

    fn lookup(&self, method: &Method, path: &str) -> Option<(BoxedHandler, HashMap<String, String>)> {
        let tree = self.routes.get(method)?;
        let matched = tree.at(path).ok()?;
        let handler = Arc::clone(matched.value);
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((handler, params))
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

/// A bare router is a service too, for apps that skip instrumentation.
impl Service for Router {
    fn call(&self, req: Request) -> BoxFuture {
        self.dispatch(req)
    }
}
