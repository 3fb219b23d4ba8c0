//! First-match request router.
//!
//! Routes are tried in the order they were added. The first route whose path
//! and method both match wins, so a specific route only shadows a catch-all
//! when it is added before it. Any future index over the table has to keep
//! that order.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use http::Method;
use regex::Regex;

use crate::handler::{BoxedHandler, Captures, Handler};
use crate::request::Request;

// ── PathMatcher ───────────────────────────────────────────────────────────────

/// The path predicate of a [`Route`].
#[derive(Clone, Debug)]
pub enum PathMatcher {
    /// Byte-equal to the request path (query string excluded).
    Exact(String),
    /// The regex finds a match anywhere in the request path. Anchor it with
    /// `^…$` to require a full match.
    Pattern(Regex),
}

impl PathMatcher {
    pub fn matches(&self, path: &str) -> bool {
        match self {
            Self::Exact(p) => p == path,
            Self::Pattern(re) => re.is_match(path),
        }
    }
}

impl From<&str> for PathMatcher {
    fn from(p: &str) -> Self { Self::Exact(p.to_owned()) }
}

impl From<String> for PathMatcher {
    fn from(p: String) -> Self { Self::Exact(p) }
}

impl From<Regex> for PathMatcher {
    fn from(re: Regex) -> Self { Self::Pattern(re) }
}

// ── Route ─────────────────────────────────────────────────────────────────────

/// What a matched route does with the request.
#[derive(Clone)]
pub enum Target {
    Handler(BoxedHandler),
    /// Serve this single file.
    File(PathBuf),
    /// Serve the request path from this directory tree.
    Directory(PathBuf),
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Handler(_) => f.write_str("Handler(..)"),
            Self::File(p) => f.debug_tuple("File").field(p).finish(),
            Self::Directory(p) => f.debug_tuple("Directory").field(p).finish(),
        }
    }
}

/// A route descriptor: optional path and method predicates plus a target.
///
/// ```rust
/// use portico::{Route, Router};
/// use regex::Regex;
///
/// let router = Router::new()
///     .route(Route::file("public/index.html").path("/"))
///     .route(Route::directory("public").path(Regex::new("^/assets/").unwrap()).method("get"));
/// ```
#[derive(Clone, Debug)]
pub struct Route {
    path: Option<PathMatcher>,
    method: Option<String>,
    target: Target,
}

impl Route {
    fn new(target: Target) -> Self {
        Self { path: None, method: None, target }
    }

    pub fn handler(handler: impl Handler) -> Self {
        Self::new(Target::Handler(handler.into_boxed_handler()))
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::new(Target::File(path.into()))
    }

    pub fn directory(path: impl Into<PathBuf>) -> Self {
        Self::new(Target::Directory(path.into()))
    }

    /// Restricts the route to a path. Without one, every path matches.
    pub fn path(mut self, path: impl Into<PathMatcher>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Restricts the route to a method, compared case-insensitively.
    /// Without one, every method matches.
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Whether the path and method predicates hold for `req`.
    ///
    /// The method predicate is skipped for `OPTIONS`: every route answers it.
    pub fn matches(&self, req: &Request) -> bool {
        if let Some(path) = &self.path {
            if !path.matches(req.path()) {
                return false;
            }
        }
        if *req.method() != Method::OPTIONS {
            if let Some(method) = &self.method {
                if !method.eq_ignore_ascii_case(req.method().as_str()) {
                    return false;
                }
            }
        }
        true
    }
}

// ── Matcher ───────────────────────────────────────────────────────────────────

/// A successful routing decision.
#[derive(Clone, Debug)]
pub struct Match {
    pub route: Arc<Route>,
    pub captures: Captures,
}

/// Maps a request to a route.
///
/// [`Router`] is the built-in implementation. Any
/// `Fn(&Request) -> Option<Match>` closure can stand in for it.
pub trait Matcher: Send + Sync + 'static {
    fn matches(&self, req: &Request) -> Option<Match>;
}

impl<F> Matcher for F
where
    F: Fn(&Request) -> Option<Match> + Send + Sync + 'static,
{
    fn matches(&self, req: &Request) -> Option<Match> {
        self(req)
    }
}

// ── Router ────────────────────────────────────────────────────────────────────

/// An ordered route table.
///
/// Build it once at startup and hand it to [`Options::routes`](crate::Options::routes).
/// Every registration returns `self` so calls chain.
#[derive(Clone, Debug, Default)]
pub struct Router {
    routes: Vec<Arc<Route>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a route descriptor.
    pub fn route(mut self, route: Route) -> Self {
        self.routes.push(Arc::new(route));
        self
    }

    /// Registers a handler for a method + exact path pair.
    ///
    /// ```rust
    /// # use portico::{Captures, Reply, Request, Responder, ResponseSink, Router};
    /// # fn list(_: Request, _: Captures, r: Responder, _: ResponseSink) -> Reply { r.text("") }
    /// # fn create(_: Request, _: Captures, r: Responder, _: ResponseSink) -> Reply { r.text("") }
    /// Router::new()
    ///     .on("GET",  "/users", list)
    ///     .on("POST", "/users", create);
    /// ```
    pub fn on(self, method: &str, path: &str, handler: impl Handler) -> Self {
        self.route(Route::handler(handler).path(path).method(method))
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.on("GET", path, handler)
    }

    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.on("POST", path, handler)
    }

    pub fn put(self, path: &str, handler: impl Handler) -> Self {
        self.on("PUT", path, handler)
    }

    pub fn delete(self, path: &str, handler: impl Handler) -> Self {
        self.on("DELETE", path, handler)
    }

    /// Serves `file` for requests to exactly `path`, any method.
    pub fn file(self, path: &str, file: impl Into<PathBuf>) -> Self {
        self.route(Route::file(file).path(path))
    }

    /// Serves the directory tree `dir` for paths matching `pattern`.
    pub fn directory(self, pattern: Regex, dir: impl Into<PathBuf>) -> Self {
        self.route(Route::directory(dir).path(pattern))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl Matcher for Router {
    fn matches(&self, req: &Request) -> Option<Match> {
        self.routes.iter()
            .find(|route| route.matches(req))
            .map(|route| Match { route: Arc::clone(route), captures: Captures::new() })
    }
}
