//! Handler trait and type erasure.
//!
//! # How handlers are stored
//!
//! A [`Router`](crate::Router) holds handlers of *different* types in one
//! `Vec<Route>`. Rust collections can only hold one concrete type, so each
//! handler is hidden behind a trait object (`dyn ErasedHandler`).
//!
//! ```text
//! fn echo(req, captures, responder, sink) -> Reply   ← user writes this
//!        ↓ Router::new().post("/echo", echo)
//! echo.into_boxed_handler()                          ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(echo))                          ← stored as BoxedHandler
//!        ↓
//! handler.call(req, captures, responder, sink)       ← one vtable dispatch
//!        ↓
//! echo(..).into_intent()                             ← Intent
//! ```
//!
//! Handlers are plain synchronous functions. Asynchronous work is returned as
//! an [`Intent::Deferred`](crate::Intent::Deferred).

use std::collections::HashMap;
use std::sync::Arc;

use crate::intent::{Intent, IntoIntent, ResponseSink};
use crate::request::Request;
use crate::response::Responder;

// ── Captures ──────────────────────────────────────────────────────────────────

/// Named captures of a route match.
///
/// The built-in router never captures anything, so this is always empty for
/// it. Custom [`Matcher`](crate::Matcher)s may fill it in.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Captures(HashMap<String, String>);

impl Captures {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ── Internal types ────────────────────────────────────────────────────────────

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in the
/// return type of the public `Handler` trait's `into_boxed_handler` method.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(
        &self,
        req: Request,
        captures: Captures,
        responder: Responder,
        sink: ResponseSink,
    ) -> Intent;
}

/// A type-erased handler shared across concurrent requests.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid route handler.
///
/// Satisfied by any function or closure with the signature:
///
/// ```text
/// fn name(req: Request, captures: Captures, responder: Responder, sink: ResponseSink) -> impl IntoIntent
/// ```
///
/// The trait is sealed: only the blanket impl below can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, R> private::Sealed for F
where
    F: Fn(Request, Captures, Responder, ResponseSink) -> R + Send + Sync + 'static,
    R: IntoIntent,
{
}

impl<F, R> Handler for F
where
    F: Fn(Request, Captures, Responder, ResponseSink) -> R + Send + Sync + 'static,
    R: IntoIntent,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

// ── Concrete wrapper ──────────────────────────────────────────────────────────

/// Newtype bridging a concrete handler `F` to [`ErasedHandler`].
struct FnHandler<F>(F);

impl<F, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Request, Captures, Responder, ResponseSink) -> R,
    R: IntoIntent,
{
    fn call(
        &self,
        req: Request,
        captures: Captures,
        responder: Responder,
        sink: ResponseSink,
    ) -> Intent {
        (self.0)(req, captures, responder, sink).into_intent()
    }
}
