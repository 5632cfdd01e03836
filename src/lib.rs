//! Trellis - the request-handling core of a small web framework
//!
//! Trellis provides the pieces between "a request arrived" and "bytes left
//! the process":
//! - Route registration with nested groups and delegated matching
//! - Middleware orchestration around resolved controllers
//! - Response emission with gzip negotiation and cache headers
//! - A process-wide runtime-error trap with a fail-safe valve

// Enforce error handling best practices
#![cfg_attr(
    not(test),
    warn(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::unimplemented,
        clippy::todo,
    )
)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used,))]

pub mod config;
pub mod controller;
pub mod dispatcher;
pub mod emitter;
pub mod error;
pub mod http;
pub mod middleware;
pub mod routing;
pub mod views;

// Re-export main types for public API
pub use config::HandlerConfig;
pub use controller::{Controller, ControllerRegistry};
pub use dispatcher::{Dispatcher, MatchStatus, RouteTable};
pub use emitter::Emitter;
pub use error::bridge::{ErrorBridge, ErrorLevel, ProcessErrorState, CATCH_ALL};
pub use error::{Error, Result};
pub use http::{BodyStream, Request, Response};
pub use middleware::{Middleware, MiddlewareBinding, MiddlewareDescriptor, MiddlewareRegistry};
pub use routing::matcher::{MatchOutcome, RouteMatcher};
pub use routing::url::RouteUrl;
pub use routing::{HandlerFn, RouteEntry, Target, METHOD_CLI};
pub use views::{NullView, ViewEngine};

// Re-export commonly used external types
pub use serde::{Deserialize, Serialize};
pub use serde_json::{json, Value};
