pub mod matcher;
pub mod url;

use crate::error::{Error, Result};
use crate::http::{Request, Response};
use crate::middleware::MiddlewareDescriptor;
use std::future::Future;
use std::pin::Pin;

/// Synthetic pseudo-method so the same route table can serve
/// command-line invocations
pub const METHOD_CLI: &str = "CLI";

/// Plain-callable route target, invoked with `(response, request)`.
/// A returned `Some(Response)` replaces the current response.
pub type HandlerFn = for<'a> fn(
    &'a mut Response,
    &'a Request,
) -> Pin<Box<dyn Future<Output = Result<Option<Response>>> + Send + 'a>>;

/// Closed variant for what a matched route invokes
#[derive(Clone)]
pub enum Target {
    /// A plain callable, invoked directly
    Callable(HandlerFn),
    /// A registered controller identifier, resolved through the
    /// controller registry at dispatch time, with an optional method name
    Bound {
        controller: String,
        method: Option<String>,
    },
}

impl Target {
    pub fn callable(handler: HandlerFn) -> Self {
        Target::Callable(handler)
    }

    pub fn controller(id: impl Into<String>) -> Self {
        Target::Bound {
            controller: id.into(),
            method: None,
        }
    }

    pub fn controller_method(id: impl Into<String>, method: impl Into<String>) -> Self {
        Target::Bound {
            controller: id.into(),
            method: Some(method.into()),
        }
    }
}

impl std::fmt::Debug for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Callable(_) => write!(f, "Callable"),
            Target::Bound { controller, method } => {
                write!(f, "Bound({}::{})", controller, method.as_deref().unwrap_or("invoke"))
            }
        }
    }
}

/// Immutable description of one route: method set, path pattern and target.
///
/// Patterns use matchit placeholder syntax, e.g. `/users/{id}`.
#[derive(Debug, Clone)]
pub struct RouteEntry {
    methods: Vec<String>,
    pattern: String,
    target: Target,
}

impl RouteEntry {
    /// Validates the method set and the target; methods are normalized to
    /// upper case. The pattern itself is not validated here, that is the
    /// matching engine's job at compile time.
    pub fn new(methods: &[&str], pattern: &str, target: Target) -> Result<Self> {
        if methods.is_empty() {
            return Err(Error::invalid_argument("Method list cannot be empty"));
        }
        if let Target::Bound { controller, .. } = &target {
            if controller.is_empty() {
                return Err(Error::invalid_argument("Controller identifier cannot be empty"));
            }
        }
        Ok(Self {
            methods: methods.iter().map(|m| m.to_uppercase()).collect(),
            pattern: pattern.to_string(),
            target,
        })
    }

    pub fn methods(&self) -> &[String] {
        &self.methods
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn target(&self) -> &Target {
        &self.target
    }
}

/// One node in the registration tree
#[derive(Debug, Clone)]
pub enum RouteNode {
    Entry(RouteEntry),
    Group(RouteGroup),
}

/// A registration subtree: optional shared prefix, shared middleware
/// descriptors, and nested entries/groups. Built eagerly when the grouping
/// callback returns; never mutated afterwards.
#[derive(Debug, Clone, Default)]
pub struct RouteGroup {
    pub prefix: Option<String>,
    pub middleware: Vec<MiddlewareDescriptor>,
    pub children: Vec<RouteNode>,
}

/// A flattened route ready for the matching engine: prefixes merged,
/// middleware accumulated parent-first
#[derive(Debug, Clone)]
pub struct FlatRoute {
    pub methods: Vec<String>,
    pub pattern: String,
    pub target: Target,
    pub middleware: Vec<MiddlewareDescriptor>,
}

/// Join a group prefix and a child pattern without producing double slashes
pub fn join_patterns(prefix: &str, pattern: &str) -> String {
    if prefix.is_empty() {
        return pattern.to_string();
    }
    let prefix = prefix.trim_end_matches('/');
    if pattern.is_empty() || pattern == "/" {
        return prefix.to_string();
    }
    if pattern.starts_with('/') {
        format!("{}{}", prefix, pattern)
    } else {
        format!("{}/{}", prefix, pattern)
    }
}

/// Recursively expand the registration tree into flat routes
pub fn flatten(
    nodes: &[RouteNode],
    prefix: &str,
    middleware: &[MiddlewareDescriptor],
    out: &mut Vec<FlatRoute>,
) {
    for node in nodes {
        match node {
            RouteNode::Entry(entry) => out.push(FlatRoute {
                methods: entry.methods().to_vec(),
                pattern: join_patterns(prefix, entry.pattern()),
                target: entry.target().clone(),
                middleware: middleware.to_vec(),
            }),
            RouteNode::Group(group) => {
                let child_prefix = match &group.prefix {
                    Some(p) => join_patterns(prefix, p),
                    None => prefix.to_string(),
                };
                let mut child_middleware = middleware.to_vec();
                child_middleware.extend(group.middleware.iter().cloned());
                flatten(&group.children, &child_prefix, &child_middleware, out);
            }
        }
    }
}
