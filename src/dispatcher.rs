//! Route registration and dispatch.
//!
//! The `RouteTable` collects routes and nested groups; the `Dispatcher`
//! wraps one table together with the current request/response pair,
//! compiles the table into the matching engine on first dispatch, and
//! orchestrates middleware around the matched controller.

use crate::controller::ControllerRegistry;
use crate::error::{Error, Result};
use crate::http::{Request, Response};
use crate::middleware::{MiddlewareDescriptor, MiddlewareRegistry};
use crate::routing::matcher::{CachedRoutes, MatchOutcome, RouteMatcher};
use crate::routing::url::RouteUrl;
use crate::routing::{flatten, FlatRoute, RouteEntry, RouteGroup, RouteNode, Target, METHOD_CLI};
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Dispatch status handed to the dispatch hook
#[derive(Debug, Clone, PartialEq)]
pub enum MatchStatus {
    Found,
    NotFound,
    MethodNotAllowed(Vec<String>),
}

/// Ordered route registrations, including nested groups.
///
/// Group callbacks receive a child table to populate; the populated child is
/// recorded as a group node and merged during compilation.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    nodes: Vec<RouteNode>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one route. The pattern is not validated here; the matching
    /// engine validates it at compile time.
    pub fn map(&mut self, methods: &[&str], pattern: &str, target: Target) -> Result<()> {
        self.nodes
            .push(RouteNode::Entry(RouteEntry::new(methods, pattern, target)?));
        Ok(())
    }

    pub fn get(&mut self, pattern: &str, target: Target) -> Result<()> {
        self.map(&["GET"], pattern, target)
    }

    pub fn post(&mut self, pattern: &str, target: Target) -> Result<()> {
        self.map(&["POST"], pattern, target)
    }

    pub fn put(&mut self, pattern: &str, target: Target) -> Result<()> {
        self.map(&["PUT"], pattern, target)
    }

    pub fn delete(&mut self, pattern: &str, target: Target) -> Result<()> {
        self.map(&["DELETE"], pattern, target)
    }

    /// Route reachable through the synthetic CLI pseudo-method
    pub fn shell(&mut self, pattern: &str, target: Target) -> Result<()> {
        self.map(&[METHOD_CLI], pattern, target)
    }

    pub fn cli(&mut self, pattern: &str, target: Target) -> Result<()> {
        self.shell(pattern, target)
    }

    /// Nest a group of routes under a shared path prefix with shared
    /// middleware descriptors. Middleware accumulates parent-first down
    /// nested groups; prefixes concatenate left-to-right.
    pub fn group<F>(&mut self, prefix: &str, middleware: Vec<MiddlewareDescriptor>, populate: F)
    where
        F: FnOnce(&mut RouteTable),
    {
        self.push_group(Some(prefix.to_string()), middleware, populate);
    }

    /// Nest a group with shared middleware but no path prefix
    pub fn group_routes<F>(&mut self, middleware: Vec<MiddlewareDescriptor>, populate: F)
    where
        F: FnOnce(&mut RouteTable),
    {
        self.push_group(None, middleware, populate);
    }

    fn push_group<F>(
        &mut self,
        prefix: Option<String>,
        middleware: Vec<MiddlewareDescriptor>,
        populate: F,
    ) where
        F: FnOnce(&mut RouteTable),
    {
        let mut child = RouteTable::new();
        populate(&mut child);
        self.nodes.push(RouteNode::Group(RouteGroup {
            prefix,
            middleware,
            children: child.nodes,
        }));
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn nodes(&self) -> &[RouteNode] {
        &self.nodes
    }
}

struct CompiledTable {
    matcher: RouteMatcher,
    routes: Vec<FlatRoute>,
}

/// One dispatcher handles one request to completion.
///
/// Compilation is memoized for the life of the instance; the design assumes
/// one table instance per logical request-handling thread. Sharing an
/// uncompiled dispatcher across threads requires external synchronization.
pub struct Dispatcher {
    table: RouteTable,
    response: Option<Response>,
    request: Request,
    method: String,
    dispatch_path: String,
    cache_file: Option<PathBuf>,
    cache_enabled: bool,
    compiled: OnceCell<CompiledTable>,
    url: Option<RouteUrl>,
    controllers: Arc<ControllerRegistry>,
    middleware: Arc<MiddlewareRegistry>,
}

impl Dispatcher {
    pub fn new(
        response: Response,
        request: Request,
        controllers: Arc<ControllerRegistry>,
        middleware: Arc<MiddlewareRegistry>,
    ) -> Self {
        let method = request.method().to_string();
        let dispatch_path = normalize_path(request.path());
        Self {
            table: RouteTable::new(),
            response: Some(response),
            request,
            method,
            dispatch_path,
            cache_file: None,
            cache_enabled: false,
            compiled: OnceCell::new(),
            url: None,
            controllers,
            middleware,
        }
    }

    pub fn table(&mut self) -> &mut RouteTable {
        &mut self.table
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    /// Accessor for the last matched route's parameters
    pub fn url(&self) -> Option<&RouteUrl> {
        self.url.as_ref()
    }

    /// Override the method used at dispatch time
    pub fn set_request_method(&mut self, method: &str) {
        self.method = method.to_uppercase();
    }

    /// Path resolved against the table; normalized to one leading slash
    pub fn set_dispatch_path(&mut self, path: &str) {
        self.dispatch_path = normalize_path(path);
    }

    /// Configure persistent route caching. Fails when caching is enabled
    /// but the target directory is missing or not writable.
    pub fn set_router_cache_file(&mut self, cache_file: &str, enable_cache: bool) -> Result<()> {
        let path = PathBuf::from(cache_file);
        if enable_cache {
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            let writable = std::fs::metadata(dir)
                .map(|meta| meta.is_dir() && !meta.permissions().readonly())
                .unwrap_or(false);
            if !writable {
                return Err(Error::configuration(format!(
                    "Directory \"{}\" is not writable; cannot save route cache \"{}\"",
                    dir.display(),
                    path.display()
                )));
            }
        }
        self.cache_file = Some(path);
        self.cache_enabled = enable_cache;
        Ok(())
    }

    // Registration sugar delegating to the owned table

    pub fn map(&mut self, methods: &[&str], pattern: &str, target: Target) -> Result<()> {
        self.table.map(methods, pattern, target)
    }

    pub fn get(&mut self, pattern: &str, target: Target) -> Result<()> {
        self.table.get(pattern, target)
    }

    pub fn post(&mut self, pattern: &str, target: Target) -> Result<()> {
        self.table.post(pattern, target)
    }

    pub fn put(&mut self, pattern: &str, target: Target) -> Result<()> {
        self.table.put(pattern, target)
    }

    pub fn delete(&mut self, pattern: &str, target: Target) -> Result<()> {
        self.table.delete(pattern, target)
    }

    pub fn shell(&mut self, pattern: &str, target: Target) -> Result<()> {
        self.table.shell(pattern, target)
    }

    pub fn cli(&mut self, pattern: &str, target: Target) -> Result<()> {
        self.table.cli(pattern, target)
    }

    pub fn group<F>(&mut self, prefix: &str, middleware: Vec<MiddlewareDescriptor>, populate: F)
    where
        F: FnOnce(&mut RouteTable),
    {
        self.table.group(prefix, middleware, populate);
    }

    pub fn group_routes<F>(&mut self, middleware: Vec<MiddlewareDescriptor>, populate: F)
    where
        F: FnOnce(&mut RouteTable),
    {
        self.table.group_routes(middleware, populate);
    }

    /// Flatten the registration tree and build the matcher, reusing the
    /// compiled table across calls on this instance
    fn compile(&self) -> Result<&CompiledTable> {
        self.compiled.get_or_try_init(|| {
            let mut flat = Vec::new();
            flatten(self.table.nodes(), "", &[], &mut flat);
            log::debug!("Compiling route table with {} routes", flat.len());

            let matcher = match (&self.cache_file, self.cache_enabled) {
                (Some(path), true) => Self::compile_cached(path, &flat)?,
                _ => compile_flat(&flat)?,
            };
            Ok(CompiledTable {
                matcher,
                routes: flat,
            })
        })
    }

    fn compile_cached(path: &Path, flat: &[FlatRoute]) -> Result<RouteMatcher> {
        if path.exists() {
            match CachedRoutes::load(path) {
                Ok(cached) if cached.matches(flat) => return cached.compile(),
                Ok(_) => log::warn!(
                    "Route cache \"{}\" is stale; rebuilding",
                    path.display()
                ),
                Err(err) => log::warn!(
                    "Route cache \"{}\" is unreadable ({}); rebuilding",
                    path.display(),
                    err
                ),
            }
        }
        let cached = CachedRoutes::from_flat(flat);
        cached.store(path)?;
        cached.compile()
    }

    /// Resolve the request against the compiled table and run the matched
    /// pipeline.
    ///
    /// The hook is an observation point, not error handling: it fires on
    /// every dispatch, including a successful match (with the route's URL
    /// accessor). On not-found and method-not-allowed outcomes its returned
    /// response is adopted. Any hook, middleware or controller returning
    /// `Some(Response)` replaces the current response; the last writer wins.
    pub async fn dispatch<F>(&mut self, mut hook: F) -> Result<Response>
    where
        F: FnMut(MatchStatus, &mut Response, &Request, Option<&RouteUrl>) -> Result<Option<Response>>,
    {
        let outcome = self
            .compile()?
            .matcher
            .dispatch(&self.method, &self.dispatch_path);

        let mut response = self
            .response
            .take()
            .ok_or_else(|| Error::configuration("Dispatcher has no response to thread"))?;

        match outcome {
            MatchOutcome::Found { route, params } => {
                let (target, descriptors) = {
                    let compiled = self.compile()?;
                    let flat = &compiled.routes[route];
                    (flat.target.clone(), flat.middleware.clone())
                };
                log::debug!(
                    "Matched {} {} -> {:?}",
                    self.method,
                    self.dispatch_path,
                    target
                );

                let url = RouteUrl::new(
                    self.dispatch_path.clone(),
                    params,
                    self.request.query().clone(),
                );
                if let Some(adopted) =
                    hook(MatchStatus::Found, &mut response, &self.request, Some(&url))?
                {
                    response = adopted;
                }
                self.url = Some(url);

                match target {
                    Target::Bound { controller, method } => {
                        self.dispatch_middleware(
                            &descriptors,
                            &controller,
                            method.as_deref(),
                            &mut response,
                        )
                        .await?;
                    }
                    Target::Callable(handler) => {
                        if let Some(adopted) = handler(&mut response, &self.request).await? {
                            response = adopted;
                        }
                    }
                }
            }
            MatchOutcome::NotFound => {
                log::debug!("No route for {} {}", self.method, self.dispatch_path);
                if let Some(adopted) =
                    hook(MatchStatus::NotFound, &mut response, &self.request, None)?
                {
                    response = adopted;
                }
            }
            MatchOutcome::MethodNotAllowed { allowed } => {
                log::debug!(
                    "Method {} not allowed for {} (allowed: {:?})",
                    self.method,
                    self.dispatch_path,
                    allowed
                );
                if let Some(adopted) = hook(
                    MatchStatus::MethodNotAllowed(allowed),
                    &mut response,
                    &self.request,
                    None,
                )? {
                    response = adopted;
                }
            }
        }

        self.response = Some(response.clone());
        Ok(response)
    }

    /// Run the accumulated middleware chain around the controller.
    ///
    /// Before hooks run in accumulated (parent-then-child, registration)
    /// order: the default `before` capability first, then any custom named
    /// before-methods. After the controller, every distinct instance touched
    /// in this dispatch gets its default `after` capability and its custom
    /// after-methods, in first-seen order.
    async fn dispatch_middleware(
        &self,
        descriptors: &[MiddlewareDescriptor],
        controller_id: &str,
        controller_method: Option<&str>,
        response: &mut Response,
    ) -> Result<()> {
        let mut touched: Vec<(String, Arc<dyn crate::middleware::Middleware>, Vec<String>)> =
            Vec::new();

        for descriptor in descriptors {
            let instance = self.middleware.resolve(&descriptor.id)?;

            if let Some(adopted) = instance.before(response, &self.request).await? {
                *response = adopted;
            }
            for name in &descriptor.binding.before_methods {
                if name == "before" {
                    continue;
                }
                if let Some(adopted) = instance.call(name, response, &self.request).await? {
                    *response = adopted;
                }
            }

            let customs: Vec<String> = descriptor
                .binding
                .after_methods
                .iter()
                .filter(|name| name.as_str() != "after")
                .cloned()
                .collect();
            match touched.iter_mut().find(|(id, _, _)| id == &descriptor.id) {
                Some((_, _, existing)) => {
                    for custom in customs {
                        if !existing.contains(&custom) {
                            existing.push(custom);
                        }
                    }
                }
                None => touched.push((descriptor.id.clone(), instance, customs)),
            }
        }

        let controller = self.controllers.resolve(controller_id)?;
        let returned = match controller_method {
            Some(method) => controller.call(method, response, &self.request).await?,
            None => controller.invoke(response, &self.request).await?,
        };
        if let Some(adopted) = returned {
            *response = adopted;
        }

        for (_, instance, customs) in &touched {
            if let Some(adopted) = instance.after(response, &self.request).await? {
                *response = adopted;
            }
            for name in customs {
                if let Some(adopted) = instance.call(name, response, &self.request).await? {
                    *response = adopted;
                }
            }
        }

        Ok(())
    }
}

fn compile_flat(flat: &[FlatRoute]) -> Result<RouteMatcher> {
    RouteMatcher::compile(
        flat.iter()
            .map(|route| (route.methods.as_slice(), route.pattern.as_str())),
    )
}

fn normalize_path(path: &str) -> String {
    format!("/{}", path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_path_gets_one_leading_slash() {
        assert_eq!(normalize_path("users"), "/users");
        assert_eq!(normalize_path("//users"), "/users");
        assert_eq!(normalize_path("/users"), "/users");
    }
}
