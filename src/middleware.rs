//! Middleware units and their process-wide registry.
//!
//! A middleware exposes a `before`/`after` capability pair run around the
//! matched controller. Instances are memoized per identifier: every route
//! referencing the same identifier shares one instance for the life of the
//! registry, so middleware state is registry-lifetime state unless the
//! middleware is stateless.

use crate::error::{Error, Result};
use crate::http::{Request, Response};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

/// A unit with hooks run around a controller invocation.
///
/// Any hook returning `Some(Response)` replaces the current response;
/// the last writer wins.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn before(&self, _res: &mut Response, _req: &Request) -> Result<Option<Response>> {
        Ok(None)
    }

    async fn after(&self, _res: &mut Response, _req: &Request) -> Result<Option<Response>> {
        Ok(None)
    }

    /// Invoke a hook by name. The default routes `"before"` and `"after"`
    /// to the capability pair; implementors with extra named hooks override
    /// this and fall back to the default for the standard pair.
    async fn call(&self, name: &str, res: &mut Response, req: &Request) -> Result<Option<Response>> {
        match name {
            "before" => self.before(res, req).await,
            "after" => self.after(res, req).await,
            other => Err(Error::configuration(format!(
                "Middleware has no method \"{}\"",
                other
            ))),
        }
    }
}

/// Which hook names run in each phase, defaulting to the capability pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiddlewareBinding {
    pub before_methods: Vec<String>,
    pub after_methods: Vec<String>,
}

impl Default for MiddlewareBinding {
    fn default() -> Self {
        Self {
            before_methods: vec!["before".to_string()],
            after_methods: vec!["after".to_string()],
        }
    }
}

/// Reference to a middleware unit: registry identifier plus hook binding
#[derive(Debug, Clone)]
pub struct MiddlewareDescriptor {
    pub id: String,
    pub binding: MiddlewareBinding,
}

impl MiddlewareDescriptor {
    /// Descriptor using the default `before`/`after` pair
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            binding: MiddlewareBinding::default(),
        }
    }

    /// Descriptor that additionally runs one named method in the before
    /// phase and records its counterpart for the after phase
    pub fn with_binding(id: impl Into<String>, binding: MiddlewareBinding) -> Self {
        Self {
            id: id.into(),
            binding,
        }
    }
}

type MiddlewareFactory = Box<dyn Fn() -> Arc<dyn Middleware> + Send + Sync>;

/// Factory map plus instance memo, keyed by identifier.
///
/// Owned by the caller and injected into the dispatcher, shared across every
/// route table derived from it. At most one instance exists per identifier.
#[derive(Default)]
pub struct MiddlewareRegistry {
    factories: DashMap<String, MiddlewareFactory>,
    instances: DashMap<String, Arc<dyn Middleware>>,
}

impl MiddlewareRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, id: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn Middleware> + Send + Sync + 'static,
    {
        self.factories.insert(id.into(), Box::new(factory));
    }

    /// Resolve the memoized instance, building it on first use
    pub fn resolve(&self, id: &str) -> Result<Arc<dyn Middleware>> {
        if let Some(instance) = self.instances.get(id) {
            return Ok(Arc::clone(&instance));
        }
        let factory = self.factories.get(id).ok_or_else(|| {
            Error::configuration(format!("Middleware \"{}\" is not registered", id))
        })?;
        let instance = factory();
        self.instances.insert(id.to_string(), Arc::clone(&instance));
        Ok(instance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting;

    #[async_trait]
    impl Middleware for Counting {}

    #[test]
    fn instances_are_memoized_per_id() {
        let built = Arc::new(AtomicUsize::new(0));
        let registry = MiddlewareRegistry::new();
        let built_clone = Arc::clone(&built);
        registry.register("counting", move || {
            built_clone.fetch_add(1, Ordering::SeqCst);
            Arc::new(Counting)
        });

        let first = registry.resolve("counting").unwrap();
        let second = registry.resolve("counting").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(built.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unknown_id_is_a_configuration_error() {
        let registry = MiddlewareRegistry::new();
        assert!(matches!(
            registry.resolve("ghost"),
            Err(Error::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn unknown_hook_name_is_a_configuration_error() {
        let mw = Counting;
        let mut res = Response::ok();
        let req = Request::new("GET", "/");
        assert!(matches!(
            mw.call("sideways", &mut res, &req).await,
            Err(Error::Configuration(_))
        ));
    }
}
