//! Controller resolution: the container collaborator that turns a route's
//! class identifier into an invokable instance.
//!
//! Unlike middleware, controllers are built fresh on every dispatch.

use crate::error::{Error, Result};
use crate::http::{Request, Response};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

/// A bound route target. `invoke` is the plain-invokable form; `call`
/// dispatches a named method for `{controller, method}` targets. Either
/// returning `Some(Response)` replaces the current response.
#[async_trait]
pub trait Controller: Send + Sync {
    async fn invoke(&self, _res: &mut Response, _req: &Request) -> Result<Option<Response>> {
        Err(Error::configuration(
            "Controller is not invokable; bind a method name",
        ))
    }

    async fn call(
        &self,
        method: &str,
        _res: &mut Response,
        _req: &Request,
    ) -> Result<Option<Response>> {
        Err(Error::configuration(format!(
            "Controller has no method \"{}\"",
            method
        )))
    }
}

type ControllerFactory = Box<dyn Fn() -> Arc<dyn Controller> + Send + Sync>;

/// Identifier-to-factory map; resolution fails with a configuration error
/// for unknown identifiers
#[derive(Default)]
pub struct ControllerRegistry {
    factories: DashMap<String, ControllerFactory>,
}

impl ControllerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, id: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn Controller> + Send + Sync + 'static,
    {
        self.factories.insert(id.into(), Box::new(factory));
    }

    /// Build an instance; a fresh one per call
    pub fn resolve(&self, id: &str) -> Result<Arc<dyn Controller>> {
        let factory = self.factories.get(id).ok_or_else(|| {
            Error::configuration(format!("Controller \"{}\" is not registered", id))
        })?;
        Ok(factory())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Plain;

    #[async_trait]
    impl Controller for Plain {}

    #[test]
    fn unknown_controller_is_a_configuration_error() {
        let registry = ControllerRegistry::new();
        assert!(matches!(
            registry.resolve("missing"),
            Err(Error::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn defaults_reject_unbound_invocations() {
        let registry = ControllerRegistry::new();
        registry.register("plain", || Arc::new(Plain));
        let controller = registry.resolve("plain").unwrap();

        let mut res = Response::ok();
        let req = Request::new("GET", "/");
        assert!(controller.invoke(&mut res, &req).await.is_err());
        assert!(controller.call("show", &mut res, &req).await.is_err());
    }
}
