//! Handler configuration.
//!
//! Loaded from TOML when the `config` feature is enabled; every section and
//! field has a default so a missing or partial file still yields a working
//! handler.

use crate::dispatcher::Dispatcher;
use crate::emitter::Emitter;
use crate::error::bridge::{ErrorBridge, ProcessErrorState};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HandlerConfig {
    #[serde(default)]
    pub router: RouterConfig,

    #[serde(default)]
    pub emitter: EmitterConfig,

    #[serde(default)]
    pub errors: ErrorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RouterConfig {
    #[serde(default)]
    pub cache_file: Option<String>,

    #[serde(default)]
    pub enable_cache: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EmitterConfig {
    /// Seconds; zero means responses default to "do not cache"
    #[serde(default)]
    pub default_cache_ttl: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorConfig {
    #[serde(default = "default_true")]
    pub display_errors: bool,

    #[serde(default = "default_true")]
    pub nice_error: bool,

    #[serde(default = "default_true")]
    pub log_errors: bool,

    #[serde(default)]
    pub log_file: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Default for ErrorConfig {
    fn default() -> Self {
        Self {
            display_errors: true,
            nice_error: true,
            log_errors: true,
            log_file: None,
        }
    }
}

impl HandlerConfig {
    /// Load configuration from a TOML file
    #[cfg(feature = "config")]
    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::error::Error::configuration(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: HandlerConfig = toml::from_str(&content).map_err(|e| {
            crate::error::Error::configuration(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        log::debug!("Loaded handler configuration from {}", path.display());
        Ok(config)
    }

    /// Apply the router section to a dispatcher
    pub fn apply_router(&self, dispatcher: &mut Dispatcher) -> Result<()> {
        if let Some(cache_file) = &self.router.cache_file {
            dispatcher.set_router_cache_file(cache_file, self.router.enable_cache)?;
        }
        Ok(())
    }

    /// Apply the emitter section
    pub fn apply_emitter(&self, emitter: &mut Emitter) {
        emitter.set_default_cache_ttl(self.emitter.default_cache_ttl);
    }

    /// Build the runtime-error trap configured by the errors section
    pub fn error_handler(&self, emitter: &Emitter, state: Arc<ProcessErrorState>) -> ErrorBridge {
        emitter.error_handler(
            self.errors.display_errors,
            self.errors.nice_error,
            self.errors.log_errors,
            self.errors.log_file.clone().map(PathBuf::from),
            state,
        )
    }
}
