//! View/template collaborator contract.
//!
//! The core only needs templates for fallback status pages, so the engine is
//! consumed through a narrow trait: existence check, render with JSON
//! variables, and a status binding used to pre-select a template for
//! status-conditional pages (404, 500).

use crate::error::Result;
use serde_json::Value;

pub trait ViewEngine: Send + Sync {
    fn exists(&self, name: &str) -> bool;

    fn render(&self, name: &str, vars: &Value) -> Result<String>;

    /// Pre-select the template variant for the given status code.
    /// Engines without status-conditional templates can ignore this.
    fn bind_status(&self, _status: u16) {}
}

/// Engine with no templates; every fallback page renders empty
#[derive(Debug, Default)]
pub struct NullView;

impl ViewEngine for NullView {
    fn exists(&self, _name: &str) -> bool {
        false
    }

    fn render(&self, name: &str, _vars: &Value) -> Result<String> {
        Err(crate::error::Error::view(format!(
            "View \"{}\" does not exist",
            name
        )))
    }
}
