//! Path/query accessor scoped to one matched route.

use indexmap::IndexMap;
use std::collections::HashMap;
use std::str::FromStr;

/// Matched path parameters plus the request's query variables, in match
/// order. Built per dispatch on a found route and handed to the
/// observation hook.
#[derive(Debug, Clone, Default)]
pub struct RouteUrl {
    path: String,
    params: IndexMap<String, String>,
    query: HashMap<String, String>,
}

impl RouteUrl {
    pub fn new(
        path: impl Into<String>,
        params: IndexMap<String, String>,
        query: HashMap<String, String>,
    ) -> Self {
        Self {
            path: path.into(),
            params,
            query,
        }
    }

    /// The dispatched path
    pub fn path(&self) -> &str {
        &self.path
    }

    /// A matched path parameter by placeholder name
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// A matched path parameter parsed into a concrete type
    pub fn param_as<T: FromStr>(&self, name: &str) -> Option<T> {
        self.param(name).and_then(|v| v.parse().ok())
    }

    /// All matched parameters, in match order
    pub fn vars(&self) -> &IndexMap<String, String> {
        &self.params
    }

    /// A query-string variable by name
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// Matched parameter values filtered to those whose name is in `names`,
    /// preserving match order
    pub fn filter_parts(&self, names: &[&str]) -> Vec<&str> {
        self.params
            .iter()
            .filter(|(name, _)| names.contains(&name.as_str()))
            .map(|(_, value)| value.as_str())
            .collect()
    }
}
