//! Compiled matcher over the external routing engine.
//!
//! Path matching is delegated to `matchit`; this layer adds method
//! resolution on top so a dispatch yields one of three outcomes:
//! found, not found, or method not allowed with the allowed set.

use crate::error::{Error, Result};
use crate::routing::FlatRoute;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Outcome of resolving `(method, path)` against the compiled table
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    Found {
        route: usize,
        params: IndexMap<String, String>,
    },
    NotFound,
    MethodNotAllowed {
        allowed: Vec<String>,
    },
}

/// Matcher compiled from the flattened route list
pub struct RouteMatcher {
    engine: matchit::Router<Vec<(String, usize)>>,
}

impl RouteMatcher {
    /// Compile `(methods, pattern)` pairs into the engine. Routes sharing a
    /// pattern merge into one engine entry; an invalid or conflicting
    /// pattern is a configuration error.
    pub fn compile<'a, I>(routes: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a [String], &'a str)>,
    {
        let mut by_pattern: IndexMap<String, Vec<(String, usize)>> = IndexMap::new();
        for (index, (methods, pattern)) in routes.into_iter().enumerate() {
            let slot = by_pattern.entry(pattern.to_string()).or_default();
            for method in methods {
                slot.push((method.clone(), index));
            }
        }

        let mut engine = matchit::Router::new();
        for (pattern, methods) in by_pattern {
            engine.insert(pattern.clone(), methods).map_err(|err| {
                Error::configuration(format!("Invalid route pattern \"{}\": {}", pattern, err))
            })?;
        }
        Ok(Self { engine })
    }

    /// Resolve a method and path against the compiled table
    pub fn dispatch(&self, method: &str, path: &str) -> MatchOutcome {
        let matched = match self.engine.at(path) {
            Ok(matched) => matched,
            Err(_) => return MatchOutcome::NotFound,
        };

        let params: IndexMap<String, String> = matched
            .params
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();

        for (candidate, route) in matched.value {
            if candidate == method {
                return MatchOutcome::Found {
                    route: *route,
                    params,
                };
            }
        }

        let mut allowed: Vec<String> = Vec::new();
        for (candidate, _) in matched.value {
            if !allowed.contains(candidate) {
                allowed.push(candidate.clone());
            }
        }
        MatchOutcome::MethodNotAllowed { allowed }
    }
}

/// Serialized form of the expanded route list, persisted so the matcher can
/// be rebuilt without re-walking the registration tree. Targets and
/// middleware are index-addressed from the live table and never persisted.
#[derive(Debug, Serialize, Deserialize)]
pub struct CachedRoutes {
    pub routes: Vec<CachedRoute>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CachedRoute {
    pub methods: Vec<String>,
    pub pattern: String,
}

impl CachedRoutes {
    pub fn from_flat(routes: &[FlatRoute]) -> Self {
        Self {
            routes: routes
                .iter()
                .map(|r| CachedRoute {
                    methods: r.methods.clone(),
                    pattern: r.pattern.clone(),
                })
                .collect(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn store(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string(self)?)?;
        Ok(())
    }

    /// A cache is only usable when it describes the same expanded table
    pub fn matches(&self, routes: &[FlatRoute]) -> bool {
        self.routes.len() == routes.len()
            && self
                .routes
                .iter()
                .zip(routes)
                .all(|(c, r)| c.pattern == r.pattern && c.methods == r.methods)
    }

    pub fn compile(&self) -> Result<RouteMatcher> {
        RouteMatcher::compile(
            self.routes
                .iter()
                .map(|r| (r.methods.as_slice(), r.pattern.as_str())),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(routes: &[(&[&str], &str)]) -> RouteMatcher {
        let owned: Vec<(Vec<String>, String)> = routes
            .iter()
            .map(|(m, p)| (m.iter().map(|s| s.to_string()).collect(), p.to_string()))
            .collect();
        RouteMatcher::compile(
            owned
                .iter()
                .map(|(m, p)| (m.as_slice(), p.as_str())),
        )
        .unwrap()
    }

    #[test]
    fn found_with_params() {
        let m = matcher(&[(&["GET"], "/users/{id}")]);
        match m.dispatch("GET", "/users/42") {
            MatchOutcome::Found { route, params } => {
                assert_eq!(route, 0);
                assert_eq!(params.get("id").map(String::as_str), Some("42"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn unknown_path_is_not_found() {
        let m = matcher(&[(&["GET"], "/users")]);
        assert_eq!(m.dispatch("GET", "/posts"), MatchOutcome::NotFound);
    }

    #[test]
    fn wrong_method_reports_allowed_set() {
        let m = matcher(&[(&["GET", "POST"], "/users")]);
        match m.dispatch("DELETE", "/users") {
            MatchOutcome::MethodNotAllowed { allowed } => {
                assert_eq!(allowed, ["GET", "POST"]);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn shared_pattern_resolves_per_method() {
        let m = matcher(&[(&["GET"], "/users"), (&["POST"], "/users")]);
        assert!(matches!(
            m.dispatch("POST", "/users"),
            MatchOutcome::Found { route: 1, .. }
        ));
    }
}
