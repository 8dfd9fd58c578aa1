//! Route lookup.
//!
//! # Responsibilities
//! - Store configured routes keyed by `(path, METHOD)`
//! - Look up the route for a request, or report none
//!
//! # Design Decisions
//! - Immutable after construction; a reload builds a new table
//! - Path matching is exact and case-sensitive
//! - Method matching is case-insensitive (tokens are uppercased on insert and lookup)

use std::collections::HashMap;

use crate::config::Api;

/// Anything that can resolve a route definition for a request.
pub trait RouteSource: Send + Sync {
    fn find(&self, path: &str, method: &str) -> Option<&Api>;
}

/// Routes compiled from configuration.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: HashMap<(String, String), Api>,
}

impl RouteTable {
    /// Build the table. A later duplicate replaces an earlier one; config
    /// validation rejects duplicates before this point.
    pub fn from_config(apis: &[Api]) -> Self {
        let routes = apis
            .iter()
            .map(|api| ((api.path.clone(), api.method.to_uppercase()), api.clone()))
            .collect();
        Self { routes }
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Api> {
        self.routes.values()
    }
}

impl RouteSource for RouteTable {
    fn find(&self, path: &str, method: &str) -> Option<&Api> {
        self.routes
            .get(&(path.to_string(), method.to_uppercase()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(path: &str, method: &str, description: &str) -> Api {
        Api {
            path: path.to_string(),
            method: method.to_string(),
            description: description.to_string(),
            keys: Vec::new(),
            proxy: None,
        }
    }

    #[test]
    fn test_lookup_by_path_and_method() {
        let table = RouteTable::from_config(&[
            api("/orders", "get", "list"),
            api("/orders", "POST", "create"),
        ]);
        assert_eq!(table.len(), 2);

        assert_eq!(table.find("/orders", "GET").unwrap().description, "list");
        assert_eq!(table.find("/orders", "post").unwrap().description, "create");
        assert!(table.find("/orders", "DELETE").is_none());
    }

    #[test]
    fn test_path_is_exact_and_case_sensitive() {
        let table = RouteTable::from_config(&[api("/orders", "GET", "")]);
        assert!(table.find("/Orders", "GET").is_none());
        assert!(table.find("/orders/1", "GET").is_none());
        assert!(table.find("/orders/", "GET").is_none());
    }

    #[test]
    fn test_empty_table() {
        let table = RouteTable::default();
        assert!(table.is_empty());
        assert!(table.find("/", "GET").is_none());
    }
}
