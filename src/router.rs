//! Radix-tree route table.
//!
//! One tree per method. O(path-length) lookup. The table is filled once
//! during [`Builder::build`](crate::Builder::build), where a rejected path
//! becomes a [`ConfigError`], and is read-only from then on.

use std::collections::HashMap;
use std::sync::Arc;

use matchit::{InsertError, Router as MatchitRouter};
use percent_encoding::percent_decode_str;

use crate::error::ConfigError;
use crate::method::Method;
use crate::route::Route;

/// Outcome of matching a request line against the table.
pub(crate) enum Lookup {
    /// Path parameters are percent-decoded.
    Found(Arc<Route>, HashMap<String, String>),
    /// The path exists, but only under these methods.
    MethodNotAllowed(Vec<Method>),
    /// The named parameter does not decode to UTF-8.
    BadParam(String),
    NotFound,
}

#[derive(Default)]
pub(crate) struct RouteTable {
    trees: HashMap<Method, MatchitRouter<Arc<Route>>>,
}

impl RouteTable {
    pub(crate) fn insert(&mut self, route: Arc<Route>) -> Result<(), ConfigError> {
        let label = route.to_string();
        let path = route.path().to_owned();
        self.trees
            .entry(route.method())
            .or_default()
            .insert(path, route)
            .map_err(|e| match e {
                InsertError::Conflict { .. } => ConfigError::DuplicateRoute { route: label },
                other => ConfigError::InvalidRoute { route: label, reason: other.to_string() },
            })
    }

    pub(crate) fn lookup(&self, method: Method, path: &str) -> Lookup {
        let Some(matched) = self.trees.get(&method).and_then(|tree| tree.at(path).ok()) else {
            return self.unmatched(path);
        };

        let mut params = HashMap::new();
        for (name, raw) in matched.params.iter() {
            match percent_decode_str(raw).decode_utf8() {
                Ok(value) => {
                    params.insert(name.to_owned(), value.into_owned());
                }
                Err(_) => return Lookup::BadParam(name.to_owned()),
            }
        }
        Lookup::Found(Arc::clone(matched.value), params)
    }

    /// `MethodNotAllowed` if any other method serves `path`.
    pub(crate) fn unmatched(&self, path: &str) -> Lookup {
        let mut allowed: Vec<Method> = self
            .trees
            .iter()
            .filter(|(_, tree)| tree.at(path).is_ok())
            .map(|(method, _)| *method)
            .collect();

        if allowed.is_empty() {
            return Lookup::NotFound;
        }
        allowed.sort_by_key(|m| m.as_str());
        Lookup::MethodNotAllowed(allowed)
    }
}
