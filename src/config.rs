//! Configuration file.
//!
//! The strategy choices and engine options can live in a TOML file instead
//! of code. Every field has a default, so an empty file is a valid config:
//!
//! ```toml
//! filter = "coerce"
//! validate = "schema"
//!
//! [engine]
//! name = "hyper"
//! prefix = "/api"
//! bind = "0.0.0.0:3000"
//! ```
//!
//! Names are resolved by [`Builder::build`](crate::Builder::build) against
//! the registry, so a typo fails the build, not the first request.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Root configuration.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Registered filter strategy name.
    pub filter: String,

    /// Registered validate strategy name.
    pub validate: String,

    pub engine: EngineConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            filter: "coerce".to_owned(),
            validate: "schema".to_owned(),
            engine: EngineConfig::default(),
        }
    }
}

impl Config {
    pub fn from_toml(source: &str) -> Result<Self, Error> {
        Ok(toml::from_str(source)?)
    }

    pub fn load(path: &Path) -> Result<Self, Error> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}

/// `[engine]` section.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Registered transport name.
    pub name: String,

    pub prefix: String,

    pub bind: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let options = EngineOptions::default();
        Self { name: "hyper".to_owned(), prefix: options.prefix, bind: options.bind }
    }
}

impl EngineConfig {
    pub fn options(&self) -> EngineOptions {
        EngineOptions { prefix: self.prefix.clone(), bind: self.bind.clone() }
    }
}

/// Options handed to the selected engine.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineOptions {
    /// Prepended to every route path (`"/api"` + `"/messages"`).
    pub prefix: String,

    /// Listen address for socket transports.
    pub bind: String,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self { prefix: String::new(), bind: "0.0.0.0:3000".to_owned() }
    }
}

impl EngineOptions {
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn bind(mut self, addr: impl Into<String>) -> Self {
        self.bind = addr.into();
        self
    }
}
