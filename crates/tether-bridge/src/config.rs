//! Bridge configuration
//!
//! Loaded from TOML; every field is optional and unknown keys are rejected.
//!
//! ```toml
//! enumerate_named = true
//! enumerate_indexed = false
//! name_method_functions = true
//! ```

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    /// Answer named enumeration on proxies
    pub enumerate_named: bool,
    /// Answer indexed enumeration on proxies
    pub enumerate_indexed: bool,
    /// Give method functions the name of the method they call
    pub name_method_functions: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            enumerate_named: true,
            enumerate_indexed: true,
            name_method_functions: true,
        }
    }
}

impl BridgeConfig {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).context("invalid bridge configuration")
    }

    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = fs::read_to_string(path)
            .with_context(|| format!("failed to read bridge configuration {}", path.display()))?;
        Self::from_toml_str(&source).with_context(|| format!("in {}", path.display()))
    }
}
