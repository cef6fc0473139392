//! Resolution options and configuration handling.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use tugapi_core::ApiError;

/// When the resolver may ask the [`ExternalLoader`](crate::ExternalLoader)
/// for a package that is not in the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExternalPolicy {
    /// Never load missing packages.
    Never,
    /// Load any missing package.
    Always,
    /// Only load the private sibling of the package being resolved
    /// (`_name` for a package `name`).
    #[default]
    Auto,
}

impl ExternalPolicy {
    /// Whether `package` may be loaded while resolving aliases of `own_package`.
    pub fn allows(self, package: &str, own_package: &str) -> bool {
        match self {
            ExternalPolicy::Never => false,
            ExternalPolicy::Always => true,
            ExternalPolicy::Auto => package.strip_prefix('_') == Some(own_package),
        }
    }
}

/// Options of one resolution run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ResolveOptions {
    /// Resolve every alias, not only the ones listed in an export list.
    #[serde(default)]
    pub implicit: bool,

    /// External loading policy.
    #[serde(default)]
    pub external: ExternalPolicy,

    /// Upper bound on resolution passes. `None` runs to a fixed point.
    #[serde(default)]
    pub max_iterations: Option<usize>,
}

impl ResolveOptions {
    pub fn implicit(mut self, implicit: bool) -> Self {
        self.implicit = implicit;
        self
    }

    pub fn external(mut self, external: ExternalPolicy) -> Self {
        self.external = external;
        self
    }

    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }
}

/// tugapi configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Alias resolution settings
    #[serde(default)]
    pub resolve: ResolveOptions,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ApiError> {
        let content = fs::read_to_string(path)
            .map_err(|e| ApiError::Config(format!("failed to read config file: {}", e)))?;
        toml::from_str(&content)
            .map_err(|e| ApiError::Config(format!("failed to parse config file: {}", e)))
    }

    /// Load configuration from .tugapi/config.toml in the given project root
    pub fn load_from_project(project_root: &Path) -> Result<Self, ApiError> {
        let config_path = project_root.join(".tugapi").join("config.toml");
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Config::default())
        }
    }
}
