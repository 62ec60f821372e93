//! Configuration management using Figment
//!
//! Configuration is loaded from multiple sources with the following precedence (highest to lowest):
//! 1. Environment variables (prefix: `DEVCAMP_`, nested keys separated by `__`,
//!    e.g. `DEVCAMP_SERVICE__ENVIRONMENT=production`)
//! 2. Current working directory: ./config.toml
//! 3. XDG config directory: ~/.config/devcamp/{service_name}/config.toml
//! 4. System directory: /etc/devcamp/{service_name}/config.toml
//! 5. Default values
//!
//! The environment mode is resolved here exactly once and has no default when
//! loading: it must come from a file or `DEVCAMP_SERVICE__ENVIRONMENT`. A
//! missing mode, or anything other than `development` or `production`, fails
//! the load, so a misconfigured process never gets as far as serving a request.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::query::{FeatureDefaults, DEFAULT_FIELDS, DEFAULT_LIMIT, DEFAULT_PAGE, DEFAULT_SORT_BY};

/// Prefix for environment variable overrides
pub const ENV_PREFIX: &str = "DEVCAMP_";

/// Directory name used under XDG and /etc
const CONFIG_DIR_NAME: &str = "devcamp";

/// Response disclosure policy, selected once per process
///
/// `Development` renders every failure verbosely (message, error object and
/// stack). `Production` only discloses domain errors and answers everything
/// else with a fixed generic envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Environment {
    /// Verbose mode
    #[default]
    Development,
    /// Guarded mode
    Production,
}

impl Environment {
    /// Canonical lowercase name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }

    /// Whether failures are rendered with full detail
    #[must_use]
    pub const fn is_verbose(&self) -> bool {
        matches!(self, Self::Development)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "development" => Ok(Self::Development),
            "production" => Ok(Self::Production),
            other => Err(Error::InvalidEnvironment(other.to_string())),
        }
    }
}

impl Serialize for Environment {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Environment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Service configuration
    pub service: ServiceConfig,

    /// Route configuration
    #[serde(default)]
    pub api: ApiConfig,

    /// Defaults for list endpoints
    #[serde(default)]
    pub query: QueryConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service name
    pub name: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level or `EnvFilter` directive (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Response disclosure policy (development, production)
    ///
    /// Never serialized, so the defaults layer can't supply it.
    #[serde(skip_serializing)]
    pub environment: Environment,
}

impl ServiceConfig {
    /// Request timeout as a duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Route configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Prefix for every resource route
    #[serde(default = "default_base_path")]
    pub base_path: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_path: default_base_path(),
        }
    }
}

/// Defaults applied by the query feature engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Sort expression used when the request has no usable `sort`
    #[serde(default = "default_sort")]
    pub default_sort: String,

    /// Projection used when the request has no usable `fields`
    #[serde(default = "default_fields")]
    pub default_fields: String,

    /// Page size used when the request has no usable `limit`
    #[serde(default = "default_limit")]
    pub default_limit: u64,

    /// Optional cap on `limit`. Unset means requests may ask for any page size.
    #[serde(default)]
    pub max_limit: Option<u64>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_sort: default_sort(),
            default_fields: default_fields(),
            default_limit: default_limit(),
            max_limit: None,
        }
    }
}

impl From<&QueryConfig> for FeatureDefaults {
    fn from(config: &QueryConfig) -> Self {
        FeatureDefaults {
            sort_by: config.default_sort.clone(),
            fields: config.default_fields.clone(),
            limit: config.default_limit,
            page: DEFAULT_PAGE,
            max_limit: config.max_limit,
        }
    }
}

// Default value functions
fn default_port() -> u16 {
    5000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_base_path() -> String {
    "/api/v1".to_string()
}

fn default_sort() -> String {
    DEFAULT_SORT_BY.to_string()
}

fn default_fields() -> String {
    DEFAULT_FIELDS.to_string()
}

fn default_limit() -> u64 {
    DEFAULT_LIMIT
}

impl Config {
    /// Load configuration from all sources
    ///
    /// Searches for config files in this order (first found wins):
    /// 1. Current working directory: ./config.toml
    /// 2. XDG config directory: ~/.config/devcamp/{service_name}/config.toml
    /// 3. System directory: /etc/devcamp/{service_name}/config.toml
    ///
    /// Environment variables (`DEVCAMP_` prefix) override all file-based configs.
    pub fn load() -> Result<Self> {
        let service_name = std::env::current_exe()
            .ok()
            .and_then(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "devcamp-api".to_string());

        Self::load_for_service(&service_name)
    }

    /// Load configuration for a specific service name
    pub fn load_for_service(service_name: &str) -> Result<Self> {
        let config_paths = Self::find_config_paths(service_name);

        tracing::debug!("Searching for config files in order:");
        for path in &config_paths {
            tracing::debug!("  - {}", path.display());
        }

        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        // lowest priority first so higher priority files override
        for path in config_paths.iter().rev() {
            if path.exists() {
                tracing::info!("Loading configuration from: {}", path.display());
                figment = figment.merge(Toml::file(path));
            }
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        Self::extract(&figment)
    }

    /// Load configuration from a specific file
    ///
    /// Bypasses the XDG and system directories. Environment variables still
    /// take precedence over the file.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        Self::extract(&figment)
    }

    fn extract(figment: &Figment) -> Result<Self> {
        if figment.find_value("service.environment").is_err() {
            return Err(Error::MissingEnvironment);
        }
        Ok(figment.extract()?)
    }

    /// Find all possible config file paths for a service, highest priority first
    fn find_config_paths(service_name: &str) -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        let xdg_dirs = xdg::BaseDirectories::with_prefix(CONFIG_DIR_NAME);
        let config_file_path = Path::new(service_name).join("config.toml");
        if let Some(path) = xdg_dirs.find_config_file(&config_file_path) {
            paths.push(path);
        }

        paths.push(
            PathBuf::from("/etc")
                .join(CONFIG_DIR_NAME)
                .join(service_name)
                .join("config.toml"),
        );

        paths
    }

    /// Defaults handed to the query feature engine on list endpoints
    pub fn feature_defaults(&self) -> FeatureDefaults {
        FeatureDefaults::from(&self.query)
    }
}

/// Programmatic defaults
///
/// Uses `Environment::Development`. Loading from files and the environment
/// never falls back to this mode.
impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig {
                name: "devcamp-api".to_string(),
                port: default_port(),
                log_level: default_log_level(),
                timeout_secs: default_timeout(),
                environment: Environment::default(),
            },
            api: ApiConfig::default(),
            query: QueryConfig::default(),
        }
    }
}
