//! Configuration for the `taskmaster` client.
//!
//! Layered, highest priority first:
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attributes)
//! 3. TOML config file (`~/.config/taskmaster/config.toml`)
//! 4. Compiled defaults
//!
//! A missing default config file is not an error. An explicit `--config`
//! path that doesn't exist is.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::remote::RemoteError;
use crate::remote::http::HttpTaskService;
use crate::sync::controller::{DEFAULT_REQUEST_TIMEOUT, DeletePolicy, SyncOptions};

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),

    /// The configured API endpoint cannot be used.
    #[error("invalid API settings: {0}")]
    Api(#[from] RemoteError),
}

// TOML file structs; every field is optional so a file can override a subset.

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    api: ApiFileConfig,
    sync: SyncFileConfig,
    logging: LoggingFileConfig,
}

/// `[api]` section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ApiFileConfig {
    base_url: Option<String>,
    token: Option<String>,
    request_timeout_secs: Option<u64>,
}

/// `[sync]` section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct SyncFileConfig {
    delete_failure: Option<DeletePolicy>,
}

/// `[logging]` section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct LoggingFileConfig {
    level: Option<String>,
    file: Option<PathBuf>,
}

/// Fully resolved client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Root URL of the TaskMaster API.
    pub base_url: String,
    /// Bearer credential attached to every request.
    pub token: Option<String>,
    /// Bound on each request.
    pub request_timeout: Duration,
    /// Reaction to a failed delete.
    pub delete_policy: DeletePolicy,
    /// `tracing` filter directive.
    pub log_level: String,
    /// Log destination; `None` means `$TMPDIR/taskmaster.log`.
    pub log_file: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            token: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            delete_policy: DeletePolicy::KeepRemoved,
            log_level: "info".to_string(),
            log_file: None,
        }
    }
}

impl ClientConfig {
    /// Loads configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if an explicit config file cannot be read, or
    /// if any config file cannot be parsed.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    /// CLI > file > default. Split out of `load()` for testing.
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            base_url: cli
                .api_url
                .clone()
                .or_else(|| file.api.base_url.clone())
                .unwrap_or(defaults.base_url),
            token: cli.token.clone().or_else(|| file.api.token.clone()),
            // 0 selects the default.
            request_timeout: cli
                .timeout
                .or(file.api.request_timeout_secs)
                .filter(|&secs| secs > 0)
                .map_or(defaults.request_timeout, Duration::from_secs),
            delete_policy: file.sync.delete_failure.unwrap_or(defaults.delete_policy),
            log_level: cli
                .log_level
                .clone()
                .or_else(|| file.logging.level.clone())
                .unwrap_or(defaults.log_level),
            log_file: cli.log_file.clone().or_else(|| file.logging.file.clone()),
        }
    }

    /// Controller options derived from this configuration.
    #[must_use]
    pub const fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            request_timeout: self.request_timeout,
            delete_policy: self.delete_policy,
        }
    }

    /// HTTP service for the configured endpoint and credential.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Api`] if the base URL is unusable.
    pub fn http_service(&self) -> Result<HttpTaskService, ConfigError> {
        Ok(HttpTaskService::new(
            &self.base_url,
            self.token.clone(),
            self.request_timeout,
        )?)
    }
}

/// Global CLI options, flattened into the binary's parser.
#[derive(clap::Args, Debug, Default)]
pub struct CliArgs {
    /// Root URL of the TaskMaster API.
    #[arg(long, env = "TASKMASTER_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Bearer token.
    #[arg(long, env = "TASKMASTER_TOKEN", hide_env_values = true, global = true)]
    pub token: Option<String>,

    /// Path to config file (default: `~/.config/taskmaster/config.toml`).
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Request timeout in seconds (0 means the default).
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, env = "TASKMASTER_LOG", global = true)]
    pub log_level: Option<String>,

    /// Path to log file (default: `$TMPDIR/taskmaster.log`).
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

/// Reads the TOML file at `explicit_path`, or the default path.
///
/// An explicit path must exist. A missing default file, or no config
/// directory at all, yields an empty config.
fn load_config_file(explicit_path: Option<&Path>) -> Result<ConfigFile, ConfigError> {
    let path = if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    } else {
        let Some(config_dir) = dirs::config_dir() else {
            return Ok(ConfigFile::default());
        };
        config_dir.join("taskmaster").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
