//! Application configuration: TOML file plus `SOPFORGE_*` environment
//! overrides, validated at load time.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "sopforge.toml";

#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub artifacts: ArtifactsConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ServerConfig {
    pub bind_address: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ArtifactsConfig {
    pub dir: PathBuf,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub bind_address: Option<String>,
    pub artifacts_dir: Option<PathBuf>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    database: RawDatabase,
    #[serde(default)]
    server: RawServer,
    #[serde(default)]
    artifacts: RawArtifacts,
    #[serde(default)]
    logging: RawLogging,
}

#[derive(Debug, Default, Deserialize)]
struct RawDatabase {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawServer {
    bind_address: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawArtifacts {
    dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct RawLogging {
    level: Option<String>,
    format: Option<LogFormat>,
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let path = options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        let raw = read_raw_config(&path, options.require_file)?;
        let env_overrides = env_overrides()?;
        let config = Self::from_raw(raw, env_overrides, options.overrides);
        config.validate()?;
        Ok(config)
    }

    fn from_raw(raw: RawConfig, env: ConfigOverrides, explicit: ConfigOverrides) -> Self {
        // Precedence: explicit overrides > environment > file > defaults.
        let database_url = explicit
            .database_url
            .or(env.database_url)
            .or(raw.database.url)
            .unwrap_or_else(|| "sqlite://sopforge.db".to_string());
        let bind_address = explicit
            .bind_address
            .or(env.bind_address)
            .or(raw.server.bind_address)
            .unwrap_or_else(|| "127.0.0.1:8080".to_string());
        let artifacts_dir = explicit
            .artifacts_dir
            .or(env.artifacts_dir)
            .or(raw.artifacts.dir)
            .unwrap_or_else(|| PathBuf::from("_artifacts"));
        let log_level = explicit
            .log_level
            .or(env.log_level)
            .or(raw.logging.level)
            .unwrap_or_else(|| "info".to_string());
        let log_format = explicit
            .log_format
            .or(env.log_format)
            .or(raw.logging.format)
            .unwrap_or(LogFormat::Compact);

        Self {
            database: DatabaseConfig {
                url: database_url,
                max_connections: raw.database.max_connections.unwrap_or(5),
                timeout_secs: raw.database.timeout_secs.unwrap_or(30),
            },
            server: ServerConfig { bind_address },
            artifacts: ArtifactsConfig { dir: artifacts_dir },
            logging: LoggingConfig { level: log_level, format: log_format },
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::Validation("database.url must not be empty".to_string()));
        }
        if self.server.bind_address.trim().is_empty() {
            return Err(ConfigError::Validation(
                "server.bind_address must not be empty".to_string(),
            ));
        }
        if self.artifacts.dir.as_os_str().is_empty() {
            return Err(ConfigError::Validation("artifacts.dir must not be empty".to_string()));
        }
        Ok(())
    }
}

fn read_raw_config(path: &Path, require_file: bool) -> Result<RawConfig, ConfigError> {
    if !path.exists() {
        if require_file {
            return Err(ConfigError::MissingConfigFile(path.to_path_buf()));
        }
        return Ok(RawConfig::default());
    }
    let contents = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
    toml::from_str(&contents)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn env_overrides() -> Result<ConfigOverrides, ConfigError> {
    let mut overrides = ConfigOverrides::default();
    if let Ok(url) = env::var("SOPFORGE_DATABASE_URL") {
        overrides.database_url = Some(url);
    }
    if let Ok(address) = env::var("SOPFORGE_BIND_ADDRESS") {
        overrides.bind_address = Some(address);
    }
    if let Ok(dir) = env::var("SOPFORGE_ARTIFACTS_DIR") {
        overrides.artifacts_dir = Some(PathBuf::from(dir));
    }
    if let Ok(level) = env::var("SOPFORGE_LOG_LEVEL") {
        overrides.log_level = Some(level);
    }
    if let Ok(format) = env::var("SOPFORGE_LOG_FORMAT") {
        overrides.log_format = Some(match format.as_str() {
            "compact" => LogFormat::Compact,
            "pretty" => LogFormat::Pretty,
            "json" => LogFormat::Json,
            other => {
                return Err(ConfigError::InvalidEnvOverride {
                    key: "SOPFORGE_LOG_FORMAT".to_string(),
                    value: other.to_string(),
                });
            }
        });
    }
    Ok(overrides)
}
