//! # Configuration
//!
//! Resolves where the hosted backend lives and how the client logs. Values
//! come from defaults, then an optional file, then environment variables.

mod backend;

pub use backend::{
    BackendConfig, DEFAULT_COMMENTS_TABLE, DEFAULT_MESSAGES_TABLE, DEFAULT_REQUEST_TIMEOUT_SECS,
    DEFAULT_SCHEMA,
};

use serde::{Deserialize, Serialize};
use std::{env, fs, path::PathBuf, str::FromStr};
use thiserror::Error;

pub const ENV_BACKEND_URL: &str = "CARROT_BACKEND_URL";
pub const ENV_API_KEY: &str = "CARROT_API_KEY";
pub const ENV_LOG_LEVEL: &str = "CARROT_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "CARROT_LOG_FORMAT";
const ENV_BACKEND_URL_FALLBACK: &str = "SUPABASE_URL";
const ENV_API_KEY_FALLBACK: &str = "SUPABASE_ANON_KEY";

/// Why a configuration could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration file {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("unsupported configuration format for {0}; use toml, yaml, or json")]
    UnsupportedFormat(PathBuf),
    #[error("missing required setting `{0}`")]
    Missing(&'static str),
    #[error("invalid backend URL {0}")]
    InvalidUrl(String),
    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(ConfigError::InvalidValue {
                name: ENV_LOG_FORMAT,
                value: value.to_string(),
            }),
        }
    }
}

/// Log level and format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// Fully resolved client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub backend: BackendConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PartialConfig {
    backend: PartialBackend,
    logging: PartialLogging,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PartialBackend {
    url: Option<String>,
    api_key: Option<String>,
    messages_table: Option<String>,
    comments_table: Option<String>,
    schema: Option<String>,
    request_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PartialLogging {
    level: Option<String>,
    format: Option<LogFormat>,
}

impl Config {
    /// Loads the configuration from a file, environment variables, or defaults.
    ///
    /// # Arguments
    /// * `config_path` - Optional path to a `.toml`, `.yaml`/`.yml`, or `.json` file.
    ///
    /// # Errors
    /// Fails when the file cannot be read or parsed, when the backend URL or API
    /// key is absent after every layer, or when a value is malformed.
    pub fn load_config(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut partial = match config_path {
            Some(path) => read_file(path)?,
            None => PartialConfig::default(),
        };

        if let Some(url) = env_value(ENV_BACKEND_URL, Some(ENV_BACKEND_URL_FALLBACK)) {
            partial.backend.url = Some(url);
        }
        if let Some(key) = env_value(ENV_API_KEY, Some(ENV_API_KEY_FALLBACK)) {
            partial.backend.api_key = Some(key);
        }
        if let Some(level) = env_value(ENV_LOG_LEVEL, None) {
            partial.logging.level = Some(level);
        }
        if let Some(format) = env_value(ENV_LOG_FORMAT, None) {
            partial.logging.format = Some(format.parse()?);
        }

        let url = partial.backend.url.ok_or(ConfigError::Missing("backend.url"))?;
        let api_key = partial
            .backend
            .api_key
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::Missing("backend.api_key"))?;

        let mut backend = BackendConfig::new(&url, api_key)?;
        if let Some(table) = partial.backend.messages_table {
            backend.messages_table = table;
        }
        if let Some(table) = partial.backend.comments_table {
            backend.comments_table = table;
        }
        if let Some(schema) = partial.backend.schema {
            backend.schema = schema;
        }
        if let Some(timeout) = partial.backend.request_timeout_secs {
            if timeout == 0 {
                return Err(ConfigError::InvalidValue {
                    name: "backend.request_timeout_secs",
                    value: timeout.to_string(),
                });
            }
            backend.request_timeout_secs = timeout;
        }

        let defaults = LoggingConfig::default();
        let logging = LoggingConfig {
            level: partial.logging.level.unwrap_or(defaults.level),
            format: partial.logging.format.unwrap_or(defaults.format),
        };

        Ok(Self { backend, logging })
    }
}

fn read_file(path: PathBuf) -> Result<PartialConfig, ConfigError> {
    let content = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    let parsed = match extension.as_deref() {
        Some("toml") => toml::from_str(&content).map_err(|err| err.to_string()),
        Some("yaml" | "yml") => serde_yml::from_str(&content).map_err(|err| err.to_string()),
        Some("json") => serde_json::from_str(&content).map_err(|err| err.to_string()),
        _ => return Err(ConfigError::UnsupportedFormat(path)),
    };

    parsed.map_err(|message| ConfigError::Parse { path, message })
}

fn env_value(primary: &str, fallback: Option<&str>) -> Option<String> {
    let read = |name: &str| env::var(name).ok().filter(|value| !value.trim().is_empty());
    read(primary).or_else(|| fallback.and_then(read))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    fn cleanup_env_vars() {
        unsafe {
            for name in [
                ENV_BACKEND_URL,
                ENV_API_KEY,
                ENV_LOG_LEVEL,
                ENV_LOG_FORMAT,
                ENV_BACKEND_URL_FALLBACK,
                ENV_API_KEY_FALLBACK,
            ] {
                std::env::remove_var(name);
            }
        }
    }

    #[test]
    #[serial]
    fn test_missing_url_is_fatal() {
        cleanup_env_vars();
        let result = Config::load_config(None);
        assert!(matches!(result, Err(ConfigError::Missing("backend.url"))));
    }

    #[test]
    #[serial]
    fn test_missing_api_key_is_fatal() {
        cleanup_env_vars();
        unsafe {
            std::env::set_var(ENV_BACKEND_URL, "https://demo.supabase.co");
        }
        let result = Config::load_config(None);
        assert!(matches!(result, Err(ConfigError::Missing("backend.api_key"))));
        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_load_config_from_environment() {
        cleanup_env_vars();
        unsafe {
            std::env::set_var(ENV_BACKEND_URL, "https://demo.supabase.co");
            std::env::set_var(ENV_API_KEY, "anon-key");
            std::env::set_var(ENV_LOG_LEVEL, "debug");
            std::env::set_var(ENV_LOG_FORMAT, "json");
        }

        let config = Config::load_config(None).unwrap();

        assert_eq!(config.backend.url.as_str(), "https://demo.supabase.co/");
        assert_eq!(config.backend.api_key, "anon-key");
        assert_eq!(config.backend.messages_table, DEFAULT_MESSAGES_TABLE);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_supabase_variable_names_are_accepted() {
        cleanup_env_vars();
        unsafe {
            std::env::set_var(ENV_BACKEND_URL_FALLBACK, "https://fallback.supabase.co");
            std::env::set_var(ENV_API_KEY_FALLBACK, "fallback-key");
        }

        let config = Config::load_config(None).unwrap();
        assert_eq!(config.backend.url.host_str(), Some("fallback.supabase.co"));
        assert_eq!(config.backend.api_key, "fallback-key");

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_load_config_from_toml_file() -> Result<(), Box<dyn std::error::Error>> {
        cleanup_env_vars();
        let temp_dir = TempDir::new()?;
        let config_file = temp_dir.path().join("carrot.toml");
        fs::write(
            &config_file,
            r#"
[backend]
url = "https://toml.supabase.co"
api_key = "toml-key"
messages_table = "messages"
request_timeout_secs = 3

[logging]
level = "trace"
format = "json"
"#,
        )?;

        let config = Config::load_config(Some(config_file))?;

        assert_eq!(config.backend.api_key, "toml-key");
        assert_eq!(config.backend.messages_table, "messages");
        assert_eq!(config.backend.comments_table, DEFAULT_COMMENTS_TABLE);
        assert_eq!(config.backend.request_timeout_secs, 3);
        assert_eq!(config.logging.level, "trace");
        assert_eq!(config.logging.format, LogFormat::Json);
        Ok(())
    }

    #[test]
    #[serial]
    fn test_environment_overrides_yaml_file() -> Result<(), Box<dyn std::error::Error>> {
        cleanup_env_vars();
        let temp_dir = TempDir::new()?;
        let config_file = temp_dir.path().join("carrot.yaml");
        fs::write(
            &config_file,
            "backend:\n  url: \"https://yaml.supabase.co\"\n  api_key: \"yaml-key\"\n",
        )?;
        unsafe {
            std::env::set_var(ENV_API_KEY, "env-key");
        }

        let config = Config::load_config(Some(config_file))?;
        assert_eq!(config.backend.url.host_str(), Some("yaml.supabase.co"));
        assert_eq!(config.backend.api_key, "env-key");
        assert_eq!(config.logging, LoggingConfig::default());

        cleanup_env_vars();
        Ok(())
    }

    #[test]
    #[serial]
    fn test_load_config_from_json_file() -> Result<(), Box<dyn std::error::Error>> {
        cleanup_env_vars();
        let temp_dir = TempDir::new()?;
        let config_file = temp_dir.path().join("carrot.json");
        fs::write(
            &config_file,
            r#"{ "backend": { "url": "http://localhost:54321", "api_key": "json-key", "schema": "market" } }"#,
        )?;

        let config = Config::load_config(Some(config_file))?;
        assert_eq!(config.backend.schema, "market");
        assert_eq!(config.backend.url.port(), Some(54321));
        Ok(())
    }

    #[test]
    #[serial]
    fn test_unsupported_extension_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
        cleanup_env_vars();
        let temp_dir = TempDir::new()?;
        let config_file = temp_dir.path().join("carrot.ini");
        fs::write(&config_file, "url=x")?;

        let result = Config::load_config(Some(config_file));
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
        Ok(())
    }

    #[test]
    #[serial]
    fn test_zero_timeout_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
        cleanup_env_vars();
        let temp_dir = TempDir::new()?;
        let config_file = temp_dir.path().join("carrot.toml");
        fs::write(
            &config_file,
            "[backend]\nurl = \"https://a.supabase.co\"\napi_key = \"k\"\nrequest_timeout_secs = 0\n",
        )?;

        let result = Config::load_config(Some(config_file));
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
        Ok(())
    }

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
