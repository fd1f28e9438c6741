//! Layered configuration loading.
//!
//! Layers apply in order, later ones overriding earlier ones:
//! 1. built-in defaults or an environment preset
//! 2. configuration files (TOML or JSON), merged key by key
//! 3. `PREFIX__SECTION__KEY` environment variables

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::{ConfigError, Environment, GatewayConfig};

/// Configuration loader.
///
/// # Example
///
/// ```no_run
/// use portcullis_config::{ConfigLoader, Environment};
///
/// # fn main() -> Result<(), portcullis_config::ConfigError> {
/// let environment = Environment::from_env()?;
/// let config = ConfigLoader::new()
///     .with_environment(environment)
///     .with_optional_file(environment.config_file())?
///     .with_dotenv()?
///     .with_env_prefix("PORTCULLIS")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    config: GatewayConfig,
    env_prefix: Option<String>,
    files: Vec<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a loader starting from the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: GatewayConfig::default(),
            env_prefix: None,
            files: Vec::new(),
        }
    }

    /// Resets to the built-in defaults.
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        self.config = GatewayConfig::default();
        self
    }

    /// Resets to the development preset.
    ///
    /// # Example
    ///
    /// ```
    /// use portcullis_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new().with_development().load().unwrap();
    /// assert_eq!(config.logging.level, "debug");
    /// ```
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = GatewayConfig::development();
        self
    }

    /// Resets to the production preset.
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.config = GatewayConfig::production();
        self
    }

    /// Resets to the preset for `environment`.
    #[must_use]
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.config = GatewayConfig::for_environment(environment);
        self
    }

    /// Merges a configuration file. The format follows the extension
    /// (`.toml` or `.json`).
    ///
    /// Keys present in the file override the current values; everything
    /// else is kept.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file is missing or unreadable, is neither
    /// TOML nor JSON, fails to parse, or contains unknown fields.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;
        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .ok_or_else(|| ConfigError::UnsupportedFormat(path.display().to_string()))?;

        let layer = parse_layer(&content, &format)?;
        self.merge_layer(layer)?;
        self.files.push(path.to_path_buf());
        Ok(self)
    }

    /// Like [`with_file`](Self::with_file), but a missing file is skipped.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists but cannot be loaded.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Merges configuration from a string in `format` (`"toml"` or `"json"`).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the format is unknown or parsing fails.
    ///
    /// # Example
    ///
    /// ```
    /// use portcullis_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string("[server]\nhttp_addr = \"127.0.0.1:3000\"", "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.server.http_addr, "127.0.0.1:3000");
    /// assert_eq!(config.server.shutdown_timeout_secs, 30);
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        let layer = parse_layer(content, &format.to_lowercase())?;
        self.merge_layer(layer)?;
        Ok(self)
    }

    /// Enables `PREFIX__SECTION__KEY` overrides, e.g.
    /// `PORTCULLIS__SERVER__HTTP_ADDR=0.0.0.0:9000`.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Loads a `.env` file into the process environment if one exists.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::EnvParseError` if the file exists but is malformed.
    pub fn with_dotenv(self) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(_) => Ok(self),
            Err(e) if e.not_found() => Ok(self),
            Err(e) => Err(ConfigError::env_parse_error(".env", e.to_string())),
        }
    }

    /// Files merged so far, in order.
    #[must_use]
    pub fn loaded_files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Applies environment overrides and validates.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if an override cannot be parsed or validation fails.
    pub fn load(self) -> Result<GatewayConfig, ConfigError> {
        self.load_from_vars(env::vars())
    }

    /// Like [`load`](Self::load), reading overrides from `vars` instead of
    /// the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if an override cannot be parsed or validation fails.
    pub fn load_from_vars<I>(mut self, vars: I) -> Result<GatewayConfig, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        if let Some(prefix) = self.env_prefix.take() {
            let marker = format!("{prefix}__");
            for (key, value) in vars {
                if let Some(rest) = key.strip_prefix(&marker) {
                    self.apply_env_var(&key, rest, &value)?;
                }
            }
        }

        self.config.validate()?;
        Ok(self.config)
    }

    /// Returns the configuration without env overrides or validation.
    #[must_use]
    pub fn load_unvalidated(self) -> GatewayConfig {
        self.config
    }

    fn merge_layer(&mut self, layer: Value) -> Result<(), ConfigError> {
        let mut base = serde_json::to_value(&self.config)?;
        merge_values(&mut base, layer);
        self.config = serde_json::from_value(base)?;
        Ok(())
    }

    fn apply_env_var(&mut self, key: &str, path: &str, value: &str) -> Result<(), ConfigError> {
        let parts: Vec<&str> = path.split("__").collect();
        let config = &mut self.config;

        match parts.as_slice() {
            ["SERVER", "HTTP_ADDR"] => config.server.http_addr = value.to_string(),
            ["SERVER", "SHUTDOWN_TIMEOUT_SECS"] => {
                config.server.shutdown_timeout_secs = parse_u64(key, value)?;
            }
            ["SERVER", "REQUEST_TIMEOUT_MS"] => {
                config.server.request_timeout_ms = parse_u64(key, value)?;
            }
            ["SERVER", "READ_TIMEOUT_MS"] => {
                config.server.read_timeout_ms = parse_u64(key, value)?;
            }

            ["LOGGING", "LEVEL"] => config.logging.level = value.to_string(),
            ["LOGGING", "FORMAT"] => {
                config.logging.format = match value.to_lowercase().as_str() {
                    "json" => portcullis_telemetry::LogFormat::Json,
                    "pretty" => portcullis_telemetry::LogFormat::Pretty,
                    _ => {
                        return Err(ConfigError::env_parse_error(
                            key,
                            "expected 'json' or 'pretty'",
                        ))
                    }
                };
            }
            ["LOGGING", "OUTPUT_FILE"] => config.logging.output_file = optional_path(value),
            ["LOGGING", "INCLUDE_LOCATION"] => {
                config.logging.include_location = parse_bool(value)
                    .ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))?;
            }

            ["METRICS", "ENABLED"] => {
                config.metrics.enabled = parse_bool(value)
                    .ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))?;
            }

            ["AUTH", "TOKEN_HEADER"] => config.auth.token_header = value.to_string(),

            ["USER_API", "BASE_URL"] => config.user_api.base_url = value.to_string(),
            ["USER_API", "TIMEOUT_MS"] => config.user_api.timeout_ms = parse_u64(key, value)?,
            ["USER_API", "DEFAULT_HEADERS", name] => {
                let header = name.to_ascii_lowercase().replace('_', "-");
                config.user_api.default_headers.insert(header, value.to_string());
            }

            ["ACCOUNT_RPC", "ADDRESS"] => config.account_rpc.address = value.to_string(),
            ["ACCOUNT_RPC", "CA_CERT_PATH"] => {
                config.account_rpc.ca_cert_path = optional_path(value);
            }
            ["ACCOUNT_RPC", "TLS_DOMAIN"] => {
                config.account_rpc.tls_domain = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                };
            }
            ["ACCOUNT_RPC", "CONNECT_TIMEOUT_MS"] => {
                config.account_rpc.connect_timeout_ms = parse_u64(key, value)?;
            }
            ["ACCOUNT_RPC", "REQUEST_TIMEOUT_MS"] => {
                config.account_rpc.request_timeout_ms = parse_u64(key, value)?;
            }

            // Exemptions are lists; they only come from files.
            _ => {}
        }

        Ok(())
    }
}

/// Parses one layer, rejecting anything the schema would reject.
fn parse_layer(content: &str, format: &str) -> Result<Value, ConfigError> {
    match format {
        "toml" => {
            toml::from_str::<GatewayConfig>(content)?;
            let table: toml::Table = toml::from_str(content)?;
            Ok(serde_json::to_value(table)?)
        }
        "json" => {
            serde_json::from_str::<GatewayConfig>(content)?;
            Ok(serde_json::from_str(content)?)
        }
        other => Err(ConfigError::UnsupportedFormat(other.to_string())),
    }
}

/// Recursively overlays `layer` onto `base`. Objects merge; anything else replaces.
fn merge_values(base: &mut Value, layer: Value) {
    match (base, layer) {
        (Value::Object(base), Value::Object(layer)) => {
            for (key, value) in layer {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, layer) => *base = layer,
    }
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::env_parse_error(key, "expected integer"))
}

fn optional_path(value: &str) -> Option<PathBuf> {
    if value.is_empty() {
        None
    } else {
        Some(PathBuf::from(value))
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
