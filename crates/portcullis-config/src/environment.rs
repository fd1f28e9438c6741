//! Deployment environment selection.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::ConfigError;

/// Variable selecting the deployment environment.
pub const ENVIRONMENT_VAR: &str = "PORTCULLIS_ENV";

/// Where the gateway is deployed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Environment {
    /// Local development.
    #[default]
    Dev,
    /// Pre-production.
    Staging,
    /// Production.
    Live,
}

impl Environment {
    /// Reads [`ENVIRONMENT_VAR`], defaulting to [`Environment::Dev`] when unset.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::EnvParseError` for an unrecognised value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_var(std::env::var(ENVIRONMENT_VAR).ok().as_deref())
    }

    /// Resolves the environment from an optional raw value.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::EnvParseError` for an unrecognised value.
    pub fn from_var(value: Option<&str>) -> Result<Self, ConfigError> {
        match value.map(str::trim) {
            None | Some("") => Ok(Self::default()),
            Some(raw) => raw.parse(),
        }
    }

    /// Canonical upper-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Dev => "DEV",
            Self::Staging => "STAGING",
            Self::Live => "LIVE",
        }
    }

    /// Configuration file for this environment, relative to the working directory.
    #[must_use]
    pub fn config_file(self) -> PathBuf {
        PathBuf::from("config").join(format!("{}.toml", self.as_str().to_ascii_lowercase()))
    }

    /// Returns `true` for local development.
    #[must_use]
    pub const fn is_dev(self) -> bool {
        matches!(self, Self::Dev)
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DEV" => Ok(Self::Dev),
            "STAGING" => Ok(Self::Staging),
            "LIVE" => Ok(Self::Live),
            _ => Err(ConfigError::env_parse_error(
                ENVIRONMENT_VAR,
                format!("expected DEV, STAGING or LIVE, got '{s}'"),
            )),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_defaults_to_dev() {
        assert_eq!(Environment::from_var(None).unwrap(), Environment::Dev);
        assert_eq!(Environment::from_var(Some("  ")).unwrap(), Environment::Dev);
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("live".parse::<Environment>().unwrap(), Environment::Live);
        assert_eq!(Environment::from_var(Some("Staging")).unwrap(), Environment::Staging);
    }

    #[test]
    fn test_unknown_environment_rejected() {
        let err = Environment::from_var(Some("prod")).unwrap_err();
        assert!(matches!(err, ConfigError::EnvParseError { .. }));
        assert!(err.to_string().contains("PORTCULLIS_ENV"));
    }

    #[test]
    fn test_config_file_path() {
        assert_eq!(Environment::Dev.config_file(), PathBuf::from("config/dev.toml"));
        assert_eq!(Environment::Live.config_file(), PathBuf::from("config/live.toml"));
    }
}
