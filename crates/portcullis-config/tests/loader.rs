//! File-backed loader tests.

use std::io::Write;
use std::path::PathBuf;

use portcullis_config::{ConfigError, ConfigLoader, Environment, GatewayConfig, LogFormat};
use tempfile::{Builder, NamedTempFile};

fn config_file(suffix: &str, content: &str) -> NamedTempFile {
    let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

fn workspace_config(environment: Environment) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../..")
        .join(environment.config_file())
}

#[test]
fn toml_file_overrides_preset() {
    let file = config_file(
        ".toml",
        r#"
            [server]
            http_addr = "127.0.0.1:8181"
            request_timeout_ms = 5000

            [account_rpc]
            address = "accounts.internal:443"
            tls_domain = "accounts.internal"
        "#,
    );

    let loader = ConfigLoader::new()
        .with_environment(Environment::Live)
        .with_file(file.path())
        .unwrap();
    assert_eq!(loader.loaded_files(), &[file.path().to_path_buf()]);

    let config = loader.load_from_vars(Vec::new()).unwrap();
    assert_eq!(config.server.http_addr, "127.0.0.1:8181");
    assert_eq!(config.server.request_timeout_ms, 5000);
    assert_eq!(config.server.read_timeout_ms, 10_000);
    assert_eq!(config.account_rpc.tls_domain.as_deref(), Some("accounts.internal"));
    assert_eq!(config.logging.format, LogFormat::Json);
}

#[test]
fn json_file_is_detected_by_extension() {
    let file = config_file(".json", r#"{"metrics": {"enabled": false}}"#);
    let config = ConfigLoader::new()
        .with_file(file.path())
        .unwrap()
        .load_unvalidated();
    assert!(!config.metrics.enabled);
}

#[test]
fn later_files_win() {
    let base = config_file(".toml", "[logging]\nlevel = \"warn\"\n[user_api]\ntimeout_ms = 2000");
    let overlay = config_file(".json", r#"{"logging": {"level": "error"}}"#);

    let config = ConfigLoader::new()
        .with_file(base.path())
        .unwrap()
        .with_file(overlay.path())
        .unwrap()
        .load_unvalidated();

    assert_eq!(config.logging.level, "error");
    assert_eq!(config.user_api.timeout_ms, 2000);
}

#[test]
fn env_overrides_file() {
    let file = config_file(".toml", "[server]\nhttp_addr = \"127.0.0.1:8181\"");
    let config = ConfigLoader::new()
        .with_file(file.path())
        .unwrap()
        .with_env_prefix("PORTCULLIS")
        .load_from_vars(vec![(
            "PORTCULLIS__SERVER__HTTP_ADDR".to_string(),
            "127.0.0.1:9191".to_string(),
        )])
        .unwrap();
    assert_eq!(config.server.http_addr, "127.0.0.1:9191");
}

#[test]
fn missing_file_is_an_error_unless_optional() {
    let err = ConfigLoader::new()
        .with_file("/nonexistent/portcullis.toml")
        .unwrap_err();
    assert!(matches!(err, ConfigError::FileNotFound { .. }));

    let config = ConfigLoader::new()
        .with_optional_file("/nonexistent/portcullis.toml")
        .unwrap()
        .load_unvalidated();
    assert_eq!(config, GatewayConfig::default());
}

#[test]
fn unknown_extension_rejected() {
    let file = config_file(".yaml", "server:\n  http_addr: 0.0.0.0:1");
    let err = ConfigLoader::new().with_file(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::UnsupportedFormat(_)));
}

#[test]
fn typo_in_file_rejected() {
    let file = config_file(".toml", "[account_rpc]\nadress = \"accounts:443\"");
    let err = ConfigLoader::new().with_file(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::TomlError(_)));
}

#[test]
fn invalid_file_value_fails_validation() {
    let file = config_file(".toml", "[user_api]\nbase_url = \"ftp://users\"");
    let err = ConfigLoader::new()
        .with_file(file.path())
        .unwrap()
        .load_from_vars(Vec::new())
        .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "user_api.base_url"));
}

#[test]
fn shipped_environment_files_load() {
    for environment in [Environment::Dev, Environment::Staging, Environment::Live] {
        let config = ConfigLoader::new()
            .with_environment(environment)
            .with_file(workspace_config(environment))
            .unwrap_or_else(|e| panic!("{environment}: {e}"))
            .load_from_vars(Vec::new())
            .unwrap_or_else(|e| panic!("{environment}: {e}"));

        assert!(
            config
                .auth
                .exemptions
                .iter()
                .any(|e| e.path == "/health" && e.method == "ANY"),
            "{environment} keeps /health exempt"
        );
    }
}
