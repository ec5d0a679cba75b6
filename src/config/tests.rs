use super::*;
use serial_test::serial;
use std::fs;
use tempfile::TempDir;

use crate::config::settings::HOME_ENV_VAR;
use crate::index::DistanceMetric;

struct HomeGuard {
    previous: Option<std::ffi::OsString>,
}

impl HomeGuard {
    fn set(path: &std::path::Path) -> Self {
        let previous = std::env::var_os(HOME_ENV_VAR);
        // SAFETY: every test touching the variable is `#[serial]`
        unsafe { std::env::set_var(HOME_ENV_VAR, path) };
        Self { previous }
    }
}

impl Drop for HomeGuard {
    fn drop(&mut self) {
        // SAFETY: see `HomeGuard::set`
        unsafe {
            match &self.previous {
                Some(value) => std::env::set_var(HOME_ENV_VAR, value),
                None => std::env::remove_var(HOME_ENV_VAR),
            }
        }
    }
}

#[test]
#[serial]
fn config_dir_honours_env_override() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let _guard = HomeGuard::set(temp_dir.path());

    let dir = get_config_dir().expect("should resolve config dir");
    assert_eq!(dir, temp_dir.path());
}

#[test]
#[serial]
fn load_from_env_directory() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let _guard = HomeGuard::set(temp_dir.path());

    let toml_content = r#"
        [embedder]
        provider = "hashing"
        dimension = 256

        [index]
        metric = "cosine"
        default_k = 8
    "#;
    fs::write(temp_dir.path().join("config.toml"), toml_content)
        .expect("should write config file");

    let config = Config::load().expect("should load config");
    assert_eq!(config.embedder.provider, EmbedderProvider::Hashing);
    assert_eq!(config.embedder.dimension, 256);
    assert_eq!(config.index.metric, DistanceMetric::Cosine);
    assert_eq!(config.index.default_k, 8);
    assert_eq!(config.get_base_dir(), temp_dir.path());
}

#[test]
fn invalid_toml_handling() {
    let invalid_toml = r#"
        [ollama
        host = "localhost"
        port = "invalid_port"
    "#;

    let result: Result<Config, toml::de::Error> = toml::from_str(invalid_toml);
    assert!(result.is_err());
}

#[test]
fn unknown_provider_is_rejected() {
    let toml_content = r#"
        [embedder]
        provider = "openai"
    "#;

    let result: Result<Config, toml::de::Error> = toml::from_str(toml_content);
    assert!(result.is_err());
}

#[test]
fn ollama_url_generation_with_different_hosts() {
    let configs = vec![
        ("http", "localhost", 11434, "http://localhost:11434/"),
        ("http", "127.0.0.1", 8080, "http://127.0.0.1:8080/"),
        (
            "https",
            "secure.example.com",
            443,
            "https://secure.example.com/",
        ),
    ];

    for (protocol, host, port, expected_url) in configs {
        let mut config = Config::new("/tmp/cocktails");
        config.ollama = OllamaConfig {
            protocol: protocol.to_string(),
            host: host.to_string(),
            port,
            ..OllamaConfig::default()
        };

        let url = config.ollama_url().expect("ollama_url is ok");
        assert_eq!(url.as_str(), expected_url);
    }
}

#[test]
fn error_display_messages() {
    let errors = vec![
        ConfigError::InvalidProtocol("ftp".to_string()),
        ConfigError::InvalidPort(0),
        ConfigError::InvalidBatchSize(0),
        ConfigError::InvalidModel(String::new()),
        ConfigError::InvalidUrl("invalid-url".to_string()),
        ConfigError::InvalidEmbeddingDimension(2),
        ConfigError::InvalidDefaultK(0),
    ];

    for error in errors {
        let message = format!("{error}");
        assert!(!message.is_empty());
        assert!(message.len() > 10);
    }
}
