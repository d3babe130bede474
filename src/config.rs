//! Configuration management for bookmarks-alive-exporter.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats.

use crate::cli::{Args, ConfigFormat};
use crate::orchestrator::{
    OrchestratorSettings, DEFAULT_RESULT_QUEUE_CAPACITY, DEFAULT_URL_QUEUE_CAPACITY,
};
use crate::pool::DEFAULT_WORKERS;
use crate::source::DEFAULT_QUERY;
use reqwest::header::HeaderValue;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

// Default configuration constants
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_DB_PATH: &str = "./bookmarks.db";
pub const DEFAULT_USER_AGENT: &str = concat!("bookmarks-alive-exporter/", env!("CARGO_PKG_VERSION"));
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_SCRAPE_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 5;

/// Exporter configuration as read from file; unset keys fall back to defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub port: Option<u16>,
    pub bind: Option<String>,

    // URL store
    pub db: Option<String>,
    pub query: Option<String>,

    // Probing
    #[serde(alias = "user-agent")]
    pub user_agent: Option<String>,
    pub workers: Option<usize>,
    #[serde(alias = "probe-timeout-secs")]
    pub probe_timeout_secs: Option<u64>,
    #[serde(alias = "scrape-timeout-secs")]
    pub scrape_timeout_secs: Option<u64>,

    // Performance tuning
    #[serde(alias = "url-queue-capacity")]
    pub url_queue_capacity: Option<usize>,
    #[serde(alias = "result-queue-capacity")]
    pub result_queue_capacity: Option<usize>,
    #[serde(alias = "serialize-scrapes")]
    pub serialize_scrapes: Option<bool>,
    #[serde(alias = "shutdown-grace-secs")]
    pub shutdown_grace_secs: Option<u64>,

    // Feature flags
    pub enable_health: Option<bool>,
    pub enable_telemetry: Option<bool>,

    // Logging
    pub log_level: Option<String>,

    // TLS/SSL Configuration
    #[serde(alias = "enable-tls")]
    pub enable_tls: Option<bool>,
    #[serde(alias = "tls-cert-path")]
    pub tls_cert_path: Option<String>,
    #[serde(alias = "tls-key-path")]
    pub tls_key_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: Some(DEFAULT_BIND_ADDR.to_string()),
            port: Some(DEFAULT_PORT),
            db: Some(DEFAULT_DB_PATH.to_string()),
            query: Some(DEFAULT_QUERY.to_string()),
            user_agent: Some(DEFAULT_USER_AGENT.to_string()),
            workers: Some(DEFAULT_WORKERS),
            probe_timeout_secs: Some(DEFAULT_PROBE_TIMEOUT_SECS),
            scrape_timeout_secs: Some(DEFAULT_SCRAPE_TIMEOUT_SECS),
            url_queue_capacity: Some(DEFAULT_URL_QUEUE_CAPACITY),
            result_queue_capacity: Some(DEFAULT_RESULT_QUEUE_CAPACITY),
            serialize_scrapes: Some(false),
            shutdown_grace_secs: Some(DEFAULT_SHUTDOWN_GRACE_SECS),
            enable_health: Some(true),
            enable_telemetry: Some(true),
            log_level: Some("info".into()),
            enable_tls: Some(false),
            tls_cert_path: None,
            tls_key_path: None,
        }
    }
}

impl Config {
    /// Fills every key left unset with its built-in default.
    pub fn with_defaults(self) -> Self {
        let defaults = Config::default();
        Self {
            port: self.port.or(defaults.port),
            bind: self.bind.or(defaults.bind),
            db: self.db.or(defaults.db),
            query: self.query.or(defaults.query),
            user_agent: self.user_agent.or(defaults.user_agent),
            workers: self.workers.or(defaults.workers),
            probe_timeout_secs: self.probe_timeout_secs.or(defaults.probe_timeout_secs),
            scrape_timeout_secs: self.scrape_timeout_secs.or(defaults.scrape_timeout_secs),
            url_queue_capacity: self.url_queue_capacity.or(defaults.url_queue_capacity),
            result_queue_capacity: self
                .result_queue_capacity
                .or(defaults.result_queue_capacity),
            serialize_scrapes: self.serialize_scrapes.or(defaults.serialize_scrapes),
            shutdown_grace_secs: self.shutdown_grace_secs.or(defaults.shutdown_grace_secs),
            enable_health: self.enable_health.or(defaults.enable_health),
            enable_telemetry: self.enable_telemetry.or(defaults.enable_telemetry),
            log_level: self.log_level.or(defaults.log_level),
            enable_tls: self.enable_tls.or(defaults.enable_tls),
            tls_cert_path: self.tls_cert_path.or(defaults.tls_cert_path),
            tls_key_path: self.tls_key_path.or(defaults.tls_key_path),
        }
    }

    pub fn db(&self) -> &str {
        self.db.as_deref().unwrap_or(DEFAULT_DB_PATH)
    }

    pub fn query(&self) -> &str {
        self.query.as_deref().unwrap_or(DEFAULT_QUERY)
    }

    pub fn user_agent(&self) -> &str {
        self.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs.unwrap_or(DEFAULT_PROBE_TIMEOUT_SECS))
    }

    pub fn scrape_timeout(&self) -> Duration {
        Duration::from_secs(self.scrape_timeout_secs.unwrap_or(DEFAULT_SCRAPE_TIMEOUT_SECS))
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs.unwrap_or(DEFAULT_SHUTDOWN_GRACE_SECS))
    }

    /// Collection run settings derived from this configuration.
    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            workers: self.workers.unwrap_or(DEFAULT_WORKERS),
            url_queue_capacity: self.url_queue_capacity.unwrap_or(DEFAULT_URL_QUEUE_CAPACITY),
            result_queue_capacity: self
                .result_queue_capacity
                .unwrap_or(DEFAULT_RESULT_QUEUE_CAPACITY),
            deadline: self.scrape_timeout(),
            serialize_runs: self.serialize_scrapes.unwrap_or(false),
        }
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if cfg.db().trim().is_empty() {
        return Err("db must not be empty".into());
    }
    if cfg.query().trim().is_empty() {
        return Err("query must not be empty".into());
    }

    if cfg.workers == Some(0) {
        return Err("workers must be at least 1".into());
    }
    if cfg.url_queue_capacity == Some(0) {
        return Err("url_queue_capacity must be at least 1".into());
    }
    if cfg.result_queue_capacity == Some(0) {
        return Err("result_queue_capacity must be at least 1".into());
    }
    if cfg.probe_timeout_secs == Some(0) {
        return Err("probe_timeout_secs must be greater than 0".into());
    }
    if cfg.scrape_timeout_secs == Some(0) {
        return Err("scrape_timeout_secs must be greater than 0".into());
    }

    if HeaderValue::from_str(cfg.user_agent()).is_err() {
        return Err(format!(
            "user_agent '{}' is not a valid HTTP header value",
            cfg.user_agent()
        )
        .into());
    }

    // TLS validation
    if cfg.enable_tls.unwrap_or(false) {
        let cert_path = cfg.tls_cert_path.as_deref();
        let key_path = cfg.tls_key_path.as_deref();

        match (cert_path, key_path) {
            (None, None) => {
                return Err(
                    "TLS is enabled but neither tls_cert_path nor tls_key_path are set".into(),
                );
            }
            (Some(_), None) => {
                return Err("TLS is enabled but tls_key_path is not set".into());
            }
            (None, Some(_)) => {
                return Err("TLS is enabled but tls_cert_path is not set".into());
            }
            (Some(cert), Some(key)) => {
                check_pem_file(cert, "certificate")?;
                check_pem_file(key, "private key")?;
            }
        }
    }

    Ok(())
}

/// Checks that a TLS file exists, is readable and not empty.
fn check_pem_file(path: &str, kind: &str) -> Result<(), Box<dyn std::error::Error>> {
    match fs::metadata(Path::new(path)) {
        Ok(meta) if meta.len() == 0 => Err(format!("TLS {} file is empty: {}", kind, path).into()),
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(format!("TLS {} file not found: {}", kind, path).into())
        }
        Err(e) => Err(format!("TLS {} file is not readable: {} ({})", kind, path, e).into()),
    }
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI/environment (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref().and_then(|p| p.to_str()))?.with_defaults()
    };

    // Override with CLI args
    if let Some(bind_ip) = args.bind {
        config.bind = Some(bind_ip.to_string());
    }
    if let Some(cli_port) = args.port {
        config.port = Some(cli_port);
    }

    if let Some(db) = &args.db {
        config.db = Some(db.clone());
    }
    if let Some(query) = &args.query {
        config.query = Some(query.clone());
    }

    if let Some(user_agent) = &args.user_agent {
        config.user_agent = Some(user_agent.clone());
    }
    if let Some(workers) = args.workers {
        config.workers = Some(workers);
    }
    if let Some(secs) = args.probe_timeout {
        config.probe_timeout_secs = Some(secs);
    }
    if let Some(secs) = args.scrape_timeout {
        config.scrape_timeout_secs = Some(secs);
    }
    if args.serialize_scrapes {
        config.serialize_scrapes = Some(true);
    }

    // Feature flags
    if args.disable_health {
        config.enable_health = Some(false);
    }
    if args.disable_telemetry {
        config.enable_telemetry = Some(false);
    }

    // TLS configuration: CLI wins if provided
    if args.enable_tls {
        config.enable_tls = Some(true);
    }
    if let Some(cert_path) = &args.tls_cert {
        config.tls_cert_path = Some(cert_path.to_string_lossy().to_string());
    }
    if let Some(key_path) = &args.tls_key {
        config.tls_key_path = Some(key_path.to_string_lossy().to_string());
    }

    Ok(config)
}

/// Enhanced configuration loading with multiple format support
pub fn load_config(path: Option<&str>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = if let Some(p) = path {
        // An explicitly named file must exist
        let explicit = PathBuf::from(p);
        if !explicit.is_file() {
            return Err(format!("Config file not found: {}", explicit.display()).into());
        }
        explicit
    } else {
        // Try default locations
        let defaults = [
            "/etc/bookmarks-alive/exporter.yaml",
            "/etc/bookmarks-alive/exporter.yml",
            "./bookmarks-alive-exporter.yaml",
            "./bookmarks-alive-exporter.yml",
            "./bookmarks-alive-exporter.json",
        ];

        defaults
            .iter()
            .find(|p| Path::new(p).exists())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(""))
    };

    if !path.exists() || path.to_string_lossy().is_empty() {
        return Ok(Config::default());
    }

    let content = fs::read_to_string(&path)?;

    match path.extension().and_then(|s| s.to_str()) {
        Some("json") => {
            let config: Config = serde_json::from_str(&content)?;
            info!("Loaded JSON configuration from: {}", path.display());
            Ok(config)
        }
        Some("toml") => {
            let config: Config = toml::from_str(&content)?;
            info!("Loaded TOML configuration from: {}", path.display());
            Ok(config)
        }
        _ => {
            // Default to YAML
            let config: Config = serde_yaml::from_str(&content)?;
            info!("Loaded YAML configuration from: {}", path.display());
            Ok(config)
        }
    }
}

/// Renders configuration in the requested format.
pub fn render_config(
    config: &Config,
    format: ConfigFormat,
) -> Result<String, Box<dyn std::error::Error>> {
    Ok(match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    })
}

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: ConfigFormat) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", render_config(config, format)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(validate_effective_config(&config).is_ok());

        let settings = config.orchestrator_settings();
        assert_eq!(settings.workers, 20);
        assert_eq!(settings.url_queue_capacity, 100);
        assert_eq!(settings.result_queue_capacity, 1000);
        assert_eq!(settings.deadline, Duration::from_secs(30));
        assert!(!settings.serialize_runs);
        assert_eq!(config.probe_timeout(), Duration::from_secs(5));
        assert!(config.user_agent().starts_with("bookmarks-alive-exporter/"));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let config = Config {
            workers: Some(0),
            ..Config::default()
        };
        let err = validate_effective_config(&config).unwrap_err();
        assert!(err.to_string().contains("workers"));
    }

    #[test]
    fn test_invalid_user_agent_rejected() {
        let config = Config {
            user_agent: Some("bad\nagent".to_string()),
            ..Config::default()
        };
        assert!(validate_effective_config(&config).is_err());
    }

    #[test]
    fn test_partial_yaml_keeps_unset_keys_empty() {
        let mut file = NamedTempFile::with_suffix(".yaml").unwrap();
        writeln!(file, "db: /var/lib/bookmarks.db\nworkers: 4\nport: 9100").unwrap();

        let config = load_config(file.path().to_str()).unwrap();
        assert_eq!(config.db(), "/var/lib/bookmarks.db");
        assert_eq!(config.workers, Some(4));
        assert_eq!(config.port, Some(9100));
        // Unset keys resolve to the defaults through the accessors.
        assert_eq!(config.query(), DEFAULT_QUERY);
        assert_eq!(config.scrape_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_cli_overrides_file() {
        let mut file = NamedTempFile::with_suffix(".json").unwrap();
        writeln!(file, r#"{{"workers": 4, "user_agent": "from-file"}}"#).unwrap();

        let args = Args {
            config: Some(file.path().to_path_buf()),
            workers: Some(12),
            scrape_timeout: Some(3),
            ..Args::default()
        };
        let config = resolve_config(&args).unwrap();
        assert_eq!(config.workers, Some(12));
        assert_eq!(config.user_agent(), "from-file");
        assert_eq!(config.scrape_timeout(), Duration::from_secs(3));
    }

    #[test]
    fn test_partial_file_renders_with_defaults() {
        let mut file = NamedTempFile::with_suffix(".yaml").unwrap();
        writeln!(file, "workers: 4").unwrap();

        let args = Args {
            config: Some(file.path().to_path_buf()),
            ..Args::default()
        };
        let config = resolve_config(&args).unwrap();
        let rendered = render_config(&config, ConfigFormat::Yaml).unwrap();

        assert!(rendered.contains("workers: 4"), "{rendered}");
        assert!(rendered.contains("port: 8000"), "{rendered}");
        assert!(rendered.contains("db: ./bookmarks.db"), "{rendered}");
        assert!(rendered.contains("scrape_timeout_secs: 30"), "{rendered}");
        assert!(!rendered.contains("query: null"), "{rendered}");
    }

    #[test]
    fn test_missing_explicit_config_file_is_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join("absent.yaml");

        let err = load_config(missing.to_str()).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));

        let args = Args {
            config: Some(missing),
            ..Args::default()
        };
        assert!(resolve_config(&args).is_err());
    }

    #[test]
    fn test_render_round_trips_through_toml() {
        let rendered = render_config(&Config::default(), ConfigFormat::Toml).unwrap();
        let parsed: Config = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.port, Some(DEFAULT_PORT));
    }
}
