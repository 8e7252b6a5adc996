//! Configuration loading, merging and validation.
//!
//! Configuration is resolved with the precedence CLI > config file >
//! built-in defaults. Config files may be YAML, JSON or TOML, found either
//! via `-c/--config` or at the default search locations.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::cli::{Args, ConfigFormat};

/// Default bind address (all interfaces).
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
/// Default HTTP listen port.
pub const DEFAULT_PORT: u16 = 9217;

/// Exporter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub port: Option<u16>,
    pub bind: Option<String>,

    // Logging
    pub log_level: Option<String>,

    // Feature flags
    pub enable_health: Option<bool>,
    pub enable_doc: Option<bool>,
    pub enable_telemetry: Option<bool>,

    // TLS
    #[serde(alias = "tls-cert-file")]
    pub tls_cert_file: Option<PathBuf>,
    #[serde(alias = "tls-key-file")]
    pub tls_key_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: Some(DEFAULT_BIND_ADDR.to_string()),
            port: Some(DEFAULT_PORT),
            log_level: Some("info".into()),
            enable_health: Some(true),
            enable_doc: Some(true),
            enable_telemetry: Some(true),
            tls_cert_file: None,
            tls_key_file: None,
        }
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<()> {
    // TLS cert and key only make sense as a pair
    match (&cfg.tls_cert_file, &cfg.tls_key_file) {
        (Some(_), None) => {
            bail!("tls_cert_file is set but tls_key_file is missing");
        }
        (None, Some(_)) => {
            bail!("tls_key_file is set but tls_cert_file is missing");
        }
        _ => {}
    }

    if let Some(level) = cfg.log_level.as_deref() {
        match level {
            "off" | "error" | "warn" | "info" | "debug" | "trace" => {}
            other => {
                bail!(
                    "Invalid log_level '{}', expected one of off/error/warn/info/debug/trace",
                    other
                );
            }
        }
    }

    Ok(())
}

/// Resolves configuration from CLI args, config file, and defaults.
/// Precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref().and_then(|p| p.to_str()))?
    };

    // Override with CLI args
    if let Some(bind_ip) = args.bind {
        config.bind = Some(bind_ip.to_string());
    }

    // Only override port if the user supplied it on the CLI.
    if let Some(cli_port) = args.port {
        config.port = Some(cli_port);
    }

    if let Some(cert) = &args.tls_cert_file {
        config.tls_cert_file = Some(cert.clone());
    }
    if let Some(key) = &args.tls_key_file {
        config.tls_key_file = Some(key.clone());
    }

    // Feature flags
    if args.disable_health {
        config.enable_health = Some(false);
    }
    if args.disable_doc {
        config.enable_doc = Some(false);
    }
    if args.disable_telemetry {
        config.enable_telemetry = Some(false);
    }

    Ok(config)
}

/// Configuration loading with multiple format support
pub fn load_config(path: Option<&str>) -> Result<Config> {
    let path = if let Some(p) = path {
        PathBuf::from(p)
    } else {
        // Try default locations
        let defaults = [
            "/etc/herakles/proc-cpu-exporter.yaml",
            "/etc/herakles/proc-cpu-exporter.yml",
            "/etc/herakles/proc-cpu-exporter.json",
            "./herakles-proc-cpu-exporter.yaml",
            "./herakles-proc-cpu-exporter.yml",
            "./herakles-proc-cpu-exporter.json",
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

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: &ConfigFormat) -> Result<()> {
    let output = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    };

    println!("{output}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(validate_effective_config(&config).is_ok());
        assert_eq!(config.port, Some(DEFAULT_PORT));
    }

    #[test]
    fn tls_files_must_come_in_pairs() {
        let config = Config {
            tls_cert_file: Some(PathBuf::from("/etc/ssl/cert.pem")),
            tls_key_file: None,
            ..Config::default()
        };
        assert!(validate_effective_config(&config).is_err());
    }

    #[test]
    fn rejects_unknown_log_level() {
        let config = Config {
            log_level: Some("verbose".into()),
            ..Config::default()
        };
        assert!(validate_effective_config(&config).is_err());
    }

    #[test]
    fn loads_yaml_config_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "port: 9999\nbind: \"127.0.0.1\"\nenable_doc: false").unwrap();

        let config = load_config(file.path().to_str()).unwrap();
        assert_eq!(config.port, Some(9999));
        assert_eq!(config.bind.as_deref(), Some("127.0.0.1"));
        assert_eq!(config.enable_doc, Some(false));
    }

    #[test]
    fn loads_toml_config_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "port = 9998\nlog_level = \"debug\"").unwrap();

        let config = load_config(file.path().to_str()).unwrap();
        assert_eq!(config.port, Some(9998));
        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = load_config(Some("/nonexistent/herakles-proc-cpu.yaml")).unwrap();
        assert_eq!(config.port, Some(DEFAULT_PORT));
    }
}
