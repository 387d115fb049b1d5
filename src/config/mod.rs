//! Configuration loading and validation.
//!
//! A single JSON document, optionally supplemented by a directory of JSON
//! fragments merged on top (the `Index`/`StorageArea`/`ScriptHost`
//! collaborators this crate talks to are all JSON-first).

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::storage::StorageConfig;

mod logging_config;
pub use logging_config::LoggingConfig;

/// Command-line/startup arguments.
#[derive(Debug, Clone)]
pub struct Cli {
    pub config_path: String,
}

impl Cli {
    pub fn new(config_path: String) -> Self {
        Self { config_path }
    }

    /// Parse `argv`, defaulting to `./pixelvault.json` when no path is given.
    pub fn from_env() -> Self {
        let config_path = std::env::args()
            .nth(1)
            .unwrap_or_else(|| "./pixelvault.json".to_string());
        Self::new(config_path)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind_address: String,
    pub port: u16,
    pub threads: usize,
    pub keep_alive_timeout_seconds: u64,
    pub request_timeout_seconds: u64,
    pub tcp_nodelay: bool,
    pub tls_min_version: String,
    pub remote_access_allowed: bool,
    pub compression_enabled: bool,
    pub realm: String,
    pub basic_auth_users: HashMap<String, String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8042,
            threads: 4,
            keep_alive_timeout_seconds: 60,
            request_timeout_seconds: 30,
            tcp_nodelay: true,
            tls_min_version: "TLS1.2".to_string(),
            remote_access_allowed: false,
            compression_enabled: true,
            realm: "pixelvault".to_string(),
            basic_auth_users: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DicomConfig {
    pub aet: String,
    pub port: u16,
    pub synchronous_move: bool,
    pub modalities: HashMap<String, RemoteModality>,
    pub accepted_transfer_syntaxes: Vec<String>,
    pub max_associations: u32,
}

impl Default for DicomConfig {
    fn default() -> Self {
        Self {
            aet: "PIXELVAULT".to_string(),
            port: dimse::DEFAULT_DIMSE_PORT,
            synchronous_move: false,
            modalities: HashMap::new(),
            accepted_transfer_syntaxes: Vec::new(),
            max_associations: 32,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct RemoteModality {
    pub aet: String,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct JobsConfig {
    pub worker_count: usize,
    pub retry_backoff_cap_seconds: u64,
    pub history_size: usize,
    pub stop_on_failure_default: bool,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            worker_count: 2,
            retry_backoff_cap_seconds: 300,
            history_size: 100,
            stop_on_failure_default: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct Config {
    pub http: HttpConfig,
    pub dicom: DicomConfig,
    pub jobs: JobsConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    /// Accepted and stored verbatim; exercised only through the opaque
    /// `ScriptHost`/`PluginBus` collaborators.
    pub plugins: serde_json::Value,
    pub lua_scripts: Vec<String>,
    /// Additional JSON fragments merged on top of the primary document,
    /// relative to its parent directory.
    pub include: Vec<String>,
}

impl Config {
    pub fn from_args(cli: &Cli) -> Self {
        let contents = fs::read_to_string(&cli.config_path)
            .unwrap_or_else(|e| panic!("failed to read config file '{}': {}", cli.config_path, e));
        let mut config: Config =
            serde_json::from_str(&contents).expect("failed to parse config file");

        if let Ok(additional) = Self::load_additional_configs(&config, &cli.config_path) {
            config = Self::merge_configs(config, additional);
        }

        config.validate().expect("configuration validation failed");
        config
    }

    fn load_additional_configs(
        config: &Config,
        base_config_path: &str,
    ) -> Result<Vec<Config>, Box<dyn std::error::Error>> {
        let base_dir = Path::new(base_config_path)
            .parent()
            .ok_or("failed to retrieve base directory of config file")?;

        let mut configs = Vec::new();
        for fragment in &config.include {
            let path = base_dir.join(fragment);
            configs.extend(Self::load_from_path(&path)?);
        }
        Ok(configs)
    }

    fn load_from_path(path: &Path) -> Result<Vec<Config>, Box<dyn std::error::Error>> {
        if path.is_dir() {
            let mut configs = Vec::new();
            for entry in fs::read_dir(path)? {
                let entry_path = entry?.path();
                if entry_path.extension().is_some_and(|ext| ext == "json") {
                    let contents = fs::read_to_string(&entry_path)?;
                    configs.push(serde_json::from_str(&contents)?);
                }
            }
            Ok(configs)
        } else if path.is_file() {
            let contents = fs::read_to_string(path)?;
            Ok(vec![serde_json::from_str(&contents)?])
        } else {
            Ok(Vec::new())
        }
    }

    fn merge_configs(mut base: Config, additional: Vec<Config>) -> Config {
        for fragment in additional {
            base.dicom.modalities.extend(fragment.dicom.modalities);
            base.http.basic_auth_users.extend(fragment.http.basic_auth_users);
            base.lua_scripts.extend(fragment.lua_scripts);
        }
        base
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_http()?;
        self.validate_dicom()?;
        self.validate_jobs()?;
        self.validate_storage()?;
        Ok(())
    }

    fn validate_http(&self) -> Result<(), ConfigError> {
        if self.http.bind_address.trim().is_empty() {
            return Err(ConfigError::InvalidHttp {
                reason: "bind_address is empty".to_string(),
            });
        }
        if self.http.threads == 0 {
            return Err(ConfigError::InvalidHttp {
                reason: "threads must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    fn validate_dicom(&self) -> Result<(), ConfigError> {
        if self.dicom.aet.trim().is_empty() || self.dicom.aet.len() > 16 {
            return Err(ConfigError::InvalidDicom {
                reason: format!(
                    "AET '{}' must be 1-16 characters",
                    self.dicom.aet
                ),
            });
        }
        for (name, modality) in &self.dicom.modalities {
            if modality.aet.trim().is_empty() || modality.host.trim().is_empty() {
                return Err(ConfigError::InvalidDicom {
                    reason: format!("modality '{}' is missing aet or host", name),
                });
            }
        }
        Ok(())
    }

    fn validate_jobs(&self) -> Result<(), ConfigError> {
        if self.jobs.worker_count == 0 {
            return Err(ConfigError::InvalidJobs {
                reason: "worker_count must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    fn validate_storage(&self) -> Result<(), ConfigError> {
        match self.storage.backend.as_str() {
            "filesystem" => {
                if let Some(path) = self.storage.options.get("path") {
                    match path.as_str() {
                        Some(p) if !p.trim().is_empty() => Ok(()),
                        Some(_) => Err(ConfigError::InvalidStorage {
                            reason: "storage path cannot be empty".to_string(),
                        }),
                        None => Err(ConfigError::InvalidStorage {
                            reason: "storage path must be a string".to_string(),
                        }),
                    }
                } else {
                    Ok(())
                }
            }
            other => Err(ConfigError::InvalidStorage {
                reason: format!("unsupported storage backend: {}", other),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidHttp { reason: String },
    InvalidDicom { reason: String },
    InvalidJobs { reason: String },
    InvalidStorage { reason: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidHttp { reason } => write!(f, "invalid http config: {}", reason),
            ConfigError::InvalidDicom { reason } => write!(f, "invalid dicom config: {}", reason),
            ConfigError::InvalidJobs { reason } => write!(f, "invalid jobs config: {}", reason),
            ConfigError::InvalidStorage { reason } => {
                write!(f, "invalid storage config: {}", reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for crate::error::CoreError {
    fn from(err: ConfigError) -> Self {
        crate::error::CoreError::BadParameterType(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_aet_is_rejected() {
        let mut config = Config::default();
        config.dicom.aet = String::new();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDicom { .. })
        ));
    }

    #[test]
    fn zero_workers_is_rejected() {
        let mut config = Config::default();
        config.jobs.worker_count = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidJobs { .. })));
    }

    #[test]
    fn parses_from_json_str() {
        let json = r#"{"http": {"port": 9999}, "dicom": {"aet": "TESTAE"}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.http.port, 9999);
        assert_eq!(config.dicom.aet, "TESTAE");
        assert_eq!(config.http.bind_address, "0.0.0.0");
    }
}
