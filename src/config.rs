use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::catalog::DEFAULT_ENDPOINT;
use crate::error::FetchError;

pub const CONFIG_FILE: &str = "planetary-fetch.json";
pub const DEFAULT_MAX_WORKERS: usize = 3;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub max_workers: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub endpoint: String,
    pub timeout: Duration,
    pub max_workers: usize,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_workers: DEFAULT_MAX_WORKERS,
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, FetchError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Ok(ResolvedConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| FetchError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| FetchError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, FetchError> {
        let endpoint = match config.endpoint {
            Some(endpoint) if endpoint.trim().is_empty() => {
                return Err(FetchError::ConfigParse("endpoint is empty".to_string()));
            }
            Some(endpoint) => endpoint.trim().to_string(),
            None => DEFAULT_ENDPOINT.to_string(),
        };
        let max_workers = config.max_workers.unwrap_or(DEFAULT_MAX_WORKERS);
        if max_workers == 0 {
            return Err(FetchError::InvalidWorkerCount(max_workers));
        }
        let timeout = match config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS) {
            0 => return Err(FetchError::ConfigParse("timeout_secs must be positive".to_string())),
            secs => Duration::from_secs(secs),
        };

        Ok(ResolvedConfig {
            endpoint,
            timeout,
            max_workers,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
#[value(rename_all = "UPPER")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    // Other crates stay at `warn`.
    pub fn directive(self) -> String {
        let level = match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error | LogLevel::Critical => "error",
        };
        format!("warn,planetary_fetch={level}")
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let resolved = ConfigLoader::resolve_config(Config::default()).unwrap();
        assert_eq!(resolved, ResolvedConfig::default());
        assert_eq!(resolved.max_workers, 3);
        assert_eq!(resolved.timeout, Duration::from_secs(60));
    }

    #[test]
    fn zero_workers_rejected() {
        let config = Config {
            max_workers: Some(0),
            ..Config::default()
        };
        let err = ConfigLoader::resolve_config(config).unwrap_err();
        assert_matches!(err, FetchError::InvalidWorkerCount(0));
    }

    #[test]
    fn level_directives() {
        assert_eq!(LogLevel::Warning.directive(), "warn,planetary_fetch=warn");
        assert_eq!(LogLevel::Critical.directive(), "warn,planetary_fetch=error");
        assert_eq!(LogLevel::default(), LogLevel::Info);
    }
}
