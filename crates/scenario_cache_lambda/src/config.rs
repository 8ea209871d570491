use scenario_cache_core::fingerprint::FingerprintMode;
use scenario_cache_core::storage_keys::{ArtifactNamer, StorageRoot, DEFAULT_KEY_ROOT};
use thiserror::Error;

use crate::observability::LogFormat;

pub const ENV_BUCKET: &str = "SCENARIO_BUCKET";
pub const ENV_PUBLIC_BASE_URL: &str = "SCENARIO_PUBLIC_BASE_URL";
pub const ENV_STORAGE_ROOT: &str = "SCENARIO_STORAGE_ROOT";
pub const ENV_STH_ENGINE_FUNCTION: &str = "STH_ENGINE_FUNCTION";
pub const ENV_TRACHOMA_ENGINE_FUNCTION: &str = "TRACHOMA_ENGINE_FUNCTION";
pub const ENV_FINGERPRINT_MODE: &str = "FINGERPRINT_MODE";
pub const ENV_LOG_FORMAT: &str = "LOG_FORMAT";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{name} must be configured")]
    Missing { name: &'static str },

    #[error("{name} has unsupported value: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Deployment settings, read once at cold start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub bucket: String,
    pub public_base_url: Option<String>,
    pub key_root: String,
    pub sth_engine_function: String,
    pub trachoma_engine_function: String,
    pub fingerprint_mode: FingerprintMode,
    pub log_format: LogFormat,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Blank values are treated as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let require = |name: &'static str| read(name).ok_or(ConfigError::Missing { name });

        let fingerprint_mode = match read(ENV_FINGERPRINT_MODE) {
            None => FingerprintMode::default(),
            Some(value) => FingerprintMode::parse(&value).ok_or(ConfigError::Invalid {
                name: ENV_FINGERPRINT_MODE,
                value,
            })?,
        };
        let log_format = match read(ENV_LOG_FORMAT) {
            None => LogFormat::default(),
            Some(value) => LogFormat::parse(&value).ok_or(ConfigError::Invalid {
                name: ENV_LOG_FORMAT,
                value,
            })?,
        };

        Ok(Self {
            bucket: require(ENV_BUCKET)?,
            public_base_url: read(ENV_PUBLIC_BASE_URL),
            key_root: read(ENV_STORAGE_ROOT).unwrap_or_else(|| DEFAULT_KEY_ROOT.to_string()),
            sth_engine_function: require(ENV_STH_ENGINE_FUNCTION)?,
            trachoma_engine_function: require(ENV_TRACHOMA_ENGINE_FUNCTION)?,
            fingerprint_mode,
            log_format,
        })
    }

    pub fn storage_root(&self) -> StorageRoot {
        let root = StorageRoot::s3(&self.bucket);
        match &self.public_base_url {
            Some(base) => root.with_public_base_url(base),
            None => root,
        }
    }

    pub fn namer(&self) -> ArtifactNamer {
        ArtifactNamer::new(&self.key_root)
    }
}
