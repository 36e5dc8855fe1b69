use std::{fs, path::Path};

use serde::Deserialize;

use crate::Result;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// remote sync config
    pub sync: SyncConfig,
    /// capacity of the record event broadcast queue, defaults to 256
    pub event_queue_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// capacity of the outgoing request queue, defaults to 1024
    pub request_queue_size: usize,
    /// capacity of the incoming reply queue, defaults to 1024
    pub reply_queue_size: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            request_queue_size: 1024,
            reply_queue_size: 1024,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sync: SyncConfig::default(),
            event_queue_size: 256,
        }
    }
}

impl Config {
    pub fn create<T: AsRef<Path>>(path: T) -> Result<Self> {
        let data = fs::read_to_string(path.as_ref())?;

        Self::load_from_str(data.as_str())
    }

    pub fn load_from_str(toml_str: &str) -> Result<Self> {
        let config = toml::from_str::<Config>(toml_str)?;
        Ok(config)
    }
}

#[cfg(test)]
mod test {
    use crate::{Config, PipecacheError};

    #[test]
    fn test_config_deserialize() {
        let toml_str = r#"
        event_queue_size = 64
        [sync]
        request_queue_size = 16
        reply_queue_size = 32
        "#;
        let config = Config::load_from_str(toml_str).unwrap();
        assert_eq!(config.event_queue_size, 64);
        assert_eq!(config.sync.request_queue_size, 16);
        assert_eq!(config.sync.reply_queue_size, 32);
    }

    #[test]
    fn test_config_defaults_for_missing_keys() {
        let config = Config::load_from_str("[sync]\nrequest_queue_size = 8\n").unwrap();
        assert_eq!(config.sync.request_queue_size, 8);
        assert_eq!(config.sync.reply_queue_size, 1024);
        assert_eq!(config.event_queue_size, 256);
    }

    #[test]
    fn test_config_invalid_toml() {
        let err = Config::load_from_str("event_queue_size = \"many\"").unwrap_err();
        assert!(matches!(err, PipecacheError::Config(_)));
    }

    #[test]
    fn test_config_missing_file() {
        let err = Config::create("/nonexistent/pipecache.toml").unwrap_err();
        assert!(matches!(err, PipecacheError::IoError(_)));
    }
}
