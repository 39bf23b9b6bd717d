//! `lle.toml` plus `LLE_*` environment overrides.

use lle_api::ApiConfig;
use lle_store::DbRuntimeSettings;
use lle_voice::MediaConfig;
use serde::Deserialize;
use thiserror::Error;

/// Top-level client configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// REST backend settings.
    #[serde(default)]
    pub api: ApiSection,

    /// Media server settings.
    #[serde(default)]
    pub media: MediaConfig,

    /// Local store settings.
    #[serde(default)]
    pub store: StoreSection,

    #[serde(default)]
    pub logging: LogSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiSection {
    /// Base URL including the API prefix.
    #[serde(default = "default_api_url")]
    pub base_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Local store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreSection {
    /// Path to the SQLite file holding credentials, selection and session log.
    #[serde(default = "default_store_path")]
    pub path: String,

    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSection {
    /// `EnvFilter` directives, e.g. `"lle_api=debug,warn"`.
    #[serde(default = "default_log_filter")]
    pub level: String,

    /// One JSON object per line on stderr.
    #[serde(default)]
    pub json: bool,
}

fn default_api_url() -> String {
    "http://localhost:8000/api".to_string()
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_store_path() -> String {
    "lle.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    DbRuntimeSettings::default().busy_timeout_ms
}

fn default_pool_max_size() -> u32 {
    DbRuntimeSettings::default().pool_max_size
}

fn default_log_filter() -> String {
    "warn".to_string()
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            base_url: default_api_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_max_size: default_pool_max_size(),
        }
    }
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: default_log_filter(),
            json: false,
        }
    }
}

impl ApiSection {
    pub fn to_api_config(&self) -> ApiConfig {
        ApiConfig {
            base_url: self.base_url.clone(),
            timeout_secs: self.timeout_secs,
        }
    }
}

impl StoreSection {
    pub fn runtime_settings(&self) -> DbRuntimeSettings {
        DbRuntimeSettings {
            busy_timeout_ms: self.busy_timeout_ms,
            pool_max_size: self.pool_max_size,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid config in {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

/// Reads `path` if it exists, then layers the `LLE_*` environment on top.
///
/// A missing file is not an error; the client runs on defaults. Recognised
/// variables: `LLE_API_URL`, `LLE_MEDIA_URL`, `LLE_STORE_PATH`,
/// `LLE_LOG_LEVEL`, and `LLE_LOG_JSON` (`true` or `1`).
///
/// # Errors
///
/// Returns `ConfigError` when the file exists but is unreadable or invalid.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = path.map(read_file).transpose()?.flatten().unwrap_or_default();
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

fn read_file(path: &str) -> Result<Option<Config>, ConfigError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path, "no config file, using defaults");
            return Ok(None);
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_string(),
                source,
            })
        }
    };
    toml::from_str(&text)
        .map(Some)
        .map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })
}

/// Applies `LLE_*` overrides read through `lookup`.
pub fn apply_env_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(url) = lookup("LLE_API_URL") {
        config.api.base_url = url;
    }
    if let Some(url) = lookup("LLE_MEDIA_URL") {
        config.media.url = url;
    }
    if let Some(path) = lookup("LLE_STORE_PATH") {
        config.store.path = path;
    }
    if let Some(filter) = lookup("LLE_LOG_LEVEL") {
        config.logging.level = filter;
    }
    if let Some(flag) = lookup("LLE_LOG_JSON") {
        config.logging.json = matches!(flag.as_str(), "true" | "1");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn missing_file_means_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let loaded = load_config(path.to_str()).unwrap();
        assert_eq!(loaded.api.timeout_secs, 15);

        let empty: Config = toml::from_str("").unwrap();
        assert_eq!(empty.store.path, "lle.db");
        assert_eq!(empty.api.base_url, "http://localhost:8000/api");
        assert_eq!(empty.store.runtime_settings(), DbRuntimeSettings::default());
    }

    #[test]
    fn parses_all_sections() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[api]
base_url = "https://lle.example.com/api"
timeout_secs = 30

[media]
url = "wss://media.example.com"

[store]
path = "/var/lib/lle/state.db"
pool_max_size = 2

[logging]
level = "debug"
json = true
"#
        )
        .unwrap();

        let config: Config =
            toml::from_str(&std::fs::read_to_string(file.path()).unwrap()).unwrap();
        assert_eq!(config.api.to_api_config().base_url, "https://lle.example.com/api");
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.media.url, "wss://media.example.com");
        assert_eq!(config.store.pool_max_size, 2);
        assert_eq!(config.store.busy_timeout_ms, 5_000);
        assert!(config.logging.json);
    }

    #[test]
    fn env_overrides_win() {
        let env: HashMap<&str, &str> = [
            ("LLE_API_URL", "http://10.0.0.2:8000/api"),
            ("LLE_MEDIA_URL", "ws://10.0.0.2:7880"),
            ("LLE_LOG_JSON", "1"),
        ]
        .into_iter()
        .collect();
        let mut config = Config::default();
        apply_env_overrides(&mut config, |k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.api.base_url, "http://10.0.0.2:8000/api");
        assert_eq!(config.media.url, "ws://10.0.0.2:7880");
        assert!(config.logging.json);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[api\nbase_url = 3").unwrap();
        assert!(matches!(
            load_config(file.path().to_str()),
            Err(ConfigError::Parse { .. })
        ));
    }
}
