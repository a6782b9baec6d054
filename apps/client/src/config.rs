//! Environment-driven client configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::connectivity::DEFAULT_RETRY_DELAY;
use crate::sync::DEFAULT_FAILURE_THRESHOLD;

const DEFAULT_USER_ID: &str = "local";
const DEFAULT_PROBE_SECS: u64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has invalid value {value:?}")]
    Invalid { name: &'static str, value: String },

    #[error("no data directory available, set WORDQUIZ_DB_PATH")]
    NoDataDir,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub backend_url: String,
    pub auth_token: Option<String>,
    pub user_id: String,
    pub db_path: PathBuf,
    pub retry_delay: Duration,
    pub failure_threshold: usize,
    /// `None` disables the health probe.
    pub probe_interval: Option<Duration>,
}

impl ClientConfig {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let backend_url = get("WORDQUIZ_BACKEND_URL").ok_or(ConfigError::Missing("WORDQUIZ_BACKEND_URL"))?;

        let db_path = match get("WORDQUIZ_DB_PATH") {
            Some(path) => PathBuf::from(path),
            None => dirs::data_local_dir()
                .ok_or(ConfigError::NoDataDir)?
                .join("wordquiz")
                .join("offline.db"),
        };

        let retry_secs = parse_or(&get, "WORDQUIZ_RETRY_SECS", DEFAULT_RETRY_DELAY.as_secs())?;
        let failure_threshold = parse_or(&get, "WORDQUIZ_FAILURE_THRESHOLD", DEFAULT_FAILURE_THRESHOLD)?;
        let probe_secs = parse_or(&get, "WORDQUIZ_PROBE_SECS", DEFAULT_PROBE_SECS)?;

        if retry_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "WORDQUIZ_RETRY_SECS",
                value: "0".into(),
            });
        }
        if failure_threshold == 0 {
            return Err(ConfigError::Invalid {
                name: "WORDQUIZ_FAILURE_THRESHOLD",
                value: "0".into(),
            });
        }

        Ok(Self {
            backend_url,
            auth_token: get("WORDQUIZ_AUTH_TOKEN"),
            user_id: get("WORDQUIZ_USER_ID").unwrap_or_else(|| DEFAULT_USER_ID.to_string()),
            db_path,
            retry_delay: Duration::from_secs(retry_secs),
            failure_threshold,
            probe_interval: (probe_secs > 0).then(|| Duration::from_secs(probe_secs)),
        })
    }
}

fn parse_or<T, G>(get: &G, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}
