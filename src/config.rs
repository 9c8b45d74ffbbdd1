use std::env;
use std::time::Duration;

use crate::error::AppError;
use crate::network::ProbeConfig;
use crate::remote::RemoteConfig;

const DEFAULT_DATABASE_URL: &str = "sqlite://courses.db?mode=rwc";
const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:3000";
const DEFAULT_SYNC_INTERVAL_SECS: u64 = 300;
const DEFAULT_PROBE_INTERVAL_SECS: u64 = 5;
const DEFAULT_PROBE_TIMEOUT_MS: u64 = 2000;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub listen_addr: String,
    /// Zero disables periodic refresh.
    pub sync_interval_secs: u64,
    pub remote: RemoteConfig,
    pub probe: ProbeConfig,
}

impl AppConfig {
    pub fn new_from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key/value source; `new_from_env` passes the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup("CATALOG_BASE_URL")
            .ok_or_else(|| AppError::BadRequest("CATALOG_BASE_URL is not set".to_string()))?;

        let probe_target = match lookup("CONNECTIVITY_PROBE_ADDR") {
            Some(target) => target,
            None => probe_target_for(&base_url)?,
        };

        Ok(Self {
            database_url: lookup("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            listen_addr: lookup("LISTEN_ADDR").unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string()),
            sync_interval_secs: parse_or(&lookup, "SYNC_INTERVAL_SECS", DEFAULT_SYNC_INTERVAL_SECS)?,
            remote: RemoteConfig::new(base_url),
            probe: ProbeConfig {
                target: probe_target,
                interval: Duration::from_secs(parse_or(
                    &lookup,
                    "CONNECTIVITY_PROBE_INTERVAL_SECS",
                    DEFAULT_PROBE_INTERVAL_SECS,
                )?),
                timeout: Duration::from_millis(parse_or(
                    &lookup,
                    "CONNECTIVITY_PROBE_TIMEOUT_MS",
                    DEFAULT_PROBE_TIMEOUT_MS,
                )?),
            },
        })
    }
}

fn parse_or<F>(lookup: &F, key: &str, default: u64) -> Result<u64, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::BadRequest(format!("{} must be a non-negative integer, got {:?}", key, raw))),
        None => Ok(default),
    }
}

/// `host:port` of the catalog server, used as the default reachability target.
fn probe_target_for(base_url: &str) -> Result<String, AppError> {
    let url = reqwest::Url::parse(base_url)
        .map_err(|e| AppError::BadRequest(format!("CATALOG_BASE_URL is invalid: {}", e)))?;
    let host = url
        .host_str()
        .ok_or_else(|| AppError::BadRequest("CATALOG_BASE_URL has no host".to_string()))?;
    let port = url
        .port_or_known_default()
        .ok_or_else(|| AppError::BadRequest("CATALOG_BASE_URL has no port".to_string()))?;
    Ok(format!("{}:{}", host, port))
}
