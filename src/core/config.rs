

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::Result;


pub const DEFAULT_GRACE_PERIOD_MS: u64 = 5000;


pub const DEFAULT_REINDEX_QUIET_MS: u64 = 5000;


pub const DEFAULT_NOTICE_MS: u64 = 4000;


pub const MAX_RESTORE_RETRIES: u32 = 1;


#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GerobakConfig {

    pub grace_period_ms: u64,
    pub undo_notice_ms: u64,
    pub restore_retries: u32,


    pub reindex_quiet_ms: u64,


    pub notice_ms: u64,


    pub asset_host: Option<String>,
    pub asset_delete_endpoint: Option<String>,
    pub http_timeout_secs: u64,
}

impl GerobakConfig {

    pub fn new() -> Self {
        Self {
            grace_period_ms: DEFAULT_GRACE_PERIOD_MS,
            undo_notice_ms: DEFAULT_GRACE_PERIOD_MS,
            restore_retries: MAX_RESTORE_RETRIES,

            reindex_quiet_ms: DEFAULT_REINDEX_QUIET_MS,

            notice_ms: DEFAULT_NOTICE_MS,

            asset_host: None,
            asset_delete_endpoint: None,
            http_timeout_secs: 30,
        }
    }


    pub fn from_env() -> Self {
        let mut config = Self::new();

        if let Some(ms) = env_number("GEROBAK_GRACE_PERIOD_MS") {
            config.grace_period_ms = ms;
        }
        if let Some(ms) = env_number("GEROBAK_UNDO_NOTICE_MS") {
            config.undo_notice_ms = ms;
        }
        if let Some(retries) = env_number("GEROBAK_RESTORE_RETRIES") {
            config.restore_retries = retries as u32;
        }
        if let Some(ms) = env_number("GEROBAK_REINDEX_QUIET_MS") {
            config.reindex_quiet_ms = ms;
        }
        if let Some(ms) = env_number("GEROBAK_NOTICE_MS") {
            config.notice_ms = ms;
        }
        if let Ok(host) = std::env::var("GEROBAK_ASSET_HOST") {
            config.asset_host = Some(host);
        }
        if let Ok(endpoint) = std::env::var("GEROBAK_ASSET_DELETE_ENDPOINT") {
            config.asset_delete_endpoint = Some(endpoint);
        }
        if let Some(secs) = env_number("GEROBAK_HTTP_TIMEOUT_SECS") {
            config.http_timeout_secs = secs;
        }

        config
    }

    /// Defaults, then the TOML file at `path` if it exists, then `GEROBAK_*`
    /// environment variables.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&Self::new())?)
            .add_source(config::File::from(path.as_ref()).required(false))
            .add_source(config::Environment::with_prefix("GEROBAK").try_parsing(true))
            .build()?;

        Ok(settings.try_deserialize::<Self>()?)
    }


    pub fn deletion(&self) -> DeletionConfig {
        DeletionConfig {
            grace_period: Duration::from_millis(self.grace_period_ms),
            undo_notice: Duration::from_millis(self.undo_notice_ms),
            notice: Duration::from_millis(self.notice_ms),
            restore_retries: self.restore_retries.min(MAX_RESTORE_RETRIES),
            asset_host: self.asset_host.clone(),
        }
    }


    pub fn reindex_quiet(&self) -> Duration {
        Duration::from_millis(self.reindex_quiet_ms)
    }
}

impl Default for GerobakConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn env_number(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}


/// Settings the deletion controller runs with.
#[derive(Debug, Clone)]
pub struct DeletionConfig {
    pub grace_period: Duration,
    pub undo_notice: Duration,
    pub notice: Duration,
    /// Extra create attempts after a failed restore. Never more than one.
    pub restore_retries: u32,
    /// Only asset refs on this host are cleaned up. `None` keeps every ref.
    pub asset_host: Option<String>,
}

impl Default for DeletionConfig {
    fn default() -> Self {
        GerobakConfig::default().deletion()
    }
}
