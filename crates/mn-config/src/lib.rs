//! # mn-config
//!
//! Layered configuration for Marginote: built-in defaults, an optional
//! `marginote.toml` next to the binary, and `MARGINOTE_*` environment
//! overrides (a `.env` file is honored by the binary in development).

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration error: {0}")]
    Load(#[from] config::ConfigError),
}

const DEFAULT_SECRET: &str = "insecure-dev-secret";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Address the HTTP listener binds to.
    pub listen: String,
    /// SQLite database file path.
    pub dbpath: String,
    /// HMAC key for ownership/moderation/unsubscribe tokens.
    pub secret: SecretString,
    /// Salt for identity fingerprints.
    pub hash_salt: String,
    /// When enabled, new comments enter as pending.
    pub moderation_enabled: bool,
    /// Age (seconds) after which an unactivated pending comment is
    /// swept away.
    pub purge_after_secs: u64,
    /// How often (seconds) the purge sweep runs.
    pub purge_interval_secs: u64,
    /// How long (seconds) the creating client may edit or delete its
    /// own comment.
    pub ownership_window_secs: u64,
    /// Whether the cross-thread latest listing is served at all.
    pub latest_enabled: bool,
    /// "text" or "json".
    pub log_format: String,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let cfg: Config = config::Config::builder()
            .set_default("listen", "127.0.0.1:8080")?
            .set_default("dbpath", "marginote.db")?
            .set_default("secret", DEFAULT_SECRET)?
            .set_default("hash_salt", "Eech7co8Ohloopo9Ol6baimi")?
            .set_default("moderation_enabled", false)?
            .set_default("purge_after_secs", 30i64 * 24 * 3600)?
            .set_default("purge_interval_secs", 3600i64)?
            .set_default("ownership_window_secs", 900i64)?
            .set_default("latest_enabled", false)?
            .set_default("log_format", "text")?
            .add_source(config::File::with_name("marginote").required(false))
            .add_source(config::Environment::with_prefix("MARGINOTE").try_parsing(true))
            .build()?
            .try_deserialize()?;
        Ok(cfg)
    }

    /// True while the built-in development secret is still in use; the
    /// binary logs a warning so deployments set `MARGINOTE_SECRET`.
    pub fn using_default_secret(&self) -> bool {
        self.secret.expose_secret() == DEFAULT_SECRET
    }
}
