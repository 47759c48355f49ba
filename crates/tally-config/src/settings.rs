use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::duration::{deserialize_interval, parse_duration, MIN_SYNC_INTERVAL};
use crate::layered::{load_layered_yaml, load_layered_yaml_from_strings, LoadedConfig};

pub const ENV_ADDR: &str = "TALLY_ADDR";
pub const ENV_SYNC_INTERVAL: &str = "TALLY_SYNC_INTERVAL";
pub const ENV_COUNTER_KEY: &str = "TALLY_COUNTER_KEY";
pub const ENV_MAX_INCREMENT: &str = "TALLY_MAX_INCREMENT";
pub const ENV_STORE: &str = "TALLY_STORE";
pub const ENV_COUNTER_FILE: &str = "TALLY_COUNTER_FILE";
pub const ENV_DATABASE_URL: &str = "TALLY_DATABASE_URL";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSettings {
    pub addr: SocketAddr,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReconcileSettings {
    #[serde(deserialize_with = "deserialize_interval")]
    pub interval: Duration,
    pub key: String,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            key: "TALLY_COUNTER".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitSettings {
    /// Largest single increment `POST /` accepts.
    pub max_increment: u64,
}

impl Default for LimitSettings {
    fn default() -> Self {
        Self { max_increment: 500 }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Memory,
    File,
    Postgres,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Memory => "memory",
            Backend::File => "file",
            Backend::Postgres => "postgres",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Backend::Memory),
            "file" => Ok(Backend::File),
            "postgres" => Ok(Backend::Postgres),
            other => bail!("unknown store backend {other:?}; expected memory, file, or postgres"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreSettings {
    pub backend: Backend,
    pub file_path: PathBuf,
    /// Only ever filled from `TALLY_DATABASE_URL`.
    #[serde(skip)]
    pub database_url: Option<String>,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: Backend::Memory,
            file_path: PathBuf::from("tally.txt"),
            database_url: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub server: ServerSettings,
    pub reconcile: ReconcileSettings,
    pub limits: LimitSettings,
    pub store: StoreSettings,
}

/// Effective settings plus the hash of the YAML layers they were built from.
#[derive(Debug, Clone)]
pub struct LoadedSettings {
    pub settings: Settings,
    pub config_hash: String,
}

impl Settings {
    pub fn from_config_json(v: &Value) -> Result<Self> {
        Settings::deserialize(v).context("invalid tally config")
    }

    /// Apply `TALLY_*` overrides. `lookup` is `std::env::var` in production.
    ///
    /// An unparsable `TALLY_SYNC_INTERVAL` is logged and ignored; the node
    /// keeps the configured interval. Every other bad value is an error.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_ADDR) {
            self.server.addr = v
                .trim()
                .parse()
                .with_context(|| format!("{ENV_ADDR} is not a socket address: {v:?}"))?;
        }
        if let Some(v) = lookup(ENV_SYNC_INTERVAL) {
            match parse_duration(&v) {
                Ok(d) => self.reconcile.interval = d,
                Err(e) => warn!(
                    error = %e,
                    keeping_ms = self.reconcile.interval.as_millis() as u64,
                    "ignoring {ENV_SYNC_INTERVAL}"
                ),
            }
        }
        if let Some(v) = lookup(ENV_COUNTER_KEY) {
            self.reconcile.key = v;
        }
        if let Some(v) = lookup(ENV_MAX_INCREMENT) {
            self.limits.max_increment = v
                .trim()
                .parse()
                .with_context(|| format!("{ENV_MAX_INCREMENT} is not a number: {v:?}"))?;
        }
        if let Some(v) = lookup(ENV_STORE) {
            self.store.backend = v.parse()?;
        }
        if let Some(v) = lookup(ENV_COUNTER_FILE) {
            self.store.file_path = PathBuf::from(v);
        }
        if let Some(v) = lookup(ENV_DATABASE_URL) {
            self.store.database_url = Some(v);
        }
        Ok(())
    }

    /// Enforce cross-field rules and raise the interval to its floor.
    pub fn finalize(&mut self) -> Result<()> {
        if self.reconcile.key.trim().is_empty() {
            bail!("reconcile.key must not be empty");
        }
        if self.store.backend == Backend::Postgres && self.store.database_url.is_none() {
            bail!("store.backend=postgres requires {ENV_DATABASE_URL}");
        }
        if self.reconcile.interval < MIN_SYNC_INTERVAL {
            warn!(
                requested_ms = self.reconcile.interval.as_millis() as u64,
                floor_ms = MIN_SYNC_INTERVAL.as_millis() as u64,
                "sync interval below minimum; using the minimum"
            );
            self.reconcile.interval = MIN_SYNC_INTERVAL;
        }
        Ok(())
    }
}

/// Load YAML files in order, then environment overrides, then finalize.
pub fn load<F>(paths: &[&str], lookup: F) -> Result<LoadedSettings>
where
    F: Fn(&str) -> Option<String>,
{
    resolve(load_layered_yaml(paths)?, lookup)
}

/// Like [`load`], with YAML documents given inline.
pub fn load_from_strings<F>(yaml_docs: &[&str], lookup: F) -> Result<LoadedSettings>
where
    F: Fn(&str) -> Option<String>,
{
    resolve(load_layered_yaml_from_strings(yaml_docs)?, lookup)
}

fn resolve<F>(loaded: LoadedConfig, lookup: F) -> Result<LoadedSettings>
where
    F: Fn(&str) -> Option<String>,
{
    let mut settings = Settings::from_config_json(&loaded.config_json)?;
    settings.apply_env(lookup)?;
    settings.finalize()?;
    Ok(LoadedSettings {
        settings,
        config_hash: loaded.config_hash,
    })
}
