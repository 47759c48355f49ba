//! tally-config
//!
//! Layered settings for the tally daemon:
//!
//! 1. YAML documents merged in order (later documents override earlier ones),
//!    hashed for provenance.
//! 2. `TALLY_*` environment variables override the merged YAML.
//! 3. Command-line flags (applied by the daemon) override both.
//!
//! The Postgres URL is never read from YAML; it only comes from
//! `TALLY_DATABASE_URL`.

mod duration;
mod layered;
mod settings;

pub use duration::{parse_duration, InvalidDuration, MIN_SYNC_INTERVAL};
pub use layered::{load_layered_yaml, load_layered_yaml_from_strings, LoadedConfig};
pub use settings::{
    load, load_from_strings, Backend, LimitSettings, LoadedSettings, ReconcileSettings,
    ServerSettings, Settings, StoreSettings, ENV_ADDR, ENV_COUNTER_FILE, ENV_COUNTER_KEY,
    ENV_DATABASE_URL, ENV_MAX_INCREMENT, ENV_STORE, ENV_SYNC_INTERVAL,
};
