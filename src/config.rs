//! Configuration loading from environment variables.
//!
//! Every setting has a default. A malformed value never aborts startup: the
//! default is kept and a warning is recorded in [`Config::warnings`] so it can
//! be logged once the logger is up.
//!
//! | Variable                   | Default   |
//! |----------------------------|-----------|
//! | `HOST`                     | `0.0.0.0` |
//! | `PORT`                     | `4001`    |
//! | `SEED`                     | `0`       |
//! | `PRIVATE_KEY`              | empty     |
//! | `LOG_LEVEL`                | `info`    |
//! | `START_WITH_GENERATED_KEY` | `false`   |

use std::{
    env,
    fmt::Display,
    net::{IpAddr, Ipv4Addr},
    str::FromStr,
};

pub const DEFAULT_HOST: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
pub const DEFAULT_PORT: u16 = 4001;
pub const DEFAULT_SEED: i64 = 0;
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Fully-resolved node configuration. Read once at startup, never mutated.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bind address.
    pub host: IpAddr,
    /// Bind TCP port.
    pub port: u16,
    /// Seed for deterministic key generation. Only used when no private key is set.
    pub seed: i64,
    /// Base64-encoded libp2p private key; empty when unset.
    pub private_key: String,
    pub log_level: String,
    /// `LOG_LEVEL` was set, so it wins over `RUST_LOG`.
    pub log_level_explicit: bool,
    /// Start the host with a freshly generated key instead of printing it and exiting.
    pub start_with_generated_key: bool,
    /// Values that failed to parse and were replaced by their defaults.
    pub warnings: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST,
            port: DEFAULT_PORT,
            seed: DEFAULT_SEED,
            private_key: String::new(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_level_explicit: false,
            start_with_generated_key: false,
            warnings: Vec::new(),
        }
    }
}

impl Config {
    /// `true` when the seed was left at (or explicitly set to) `0`.
    pub fn seed_is_default(&self) -> bool {
        self.seed == DEFAULT_SEED
    }

    /// `true` when an operator-supplied key should be decoded instead of generating one.
    pub fn has_private_key(&self) -> bool {
        !self.private_key.is_empty()
    }
}

/// Load configuration from the process environment.
pub fn load() -> Config {
    load_from(|name| env::var(name).ok())
}

/// Load configuration through an arbitrary variable lookup.
///
/// Empty or whitespace-only values count as unset.
pub fn load_from<F>(lookup: F) -> Config
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| {
        lookup(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let mut cfg = Config::default();
    let mut warnings = Vec::new();

    cfg.host = parse_or_default("HOST", get("HOST"), DEFAULT_HOST, &mut warnings);
    cfg.port = parse_or_default("PORT", get("PORT"), DEFAULT_PORT, &mut warnings);
    cfg.seed = parse_or_default("SEED", get("SEED"), DEFAULT_SEED, &mut warnings);

    if let Some(key) = get("PRIVATE_KEY") {
        cfg.private_key = key;
    }
    if let Some(level) = get("LOG_LEVEL") {
        cfg.log_level = level;
        cfg.log_level_explicit = true;
    }
    if let Some(raw) = get("START_WITH_GENERATED_KEY") {
        match parse_bool(&raw) {
            Some(flag) => cfg.start_with_generated_key = flag,
            None => warnings.push(format!(
                "START_WITH_GENERATED_KEY: '{raw}' is not a boolean, using default false"
            )),
        }
    }

    cfg.warnings = warnings;
    cfg
}

fn parse_or_default<T>(name: &str, raw: Option<String>, default: T, warnings: &mut Vec<String>) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    let Some(raw) = raw else {
        return default;
    };
    match raw.parse::<T>() {
        Ok(value) => value,
        Err(e) => {
            warnings.push(format!("{name}: cannot parse '{raw}' ({e}), using default {default}"));
            default
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
