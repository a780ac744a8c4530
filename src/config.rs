//! Configuration — TOML file defaults + environment variable overrides.
//!
//! Settlement parameters live in `config/default.toml`.
//! The database URL comes from the environment.

use serde::Deserialize;
use std::env;

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub settlement: SettlementConfig,
    pub ledger: LedgerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct SettlementConfig {
    /// Fraction of the pool retained by the house, in [0, 1).
    #[serde(default = "default_house_cut")]
    pub house_cut_fraction: f64,
}

fn default_house_cut() -> f64 {
    0.10
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Hard upper bound on history page size regardless of what a caller asks for.
    #[serde(default = "default_max_page_size")]
    pub max_page_size: i64,
    #[serde(default = "default_page_size")]
    pub default_page_size: i64,
}

fn default_max_page_size() -> i64 {
    100
}

fn default_page_size() -> i64 {
    25
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub json_output: bool,
}

fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load configuration from `config/default.toml` merged with env vars.
    /// Env vars use the `PARI` prefix, e.g. `PARI__SETTLEMENT__HOUSE_CUT_FRACTION`.
    pub fn load() -> anyhow::Result<Self> {
        // Load .env file (ignore if missing)
        let _ = dotenvy::dotenv();

        let builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(
                config::Environment::with_prefix("PARI")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut cfg: Config = builder.try_deserialize()?;

        // The database URL should never live in TOML
        if let Ok(v) = env::var("DATABASE_URL") {
            cfg.database.url = v;
        }

        Ok(cfg)
    }
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            house_cut_fraction: default_house_cut(),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_page_size: default_max_page_size(),
            default_page_size: default_page_size(),
        }
    }
}
