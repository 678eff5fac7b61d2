//! Application configuration.

use serde::Deserialize;
use std::path::Path;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Redis configuration.
    pub redis: RedisConfig,
    /// Message broker configuration.
    pub broker: BrokerConfig,
    /// Authentication configuration.
    pub auth: AuthConfig,
    /// Matching engine configuration.
    #[serde(default)]
    pub matching: MatchingConfig,
    /// Report limits configuration.
    #[serde(default)]
    pub reports: ReportConfig,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Redis configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL.
    pub url: String,
}

/// Message broker (RabbitMQ) configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    /// AMQP connection URL.
    pub url: String,
    /// Topic exchange that receives all domain events.
    #[serde(default = "default_exchange")]
    pub exchange: String,
    /// Durable catch-all queue bound to the exchange.
    #[serde(default = "default_queue")]
    pub queue: String,
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Symmetric key used to sign session tokens.
    pub token_secret: String,
    /// Session token lifetime in days.
    #[serde(default = "default_token_ttl_days")]
    pub token_ttl_days: i64,
    /// Country code prepended to normalized phone numbers.
    #[serde(default = "default_country_code")]
    pub default_country_code: String,
}

/// Matching engine thresholds and bounds.
#[derive(Debug, Clone, Deserialize)]
pub struct MatchingConfig {
    /// Minimum score for a match to be created and shown.
    #[serde(default = "default_display_threshold")]
    pub display_threshold: u8,
    /// Minimum score for a match to trigger a notification.
    #[serde(default = "default_notify_threshold")]
    pub notify_threshold: u8,
    /// Maximum matches created per report.
    #[serde(default = "default_max_matches")]
    pub max_matches: usize,
    /// Maximum candidates scanned per report.
    #[serde(default = "default_max_candidates")]
    pub max_candidates: u64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            display_threshold: default_display_threshold(),
            notify_threshold: default_notify_threshold(),
            max_matches: default_max_matches(),
            max_candidates: default_max_candidates(),
        }
    }
}

/// Report submission limits.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    /// Reports a non-mawkab user may submit per calendar day.
    #[serde(default = "default_daily_report_limit")]
    pub daily_report_limit: u16,
    /// Images allowed per report.
    #[serde(default = "default_max_images")]
    pub max_images: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            daily_report_limit: default_daily_report_limit(),
            max_images: default_max_images(),
        }
    }
}

const fn default_max_connections() -> u32 {
    100
}

const fn default_min_connections() -> u32 {
    5
}

fn default_exchange() -> String {
    "peyda_events".to_string()
}

fn default_queue() -> String {
    "peyda_events".to_string()
}

const fn default_token_ttl_days() -> i64 {
    30
}

fn default_country_code() -> String {
    "+98".to_string()
}

const fn default_display_threshold() -> u8 {
    40
}

const fn default_notify_threshold() -> u8 {
    60
}

const fn default_max_matches() -> usize {
    20
}

const fn default_max_candidates() -> u64 {
    1000
}

const fn default_daily_report_limit() -> u16 {
    3
}

const fn default_max_images() -> usize {
    5
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (based on `PEYDA_ENV`)
    /// 3. Environment variables with `PEYDA_` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let env = std::env::var("PEYDA_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("PEYDA")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("PEYDA")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
