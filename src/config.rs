use std::env;
use std::str::FromStr;

use crate::services::mail::SmtpConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deployment {
    Local,
    Dev,
    Stage,
    Prod,
}

impl Deployment {
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Self::Dev,
            "stage" | "staging" => Self::Stage,
            "prod" | "production" => Self::Prod,
            _ => Self::Local,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    // Database
    pub database_url: String,

    // API settings
    pub api_host: String,
    pub api_port: u16,

    // Rate limiting
    pub disable_rate_limiting: bool,
    pub rate_limit_metadata_per_second: u64,
    pub rate_limit_metadata_burst: u32,
    pub rate_limit_data_per_second: u64,
    pub rate_limit_data_burst: u32,
    pub bulk_concurrent_limit: usize,

    // Caching
    pub cache_ttl_seconds: u64,
    pub cache_max_bytes: u64,

    // Query limits
    pub raw_default_limit: u64,
    pub raw_max_limit: u64,
    pub histogram_sample_cap: usize,
    pub large_input_warn_rows: usize,

    // Accounts
    pub session_ttl_hours: i64,
    pub verification_code_ttl_minutes: i64,

    // Outbound mail
    pub smtp: SmtpConfig,

    // Application metadata
    pub deployment: Deployment,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            api_host: "0.0.0.0".to_string(),
            api_port: 8000,
            disable_rate_limiting: false,
            rate_limit_metadata_per_second: 1,
            rate_limit_metadata_burst: 60,
            rate_limit_data_per_second: 10,
            rate_limit_data_burst: 60,
            bulk_concurrent_limit: 5,
            cache_ttl_seconds: 300,
            cache_max_bytes: 209_715_200,
            raw_default_limit: 1000,
            raw_max_limit: 10_000,
            histogram_sample_cap: 100_000,
            large_input_warn_rows: 10_000,
            session_ttl_hours: 24,
            verification_code_ttl_minutes: 10,
            smtp: SmtpConfig::default(),
            deployment: Deployment::Local,
        }
    }
}

/// Reads `name`, falling back to `default` when unset or unparsable.
fn var_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if required environment variables are not set.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        Ok(Self {
            // Database
            database_url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::Missing("DATABASE_URL"))?,

            // API settings
            api_host: env::var("API_HOST").unwrap_or(defaults.api_host),
            api_port: var_or("API_PORT", defaults.api_port),

            // Rate limiting
            disable_rate_limiting: var_or("DISABLE_RATE_LIMITING", false),
            rate_limit_metadata_per_second: var_or(
                "RATE_LIMIT_METADATA_PER_SECOND",
                defaults.rate_limit_metadata_per_second,
            ),
            rate_limit_metadata_burst: var_or(
                "RATE_LIMIT_METADATA_BURST",
                defaults.rate_limit_metadata_burst,
            ),
            rate_limit_data_per_second: var_or(
                "RATE_LIMIT_DATA_PER_SECOND",
                defaults.rate_limit_data_per_second,
            ),
            rate_limit_data_burst: var_or("RATE_LIMIT_DATA_BURST", defaults.rate_limit_data_burst),
            bulk_concurrent_limit: var_or("BULK_CONCURRENT_LIMIT", defaults.bulk_concurrent_limit),

            // Caching
            cache_ttl_seconds: var_or("CACHE_TTL_SECONDS", defaults.cache_ttl_seconds), // 5 minutes
            cache_max_bytes: var_or("CACHE_MAX_BYTES", defaults.cache_max_bytes), // 200MB

            // Query limits
            raw_default_limit: var_or("RAW_DEFAULT_LIMIT", defaults.raw_default_limit),
            raw_max_limit: var_or("RAW_MAX_LIMIT", defaults.raw_max_limit),
            histogram_sample_cap: var_or("HISTOGRAM_SAMPLE_CAP", defaults.histogram_sample_cap),
            large_input_warn_rows: var_or("LARGE_INPUT_WARN_ROWS", defaults.large_input_warn_rows),

            // Accounts
            session_ttl_hours: var_or("SESSION_TTL_HOURS", defaults.session_ttl_hours),
            verification_code_ttl_minutes: var_or(
                "VERIFICATION_CODE_TTL_MINUTES",
                defaults.verification_code_ttl_minutes,
            ),

            // Outbound mail
            smtp: SmtpConfig {
                host: env::var("SMTP_HOST").unwrap_or_default(),
                port: var_or("SMTP_PORT", defaults.smtp.port),
                username: env::var("SMTP_USER").unwrap_or_default(),
                password: env::var("SMTP_PASSWORD").unwrap_or_default(),
                from: env::var("SMTP_FROM").unwrap_or(defaults.smtp.from),
            },

            // Application metadata
            deployment: Deployment::parse(
                &env::var("DEPLOYMENT").unwrap_or_else(|_| "local".to_string()),
            ),
        })
    }

    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
