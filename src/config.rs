//! # Configuration Module
//!
//! Runtime configuration read from the environment (and a `.env` file when
//! present).

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;

use crate::logging::{LogFormat, LoggingConfig};
use crate::service::DEFAULT_LISTING_LIMIT;

pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// PostgreSQL connection settings
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub database: DatabaseConfig,
    /// Number of dishes fetched for a listing when the request sets no limit
    pub listing_limit: usize,
    pub logging: LoggingConfig,
    /// Fixed pricing date; `None` uses the system clock
    pub pricing_date: Option<NaiveDate>,
}

impl Config {
    /// Load `.env` (if any) and read the process environment
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from any variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let url = get("DATABASE_URL").ok_or_else(|| anyhow!("DATABASE_URL must be set"))?;

        let max_connections = match get("DATABASE_MAX_CONNECTIONS") {
            Some(v) => v
                .parse()
                .with_context(|| format!("Invalid DATABASE_MAX_CONNECTIONS: {v}"))?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let listing_limit = match get("LISTING_LIMIT") {
            Some(v) => v
                .parse()
                .with_context(|| format!("Invalid LISTING_LIMIT: {v}"))?,
            None => DEFAULT_LISTING_LIMIT,
        };

        let format = match get("LOG_FORMAT") {
            Some(v) => v
                .parse::<LogFormat>()
                .map_err(|e| anyhow!(e))
                .context("Invalid LOG_FORMAT")?,
            None => LogFormat::default(),
        };

        let pricing_date = get("PRICING_DATE")
            .map(|v| {
                NaiveDate::parse_from_str(&v, "%Y-%m-%d")
                    .with_context(|| format!("Invalid PRICING_DATE: {v} (expected YYYY-MM-DD)"))
            })
            .transpose()?;

        Ok(Config {
            database: DatabaseConfig {
                url,
                max_connections,
            },
            listing_limit,
            logging: LoggingConfig {
                format,
                ..LoggingConfig::default()
            },
            pricing_date,
        })
    }
}
