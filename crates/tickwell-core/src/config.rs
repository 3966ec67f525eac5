//! Process configuration read from the environment.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `TICKWELL_HOME` | `$HOME/.tickwell` |
//! | `TICKWELL_DB_PATH` | `<home>/warehouse.duckdb` |
//! | `PORT` | `8080` |
//! | `JOB_KEY` | empty, every trigger is rejected |
//! | `YFINANCEAPI_AUTH_KEY` | empty, no `Authorization` header |
//! | `TICKWELL_FRESHNESS_MINUTES` | `30` |
//! | `TICKWELL_MEMORY_CACHE` | `true` |
//! | `TICKWELL_FAILURE_POLICY` | `isolate` |
//! | `TICKWELL_HTTP_TIMEOUT_MS` | `15000` |

use std::path::PathBuf;
use std::str::FromStr;

use chrono::TimeDelta;
use tickwell_warehouse::WarehouseConfig;

use crate::scraper_service::FailurePolicy;
use crate::ValidationError;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_FRESHNESS_MINUTES: i64 = 30;
pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 15_000;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub warehouse: WarehouseConfig,
    pub port: u16,
    pub job_key: String,
    pub yfinance_auth_key: Option<String>,
    pub freshness: TimeDelta,
    pub memory_cache: bool,
    pub failure_policy: FailurePolicy,
    pub http_timeout_ms: u64,
}

impl AppConfig {
    /// Read the process environment after loading an optional `.env` file.
    pub fn from_env() -> Result<Self, ValidationError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ValidationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let tickwell_home = var("TICKWELL_HOME")
            .map(PathBuf::from)
            .or_else(|| var("HOME").map(|home| PathBuf::from(home).join(".tickwell")))
            .unwrap_or_else(|| PathBuf::from(".tickwell"));
        let db_path = var("TICKWELL_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| tickwell_home.join("warehouse.duckdb"));

        let freshness_minutes: i64 = parse_or(
            "TICKWELL_FRESHNESS_MINUTES",
            var("TICKWELL_FRESHNESS_MINUTES"),
            DEFAULT_FRESHNESS_MINUTES,
        )?;
        let freshness = (freshness_minutes > 0)
            .then(|| TimeDelta::try_minutes(freshness_minutes))
            .flatten()
            .ok_or_else(|| ValidationError::InvalidSetting {
                name: "TICKWELL_FRESHNESS_MINUTES",
                value: freshness_minutes.to_string(),
            })?;

        let http_timeout_ms: u64 = parse_or(
            "TICKWELL_HTTP_TIMEOUT_MS",
            var("TICKWELL_HTTP_TIMEOUT_MS"),
            DEFAULT_HTTP_TIMEOUT_MS,
        )?;
        if http_timeout_ms == 0 {
            return Err(ValidationError::InvalidSetting {
                name: "TICKWELL_HTTP_TIMEOUT_MS",
                value: String::from("0"),
            });
        }

        Ok(Self {
            warehouse: WarehouseConfig {
                tickwell_home,
                db_path,
                ..WarehouseConfig::default()
            },
            port: parse_or("PORT", var("PORT"), DEFAULT_PORT)?,
            job_key: var("JOB_KEY").unwrap_or_default(),
            yfinance_auth_key: var("YFINANCEAPI_AUTH_KEY"),
            freshness,
            memory_cache: parse_flag("TICKWELL_MEMORY_CACHE", var("TICKWELL_MEMORY_CACHE"), true)?,
            failure_policy: var("TICKWELL_FAILURE_POLICY")
                .map(|value| value.parse::<FailurePolicy>())
                .transpose()?
                .unwrap_or_default(),
            http_timeout_ms,
        })
    }
}

fn parse_or<T: FromStr>(
    name: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ValidationError> {
    match value {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ValidationError::InvalidSetting { name, value }),
        None => Ok(default),
    }
}

fn parse_flag(
    name: &'static str,
    value: Option<String>,
    default: bool,
) -> Result<bool, ValidationError> {
    let Some(value) = value else {
        return Ok(default);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ValidationError::InvalidSetting { name, value }),
    }
}
