//! Runtime configuration read from the environment (and `.env`)

use crate::cache::DEFAULT_REFRESH_INTERVAL;
use crate::dialogue::catalog::default_priority_cities;
use crate::error::BotError;
use crate::Result;
use chrono::{FixedOffset, Offset, Utc};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_LEAD_OFFSET_HOURS: i32 = 4;
const DEFAULT_SESSION_IDLE: Duration = Duration::from_secs(24 * 3600);

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub bot_token: Option<String>,
    pub port: u16,
    pub income_source_url: Option<String>,
    pub income_source_token: Option<String>,
    pub income_source_file: Option<PathBuf>,
    pub income_refresh_interval: Duration,
    pub priority_cities: Vec<String>,
    pub database_url: Option<String>,
    pub leads_sink_url: Option<String>,
    pub lead_timestamp_offset: FixedOffset,
    /// Sessions back at the start and untouched this long are dropped.
    pub session_idle_timeout: Duration,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            port: DEFAULT_PORT,
            income_source_url: None,
            income_source_token: None,
            income_source_file: None,
            income_refresh_interval: DEFAULT_REFRESH_INTERVAL,
            priority_cities: default_priority_cities(),
            database_url: None,
            leads_sink_url: None,
            lead_timestamp_offset: hours_offset(DEFAULT_LEAD_OFFSET_HOURS)
                .unwrap_or_else(|| Utc.fix()),
            session_idle_timeout: DEFAULT_SESSION_IDLE,
        }
    }
}

fn non_empty(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn hours_offset(hours: i32) -> Option<FixedOffset> {
    FixedOffset::east_opt(hours.checked_mul(3600)?)
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match non_empty(name) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| BotError::Config(format!("{} has an invalid value: {}", name, raw))),
        None => Ok(None),
    }
}

/// Split a comma-separated list, dropping blanks.
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl BotConfig {
    /// Read configuration from process environment.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let defaults = Self::default();

        let port = match parse_var::<u16>("PORT")? {
            Some(port) => port,
            None => parse_var::<u16>("API_PORT")?.unwrap_or(defaults.port),
        };

        let income_refresh_interval = parse_var::<u64>("INCOME_REFRESH_SECS")?
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.income_refresh_interval);

        let session_idle_timeout = parse_var::<u64>("SESSION_IDLE_SECS")?
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.session_idle_timeout);

        let priority_cities = non_empty("PRIORITY_CITIES")
            .map(|raw| parse_list(&raw))
            .unwrap_or(defaults.priority_cities);

        let lead_timestamp_offset = match parse_var::<i32>("LEAD_TIMESTAMP_OFFSET_HOURS")? {
            Some(hours) => hours_offset(hours).ok_or_else(|| {
                BotError::Config(format!(
                    "LEAD_TIMESTAMP_OFFSET_HOURS out of range: {}",
                    hours
                ))
            })?,
            None => defaults.lead_timestamp_offset,
        };

        Ok(Self {
            bot_token: non_empty("BOT_TOKEN"),
            port,
            income_source_url: non_empty("INCOME_SOURCE_URL"),
            income_source_token: non_empty("INCOME_SOURCE_TOKEN"),
            income_source_file: non_empty("INCOME_SOURCE_FILE").map(PathBuf::from),
            income_refresh_interval,
            priority_cities,
            database_url: non_empty("DATABASE_URL").or_else(|| non_empty("POSTGRES_URL")),
            leads_sink_url: non_empty("LEADS_SINK_URL"),
            lead_timestamp_offset,
            session_idle_timeout,
        })
    }

    pub fn require_bot_token(&self) -> Result<&str> {
        self.bot_token
            .as_deref()
            .ok_or_else(|| BotError::Config("BOT_TOKEN is not set".to_string()))
    }
}
