//! Process configuration read from the environment.
//!
//! # Responsibility
//! - Load an optional `.env` file and read `SLOTBOOK_*` variables.
//! - Provide documented defaults for every setting.
//!
//! # Invariants
//! - Variables already present in the process win over `.env` entries.
//! - A malformed value is an error naming the variable, never a silent default.

use crate::model::slot::SlotTime;
use crate::schedule::pattern::DEFAULT_CLOSING_TIME;
use crate::service::booking_service::BookingPolicy;
use chrono_tz::Tz;
use log::debug;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const ENV_DB_PATH: &str = "SLOTBOOK_DB_PATH";
pub const ENV_DATA_PATH: &str = "SLOTBOOK_DATA_PATH";
pub const ENV_ENGINE: &str = "SLOTBOOK_ENGINE";
pub const ENV_TIMEZONE: &str = "SLOTBOOK_TIMEZONE";
pub const ENV_CLOSING_TIME: &str = "SLOTBOOK_CLOSING_TIME";
pub const ENV_PUBLIC_WINDOW_DAYS: &str = "SLOTBOOK_PUBLIC_WINDOW_DAYS";
pub const ENV_PROTECT_BOOKED_SLOTS: &str = "SLOTBOOK_PROTECT_BOOKED_SLOTS";
pub const ENV_LOG_LEVEL: &str = "SLOTBOOK_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "SLOTBOOK_LOG_DIR";

const DEFAULT_DB_PATH: &str = "schedule.db";
const DEFAULT_DATA_PATH: &str = "data.json";

/// Which persistence engine to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineChoice {
    /// Try SQLite, fall back to the JSON file.
    #[default]
    Auto,
    Sqlite,
    Json,
}

impl EngineChoice {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "sqlite" => Some(Self::Sqlite),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Invalid configuration value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub variable: &'static str,
    pub value: String,
    pub expected: &'static str,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid {} `{}`; expected {}",
            self.variable, self.value, self.expected
        )
    }
}

impl Error for ConfigError {}

/// Resolved application settings.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub data_path: PathBuf,
    pub engine: EngineChoice,
    pub timezone: Tz,
    pub closing_time: SlotTime,
    pub public_window_days: u32,
    pub protect_booked_slots: bool,
    pub log_level: Option<String>,
    pub log_dir: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            engine: EngineChoice::Auto,
            timezone: chrono_tz::Europe::Istanbul,
            closing_time: DEFAULT_CLOSING_TIME,
            public_window_days: 2,
            protect_booked_slots: true,
            log_level: None,
            log_dir: None,
        }
    }
}

impl AppConfig {
    /// Loads `.env` (if present) and reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => debug!(
                "event=config_load module=config status=ok dotenv={}",
                path.display()
            ),
            Err(err) if err.not_found() => {
                debug!("event=config_load module=config status=ok dotenv=none")
            }
            Err(err) => debug!("event=config_load module=config status=skipped error={err}"),
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let engine = match read(ENV_ENGINE) {
            Some(value) => EngineChoice::parse(&value)
                .ok_or_else(|| invalid(ENV_ENGINE, value, "auto|sqlite|json"))?,
            None => defaults.engine,
        };
        let timezone = match read(ENV_TIMEZONE) {
            Some(value) => value
                .parse::<Tz>()
                .map_err(|_| invalid(ENV_TIMEZONE, value, "an IANA timezone name"))?,
            None => defaults.timezone,
        };
        let closing_time = match read(ENV_CLOSING_TIME) {
            Some(value) => SlotTime::parse_colon(&value)
                .ok_or_else(|| invalid(ENV_CLOSING_TIME, value, "HH:MM"))?,
            None => defaults.closing_time,
        };
        let public_window_days = match read(ENV_PUBLIC_WINDOW_DAYS) {
            Some(value) => value
                .parse::<u32>()
                .map_err(|_| invalid(ENV_PUBLIC_WINDOW_DAYS, value, "a non-negative integer"))?,
            None => defaults.public_window_days,
        };
        let protect_booked_slots = match read(ENV_PROTECT_BOOKED_SLOTS) {
            Some(value) => parse_flag(&value)
                .ok_or_else(|| invalid(ENV_PROTECT_BOOKED_SLOTS, value, "true|false"))?,
            None => defaults.protect_booked_slots,
        };

        Ok(Self {
            db_path: read(ENV_DB_PATH)
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            data_path: read(ENV_DATA_PATH)
                .map(PathBuf::from)
                .unwrap_or(defaults.data_path),
            engine,
            timezone,
            closing_time,
            public_window_days,
            protect_booked_slots,
            log_level: read(ENV_LOG_LEVEL),
            log_dir: read(ENV_LOG_DIR),
        })
    }

    pub fn booking_policy(&self) -> BookingPolicy {
        BookingPolicy {
            closing_time: self.closing_time,
            public_window_days: self.public_window_days,
            protect_booked_slots: self.protect_booked_slots,
        }
    }
}

fn invalid(variable: &'static str, value: String, expected: &'static str) -> ConfigError {
    ConfigError {
        variable,
        value,
        expected,
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
