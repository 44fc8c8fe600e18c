//! Configuration module for the Leakdrop backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::AppError;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key protecting the internal endpoints
    pub api_psk: Option<String>,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Development mode relaxes submission timing constraints
    pub devel_mode: bool,
    /// Whether the platform currently accepts new submissions
    pub accept_submissions: bool,
    /// Interval between two runs of the delivery and notification jobs
    pub notification_interval: Duration,
    /// Maximum number of notification events enqueued per run
    pub notification_limit: usize,
    /// Display name used as sender of notification mails
    pub notif_source_name: String,
    /// Address used as sender of notification mails
    pub notif_source_email: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let api_psk = env::var("LEAKDROP_API_PSK").ok().filter(|k| !k.is_empty());

        let db_path = env::var("LEAKDROP_DB_PATH")
            .unwrap_or_else(|_| "./data/leakdrop.sqlite".to_string())
            .into();

        let bind_addr = parse_var("LEAKDROP_BIND_ADDR", "127.0.0.1:8082")?;

        let log_level = env::var("LEAKDROP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let devel_mode = parse_flag("LEAKDROP_DEVEL_MODE", false)?;
        let accept_submissions = parse_flag("LEAKDROP_ACCEPT_SUBMISSIONS", true)?;

        let interval_secs: u64 = parse_var("LEAKDROP_NOTIFICATION_INTERVAL_SECS", "60")?;
        let notification_limit = parse_var("LEAKDROP_NOTIFICATION_LIMIT", "30")?;

        let notif_source_name =
            env::var("LEAKDROP_NOTIF_SOURCE_NAME").unwrap_or_else(|_| "Leakdrop".to_string());
        let notif_source_email = env::var("LEAKDROP_NOTIF_SOURCE_EMAIL")
            .unwrap_or_else(|_| "notification@localhost".to_string());

        Ok(Self {
            api_psk,
            db_path,
            bind_addr,
            log_level,
            devel_mode,
            accept_submissions,
            notification_interval: Duration::from_secs(interval_secs.max(1)),
            notification_limit,
            notif_source_name,
            notif_source_email,
        })
    }
}

fn parse_var<T: FromStr>(name: &str, default: &str) -> Result<T, AppError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.trim()
        .parse()
        .map_err(|_| AppError::Config(format!("Invalid {} value: {:?}", name, raw)))
}

fn parse_flag(name: &str, default: bool) -> Result<bool, AppError> {
    match env::var(name) {
        Err(_) => Ok(default),
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(AppError::Config(format!(
                "Invalid {} value: {:?}",
                name, raw
            ))),
        },
    }
}
