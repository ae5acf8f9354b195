// NomadOptions: process-wide configuration, built once at startup and
// injected into the context. Nothing in the core reads configuration from
// ambient global state after construction.

use serde::{Deserialize, Serialize};

use crate::env::var_non_empty;
use crate::error::{NomadError, Result};

/// Top-level configuration for the membership core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NomadOptions {
    /// Brand name used in notification subjects.
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Public URL of the web frontend, used in notification bodies.
    #[serde(default = "default_frontend_url")]
    pub frontend_url: String,

    /// Operator address that receives partner-application notices.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_email: Option<String>,

    #[serde(default)]
    pub token: CheckInTokenOptions,

    #[serde(default)]
    pub calendar: CalendarOptions,

    #[serde(default)]
    pub ledger: LedgerOptions,

    #[serde(default)]
    pub notifications: NotificationOptions,
}

fn default_app_name() -> String {
    "Workspace Nomad".to_string()
}
fn default_frontend_url() -> String {
    "http://localhost:3000".to_string()
}

impl Default for NomadOptions {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            frontend_url: default_frontend_url(),
            admin_email: None,
            token: CheckInTokenOptions::default(),
            calendar: CalendarOptions::default(),
            ledger: LedgerOptions::default(),
            notifications: NotificationOptions::default(),
        }
    }
}

impl NomadOptions {
    /// Build options from the environment, falling back to defaults.
    ///
    /// Reads `NOMAD_APP_NAME`, `FRONTEND_URL`, `ADMIN_EMAIL`,
    /// `NOMAD_UTC_OFFSET_SECONDS`, `NOMAD_CYCLE_LENGTH_DAYS` and
    /// `NOMAD_TOKEN_TTL_SECONDS`.
    pub fn from_env() -> Result<Self> {
        let mut opts = Self::default();
        if let Some(name) = var_non_empty("NOMAD_APP_NAME") {
            opts.app_name = name;
        }
        if let Some(url) = var_non_empty("FRONTEND_URL") {
            opts.frontend_url = url;
        }
        opts.admin_email = var_non_empty("ADMIN_EMAIL");
        if let Some(raw) = var_non_empty("NOMAD_UTC_OFFSET_SECONDS") {
            opts.calendar.utc_offset_seconds = parse_env("NOMAD_UTC_OFFSET_SECONDS", &raw)?;
        }
        if let Some(raw) = var_non_empty("NOMAD_CYCLE_LENGTH_DAYS") {
            opts.ledger.cycle_length_days = Some(parse_env("NOMAD_CYCLE_LENGTH_DAYS", &raw)?);
        }
        if let Some(raw) = var_non_empty("NOMAD_TOKEN_TTL_SECONDS") {
            opts.token.ttl_seconds = parse_env("NOMAD_TOKEN_TTL_SECONDS", &raw)?;
        }
        opts.validate()?;
        Ok(opts)
    }

    /// Reject configurations the engine cannot honour.
    pub fn validate(&self) -> Result<()> {
        let t = &self.token;
        if t.ttl_seconds <= 0 {
            return Err(NomadError::Config("token.ttlSeconds must be positive".into()));
        }
        if t.code_min < 100_000 || t.code_max > 999_999 || t.code_min > t.code_max {
            return Err(NomadError::Config(format!(
                "token code range [{}, {}] must lie within the 6-digit space",
                t.code_min, t.code_max
            )));
        }
        if t.max_generation_attempts == 0 {
            return Err(NomadError::Config(
                "token.maxGenerationAttempts must be at least 1".into(),
            ));
        }
        // chrono's FixedOffset accepts strictly less than one day either way.
        if self.calendar.utc_offset_seconds.abs() >= 86_400 {
            return Err(NomadError::Config(
                "calendar.utcOffsetSeconds must be within one day".into(),
            ));
        }
        if self.ledger.cycle_length_days == Some(0) {
            return Err(NomadError::Config("ledger.cycleLengthDays must be at least 1".into()));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| NomadError::Config(format!("{key} has an invalid value: {raw}")))
}

// ─── Check-in token options ─────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInTokenOptions {
    /// Token lifetime in seconds (default: 300 = 5 minutes).
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: i64,

    #[serde(default = "default_code_min")]
    pub code_min: u32,

    #[serde(default = "default_code_max")]
    pub code_max: u32,

    /// Upper bound on draws before giving up on finding a free code.
    #[serde(default = "default_max_generation_attempts")]
    pub max_generation_attempts: u32,
}

fn default_ttl_seconds() -> i64 { 300 }
fn default_code_min() -> u32 { 100_000 }
fn default_code_max() -> u32 { 999_999 }
fn default_max_generation_attempts() -> u32 { 64 }

impl Default for CheckInTokenOptions {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl_seconds(),
            code_min: default_code_min(),
            code_max: default_code_max(),
            max_generation_attempts: default_max_generation_attempts(),
        }
    }
}

// ─── Calendar options ───────────────────────────────────────────

/// Calendar dates for quota and reports are taken in this fixed offset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarOptions {
    #[serde(default)]
    pub utc_offset_seconds: i32,
}

// ─── Ledger options ─────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerOptions {
    /// When set, activation stamps `end_date = start_date + cycle_length_days`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cycle_length_days: Option<u32>,
}

// ─── Notification options ───────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationOptions {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Upper bound on a single send; a slow mailer never stalls a request
    /// for longer than this.
    #[serde(default = "default_notification_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_true() -> bool { true }
fn default_notification_timeout_ms() -> u64 { 2_000 }

impl Default for NotificationOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_ms: default_notification_timeout_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = NomadOptions::default();
        assert_eq!(opts.token.ttl_seconds, 300);
        assert_eq!(opts.token.code_min, 100_000);
        assert_eq!(opts.token.code_max, 999_999);
        assert_eq!(opts.calendar.utc_offset_seconds, 0);
        assert!(opts.ledger.cycle_length_days.is_none());
        assert!(opts.notifications.enabled);
        opts.validate().unwrap();
    }

    #[test]
    fn test_deserialize_partial() {
        let opts: NomadOptions = serde_json::from_value(serde_json::json!({
            "appName": "Nomad",
            "token": { "ttlSeconds": 120 },
            "calendar": { "utcOffsetSeconds": 3600 }
        }))
        .unwrap();
        assert_eq!(opts.app_name, "Nomad");
        assert_eq!(opts.token.ttl_seconds, 120);
        assert_eq!(opts.token.code_max, 999_999);
        assert_eq!(opts.calendar.utc_offset_seconds, 3600);
    }

    #[test]
    fn test_validate_rejects_bad_code_range() {
        let mut opts = NomadOptions::default();
        opts.token.code_min = 99_999;
        assert!(matches!(opts.validate(), Err(NomadError::Config(_))));

        let mut opts = NomadOptions::default();
        opts.token.code_min = 500_000;
        opts.token.code_max = 400_000;
        assert!(opts.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_cycle() {
        let mut opts = NomadOptions::default();
        opts.ledger.cycle_length_days = Some(0);
        assert!(opts.validate().is_err());
    }

    #[test]
    fn test_parse_env_value() {
        let v: u32 = parse_env("X", " 30 ").unwrap();
        assert_eq!(v, 30);
        assert!(parse_env::<u32>("X", "thirty").is_err());
    }
}
