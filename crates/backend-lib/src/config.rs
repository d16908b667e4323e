// ============================
// crates/backend-lib/src/config.rs
// ============================
//! Configuration management.
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration as StdDuration;

use anyhow::Result;
use figment::{
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::otp::{OtpPolicy, MAX_CODE_LENGTH, MIN_CODE_LENGTH};

/// Prefix of environment overrides, e.g. `PASSRESET_OTP__TTL_SECS=600`
pub const ENV_PREFIX: &str = "PASSRESET_";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Upper bound for `otp.ttl_secs`, `otp.resend_cooldown_secs` and `otp.sweep_interval_secs`
pub const MAX_OTP_SECS: u64 = 24 * 60 * 60;

/// Rejected settings
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Server bind address
    pub bind_addr: SocketAddr,
    /// Data directory path
    pub data_dir: PathBuf,
    /// Log level
    pub log_level: String,
    /// Log output format
    pub log_format: LogFormat,
    /// Record storage backend
    pub storage: StorageBackend,
    /// JSON array of registered email addresses
    pub directory_file: PathBuf,
    /// Passcode policy
    pub otp: OtpSettings,
    /// Per-client HTTP rate limit
    pub rate_limit: RateLimitSettings,
    /// Outgoing mail
    pub mail: MailSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    File,
}

/// Passcode lifecycle settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpSettings {
    /// Time-to-live of an issued code in seconds
    pub ttl_secs: u64,
    /// Number of digits
    pub code_length: usize,
    /// Mismatches tolerated before the record is invalidated
    pub max_attempts: u32,
    /// Minimum seconds between issuances for one identity, 0 disables
    pub resend_cooldown_secs: u64,
    /// Seconds between expired-record sweeps
    pub sweep_interval_secs: u64,
}

/// Rate limit settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSettings {
    /// Requests allowed per window
    pub max_requests: u32,
    /// Window length in seconds
    pub window_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailTransportKind {
    Smtp,
    File,
}

/// Mail settings. The SMTP password is only read from the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailSettings {
    pub transport: MailTransportKind,
    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>,
    pub smtp_username: Option<String>,
    pub from_address: String,
    /// Target directory of the file transport
    pub outbox_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            data_dir: PathBuf::from("data"),
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            storage: StorageBackend::File,
            directory_file: PathBuf::from("data/users.json"),
            otp: OtpSettings::default(),
            rate_limit: RateLimitSettings::default(),
            mail: MailSettings::default(),
        }
    }
}

impl Default for OtpSettings {
    fn default() -> Self {
        Self {
            ttl_secs: 5 * 60,
            code_length: 6,
            max_attempts: 5,
            resend_cooldown_secs: 60,
            sweep_interval_secs: 60,
        }
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_requests: 30,
            window_secs: 60,
        }
    }
}

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            transport: MailTransportKind::File,
            smtp_host: None,
            smtp_port: None,
            smtp_username: None,
            from_address: "no-reply@passreset.local".to_string(),
            outbox_dir: PathBuf::from("data/outbox"),
        }
    }
}

impl OtpSettings {
    /// Durations are clamped to [`MAX_OTP_SECS`]; `validate` rejects anything larger
    pub fn policy(&self) -> OtpPolicy {
        OtpPolicy {
            ttl: bounded_seconds(self.ttl_secs),
            code_length: self.code_length,
            max_attempts: self.max_attempts,
            resend_cooldown: bounded_seconds(self.resend_cooldown_secs),
        }
    }

    pub fn sweep_interval(&self) -> StdDuration {
        StdDuration::from_secs(self.sweep_interval_secs)
    }
}

fn bounded_seconds(secs: u64) -> chrono::Duration {
    // lossless after the clamp
    chrono::Duration::seconds(secs.min(MAX_OTP_SECS) as i64)
}

impl Settings {
    /// Load from `passreset.{toml,yaml,json}` in the working directory and the environment
    pub fn load() -> Result<Self> {
        Self::extract(Self::base_figment())
    }

    /// Load from an explicit file (format picked by extension) and the environment
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let defaults = Figment::from(Serialized::defaults(Settings::default()));
        let figment = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => defaults.merge(Yaml::file(path)),
            Some("json") => defaults.merge(Json::file(path)),
            _ => defaults.merge(Toml::file(path)),
        };
        Self::extract(figment.merge(Self::env()))
    }

    fn base_figment() -> Figment {
        // Try config files first, environment variables take precedence
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file("passreset.toml"))
            .merge(Yaml::file("passreset.yaml"))
            .merge(Json::file("passreset.json"))
            .merge(Self::env())
    }

    fn env() -> Env {
        Env::prefixed(ENV_PREFIX).split("__")
    }

    fn extract(figment: Figment) -> Result<Self> {
        let settings: Settings = figment.extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings the service cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(invalid(
                "log_level",
                format!("must be one of {}", LOG_LEVELS.join(", ")),
            ));
        }

        if self.otp.ttl_secs == 0 {
            return Err(invalid("otp.ttl_secs", "must be positive"));
        }
        for (field, secs) in [
            ("otp.ttl_secs", self.otp.ttl_secs),
            ("otp.resend_cooldown_secs", self.otp.resend_cooldown_secs),
            ("otp.sweep_interval_secs", self.otp.sweep_interval_secs),
        ] {
            if secs > MAX_OTP_SECS {
                return Err(invalid(field, format!("must be at most {MAX_OTP_SECS}")));
            }
        }
        if !(MIN_CODE_LENGTH..=MAX_CODE_LENGTH).contains(&self.otp.code_length) {
            return Err(invalid(
                "otp.code_length",
                format!("must be between {MIN_CODE_LENGTH} and {MAX_CODE_LENGTH}"),
            ));
        }
        if self.otp.max_attempts == 0 {
            return Err(invalid("otp.max_attempts", "must be positive"));
        }
        if self.otp.sweep_interval_secs == 0 {
            return Err(invalid("otp.sweep_interval_secs", "must be positive"));
        }

        if self.rate_limit.max_requests == 0 {
            return Err(invalid("rate_limit.max_requests", "must be positive"));
        }
        if self.rate_limit.window_secs == 0 {
            return Err(invalid("rate_limit.window_secs", "must be positive"));
        }

        if self.mail.transport == MailTransportKind::Smtp {
            if self.mail.smtp_host.as_deref().map_or(true, str::is_empty) {
                return Err(invalid("mail.smtp_host", "required for SMTP transport"));
            }
            if self.mail.smtp_username.as_deref().map_or(true, str::is_empty) {
                return Err(invalid("mail.smtp_username", "required for SMTP transport"));
            }
        }

        Ok(())
    }
}
