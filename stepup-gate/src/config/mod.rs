use chrono::Duration as ChronoDuration;
use secrecy::Secret;
use serde::Deserialize;
use std::time::Duration;
use stepup_core::config as core_config;
use stepup_core::error::AppError;
use stepup_core::retry::RetryConfig;

pub const TRUST_WINDOW_HOURS: i64 = 24;
pub const SIGNUP_GRACE_SECONDS: i64 = 5 * 60;
pub const RESEND_COOLDOWN_SECONDS: u64 = 60;
pub const PRIVILEGE_TIMEOUT_SECONDS: u64 = 5;
pub const SESSION_KEY: &str = "stepup.two_factor_trust";
/// Upper bound for the cooldown and privilege timeout.
pub const MAX_TIMER_SECONDS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, Deserialize)]
pub struct StepUpConfig {
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_trust_window_hours")]
    pub trust_window_hours: i64,
    #[serde(default = "default_signup_grace_seconds")]
    pub signup_grace_seconds: i64,
    #[serde(default = "default_resend_cooldown_seconds")]
    pub resend_cooldown_seconds: u64,
    #[serde(default = "default_privilege_timeout_seconds")]
    pub privilege_timeout_seconds: u64,
    #[serde(default = "default_session_key")]
    pub session_key: String,
    #[serde(default)]
    pub settings_store: EndpointConfig,
    #[serde(default)]
    pub otp_service: EndpointConfig,
    #[serde(default)]
    pub persist_retry: PersistRetryConfig,
}

/// Base URL and optional bearer key for an HTTP collaborator.
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    #[serde(default = "default_endpoint_url")]
    pub url: String,
    #[serde(default)]
    pub api_key: Option<Secret<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersistRetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
}

fn default_service_name() -> String {
    "stepup-gate".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_trust_window_hours() -> i64 {
    TRUST_WINDOW_HOURS
}

fn default_signup_grace_seconds() -> i64 {
    SIGNUP_GRACE_SECONDS
}

fn default_resend_cooldown_seconds() -> u64 {
    RESEND_COOLDOWN_SECONDS
}

fn default_privilege_timeout_seconds() -> u64 {
    PRIVILEGE_TIMEOUT_SECONDS
}

fn default_session_key() -> String {
    SESSION_KEY.to_string()
}

fn default_endpoint_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    100
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            url: default_endpoint_url(),
            api_key: None,
        }
    }
}

impl Default for PersistRetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
        }
    }
}

impl Default for StepUpConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            log_level: default_log_level(),
            trust_window_hours: default_trust_window_hours(),
            signup_grace_seconds: default_signup_grace_seconds(),
            resend_cooldown_seconds: default_resend_cooldown_seconds(),
            privilege_timeout_seconds: default_privilege_timeout_seconds(),
            session_key: default_session_key(),
            settings_store: EndpointConfig::default(),
            otp_service: EndpointConfig::default(),
            persist_retry: PersistRetryConfig::default(),
        }
    }
}

impl StepUpConfig {
    /// Load from `stepup.{toml,yaml,json}` and `STEPUP__*` variables.
    pub fn load() -> Result<Self, AppError> {
        let config: Self = core_config::load("stepup", "STEPUP")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.trust_window_hours <= 0 {
            return Err(config_error("trust_window_hours must be positive"));
        }
        if ChronoDuration::try_hours(self.trust_window_hours).is_none() {
            return Err(config_error("trust_window_hours is out of range"));
        }
        if self.signup_grace_seconds < 0 {
            return Err(config_error("signup_grace_seconds must not be negative"));
        }
        if ChronoDuration::try_seconds(self.signup_grace_seconds).is_none() {
            return Err(config_error("signup_grace_seconds is out of range"));
        }
        if !(1..=MAX_TIMER_SECONDS).contains(&self.resend_cooldown_seconds) {
            return Err(config_error("resend_cooldown_seconds must be between 1 and 86400"));
        }
        if !(1..=MAX_TIMER_SECONDS).contains(&self.privilege_timeout_seconds) {
            return Err(config_error("privilege_timeout_seconds must be between 1 and 86400"));
        }
        if self.session_key.trim().is_empty() {
            return Err(config_error("session_key must not be empty"));
        }
        Ok(())
    }

    // Accessors never panic: values `validate` would reject fall back to
    // the defaults (windows) or are clamped (timers).

    pub fn trust_window(&self) -> ChronoDuration {
        ChronoDuration::try_hours(self.trust_window_hours)
            .filter(|window| *window > ChronoDuration::zero())
            .unwrap_or_else(|| ChronoDuration::hours(TRUST_WINDOW_HOURS))
    }

    pub fn signup_grace(&self) -> ChronoDuration {
        ChronoDuration::try_seconds(self.signup_grace_seconds)
            .filter(|grace| *grace >= ChronoDuration::zero())
            .unwrap_or_else(|| ChronoDuration::seconds(SIGNUP_GRACE_SECONDS))
    }

    pub fn resend_cooldown(&self) -> Duration {
        Duration::from_secs(self.resend_cooldown_seconds.min(MAX_TIMER_SECONDS))
    }

    pub fn privilege_timeout(&self) -> Duration {
        Duration::from_secs(self.privilege_timeout_seconds.min(MAX_TIMER_SECONDS))
    }

    pub fn persist_retry(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.persist_retry.max_retries,
            initial_backoff: Duration::from_millis(self.persist_retry.initial_backoff_ms),
            ..RetryConfig::default()
        }
    }
}

fn config_error(msg: &str) -> AppError {
    AppError::ConfigError(anyhow::anyhow!(msg.to_string()))
}
