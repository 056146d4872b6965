//! Wiring for a UI shell.

use std::sync::Arc;
use stepup_core::error::AppError;
use stepup_core::observability::logging::init_tracing;

use crate::challenge::OtpChallengeFlow;
use crate::config::StepUpConfig;
use crate::gate::StepUpGate;
use crate::guard::RouteGuard;
use crate::models::{Account, OtpPurpose};
use crate::services::{
    Clock, HttpOtpService, HttpSettingsStore, OtpService, SessionStorage, SettingsStore, SystemClock,
};

/// Everything a shell needs to guard screens and run challenges.
#[derive(Clone)]
pub struct StepUpRuntime {
    pub config: StepUpConfig,
    pub gate: StepUpGate,
    pub guard: RouteGuard,
    pub otp: Arc<dyn OtpService>,
}

impl StepUpRuntime {
    /// Load configuration, install logging and build the HTTP-backed runtime.
    pub fn bootstrap(session_storage: Arc<dyn SessionStorage>) -> Result<Self, AppError> {
        let config = StepUpConfig::load()?;
        init_tracing(&config.service_name, &config.log_level);

        tracing::info!(
            service = %config.service_name,
            trust_window_hours = config.trust_window_hours,
            "Starting step-up gate"
        );
        Ok(Self::from_config(config, session_storage))
    }

    pub fn from_config(config: StepUpConfig, session_storage: Arc<dyn SessionStorage>) -> Self {
        let settings = Arc::new(HttpSettingsStore::new(&config.settings_store));
        let otp = Arc::new(HttpOtpService::new(&config.otp_service));
        Self::with_services(config, settings, otp, session_storage, Arc::new(SystemClock))
    }

    pub fn with_services(
        config: StepUpConfig,
        settings: Arc<dyn SettingsStore>,
        otp: Arc<dyn OtpService>,
        session_storage: Arc<dyn SessionStorage>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let gate = StepUpGate::new(settings, session_storage, clock, &config);
        let guard = RouteGuard::new(gate.clone(), config.privilege_timeout());
        Self {
            config,
            gate,
            guard,
            otp,
        }
    }

    /// A fresh challenge for `account`, cooling down per config.
    pub fn challenge(&self, account: &Account) -> OtpChallengeFlow {
        OtpChallengeFlow::new(account, OtpPurpose::TwoFactor, self.config.resend_cooldown())
    }

    /// Sign-out hook.
    pub fn end_session(&self) {
        self.gate.end_session();
    }
}
