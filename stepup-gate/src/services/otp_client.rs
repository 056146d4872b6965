//! External OTP service client.
//!
//! Code generation, delivery, expiry and attempt limiting all live in the
//! OTP service; this side only triggers sends and asks for a verdict.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, Secret};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::instrument;

use super::ServiceError;
use crate::config::EndpointConfig;
use crate::models::{OtpPurpose, SendOtpRequest, VerifyOtpRequest, VerifyOtpResponse};

const DEFAULT_REJECTION: &str = "The code you entered is incorrect";

#[async_trait]
pub trait OtpService: Send + Sync {
    async fn send_code(&self, email: &str, purpose: OtpPurpose) -> Result<(), ServiceError>;

    /// `Err(ServiceError::InvalidCode)` when the service rejects the code.
    async fn verify_code(&self, email: &str, code: &str) -> Result<(), ServiceError>;
}

#[derive(Clone)]
pub struct HttpOtpService {
    client: Client,
    base_url: String,
    api_key: Option<Secret<String>>,
}

impl HttpOtpService {
    pub fn new(config: &EndpointConfig) -> Self {
        tracing::info!(url = %config.url, "OTP service client configured");
        Self {
            client: Client::new(),
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key.expose_secret()),
            None => builder,
        }
    }
}

#[async_trait]
impl OtpService for HttpOtpService {
    #[instrument(skip(self, email))]
    async fn send_code(&self, email: &str, purpose: OtpPurpose) -> Result<(), ServiceError> {
        let url = format!("{}/otp/send", self.base_url);
        let response = self
            .authorized(self.client.post(url))
            .json(&SendOtpRequest { email, purpose })
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            tracing::info!(purpose = ?purpose, "OTP send requested");
            Ok(())
        } else {
            Err(ServiceError::from_status(status, "send_code"))
        }
    }

    // Never log the code.
    #[instrument(skip(self, email, code))]
    async fn verify_code(&self, email: &str, code: &str) -> Result<(), ServiceError> {
        let url = format!("{}/otp/verify", self.base_url);
        let response = self
            .authorized(self.client.post(url))
            .json(&VerifyOtpRequest { email, code })
            .send()
            .await?;

        let status = response.status();
        if status.is_server_error() {
            return Err(ServiceError::from_status(status, "verify_code"));
        }

        // 2xx and 4xx both carry `{success, message}`.
        let body: Option<VerifyOtpResponse> = response.json().await.ok();
        interpret_verdict(status.is_success(), body)
    }
}

fn interpret_verdict(
    status_ok: bool,
    body: Option<VerifyOtpResponse>,
) -> Result<(), ServiceError> {
    match body {
        Some(VerifyOtpResponse { success: true, .. }) if status_ok => Ok(()),
        Some(VerifyOtpResponse { message, .. }) => Err(ServiceError::InvalidCode(
            message.unwrap_or_else(|| DEFAULT_REJECTION.to_string()),
        )),
        None if status_ok => Err(ServiceError::Unexpected(anyhow::anyhow!(
            "OTP service returned an unreadable verdict"
        ))),
        None => Err(ServiceError::InvalidCode(DEFAULT_REJECTION.to_string())),
    }
}

/// Scripted OTP service that accepts a single code.
pub struct MockOtpService {
    valid_code: Mutex<String>,
    sent: Mutex<Vec<(String, OtpPurpose)>>,
    fail_sends: AtomicBool,
    fail_verifies: AtomicBool,
    verifies: AtomicUsize,
}

impl Default for MockOtpService {
    fn default() -> Self {
        Self::new("123456")
    }
}

impl MockOtpService {
    pub fn new(valid_code: &str) -> Self {
        Self {
            valid_code: Mutex::new(valid_code.to_string()),
            sent: Mutex::new(Vec::new()),
            fail_sends: AtomicBool::new(false),
            fail_verifies: AtomicBool::new(false),
            verifies: AtomicUsize::new(0),
        }
    }

    pub fn set_valid_code(&self, code: &str) {
        *self.valid_code.lock().unwrap_or_else(|e| e.into_inner()) = code.to_string();
    }

    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Make verification fail with a transport error.
    pub fn set_fail_verifies(&self, fail: bool) {
        self.fail_verifies.store(fail, Ordering::SeqCst);
    }

    pub fn send_count(&self) -> usize {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn sent(&self) -> Vec<(String, OtpPurpose)> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn verify_count(&self) -> usize {
        self.verifies.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OtpService for MockOtpService {
    async fn send_code(&self, email: &str, purpose: OtpPurpose) -> Result<(), ServiceError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(ServiceError::Transient(anyhow::anyhow!(
                "OTP service unavailable"
            )));
        }
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((email.to_string(), purpose));
        Ok(())
    }

    async fn verify_code(&self, _email: &str, code: &str) -> Result<(), ServiceError> {
        self.verifies.fetch_add(1, Ordering::SeqCst);
        if self.fail_verifies.load(Ordering::SeqCst) {
            return Err(ServiceError::Transient(anyhow::anyhow!(
                "OTP service unavailable"
            )));
        }
        let valid = self.valid_code.lock().unwrap_or_else(|e| e.into_inner());
        if *valid == code {
            Ok(())
        } else {
            Err(ServiceError::InvalidCode(DEFAULT_REJECTION.to_string()))
        }
    }
}
