//! OTP models - what this crate sends to and reads from the external OTP service.

use serde::{Deserialize, Serialize};

/// Digits in a one-time passcode.
pub const OTP_CODE_LENGTH: usize = 6;

/// OTP purpose codes, passed through to the OTP service unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OtpPurpose {
    Signup,
    TwoFactor,
}

impl OtpPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            OtpPurpose::Signup => "signup",
            OtpPurpose::TwoFactor => "twoFactor",
        }
    }
}

/// Request to send an OTP.
#[derive(Debug, Clone, Serialize)]
pub struct SendOtpRequest<'a> {
    pub email: &'a str,
    pub purpose: OtpPurpose,
}

/// Request to verify an OTP.
#[derive(Debug, Clone, Serialize)]
pub struct VerifyOtpRequest<'a> {
    pub email: &'a str,
    pub code: &'a str,
}

/// Response after verifying an OTP.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyOtpResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}
