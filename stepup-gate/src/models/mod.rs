mod account;
mod otp;
mod role;
mod security_settings;
mod trust_record;

pub use account::Account;
pub use otp::{OtpPurpose, SendOtpRequest, VerifyOtpRequest, VerifyOtpResponse, OTP_CODE_LENGTH};
pub use role::{PrivilegeSet, Role};
pub use security_settings::{NewSecuritySettings, SecuritySettings, SettingsPatch, TwoFactorMethod};
pub use trust_record::TrustRecord;
