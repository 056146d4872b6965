//! Services layer for the step-up gate.
//!
//! Collaborator contracts (persisted settings, OTP delivery/verification,
//! session storage, time) and their HTTP and in-memory implementations.

mod clock;
pub mod error;
pub mod metrics;
mod otp_client;
mod session_storage;
mod settings_store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::ServiceError;
pub use otp_client::{HttpOtpService, MockOtpService, OtpService};
pub use session_storage::{MemorySessionStorage, SessionStorage};
pub use settings_store::{HttpSettingsStore, InMemorySettingsStore, SettingsStore};
