//! stepup-core: shared infrastructure for the step-up gate crates.
pub mod config;
pub mod error;
pub mod observability;
pub mod retry;
pub mod timer;

pub use tokio;
pub use tracing;
