use reqwest::StatusCode;
use stepup_core::error::AppError;
use stepup_core::retry::Retryable;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    /// Network or upstream failure; safe to retry.
    #[error("Service unavailable: {0}")]
    Transient(anyhow::Error),

    #[error("Invalid code: {0}")]
    InvalidCode(String),

    #[error("Security settings already exist")]
    Conflict,

    #[error("Session storage error: {0}")]
    Storage(String),

    #[error("Unexpected error: {0}")]
    Unexpected(anyhow::Error),
}

impl ServiceError {
    /// Classify a non-success HTTP status from a collaborator.
    pub fn from_status(status: StatusCode, context: &str) -> Self {
        if status.is_server_error()
            || status == StatusCode::TOO_MANY_REQUESTS
            || status == StatusCode::REQUEST_TIMEOUT
        {
            ServiceError::Transient(anyhow::anyhow!("{} returned {}", context, status))
        } else if status == StatusCode::CONFLICT {
            ServiceError::Conflict
        } else {
            ServiceError::Unexpected(anyhow::anyhow!("{} returned {}", context, status))
        }
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ServiceError::Unexpected(anyhow::Error::new(err))
        } else {
            ServiceError::Transient(anyhow::Error::new(err))
        }
    }
}

impl Retryable for ServiceError {
    fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::Transient(_))
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Transient(e) => AppError::InternalError(e),
            ServiceError::InvalidCode(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            ServiceError::Conflict => {
                AppError::BadRequest(anyhow::anyhow!("Security settings already exist"))
            }
            ServiceError::Storage(msg) => AppError::InternalError(anyhow::anyhow!(msg)),
            ServiceError::Unexpected(e) => AppError::InternalError(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            ServiceError::from_status(StatusCode::SERVICE_UNAVAILABLE, "store"),
            ServiceError::Transient(_)
        ));
        assert!(matches!(
            ServiceError::from_status(StatusCode::TOO_MANY_REQUESTS, "store"),
            ServiceError::Transient(_)
        ));
        assert!(matches!(
            ServiceError::from_status(StatusCode::CONFLICT, "store"),
            ServiceError::Conflict
        ));
        assert!(matches!(
            ServiceError::from_status(StatusCode::FORBIDDEN, "store"),
            ServiceError::Unexpected(_)
        ));
    }

    #[test]
    fn test_only_transient_is_retryable() {
        assert!(ServiceError::Transient(anyhow::anyhow!("down")).is_retryable());
        assert!(!ServiceError::InvalidCode("nope".into()).is_retryable());
        assert!(!ServiceError::Conflict.is_retryable());
        assert!(!ServiceError::Storage("full".into()).is_retryable());
    }
}
