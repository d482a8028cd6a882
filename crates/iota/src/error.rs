use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IotaError {
    #[error("Invalid IoT Agent endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("IoT Agent returned error: ({0}) {1}")]
    Status(StatusCode, String),

    #[error("{kind} not found: {key}")]
    NotFound { kind: &'static str, key: String },
}

impl IotaError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            IotaError::NotFound { .. } | IotaError::Status(StatusCode::NOT_FOUND, _)
        )
    }
}
