use roomscout_api::ApiError;
use thiserror::Error;

/// All the ways things can go wrong in RoomScout
#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    ValidationError(#[from] ValidationError),

    #[error("{0}")]
    PreconditionError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Backend request failed: {0}")]
    RemoteError(String),

    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Operation timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<ApiError> for Error {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::NotFound(what) => Error::NotFound(what),
            ApiError::AuthRequired(message) => Error::AuthError(message),
            ApiError::InvalidConfig(message) => Error::ConfigError(message),
            other => Error::RemoteError(other.to_string()),
        }
    }
}

/// File rejected before any upload was attempted
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("The selected file is not an image ({mime_type})")]
    NotAnImage { mime_type: String },

    #[error("Only {allowed} images are accepted, got {mime_type}")]
    UnsupportedType { mime_type: String, allowed: String },

    #[error("The image must be at most {limit} bytes, got {size}")]
    TooLarge { size: u64, limit: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_errors_map_to_domain_errors() {
        assert!(matches!(
            Error::from(ApiError::NotFound("profiles row 1".into())),
            Error::NotFound(_)
        ));
        assert!(matches!(
            Error::from(ApiError::AuthRequired("jwt expired".into())),
            Error::AuthError(_)
        ));
        assert!(matches!(
            Error::from(ApiError::RateLimitExceeded),
            Error::RemoteError(_)
        ));
    }

    #[test]
    fn test_validation_messages() {
        let err = ValidationError::TooLarge {
            size: 6_000_000,
            limit: 5_242_880,
        };
        assert_eq!(
            err.to_string(),
            "The image must be at most 5242880 bytes, got 6000000"
        );
    }
}
