//! Error types for ratewatch operations.

use serde::Serialize;
use thiserror::Error;

/// Main error type for ratewatch operations.
#[derive(Error, Debug)]
pub enum RatewatchError {
    /// Malformed or missing input. Carries one reason per offending field.
    #[error("Validation failed: {}", summarize(.0))]
    Validation(Vec<RejectionReason>),

    /// A uniqueness rule would be broken.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The referenced record does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Database error.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Coarse classification used when mapping errors to responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Client sent something unusable.
    Invalid,
    /// Uniqueness clash.
    Conflict,
    /// Missing record.
    NotFound,
    /// Anything the client cannot fix.
    Internal,
}

impl RatewatchError {
    /// Shorthand for a single-field validation failure.
    pub fn invalid(reason: RejectionReason) -> Self {
        RatewatchError::Validation(vec![reason])
    }

    /// Get the error classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RatewatchError::Validation(_) => ErrorKind::Invalid,
            RatewatchError::Conflict(_) => ErrorKind::Conflict,
            RatewatchError::NotFound(_) => ErrorKind::NotFound,
            RatewatchError::DatabaseError(_)
            | RatewatchError::ConfigurationError(_)
            | RatewatchError::InternalError(_) => ErrorKind::Internal,
        }
    }

    /// Get error code for responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            RatewatchError::Validation(_) => "VALIDATION_FAILED",
            RatewatchError::Conflict(_) => "CONFLICT",
            RatewatchError::NotFound(_) => "NOT_FOUND",
            RatewatchError::DatabaseError(_) => "DATABASE_ERROR",
            RatewatchError::ConfigurationError(_) => "CONFIGURATION_ERROR",
            RatewatchError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    /// Reasons safe to show a client.
    ///
    /// Internal failures yield nothing so no details leak.
    pub fn rejection_reasons(&self) -> Vec<RejectionReason> {
        match self {
            RatewatchError::Validation(reasons) => reasons.clone(),
            RatewatchError::Conflict(message) => {
                vec![RejectionReason::new(self.error_code(), message.clone())]
            }
            RatewatchError::NotFound(message) => {
                vec![RejectionReason::new(self.error_code(), message.clone())]
            }
            _ => Vec::new(),
        }
    }
}

fn summarize(reasons: &[RejectionReason]) -> String {
    reasons
        .iter()
        .map(|r| match &r.field {
            Some(field) => format!("{}: {}", field, r.message),
            None => r.message.clone(),
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type alias for ratewatch operations.
pub type Result<T> = std::result::Result<T, RatewatchError>;

/// Why a request was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectionReason {
    /// Error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Field that caused rejection (if applicable).
    pub field: Option<String>,
}

impl RejectionReason {
    /// Create a new rejection reason.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            field: None,
        }
    }

    /// Create with field.
    pub fn with_field(
        code: impl Into<String>,
        message: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// A required field was not supplied.
    pub fn required(field: impl Into<String>) -> Self {
        Self::with_field("REQUIRED", "This field is required.", field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_lists_fields() {
        let err = RatewatchError::Validation(vec![
            RejectionReason::required("domain"),
            RejectionReason::new("PARSE", "Malformed request."),
        ]);

        assert_eq!(
            err.to_string(),
            "Validation failed: domain: This field is required.; Malformed request."
        );
        assert_eq!(err.kind(), ErrorKind::Invalid);
    }

    #[test]
    fn test_internal_errors_hide_details() {
        let err = RatewatchError::DatabaseError("disk I/O error".to_string());
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(err.rejection_reasons().is_empty());
    }

    #[test]
    fn test_not_found_reason() {
        let err = RatewatchError::NotFound("currency pair USD/EUR".to_string());
        let reasons = err.rejection_reasons();
        assert_eq!(reasons.len(), 1);
        assert_eq!(reasons[0].code, "NOT_FOUND");
    }
}
