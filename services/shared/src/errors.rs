/// Shared error types for the teller services
///
/// Design Philosophy:
/// - Standardized error codes so the ledger, the pool and the drivers report failures alike
/// - Categorized by error domain (Validation, Interrupted, Unavailable, Internal)
/// - Includes context fields for debugging (error_code, message, context)
///
/// Contended guards and failed balance checks are outcomes, not errors; see
/// `WithdrawalOutcome`. Everything here is fatal to the single operation that raised it.
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::ValidationError;

/// Error categories that map to logging severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    /// Caller supplied invalid input
    Validation,

    /// A simulated delay was interrupted before it elapsed
    Interrupted,

    /// The component no longer accepts work (e.g. a closed pool)
    Unavailable,

    /// Unexpected failures such as a panicking job body
    Internal,
}

impl ErrorCategory {
    /// Map error category to log level
    pub fn log_level(&self) -> &'static str {
        match self {
            ErrorCategory::Validation => "warn",
            ErrorCategory::Interrupted => "error",
            ErrorCategory::Unavailable => "warn",
            ErrorCategory::Internal => "error",
        }
    }
}

/// Standard error codes used across all services
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorCode(pub &'static str);

impl ErrorCode {
    // Validation errors
    pub const VALIDATION_INVALID_LABEL: ErrorCode = ErrorCode("VALIDATION_INVALID_LABEL");
    pub const VALIDATION_INVALID_CONFIG: ErrorCode = ErrorCode("VALIDATION_INVALID_CONFIG");

    // Interruption errors
    pub const INTERRUPTED_WITHDRAWAL: ErrorCode = ErrorCode("INTERRUPTED_WITHDRAWAL");
    pub const INTERRUPTED_JOB: ErrorCode = ErrorCode("INTERRUPTED_JOB");

    // Availability errors
    pub const UNAVAILABLE_POOL_CLOSED: ErrorCode = ErrorCode("UNAVAILABLE_POOL_CLOSED");

    // Internal errors
    pub const INTERNAL_UNEXPECTED: ErrorCode = ErrorCode("INTERNAL_UNEXPECTED");
    pub const INTERNAL_JOB_PANICKED: ErrorCode = ErrorCode("INTERNAL_JOB_PANICKED");
    pub const INTERNAL_JOB_FAILED: ErrorCode = ErrorCode("INTERNAL_JOB_FAILED");

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Standardized error structure used across all services
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceError {
    /// Error category (determines log level)
    pub category: ErrorCategory,

    /// Structured error code
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context (labels, stage, panic payload)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl ServiceError {
    pub fn new(category: ErrorCategory, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            category,
            code: code.as_str().to_string(),
            message: message.into(),
            context: None,
        }
    }

    /// Add context to an error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn is_interrupted(&self) -> bool {
        self.category == ErrorCategory::Interrupted
    }

    // Validation error constructors
    pub fn invalid_label(error: ValidationError) -> Self {
        Self::new(
            ErrorCategory::Validation,
            ErrorCode::VALIDATION_INVALID_LABEL,
            "Invalid label",
        )
        .with_context(error.to_string())
    }

    pub fn invalid_config(field: &str, reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCategory::Validation,
            ErrorCode::VALIDATION_INVALID_CONFIG,
            format!("Invalid configuration value for {}", field),
        )
        .with_context(reason)
    }

    // Interruption constructors
    pub fn withdrawal_interrupted(caller: impl fmt::Display, stage: &str) -> Self {
        Self::new(
            ErrorCategory::Interrupted,
            ErrorCode::INTERRUPTED_WITHDRAWAL,
            format!("Withdrawal by {} interrupted", caller),
        )
        .with_context(format!("stage: {}", stage))
    }

    pub fn job_interrupted(label: impl fmt::Display, stage: &str) -> Self {
        Self::new(
            ErrorCategory::Interrupted,
            ErrorCode::INTERRUPTED_JOB,
            format!("Job {} interrupted", label),
        )
        .with_context(format!("stage: {}", stage))
    }

    // Availability constructors
    pub fn pool_closed(label: impl fmt::Display) -> Self {
        Self::new(
            ErrorCategory::Unavailable,
            ErrorCode::UNAVAILABLE_POOL_CLOSED,
            "Worker pool no longer accepts submissions",
        )
        .with_context(format!("job: {}", label))
    }

    // Internal error constructors
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            ErrorCategory::Internal,
            ErrorCode::INTERNAL_UNEXPECTED,
            message,
        )
    }

    pub fn job_failed(label: impl fmt::Display, error: impl fmt::Display) -> Self {
        Self::new(
            ErrorCategory::Internal,
            ErrorCode::INTERNAL_JOB_FAILED,
            format!("Job {} failed", label),
        )
        .with_context(error.to_string())
    }

    pub fn job_panicked(label: impl fmt::Display, payload: impl Into<String>) -> Self {
        Self::new(
            ErrorCategory::Internal,
            ErrorCode::INTERNAL_JOB_PANICKED,
            format!("Job {} panicked", label),
        )
        .with_context(payload)
    }
}

impl From<ValidationError> for ServiceError {
    fn from(error: ValidationError) -> Self {
        ServiceError::invalid_label(error)
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(context) = &self.context {
            write!(f, "[{}] {}: {}", self.code, self.message, context)
        } else {
            write!(f, "[{}] {}", self.code, self.message)
        }
    }
}

impl std::error::Error for ServiceError {}

// Convenience type alias
pub type Result<T> = std::result::Result<T, ServiceError>;
