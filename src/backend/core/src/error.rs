//! Error handling for the ledger core.
//!
//! This module provides:
//! - Machine-readable error codes with categories and severity
//! - User-friendly messages vs detailed internal messages
//! - Error logging with tracing integration
//! - Metrics integration for error tracking
//!
//! # Usage
//!
//! ```rust,ignore
//! use ledger_core::error::{LedgerError, Result, ErrorContext};
//!
//! fn my_function() -> Result<()> {
//!     some_operation().context("Failed to perform operation")?;
//!     Ok(())
//! }
//! ```

use metrics::counter;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use thiserror::Error;
use tracing::{error, warn};

// ═══════════════════════════════════════════════════════════════════════════════
// Result Type Alias
// ═══════════════════════════════════════════════════════════════════════════════

/// A specialized Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

// ═══════════════════════════════════════════════════════════════════════════════
// Error Codes
// ═══════════════════════════════════════════════════════════════════════════════

/// Machine-readable error codes.
///
/// These codes are stable and can be used by embedding applications for
/// programmatic error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Storage Errors (2000-2099)
    StorageFailed,

    // Serialization Errors (2200-2299)
    MalformedLog,
    MalformedSnapshot,
    SerializationFailed,

    // Validation Errors (4100-4199)
    InvalidAggregateId,
    InvalidEventVersion,
    InvalidEventType,
    InvalidMigration,

    // Configuration Errors (5000-5099)
    ConfigurationFailed,

    // Internal Errors (9000-9099)
    InternalFailure,
}

impl ErrorCode {
    /// Get the numeric code for this error.
    pub const fn numeric_code(&self) -> u32 {
        match self {
            Self::StorageFailed => 2000,
            Self::MalformedLog => 2200,
            Self::MalformedSnapshot => 2201,
            Self::SerializationFailed => 2202,
            Self::InvalidAggregateId => 4100,
            Self::InvalidEventVersion => 4101,
            Self::InvalidEventType => 4102,
            Self::InvalidMigration => 4103,
            Self::ConfigurationFailed => 5000,
            Self::InternalFailure => 9000,
        }
    }

    /// Get the error category for grouping.
    pub const fn category(&self) -> &'static str {
        match self.numeric_code() {
            2000..=2099 => "storage",
            2200..=2299 => "serialization",
            4100..=4199 => "validation",
            5000..=5099 => "configuration",
            _ => "internal",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error Severity
// ═══════════════════════════════════════════════════════════════════════════════

/// Severity level for errors (affects logging and alerting).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    /// Caller errors (bad input, rejected registrations)
    Low,
    /// Configuration problems
    Medium,
    /// Storage and serialization failures
    High,
    /// Data loss hazards requiring immediate attention
    Critical,
}

impl ErrorSeverity {
    /// Get severity based on error code.
    pub const fn from_code(code: &ErrorCode) -> Self {
        match code {
            ErrorCode::InvalidAggregateId
            | ErrorCode::InvalidEventVersion
            | ErrorCode::InvalidEventType
            | ErrorCode::InvalidMigration => Self::Low,

            ErrorCode::ConfigurationFailed => Self::Medium,

            ErrorCode::StorageFailed | ErrorCode::SerializationFailed => Self::High,

            // A log or snapshot that exists but cannot be parsed means history
            // is at risk; never downgrade these to "empty state".
            ErrorCode::MalformedLog
            | ErrorCode::MalformedSnapshot
            | ErrorCode::InternalFailure => Self::Critical,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Main Error Type
// ═══════════════════════════════════════════════════════════════════════════════

/// The main error type for the ledger core.
///
/// Supports structured error codes, error chaining, and user-friendly vs
/// internal messages.
#[derive(Error, Debug)]
pub struct LedgerError {
    /// Machine-readable error code
    code: ErrorCode,

    /// User-friendly error message (safe to expose to callers)
    user_message: Cow<'static, str>,

    /// Detailed internal message (for logging only)
    internal_message: Option<String>,

    /// The source error that caused this error
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.user_message)?;
        if let Some(ref internal) = self.internal_message {
            write!(f, " (internal: {})", internal)?;
        }
        Ok(())
    }
}

impl LedgerError {
    // ─────────────────────────────────────────────────────────────────────────
    // Constructors
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a new error with code and user message.
    pub fn new(code: ErrorCode, user_message: impl Into<Cow<'static, str>>) -> Self {
        let error = Self {
            code,
            user_message: user_message.into(),
            internal_message: None,
            source: None,
        };
        error.record_metrics();
        error
    }

    /// Create an error with both user and internal messages.
    pub fn with_internal(
        code: ErrorCode,
        user_message: impl Into<Cow<'static, str>>,
        internal_message: impl Into<String>,
    ) -> Self {
        let mut error = Self::new(code, user_message);
        error.internal_message = Some(internal_message.into());
        error
    }

    /// Create a storage failure from an underlying I/O error.
    pub fn storage(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::with_internal(
            ErrorCode::StorageFailed,
            "A storage I/O error occurred",
            operation.into(),
        )
        .with_source(source)
    }

    /// Create a malformed-log error for an unparsable event record.
    pub fn malformed_log(path: impl fmt::Display, line: usize, source: serde_json::Error) -> Self {
        Self::with_internal(
            ErrorCode::MalformedLog,
            "Event log exists but could not be parsed",
            format!("{path}: invalid record at line {line}"),
        )
        .with_source(source)
    }

    /// Create a malformed-snapshot error for an unparsable snapshot file.
    pub fn malformed_snapshot(path: impl fmt::Display, source: serde_json::Error) -> Self {
        Self::with_internal(
            ErrorCode::MalformedSnapshot,
            "Snapshot exists but could not be parsed",
            format!("{path}"),
        )
        .with_source(source)
    }

    /// Create an invalid aggregate id error.
    pub fn invalid_aggregate_id(aggregate_id: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::InvalidAggregateId,
            format!("Invalid aggregate id: {aggregate_id}"),
        )
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::with_internal(
            ErrorCode::InternalFailure,
            "An internal error occurred",
            message,
        )
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Builder Methods
    // ─────────────────────────────────────────────────────────────────────────

    /// Add a source error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Add internal message.
    pub fn with_internal_message(mut self, message: impl Into<String>) -> Self {
        self.internal_message = Some(message.into());
        self
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Get the user-friendly message.
    pub fn user_message(&self) -> &str {
        &self.user_message
    }

    /// Get the internal message (if any).
    pub fn internal_message(&self) -> Option<&str> {
        self.internal_message.as_deref()
    }

    /// Get the error severity.
    pub fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::from_code(&self.code)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Logging
    // ─────────────────────────────────────────────────────────────────────────

    /// Log this error with appropriate severity.
    pub fn log(&self) {
        let code = self.code.to_string();
        let category = self.code.category();

        match self.severity() {
            ErrorSeverity::Critical => {
                error!(
                    error_code = %code,
                    category = category,
                    user_message = %self.user_message,
                    internal_message = ?self.internal_message,
                    source = ?self.source,
                    "CRITICAL ERROR"
                );
            }
            ErrorSeverity::High => {
                error!(
                    error_code = %code,
                    category = category,
                    user_message = %self.user_message,
                    internal_message = ?self.internal_message,
                    "High severity error"
                );
            }
            ErrorSeverity::Medium => {
                warn!(
                    error_code = %code,
                    category = category,
                    user_message = %self.user_message,
                    "Medium severity error"
                );
            }
            ErrorSeverity::Low => {
                tracing::debug!(
                    error_code = %code,
                    category = category,
                    user_message = %self.user_message,
                    "Low severity error"
                );
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Metrics
    // ─────────────────────────────────────────────────────────────────────────

    /// Record error metrics.
    fn record_metrics(&self) {
        counter!(
            "ledger_errors_total",
            "code" => self.code.to_string(),
            "category" => self.code.category().to_string(),
            "severity" => format!("{:?}", self.severity()),
        )
        .increment(1);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error Context Extension Trait
// ═══════════════════════════════════════════════════════════════════════════════

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Add context to an error.
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a specific error code.
    fn with_error_code(self, code: ErrorCode) -> Result<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| LedgerError::internal(message.into()).with_source(e))
    }

    fn with_error_code(self, code: ErrorCode) -> Result<T> {
        self.map_err(|e| LedgerError::new(code, e.to_string()).with_source(e))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// From Implementations for Common Error Types
// ═══════════════════════════════════════════════════════════════════════════════

impl From<std::io::Error> for LedgerError {
    fn from(error: std::io::Error) -> Self {
        Self::with_internal(
            ErrorCode::StorageFailed,
            "A storage I/O error occurred",
            error.to_string(),
        )
        .with_source(error)
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(error: serde_json::Error) -> Self {
        Self::with_internal(
            ErrorCode::SerializationFailed,
            "Failed to process JSON data",
            error.to_string(),
        )
        .with_source(error)
    }
}

impl From<config::ConfigError> for LedgerError {
    fn from(error: config::ConfigError) -> Self {
        Self::with_internal(
            ErrorCode::ConfigurationFailed,
            "Configuration error occurred",
            error.to_string(),
        )
        .with_source(error)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_categories() {
        assert_eq!(ErrorCode::StorageFailed.category(), "storage");
        assert_eq!(ErrorCode::MalformedLog.category(), "serialization");
        assert_eq!(ErrorCode::InvalidAggregateId.category(), "validation");
        assert_eq!(ErrorCode::ConfigurationFailed.category(), "configuration");
        assert_eq!(ErrorCode::InternalFailure.category(), "internal");
    }

    #[test]
    fn test_error_severity() {
        assert_eq!(
            ErrorSeverity::from_code(&ErrorCode::InvalidMigration),
            ErrorSeverity::Low
        );
        assert_eq!(
            ErrorSeverity::from_code(&ErrorCode::StorageFailed),
            ErrorSeverity::High
        );
        assert_eq!(
            ErrorSeverity::from_code(&ErrorCode::MalformedLog),
            ErrorSeverity::Critical
        );
    }

    #[test]
    fn test_error_display() {
        let error = LedgerError::with_internal(
            ErrorCode::StorageFailed,
            "A storage I/O error occurred",
            "write events.jsonl",
        );

        let display = format!("{}", error);
        assert!(display.contains("StorageFailed"));
        assert!(display.contains("storage I/O error"));
        assert!(display.contains("events.jsonl"));
    }

    #[test]
    fn test_error_context() {
        let result: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::Other, "disk gone"));
        let error = result.context("Failed to append event").unwrap_err();

        assert_eq!(error.code(), ErrorCode::InternalFailure);
        assert_eq!(error.internal_message(), Some("Failed to append event"));
    }

    #[test]
    fn test_from_io_error() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let error = LedgerError::from(io_error);
        assert_eq!(error.code(), ErrorCode::StorageFailed);
    }

    #[test]
    fn test_invalid_aggregate_id_message() {
        let error = LedgerError::invalid_aggregate_id("../etc/passwd");
        assert_eq!(error.code(), ErrorCode::InvalidAggregateId);
        assert!(error.user_message().contains("../etc/passwd"));
    }
}
