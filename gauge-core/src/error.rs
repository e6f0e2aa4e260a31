//! Error types for GAUGE operations

use thiserror::Error;

/// High-level error categorization used for retry routing.
///
/// The fetch collaborator attaches a kind to every failure it reports, so
/// retryability is a property of the error rather than of its wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    // Transient kinds
    Network,
    Timeout,
    RateLimited,
    Unavailable,
    Internal,
    Unknown,

    // Caller-side kinds, never retried
    PermissionDenied,
    Unauthorized,
    Validation,
    BadRequest,
    NotFound,

    // Local faults
    Storage,
    Serialization,
}

impl ErrorKind {
    /// Check if an operation failing with this kind may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::Network
                | ErrorKind::Timeout
                | ErrorKind::RateLimited
                | ErrorKind::Unavailable
                | ErrorKind::Internal
                | ErrorKind::Unknown
        )
    }

    /// Map an HTTP status code to an error kind.
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => ErrorKind::BadRequest,
            401 => ErrorKind::Unauthorized,
            403 => ErrorKind::PermissionDenied,
            404 => ErrorKind::NotFound,
            408 => ErrorKind::Timeout,
            422 => ErrorKind::Validation,
            429 => ErrorKind::RateLimited,
            500 => ErrorKind::Internal,
            501..=599 => ErrorKind::Unavailable,
            _ => ErrorKind::Unknown,
        }
    }

    /// Classify a bare error message.
    ///
    /// Placeholder policy for transports that report nothing but text.
    /// Prefer attaching a kind at the source.
    pub fn classify_message(message: &str) -> Self {
        let message = message.to_lowercase();

        if message.contains("permission") || message.contains("403") {
            return ErrorKind::PermissionDenied;
        }
        if message.contains("unauthorized") {
            return ErrorKind::Unauthorized;
        }
        if message.contains("invalid") || message.contains("validation") {
            return ErrorKind::Validation;
        }
        if message.contains("bad request") || message.contains("400") {
            return ErrorKind::BadRequest;
        }
        if message.contains("not found") || message.contains("404") {
            return ErrorKind::NotFound;
        }
        if message.contains("timeout") || message.contains("timed out") {
            return ErrorKind::Timeout;
        }
        if message.contains("rate limit") || message.contains("too many requests") {
            return ErrorKind::RateLimited;
        }
        if message.contains("network") || message.contains("fetch") {
            return ErrorKind::Network;
        }
        ErrorKind::Unknown
    }
}

/// Errors that can be asked whether a retry is worthwhile.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Date-range and input validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Start date is invalid")]
    InvalidStartDate,

    #[error("End date is invalid")]
    InvalidEndDate,

    #[error("Start date must be before or equal to end date")]
    StartAfterEnd,

    #[error("Start date cannot be more than one year in the future")]
    StartTooFarInFuture,

    #[error("Date range cannot exceed one year")]
    RangeTooLarge,

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Snapshot storage errors. Always recovered where they occur.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Storage unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Storage quota exceeded for {key}")]
    QuotaExceeded { key: String },

    #[error("IO error on {key}: {reason}")]
    Io { key: String, reason: String },

    #[error("Corrupted snapshot under {key}: {reason}")]
    Corrupted { key: String, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing configuration file path (use --config or GAUGE_CONFIG)")]
    MissingConfigPath,

    #[error("Failed to read config file: {reason}")]
    Io { reason: String },

    #[error("Failed to parse config TOML: {reason}")]
    Parse { reason: String },

    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Master error type for all GAUGE errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GaugeError {
    /// Failure reported by an external operation. Displays the original
    /// message unchanged so callers can branch on it.
    #[error("{message}")]
    Operation { kind: ErrorKind, message: String },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl GaugeError {
    /// Create an operation error with an explicit kind.
    pub fn operation(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Operation {
            kind,
            message: message.into(),
        }
    }

    /// Create an operation error, inferring the kind from its message.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::Operation {
            kind: ErrorKind::classify_message(&message),
            message,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::operation(ErrorKind::Network, message)
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            GaugeError::Operation { kind, .. } => *kind,
            GaugeError::Validation(_) => ErrorKind::Validation,
            GaugeError::Storage(_) => ErrorKind::Storage,
            GaugeError::Config(_) => ErrorKind::Validation,
            GaugeError::Serialization(_) => ErrorKind::Serialization,
        }
    }

    /// Short message suitable for showing to a dashboard user.
    pub fn user_message(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Network | ErrorKind::Unavailable => {
                "Unable to connect to the server. Please check your internet connection."
            }
            ErrorKind::PermissionDenied | ErrorKind::Unauthorized => {
                "You do not have permission to perform this action."
            }
            ErrorKind::Timeout => "The request took too long. Please try again.",
            ErrorKind::RateLimited => "Too many requests. Please wait a moment and try again.",
            ErrorKind::Storage => "Database error. Please try again later.",
            _ => "An unexpected error occurred. Please try again.",
        }
    }
}

impl Retryable for GaugeError {
    fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

impl From<serde_json::Error> for GaugeError {
    fn from(err: serde_json::Error) -> Self {
        GaugeError::Serialization(err.to_string())
    }
}

/// Result type alias for GAUGE operations.
pub type GaugeResult<T> = Result<T, GaugeError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_error_displays_original_message() {
        let err = GaugeError::operation(ErrorKind::Network, "Failed to fetch overview");
        assert_eq!(err.to_string(), "Failed to fetch overview");
    }

    #[test]
    fn test_validation_error_display_range_too_large() {
        let err = GaugeError::from(ValidationError::RangeTooLarge);
        let msg = format!("{}", err);
        assert!(msg.contains("exceed one year"));
    }

    #[test]
    fn test_retryable_kinds() {
        assert!(ErrorKind::Network.is_retryable());
        assert!(ErrorKind::Timeout.is_retryable());
        assert!(ErrorKind::RateLimited.is_retryable());
        assert!(ErrorKind::Unknown.is_retryable());
        assert!(!ErrorKind::PermissionDenied.is_retryable());
        assert!(!ErrorKind::Unauthorized.is_retryable());
        assert!(!ErrorKind::Validation.is_retryable());
        assert!(!ErrorKind::BadRequest.is_retryable());
        assert!(!ErrorKind::NotFound.is_retryable());
    }

    #[test]
    fn test_user_message_by_kind() {
        assert!(GaugeError::network("socket closed")
            .user_message()
            .contains("Unable to connect"));
        assert!(GaugeError::operation(ErrorKind::Unauthorized, "401")
            .user_message()
            .contains("permission"));
        assert!(GaugeError::operation(ErrorKind::RateLimited, "slow down")
            .user_message()
            .starts_with("Too many requests"));
        assert!(GaugeError::Serialization("bad".into())
            .user_message()
            .starts_with("An unexpected error"));
    }

    #[test]
    fn test_classify_message() {
        assert_eq!(
            ErrorKind::classify_message("Permission denied"),
            ErrorKind::PermissionDenied
        );
        assert_eq!(
            ErrorKind::classify_message("Request failed with 404"),
            ErrorKind::NotFound
        );
        assert_eq!(
            ErrorKind::classify_message("Invalid month parameter"),
            ErrorKind::Validation
        );
        assert_eq!(
            ErrorKind::classify_message("network unreachable"),
            ErrorKind::Network
        );
        assert_eq!(ErrorKind::classify_message("boom"), ErrorKind::Unknown);
    }

    #[test]
    fn test_from_status() {
        assert_eq!(ErrorKind::from_status(400), ErrorKind::BadRequest);
        assert_eq!(ErrorKind::from_status(401), ErrorKind::Unauthorized);
        assert_eq!(ErrorKind::from_status(403), ErrorKind::PermissionDenied);
        assert_eq!(ErrorKind::from_status(404), ErrorKind::NotFound);
        assert_eq!(ErrorKind::from_status(429), ErrorKind::RateLimited);
        assert_eq!(ErrorKind::from_status(503), ErrorKind::Unavailable);
    }

    #[test]
    fn test_gauge_error_kind_and_retryable() {
        let err = GaugeError::from_message("permission denied");
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
        assert!(!err.is_retryable());

        let err = GaugeError::network("connection reset");
        assert!(err.is_retryable());

        let err = GaugeError::from(StorageError::QuotaExceeded {
            key: "analytics-query-cache".to_string(),
        });
        assert_eq!(err.kind(), ErrorKind::Storage);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::InvalidValue {
            field: "cache.max_entries".to_string(),
            reason: "must be > 0".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("cache.max_entries"));
        assert!(msg.contains("must be > 0"));
    }
}
