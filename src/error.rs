//! Error types for keysweep operations.

use thiserror::Error;

/// Result type alias using [`KeysweepError`].
pub type Result<T> = std::result::Result<T, KeysweepError>;

/// Errors that can occur during rotation and sweep operations.
///
/// All errors implement `std::error::Error` and can be chained with `source()`.
/// Transient infrastructure errors are distinguished from permanent ones via
/// [`is_transient()`](KeysweepError::is_transient), which drives retry decisions.
#[derive(Debug, Error)]
pub enum KeysweepError {
    /// Rotation request is missing or has malformed fields.
    ///
    /// Never retried; surfaced to the dispatcher as a hard error for that
    /// entry only.
    #[error("invalid rotation request: {0}")]
    InvalidRequest(String),

    /// Registry record does not exist for the given item.
    #[error("record not found: {0}")]
    RecordNotFound(String),

    /// Registry record exists but could not be decoded.
    #[error("malformed record {item}: {reason}")]
    MalformedRecord {
        /// Item identifier (primary key)
        item: String,
        /// What failed to decode
        reason: String,
    },

    /// Remote service rejected the call due to rate limiting.
    #[error("throttled: {0}")]
    Throttled(String),

    /// Remote service is temporarily unreachable.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// Call did not complete within the configured deadline.
    #[error("operation timed out: {0}")]
    Timeout(String),

    /// Operation failed with context.
    #[error("{component}: {operation} {item}: {source}")]
    Operation {
        /// Component name (registry or issuer implementation)
        component: String,
        /// Operation name (scan, update, create, bind, revoke)
        operation: String,
        /// Item or key identifier
        item: String,
        /// Underlying error
        #[source]
        source: Box<KeysweepError>,
    },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other error (catch-all).
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl KeysweepError {
    /// Creates an operation error with context.
    ///
    /// This wraps an underlying error with information about which component,
    /// operation, and item caused the failure.
    ///
    /// # Example
    ///
    /// ```
    /// use keysweep::KeysweepError;
    ///
    /// let err = KeysweepError::RecordNotFound("item-1".to_string());
    /// let wrapped = KeysweepError::operation("dynamodb", "update", "item-1", err);
    ///
    /// assert_eq!(
    ///     wrapped.to_string(),
    ///     "dynamodb: update item-1: record not found: item-1"
    /// );
    /// ```
    pub fn operation(
        component: impl Into<String>,
        operation: impl Into<String>,
        item: impl Into<String>,
        err: KeysweepError,
    ) -> Self {
        Self::Operation {
            component: component.into(),
            operation: operation.into(),
            item: item.into(),
            source: Box::new(err),
        }
    }

    /// Returns true if the error is transient and the call may be retried.
    ///
    /// Transient errors are throttling, temporary unavailability, and
    /// timeouts. Validation errors and registry data problems are permanent.
    /// Context wrappers defer to the wrapped error.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Throttled(_) | Self::Unavailable(_) | Self::Timeout(_) => true,
            Self::Operation { source, .. } => source.is_transient(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_error_display() {
        let err = KeysweepError::RecordNotFound("item-42".to_string());
        assert_eq!(err.to_string(), "record not found: item-42");
    }

    #[test]
    fn test_operation_error() {
        let inner = KeysweepError::Throttled("rate exceeded".to_string());
        let err = KeysweepError::operation("apigateway", "create", "item-1", inner);

        let error_string = err.to_string();
        assert!(error_string.contains("apigateway"));
        assert!(error_string.contains("create"));
        assert!(error_string.contains("item-1"));
    }

    #[test]
    fn test_error_source_chain() {
        let inner = KeysweepError::Unavailable("connection refused".to_string());
        let outer = KeysweepError::operation("dynamodb", "scan", "-", inner);

        assert!(outer.source().is_some());
    }

    #[test]
    fn test_transient_classification() {
        assert!(KeysweepError::Throttled("x".into()).is_transient());
        assert!(KeysweepError::Unavailable("x".into()).is_transient());
        assert!(KeysweepError::Timeout("x".into()).is_transient());

        assert!(!KeysweepError::InvalidRequest("x".into()).is_transient());
        assert!(!KeysweepError::RecordNotFound("x".into()).is_transient());
    }

    #[test]
    fn test_transient_classification_through_wrapper() {
        let inner = KeysweepError::Timeout("deadline".to_string());
        let wrapped = KeysweepError::operation("dynamodb", "update", "item-1", inner);
        assert!(wrapped.is_transient());

        let inner = KeysweepError::RecordNotFound("item-1".to_string());
        let wrapped = KeysweepError::operation("dynamodb", "update", "item-1", inner);
        assert!(!wrapped.is_transient());
    }
}
