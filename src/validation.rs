//! Input validation for rotation request fields.

use crate::{KeysweepError, Result};

/// Maximum allowed length for identifier fields.
///
/// API Gateway key ids and usage plan ids are short; DynamoDB partition keys
/// are bounded well above this. Anything longer is a malformed request.
const MAX_FIELD_LENGTH: usize = 255;

/// Validates a rotation request field.
///
/// Checks for:
/// - Empty values (a missing field deserializes as empty on some dispatch
///   channels)
/// - Excessive length (>255 characters)
/// - Null bytes
/// - Control characters
///
/// # Errors
///
/// Returns [`KeysweepError::InvalidRequest`] naming the offending field.
///
/// # Example
///
/// ```
/// use keysweep::validation::validate_field;
///
/// assert!(validate_field("itemID", "7f9c2ba4-item").is_ok());
/// assert!(validate_field("itemID", "").is_err());
/// assert!(validate_field("usagePlanID", "plan\0id").is_err());
/// ```
pub fn validate_field(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(KeysweepError::InvalidRequest(format!(
            "missing required field: {}",
            field
        )));
    }

    if value.len() > MAX_FIELD_LENGTH {
        return Err(KeysweepError::InvalidRequest(format!(
            "{} exceeds maximum length of {} characters",
            field, MAX_FIELD_LENGTH
        )));
    }

    if value.contains('\0') {
        return Err(KeysweepError::InvalidRequest(format!(
            "{} contains null byte",
            field
        )));
    }

    if value.chars().any(|c| c.is_control()) {
        return Err(KeysweepError::InvalidRequest(format!(
            "{} contains control characters",
            field
        )));
    }

    Ok(())
}
