//! Short code generation and validation utilities.
//!
//! Provides cryptographically secure random code generation and validation
//! for custom user-provided codes.

use crate::error::AppError;
use base64::Engine as _;
use serde_json::json;

/// Length of random bytes before base64 encoding.
const CODE_LENGTH_BYTES: usize = 6;

const MIN_CODE_LEN: usize = 4;
const MAX_CODE_LEN: usize = 32;

/// Codes that collide with routes or brand names.
pub const RESERVED_CODES: &[&str] = &["url", "user", "system", "shorte.live", "health", "api"];

/// Generates a random 8-character short code.
///
/// Uses `getrandom` for entropy and encodes the result as URL-safe base64
/// without padding.
///
/// # Errors
///
/// Returns [`AppError::Store`] if the system random number generator fails.
pub fn generate_code() -> Result<String, AppError> {
    let mut buffer = [0u8; CODE_LENGTH_BYTES];

    getrandom::fill(&mut buffer).map_err(|e| {
        AppError::store(
            "Failed to generate random bytes",
            json!({ "reason": e.to_string() }),
        )
    })?;

    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buffer))
}

/// Returns true if `code` names a reserved path.
pub fn is_reserved(code: &str) -> bool {
    RESERVED_CODES
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(code))
}

/// Validates a user-provided custom short code.
///
/// # Rules
///
/// - Length: 4-32 characters
/// - Allowed characters: ASCII letters, digits, `-` and `_`
/// - Cannot start or end with a hyphen
/// - Cannot be a reserved code
///
/// # Errors
///
/// Returns [`AppError::Validation`] if any validation rule is violated.
pub fn validate_custom_code(code: &str) -> Result<(), AppError> {
    if is_reserved(code) {
        return Err(AppError::bad_request(
            "This code is reserved",
            json!({ "code": code }),
        ));
    }

    if code.len() < MIN_CODE_LEN || code.len() > MAX_CODE_LEN {
        return Err(AppError::bad_request(
            format!(
                "Custom code must be {}-{} characters",
                MIN_CODE_LEN, MAX_CODE_LEN
            ),
            json!({ "provided_length": code.len() }),
        ));
    }

    if !code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(AppError::bad_request(
            "Custom code can only contain letters, digits, hyphens and underscores",
            json!({ "code": code }),
        ));
    }

    if code.starts_with('-') || code.ends_with('-') {
        return Err(AppError::bad_request(
            "Custom code cannot start or end with a hyphen",
            json!({ "code": code }),
        ));
    }

    Ok(())
}
