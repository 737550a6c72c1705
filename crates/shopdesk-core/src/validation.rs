//! # Validation Module
//!
//! Validation for identities and secrets before they are cached or sent to
//! the auth provider.
//!
//! ## Usage
//! ```rust
//! use shopdesk_core::validation::{validate_identity, validate_secret};
//!
//! validate_identity("owner@shop.test").unwrap();
//! validate_secret("correct-horse").unwrap();
//! ```

use crate::error::ValidationError;
use crate::types::CachedCredentials;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Minimum secret length accepted by the auth provider.
pub const MIN_SECRET_LEN: usize = 6;

/// Maximum secret length.
pub const MAX_SECRET_LEN: usize = 128;

/// Maximum identity length (RFC 5321 path limit).
pub const MAX_IDENTITY_LEN: usize = 254;

/// Maximum subject id length; subject ids are used as remote document ids.
pub const MAX_SUBJECT_ID_LEN: usize = 128;

/// Validates a sign-in identity (an email address).
///
/// ## Rules
/// - Must not be empty
/// - At most 254 characters
/// - Exactly one `@` with non-empty local part and domain
///
/// ```rust
/// use shopdesk_core::validation::validate_identity;
///
/// assert!(validate_identity("owner@shop.test").is_ok());
/// assert!(validate_identity("owner").is_err());
/// assert!(validate_identity("").is_err());
/// ```
pub fn validate_identity(identity: &str) -> ValidationResult<()> {
    let identity = identity.trim();

    if identity.is_empty() {
        return Err(ValidationError::Required {
            field: "identity".to_string(),
        });
    }

    if identity.len() > MAX_IDENTITY_LEN {
        return Err(ValidationError::TooLong {
            field: "identity".to_string(),
            max: MAX_IDENTITY_LEN,
        });
    }

    let mut parts = identity.split('@');
    let local = parts.next().unwrap_or_default();
    let domain = parts.next();

    match domain {
        Some(domain) if !local.is_empty() && !domain.is_empty() && parts.next().is_none() => Ok(()),
        _ => Err(ValidationError::InvalidFormat {
            field: "identity".to_string(),
            reason: "expected name@domain".to_string(),
        }),
    }
}

/// Validates a secret.
///
/// ```rust
/// use shopdesk_core::validation::validate_secret;
///
/// assert!(validate_secret("abc123").is_ok());
/// assert!(validate_secret("abc").is_err());
/// ```
pub fn validate_secret(secret: &str) -> ValidationResult<()> {
    if secret.is_empty() {
        return Err(ValidationError::Required {
            field: "secret".to_string(),
        });
    }

    if secret.chars().count() < MIN_SECRET_LEN {
        return Err(ValidationError::TooShort {
            field: "secret".to_string(),
            min: MIN_SECRET_LEN,
        });
    }

    if secret.chars().count() > MAX_SECRET_LEN {
        return Err(ValidationError::TooLong {
            field: "secret".to_string(),
            max: MAX_SECRET_LEN,
        });
    }

    Ok(())
}

/// Validates a subject id for use as a remote document id.
pub fn validate_subject_id(subject_id: &str) -> ValidationResult<()> {
    if subject_id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "subject_id".to_string(),
        });
    }

    if subject_id.len() > MAX_SUBJECT_ID_LEN {
        return Err(ValidationError::TooLong {
            field: "subject_id".to_string(),
            max: MAX_SUBJECT_ID_LEN,
        });
    }

    if subject_id.contains('/') {
        return Err(ValidationError::InvalidFormat {
            field: "subject_id".to_string(),
            reason: "must not contain '/'".to_string(),
        });
    }

    Ok(())
}

/// Validates both halves of a credential pair.
pub fn validate_credentials(credentials: &CachedCredentials) -> ValidationResult<()> {
    validate_identity(&credentials.identity)?;
    validate_secret(&credentials.secret)
}
