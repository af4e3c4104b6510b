//! Common validation utilities.

use uuid::Uuid;
use validator::ValidationError;

lazy_static::lazy_static! {
    /// Public invitation code shape: prefix, two-digit year, dash, six characters.
    pub static ref INVITATION_CODE_REGEX: regex::Regex =
        regex::Regex::new(r"^[A-Z0-9]{1,4}\d{2}-[A-Z0-9]{6}$").unwrap();
}

/// Validates the shape of an invitation code. Codes are case-sensitive.
pub fn validate_invitation_code(code: &str) -> Result<(), ValidationError> {
    if INVITATION_CODE_REGEX.is_match(code) {
        Ok(())
    } else {
        let mut err = ValidationError::new("invitation_code_format");
        err.message = Some("Invalid invitation code format. Expected e.g. CU25-AB3K7M".into());
        Err(err)
    }
}

/// Validates that a string is a well-formed identifier.
pub fn validate_object_id(value: &str) -> Result<(), ValidationError> {
    parse_object_id(value).map(|_| ()).ok_or_else(|| {
        let mut err = ValidationError::new("object_id_format");
        err.message = Some("Malformed identifier".into());
        err
    })
}

/// Parses an identifier, returning `None` when it is malformed.
pub fn parse_object_id(value: &str) -> Option<Uuid> {
    Uuid::parse_str(value.trim()).ok()
}

/// Validates that a required text field is not blank.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Value must not be blank".into());
        Err(err)
    } else {
        Ok(())
    }
}
