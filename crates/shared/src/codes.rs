//! Invitation code and account credential generation.
//!
//! Codes are meant to be typed by people, so the random portion is drawn from
//! an alphabet without the glyphs that are easy to confuse (0/O, 1/I).

use rand::Rng;
use thiserror::Error;
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

use crate::password::generate_password;

/// Alphabet for the random portion of codes. Avoids 0, O, 1 and I.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Alphabet for email suffixes (lowercase, same exclusions plus `l`).
const SUFFIX_ALPHABET: &[u8] = b"abcdefghjkmnpqrstuvwxyz23456789";

/// Length of the random segment of an invitation code.
pub const CODE_RANDOM_LEN: usize = 6;

/// Maximum length of an invitation code prefix.
pub const MAX_PREFIX_LEN: usize = 4;

const EMAIL_SUFFIX_LEN: usize = 5;
const STUDENT_CODE_RANDOM_LEN: usize = 6;

/// Errors raised by code generation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodeError {
    #[error("Invalid code prefix: {0}")]
    InvalidPrefix(String),

    #[error("Could not generate a unique code after {0} attempts")]
    RetryBudgetExhausted(u32),
}

/// Credentials produced for a new account.
///
/// The plaintext password is only meant to travel to the confirmation email;
/// the account itself stores a hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountCredentials {
    pub email: String,
    pub password: String,
    pub code: String,
    /// True when the email was synthesized rather than supplied by the submitter.
    pub email_generated: bool,
}

/// Settings that shape generated credentials.
#[derive(Debug, Clone)]
pub struct CredentialPolicy {
    pub email_domain: String,
    pub password_length: usize,
    pub year_hint: i32,
}

/// Draws `len` characters from `alphabet`.
fn random_segment(alphabet: &[u8], len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| alphabet[rng.gen_range(0..alphabet.len())] as char)
        .collect()
}

/// Two-digit year suffix used in codes.
fn two_digit_year(year_hint: i32) -> String {
    format!("{:02}", year_hint.rem_euclid(100))
}

/// Checks that a prefix is 1-4 uppercase ASCII letters or digits.
pub fn validate_prefix(prefix: &str) -> Result<(), CodeError> {
    let valid = !prefix.is_empty()
        && prefix.len() <= MAX_PREFIX_LEN
        && prefix
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(CodeError::InvalidPrefix(prefix.to_string()))
    }
}

/// Generates an invitation code in `PREFIX + YY + '-' + XXXXXX` format.
///
/// Uniqueness is not checked here; callers must check against the store and
/// retry with a fresh code on collision.
pub fn generate_invitation_code(prefix: &str, year_hint: i32) -> Result<String, CodeError> {
    validate_prefix(prefix)?;
    Ok(format!(
        "{}{}-{}",
        prefix,
        two_digit_year(year_hint),
        random_segment(CODE_ALPHABET, CODE_RANDOM_LEN)
    ))
}

/// Generates a student code such as `S25-7KQ2ZB`.
pub fn generate_student_code(year_hint: i32) -> String {
    format!(
        "S{}-{}",
        two_digit_year(year_hint),
        random_segment(CODE_ALPHABET, STUDENT_CODE_RANDOM_LEN)
    )
}

/// Lowercases, strips accents and drops everything that is not an ASCII letter or digit.
///
/// `"José María"` becomes `"josemaria"`.
pub fn normalize_name_part(value: &str) -> String {
    value
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// Builds an email from name parts plus a random suffix, e.g. `ana.perez.k7m2q@school.test`.
pub fn synthesize_email(first_name: &str, last_name: &str, domain: &str) -> String {
    let first = normalize_name_part(first_name);
    let last = normalize_name_part(last_name);
    let local = match (first.is_empty(), last.is_empty()) {
        (false, false) => format!("{}.{}", first, last),
        (false, true) => first,
        (true, false) => last,
        (true, true) => "user".to_string(),
    };
    format!(
        "{}.{}@{}",
        local,
        random_segment(SUFFIX_ALPHABET, EMAIL_SUFFIX_LEN),
        domain
    )
}

/// Produces credentials for a new account.
///
/// A submitted email or code is reused as-is; anything missing is generated.
/// The password is always freshly generated.
pub fn generate_account_credentials(
    first_name: &str,
    last_name: &str,
    existing_email: Option<&str>,
    existing_code: Option<&str>,
    policy: &CredentialPolicy,
) -> AccountCredentials {
    let supplied_email = existing_email
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .map(str::to_lowercase);
    let email_generated = supplied_email.is_none();
    let email = supplied_email
        .unwrap_or_else(|| synthesize_email(first_name, last_name, &policy.email_domain));

    let code = existing_code
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| generate_student_code(policy.year_hint));

    AccountCredentials {
        email,
        password: generate_password(policy.password_length),
        code,
        email_generated,
    }
}
