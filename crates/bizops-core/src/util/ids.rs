//! Key normalization utilities.
//!
//! Emails and role names are unique case-insensitively. These helpers
//! produce the canonical lookup key for each so every index agrees.

use crate::{Error, Result};

/// Normalize an email address to its canonical, case-insensitive form.
///
/// Trims surrounding whitespace and lowercases the address. The result must
/// contain exactly one `@` with a non-empty local part and domain.
///
/// # Examples
///
/// ```
/// use bizops_core::util::ids::normalize_email;
///
/// assert_eq!(normalize_email("  Alice@Example.COM ").unwrap(), "alice@example.com");
/// assert!(normalize_email("not-an-email").is_err());
/// ```
pub fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    if email.is_empty() {
        return Err(Error::validation_field("email", "must not be empty"));
    }
    if email.chars().any(char::is_whitespace) {
        return Err(Error::validation_field("email", "must not contain whitespace"));
    }
    match email.split_once('@') {
        Some((local, domain))
            if !local.is_empty() && !domain.is_empty() && !domain.contains('@') =>
        {
            Ok(email)
        }
        _ => Err(Error::validation_field(
            "email",
            format!("'{email}' is not a valid address"),
        )),
    }
}

/// Compute the case-insensitive lookup key for a display name such as a
/// role name.
///
/// # Examples
///
/// ```
/// use bizops_core::util::ids::name_key;
///
/// assert_eq!(name_key("  Sales "), "sales");
/// assert_eq!(name_key("ADMIN"), "admin");
/// ```
pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Whether `segment` is a valid permission-name segment: a lowercase ASCII
/// letter followed by lowercase letters, digits, `_` or `-`.
pub fn is_segment(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}
