//! Request validation helpers.
//!
//! Domain rules that cannot be expressed by deserialization alone.
//! Every helper returns `AppError::InvalidArgument` with a field-specific
//! message on failure.

use std::sync::LazyLock;

use regex::Regex;

use crate::AppError;

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 6;
/// Maximum email length.
pub const MAX_EMAIL_LENGTH: usize = 255;
/// Maximum display identifier length.
pub const MAX_IDENTIFIER_LENGTH: usize = 50;
/// Inclusive bounds for post priority.
pub const PRIORITY_RANGE: std::ops::RangeInclusive<i32> = 0..=100;
/// Inclusive bounds for background music volume.
pub const VOLUME_RANGE: std::ops::RangeInclusive<i32> = 0..=100;

static IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("valid identifier regex"));
static MAC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9A-Fa-f]{2}:){5}[0-9A-Fa-f]{2}$").expect("valid MAC regex")
});
static SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9-]+$").expect("valid slug regex"));
static COLOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#[0-9A-Fa-f]{6}$").expect("valid color regex"));

/// Reject empty or whitespace-only required strings.
pub fn require_non_empty(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::invalid(format!("{field} is required")));
    }
    Ok(())
}

/// Validate a display identifier (slug of letters, digits, `-` and `_`).
pub fn validate_identifier(identifier: &str) -> Result<(), AppError> {
    if identifier.len() > MAX_IDENTIFIER_LENGTH || !IDENTIFIER_RE.is_match(identifier) {
        return Err(AppError::invalid(
            "identifier may only contain letters, digits, '-' and '_' (max 50)",
        ));
    }
    Ok(())
}

/// Validate a colon-separated MAC address.
pub fn validate_mac_address(mac: &str) -> Result<(), AppError> {
    if !MAC_RE.is_match(mac) {
        return Err(AppError::invalid("Invalid MAC address format"));
    }
    Ok(())
}

/// Validate an organization slug.
pub fn validate_slug(slug: &str) -> Result<(), AppError> {
    if !SLUG_RE.is_match(slug) {
        return Err(AppError::invalid(
            "slug may only contain lowercase letters, digits and '-'",
        ));
    }
    Ok(())
}

/// Validate a `#rrggbb` color.
pub fn validate_color(color: &str) -> Result<(), AppError> {
    if !COLOR_RE.is_match(color) {
        return Err(AppError::invalid("color must be a hex value like #c41e3a"));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AppError::invalid(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Basic email shape check.
pub fn validate_email(email: &str) -> Result<(), AppError> {
    if email.len() > MAX_EMAIL_LENGTH {
        return Err(AppError::invalid(format!(
            "Email must not exceed {MAX_EMAIL_LENGTH} characters"
        )));
    }

    let Some((local, domain)) = email.split_once('@') else {
        return Err(AppError::invalid("Invalid email format"));
    };
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(AppError::invalid("Invalid email format"));
    }
    Ok(())
}

pub fn validate_priority(priority: i32) -> Result<(), AppError> {
    if !PRIORITY_RANGE.contains(&priority) {
        return Err(AppError::invalid("Priority must be between 0 and 100"));
    }
    Ok(())
}

/// Clamp a background music volume into range.
#[must_use]
pub fn clamp_volume(volume: i32) -> i32 {
    volume.clamp(*VOLUME_RANGE.start(), *VOLUME_RANGE.end())
}

/// Lowercased, trimmed email used for lookups.
#[must_use]
pub fn canonical_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_validation() {
        assert!(validate_identifier("lobby-screen_01").is_ok());
        assert!(validate_identifier("Main").is_ok());
        assert!(validate_identifier("has space").is_err());
        assert!(validate_identifier("ümlaut").is_err());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier(&"a".repeat(51)).is_err());
    }

    #[test]
    fn mac_validation() {
        assert!(validate_mac_address("AA:bb:0C:1d:22:FF").is_ok());
        assert!(validate_mac_address("AA-BB-CC-DD-EE-FF").is_err());
        assert!(validate_mac_address("AA:BB:CC:DD:EE").is_err());
    }

    #[test]
    fn slug_and_color_validation() {
        assert!(validate_slug("acme-corp").is_ok());
        assert!(validate_slug("Acme").is_err());
        assert!(validate_color("#c41e3a").is_ok());
        assert!(validate_color("red").is_err());
    }

    #[test]
    fn password_and_email_validation() {
        assert!(validate_password("secret").is_ok());
        assert!(validate_password("short").is_err());
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("user@").is_err());
        assert!(validate_email("nodomain").is_err());
    }

    #[test]
    fn priority_and_volume_bounds() {
        assert!(validate_priority(0).is_ok());
        assert!(validate_priority(100).is_ok());
        assert!(validate_priority(101).is_err());
        assert!(validate_priority(-1).is_err());
        assert_eq!(clamp_volume(150), 100);
        assert_eq!(clamp_volume(-5), 0);
        assert_eq!(clamp_volume(42), 42);
    }

    #[test]
    fn required_fields() {
        assert!(require_non_empty("name", "Lobby").is_ok());
        assert!(require_non_empty("name", "   ").is_err());
    }

    #[test]
    fn canonical_email_lowercases() {
        assert_eq!(canonical_email("  Foo@Example.COM "), "foo@example.com");
    }
}
