//! Field-level validation rules shared by the entity models.

use warden_core::FieldViolations;

/// Maximum length of role and action names.
pub const NAME_MAX: usize = 63;
/// Maximum length of a username.
pub const USERNAME_MAX: usize = 63;
pub const USERNAME_MIN: usize = 3;
pub const FULL_NAME_MAX: usize = 128;
pub const EMAIL_MAX: usize = 254;
pub const DESCRIPTION_MAX: usize = 255;
pub const PASSWORD_MIN: usize = 8;
pub const PASSWORD_MAX: usize = 128;

/// Role/action name: non-empty, no surrounding whitespace, no control chars.
pub fn name(v: &mut FieldViolations, field: &str, value: &str) {
    if value.trim().is_empty() {
        v.add(field, "is required");
    } else if value.trim() != value {
        v.add(field, "must not start or end with whitespace");
    } else if value.chars().count() > NAME_MAX {
        v.add(field, format!("must be at most {NAME_MAX} characters"));
    } else if value.chars().any(char::is_control) {
        v.add(field, "must not contain control characters");
    }
}

pub fn username(v: &mut FieldViolations, value: &str) {
    let len = value.chars().count();
    if len < USERNAME_MIN || len > USERNAME_MAX {
        v.add(
            "username",
            format!("must be between {USERNAME_MIN} and {USERNAME_MAX} characters"),
        );
    } else if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        v.add("username", "may only contain letters, digits, '.', '_' and '-'");
    }
}

pub fn email(v: &mut FieldViolations, value: &str) {
    let Some((local, domain)) = value.split_once('@') else {
        v.add("email", "must be a valid email address");
        return;
    };
    if local.is_empty() || domain.is_empty() || !domain.contains('.') || value.contains(' ') {
        v.add("email", "must be a valid email address");
    } else if value.len() > EMAIL_MAX {
        v.add("email", format!("must be at most {EMAIL_MAX} characters"));
    }
}

pub fn full_name(v: &mut FieldViolations, value: &str) {
    if value.trim().is_empty() {
        v.add("full_name", "is required");
    } else if value.chars().count() > FULL_NAME_MAX {
        v.add("full_name", format!("must be at most {FULL_NAME_MAX} characters"));
    }
}

pub fn password(v: &mut FieldViolations, value: &str) {
    let len = value.chars().count();
    if len < PASSWORD_MIN || len > PASSWORD_MAX {
        v.add(
            "password",
            format!("must be between {PASSWORD_MIN} and {PASSWORD_MAX} characters"),
        );
    }
}

pub fn description(v: &mut FieldViolations, value: &str) {
    if value.chars().count() > DESCRIPTION_MAX {
        v.add("description", format!("must be at most {DESCRIPTION_MAX} characters"));
    }
}
