use crate::utils::error::{RegistryError, Result};
use regex::Regex;
use std::sync::LazyLock;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern compiles")
});

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9+\-\s()]{8,20}$").expect("phone pattern compiles"));

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(RegistryError::validation(
            field_name,
            "Value cannot be empty or whitespace-only",
        ));
    }
    Ok(())
}

pub fn validate_max_length(field_name: &str, value: &str, max_chars: usize) -> Result<()> {
    if value.chars().count() > max_chars {
        return Err(RegistryError::validation(
            field_name,
            format!("Value must be at most {} characters", max_chars),
        ));
    }
    Ok(())
}

pub fn validate_email(field_name: &str, value: &str) -> Result<()> {
    validate_non_empty_string(field_name, value)?;
    validate_max_length(field_name, value, 255)?;
    if !EMAIL_RE.is_match(value) {
        return Err(RegistryError::validation(
            field_name,
            format!("'{}' is not a valid email address", value),
        ));
    }
    Ok(())
}

pub fn validate_phone(field_name: &str, value: &str) -> Result<()> {
    if !PHONE_RE.is_match(value) {
        return Err(RegistryError::validation(
            field_name,
            "Phone number must be 8-20 characters of digits, spaces, +, -, ( or )",
        ));
    }
    Ok(())
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(RegistryError::validation(field_name, "Path cannot be empty"));
    }

    if path.contains('\0') {
        return Err(RegistryError::validation(field_name, "Path contains null bytes"));
    }

    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(RegistryError::validation(
            field_name,
            format!("Value must be at least {}", min_value),
        ));
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(RegistryError::validation(
            field_name,
            format!("Value {} must be between {} and {}", value, min, max),
        ));
    }
    Ok(())
}
