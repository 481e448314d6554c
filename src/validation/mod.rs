use sqlx::types::BigDecimal;
use std::fmt;

pub const NAME_MAX_LEN: usize = 120;
pub const PHONE_MIN_DIGITS: usize = 8;
pub const PHONE_MAX_DIGITS: usize = 15;
pub const ADDRESS_MAX_LEN: usize = 500;
pub const REASON_MAX_LEN: usize = 500;
pub const COMMENT_MAX_LEN: usize = 1000;
pub const PAYMENT_METHOD_MAX_LEN: usize = 40;
pub const MAX_SEARCH_RADIUS_METERS: f64 = 100_000.0;
pub const MAX_EXTENSION_MINUTES: i32 = 240;
pub const ALLOWED_PAYMENT_METHODS: &[&str] = &["mobile_money", "card", "cash", "bank_transfer"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

pub fn sanitize_string(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !ch.is_control())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_max_len(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.chars().count() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

pub fn validate_enum(field: &'static str, value: &str, allowed: &[&str]) -> ValidationResult {
    if allowed.iter().all(|candidate| value != *candidate) {
        return Err(ValidationError::new(
            field,
            format!("must be one of: {}", allowed.join(", ")),
        ));
    }

    Ok(())
}

/// Required, trimmed, bounded free text.
pub fn clean_text(field: &'static str, value: &str, max_len: usize) -> Result<String, ValidationError> {
    let value = sanitize_string(value);
    validate_required(field, &value)?;
    validate_max_len(field, &value, max_len)?;
    Ok(value)
}

/// Accepts an optional leading '+' and common separators; returns the compact form.
pub fn normalize_phone(phone: &str) -> Result<String, ValidationError> {
    let trimmed = phone.trim();
    validate_required("client_phone", trimmed)?;

    let (prefix, rest) = match trimmed.strip_prefix('+') {
        Some(rest) => ("+", rest),
        None => ("", trimmed),
    };

    let mut digits = String::with_capacity(rest.len());
    for ch in rest.chars() {
        match ch {
            '0'..='9' => digits.push(ch),
            ' ' | '-' | '.' | '(' | ')' => {}
            _ => {
                return Err(ValidationError::new(
                    "client_phone",
                    "must contain only digits",
                ))
            }
        }
    }

    if !(PHONE_MIN_DIGITS..=PHONE_MAX_DIGITS).contains(&digits.len()) {
        return Err(ValidationError::new(
            "client_phone",
            format!(
                "must contain between {} and {} digits",
                PHONE_MIN_DIGITS, PHONE_MAX_DIGITS
            ),
        ));
    }

    Ok(format!("{}{}", prefix, digits))
}

pub fn validate_positive_amount(amount: &BigDecimal) -> ValidationResult {
    if amount <= &BigDecimal::from(0) {
        return Err(ValidationError::new("amount", "must be greater than zero"));
    }

    Ok(())
}

pub fn validate_radius(radius_meters: f64) -> ValidationResult {
    if !(radius_meters > 0.0 && radius_meters <= MAX_SEARCH_RADIUS_METERS) {
        return Err(ValidationError::new(
            "radius",
            format!("must be greater than 0 and at most {}", MAX_SEARCH_RADIUS_METERS),
        ));
    }

    Ok(())
}

pub fn validate_extension_minutes(minutes: i32) -> ValidationResult {
    if !(1..=MAX_EXTENSION_MINUTES).contains(&minutes) {
        return Err(ValidationError::new(
            "minutes",
            format!("must be between 1 and {}", MAX_EXTENSION_MINUTES),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn validates_required_field() {
        assert!(validate_required("field", "value").is_ok());
        assert!(validate_required("field", "   ").is_err());
    }

    #[test]
    fn validates_max_len() {
        assert!(validate_max_len("field", "abc", 3).is_ok());
        assert!(validate_max_len("field", "abcd", 3).is_err());
        assert!(validate_max_len("field", "été", 3).is_ok());
    }

    #[test]
    fn validates_enum_values() {
        assert!(validate_enum("method", "cash", ALLOWED_PAYMENT_METHODS).is_ok());
        assert!(validate_enum("method", "cheque", ALLOWED_PAYMENT_METHODS).is_err());
    }

    #[test]
    fn sanitizes_string() {
        assert_eq!(sanitize_string("  hello\tworld  "), "hello world");
        assert_eq!(sanitize_string("single"), "single");
        assert_eq!(sanitize_string(" \n "), "");
        assert_eq!(sanitize_string("ab\u{0000}cd\u{0007}"), "abcd");
    }

    #[test]
    fn cleans_text() {
        assert_eq!(clean_text("client_name", "  Awa   Kone ", NAME_MAX_LEN).unwrap(), "Awa Kone");
        assert!(clean_text("client_name", "\t", NAME_MAX_LEN).is_err());
    }

    #[test]
    fn normalizes_phone() {
        assert_eq!(normalize_phone("+225 07 00-00.00 00").unwrap(), "+2250700000000");
        assert_eq!(normalize_phone("0700000000").unwrap(), "0700000000");
        assert!(normalize_phone("12345").is_err());
        assert!(normalize_phone("+225 07 AB").is_err());
        assert!(normalize_phone("").is_err());
    }

    #[test]
    fn validates_positive_amount() {
        let positive = BigDecimal::from_str("1.23").expect("valid decimal");
        let zero = BigDecimal::from(0);
        let negative = BigDecimal::from(-1);

        assert!(validate_positive_amount(&positive).is_ok());
        assert!(validate_positive_amount(&zero).is_err());
        assert!(validate_positive_amount(&negative).is_err());
    }

    #[test]
    fn validates_radius() {
        assert!(validate_radius(5_000.0).is_ok());
        assert!(validate_radius(0.0).is_err());
        assert!(validate_radius(-1.0).is_err());
        assert!(validate_radius(f64::NAN).is_err());
        assert!(validate_radius(100_001.0).is_err());
    }

    #[test]
    fn validates_extension_minutes() {
        assert!(validate_extension_minutes(30).is_ok());
        assert!(validate_extension_minutes(0).is_err());
        assert!(validate_extension_minutes(241).is_err());
    }
}
