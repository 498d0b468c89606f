use bigdecimal::BigDecimal;
use std::fmt;
use std::str::FromStr;

pub const AMOUNT_INPUT_MAX_LEN: usize = 64;
pub const ALLOWED_CURRENCIES: &[&str] = &["BTC", "USD"];
pub const ALLOWED_COMMAND_KINDS: &[&str] = &["deposit", "withdrawal"];

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
    if value.len() > max_len {
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

pub fn validate_positive_amount(amount: &BigDecimal) -> ValidationResult {
    if amount <= &BigDecimal::from(0) {
        return Err(ValidationError::new("amount", "must be greater than zero"));
    }

    Ok(())
}

/// Parse a caller-supplied amount string into a strictly positive decimal.
/// Rejects non-numeric, zero, and negative input.
pub fn parse_amount(raw: &str) -> Result<BigDecimal, ValidationError> {
    let raw = sanitize_string(raw);
    validate_required("amount", &raw)?;
    validate_max_len("amount", &raw, AMOUNT_INPUT_MAX_LEN)?;

    let amount = BigDecimal::from_str(&raw)
        .map_err(|_| ValidationError::new("amount", format!("'{}' is not a number", raw)))?;

    validate_positive_amount(&amount)?;

    Ok(amount)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_required_field() {
        assert!(validate_required("field", "value").is_ok());
        assert!(validate_required("field", "   ").is_err());
    }

    #[test]
    fn validates_max_len() {
        assert!(validate_max_len("field", "abc", 3).is_ok());
        assert!(validate_max_len("field", "abcd", 3).is_err());
    }

    #[test]
    fn validates_enum_values() {
        assert!(validate_enum("currency", "BTC", ALLOWED_CURRENCIES).is_ok());
        assert!(validate_enum("currency", "EUR", ALLOWED_CURRENCIES).is_err());
        assert!(validate_enum("kind", "deposit", ALLOWED_COMMAND_KINDS).is_ok());
        assert!(validate_enum("kind", "trade", ALLOWED_COMMAND_KINDS).is_err());
    }

    #[test]
    fn sanitizes_string() {
        assert_eq!(sanitize_string("  1.5 "), "1.5");
        assert_eq!(sanitize_string("single"), "single");
        assert_eq!(sanitize_string(" \n "), "");
        assert_eq!(sanitize_string("ab\u{0000}cd\u{0007}"), "abcd");
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
    fn parses_valid_amounts() {
        assert_eq!(parse_amount("0.5").unwrap(), BigDecimal::from_str("0.5").unwrap());
        assert_eq!(parse_amount(" 100.50 ").unwrap(), BigDecimal::from_str("100.50").unwrap());
    }

    #[test]
    fn rejects_bad_amounts() {
        assert!(parse_amount("").is_err());
        assert!(parse_amount("abc").is_err());
        assert!(parse_amount("0").is_err());
        assert!(parse_amount("-1.5").is_err());
        assert!(parse_amount("NaN").is_err());
        assert!(parse_amount(&"9".repeat(AMOUNT_INPUT_MAX_LEN + 1)).is_err());
    }
}
