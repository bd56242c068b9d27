use sqlx::types::BigDecimal;
use std::collections::HashSet;
use std::fmt;

use crate::error::AppError;

pub const PROMO_CODE_MAX_LEN: usize = 32;
pub const ALLOWED_PAYMENT_METHODS: &[&str] = &["credit_card", "debit_card", "e_wallet", "bank_transfer"];

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

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err.to_string())
    }
}

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

/// Shape checks on the requested seat list. The seat count and range are
/// only bounded by the studio, checked once the capacity is known.
pub fn validate_seat_selection(seat_numbers: &[i32]) -> ValidationResult {
    if seat_numbers.is_empty() {
        return Err(ValidationError::new("seat_numbers", "must not be empty"));
    }

    let mut seen = HashSet::with_capacity(seat_numbers.len());
    if let Some(dup) = seat_numbers.iter().find(|seat| !seen.insert(**seat)) {
        return Err(ValidationError::new(
            "seat_numbers",
            format!("seat {} is listed more than once", dup),
        ));
    }

    Ok(())
}

/// Normalizes and checks a payment method, returning the canonical value.
pub fn normalize_payment_method(payment_method: &str) -> Result<String, ValidationError> {
    let method = sanitize_string(payment_method).to_lowercase();
    validate_required("payment_method", &method)?;
    validate_enum("payment_method", &method, ALLOWED_PAYMENT_METHODS)?;
    Ok(method)
}

/// Promo codes are stored upper-case; lookups are case-insensitive.
pub fn normalize_promo_code(code: &str) -> Result<String, ValidationError> {
    let code = sanitize_string(code).to_uppercase();
    validate_required("promo_code", &code)?;
    validate_max_len("promo_code", &code, PROMO_CODE_MAX_LEN)?;

    if !code
        .chars()
        .all(|ch| ch.is_ascii_uppercase() || ch.is_ascii_digit() || ch == '-' || ch == '_')
    {
        return Err(ValidationError::new(
            "promo_code",
            "must contain only letters, digits, '-' or '_'",
        ));
    }

    Ok(code)
}

pub fn validate_non_negative_amount(field: &'static str, amount: &BigDecimal) -> ValidationResult {
    if amount < &BigDecimal::from(0) {
        return Err(ValidationError::new(field, "must not be negative"));
    }

    Ok(())
}
