use std::sync::LazyLock;

use regex::Regex;

use shared_models::error::{AppError, FieldError};

static EMAIL_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").ok());

static PHONE_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9][0-9\s\-]{6,18}[0-9]$").ok());

pub fn is_valid_email(email: &str) -> bool {
    email.len() <= 254
        && EMAIL_PATTERN
            .as_ref()
            .is_some_and(|re| re.is_match(email))
}

pub fn is_valid_phone(phone: &str) -> bool {
    PHONE_PATTERN.as_ref().is_some_and(|re| re.is_match(phone))
}

/// Collects field errors and reports them all at once.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&mut self, ok: bool, field: &str, message: &str) -> &mut Self {
        if !ok {
            self.errors.push(FieldError::new(field, message));
        }
        self
    }

    pub fn required(&mut self, field: &str, value: &str) -> &mut Self {
        self.check(!value.trim().is_empty(), field, &format!("{} is required", field))
    }

    pub fn email(&mut self, field: &str, value: &str) -> &mut Self {
        self.check(is_valid_email(value), field, "Please provide a valid email")
    }

    pub fn min_len(&mut self, field: &str, value: &str, min: usize) -> &mut Self {
        self.check(
            value.chars().count() >= min,
            field,
            &format!("{} must be at least {} characters long", field, min),
        )
    }

    pub fn phone(&mut self, field: &str, value: Option<&str>) -> &mut Self {
        match value {
            Some(phone) => self.check(is_valid_phone(phone), field, "Please provide a valid phone number"),
            None => self,
        }
    }

    pub fn non_negative(&mut self, field: &str, value: i64) -> &mut Self {
        self.check(value >= 0, field, &format!("{} must not be negative", field))
    }

    pub fn finish(&mut self) -> Result<(), AppError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(std::mem::take(&mut self.errors)))
        }
    }
}
