//! Small composable input validation rules.
//!
//! Rules collect violations instead of failing on the first one, so callers
//! get every problem of one input in a single error.

use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub violations: Vec<FieldViolation>,
}

impl ValidationError {
    pub fn has_field(&self, field: &str) -> bool {
        self.violations.iter().any(|violation| violation.field == field)
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let joined = self
            .violations
            .iter()
            .map(|violation| format!("{}: {}", violation.field, violation.message))
            .collect::<Vec<_>>()
            .join("; ");
        write!(f, "validation failed: {joined}")
    }
}

impl Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

/// Accumulates rule violations for one input.
#[derive(Debug, Default)]
pub struct Validator {
    violations: Vec<FieldViolation>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, field: &'static str, message: String) {
        self.violations.push(FieldViolation { field, message });
    }

    pub fn not_blank(&mut self, field: &'static str, value: &str) -> &mut Self {
        if value.trim().is_empty() {
            self.push(field, "must not be blank".to_string());
        }
        self
    }

    /// Counts characters, not bytes.
    pub fn max_chars(&mut self, field: &'static str, value: &str, max: usize) -> &mut Self {
        if value.chars().count() > max {
            self.push(field, format!("must be at most {max} characters"));
        }
        self
    }

    pub fn each_max_chars(&mut self, field: &'static str, values: &[String], max: usize) -> &mut Self {
        if values.iter().any(|value| value.chars().count() > max) {
            self.push(field, format!("each item must be at most {max} characters"));
        }
        self
    }

    pub fn min_value(&mut self, field: &'static str, value: i64, min: i64) -> &mut Self {
        if value < min {
            self.push(field, format!("must be at least {min}"));
        }
        self
    }

    pub fn finish(&mut self) -> ValidationResult {
        if self.violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError {
                violations: std::mem::take(&mut self.violations),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Validator;

    #[test]
    fn collects_every_violation() {
        let err = Validator::new()
            .not_blank("name", "  ")
            .max_chars("name", "  ", 1)
            .min_value("custom_order", -1, 0)
            .finish()
            .unwrap_err();
        assert_eq!(err.violations.len(), 3);
        assert!(err.has_field("custom_order"));
    }

    #[test]
    fn max_chars_counts_unicode_scalars() {
        assert!(Validator::new().max_chars("name", "分类名称", 4).finish().is_ok());
        assert!(Validator::new()
            .each_max_chars("keywords", &["ok".to_string(), "too long".to_string()], 3)
            .finish()
            .is_err());
    }
}
