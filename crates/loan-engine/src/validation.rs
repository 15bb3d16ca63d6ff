use crate::finance::MAX_TERM_MONTHS;
use serde::Serialize;
use std::fmt;

/// One rejected input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldIssue {
    pub field: String,
    pub message: String,
}

/// Malformed or out-of-range input, reported per field.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ValidationError {
    pub issues: Vec<FieldIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<String> = self
            .issues
            .iter()
            .map(|issue| format!("{}: {}", issue.field, issue.message))
            .collect();
        write!(f, "invalid input ({})", fields.join("; "))
    }
}

impl std::error::Error for ValidationError {}

impl ValidationError {
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            issues: vec![FieldIssue {
                field: field.into(),
                message: message.into(),
            }],
        }
    }
}

/// Accumulates field issues so callers report every problem at once.
#[derive(Debug, Default)]
pub struct FieldChecks {
    issues: Vec<FieldIssue>,
}

impl FieldChecks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.issues.push(FieldIssue {
            field: field.to_string(),
            message: message.into(),
        });
    }

    /// Present, finite, and non-negative. Missing values are never zero-filled.
    pub fn amount(&mut self, field: &str, value: Option<f64>) -> f64 {
        match value {
            None => {
                self.push(field, "is required");
                0.0
            }
            Some(value) => {
                self.non_negative(field, value);
                value
            }
        }
    }

    pub fn optional_amount(&mut self, field: &str, value: Option<f64>) -> Option<f64> {
        if let Some(value) = value {
            self.non_negative(field, value);
        }
        value
    }

    pub fn non_negative(&mut self, field: &str, value: f64) {
        if !value.is_finite() {
            self.push(field, "must be a finite number");
        } else if value < 0.0 {
            self.push(field, "must not be negative");
        }
    }

    pub fn term_months(&mut self, field: &str, value: u32) {
        if value == 0 {
            self.push(field, "must be positive");
        } else if value > MAX_TERM_MONTHS {
            self.push(field, format!("must not exceed {MAX_TERM_MONTHS} months"));
        }
    }

    pub fn required<T>(&mut self, field: &str, value: Option<T>) -> Option<T> {
        if value.is_none() {
            self.push(field, "is required");
        }
        value
    }

    pub fn finish(self) -> Result<(), ValidationError> {
        if self.issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError {
                issues: self.issues,
            })
        }
    }
}
