//! Error taxonomy.
//!
//! Only two kinds of failure are errors: malformed input rejected before
//! any search starts, and internal invariant violations that abort a run.
//! Infeasibility and budget exhaustion are ordinary outcomes and never
//! surface here.

use crate::model::ValidationError;

/// Errors produced by the timetabling engine.
#[derive(Debug, thiserror::Error)]
pub enum TimetableError {
    /// The problem or a call argument failed validation.
    #[error("invalid input: {}", format_validation(.0))]
    Validation(Vec<ValidationError>),

    /// An optimizer configuration is out of range.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A solution broke a structural invariant (duplicate ids, dangling
    /// references). This is a defect, never repaired silently.
    #[error("internal invariant violated: {0}")]
    InvariantViolation(String),
}

impl TimetableError {
    /// Shorthand for a single validation failure.
    pub fn validation(error: ValidationError) -> Self {
        Self::Validation(vec![error])
    }

    /// Whether the caller can recover by fixing input and retrying.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::InvariantViolation(_))
    }
}

fn format_validation(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, TimetableError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ValidationErrorKind;

    #[test]
    fn test_validation_message_joins_all_errors() {
        let err = TimetableError::Validation(vec![
            ValidationError::new(ValidationErrorKind::DuplicateId, "Duplicate teacher ID: 3"),
            ValidationError::new(ValidationErrorKind::InvalidCapacity, "Classroom 9 has zero capacity"),
        ]);
        let text = err.to_string();
        assert!(text.contains("Duplicate teacher ID: 3"));
        assert!(text.contains("zero capacity"));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_invariant_violation_is_fatal() {
        let err = TimetableError::InvariantViolation("duplicate assignment id 4".into());
        assert!(!err.is_recoverable());
    }
}
