use serde::Serialize;

use bazaar_core::DomainError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub reason: String,
}

/// Accumulated per-field validation failures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldErrors(Vec<FieldError>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: impl Into<String>, reason: impl Into<String>) {
        self.0.push(FieldError {
            field: field.into(),
            reason: reason.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    /// Check a required text field: present, non-blank, within `max` chars.
    pub fn require_text(&mut self, field: &str, value: Option<&str>, max: usize) {
        match value.map(str::trim) {
            None | Some("") => self.push(field, "is required"),
            Some(v) => self.limit_text(field, v, max),
        }
    }

    pub fn limit_text(&mut self, field: &str, value: &str, max: usize) {
        if value.chars().count() > max {
            self.push(field, format!("must be at most {max} characters"));
        }
    }

    pub fn into_result(self) -> Result<(), DomainError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(self.into())
        }
    }
}

impl From<FieldErrors> for DomainError {
    fn from(errors: FieldErrors) -> Self {
        let joined = errors
            .0
            .iter()
            .map(|e| format!("{}: {}", e.field, e.reason))
            .collect::<Vec<_>>()
            .join("; ");
        DomainError::invalid_arguments(joined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_every_failing_field() {
        let mut errors = FieldErrors::new();
        errors.require_text("city", None, 50);
        errors.require_text("phone", Some("   "), 20);
        errors.require_text("street", Some("Main"), 100);
        assert_eq!(errors.errors().len(), 2);
        let err: DomainError = errors.into();
        assert_eq!(
            err,
            DomainError::InvalidArguments("city: is required; phone: is required".into())
        );
    }

    #[test]
    fn enforces_length_in_chars() {
        let mut errors = FieldErrors::new();
        errors.require_text("house", Some("дом-номер-16-бис"), 15);
        assert_eq!(errors.errors()[0].field, "house");
    }
}
