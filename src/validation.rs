use crate::domains::export::types::ExportTarget;
use crate::errors::ValidationError;
use regex::Regex;
use std::sync::OnceLock;

/// Longest filename stem accepted from the host.
pub const MAX_STEM_LENGTH: usize = 120;
/// Longest report title accepted from the host.
pub const MAX_TITLE_LENGTH: usize = 200;

/// A trait that request types implement for validation.
pub trait Validate {
    /// Validates the value and returns the first error found.
    fn validate(&self) -> Result<(), ValidationError>;
}

fn stem_regex() -> &'static Regex {
    static STEM_REGEX: OnceLock<Regex> = OnceLock::new();
    STEM_REGEX.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9 ._-]*$").unwrap())
}

/// Collects errors and reports the first one
#[derive(Default)]
pub struct ValidationBuilder {
    errors: Vec<ValidationError>,
}

impl ValidationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(mut self, result: Result<(), ValidationError>) -> Self {
        if let Err(error) = result {
            self.errors.push(error);
        }
        self
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    pub fn validate(self) -> Result<(), ValidationError> {
        match self.errors.into_iter().next() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// Filename stems must be a single plain path component.
pub fn validate_filename_stem(stem: &str) -> Result<(), ValidationError> {
    let stem = stem.trim();
    if stem.is_empty() {
        return Err(ValidationError::required("filename_stem"));
    }
    if stem.chars().count() > MAX_STEM_LENGTH {
        return Err(ValidationError::max_length("filename_stem", MAX_STEM_LENGTH));
    }
    if stem.contains("..") || !stem_regex().is_match(stem) {
        return Err(ValidationError::format(
            "filename_stem",
            "use letters, digits, spaces, '.', '_' or '-' and no path separators",
        ));
    }
    Ok(())
}

pub fn validate_title(title: &str) -> Result<(), ValidationError> {
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(ValidationError::max_length("title", MAX_TITLE_LENGTH));
    }
    Ok(())
}

impl Validate for ExportTarget {
    fn validate(&self) -> Result<(), ValidationError> {
        ValidationBuilder::new()
            .check(validate_filename_stem(&self.filename_stem))
            .check(validate_title(&self.title))
            .validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filename_stem_validation() {
        assert!(validate_filename_stem("staff-2024").is_ok());
        assert!(validate_filename_stem("Storage Units_Q2.v1").is_ok());
        assert_eq!(validate_filename_stem("  "), Err(ValidationError::required("filename_stem")));
        assert!(validate_filename_stem("../etc/passwd").is_err());
        assert!(validate_filename_stem("reports/staff").is_err());
        assert!(validate_filename_stem("a..b").is_err());
        assert!(validate_filename_stem(".hidden").is_err());
        assert!(validate_filename_stem(&"x".repeat(MAX_STEM_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_target_validation_reports_first_error() {
        let target = ExportTarget::new("", "t".repeat(MAX_TITLE_LENGTH + 1));
        let err = target.validate().unwrap_err();
        assert_eq!(err.field(), Some("filename_stem"));

        assert!(ExportTarget::new("claims", "Insurance Claims").validate().is_ok());
    }

    #[test]
    fn test_builder_collects_all_errors() {
        let builder = ValidationBuilder::new()
            .check(validate_filename_stem(""))
            .check(validate_title(&"t".repeat(MAX_TITLE_LENGTH + 1)));
        assert_eq!(builder.errors().len(), 2);
    }
}
