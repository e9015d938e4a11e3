use std::fmt;

use serde::Serialize;

use super::types::{AnalysisParams, InputSpec, InputValue};

/// A single problem found while validating a run request.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationIssue {
    Missing {
        input: String,
    },
    InvalidOption {
        input: String,
        value: String,
        allowed: Vec<String>,
    },
    UnsupportedExtension {
        input: String,
        file_name: String,
        allowed: Vec<String>,
    },
    UnsupportedDatabase {
        name: String,
        supported: Vec<String>,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::Missing { input } => write!(f, "Missing required input: {}", input),
            ValidationIssue::InvalidOption {
                input,
                value,
                allowed,
            } => write!(
                f,
                "Invalid value '{}' for {} (allowed: {})",
                value,
                input,
                allowed.join(", ")
            ),
            ValidationIssue::UnsupportedExtension {
                input,
                file_name,
                allowed,
            } => write!(
                f,
                "File '{}' for {} has an unsupported extension (accepted: {})",
                file_name,
                input,
                allowed.join(", ")
            ),
            ValidationIssue::UnsupportedDatabase { name, supported } => write!(
                f,
                "Database '{}' is not supported (available: {})",
                name,
                supported.join(", ")
            ),
        }
    }
}

/// Outcome of [`Analyst::validate_params`](super::Analyst::validate_params).
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ValidationResult {
    valid: bool,
    errors: Vec<ValidationIssue>,
}

impl ValidationResult {
    pub fn from_issues(errors: Vec<ValidationIssue>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }

    pub fn ok() -> Self {
        Self::from_issues(vec![])
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn errors(&self) -> &[ValidationIssue] {
        &self.errors
    }

    pub fn push(&mut self, issue: ValidationIssue) {
        self.errors.push(issue);
        self.valid = false;
    }

    pub fn missing_inputs(&self) -> Vec<&str> {
        self.errors
            .iter()
            .filter_map(|issue| match issue {
                ValidationIssue::Missing { input } => Some(input.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn into_issues(self) -> Vec<ValidationIssue> {
        self.errors
    }
}

/// Checks `params` against declared input specs: required inputs must be
/// present, string values must be among declared options, and file names
/// must carry a declared extension.
pub fn validate_inputs(specs: &[InputSpec], params: &AnalysisParams) -> ValidationResult {
    let mut issues = Vec::new();

    for spec in specs {
        match params.input(&spec.name) {
            None => {
                if spec.required {
                    issues.push(ValidationIssue::Missing {
                        input: spec.name.clone(),
                    });
                }
            }
            Some(InputValue::Text(value)) => {
                if !spec.options.is_empty() && !spec.options.iter().any(|o| o == value) {
                    issues.push(ValidationIssue::InvalidOption {
                        input: spec.name.clone(),
                        value: value.clone(),
                        allowed: spec.options.clone(),
                    });
                }
            }
            Some(InputValue::File(upload)) => {
                if !spec.accepts_file_name(&upload.original_name) {
                    issues.push(ValidationIssue::UnsupportedExtension {
                        input: spec.name.clone(),
                        file_name: upload.original_name.clone(),
                        allowed: spec.extensions.clone(),
                    });
                }
            }
            Some(InputValue::Directory(_)) => {}
        }
    }

    ValidationResult::from_issues(issues)
}
