//! Input validation for everything that reaches the remote tracker.
//!
//! All checks are whitelist based and fail closed: a value that is not
//! positively recognised is rejected before any remote call is made.
//!
//! - **whitelist**: allowed states, work item types, field names and link types
//! - **rules**: scalar validators (enums, numbers, ids, paths, tenant keys)
//! - **query**: WIQL statement checks and literal hardening
//! - **rich_text**: tag/attribute whitelist for HTML-bearing fields

mod query;
mod rich_text;
mod rules;
pub mod whitelist;

#[cfg(test)]
mod query_test;

use miette::Diagnostic;
use thiserror::Error;

pub use query::{MAX_FRAGMENT_CHARS, MAX_WIQL_CHARS, sanitize_query_fragment, validate_wiql};
pub use rich_text::sanitize_rich_text;
pub use rules::{
    EFFORT_BOUNDS, NumericBounds, RANK_BOUNDS, validate_enum, validate_field_name,
    validate_field_value, validate_iteration_path, validate_link_type, validate_numeric,
    validate_priority, validate_state, validate_team_name, validate_tenant_key,
    validate_work_item_id, validate_work_item_type,
};

/// Input validation errors.
#[derive(Error, Diagnostic, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{field} cannot be empty")]
    #[diagnostic(code(sprintgate::validation::empty))]
    Empty { field: String },

    #[error("{field} is required")]
    #[diagnostic(code(sprintgate::validation::missing), help("{hint}"))]
    Missing { field: String, hint: String },

    #[error("Invalid {field}: '{value}' is not an allowed value")]
    #[diagnostic(code(sprintgate::validation::not_allowed))]
    NotAllowed { field: String, value: String },

    #[error("{field} must be a number")]
    #[diagnostic(code(sprintgate::validation::not_a_number))]
    NotANumber { field: String },

    #[error("{field} must be between {min} and {max}, got {value}")]
    #[diagnostic(code(sprintgate::validation::out_of_range))]
    OutOfRange {
        field: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("{field} exceeds {max} characters (got {len})")]
    #[diagnostic(code(sprintgate::validation::too_long))]
    TooLong { field: String, len: usize, max: usize },

    #[error("Invalid {field}: {reason}")]
    #[diagnostic(code(sprintgate::validation::malformed))]
    Malformed { field: String, reason: String },
}

impl ValidationError {
    pub(crate) fn empty(field: impl Into<String>) -> Self {
        Self::Empty {
            field: field.into(),
        }
    }

    pub(crate) fn malformed(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn not_allowed(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::NotAllowed {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// Result type for validation.
pub type ValidationResult<T> = Result<T, ValidationError>;
