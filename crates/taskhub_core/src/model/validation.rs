//! Field-level validation shared by every entity draft.
//!
//! # Responsibility
//! - Normalize free-text input (trim, empty -> `None`) before persistence.
//! - Report constraint violations as one typed error.
//!
//! # Invariants
//! - Length limits count Unicode scalar values, not bytes.
//! - Validation never touches storage.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Upper bound for entity names.
pub const NAME_MAX_CHARS: usize = 255;
/// Upper bound for description bodies.
pub const DESCRIPTION_MAX_CHARS: usize = 1000;
/// Upper bound for member and assignee role labels.
pub const ROLE_MAX_CHARS: usize = 50;
/// Upper bound for external principal identifiers.
pub const PRINCIPAL_ID_MAX_CHARS: usize = 255;

/// Constraint violation on client-provided input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Required text is blank after trim.
    EmptyField(&'static str),
    /// Text exceeds the field limit.
    FieldTooLong { field: &'static str, max: usize },
    /// Principal type tag is not `USER` or `AGENT`.
    InvalidPrincipalType(String),
    /// Permission name does not match `^[a-z][a-z0-9_]{0,63}$`.
    InvalidPermissionName(String),
    /// Task priority outside `1..=5`.
    PriorityOutOfRange(u8),
    /// `end_date` is earlier than `start_date`.
    DateRangeReversed { start: i64, end: i64 },
    /// Status change moves backwards in a forward-only lifecycle.
    IllegalTransition {
        entity: &'static str,
        from: &'static str,
        to: &'static str,
    },
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyField(field) => write!(f, "{field} must not be blank"),
            Self::FieldTooLong { field, max } => {
                write!(f, "{field} exceeds {max} characters")
            }
            Self::InvalidPrincipalType(value) => {
                write!(f, "principal type must be USER or AGENT, got `{value}`")
            }
            Self::InvalidPermissionName(value) => write!(f, "invalid permission name `{value}`"),
            Self::PriorityOutOfRange(value) => {
                write!(f, "priority must be between 1 and 5, got {value}")
            }
            Self::DateRangeReversed { start, end } => {
                write!(f, "end_date {end} is earlier than start_date {start}")
            }
            Self::IllegalTransition { entity, from, to } => {
                write!(f, "{entity} status cannot move from {from} to {to}")
            }
        }
    }
}

impl Error for ValidationError {}

/// Trims `value` and checks it is non-empty and within `max` chars.
pub(crate) fn required_text(
    field: &'static str,
    value: &str,
    max: usize,
) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField(field));
    }
    check_length(field, trimmed, max)?;
    Ok(trimmed.to_string())
}

/// Like [`required_text`] but maps blank input to `None`.
pub(crate) fn optional_text(
    field: &'static str,
    value: Option<&str>,
    max: usize,
) -> Result<Option<String>, ValidationError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(trimmed) => {
            check_length(field, trimmed, max)?;
            Ok(Some(trimmed.to_string()))
        }
    }
}

pub(crate) fn check_date_range(
    start: Option<i64>,
    end: Option<i64>,
) -> Result<(), ValidationError> {
    if let (Some(start), Some(end)) = (start, end) {
        if end < start {
            return Err(ValidationError::DateRangeReversed { start, end });
        }
    }
    Ok(())
}

/// Rejects a lifecycle step whose rank is lower than the current one.
///
/// Equal ranks are accepted so repeated writes of the same status are no-ops.
pub(crate) fn forward_only(
    entity: &'static str,
    (from, from_rank): (&'static str, u8),
    (to, to_rank): (&'static str, u8),
) -> Result<(), ValidationError> {
    if to_rank < from_rank {
        return Err(ValidationError::IllegalTransition { entity, from, to });
    }
    Ok(())
}

fn check_length(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
    if value.chars().count() > max {
        return Err(ValidationError::FieldTooLong { field, max });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{check_date_range, optional_text, required_text, ValidationError};

    #[test]
    fn required_text_trims_and_rejects_blank() {
        assert_eq!(required_text("name", "  Apollo ", 10).unwrap(), "Apollo");
        assert_eq!(
            required_text("name", "   ", 10).unwrap_err(),
            ValidationError::EmptyField("name")
        );
    }

    #[test]
    fn length_limit_counts_chars_not_bytes() {
        assert!(required_text("role", "éééé", 4).is_ok());
        assert_eq!(
            required_text("role", "ééééé", 4).unwrap_err(),
            ValidationError::FieldTooLong {
                field: "role",
                max: 4
            }
        );
    }

    #[test]
    fn optional_text_maps_blank_to_none() {
        assert_eq!(optional_text("description", Some("  "), 10).unwrap(), None);
        assert_eq!(optional_text("description", None, 10).unwrap(), None);
        assert_eq!(
            optional_text("description", Some(" x "), 10).unwrap(),
            Some("x".to_string())
        );
    }

    #[test]
    fn date_range_allows_open_and_equal_bounds() {
        assert!(check_date_range(None, Some(5)).is_ok());
        assert!(check_date_range(Some(5), Some(5)).is_ok());
        assert_eq!(
            check_date_range(Some(10), Some(5)).unwrap_err(),
            ValidationError::DateRangeReversed { start: 10, end: 5 }
        );
    }
}
