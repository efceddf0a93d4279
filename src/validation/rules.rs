//! Scalar validators.

use serde_json::Value;

use super::rich_text::sanitize_rich_text;
use super::whitelist::{
    ALLOWED_LINK_TYPES, ALLOWED_STATES, ALLOWED_WORK_ITEM_TYPES, EFFORT_FIELDS,
    FORBIDDEN_NAME_CHARS, RANK_FIELDS, READ_ONLY_FIELDS, RICH_TEXT_FIELDS,
};
use super::{ValidationError, ValidationResult};

const FIELD_PATH_PREFIX: &str = "/fields/";
const MAX_NAME_CHARS: usize = 64;
const MAX_TITLE_CHARS: usize = 255;
const MAX_PATH_CHARS: usize = 4000;
const MAX_PLAIN_TEXT_CHARS: usize = 32_000;

/// Inclusive numeric range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericBounds {
    pub min: f64,
    pub max: f64,
}

/// Priority and severity: 1 is highest.
pub const RANK_BOUNDS: NumericBounds = NumericBounds { min: 1.0, max: 4.0 };

/// Hours, points and ranks.
pub const EFFORT_BOUNDS: NumericBounds = NumericBounds {
    min: 0.0,
    max: 1_000_000_000.0,
};

/// Accept `value` only if it is exactly one of `allowed` (case-sensitive).
pub fn validate_enum<'a>(field: &str, value: &'a str, allowed: &[&str]) -> ValidationResult<&'a str> {
    if value.is_empty() {
        return Err(ValidationError::empty(field));
    }
    if allowed.contains(&value) {
        Ok(value)
    } else {
        Err(ValidationError::not_allowed(field, value))
    }
}

pub fn validate_state(state: &str) -> ValidationResult<&str> {
    validate_enum("state", state, ALLOWED_STATES)
}

pub fn validate_work_item_type(work_item_type: &str) -> ValidationResult<&str> {
    validate_enum("work item type", work_item_type, ALLOWED_WORK_ITEM_TYPES)
}

pub fn validate_link_type(link_type: &str) -> ValidationResult<&str> {
    validate_enum("link type", link_type, ALLOWED_LINK_TYPES)
}

/// Check a field reference name, with or without the `/fields/` patch prefix.
///
/// Returns the bare reference name.
pub fn validate_field_name<'a>(name: &'a str, allowed: &[&str]) -> ValidationResult<&'a str> {
    let bare = name.strip_prefix(FIELD_PATH_PREFIX).unwrap_or(name);
    if bare.is_empty() {
        return Err(ValidationError::empty("field name"));
    }
    if allowed.contains(&bare) {
        Ok(bare)
    } else {
        Err(ValidationError::not_allowed("field name", name))
    }
}

/// Accept a JSON number inside `bounds`.
pub fn validate_numeric(field: &str, value: &Value, bounds: NumericBounds) -> ValidationResult<f64> {
    let number = value
        .as_f64()
        .filter(|n| n.is_finite())
        .ok_or_else(|| ValidationError::NotANumber {
            field: field.to_string(),
        })?;

    if number < bounds.min || number > bounds.max {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            value: number,
            min: bounds.min,
            max: bounds.max,
        });
    }
    Ok(number)
}

fn validate_rank(field: &str, value: &Value) -> ValidationResult<i64> {
    let number = validate_numeric(field, value, RANK_BOUNDS)?;
    if number.fract() != 0.0 {
        return Err(ValidationError::malformed(field, "must be a whole number"));
    }
    Ok(number as i64)
}

pub fn validate_priority(priority: i64) -> ValidationResult<i64> {
    validate_rank("priority", &Value::from(priority))
}

/// Work item ids are positive integers.
pub fn validate_work_item_id(id: i64) -> ValidationResult<u64> {
    u64::try_from(id)
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| ValidationError::malformed("work item id", format!("{id} is not a positive integer")))
}

fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    if name.trim().is_empty() {
        return Err(ValidationError::empty(field));
    }
    let len = name.chars().count();
    if len > MAX_NAME_CHARS {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            len,
            max: MAX_NAME_CHARS,
        });
    }
    if let Some(c) = name
        .chars()
        .find(|c| c.is_control() || FORBIDDEN_NAME_CHARS.contains(c))
    {
        return Err(ValidationError::malformed(
            field,
            format!("character {c:?} is not allowed"),
        ));
    }
    Ok(())
}

/// Tenant (project) keys end up in URL paths and WIQL literals.
pub fn validate_tenant_key(key: &str) -> ValidationResult<&str> {
    validate_name("project", key)?;
    Ok(key)
}

pub fn validate_team_name(team: &str) -> ValidationResult<&str> {
    validate_name("team", team)?;
    Ok(team)
}

/// Check a classification path and root it under `project`.
///
/// `Sprint 5` becomes `Project\Sprint 5`; an already rooted path is kept.
pub fn validate_iteration_path(path: &str, project: &str) -> ValidationResult<String> {
    validate_classification_path("iteration path", path, project)
}

fn validate_classification_path(field: &str, path: &str, project: &str) -> ValidationResult<String> {
    if path.trim().is_empty() {
        return Err(ValidationError::empty(field));
    }
    if project.is_empty() {
        return Err(ValidationError::empty("project"));
    }
    if path.contains("..") || path.contains("//") {
        return Err(ValidationError::malformed(field, "path traversal is not allowed"));
    }
    if path.chars().any(char::is_control) {
        return Err(ValidationError::malformed(field, "control characters are not allowed"));
    }
    let len = path.chars().count();
    if len > MAX_PATH_CHARS {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            len,
            max: MAX_PATH_CHARS,
        });
    }

    let rooted = format!("{project}\\");
    if path == project || path.starts_with(&rooted) {
        Ok(path.to_string())
    } else {
        Ok(format!("{rooted}{path}"))
    }
}

fn expect_str<'a>(field: &str, value: &'a Value) -> ValidationResult<&'a str> {
    value
        .as_str()
        .ok_or_else(|| ValidationError::malformed(field, "expected a string"))
}

/// Type-check and normalise a value about to be written to `field`.
///
/// `field` must already have passed [`validate_field_name`]. `null` clears a
/// writable field.
pub fn validate_field_value(field: &str, value: &Value, project: &str) -> ValidationResult<Value> {
    if READ_ONLY_FIELDS.contains(&field) {
        return Err(ValidationError::malformed(field, "field is read-only"));
    }
    if value.is_null() {
        return Ok(Value::Null);
    }

    if RANK_FIELDS.contains(&field) {
        return validate_rank(field, value).map(Value::from);
    }
    if EFFORT_FIELDS.contains(&field) {
        validate_numeric(field, value, EFFORT_BOUNDS)?;
        return Ok(value.clone());
    }
    if RICH_TEXT_FIELDS.contains(&field) {
        return Ok(Value::from(sanitize_rich_text(expect_str(field, value)?)));
    }

    match field {
        "System.State" => Ok(Value::from(validate_state(expect_str(field, value)?)?)),
        "System.WorkItemType" => Ok(Value::from(validate_work_item_type(expect_str(
            field, value,
        )?)?)),
        "System.IterationPath" | "System.AreaPath" => Ok(Value::from(
            validate_classification_path(field, expect_str(field, value)?, project)?,
        )),
        "System.Title" => {
            let title = expect_str(field, value)?.trim();
            if title.is_empty() {
                return Err(ValidationError::empty(field));
            }
            check_plain_text(field, title, MAX_TITLE_CHARS)?;
            Ok(Value::from(title))
        }
        _ => match value {
            Value::String(text) => {
                check_plain_text(field, text, MAX_PLAIN_TEXT_CHARS)?;
                Ok(value.clone())
            }
            Value::Number(_) | Value::Bool(_) => Ok(value.clone()),
            _ => Err(ValidationError::malformed(
                field,
                "expected a string, number or boolean",
            )),
        },
    }
}

fn check_plain_text(field: &str, text: &str, max: usize) -> ValidationResult<()> {
    let len = text.chars().count();
    if len > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            len,
            max,
        });
    }
    if text.chars().any(|c| c.is_control() && c != '\n' && c != '\t') {
        return Err(ValidationError::malformed(field, "control characters are not allowed"));
    }
    Ok(())
}
