//! WIQL statement checks and literal hardening.

use super::{ValidationError, ValidationResult};

/// Upper bound the tracker accepts for one statement.
pub const MAX_WIQL_CHARS: usize = 32_000;

/// Upper bound for one user-supplied literal inside a statement.
pub const MAX_FRAGMENT_CHARS: usize = 1_024;

/// Structural check of a full WIQL statement.
pub fn validate_wiql(query: &str) -> ValidationResult<&str> {
    if query.trim().is_empty() {
        return Err(ValidationError::empty("WIQL query"));
    }
    let len = query.chars().count();
    if len > MAX_WIQL_CHARS {
        return Err(ValidationError::TooLong {
            field: "WIQL query".to_string(),
            len,
            max: MAX_WIQL_CHARS,
        });
    }

    let upper = query.to_uppercase();
    if !upper.contains("SELECT") {
        return Err(ValidationError::malformed("WIQL query", "missing SELECT clause"));
    }
    if !upper.contains("FROM") {
        return Err(ValidationError::malformed("WIQL query", "missing FROM clause"));
    }
    if !upper.contains("WORKITEMS") && !upper.contains("WORKITEMLINKS") {
        return Err(ValidationError::malformed(
            "WIQL query",
            "FROM must target WorkItems or WorkItemLinks",
        ));
    }
    if !brackets_balanced(query) {
        return Err(ValidationError::malformed("WIQL query", "unbalanced square brackets"));
    }
    Ok(query)
}

/// Field brackets outside string literals pair up. A doubled quote inside a
/// literal toggles twice and leaves it open.
fn brackets_balanced(query: &str) -> bool {
    let mut depth = 0i64;
    let mut in_literal = false;
    for c in query.chars() {
        match c {
            '\'' => in_literal = !in_literal,
            '[' if !in_literal => depth += 1,
            ']' if !in_literal => depth -= 1,
            _ => {}
        }
        if depth < 0 {
            return false;
        }
    }
    depth == 0
}

/// Harden free text for embedding inside a single-quoted WIQL literal.
///
/// Control characters become spaces. A lone single quote is doubled; a pair
/// is already escaped and kept as is. Once every quote is escaped the text
/// cannot leave the literal, so `;`, `[` and `]` pass through. The result is
/// trimmed. Applying it to its own output returns the output unchanged.
pub fn sanitize_query_fragment(text: &str) -> ValidationResult<String> {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                out.push_str("''");
                if chars.peek() == Some(&'\'') {
                    chars.next();
                }
            }
            c if c.is_control() => out.push(' '),
            c => out.push(c),
        }
    }

    let trimmed = out.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::empty("query text"));
    }
    let len = trimmed.chars().count();
    if len > MAX_FRAGMENT_CHARS {
        return Err(ValidationError::TooLong {
            field: "query text".to_string(),
            len,
            max: MAX_FRAGMENT_CHARS,
        });
    }
    Ok(trimmed.to_string())
}
