//! Tests for WIQL checks and literal hardening.

use crate::validation::*;

#[test]
fn fragment_doubles_lone_quotes() {
    assert_eq!(sanitize_query_fragment("O'Brien"), Ok("O''Brien".to_string()));
}

#[test]
fn fragment_keeps_already_escaped_quotes() {
    assert_eq!(sanitize_query_fragment("O''Brien"), Ok("O''Brien".to_string()));
}

#[test]
fn fragment_cannot_close_the_literal() {
    assert_eq!(
        sanitize_query_fragment("x'; DROP [System.Id]\n"),
        Ok("x''; DROP [System.Id]".to_string())
    );
}

#[test]
fn fragment_keeps_brackets_and_semicolons() {
    assert_eq!(
        sanitize_query_fragment("fix crash; see [PROJ-12]"),
        Ok("fix crash; see [PROJ-12]".to_string())
    );
    assert_eq!(
        sanitize_query_fragment("Alpha\\Sprint [1]"),
        Ok("Alpha\\Sprint [1]".to_string())
    );
}

#[test]
fn fragment_blanks_control_characters() {
    assert_eq!(sanitize_query_fragment("a\tb\u{7}c"), Ok("a b c".to_string()));
}

#[test]
fn fragment_rejects_empty_after_cleanup() {
    assert!(matches!(
        sanitize_query_fragment(" \r\n \t"),
        Err(ValidationError::Empty { .. })
    ));
}

#[test]
fn fragment_rejects_overlong_input() {
    let long = "a".repeat(MAX_FRAGMENT_CHARS + 1);
    assert!(matches!(
        sanitize_query_fragment(&long),
        Err(ValidationError::TooLong { .. })
    ));
}

#[test]
fn fragment_is_idempotent() {
    let inputs = [
        "plain",
        "O'Brien",
        "'''",
        "a''b'c",
        "  padded ; [x] \u{7}bell ",
        "trailing'",
        "'leading",
        "ünïcödé 'quoted'",
    ];
    for input in inputs {
        let once = sanitize_query_fragment(input).unwrap();
        let twice = sanitize_query_fragment(&once).unwrap();
        assert_eq!(once, twice, "not idempotent for {input:?}");
    }
}

#[test]
fn fragment_output_has_no_unescaped_quote() {
    let out = sanitize_query_fragment("a'b''c'''d").unwrap();
    // every run of quotes has even length
    for run in out.split(|c| c != '\'').filter(|run| !run.is_empty()) {
        assert_eq!(run.len() % 2, 0, "odd quote run in {out:?}");
    }
}

#[test]
fn wiql_accepts_well_formed_statement() {
    let query = "SELECT [System.Id] FROM WorkItems WHERE [System.State] = 'Active'";
    assert_eq!(validate_wiql(query), Ok(query));
}

#[test]
fn wiql_rejects_structural_problems() {
    assert!(validate_wiql("").is_err());
    assert!(validate_wiql("FROM WorkItems").is_err());
    assert!(validate_wiql("SELECT [System.Id] WorkItems").is_err());
    assert!(validate_wiql("SELECT [System.Id] FROM Users").is_err());
    assert!(validate_wiql("SELECT [System.Id FROM WorkItems").is_err());
    assert!(validate_wiql("SELECT ]System.Id[ FROM WorkItems").is_err());
}

#[test]
fn wiql_rejects_oversized_statement() {
    let query = format!(
        "SELECT [System.Id] FROM WorkItems WHERE [System.Title] = '{}'",
        "a".repeat(MAX_WIQL_CHARS)
    );
    assert!(matches!(
        validate_wiql(&query),
        Err(ValidationError::TooLong { .. })
    ));
}

#[test]
fn wiql_ignores_brackets_inside_literals() {
    let query = "SELECT [System.Id] FROM WorkItems \
                 WHERE [System.Title] Contains Words 'see [PROJ-12'";
    assert_eq!(validate_wiql(query), Ok(query));
    let query = "SELECT [System.Id] FROM WorkItems WHERE [System.Title] = 'it''s ]'";
    assert_eq!(validate_wiql(query), Ok(query));
}
