// Parser error path tests
// Each malformed input maps to one error kind, positioned at the offending token.

use sysl_core::error::{
    ConstraintError, InvalidNameError, Position, SyntaxError, SyslError,
};
use sysl_core::parse;

fn parse_err(source: &str) -> SyslError {
    match parse(source, "test.sysl") {
        Ok(model) => panic!("expected an error, parsed {model:?}"),
        Err(err) => err,
    }
}

fn at(line: usize, column: usize) -> Option<Position> {
    Some(Position { line, column })
}

#[test]
fn test_missing_colon_after_app_name() {
    let err = parse_err("App\n    ...\n");
    assert!(matches!(err, SyslError::Syntax(SyntaxError::UnexpectedToken { .. })));
    assert_eq!(err.position(), at(1, 4));
}

#[test]
fn test_missing_closing_paren_in_params() {
    let err = parse_err("App:\n    Ep (a <: int:\n        ...\n");
    assert!(matches!(err, SyslError::Syntax(SyntaxError::UnexpectedToken { .. })));
    assert_eq!(err.position(), at(2, 17));
}

#[test]
fn test_unbalanced_constraint() {
    let err = parse_err("App:\n    !type T:\n        f <: string(5..10\n");
    assert!(matches!(err, SyslError::Syntax(SyntaxError::UnexpectedToken { .. })));
    assert_eq!(err.position().map(|p| p.line), Some(3));
}

#[test]
fn test_empty_body_is_eof() {
    let err = parse_err("App:\n");
    assert!(matches!(err, SyslError::Syntax(SyntaxError::UnexpectedEof { .. })));
}

#[test]
fn test_missing_body_after_endpoint() {
    let err = parse_err("App:\n    Ep:\n    Other:\n        ...\n");
    assert!(matches!(err, SyslError::Syntax(SyntaxError::UnexpectedToken { .. })));
    assert_eq!(err.position(), at(3, 5));
}

#[test]
fn test_misaligned_dedent() {
    let err = parse_err("App:\n    Ep:\n        ...\n  Other:\n    ...\n");
    assert!(matches!(
        err,
        SyslError::Syntax(SyntaxError::MalformedIndentation { .. })
    ));
    assert_eq!(err.position().map(|p| p.line), Some(4));
}

#[test]
fn test_tab_indentation() {
    let err = parse_err("App:\n\tEp:\n\t\t...\n");
    assert!(matches!(
        err,
        SyslError::Syntax(SyntaxError::MalformedIndentation { .. })
    ));
}

#[test]
fn test_unexpected_indent() {
    let err = parse_err("App:\n    Ep:\n        do a\n            do b\n");
    assert!(matches!(
        err,
        SyslError::Syntax(SyntaxError::MalformedIndentation { .. })
    ));
}

#[test]
fn test_unterminated_string() {
    let err = parse_err("App:\n    @doc = \"never closed\n    ...\n");
    assert!(matches!(
        err,
        SyslError::Syntax(SyntaxError::UnterminatedText { .. })
    ));
    assert_eq!(err.position(), at(2, 12));
}

#[test]
fn test_multiline_annotation_without_lines() {
    let err = parse_err("App:\n    @doc =:\n    ...\n");
    assert!(matches!(
        err,
        SyslError::Syntax(SyntaxError::UnterminatedText { .. })
    ));
}

#[test]
fn test_unknown_primitive_with_constraint() {
    let err = parse_err("App:\n    !type T:\n        f <: text(5)\n");
    match err {
        SyslError::Syntax(SyntaxError::UnknownPrimitive { keyword, position, .. }) => {
            assert_eq!(keyword, "text");
            assert_eq!(position, Position { line: 3, column: 14 });
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn test_inverted_range() {
    let err = parse_err("App:\n    !type T:\n        f <: string(10..5)\n");
    assert!(matches!(
        err,
        SyslError::Constraint(ConstraintError::Inverted { min: 10, max: 5, .. })
    ));
}

#[test]
fn test_constraint_on_wrong_primitive() {
    for source in [
        "App:\n    !type T:\n        f <: bool(1)\n",
        "App:\n    !type T:\n        f <: string(5.2)\n",
        "App:\n    !type T:\n        f <: decimal(1..4)\n",
    ] {
        let err = parse_err(source);
        assert!(
            matches!(err, SyslError::Constraint(ConstraintError::Malformed { .. })),
            "{source:?} gave {err:?}"
        );
    }
}

#[test]
fn test_duplicate_annotation_inline_and_block() {
    let err = parse_err("App:\n    Ep [doc=\"a\"]:\n        @doc = \"b\"\n        ...\n");
    match err {
        SyslError::DuplicateAnnotation(e) => {
            assert_eq!(e.name, "doc");
            assert_eq!(e.position, Position { line: 3, column: 10 });
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn test_duplicate_rest_fragments_are_fatal() {
    let err = parse_err(
        "R:\n    /a:\n        /b:\n            GET:\n                ...\n    /a/b:\n        GET [~other]:\n            ...\n",
    );
    match err {
        SyslError::Syntax(SyntaxError::DuplicateDeclaration { what, name, .. }) => {
            assert_eq!(what, "endpoint");
            assert_eq!(name, "GET /a/b");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn test_duplicate_type() {
    let err = parse_err("App:\n    !type T:\n        ...\n    !enum T:\n        ...\n");
    assert!(matches!(
        err,
        SyslError::Syntax(SyntaxError::DuplicateDeclaration { .. })
    ));
    assert_eq!(err.position(), at(4, 5));
}

#[test]
fn test_illegal_escape_in_name() {
    let err = parse_err("App%zz:\n    ...\n");
    assert!(matches!(
        err,
        SyslError::InvalidName(InvalidNameError::IllegalEscape { .. })
    ));
}

#[test]
fn test_unknown_type_discriminator() {
    let err = parse_err("App:\n    !struct T:\n        ...\n");
    assert!(matches!(err, SyslError::Syntax(SyntaxError::UnexpectedToken { .. })));
    assert_eq!(err.position(), at(2, 6));
}

#[test]
fn test_method_outside_path() {
    let err = parse_err("R:\n    /a:\n        Ep:\n            ...\n");
    assert!(matches!(err, SyslError::Syntax(SyntaxError::UnexpectedToken { .. })));
}

#[test]
fn test_enum_value_must_be_integer() {
    let err = parse_err("App:\n    !enum E:\n        A: one\n");
    assert!(matches!(err, SyslError::Syntax(SyntaxError::UnexpectedToken { .. })));
    assert_eq!(err.position(), at(3, 12));
}

#[test]
fn test_diagnostic_codes() {
    use miette::Diagnostic;

    let err = parse_err("App:\n    !type T:\n        f <: string(10..5)\n");
    assert_eq!(
        err.code().map(|c| c.to_string()).as_deref(),
        Some("sysl::constraint::inverted")
    );
    let err = parse_err("App\n");
    assert_eq!(
        err.code().map(|c| c.to_string()).as_deref(),
        Some("sysl::syntax::unexpected_token")
    );
}
