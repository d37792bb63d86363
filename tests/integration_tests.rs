// Integration tests for sysl-core using test fixtures
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use sysl_core::error::{ConstraintError, SyntaxError, SyslError};
use sysl_core::{parse, parse_file, Composition, Model, ToSysl};

fn get_test_file_path(subdir: &str, filename: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join(subdir)
        .join(filename)
}

fn read_test_file(subdir: &str, filename: &str) -> String {
    let path = get_test_file_path(subdir, filename);
    fs::read_to_string(&path).unwrap_or_else(|_| panic!("Failed to read test file: {path:?}"))
}

// Tests for valid Sysl files that should parse and serialize canonically
mod ok_tests {
    use super::*;

    #[test]
    fn test_all_round_trips() {
        let source = read_test_file("ok", "all.sysl");
        let model = parse(&source, "all.sysl")
            .unwrap_or_else(|e| panic!("{:?}", miette::Report::new(e)));
        assert_eq!(model.to_sysl(), source);
        assert_eq!(model.filter_by_file("all.sysl").to_sysl(), source);
    }

    #[test]
    fn test_all_structure() {
        let source = read_test_file("ok", "all.sysl");
        let model = parse(&source, "all.sysl").unwrap();
        assert_eq!(
            model.apps.keys().collect::<Vec<_>>(),
            [
                "Namespace :: Types",
                "Bank :: Accounts",
                "Ledger",
                "%28Legacy%29 :: Gateway"
            ]
        );

        let bank = model.app("Bank :: Accounts").unwrap();
        assert_eq!(
            bank.endpoints.keys().collect::<Vec<_>>(),
            [
                "Open",
                "Close",
                "GET /accounts",
                "POST /accounts",
                "GET /accounts/{id <: int}",
                "DELETE /accounts/{id <: int}",
            ]
        );
        let open = &bank.endpoints["Open"];
        assert_eq!(
            open.return_type().map(ToString::to_string).as_deref(),
            Some("Namespace :: Types.Status")
        );
        assert!(bank.endpoints["DELETE /accounts/{id <: int}"].attrs.has_tag("admin"));

        let types = model.app("Namespace :: Types").unwrap();
        assert!(types.types["Customer"].fields()[0].is_primary_key());

        let legacy = model.app("(Legacy) :: Gateway");
        assert!(legacy.is_none(), "lookups take escaped names");
        let legacy = model.app("%28Legacy%29 :: Gateway").unwrap();
        assert_eq!(
            legacy.name.unescaped_segments().unwrap(),
            ["(Legacy)", "Gateway"]
        );
    }

    #[test]
    fn test_normalization_converges() {
        let input = read_test_file("ok", "normalize_in.sysl");
        let expected = read_test_file("ok", "normalize_out.sysl");
        let once = parse(&input, "normalize_in.sysl").unwrap().to_sysl();
        assert_eq!(once, expected);
        let twice = parse(&once, "normalize_out.sysl").unwrap().to_sysl();
        assert_eq!(twice, once);
    }

    #[test]
    fn test_all_exports_json() {
        let source = read_test_file("ok", "all.sysl");
        let model = parse(&source, "all.sysl").unwrap();
        let json: serde_json::Value = serde_json::from_str(&model.to_json().unwrap()).unwrap();
        let get = &json["apps"]["Bank :: Accounts"]["endpoints"]["GET /accounts"];
        assert_eq!(get["rest"]["method"], "GET");
        assert_eq!(get["rest"]["query"][1]["name"], "limit");
        assert_eq!(get["source"], "all.sysl");
    }

    #[test]
    fn test_parse_file_records_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "App:\n    Ep:\n        ...\n").unwrap();
        let model = parse_file(file.path()).unwrap();
        let path = file.path().to_string_lossy().into_owned();
        let app = model.app("App").unwrap();
        assert_eq!(app.source.as_deref(), Some(path.as_str()));
        assert_eq!(app.endpoints["Ep"].source.as_deref(), Some(path.as_str()));
        assert_eq!(model.filter_by_file(&path), model);
    }

    #[test]
    fn test_composition_of_files() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.sysl");
        let second = dir.path().join("second.sysl");
        fs::write(&first, "App:\n    One:\n        ...\n").unwrap();
        fs::write(&second, "App:\n    Two:\n        ...\nOther:\n    ...\n").unwrap();

        let mut composition = Composition::new();
        composition.load(&first).unwrap();
        composition.load(&second).unwrap();

        let merged: Model = composition.merged();
        assert_eq!(
            merged.to_sysl(),
            "App:\n    One:\n        ...\n    Two:\n        ...\nOther:\n    ...\n"
        );
        let second_only = composition.filter_by_file(&second.to_string_lossy());
        assert_eq!(
            second_only.to_sysl(),
            "App:\n    Two:\n        ...\nOther:\n    ...\n"
        );
    }
}

// Tests for Sysl files that must be rejected
mod err_tests {
    use super::*;

    fn parse_fixture(filename: &str) -> SyslError {
        let source = read_test_file("err", filename);
        parse(&source, filename).expect_err("fixture should not parse")
    }

    #[test]
    fn test_inverted_range() {
        assert!(matches!(
            parse_fixture("inverted_range.sysl"),
            SyslError::Constraint(ConstraintError::Inverted { .. })
        ));
    }

    #[test]
    fn test_unclosed_params() {
        assert!(matches!(
            parse_fixture("unclosed_params.sysl"),
            SyslError::Syntax(SyntaxError::UnexpectedToken { .. })
        ));
    }

    #[test]
    fn test_bad_dedent() {
        let err = parse_fixture("bad_dedent.sysl");
        assert!(matches!(
            err,
            SyslError::Syntax(SyntaxError::MalformedIndentation { .. })
        ));
        assert_eq!(err.position().map(|p| p.line), Some(4));
    }

    #[test]
    fn test_unterminated_string() {
        assert!(matches!(
            parse_fixture("unterminated_string.sysl"),
            SyslError::Syntax(SyntaxError::UnterminatedText { .. })
        ));
    }

    #[test]
    fn test_unknown_primitive() {
        assert!(matches!(
            parse_fixture("unknown_primitive.sysl"),
            SyslError::Syntax(SyntaxError::UnknownPrimitive { .. })
        ));
    }

    #[test]
    fn test_duplicate_annotation() {
        assert!(matches!(
            parse_fixture("duplicate_annotation.sysl"),
            SyslError::DuplicateAnnotation(_)
        ));
    }

    #[test]
    fn test_duplicate_rest() {
        assert!(matches!(
            parse_fixture("duplicate_rest.sysl"),
            SyslError::Syntax(SyntaxError::DuplicateDeclaration { .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = parse_file(get_test_file_path("err", "missing.sysl")).unwrap_err();
        assert!(matches!(err, SyslError::Io { .. }));
        assert!(err.position().is_none());
    }

    #[test]
    fn test_every_err_fixture_fails_with_a_position() {
        let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("err");
        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.extension().is_some_and(|ext| ext == "sysl") {
                let err = parse_file(&path).expect_err("fixture should not parse");
                assert!(err.position().is_some(), "{path:?} gave {err:?}");
            }
        }
    }
}
