use miette::Report;
use std::fs;
use sysl_core::endpoint::{PathSegment, QueryParam};
use sysl_core::name::{escape_name, unescape_name};
use sysl_core::parser::Parser;
use sysl_core::types::Reference;
use sysl_core::{
    Annotation, AnnotationValue, AppName, Application, Constraint, Endpoint, Field, Method, Model,
    Param, Primitive, RestPath, Statement, Tag, ToSysl, Type, TypeRef,
};

#[test]
fn test_all_sysl_files() {
    let tests_dir = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/ok");
    let entries = fs::read_dir(tests_dir).expect("Failed to read tests directory");

    for entry in entries {
        let entry = entry.expect("Failed to read directory entry");
        let path = entry.path();

        if path.is_file() && path.extension().is_some_and(|ext| ext == "sysl") {
            println!("Parsing file: {path:?}");
            let source =
                fs::read_to_string(&path).unwrap_or_else(|_| panic!("Failed to read file: {path:?}"));

            let mut parser = Parser::new_with_name(&source, path.to_string_lossy().into_owned());

            match parser.parse_model() {
                Ok(model) => {
                    // Canonical output must parse back to the same model.
                    let printed = model.to_sysl();
                    let reparsed = Parser::new_with_name(&printed, path.to_string_lossy().into_owned())
                        .parse_model()
                        .unwrap_or_else(|err| {
                            panic!("Reparse of {path:?} failed: {:#?}", Report::new(err))
                        });
                    assert_eq!(reparsed, model, "{path:?} changed across a round trip");
                }
                Err(err) => panic!("Failed to parse {path:?}. Error: {:#?}", Report::new(err)),
            }
        }
    }
}

#[test]
fn test_build_model_by_hand() {
    let mut app = Application::new(AppName::from_raw(["Pet Store"]).unwrap());
    app.attrs.add_tag(Tag::new("rest"));
    app.attrs
        .add_annotation(Annotation::new(
            "description",
            AnnotationValue::MultiLine(vec!["Pets.".into(), String::new(), "  More.".into()]),
        ))
        .unwrap();

    let mut get = Endpoint::rest(
        Method::Get,
        RestPath::new(vec![
            PathSegment::Literal("pets".into()),
            PathSegment::Variable {
                name: "id".into(),
                type_ref: TypeRef::primitive(Primitive::Int),
            },
        ]),
    );
    if let Some(rest) = get.rest.as_mut() {
        rest.query.push(QueryParam {
            name: "fields".into(),
            type_ref: TypeRef::primitive(Primitive::String).optional(),
        });
    }
    get.statements.push(Statement::ret(
        "ok",
        Some(TypeRef::reference(Reference::short("Pet"))),
    ));
    app.add_endpoint(get).unwrap();

    let mut create = Endpoint::new("Create");
    create.params.push(Param::named(
        "name",
        TypeRef::primitive(Primitive::String).with_constraint(Constraint::range(1, 64).unwrap()),
    ));
    create.statements.push(Statement::call(Some("Db".parse().unwrap()), "Insert"));
    app.add_endpoint(create).unwrap();

    let mut id = Field::new("id", TypeRef::primitive(Primitive::Int));
    id.attrs.add_tag(Tag::new("pk"));
    let tags = Field::new("tags", TypeRef::primitive(Primitive::String).sequence_of());
    app.add_type(Type::new_table("Pet", vec![id, tags])).unwrap();

    let mut model = Model::new();
    model.insert(app);

    let expected = "Pet%20Store [~rest]:
    @description =:
        | Pets.
        |
        |   More.
    /pets/{id <: int}:
        GET?fields=string?:
            return ok <: Pet
    Create (name <: string(1..64)):
        Db <- Insert
    !table Pet:
        id <: int [~pk]
        tags <: sequence of string
";
    assert_eq!(model.to_sysl(), expected);
    assert_eq!(Model::from_text(expected).unwrap(), model);
}

#[test]
fn test_escaping_round_trip() {
    for raw in ["(App)Name!", "Pet Store", "naïve", "plain_name-1", "a::b"] {
        let escaped = escape_name(raw);
        assert!(escaped.chars().all(|c| c.is_ascii_alphanumeric() || "_-%".contains(c)));
        assert_eq!(unescape_name(&escaped).unwrap(), raw);
    }
    assert_eq!(escape_name("(App)Name!"), "%28App%29Name%21");
    assert_eq!(escape_name("naïve"), "na%C3%AFve");
}

#[test]
fn test_escaped_name_parses_and_unescapes() {
    let model = Model::from_text("%28App%29Name%21:\n    ...\n").unwrap();
    let app = model.app("%28App%29Name%21").unwrap();
    assert_eq!(app.name.unescaped_segments().unwrap(), ["(App)Name!"]);
    assert_eq!(app.name.last(), "%28App%29Name%21");
}

#[test]
fn test_model_merge_keeps_first_declaration() {
    let mut first = Model::from_text("App:\n    Ep:\n        first\n").unwrap();
    let second = Model::from_text("App [~late]:\n    Ep:\n        second\n    Other:\n        ...\n").unwrap();
    first.merge(second);
    assert_eq!(
        first.to_sysl(),
        "App [~late]:\n    Ep:\n        first\n    Other:\n        ...\n"
    );
}

#[test]
fn test_model_from_text_has_no_provenance() {
    let model = Model::from_text("App:\n    Ep:\n        ...\n").unwrap();
    assert!(model.filter_by_file("anything.sysl").is_empty());
    assert_eq!(model.app("App").unwrap().source, None);
}
