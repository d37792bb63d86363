use sysl_core::{parse, ToSysl};

fn main() {
    let sysl_data = r#"
Petstore [owner="pets-team"]:
    /pets:
        /{id <: int}:
            GET:
                return ok <: Pet
    !type Pet:
        id <: int [~pk]
        name <: string(1..64)
"#;

    match parse(sysl_data, "petstore.sysl") {
        Ok(model) => {
            println!("Canonical form:\n{}", model.to_sysl());
            match model.to_json() {
                Ok(json_output) => println!("As JSON:\n{json_output}"),
                Err(e) => eprintln!("Failed to export JSON: {e}"),
            }
        }
        Err(e) => {
            eprintln!("Failed to parse Sysl: {:?}", miette::Report::new(e));
        }
    }
}
