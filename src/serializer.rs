//! Canonical Sysl text output.

use crate::attribute::{Annotation, AnnotationValue, Attributes, Tag};
use crate::endpoint::{Endpoint, Param, QueryParam, RestPath, Statement, StatementKind};
use crate::model::{Application, Model};
use crate::types::{EnumValue, Field, Type, TypeBody};
use crate::utils::quote;

const INDENT: &str = "    ";

/// A line buffer that tracks the current block depth.
#[derive(Debug, Default)]
pub struct Printer {
    out: String,
    depth: usize,
}

impl Printer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes one line at the current depth.
    pub fn line(&mut self, text: impl AsRef<str>) {
        for _ in 0..self.depth {
            self.out.push_str(INDENT);
        }
        self.out.push_str(text.as_ref());
        self.out.push('\n');
    }

    pub fn indent(&mut self) {
        self.depth += 1;
    }

    pub fn dedent(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// The written text, without the final line break.
    #[must_use]
    pub fn finish(mut self) -> String {
        if self.out.ends_with('\n') {
            self.out.pop();
        }
        self.out
    }

    /// The written text as is.
    #[must_use]
    pub fn into_string(self) -> String {
        self.out
    }
}

/// Types that have a canonical Sysl rendering.
pub trait ToSysl {
    fn write_sysl(&self, out: &mut Printer);

    fn to_sysl(&self) -> String {
        let mut out = Printer::new();
        self.write_sysl(&mut out);
        out.finish()
    }
}

impl ToSysl for Model {
    fn write_sysl(&self, out: &mut Printer) {
        for app in self.apps.values() {
            app.write_sysl(out);
        }
    }

    /// A whole document: every line, including the last, ends with `\n`.
    fn to_sysl(&self) -> String {
        let mut out = Printer::new();
        self.write_sysl(&mut out);
        out.into_string()
    }
}

impl ToSysl for Application {
    fn write_sysl(&self, out: &mut Printer) {
        out.line(format!("{}{}:", self.name.to_sysl(), tag_suffix(&self.attrs)));
        out.indent();
        write_annotations(&self.attrs, out);

        let mut current_path: Option<&RestPath> = None;
        for endpoint in self.endpoints.values() {
            match &endpoint.rest {
                Some(rest) => {
                    if current_path != Some(&rest.path) {
                        if current_path.is_some() {
                            out.dedent();
                        }
                        out.line(format!("{}:", rest.path));
                        out.indent();
                        current_path = Some(&rest.path);
                    }
                    write_method_block(endpoint, out);
                }
                None => {
                    if current_path.take().is_some() {
                        out.dedent();
                    }
                    endpoint.write_sysl(out);
                }
            }
        }
        if current_path.is_some() {
            out.dedent();
        }

        for ty in self.types.values() {
            ty.write_sysl(out);
        }
        if self.is_empty() {
            out.line("...");
        }
        out.dedent();
    }
}

/// A REST endpoint renders under its own path header, so the text parses
/// back into the same endpoint.
impl ToSysl for Endpoint {
    fn write_sysl(&self, out: &mut Printer) {
        match &self.rest {
            Some(rest) => {
                out.line(format!("{}:", rest.path));
                out.indent();
                write_method_block(self, out);
                out.dedent();
            }
            None => write_method_block(self, out),
        }
    }
}

/// The endpoint header and body. For a REST endpoint the caller has
/// already written the path header.
fn write_method_block(endpoint: &Endpoint, out: &mut Printer) {
    let mut header = match &endpoint.rest {
        Some(rest) => {
            let mut header = rest.method.keyword().to_string();
            if !rest.query.is_empty() {
                header.push('?');
                header.push_str(&query_text(&rest.query));
            }
            header
        }
        None => endpoint.name.clone(),
    };
    if !endpoint.params.is_empty() {
        let params: Vec<String> = endpoint.params.iter().map(param_text).collect();
        header.push_str(&format!(" ({})", params.join(", ")));
    }
    out.line(format!("{header}{}:", tag_suffix(&endpoint.attrs)));
    out.indent();
    write_annotations(&endpoint.attrs, out);
    for statement in &endpoint.statements {
        statement.write_sysl(out);
    }
    if endpoint.statements.is_empty() {
        out.line("...");
    }
    out.dedent();
}

impl ToSysl for Statement {
    fn write_sysl(&self, out: &mut Printer) {
        let text = match &self.kind {
            StatementKind::Action(action) => action.text.clone(),
            StatementKind::Call(call) => {
                let target = call
                    .target
                    .as_ref()
                    .map_or_else(|| ".".to_string(), |name| name.to_sysl());
                format!("{target} <- {}", call.endpoint)
            }
            StatementKind::Return(ret) => {
                let mut text = "return".to_string();
                if !ret.payload.is_empty() {
                    text.push(' ');
                    text.push_str(&ret.payload);
                }
                if let Some(type_ref) = &ret.type_ref {
                    text.push_str(&format!(" <: {type_ref}"));
                }
                text
            }
        };
        out.line(format!("{text}{}", inline_attrs(&self.attrs)));
    }
}

impl ToSysl for Type {
    fn write_sysl(&self, out: &mut Printer) {
        out.line(format!(
            "{} {}{}:",
            self.discriminator().keyword(),
            self.name,
            tag_suffix(&self.attrs)
        ));
        out.indent();
        write_annotations(&self.attrs, out);
        match &self.body {
            TypeBody::Type(fields) | TypeBody::Table(fields) => {
                for field in fields {
                    field.write_sysl(out);
                }
            }
            TypeBody::Enum(values) => {
                for value in values {
                    value.write_sysl(out);
                }
            }
        }
        if self.is_empty() {
            out.line("...");
        }
        out.dedent();
    }
}

impl ToSysl for Field {
    fn write_sysl(&self, out: &mut Printer) {
        let line = format!("{} <: {}{}", self.name, self.type_ref, tag_suffix(&self.attrs));
        if self.attrs.annotations.is_empty() {
            out.line(line);
        } else {
            out.line(format!("{line}:"));
            out.indent();
            write_annotations(&self.attrs, out);
            out.dedent();
        }
    }
}

impl ToSysl for EnumValue {
    fn write_sysl(&self, out: &mut Printer) {
        out.line(format!("{}: {}", self.label, self.value));
    }
}

impl ToSysl for Annotation {
    fn write_sysl(&self, out: &mut Printer) {
        match &self.value {
            AnnotationValue::MultiLine(lines) => {
                out.line(format!("@{} =:", self.name));
                out.indent();
                for line in lines {
                    if line.is_empty() {
                        out.line("|");
                    } else {
                        out.line(format!("| {line}"));
                    }
                }
                out.dedent();
            }
            value => out.line(format!("@{} = {}", self.name, value_text(value))),
        }
    }
}

impl ToSysl for Tag {
    fn write_sysl(&self, out: &mut Printer) {
        out.line(format!("~{}", self.name));
    }
}

fn write_annotations(attrs: &Attributes, out: &mut Printer) {
    for annotation in &attrs.annotations {
        annotation.write_sysl(out);
    }
}

fn value_text(value: &AnnotationValue) -> String {
    fn array(items: &[String]) -> String {
        let items: Vec<String> = items.iter().map(|s| quote(s)).collect();
        format!("[{}]", items.join(", "))
    }
    match value {
        AnnotationValue::String(s) => quote(s),
        AnnotationValue::MultiLine(lines) => quote(&lines.join("\n")),
        AnnotationValue::Array(items) => array(items),
        AnnotationValue::NestedArray(rows) => {
            let rows: Vec<String> = rows.iter().map(|row| array(row)).collect();
            format!("[{}]", rows.join(", "))
        }
    }
}

/// ` [~a, ~b]`, or nothing when there are no tags.
fn tag_suffix(attrs: &Attributes) -> String {
    if attrs.tags.is_empty() {
        return String::new();
    }
    let tags: Vec<String> = attrs.tags.iter().map(|t| format!("~{}", t.name)).collect();
    format!(" [{}]", tags.join(", "))
}

/// Tags followed by annotations, for entities with no block of their own.
fn inline_attrs(attrs: &Attributes) -> String {
    if attrs.is_empty() {
        return String::new();
    }
    let items: Vec<String> = attrs
        .tags
        .iter()
        .map(|t| format!("~{}", t.name))
        .chain(
            attrs
                .annotations
                .iter()
                .map(|a| format!("{}={}", a.name, value_text(&a.value))),
        )
        .collect();
    format!(" [{}]", items.join(", "))
}

fn param_text(param: &Param) -> String {
    let text = match (&param.name, &param.type_ref) {
        (Some(name), Some(type_ref)) => format!("{name} <: {type_ref}"),
        (Some(name), None) => name.clone(),
        (None, Some(type_ref)) => type_ref.to_string(),
        (None, None) => String::new(),
    };
    format!("{text}{}", inline_attrs(&param.attrs))
}

fn query_text(query: &[QueryParam]) -> String {
    let params: Vec<String> = query
        .iter()
        .map(|q| format!("{}={}", q.name, q.type_ref))
        .collect();
    params.join("&")
}
