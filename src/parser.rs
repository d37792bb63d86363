use crate::attribute::{Annotation, AnnotationValue, Attributes, Tag};
use crate::endpoint::{Endpoint, Method, Param, PathSegment, QueryParam, RestPath, Statement};
use crate::error::{
    ConstraintError, DuplicateAnnotationError, InvalidNameError, Located, SyntaxError, SyslError,
};
use crate::lexer::{Lexer, Token, TokenType};
use crate::model::{Application, Model};
use crate::name::AppName;
use crate::types::{
    Collection, Constraint, EnumValue, Field, Primitive, Reference, Type, TypeBody, TypeRef,
};

const DEFAULT_SOURCE_NAME: &str = "source.sysl";

/// A recursive descent parser for Sysl, driven by the indentation-aware lexer.
///
/// Blocks open with a trailing `:` and an `Indent` token and close with the
/// matching `Dedent`. Nothing is backtracked except the optional trailing
/// attribute list of a statement line.
#[derive(Debug)]
pub struct Parser<'a> {
    file_name: String,
    provenance: Option<String>,
    tokens: Vec<Token>,
    position: usize,
    source_text: &'a str,
}

impl<'a> Parser<'a> {
    /// A parser for text that did not come from a file. Entities carry no provenance.
    pub fn new(source_text: &'a str) -> Self {
        let mut parser = Self::new_with_name(source_text, DEFAULT_SOURCE_NAME.to_string());
        parser.provenance = None;
        parser
    }

    /// A parser whose entities record `name` as their source file.
    pub fn new_with_name(source_text: &'a str, name: String) -> Self {
        let tokens = Lexer::new(source_text).lex();
        Self {
            provenance: Some(name.clone()),
            file_name: name,
            tokens,
            position: 0,
            source_text,
        }
    }

    // === Main Parsing Methods ===

    ///    Model ::= { Application }
    pub fn parse_model(&mut self) -> Result<Model, SyslError> {
        let mut model = Model::new();
        while !self.check(&TokenType::Eof) {
            self.parse_application(&mut model)?;
        }
        Ok(model)
    }

    /// Application ::= AppName [ Attrs ] ":" Block(AppItem)
    ///
    /// A second declaration of the same name continues the first.
    fn parse_application(&mut self, model: &mut Model) -> Result<(), SyslError> {
        let name = self.parse_app_name()?;
        log::debug!("parsing application `{name}`");
        let app = model
            .apps
            .entry(name.to_sysl())
            .or_insert_with(|| Application::new(name));
        if app.source.is_none() {
            app.source = self.provenance.clone();
        }
        if self.check(&TokenType::LBracket) {
            self.parse_attr_list(&mut app.attrs)?;
        }
        self.expect(TokenType::Colon, "':' after the application name")?;
        self.expect(TokenType::Newline, "a line break after ':'")?;
        self.parse_block(|p| p.parse_app_item(app))
    }

    /// AppItem ::= Annotation | "..." | TypeDecl | RestBlock | Endpoint
    fn parse_app_item(&mut self, app: &mut Application) -> Result<(), SyslError> {
        match self.current_token().ttype {
            TokenType::At => self.parse_block_annotation(&mut app.attrs),
            TokenType::Ellipsis => self.parse_placeholder(),
            TokenType::Bang => {
                let start = self.current_token().clone();
                let ty = self.parse_type_decl()?;
                app.add_type(ty)
                    .map_err(|ty| self.duplicate(&start, "type", &ty.name))
            }
            TokenType::Slash => self.parse_rest_block(app, &RestPath::default(), &[]),
            TokenType::Identifier(_) => {
                let start = self.current_token().clone();
                let endpoint = self.parse_endpoint()?;
                self.add_endpoint(app, endpoint, &start)
            }
            _ => self.err_unexpected("an annotation, endpoint, type, REST path or '...'"),
        }
    }

    /// Endpoint ::= Identifier [ Params ] [ Attrs ] ":" Block(EndpointItem)
    fn parse_endpoint(&mut self) -> Result<Endpoint, SyslError> {
        let name = self.parse_identifier("an endpoint name")?;
        let mut endpoint = Endpoint::new(name);
        endpoint.source = self.provenance.clone();
        if self.check(&TokenType::LParen) {
            endpoint.params = self.parse_params()?;
        }
        self.parse_endpoint_rest(&mut endpoint)?;
        Ok(endpoint)
    }

    /// The shared tail of plain and REST endpoint headers: attributes, ':' and body.
    fn parse_endpoint_rest(&mut self, endpoint: &mut Endpoint) -> Result<(), SyslError> {
        if self.check(&TokenType::LBracket) {
            self.parse_attr_list(&mut endpoint.attrs)?;
        }
        self.expect(TokenType::Colon, "':' after the endpoint header")?;
        self.expect(TokenType::Newline, "a line break after ':'")?;
        self.parse_block(|p| p.parse_endpoint_item(endpoint))
    }

    /// EndpointItem ::= Annotation | "..." | Statement
    fn parse_endpoint_item(&mut self, endpoint: &mut Endpoint) -> Result<(), SyslError> {
        match self.current_token().ttype {
            TokenType::At => self.parse_block_annotation(&mut endpoint.attrs),
            TokenType::Ellipsis => self.parse_placeholder(),
            TokenType::Indent | TokenType::BadIndent => {
                self.err_unexpected("a statement at the block's indentation")
            }
            _ => {
                let statement = self.parse_statement()?;
                endpoint.statements.push(statement);
                Ok(())
            }
        }
    }

    /// RestBlock ::= Path [ Query ] ":" Block(RestBlock | MethodBlock)
    ///
    /// `prefix` and `query` accumulate down nested path blocks; nothing is
    /// committed to the application until a method block is reached.
    fn parse_rest_block(
        &mut self,
        app: &mut Application,
        prefix: &RestPath,
        query: &[QueryParam],
    ) -> Result<(), SyslError> {
        let path = prefix.join(&self.parse_path()?);
        let mut query = query.to_vec();
        if self.match_token(&TokenType::Question) {
            query.extend(self.parse_query()?);
        }
        self.expect(TokenType::Colon, "':' after the REST path")?;
        self.expect(TokenType::Newline, "a line break after ':'")?;
        log::trace!("entering REST path {path}");
        self.parse_block(|p| {
            if p.check(&TokenType::Slash) {
                p.parse_rest_block(app, &path, &query)
            } else if p.at_method() {
                p.parse_method_block(app, &path, &query)
            } else {
                p.err_unexpected("an HTTP method or a nested REST path")
            }
        })
    }

    fn at_method(&self) -> bool {
        matches!(&self.current_token().ttype, TokenType::Identifier(word) if Method::from_keyword(word).is_some())
    }

    /// MethodBlock ::= Method [ Query ] [ Params ] [ Attrs ] ":" Block(EndpointItem)
    fn parse_method_block(
        &mut self,
        app: &mut Application,
        path: &RestPath,
        query: &[QueryParam],
    ) -> Result<(), SyslError> {
        let start = self.current_token().clone();
        let method = match &start.ttype {
            TokenType::Identifier(word) => Method::from_keyword(word),
            _ => None,
        };
        let Some(method) = method else {
            return self.err_unexpected("an HTTP method");
        };
        self.advance();

        let mut endpoint = Endpoint::rest(method, path.clone());
        endpoint.source = self.provenance.clone();
        if let Some(rest) = endpoint.rest.as_mut() {
            rest.query = query.to_vec();
            if self.match_token(&TokenType::Question) {
                rest.query.extend(self.parse_query()?);
            }
        }
        if self.check(&TokenType::LParen) {
            endpoint.params = self.parse_params()?;
        }
        self.parse_endpoint_rest(&mut endpoint)?;
        log::trace!("committing REST endpoint {}", endpoint.name);
        self.add_endpoint(app, endpoint, &start)
    }

    /// Path ::= "/" [ Segment ] { "/" [ Segment ] }
    fn parse_path(&mut self) -> Result<RestPath, SyslError> {
        let mut segments = Vec::new();
        while self.match_token(&TokenType::Slash) {
            match self.current_token().ttype {
                TokenType::LBrace => {
                    self.advance();
                    let name = self.parse_identifier("a path variable name")?;
                    self.expect(TokenType::Subtype, "'<:' after the path variable name")?;
                    let type_ref = self.parse_type_ref()?;
                    self.expect(TokenType::RBrace, "'}' to close the path variable")?;
                    segments.push(PathSegment::Variable { name, type_ref });
                }
                TokenType::Identifier(_) | TokenType::Int(_) => {
                    segments.push(PathSegment::Literal(self.parse_path_literal()));
                }
                TokenType::BadEscape => return self.err_unexpected("a path segment"),
                _ => {}
            }
        }
        Ok(RestPath::new(segments))
    }

    /// Glues adjacent identifier and number tokens, so `/2fa` is one segment.
    /// A `.` joins in only between two such tokens, as in `/v1.0` or `/report.json`.
    fn parse_path_literal(&mut self) -> String {
        let start = self.current_token().pos_start;
        let mut end = start;
        loop {
            let token = self.current_token();
            if token.pos_start != end {
                break;
            }
            let glued = match token.ttype {
                TokenType::Identifier(_) | TokenType::Int(_) => true,
                TokenType::Dot => {
                    let next = self.peek_token();
                    end != start
                        && next.pos_start == token.pos_end
                        && matches!(next.ttype, TokenType::Identifier(_) | TokenType::Int(_))
                }
                _ => false,
            };
            if !glued {
                break;
            }
            end = token.pos_end;
            self.advance();
        }
        self.source_text[start..end].to_string()
    }

    /// Query ::= QueryParam { "&" QueryParam }   QueryParam ::= Identifier "=" TypeRef
    fn parse_query(&mut self) -> Result<Vec<QueryParam>, SyslError> {
        let mut params = Vec::new();
        loop {
            let name = self.parse_identifier("a query parameter name")?;
            self.expect(TokenType::Equals, "'=' after the query parameter name")?;
            let type_ref = self.parse_type_ref()?;
            params.push(QueryParam { name, type_ref });
            if !self.match_token(&TokenType::Amp) {
                break;
            }
        }
        Ok(params)
    }

    /// Params ::= "(" Param { "," Param } ")"
    fn parse_params(&mut self) -> Result<Vec<Param>, SyslError> {
        self.expect(TokenType::LParen, "'('")?;
        let mut params = Vec::new();
        loop {
            params.push(self.parse_param()?);
            if !self.match_token(&TokenType::Comma) {
                break;
            }
        }
        self.expect(TokenType::RParen, "',' or ')' in the parameter list")?;
        Ok(params)
    }

    /// Param ::= Identifier "<:" TypeRef [ Attrs ] | TypeRef [ Attrs ] | Identifier [ Attrs ]
    fn parse_param(&mut self) -> Result<Param, SyslError> {
        let mut param = if self.peek_is(&TokenType::Subtype) {
            let name = self.parse_identifier("a parameter name")?;
            self.advance();
            Param::named(name, self.parse_type_ref()?)
        } else if self.at_bare_name() {
            Param::bare(self.parse_identifier("a parameter name")?)
        } else {
            Param::unnamed(self.parse_type_ref()?)
        };
        if self.check(&TokenType::LBracket) {
            self.parse_attr_list(&mut param.attrs)?;
        }
        Ok(param)
    }

    /// True when the current identifier stands alone rather than starting a type.
    fn at_bare_name(&self) -> bool {
        let TokenType::Identifier(word) = &self.current_token().ttype else {
            return false;
        };
        if Primitive::from_keyword(word).is_some() || self.at_collection_keyword().is_some() {
            return false;
        }
        !matches!(
            self.peek_token().ttype,
            TokenType::Dot | TokenType::DoubleColon | TokenType::Question | TokenType::LParen
        )
    }

    fn at_collection_keyword(&self) -> Option<Collection> {
        let TokenType::Identifier(word) = &self.current_token().ttype else {
            return None;
        };
        let collection = match word.as_str() {
            "set" => Collection::Set,
            "sequence" => Collection::Sequence,
            _ => return None,
        };
        match &self.peek_token().ttype {
            TokenType::Identifier(of) if of == "of" => Some(collection),
            _ => None,
        }
    }

    /// TypeRef ::= [ ("set" | "sequence") "of" ] ( Primitive [ Constraint ] | Reference ) [ "?" ]
    /// Reference ::= Identifier | AppName "." Identifier
    fn parse_type_ref(&mut self) -> Result<TypeRef, SyslError> {
        let collection = self.at_collection_keyword();
        if collection.is_some() {
            self.advance();
            self.advance();
        }

        let start = self.current_token().clone();
        let first = self.parse_identifier("a type")?;
        let mut type_ref = if self.check(&TokenType::DoubleColon) || self.check(&TokenType::Dot) {
            let mut segments = vec![first];
            while self.match_token(&TokenType::DoubleColon) {
                segments.push(self.parse_identifier("an application name segment")?);
            }
            self.expect(TokenType::Dot, "'.' and a type name after the application name")?;
            let name = self.parse_identifier("a type name")?;
            TypeRef::reference(Reference::qualified(AppName::from_validated(segments), name))
        } else if let Some(primitive) = Primitive::from_keyword(&first) {
            let mut type_ref = TypeRef::primitive(primitive);
            if self.check(&TokenType::LParen) {
                type_ref.constraint = Some(self.parse_constraint(primitive)?);
            }
            type_ref
        } else if self.check(&TokenType::LParen) {
            return Err(self.unknown_primitive(&start, &first));
        } else {
            TypeRef::reference(Reference::short(first))
        };

        type_ref.collection = collection;
        type_ref.optional = self.match_token(&TokenType::Question);
        Ok(type_ref)
    }

    /// Constraint ::= "(" Int [ ".." [ Int ] | "." Int ] ")"
    fn parse_constraint(&mut self, primitive: Primitive) -> Result<Constraint, SyslError> {
        let open = self.current_token().clone();
        self.expect(TokenType::LParen, "'('")?;
        let first = self.parse_int("a number in the constraint")?;
        let constraint = if self.match_token(&TokenType::DotDot) {
            if matches!(self.current_token().ttype, TokenType::Int(_)) {
                let max = self.parse_int("an upper bound")?;
                if max < first {
                    let close = self.previous_token().pos_end;
                    let located = self.locate(open.pos_start, close);
                    return Err(ConstraintError::Inverted {
                        src: located.src,
                        span: located.span,
                        min: first,
                        max,
                        position: located.position,
                    }
                    .into());
                }
                Constraint::Range {
                    min: first,
                    max: Some(max),
                }
            } else {
                Constraint::open(first)
            }
        } else if self.match_token(&TokenType::Dot) {
            let scale = self.parse_int("a decimal scale")?;
            match (u32::try_from(first), u32::try_from(scale)) {
                (Ok(precision), Ok(scale)) => Constraint::decimal(precision, scale),
                _ => {
                    let end = self.previous_token().pos_end;
                    return Err(self.malformed_constraint(
                        open.pos_start,
                        end,
                        "precision and scale must not be negative",
                    ));
                }
            }
        } else {
            Constraint::bound(first)
        };
        self.expect(TokenType::RParen, "')' to close the constraint")?;

        if !primitive.accepts(&constraint) {
            let end = self.previous_token().pos_end;
            return Err(self.malformed_constraint(
                open.pos_start,
                end,
                &format!("{constraint} is not a valid constraint for {primitive}"),
            ));
        }
        Ok(constraint)
    }

    /// TypeDecl ::= ("!type" | "!table" | "!enum") Identifier [ Attrs ] ":" Block(TypeItem)
    fn parse_type_decl(&mut self) -> Result<Type, SyslError> {
        self.expect(TokenType::Bang, "'!'")?;
        let body = match &self.current_token().ttype {
            TokenType::Identifier(k) if k == "type" => TypeBody::Type(Vec::new()),
            TokenType::Identifier(k) if k == "table" => TypeBody::Table(Vec::new()),
            TokenType::Identifier(k) if k == "enum" => TypeBody::Enum(Vec::new()),
            _ => return self.err_unexpected("'type', 'table' or 'enum' after '!'"),
        };
        self.advance();
        let name = self.parse_identifier("a type name")?;
        let mut ty = Type {
            name,
            attrs: Attributes::new(),
            body,
            source: self.provenance.clone(),
        };
        if self.check(&TokenType::LBracket) {
            self.parse_attr_list(&mut ty.attrs)?;
        }
        self.expect(TokenType::Colon, "':' after the type name")?;
        self.expect(TokenType::Newline, "a line break after ':'")?;

        let Type { attrs, body, .. } = &mut ty;
        self.parse_block(|p| match p.current_token().ttype {
            TokenType::At => p.parse_block_annotation(attrs),
            TokenType::Ellipsis => p.parse_placeholder(),
            _ => match &mut *body {
                TypeBody::Type(fields) | TypeBody::Table(fields) => {
                    let field = p.parse_field()?;
                    fields.push(field);
                    Ok(())
                }
                TypeBody::Enum(values) => {
                    let value = p.parse_enum_value()?;
                    values.push(value);
                    Ok(())
                }
            },
        })?;
        Ok(ty)
    }

    /// Field ::= Identifier "<:" TypeRef [ Attrs ] [ ":" Block(Annotation) ]
    fn parse_field(&mut self) -> Result<Field, SyslError> {
        let name = self.parse_identifier("a field name")?;
        self.expect(TokenType::Subtype, "'<:' after the field name")?;
        let mut field = Field::new(name, self.parse_type_ref()?);
        if self.check(&TokenType::LBracket) {
            self.parse_attr_list(&mut field.attrs)?;
        }
        if self.match_token(&TokenType::Colon) {
            self.expect(TokenType::Newline, "a line break after ':'")?;
            let attrs = &mut field.attrs;
            self.parse_block(|p| match p.current_token().ttype {
                TokenType::At => p.parse_block_annotation(attrs),
                TokenType::Ellipsis => p.parse_placeholder(),
                _ => p.err_unexpected("an annotation"),
            })?;
        } else {
            self.expect(TokenType::Newline, "the end of the field")?;
        }
        Ok(field)
    }

    /// EnumValue ::= Identifier ":" Int
    fn parse_enum_value(&mut self) -> Result<EnumValue, SyslError> {
        let label = self.parse_identifier("an enum label")?;
        self.expect(TokenType::Colon, "':' after the enum label")?;
        let value = self.parse_int("the enum value")?;
        self.expect(TokenType::Newline, "the end of the enum value")?;
        Ok(EnumValue { label, value })
    }

    /// Statement ::= "return" Text [ "<:" TypeRef ] [ Attrs ]
    ///             | ( "." | AppName ) "<-" Text [ Attrs ]
    ///             | Text [ Attrs ]
    fn parse_statement(&mut self) -> Result<Statement, SyslError> {
        let start = self.position;
        let line_end = self.tokens[start..]
            .iter()
            .position(|t| matches!(t.ttype, TokenType::Newline | TokenType::Eof))
            .map_or(self.tokens.len() - 1, |offset| start + offset);

        let mut attrs = Attributes::new();
        let content_end = self.trailing_attrs(start, line_end, &mut attrs)?;
        if content_end == start {
            return self.err_unexpected("a statement");
        }

        let is_return =
            matches!(&self.tokens[start].ttype, TokenType::Identifier(word) if word == "return");
        let arrow = self.tokens[start..content_end]
            .iter()
            .position(|t| t.ttype == TokenType::Arrow);
        let mut statement = match arrow {
            _ if is_return => self.parse_return(start + 1, content_end)?,
            Some(offset) => self.parse_call(start, start + offset, content_end)?,
            None => Statement::action(self.text_between(start, content_end)),
        };
        statement.attrs = attrs;

        self.position = line_end;
        self.expect(TokenType::Newline, "the end of the statement")?;
        Ok(statement)
    }

    /// Parses a trailing `[...]` attribute list on a statement line, if there is
    /// one. Returns the token index where the statement's own content ends.
    fn trailing_attrs(
        &mut self,
        start: usize,
        line_end: usize,
        attrs: &mut Attributes,
    ) -> Result<usize, SyslError> {
        if line_end == start || self.tokens[line_end - 1].ttype != TokenType::RBracket {
            return Ok(line_end);
        }
        let mut depth = 0usize;
        let mut open = None;
        for index in (start..line_end).rev() {
            match self.tokens[index].ttype {
                TokenType::RBracket => depth += 1,
                TokenType::LBracket => {
                    depth -= 1;
                    if depth == 0 {
                        open = Some(index);
                        break;
                    }
                }
                _ => {}
            }
        }
        let Some(open) = open else {
            return Ok(line_end);
        };
        // Only a bracket set apart by whitespace is an attribute list; `a[0]` is text.
        if open == start || self.tokens[open - 1].pos_end == self.tokens[open].pos_start {
            return Ok(line_end);
        }

        self.position = open;
        let mut parsed = Attributes::new();
        match self.parse_attr_list(&mut parsed) {
            Ok(()) if self.position == line_end => {
                *attrs = parsed;
                Ok(open)
            }
            Err(err @ SyslError::DuplicateAnnotation(_)) => Err(err),
            _ => Ok(line_end),
        }
    }

    fn parse_return(&mut self, start: usize, end: usize) -> Result<Statement, SyslError> {
        let subtype = self.tokens[start..end]
            .iter()
            .position(|t| t.ttype == TokenType::Subtype)
            .map(|offset| start + offset);
        let Some(subtype) = subtype else {
            return Ok(Statement::ret(self.text_between(start, end), None));
        };
        let payload = self.text_between(start, subtype);
        self.position = subtype + 1;
        let type_ref = self.parse_type_ref()?;
        if self.position != end {
            return self.err_unexpected("the end of the return type");
        }
        Ok(Statement::ret(payload, Some(type_ref)))
    }

    fn parse_call(&mut self, start: usize, arrow: usize, end: usize) -> Result<Statement, SyslError> {
        self.position = start;
        let target = if self.tokens[start].ttype == TokenType::Dot && arrow == start + 1 {
            None
        } else {
            let name = self.parse_app_name()?;
            if self.position != arrow {
                return self.err_unexpected("'<-' after the call target");
            }
            Some(name)
        };
        self.position = arrow + 1;
        let endpoint = self.text_between(arrow + 1, end);
        if endpoint.is_empty() {
            return self.err_unexpected("an endpoint name after '<-'");
        }
        Ok(Statement::call(target, endpoint))
    }

    /// The source text covered by tokens `start..end`, trimmed.
    fn text_between(&self, start: usize, end: usize) -> String {
        if start >= end {
            return String::new();
        }
        let from = self.tokens[start].pos_start;
        let to = self.tokens[end - 1].pos_end;
        self.source_text[from..to].trim().to_string()
    }

    // === Attributes ===

    /// Annotation ::= "@" Identifier "=" Value NEWLINE
    ///              | "@" Identifier "=" ":" NEWLINE INDENT { TextLine NEWLINE } DEDENT
    fn parse_block_annotation(&mut self, attrs: &mut Attributes) -> Result<(), SyslError> {
        self.expect(TokenType::At, "'@'")?;
        let name_token = self.current_token().clone();
        let name = self.parse_identifier("an annotation name")?;
        self.expect(TokenType::Equals, "'=' after the annotation name")?;

        let value = if self.check(&TokenType::Colon) {
            let colon = self.current_token().clone();
            self.advance();
            self.expect(TokenType::Newline, "a line break after '=:'")?;
            self.parse_text_lines(&colon)?
        } else {
            let value = self.parse_annotation_value()?;
            self.expect(TokenType::Newline, "the end of the annotation")?;
            value
        };
        self.add_annotation(attrs, Annotation::new(name, value), &name_token)
    }

    fn parse_text_lines(&mut self, opener: &Token) -> Result<AnnotationValue, SyslError> {
        if !self.match_token(&TokenType::Indent) {
            let located = self.locate(opener.pos_start, opener.pos_end);
            return Err(SyntaxError::UnterminatedText {
                src: located.src,
                span: located.span,
                what: "multi-line annotation".to_string(),
                position: located.position,
            }
            .into());
        }
        let mut lines = Vec::new();
        while !self.match_token(&TokenType::Dedent) {
            match &self.current_token().ttype {
                TokenType::TextLine(text) => {
                    lines.push(text.clone());
                    self.advance();
                    self.expect(TokenType::Newline, "the end of the text line")?;
                }
                _ => return self.err_unexpected("a '|' line"),
            }
        }
        Ok(AnnotationValue::MultiLine(lines))
    }

    /// Value ::= String | "[" String { "," String } "]" | "[" Array { "," Array } "]"
    fn parse_annotation_value(&mut self) -> Result<AnnotationValue, SyslError> {
        if let TokenType::String(s) = &self.current_token().ttype {
            let s = s.clone();
            self.advance();
            return Ok(AnnotationValue::String(s));
        }
        if !self.check(&TokenType::LBracket) {
            return self.err_unexpected("a string or an array");
        }
        if matches!(self.peek_token().ttype, TokenType::LBracket) {
            self.advance();
            let mut rows = Vec::new();
            loop {
                rows.push(self.parse_string_array()?);
                if !self.match_token(&TokenType::Comma) {
                    break;
                }
            }
            self.expect(TokenType::RBracket, "',' or ']' in the nested array")?;
            Ok(AnnotationValue::NestedArray(rows))
        } else {
            Ok(AnnotationValue::Array(self.parse_string_array()?))
        }
    }

    fn parse_string_array(&mut self) -> Result<Vec<String>, SyslError> {
        self.expect(TokenType::LBracket, "'['")?;
        let mut items = Vec::new();
        if self.match_token(&TokenType::RBracket) {
            return Ok(items);
        }
        loop {
            match &self.current_token().ttype {
                TokenType::String(s) => {
                    items.push(s.clone());
                    self.advance();
                }
                _ => return self.err_unexpected("a string in the array"),
            }
            if !self.match_token(&TokenType::Comma) {
                break;
            }
        }
        self.expect(TokenType::RBracket, "',' or ']' in the array")?;
        Ok(items)
    }

    /// Attrs ::= "[" Attr { "," Attr } "]"   Attr ::= "~" Identifier | Identifier "=" Value
    fn parse_attr_list(&mut self, attrs: &mut Attributes) -> Result<(), SyslError> {
        self.expect(TokenType::LBracket, "'['")?;
        loop {
            if self.match_token(&TokenType::Tilde) {
                let name = self.parse_identifier("a tag name")?;
                attrs.add_tag(Tag::new(name));
            } else {
                let name_token = self.current_token().clone();
                let name = self.parse_identifier("a tag or an annotation")?;
                self.expect(TokenType::Equals, "'=' after the annotation name")?;
                let value = self.parse_annotation_value()?;
                self.add_annotation(attrs, Annotation::new(name, value), &name_token)?;
            }
            if !self.match_token(&TokenType::Comma) {
                break;
            }
        }
        self.expect(TokenType::RBracket, "',' or ']' in the attribute list")
    }

    // === Small Rules ===

    /// AppName ::= Identifier { "::" Identifier }
    fn parse_app_name(&mut self) -> Result<AppName, SyslError> {
        let mut segments = vec![self.parse_identifier("an application name")?];
        while self.match_token(&TokenType::DoubleColon) {
            segments.push(self.parse_identifier("an application name segment after '::'")?);
        }
        Ok(AppName::from_validated(segments))
    }

    fn parse_identifier(&mut self, expected: &str) -> Result<String, SyslError> {
        match &self.current_token().ttype {
            TokenType::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => self.err_unexpected(expected),
        }
    }

    fn parse_int(&mut self, expected: &str) -> Result<i64, SyslError> {
        match self.current_token().ttype {
            TokenType::Int(n) => {
                self.advance();
                Ok(n)
            }
            _ => self.err_unexpected(expected),
        }
    }

    fn parse_placeholder(&mut self) -> Result<(), SyslError> {
        self.expect(TokenType::Ellipsis, "'...'")?;
        self.expect(TokenType::Newline, "the end of the line after '...'")
    }

    /// Block ::= INDENT Item { Item } DEDENT
    fn parse_block<F>(&mut self, mut item: F) -> Result<(), SyslError>
    where
        F: FnMut(&mut Self) -> Result<(), SyslError>,
    {
        self.expect(TokenType::Indent, "an indented block")?;
        while !self.match_token(&TokenType::Dedent) {
            item(self)?;
        }
        Ok(())
    }

    // === Model Helpers ===

    fn add_endpoint(
        &self,
        app: &mut Application,
        endpoint: Endpoint,
        start: &Token,
    ) -> Result<(), SyslError> {
        app.add_endpoint(endpoint)
            .map_err(|endpoint| self.duplicate(start, "endpoint", &endpoint.name))
    }

    fn add_annotation(
        &self,
        attrs: &mut Attributes,
        annotation: Annotation,
        name_token: &Token,
    ) -> Result<(), SyslError> {
        attrs.add_annotation(annotation).map_err(|annotation| {
            let located = self.locate(name_token.pos_start, name_token.pos_end);
            DuplicateAnnotationError {
                src: located.src,
                span: located.span,
                name: annotation.name,
                position: located.position,
            }
            .into()
        })
    }

    // === Tokenizer Helper Methods ===

    fn current_token(&self) -> &Token {
        // The lexer always ends the stream with `Eof`, and `advance` never passes it.
        &self.tokens[self.position.min(self.tokens.len() - 1)]
    }

    fn previous_token(&self) -> &Token {
        &self.tokens[self.position.saturating_sub(1).min(self.tokens.len() - 1)]
    }

    fn peek_token(&self) -> &Token {
        &self.tokens[(self.position + 1).min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() - 1 {
            self.position += 1;
        }
    }

    fn expect(&mut self, expected: TokenType, description: &str) -> Result<(), SyslError> {
        if self.check(&expected) {
            self.advance();
            Ok(())
        } else {
            self.err_unexpected(description)
        }
    }

    fn match_token(&mut self, ttype: &TokenType) -> bool {
        if self.check(ttype) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn check(&self, ttype: &TokenType) -> bool {
        std::mem::discriminant(&self.current_token().ttype) == std::mem::discriminant(ttype)
    }

    fn peek_is(&self, ttype: &TokenType) -> bool {
        std::mem::discriminant(&self.peek_token().ttype) == std::mem::discriminant(ttype)
    }

    // === Errors ===

    fn locate(&self, start: usize, end: usize) -> Located {
        Located::new(
            &self.file_name,
            self.source_text,
            start,
            end.saturating_sub(start),
        )
    }

    /// Reports the current token, picking the error kind from what the lexer saw.
    fn err_unexpected<T>(&self, expected: &str) -> Result<T, SyslError> {
        let token = self.current_token();
        log::trace!("unexpected {:?}, expected {expected}", token.ttype);
        let located = self.locate(token.pos_start, token.pos_end);
        let err: SyslError = match &token.ttype {
            TokenType::Eof => SyntaxError::UnexpectedEof {
                src: located.src,
                span: located.span,
                position: located.position,
            }
            .into(),
            TokenType::Indent | TokenType::BadIndent => SyntaxError::MalformedIndentation {
                src: located.src,
                span: located.span,
                position: located.position,
            }
            .into(),
            TokenType::UnterminatedString => SyntaxError::UnterminatedText {
                src: located.src,
                span: located.span,
                what: "string".to_string(),
                position: located.position,
            }
            .into(),
            TokenType::BadEscape => InvalidNameError::IllegalEscape {
                src: located.src,
                span: located.span,
                name: self.source_text[token.pos_start..token.pos_end].to_string(),
                position: located.position,
            }
            .into(),
            _ => SyntaxError::UnexpectedToken {
                src: located.src,
                span: located.span,
                expected: expected.to_string(),
                position: located.position,
            }
            .into(),
        };
        Err(err)
    }

    fn unknown_primitive(&self, token: &Token, keyword: &str) -> SyslError {
        let located = self.locate(token.pos_start, token.pos_end);
        SyntaxError::UnknownPrimitive {
            src: located.src,
            span: located.span,
            keyword: keyword.to_string(),
            position: located.position,
        }
        .into()
    }

    fn malformed_constraint(&self, start: usize, end: usize, message: &str) -> SyslError {
        let located = self.locate(start, end);
        ConstraintError::Malformed {
            src: located.src,
            span: located.span,
            message: message.to_string(),
            position: located.position,
        }
        .into()
    }

    fn duplicate(&self, start: &Token, what: &str, name: &str) -> SyslError {
        let located = self.locate(start.pos_start, start.pos_end);
        SyntaxError::DuplicateDeclaration {
            src: located.src,
            span: located.span,
            what: what.to_string(),
            name: name.to_string(),
            position: located.position,
        }
        .into()
    }
}
