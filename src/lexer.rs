/// Represents the different kinds of tokens that the lexer can produce.
/// Each token is a meaningful unit of the Sysl surface syntax.
#[derive(Debug, PartialEq, Clone)]
pub enum TokenType {
    // == Special Tokens ==
    /// Represents the end of the input.
    Eof,
    /// Ends every non-blank line.
    Newline,
    /// The line is indented deeper than the enclosing block.
    Indent,
    /// The line closes one enclosing block. Several may precede one line.
    Dedent,
    /// Indentation that uses tabs or returns to a column no open block uses.
    BadIndent,
    /// Represents a token that could not be recognized by the lexer.
    Unknown,
    /// An identifier containing a `%` not followed by two hex digits.
    BadEscape,
    /// A string literal missing its closing quote on the same line.
    UnterminatedString,

    // == Literals ==
    /// An identifier, kept in its escaped form (`%28App%29`).
    Identifier(String),
    /// A string literal in double or single quotes, unescaped.
    String(String),
    /// An integer literal, optionally negative.
    Int(i64),
    /// The remainder of a line starting with `|`, minus one leading space.
    TextLine(String),

    // == Punctuation & Operators ==
    /// Colon: `:`
    Colon,
    /// Double Colon: `::` (separates application name segments)
    DoubleColon,
    /// Dot: `.` (separates an application name from a type name)
    Dot,
    /// Range: `..`
    DotDot,
    /// Ellipsis: `...` (empty body placeholder)
    Ellipsis,
    /// Comma: `,`
    Comma,
    /// Left Parenthesis: `(`
    LParen,
    /// Right Parenthesis: `)`
    RParen,
    /// Left Bracket: `[`
    LBracket,
    /// Right Bracket: `]`
    RBracket,
    /// Left Brace: `{`
    LBrace,
    /// Right Brace: `}`
    RBrace,
    /// At: `@` (starts an annotation)
    At,
    /// Tilde: `~` (starts a tag)
    Tilde,
    /// Bang: `!` (starts a type declaration)
    Bang,
    /// Equals: `=`
    Equals,
    /// Question: `?` (optional marker and query string start)
    Question,
    /// Ampersand: `&` (separates query parameters)
    Amp,
    /// Slash: `/` (REST path separator)
    Slash,
    /// Subtype: `<:`
    Subtype,
    /// Arrow: `<-` (call statement)
    Arrow,
}

/// A token with its type and byte position
#[derive(Debug, Clone)]
pub struct Token {
    pub ttype: TokenType,
    pub pos_start: usize,
    pub pos_end: usize,
}

impl Token {
    pub fn new(ttype: TokenType, pos_start: usize, pos_end: usize) -> Token {
        Token {
            ttype,
            pos_start,
            pos_end,
        }
    }
}

pub struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    position: usize,
    /// Columns of the open blocks; the bottom entry is always 0.
    indents: Vec<usize>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
            position: 0,
            indents: vec![0],
        }
    }

    pub fn lex(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        while self.peek().is_some() {
            self.lex_line(&mut tokens);
        }
        let end = self.position;
        while self.indents.len() > 1 {
            self.indents.pop();
            tokens.push(Token::new(TokenType::Dedent, end, end));
        }
        tokens.push(Token::new(TokenType::Eof, end, end));
        tokens
    }

    /// Lexes one physical line. Blank and comment-only lines produce nothing.
    fn lex_line(&mut self, tokens: &mut Vec<Token>) {
        let line_start = self.position;
        let mut width = 0;
        let mut has_tab = false;
        while let Some(&c) = self.peek() {
            match c {
                ' ' => width += 1,
                '\t' => {
                    has_tab = true;
                    width += 1;
                }
                _ => break,
            }
            self.advance();
        }
        let indent_end = self.position;

        match self.peek() {
            None => return,
            Some('\n' | '\r') => {
                self.skip_line_end();
                return;
            }
            Some('#') => {
                self.read_rest_of_line();
                self.skip_line_end();
                return;
            }
            Some(_) => {}
        }

        if has_tab {
            tokens.push(Token::new(TokenType::BadIndent, line_start, indent_end));
        } else {
            self.push_indentation(width, line_start, indent_end, tokens);
        }

        if self.peek() == Some(&'|') {
            let start = self.position;
            self.advance();
            let rest = self.read_rest_of_line();
            let text = rest.strip_prefix(' ').unwrap_or(&rest).to_string();
            tokens.push(Token::new(TokenType::TextLine(text), start, self.position));
        } else {
            loop {
                while matches!(self.peek(), Some(' ' | '\t')) {
                    self.advance();
                }
                if matches!(self.peek(), None | Some('\n' | '\r')) {
                    break;
                }
                tokens.push(self.next_token());
            }
        }

        let newline_start = self.position;
        self.skip_line_end();
        tokens.push(Token::new(TokenType::Newline, newline_start, self.position));
    }

    fn push_indentation(
        &mut self,
        width: usize,
        line_start: usize,
        indent_end: usize,
        tokens: &mut Vec<Token>,
    ) {
        let top = self.indents.last().copied().unwrap_or(0);
        if width > top {
            self.indents.push(width);
            tokens.push(Token::new(TokenType::Indent, line_start, indent_end));
        } else if width < top {
            while self.indents.last().is_some_and(|&open| width < open) {
                self.indents.pop();
                tokens.push(Token::new(TokenType::Dedent, line_start, indent_end));
            }
            if self.indents.last().copied().unwrap_or(0) != width {
                tokens.push(Token::new(TokenType::BadIndent, line_start, indent_end));
            }
        }
    }

    pub fn next_token(&mut self) -> Token {
        let start_pos = self.position;

        let ttype = if let Some(char) = self.advance() {
            match char {
                '(' => TokenType::LParen,
                ')' => TokenType::RParen,
                '[' => TokenType::LBracket,
                ']' => TokenType::RBracket,
                '{' => TokenType::LBrace,
                '}' => TokenType::RBrace,
                ',' => TokenType::Comma,
                '@' => TokenType::At,
                '~' => TokenType::Tilde,
                '!' => TokenType::Bang,
                '=' => TokenType::Equals,
                '?' => TokenType::Question,
                '&' => TokenType::Amp,
                '/' => TokenType::Slash,

                ':' => {
                    if self.peek() == Some(&':') {
                        self.advance();
                        TokenType::DoubleColon
                    } else {
                        TokenType::Colon
                    }
                }
                '.' => {
                    if self.peek() == Some(&'.') {
                        self.advance();
                        if self.peek() == Some(&'.') {
                            self.advance();
                            TokenType::Ellipsis
                        } else {
                            TokenType::DotDot
                        }
                    } else {
                        TokenType::Dot
                    }
                }
                '<' => match self.peek() {
                    Some(':') => {
                        self.advance();
                        TokenType::Subtype
                    }
                    Some('-') => {
                        self.advance();
                        TokenType::Arrow
                    }
                    _ => TokenType::Unknown,
                },
                '"' | '\'' => self.read_string(char),
                c if c.is_ascii_alphabetic() || c == '_' || c == '%' => self.read_identifier(c),
                c if c.is_ascii_digit()
                    || (c == '-' && self.peek().is_some_and(char::is_ascii_digit)) =>
                {
                    self.read_int(c)
                }

                _ => TokenType::Unknown,
            }
        } else {
            TokenType::Eof
        };

        Token::new(ttype, start_pos, self.position)
    }

    fn advance(&mut self) -> Option<char> {
        let char = self.chars.next();
        if let Some(c) = char {
            self.position += c.len_utf8();
        }
        char
    }

    fn peek(&mut self) -> Option<&char> {
        self.chars.peek()
    }

    fn read_rest_of_line(&mut self) -> String {
        let mut text = String::new();
        while let Some(&c) = self.peek() {
            if c == '\n' || c == '\r' {
                break;
            }
            text.push(c);
            self.advance();
        }
        text
    }

    fn skip_line_end(&mut self) {
        if self.peek() == Some(&'\r') {
            self.advance();
        }
        if self.peek() == Some(&'\n') {
            self.advance();
        }
    }

    fn read_string(&mut self, quote: char) -> TokenType {
        let mut value = String::new();
        while let Some(&c) = self.peek() {
            if c == quote {
                self.advance(); // Consume the closing quote
                return TokenType::String(value);
            }
            if c == '\n' || c == '\r' {
                break;
            }

            if c == '\\' {
                self.advance(); // Consume the backslash
                match self.peek().copied() {
                    Some('\n' | '\r') | None => break,
                    Some(escaped_char) => {
                        self.advance();
                        match escaped_char {
                            '"' => value.push('"'),
                            '\'' => value.push('\''),
                            '\\' => value.push('\\'),
                            'n' => value.push('\n'),
                            'r' => value.push('\r'),
                            't' => value.push('\t'),
                            _ => {
                                value.push('\\');
                                value.push(escaped_char);
                            }
                        }
                    }
                }
            } else {
                value.push(c);
                self.advance();
            }
        }
        TokenType::UnterminatedString
    }

    fn read_identifier(&mut self, first_char: char) -> TokenType {
        let mut ident = String::new();
        let mut valid = true;
        let mut pending = Some(first_char);

        loop {
            let c = match pending.take() {
                Some(c) => c,
                None => match self.peek() {
                    Some(&c) if c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '%' => {
                        self.advance();
                        c
                    }
                    _ => break,
                },
            };
            ident.push(c);
            if c == '%' {
                for _ in 0..2 {
                    match self.peek() {
                        Some(&h) if h.is_ascii_hexdigit() => {
                            ident.push(h);
                            self.advance();
                        }
                        _ => valid = false,
                    }
                }
            }
        }

        if valid {
            TokenType::Identifier(ident)
        } else {
            TokenType::BadEscape
        }
    }

    fn read_int(&mut self, first_char: char) -> TokenType {
        let mut number_str = String::new();
        number_str.push(first_char);

        while let Some(&c) = self.peek() {
            if c.is_ascii_digit() {
                number_str.push(c);
                self.advance();
            } else {
                break;
            }
        }

        match number_str.parse::<i64>() {
            Ok(n) => TokenType::Int(n),
            Err(_) => TokenType::Unknown,
        }
    }
}
