//! Lexical analysis (tokenization) for the host language.
//!
//! The lexer is line oriented in the way indentation-structured languages
//! are: it tracks bracket depth so newlines inside `(...)`/`[...]` are
//! ignored, and it turns changes in leading whitespace into
//! [`TokenKind::Indent`] / [`TokenKind::Dedent`] tokens.

use thiserror::Error;

/// A raw piece of an f-string body, before its fields are parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FStringPiece {
    /// Literal text, with `{{`/`}}` already collapsed.
    Literal(String),
    /// A `{source}` or `{source:spec}` field.
    Field { source: String, spec: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Name(String),
    Int(i64),
    Str(String),
    FString(Vec<FStringPiece>),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Dot,
    Assign,
    Plus,
    Minus,
    Star,
    DoubleSlash,
    Percent,
    Tilde,
    EqEq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    /// End of a logical line.
    Newline,
    Indent,
    Dedent,
    Eof,
}

/// A token with the position of its first character (1-based).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
}

/// Classifies a lexer error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexErrorKind {
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("f-string: expecting '}}'")]
    UnterminatedField,
    #[error("f-string: single '}}' is not allowed")]
    StrayBrace,
    #[error("f-string: empty expression not allowed")]
    EmptyField,
    #[error("unexpected character {0:?}")]
    UnexpectedCharacter(char),
    #[error("integer literal is too large")]
    IntegerOverflow,
    #[error("unindent does not match any outer indentation level")]
    InconsistentDedent,
    #[error("unexpected end of input after line continuation")]
    DanglingContinuation,
    #[error("unclosed bracket")]
    UnclosedBracket,
}

/// Error produced during lexing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} at line {line}, column {column}")]
pub struct LexError {
    pub kind: LexErrorKind,
    pub line: usize,
    pub column: usize,
}

impl LexError {
    /// True when more input could still turn the source into valid code.
    pub fn is_incomplete(&self) -> bool {
        matches!(
            self.kind,
            LexErrorKind::DanglingContinuation | LexErrorKind::UnclosedBracket
        )
    }
}

struct LexingFSM {
    input: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    indents: Vec<usize>,
    depth: usize,
    at_line_start: bool,
    tokens: Vec<Token>,
}

impl LexingFSM {
    fn new(source: &str) -> Self {
        LexingFSM {
            input: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            indents: vec![0],
            depth: 0,
            at_line_start: true,
            tokens: Vec::new(),
        }
    }

    fn make_tokens(mut self) -> Result<Vec<Token>, LexError> {
        loop {
            if self.at_line_start && self.depth == 0 {
                if !self.handle_indentation()? {
                    break;
                }
                continue;
            }

            let Some(ch) = self.peek_char() else {
                break;
            };
            let (line, column) = (self.line, self.column);
            match ch {
                ' ' | '\t' | '\r' | '\x0c' => {
                    self.read_char();
                }
                '#' => self.skip_comment(),
                '\\' => self.handle_continuation()?,
                '\n' => {
                    self.read_char();
                    if self.depth == 0 {
                        self.push_newline(line, column);
                        self.at_line_start = true;
                    }
                }
                '\'' | '"' => {
                    let text = self.read_string_body()?;
                    self.push(TokenKind::Str(text), line, column);
                }
                c if c.is_alphabetic() || c == '_' => self.handle_word(line, column)?,
                c if c.is_ascii_digit() => self.handle_number(line, column)?,
                _ => self.handle_operator(line, column)?,
            }
        }

        self.finish()
    }

    fn read_char(&mut self) -> Option<char> {
        let ch = self.input.get(self.pos).copied();
        if let Some(c) = ch {
            self.pos += 1;
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        ch
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn peek_next_char(&self) -> Option<char> {
        self.input.get(self.pos + 1).copied()
    }

    fn error(&self, kind: LexErrorKind, line: usize, column: usize) -> LexError {
        LexError { kind, line, column }
    }

    fn push(&mut self, kind: TokenKind, line: usize, column: usize) {
        self.tokens.push(Token { kind, line, column });
    }

    fn push_newline(&mut self, line: usize, column: usize) {
        let needs_newline = !matches!(
            self.tokens.last(),
            None | Some(Token {
                kind: TokenKind::Newline | TokenKind::Indent | TokenKind::Dedent,
                ..
            })
        );
        if needs_newline {
            self.push(TokenKind::Newline, line, column);
        }
    }

    /// Measures the leading whitespace of a fresh line and emits INDENT/DEDENT.
    ///
    /// Blank and comment-only lines are consumed without producing tokens.
    /// Returns `false` when the input ends before any code is found.
    fn handle_indentation(&mut self) -> Result<bool, LexError> {
        loop {
            let mut width = 0;
            while let Some(ch) = self.peek_char() {
                match ch {
                    ' ' => width += 1,
                    '\t' => width = (width / 8 + 1) * 8,
                    '\r' | '\x0c' => {}
                    _ => break,
                }
                self.read_char();
            }

            match self.peek_char() {
                None => return Ok(false),
                Some('\n') => {
                    self.read_char();
                }
                Some('#') => self.skip_comment(),
                Some(_) => {
                    self.at_line_start = false;
                    self.apply_indent(width)?;
                    return Ok(true);
                }
            }
        }
    }

    fn apply_indent(&mut self, width: usize) -> Result<(), LexError> {
        let (line, column) = (self.line, self.column);
        let current = self.indents.last().copied().unwrap_or(0);
        if width > current {
            self.indents.push(width);
            self.push(TokenKind::Indent, line, column);
            return Ok(());
        }

        while width < self.indents.last().copied().unwrap_or(0) {
            self.indents.pop();
            self.push(TokenKind::Dedent, line, column);
        }
        if width != self.indents.last().copied().unwrap_or(0) {
            return Err(self.error(LexErrorKind::InconsistentDedent, line, column));
        }
        Ok(())
    }

    fn skip_comment(&mut self) {
        while let Some(ch) = self.peek_char() {
            if ch == '\n' {
                break;
            }
            self.read_char();
        }
    }

    fn handle_continuation(&mut self) -> Result<(), LexError> {
        let (line, column) = (self.line, self.column);
        self.read_char();
        if self.peek_char() == Some('\r') {
            self.read_char();
        }
        match self.peek_char() {
            Some('\n') => {
                self.read_char();
                Ok(())
            }
            None => Err(self.error(LexErrorKind::DanglingContinuation, line, column)),
            Some(_) => Err(self.error(LexErrorKind::UnexpectedCharacter('\\'), line, column)),
        }
    }

    fn handle_word(&mut self, line: usize, column: usize) -> Result<(), LexError> {
        let mut word = String::new();
        while let Some(ch) = self.peek_char() {
            if !(ch.is_alphanumeric() || ch == '_') {
                break;
            }
            word.push(ch);
            self.read_char();
        }

        let is_fstring_prefix = word == "f" || word == "F";
        if is_fstring_prefix && matches!(self.peek_char(), Some('\'' | '"')) {
            let body = self.read_string_body()?;
            let pieces = split_fstring(&body).map_err(|kind| self.error(kind, line, column))?;
            self.push(TokenKind::FString(pieces), line, column);
        } else {
            self.push(TokenKind::Name(word), line, column);
        }
        Ok(())
    }

    fn handle_number(&mut self, line: usize, column: usize) -> Result<(), LexError> {
        let mut digits = String::new();
        while let Some(ch) = self.peek_char() {
            match ch {
                '0'..='9' => digits.push(ch),
                '_' => {}
                _ => break,
            }
            self.read_char();
        }
        let value = digits
            .parse::<i64>()
            .map_err(|_| self.error(LexErrorKind::IntegerOverflow, line, column))?;
        self.push(TokenKind::Int(value), line, column);
        Ok(())
    }

    /// Reads a quoted string starting at the opening quote and returns its
    /// contents with escape sequences resolved.
    fn read_string_body(&mut self) -> Result<String, LexError> {
        let (line, column) = (self.line, self.column);
        let Some(quote) = self.read_char() else {
            return Err(self.error(LexErrorKind::UnterminatedString, line, column));
        };

        let mut text = String::new();
        loop {
            match self.read_char() {
                None | Some('\n') => {
                    return Err(self.error(LexErrorKind::UnterminatedString, line, column));
                }
                Some('\\') => match self.read_char() {
                    None => {
                        return Err(self.error(LexErrorKind::UnterminatedString, line, column));
                    }
                    Some('n') => text.push('\n'),
                    Some('t') => text.push('\t'),
                    Some('r') => text.push('\r'),
                    Some('0') => text.push('\0'),
                    Some('\n') => {}
                    Some(c @ ('\\' | '\'' | '"')) => text.push(c),
                    Some(c) => {
                        text.push('\\');
                        text.push(c);
                    }
                },
                Some(c) if c == quote => return Ok(text),
                Some(c) => text.push(c),
            }
        }
    }

    fn handle_operator(&mut self, line: usize, column: usize) -> Result<(), LexError> {
        let Some(ch) = self.read_char() else {
            return Ok(());
        };
        let next = self.peek_char();
        let kind = match ch {
            '(' => {
                self.depth += 1;
                TokenKind::LParen
            }
            '[' => {
                self.depth += 1;
                TokenKind::LBracket
            }
            ')' => {
                self.depth = self.depth.saturating_sub(1);
                TokenKind::RParen
            }
            ']' => {
                self.depth = self.depth.saturating_sub(1);
                TokenKind::RBracket
            }
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            '.' => TokenKind::Dot,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '%' => TokenKind::Percent,
            '~' => TokenKind::Tilde,
            '/' if next == Some('/') => {
                self.read_char();
                TokenKind::DoubleSlash
            }
            '=' if next == Some('=') => {
                self.read_char();
                TokenKind::EqEq
            }
            '=' => TokenKind::Assign,
            '!' if next == Some('=') => {
                self.read_char();
                TokenKind::NotEq
            }
            '<' if next == Some('=') => {
                self.read_char();
                TokenKind::LtE
            }
            '<' => TokenKind::Lt,
            '>' if next == Some('=') => {
                self.read_char();
                TokenKind::GtE
            }
            '>' => TokenKind::Gt,
            c => return Err(self.error(LexErrorKind::UnexpectedCharacter(c), line, column)),
        };
        self.push(kind, line, column);
        Ok(())
    }

    fn finish(mut self) -> Result<Vec<Token>, LexError> {
        let (line, column) = (self.line, self.column);
        if self.depth > 0 {
            return Err(self.error(LexErrorKind::UnclosedBracket, line, column));
        }

        self.push_newline(line, column);
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push(TokenKind::Dedent, line, column);
        }
        self.push(TokenKind::Eof, line, column);
        Ok(self.tokens)
    }
}

/// Splits an f-string body into literal text and raw `{...}` fields.
fn split_fstring(body: &str) -> Result<Vec<FStringPiece>, LexErrorKind> {
    let chars: Vec<char> = body.chars().collect();
    let mut pieces = Vec::new();
    let mut literal = String::new();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '{' if chars.get(i + 1) == Some(&'{') => {
                literal.push('{');
                i += 2;
            }
            '}' if chars.get(i + 1) == Some(&'}') => {
                literal.push('}');
                i += 2;
            }
            '}' => return Err(LexErrorKind::StrayBrace),
            '{' => {
                if !literal.is_empty() {
                    pieces.push(FStringPiece::Literal(std::mem::take(&mut literal)));
                }
                let (field, consumed) = read_field(&chars[i + 1..])?;
                pieces.push(field);
                i += consumed + 1;
            }
            c => {
                literal.push(c);
                i += 1;
            }
        }
    }

    if !literal.is_empty() {
        pieces.push(FStringPiece::Literal(literal));
    }
    Ok(pieces)
}

/// Reads one field body up to and including its closing brace.
/// Returns the field and the number of characters consumed.
fn read_field(chars: &[char]) -> Result<(FStringPiece, usize), LexErrorKind> {
    let mut source = String::new();
    let mut spec: Option<String> = None;
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for (i, &c) in chars.iter().enumerate() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
        } else {
            match c {
                '}' if depth == 0 => {
                    if source.trim().is_empty() {
                        return Err(LexErrorKind::EmptyField);
                    }
                    return Ok((FStringPiece::Field { source, spec }, i + 1));
                }
                ':' if depth == 0 && spec.is_none() => {
                    spec = Some(String::new());
                    continue;
                }
                '\'' | '"' => quote = Some(c),
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' => depth = depth.saturating_sub(1),
                _ => {}
            }
        }

        match spec.as_mut() {
            Some(spec) => spec.push(c),
            None => source.push(c),
        }
    }

    Err(LexErrorKind::UnterminatedField)
}

/// Tokenizes a complete source text.
///
/// # Errors
///
/// Returns a [`LexError`] on unterminated strings, malformed f-strings,
/// inconsistent indentation or characters that cannot start a token.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    LexingFSM::new(source).make_tokens()
}
