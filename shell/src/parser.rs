//! Recursive-descent parser producing the [`crate::ast`] tree.

use crate::ast::{
    BinOp, CmpOp, Expr, FStringPart, Handler, Keyword, LogicalOp, Module, Stmt, StmtKind, Target,
    UnaryOp,
};
use crate::lexer::{self, FStringPiece, LexError, Token, TokenKind};
use thiserror::Error;

/// Names that cannot be used as variables.
const KEYWORDS: &[&str] = &[
    "if", "elif", "else", "for", "in", "while", "try", "except", "as", "pass", "break",
    "continue", "assert", "and", "or", "not", "True", "False", "None",
];

static EOF_TOKEN: Token = Token {
    kind: TokenKind::Eof,
    line: 0,
    column: 0,
};

/// How the source is going to be executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// A script file.
    File,
    /// One input of the interactive loop.
    Interactive,
}

/// Classifies a parser error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    #[error("unexpected {found}, expected {expected}")]
    UnexpectedToken {
        found: String,
        expected: &'static str,
    },
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("cannot assign to {0}")]
    InvalidTarget(&'static str),
    #[error("multiple starred expressions in assignment")]
    MultipleStarred,
    #[error("starred expression is only allowed as an assignment target")]
    MisplacedStar,
    #[error("positional argument follows keyword argument")]
    PositionalAfterKeyword,
    #[error("f-string: {0}")]
    InvalidField(String),
}

/// Error produced during parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} at line {line}, column {column}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub line: usize,
    pub column: usize,
}

/// Any error that prevents source text from becoming a [`Module`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyntaxError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl SyntaxError {
    /// True when the source ended before a construct was finished, so more
    /// input may still make it valid.
    pub fn is_incomplete(&self) -> bool {
        match self {
            SyntaxError::Lex(e) => e.is_incomplete(),
            SyntaxError::Parse(e) => e.kind == ParseErrorKind::UnexpectedEof,
        }
    }
}

struct AstBuilder {
    tokens: Vec<Token>,
    pos: usize,
}

impl AstBuilder {
    fn from(tokens: Vec<Token>) -> Self {
        AstBuilder { tokens, pos: 0 }
    }

    fn build_ast(mut self, mode: Mode) -> Result<Module, ParseError> {
        let mut body = Vec::new();
        loop {
            match self.peek() {
                TokenKind::Eof => break,
                TokenKind::Newline => {
                    self.consume();
                }
                _ => body.push(self.parse_statement()?),
            }
        }

        Ok(Module {
            body,
            interactive: mode == Mode::Interactive,
        })
    }

    fn peek_token(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&EOF_TOKEN)
    }

    fn peek(&self) -> &TokenKind {
        &self.peek_token().kind
    }

    /// Helper to look ahead n tokens
    fn peek_n(&self, n: usize) -> &TokenKind {
        self.tokens
            .get(self.pos + n)
            .map_or(&EOF_TOKEN.kind, |t| &t.kind)
    }

    fn consume(&mut self) -> Token {
        let token = self.peek_token().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek() == kind {
            self.consume();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, expected: &'static str) -> Result<Token, ParseError> {
        if self.peek() == kind {
            Ok(self.consume())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), TokenKind::Name(n) if n == keyword)
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.is_keyword(keyword) {
            self.consume();
            true
        } else {
            false
        }
    }

    fn expect_name(&mut self) -> Result<String, ParseError> {
        match self.peek() {
            TokenKind::Name(n) if !is_keyword(n) => {
                let name = n.clone();
                self.consume();
                Ok(name)
            }
            _ => Err(self.unexpected("a name")),
        }
    }

    fn error_here(&self, kind: ParseErrorKind) -> ParseError {
        let token = self.peek_token();
        ParseError {
            kind,
            line: token.line,
            column: token.column,
        }
    }

    fn unexpected(&self, expected: &'static str) -> ParseError {
        let found = self.peek();
        if *found == TokenKind::Eof {
            self.error_here(ParseErrorKind::UnexpectedEof)
        } else {
            self.error_here(ParseErrorKind::UnexpectedToken {
                found: describe(found),
                expected,
            })
        }
    }

    fn expect_line_end(&mut self) -> Result<(), ParseError> {
        match self.peek() {
            TokenKind::Newline => {
                self.consume();
                Ok(())
            }
            TokenKind::Eof => Ok(()),
            _ => Err(self.unexpected("end of line")),
        }
    }

    fn parse_statement(&mut self) -> Result<Stmt, ParseError> {
        let line = self.peek_token().line;
        let keyword = match self.peek() {
            TokenKind::Name(n) => n.clone(),
            _ => String::new(),
        };

        match keyword.as_str() {
            "if" => {
                self.consume();
                self.parse_if_chain(line)
            }
            "while" => {
                self.consume();
                let test = self.parse_expr()?;
                let body = self.parse_block()?;
                Ok(Stmt::new(StmtKind::While { test, body }, line))
            }
            "for" => self.parse_for(line),
            "try" => self.parse_try(line),
            _ => {
                let stmt = self.parse_simple_statement()?;
                self.expect_line_end()?;
                Ok(stmt)
            }
        }
    }

    fn parse_simple_statement(&mut self) -> Result<Stmt, ParseError> {
        let line = self.peek_token().line;
        if self.eat_keyword("pass") {
            return Ok(Stmt::new(StmtKind::Pass, line));
        }
        if self.eat_keyword("break") {
            return Ok(Stmt::new(StmtKind::Break, line));
        }
        if self.eat_keyword("continue") {
            return Ok(Stmt::new(StmtKind::Continue, line));
        }
        if self.eat_keyword("assert") {
            let test = self.parse_expr()?;
            let msg = if self.eat(&TokenKind::Comma) {
                Some(self.parse_expr()?)
            } else {
                None
            };
            return Ok(Stmt::new(StmtKind::Assert { test, msg }, line));
        }

        let target_token = self.peek_token().clone();
        let expr = self.parse_expr_list()?;
        if self.eat(&TokenKind::Assign) {
            let target = to_target(expr).map_err(|kind| ParseError {
                kind,
                line: target_token.line,
                column: target_token.column,
            })?;
            let value = self.parse_expr_list()?;
            self.reject_starred(&value)?;
            return Ok(Stmt::new(StmtKind::Assign { target, value }, line));
        }

        self.reject_starred(&expr)?;
        Ok(Stmt::new(StmtKind::Expr(expr), line))
    }

    fn reject_starred(&self, expr: &Expr) -> Result<(), ParseError> {
        let starred = match expr {
            Expr::Starred(_) => true,
            Expr::Tuple(items) | Expr::List(items) => {
                items.iter().any(|e| matches!(e, Expr::Starred(_)))
            }
            _ => false,
        };
        if starred {
            Err(self.error_here(ParseErrorKind::MisplacedStar))
        } else {
            Ok(())
        }
    }

    /// Parses `':' NEWLINE INDENT stmt+ DEDENT` or a one-line `':' simple_stmt`.
    fn parse_block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.expect(&TokenKind::Colon, "':'")?;

        if !self.eat(&TokenKind::Newline) {
            let stmt = self.parse_simple_statement()?;
            self.expect_line_end()?;
            return Ok(vec![stmt]);
        }

        self.expect(&TokenKind::Indent, "an indented block")?;
        let mut body = Vec::new();
        loop {
            match self.peek() {
                TokenKind::Dedent => {
                    self.consume();
                    break;
                }
                TokenKind::Eof => return Err(self.unexpected("a statement")),
                TokenKind::Newline => {
                    self.consume();
                }
                _ => body.push(self.parse_statement()?),
            }
        }
        Ok(body)
    }

    /// Parses the rest of an `if`/`elif` after its keyword.
    fn parse_if_chain(&mut self, line: usize) -> Result<Stmt, ParseError> {
        let test = self.parse_expr()?;
        let body = self.parse_block()?;

        let orelse = if self.is_keyword("elif") {
            let elif_line = self.consume().line;
            vec![self.parse_if_chain(elif_line)?]
        } else if self.eat_keyword("else") {
            self.parse_block()?
        } else {
            Vec::new()
        };

        Ok(Stmt::new(StmtKind::If { test, body, orelse }, line))
    }

    fn parse_for(&mut self, line: usize) -> Result<Stmt, ParseError> {
        self.consume();
        let target_token = self.peek_token().clone();
        let mut targets = vec![self.parse_target_atom()?];
        while self.eat(&TokenKind::Comma) {
            if self.is_keyword("in") {
                break;
            }
            targets.push(self.parse_target_atom()?);
        }
        let target = if targets.len() == 1 && !matches!(targets[0], Expr::Starred(_)) {
            targets.remove(0)
        } else {
            Expr::Tuple(targets)
        };
        let target = to_target(target).map_err(|kind| ParseError {
            kind,
            line: target_token.line,
            column: target_token.column,
        })?;

        if !self.eat_keyword("in") {
            return Err(self.unexpected("'in'"));
        }
        let iter = self.parse_expr_list()?;
        let body = self.parse_block()?;
        Ok(Stmt::new(StmtKind::For { target, iter, body }, line))
    }

    /// Loop targets are parsed separately so `in` is not read as an operator.
    fn parse_target_atom(&mut self) -> Result<Expr, ParseError> {
        match self.peek() {
            TokenKind::Star => {
                self.consume();
                Ok(Expr::Starred(Box::new(Expr::Name(self.expect_name()?))))
            }
            TokenKind::LParen | TokenKind::LBracket => {
                let open = self.consume();
                let close = if open.kind == TokenKind::LParen {
                    TokenKind::RParen
                } else {
                    TokenKind::RBracket
                };
                let mut items = Vec::new();
                while self.peek() != &close {
                    items.push(self.parse_target_atom()?);
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(&close, "a closing bracket")?;
                Ok(Expr::Tuple(items))
            }
            _ => Ok(Expr::Name(self.expect_name()?)),
        }
    }

    fn parse_try(&mut self, line: usize) -> Result<Stmt, ParseError> {
        self.consume();
        let body = self.parse_block()?;

        let mut handlers = Vec::new();
        while self.eat_keyword("except") {
            let kind = match self.peek() {
                TokenKind::Name(n) if !is_keyword(n) => Some(self.expect_name()?),
                _ => None,
            };
            let name = if self.eat_keyword("as") {
                Some(self.expect_name()?)
            } else {
                None
            };
            let body = self.parse_block()?;
            handlers.push(Handler { kind, name, body });
        }

        if handlers.is_empty() {
            return Err(self.unexpected("'except'"));
        }
        Ok(Stmt::new(StmtKind::Try { body, handlers }, line))
    }

    /// `expr (',' expr)* [',']`, producing a tuple when a comma is present.
    fn parse_expr_list(&mut self) -> Result<Expr, ParseError> {
        let first = self.parse_expr_or_star()?;
        if self.peek() != &TokenKind::Comma {
            return Ok(first);
        }

        let mut items = vec![first];
        while self.eat(&TokenKind::Comma) {
            if self.at_expr_list_end() {
                break;
            }
            items.push(self.parse_expr_or_star()?);
        }
        Ok(Expr::Tuple(items))
    }

    fn at_expr_list_end(&self) -> bool {
        matches!(
            self.peek(),
            TokenKind::Assign
                | TokenKind::Newline
                | TokenKind::Eof
                | TokenKind::RParen
                | TokenKind::RBracket
                | TokenKind::Colon
        )
    }

    fn parse_expr_or_star(&mut self) -> Result<Expr, ParseError> {
        if self.eat(&TokenKind::Star) {
            return Ok(Expr::Starred(Box::new(self.parse_postfix()?)));
        }
        self.parse_expr()
    }

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;
        while self.eat_keyword("or") {
            let right = self.parse_and()?;
            left = Expr::Logical {
                op: LogicalOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_not()?;
        while self.eat_keyword("and") {
            let right = self.parse_not()?;
            left = Expr::Logical {
                op: LogicalOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, ParseError> {
        if self.eat_keyword("not") {
            let operand = self.parse_not()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_arith()?;
        let (op, width) = match self.peek() {
            TokenKind::EqEq => (CmpOp::Eq, 1),
            TokenKind::NotEq => (CmpOp::NotEq, 1),
            TokenKind::Lt => (CmpOp::Lt, 1),
            TokenKind::LtE => (CmpOp::LtE, 1),
            TokenKind::Gt => (CmpOp::Gt, 1),
            TokenKind::GtE => (CmpOp::GtE, 1),
            TokenKind::Name(n) if n == "in" => (CmpOp::In, 1),
            TokenKind::Name(n)
                if n == "not" && matches!(self.peek_n(1), TokenKind::Name(m) if m == "in") =>
            {
                (CmpOp::NotIn, 2)
            }
            _ => return Ok(left),
        };
        for _ in 0..width {
            self.consume();
        }
        let right = self.parse_arith()?;
        Ok(Expr::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn parse_arith(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek() {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => return Ok(left),
            };
            self.consume();
            let right = self.parse_term()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn parse_term(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                TokenKind::Star => BinOp::Mul,
                TokenKind::DoubleSlash => BinOp::FloorDiv,
                TokenKind::Percent => BinOp::Mod,
                _ => return Ok(left),
            };
            self.consume();
            let right = self.parse_unary()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek() {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Tilde => UnaryOp::Invert,
            _ => return self.parse_postfix(),
        };
        self.consume();
        let operand = self.parse_unary()?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_atom()?;
        loop {
            match self.peek() {
                TokenKind::LParen => {
                    self.consume();
                    let (args, keywords) = self.parse_call_args()?;
                    expr = Expr::Call {
                        func: Box::new(expr),
                        args,
                        keywords,
                    };
                }
                TokenKind::Dot => {
                    self.consume();
                    let attr = match self.peek() {
                        TokenKind::Name(n) => n.clone(),
                        _ => return Err(self.unexpected("an attribute name")),
                    };
                    self.consume();
                    expr = Expr::Attribute {
                        value: Box::new(expr),
                        attr,
                    };
                }
                TokenKind::LBracket => {
                    self.consume();
                    let index = self.parse_expr()?;
                    self.expect(&TokenKind::RBracket, "']'")?;
                    expr = Expr::Subscript {
                        value: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    /// Parses call arguments after the opening parenthesis, including the closing one.
    fn parse_call_args(&mut self) -> Result<(Vec<Expr>, Vec<Keyword>), ParseError> {
        let mut args = Vec::new();
        let mut keywords = Vec::new();

        while self.peek() != &TokenKind::RParen {
            let is_keyword_arg = matches!(self.peek(), TokenKind::Name(n) if !is_keyword(n))
                && self.peek_n(1) == &TokenKind::Assign;
            if is_keyword_arg {
                let name = self.expect_name()?;
                self.consume();
                let value = self.parse_expr()?;
                keywords.push(Keyword { name, value });
            } else {
                if !keywords.is_empty() {
                    return Err(self.error_here(ParseErrorKind::PositionalAfterKeyword));
                }
                args.push(self.parse_expr()?);
            }

            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }

        self.expect(&TokenKind::RParen, "')'")?;
        Ok((args, keywords))
    }

    fn parse_atom(&mut self) -> Result<Expr, ParseError> {
        let token = self.peek_token().clone();
        let (line, column) = (token.line, token.column);
        let expr = match token.kind {
            TokenKind::Name(name) => match name.as_str() {
                "True" => Expr::Bool(true),
                "False" => Expr::Bool(false),
                "None" => Expr::None,
                n if is_keyword(n) => return Err(self.unexpected("an expression")),
                _ => Expr::Name(name.clone()),
            },
            TokenKind::Int(value) => Expr::Int(value),
            TokenKind::Str(mut text) => {
                self.consume();
                // Adjacent string literals are concatenated.
                while let TokenKind::Str(more) = self.peek() {
                    text.push_str(more);
                    self.consume();
                }
                return Ok(Expr::Str(text));
            }
            TokenKind::FString(pieces) => {
                self.consume();
                return parse_fstring(pieces, line, column);
            }
            TokenKind::LParen => {
                self.consume();
                if self.eat(&TokenKind::RParen) {
                    return Ok(Expr::Tuple(Vec::new()));
                }
                let inner = self.parse_expr_list()?;
                self.expect(&TokenKind::RParen, "')'")?;
                return Ok(inner);
            }
            TokenKind::LBracket => {
                self.consume();
                let mut items = Vec::new();
                while self.peek() != &TokenKind::RBracket {
                    items.push(self.parse_expr_or_star()?);
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(&TokenKind::RBracket, "']'")?;
                return Ok(Expr::List(items));
            }
            _ => return Err(self.unexpected("an expression")),
        };
        self.consume();
        Ok(expr)
    }

    /// Parses the expression of one f-string field; the whole token stream
    /// must be consumed.
    fn parse_field_expr(mut self) -> Result<Expr, ParseError> {
        let expr = self.parse_expr_list()?;
        self.eat(&TokenKind::Newline);
        if self.peek() != &TokenKind::Eof {
            return Err(self.unexpected("'}'"));
        }
        Ok(expr)
    }
}

fn is_keyword(name: &str) -> bool {
    KEYWORDS.contains(&name)
}

fn parse_fstring(pieces: Vec<FStringPiece>, line: usize, column: usize) -> Result<Expr, ParseError> {
    let field_error = |message: String| ParseError {
        kind: ParseErrorKind::InvalidField(message),
        line,
        column,
    };

    let mut parts = Vec::with_capacity(pieces.len());
    for piece in pieces {
        match piece {
            FStringPiece::Literal(text) => parts.push(FStringPart::Literal(text)),
            FStringPiece::Field { source, spec } => {
                let tokens =
                    lexer::tokenize(source.trim()).map_err(|e| field_error(e.kind.to_string()))?;
                let expr = AstBuilder::from(tokens)
                    .parse_field_expr()
                    .map_err(|e| field_error(e.kind.to_string()))?;
                parts.push(FStringPart::Field {
                    expr: Box::new(expr),
                    spec,
                });
            }
        }
    }
    Ok(Expr::FString(parts))
}

/// Converts a parsed left-hand side into an assignment target.
fn to_target(expr: Expr) -> Result<Target, ParseErrorKind> {
    match expr {
        Expr::Name(name) => Ok(Target::Name(name)),
        Expr::Starred(inner) => match *inner {
            Expr::Name(name) => Ok(Target::Starred(name)),
            _ => Err(ParseErrorKind::InvalidTarget("starred expression")),
        },
        Expr::Tuple(items) | Expr::List(items) => {
            let starred = items
                .iter()
                .filter(|e| matches!(e, Expr::Starred(_)))
                .count();
            if starred > 1 {
                return Err(ParseErrorKind::MultipleStarred);
            }
            let targets = items
                .into_iter()
                .map(to_target)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Target::Sequence(targets))
        }
        Expr::Call { .. } => Err(ParseErrorKind::InvalidTarget("function call")),
        Expr::Attribute { .. } => Err(ParseErrorKind::InvalidTarget("attribute")),
        Expr::Subscript { .. } => Err(ParseErrorKind::InvalidTarget("subscript")),
        Expr::Int(_) | Expr::Str(_) | Expr::FString(_) | Expr::Bool(_) | Expr::None => {
            Err(ParseErrorKind::InvalidTarget("literal"))
        }
        _ => Err(ParseErrorKind::InvalidTarget("expression")),
    }
}

fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Name(n) if is_keyword(n) => format!("keyword '{n}'"),
        TokenKind::Name(n) => format!("name '{n}'"),
        TokenKind::Int(i) => format!("integer {i}"),
        TokenKind::Str(_) => "string literal".to_string(),
        TokenKind::FString(_) => "f-string".to_string(),
        TokenKind::Newline => "end of line".to_string(),
        TokenKind::Indent => "indent".to_string(),
        TokenKind::Dedent => "dedent".to_string(),
        TokenKind::Eof => "end of input".to_string(),
        other => {
            let symbol = match other {
                TokenKind::LParen => "(",
                TokenKind::RParen => ")",
                TokenKind::LBracket => "[",
                TokenKind::RBracket => "]",
                TokenKind::Comma => ",",
                TokenKind::Colon => ":",
                TokenKind::Dot => ".",
                TokenKind::Assign => "=",
                TokenKind::Plus => "+",
                TokenKind::Minus => "-",
                TokenKind::Star => "*",
                TokenKind::DoubleSlash => "//",
                TokenKind::Percent => "%",
                TokenKind::Tilde => "~",
                TokenKind::EqEq => "==",
                TokenKind::NotEq => "!=",
                TokenKind::Lt => "<",
                TokenKind::LtE => "<=",
                TokenKind::Gt => ">",
                _ => ">=",
            };
            format!("'{symbol}'")
        }
    }
}

/// Parses source text into a [`Module`].
///
/// # Errors
///
/// Returns a [`SyntaxError`]; [`SyntaxError::is_incomplete`] tells apart
/// input that merely stops early from input that can never be valid.
pub fn parse(source: &str, mode: Mode) -> Result<Module, SyntaxError> {
    let tokens = lexer::tokenize(source)?;
    Ok(AstBuilder::from(tokens).build_ast(mode)?)
}
