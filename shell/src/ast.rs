//! Syntax tree of the host language.
//!
//! The tree is a plain tagged union: the rewriter and the interpreter both
//! work by matching on these enums, and node kinds a pass does not care about
//! simply fall through.

/// A parsed program: either a whole script or one interactive input.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    /// Top-level statements in source order.
    pub body: Vec<Stmt>,
    /// Set for input parsed from the interactive loop. The interpreter echoes
    /// the value of expression statements in this mode.
    pub interactive: bool,
}

/// A statement together with the source line it starts on.
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub line: usize,
}

impl Stmt {
    pub fn new(kind: StmtKind, line: usize) -> Self {
        Self { kind, line }
    }

    /// True for statements that own an indented block.
    pub fn is_compound(&self) -> bool {
        matches!(
            self.kind,
            StmtKind::If { .. } | StmtKind::While { .. } | StmtKind::For { .. } | StmtKind::Try { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// An expression evaluated for its side effects; the value is discarded.
    Expr(Expr),

    /// `target = value`.
    Assign { target: Target, value: Expr },

    /// `assert test` or `assert test, msg`.
    Assert { test: Expr, msg: Option<Expr> },

    Pass,
    Break,
    Continue,

    /// `if` with its `elif` chain folded into nested `If` nodes in `orelse`.
    If {
        test: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },

    While { test: Expr, body: Vec<Stmt> },

    For {
        target: Target,
        iter: Expr,
        body: Vec<Stmt>,
    },

    Try {
        body: Vec<Stmt>,
        handlers: Vec<Handler>,
    },
}

/// One `except` clause.
#[derive(Debug, Clone, PartialEq)]
pub struct Handler {
    /// Error kind to match, e.g. `ChildProcessError`. `None` catches everything.
    pub kind: Option<String>,
    /// Name bound to the error message, from `except Kind as name`.
    pub name: Option<String>,
    pub body: Vec<Stmt>,
}

/// Left-hand side of an assignment or a `for` loop.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    /// A single name: `x = ...`.
    Name(String),
    /// A rest pattern inside a sequence: the `*rest` in `*rest, last = ...`.
    Starred(String),
    /// A tuple or list of targets: `a, b = ...` or `[a, b] = ...`.
    Sequence(Vec<Target>),
}

impl Target {
    /// Whether the target unpacks more than one value.
    pub fn is_sequence(&self) -> bool {
        matches!(self, Target::Sequence(_) | Target::Starred(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Name(String),
    Int(i64),
    Bool(bool),
    None,

    /// A plain string literal.
    Str(String),

    /// An interpolated string, `f"..."`.
    FString(Vec<FStringPart>),

    Tuple(Vec<Expr>),
    List(Vec<Expr>),

    /// `*name`, only meaningful as part of an assignment target.
    Starred(Box<Expr>),

    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },

    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    Compare {
        op: CmpOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// Short-circuiting `and` / `or`.
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
        keywords: Vec<Keyword>,
    },

    /// `value.attr`.
    Attribute { value: Box<Expr>, attr: String },

    /// `value[index]`.
    Subscript { value: Box<Expr>, index: Box<Expr> },
}

impl Expr {
    /// Builds `name(args...)`, the shape every rewritten marker takes.
    pub fn call(name: &str, args: Vec<Expr>) -> Self {
        Expr::Call {
            func: Box::new(Expr::Name(name.to_string())),
            args,
            keywords: Vec::new(),
        }
    }
}

/// `name=value` inside a call.
#[derive(Debug, Clone, PartialEq)]
pub struct Keyword {
    pub name: String,
    pub value: Expr,
}

/// A segment of an interpolated string.
#[derive(Debug, Clone, PartialEq)]
pub enum FStringPart {
    /// Text copied verbatim.
    Literal(String),
    /// `{expr}` or `{expr:spec}`.
    Field { expr: Box<Expr>, spec: Option<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `~`, which doubles as the shell literal marker on strings.
    Invert,
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    FloorDiv,
    Mod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    In,
    NotIn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}
