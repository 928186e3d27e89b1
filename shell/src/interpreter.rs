use crate::ast::{BinOp, CmpOp, Expr, FStringPart, LogicalOp, Module, Stmt, StmtKind, Target, UnaryOp};
use crate::builtin::{self, CallArgs};
use crate::command::ExitCode;
use crate::env::Namespace;
use crate::parser::{self, Mode, SyntaxError};
use crate::process::{Shell, ShellError};
use crate::quoting::QuoteError;
use crate::rewriter;
use crate::value::Value;
use log::debug;
use regex::Regex;
use std::io::{self, Write};
use std::sync::LazyLock;
use thiserror::Error;

/// `[[fill]align][width]`
static FORMAT_SPEC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(?<fill>.)?(?<align>[<>^]))?(?<width>\d+)?$").expect("format spec pattern")
});

/// Anything that stops a program from running to completion.
#[derive(Debug, Error)]
pub enum HostError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error("{0}")]
    Name(String),
    #[error("{0}")]
    Type(String),
    #[error("{0}")]
    Value(String),
    #[error("{0}")]
    Attribute(String),
    #[error("{0}")]
    Index(String),
    #[error("{0}")]
    ZeroDivision(String),
    #[error("{0}")]
    Assertion(String),
    #[error(transparent)]
    Quote(#[from] QuoteError),
    #[error(transparent)]
    Shell(#[from] ShellError),
    #[error(transparent)]
    Io(#[from] io::Error),
    /// Raised by `exit()`; not an error, but unwinds the same way.
    #[error("exit requested with status {0}")]
    Exit(ExitCode),
    /// Any of the above, tagged with the line of the statement that raised it.
    #[error("{error}")]
    Located { line: usize, error: Box<HostError> },
}

impl HostError {
    /// The error's kind, as named by `except` clauses and diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            HostError::Syntax(_) => "SyntaxError",
            HostError::Name(_) => "NameError",
            HostError::Type(_) => "TypeError",
            HostError::Value(_) | HostError::Quote(_) => "ValueError",
            HostError::Attribute(_) => "AttributeError",
            HostError::Index(_) => "IndexError",
            HostError::ZeroDivision(_) => "ZeroDivisionError",
            HostError::Assertion(_) => "AssertionError",
            HostError::Shell(ShellError::ChildProcessFailed(_)) => "ChildProcessError",
            HostError::Shell(_) | HostError::Io(_) => "OSError",
            HostError::Exit(_) => "SystemExit",
            HostError::Located { error, .. } => error.kind(),
        }
    }

    /// The status requested by `exit()`, if that is what this is.
    pub fn exit_code(&self) -> Option<ExitCode> {
        match self {
            HostError::Exit(code) => Some(*code),
            HostError::Located { error, .. } => error.exit_code(),
            _ => None,
        }
    }

    /// Whether an `except kind` clause catches this error. `None` catches
    /// everything except `exit()`.
    pub fn matches(&self, kind: Option<&str>) -> bool {
        if self.exit_code().is_some() {
            return kind == Some("SystemExit");
        }
        match kind {
            None | Some("Exception") => true,
            Some("OSError") => matches!(self.kind(), "OSError" | "ChildProcessError"),
            Some(kind) => kind == self.kind(),
        }
    }

    fn at_line(self, line: usize) -> Self {
        match self {
            HostError::Located { .. } | HostError::Exit(_) | HostError::Syntax(_) => self,
            error => HostError::Located {
                line,
                error: Box::new(error),
            },
        }
    }

    /// One-line report in the form `line N: Kind: message`.
    pub fn diagnostic(&self) -> String {
        match self {
            HostError::Located { line, error } => format!("line {line}: {}", error.diagnostic()),
            error => format!("{}: {error}", error.kind()),
        }
    }
}

enum Flow {
    Normal,
    Break,
    Continue,
}

/// Executes rewritten programs.
///
/// The interpreter owns the [`Shell`] that shell literals run through and the
/// sink that `print` and streamed commands write to. Variables live in a
/// separate [`Namespace`] so one interpreter can serve a script and the
/// interactive session that follows it.
pub struct Interpreter {
    shell: Shell,
    output: Box<dyn Write>,
}

impl Interpreter {
    /// An interpreter writing to the process's standard output.
    pub fn new(shell: Shell) -> Self {
        Self::with_output(shell, Box::new(io::stdout()))
    }

    pub fn with_output(shell: Shell, output: Box<dyn Write>) -> Self {
        Interpreter { shell, output }
    }

    pub fn shell(&self) -> &Shell {
        &self.shell
    }

    pub fn output(&mut self) -> &mut dyn Write {
        &mut self.output
    }

    pub(crate) fn io(&mut self) -> (&Shell, &mut Box<dyn Write>) {
        (&self.shell, &mut self.output)
    }

    /// Parses, rewrites and runs `source` against `namespace`.
    pub fn run_source(
        &mut self,
        source: &str,
        mode: Mode,
        namespace: &mut Namespace,
    ) -> Result<(), HostError> {
        let mut module = parser::parse(source, mode)?;
        let rewritten = rewriter::rewrite(&mut module);
        debug!("rewrote {rewritten} shell literal(s)");
        self.exec_module(&module, namespace)
    }

    pub fn exec_module(&mut self, module: &Module, ns: &mut Namespace) -> Result<(), HostError> {
        for stmt in &module.body {
            match self.exec_stmt(stmt, ns, module.interactive)? {
                Flow::Normal => {}
                Flow::Break | Flow::Continue => {
                    return Err(HostError::Type("'break' or 'continue' outside loop".into())
                        .at_line(stmt.line));
                }
            }
        }
        Ok(())
    }

    fn exec_block(
        &mut self,
        body: &[Stmt],
        ns: &mut Namespace,
        interactive: bool,
    ) -> Result<Flow, HostError> {
        for stmt in body {
            match self.exec_stmt(stmt, ns, interactive)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(
        &mut self,
        stmt: &Stmt,
        ns: &mut Namespace,
        interactive: bool,
    ) -> Result<Flow, HostError> {
        self.exec_stmt_kind(&stmt.kind, ns, interactive)
            .map_err(|e| e.at_line(stmt.line))
    }

    fn exec_stmt_kind(
        &mut self,
        kind: &StmtKind,
        ns: &mut Namespace,
        interactive: bool,
    ) -> Result<Flow, HostError> {
        match kind {
            StmtKind::Expr(expr) => {
                let value = self.eval(expr, ns)?;
                if interactive && value != Value::None {
                    writeln!(self.output, "{}", value.repr())?;
                    self.output.flush()?;
                }
            }
            StmtKind::Assign { target, value } => {
                let value = self.eval(value, ns)?;
                assign(target, value, ns)?;
            }
            StmtKind::Assert { test, msg } => {
                if !self.eval(test, ns)?.truthy() {
                    let message = match msg {
                        Some(msg) => self.eval(msg, ns)?.to_string(),
                        None => String::new(),
                    };
                    return Err(HostError::Assertion(message));
                }
            }
            StmtKind::Pass => {}
            StmtKind::Break => return Ok(Flow::Break),
            StmtKind::Continue => return Ok(Flow::Continue),
            StmtKind::If { test, body, orelse } => {
                let branch = if self.eval(test, ns)?.truthy() {
                    body
                } else {
                    orelse
                };
                return self.exec_block(branch, ns, interactive);
            }
            StmtKind::While { test, body } => {
                while self.eval(test, ns)?.truthy() {
                    if let Flow::Break = self.exec_block(body, ns, interactive)? {
                        break;
                    }
                }
            }
            StmtKind::For { target, iter, body } => {
                let items = self.eval(iter, ns)?;
                let Some(items) = items.iter_items() else {
                    return Err(not_iterable(&items));
                };
                for item in items {
                    assign(target, item, ns)?;
                    if let Flow::Break = self.exec_block(body, ns, interactive)? {
                        break;
                    }
                }
            }
            StmtKind::Try { body, handlers } => {
                let error = match self.exec_block(body, ns, interactive) {
                    Ok(flow) => return Ok(flow),
                    Err(error) => error,
                };
                let Some(handler) = handlers.iter().find(|h| error.matches(h.kind.as_deref()))
                else {
                    return Err(error);
                };
                debug!("{} handled by except clause", error.kind());
                if let Some(name) = &handler.name {
                    ns.set(name, Value::Str(innermost(&error).to_string()));
                }
                return self.exec_block(&handler.body, ns, interactive);
            }
        }
        Ok(Flow::Normal)
    }

    fn eval(&mut self, expr: &Expr, ns: &Namespace) -> Result<Value, HostError> {
        match expr {
            Expr::Name(name) => ns
                .get(name)
                .cloned()
                .ok_or_else(|| HostError::Name(format!("name '{name}' is not defined"))),
            Expr::Int(i) => Ok(Value::Int(*i)),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::None => Ok(Value::None),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::FString(parts) => {
                let mut text = String::new();
                for part in parts {
                    match part {
                        FStringPart::Literal(literal) => text.push_str(literal),
                        FStringPart::Field { expr, spec } => {
                            let value = self.eval(expr, ns)?;
                            text.push_str(&format_value(&value, spec.as_deref())?);
                        }
                    }
                }
                Ok(Value::Str(text))
            }
            Expr::Tuple(items) => Ok(Value::Tuple(self.eval_all(items, ns)?)),
            Expr::List(items) => Ok(Value::List(self.eval_all(items, ns)?)),
            Expr::Starred(_) => Err(HostError::Type(
                "starred expression is not allowed here".into(),
            )),
            Expr::Unary { op, operand } => {
                let value = self.eval(operand, ns)?;
                unary(*op, value)
            }
            Expr::Binary { op, left, right } => {
                let left = self.eval(left, ns)?;
                let right = self.eval(right, ns)?;
                binary(*op, left, right)
            }
            Expr::Compare { op, left, right } => {
                let left = self.eval(left, ns)?;
                let right = self.eval(right, ns)?;
                compare(*op, &left, &right).map(Value::Bool)
            }
            Expr::Logical { op, left, right } => {
                let left = self.eval(left, ns)?;
                match (op, left.truthy()) {
                    (LogicalOp::And, false) | (LogicalOp::Or, true) => Ok(left),
                    _ => self.eval(right, ns),
                }
            }
            Expr::Call {
                func,
                args,
                keywords,
            } => {
                let func = self.eval(func, ns)?;
                let mut call_args = CallArgs::new(self.eval_all(args, ns)?);
                for keyword in keywords {
                    let value = self.eval(&keyword.value, ns)?;
                    call_args.keywords.push((keyword.name.clone(), value));
                }
                match func {
                    Value::Builtin(builtin) => builtin.call(self, call_args),
                    Value::Method { receiver, name } => {
                        builtin::call_method(&receiver, &name, call_args)
                    }
                    other => Err(HostError::Type(format!(
                        "'{}' object is not callable",
                        other.type_name()
                    ))),
                }
            }
            Expr::Attribute { value, attr } => {
                let receiver = self.eval(value, ns)?;
                if !builtin::has_method(&receiver, attr) {
                    return Err(HostError::Attribute(format!(
                        "'{}' object has no attribute '{attr}'",
                        receiver.type_name()
                    )));
                }
                Ok(Value::Method {
                    receiver: Box::new(receiver),
                    name: attr.clone(),
                })
            }
            Expr::Subscript { value, index } => {
                let value = self.eval(value, ns)?;
                let index = self.eval(index, ns)?;
                subscript(&value, &index)
            }
        }
    }

    fn eval_all(&mut self, exprs: &[Expr], ns: &Namespace) -> Result<Vec<Value>, HostError> {
        exprs.iter().map(|e| self.eval(e, ns)).collect()
    }
}

fn innermost(error: &HostError) -> &HostError {
    match error {
        HostError::Located { error, .. } => innermost(error),
        error => error,
    }
}

fn not_iterable(value: &Value) -> HostError {
    HostError::Type(format!("'{}' object is not iterable", value.type_name()))
}

fn assign(target: &Target, value: Value, ns: &mut Namespace) -> Result<(), HostError> {
    let targets = match target {
        Target::Name(name) => {
            ns.set(name, value);
            return Ok(());
        }
        Target::Starred(name) => {
            let items = value.iter_items().ok_or_else(|| not_iterable(&value))?;
            ns.set(name, Value::List(items));
            return Ok(());
        }
        Target::Sequence(targets) => targets,
    };

    let Some(mut items) = value.iter_items() else {
        return Err(HostError::Type(format!(
            "cannot unpack non-iterable {} object",
            value.type_name()
        )));
    };

    match targets.iter().position(|t| matches!(t, Target::Starred(_))) {
        None if items.len() < targets.len() => Err(HostError::Value(format!(
            "not enough values to unpack (expected {}, got {})",
            targets.len(),
            items.len()
        ))),
        None if items.len() > targets.len() => Err(HostError::Value(format!(
            "too many values to unpack (expected {})",
            targets.len()
        ))),
        None => {
            for (target, item) in targets.iter().zip(items) {
                assign(target, item, ns)?;
            }
            Ok(())
        }
        Some(star) => {
            let after = targets.len() - star - 1;
            if items.len() < star + after {
                return Err(HostError::Value(format!(
                    "not enough values to unpack (expected at least {}, got {})",
                    star + after,
                    items.len()
                )));
            }
            let tail = items.split_off(items.len() - after);
            let middle = items.split_off(star);
            for (target, item) in targets[..star].iter().zip(items) {
                assign(target, item, ns)?;
            }
            assign(&targets[star], Value::List(middle), ns)?;
            for (target, item) in targets[star + 1..].iter().zip(tail) {
                assign(target, item, ns)?;
            }
            Ok(())
        }
    }
}

fn unary(op: UnaryOp, value: Value) -> Result<Value, HostError> {
    let symbol = match op {
        UnaryOp::Not => return Ok(Value::Bool(!value.truthy())),
        UnaryOp::Neg => "-",
        UnaryOp::Invert => "~",
    };
    let Some(i) = value.as_int() else {
        return Err(HostError::Type(format!(
            "bad operand type for unary {symbol}: '{}'",
            value.type_name()
        )));
    };
    match op {
        UnaryOp::Invert => Ok(Value::Int(!i)),
        _ => i.checked_neg().map(Value::Int).ok_or_else(overflow),
    }
}

fn overflow() -> HostError {
    HostError::Value("integer overflow".into())
}

fn binary(op: BinOp, left: Value, right: Value) -> Result<Value, HostError> {
    if let (Some(a), Some(b)) = (left.as_int(), right.as_int()) {
        return int_arith(op, a, b).map(Value::Int);
    }

    match (op, left, right) {
        (BinOp::Add, Value::Str(a), Value::Str(b)) => Ok(Value::Str(a + &b)),
        (BinOp::Add, Value::List(mut a), Value::List(b)) => {
            a.extend(b);
            Ok(Value::List(a))
        }
        (BinOp::Add, Value::Tuple(mut a), Value::Tuple(b)) => {
            a.extend(b);
            Ok(Value::Tuple(a))
        }
        (BinOp::Mul, Value::Str(s), Value::Int(n)) | (BinOp::Mul, Value::Int(n), Value::Str(s)) => {
            let times = repeat_count(s.len(), n)?;
            Ok(Value::Str(s.repeat(times)))
        }
        (BinOp::Mul, Value::List(items), Value::Int(n))
        | (BinOp::Mul, Value::Int(n), Value::List(items)) => {
            let times = repeat_count(items.len(), n)?;
            Ok(Value::List(
                (0..times).flat_map(|_| items.iter().cloned()).collect(),
            ))
        }
        (op, left, right) => Err(HostError::Type(format!(
            "unsupported operand type(s) for {}: '{}' and '{}'",
            symbol(op),
            left.type_name(),
            right.type_name()
        ))),
    }
}

/// Longest string or list that repetition and padding may build.
const MAX_BUILT_LEN: usize = 1 << 28;

/// How many copies of a `len`-long sequence `* n` makes. Negative counts give
/// none, as does an empty sequence.
fn repeat_count(len: usize, n: i64) -> Result<usize, HostError> {
    let times = usize::try_from(n).unwrap_or(0);
    if len == 0 {
        return Ok(0);
    }
    match len.checked_mul(times) {
        Some(total) if total <= MAX_BUILT_LEN => Ok(times),
        _ => Err(HostError::Value("repetition result is too large".into())),
    }
}

fn symbol(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::FloorDiv => "//",
        BinOp::Mod => "%",
    }
}

/// Integer arithmetic rounding toward negative infinity, with the remainder
/// taking the sign of the divisor.
fn int_arith(op: BinOp, a: i64, b: i64) -> Result<i64, HostError> {
    if matches!(op, BinOp::FloorDiv | BinOp::Mod) && b == 0 {
        return Err(HostError::ZeroDivision(
            "integer division or modulo by zero".into(),
        ));
    }
    let result = match op {
        BinOp::Add => a.checked_add(b),
        BinOp::Sub => a.checked_sub(b),
        BinOp::Mul => a.checked_mul(b),
        BinOp::FloorDiv => a.checked_div(b).map(|q| {
            if a % b != 0 && ((a < 0) != (b < 0)) {
                q - 1
            } else {
                q
            }
        }),
        BinOp::Mod => a.checked_rem(b).map(|r| {
            if r != 0 && ((r < 0) != (b < 0)) {
                r + b
            } else {
                r
            }
        }),
    };
    result.ok_or_else(overflow)
}

fn compare(op: CmpOp, left: &Value, right: &Value) -> Result<bool, HostError> {
    let ordering = match op {
        CmpOp::Eq => return Ok(equal(left, right)),
        CmpOp::NotEq => return Ok(!equal(left, right)),
        CmpOp::In => return contains(right, left),
        CmpOp::NotIn => return contains(right, left).map(|found| !found),
        _ => match (left, right) {
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            _ => match (left.as_int(), right.as_int()) {
                (Some(a), Some(b)) => a.cmp(&b),
                _ => {
                    return Err(HostError::Type(format!(
                        "comparison not supported between instances of '{}' and '{}'",
                        left.type_name(),
                        right.type_name()
                    )));
                }
            },
        },
    };
    Ok(match op {
        CmpOp::Lt => ordering.is_lt(),
        CmpOp::LtE => ordering.is_le(),
        CmpOp::Gt => ordering.is_gt(),
        _ => ordering.is_ge(),
    })
}

fn equal(left: &Value, right: &Value) -> bool {
    match (left.as_int(), right.as_int()) {
        (Some(a), Some(b)) => a == b,
        _ => left == right,
    }
}

fn contains(container: &Value, item: &Value) -> Result<bool, HostError> {
    match (container, item) {
        (Value::Str(haystack), Value::Str(needle)) => Ok(haystack.contains(needle.as_str())),
        (Value::Str(_), other) => Err(HostError::Type(format!(
            "'in <string>' requires string as left operand, not {}",
            other.type_name()
        ))),
        (Value::Tuple(items) | Value::List(items), item) => {
            Ok(items.iter().any(|candidate| equal(candidate, item)))
        }
        (other, _) => Err(HostError::Type(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}

fn subscript(value: &Value, index: &Value) -> Result<Value, HostError> {
    let Some(i) = index.as_int() else {
        return Err(HostError::Type(format!(
            "indices must be integers, not {}",
            index.type_name()
        )));
    };
    let pick = |len: usize| -> Option<usize> {
        let len = i64::try_from(len).ok()?;
        let i = if i < 0 { i + len } else { i };
        (0..len).contains(&i).then(|| i as usize)
    };
    let out_of_range = || HostError::Index(format!("{} index out of range", value.type_name()));

    match value {
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let i = pick(chars.len()).ok_or_else(out_of_range)?;
            Ok(Value::Str(chars[i].to_string()))
        }
        Value::Tuple(items) | Value::List(items) => {
            let i = pick(items.len()).ok_or_else(out_of_range)?;
            Ok(items[i].clone())
        }
        other => Err(HostError::Type(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

/// Applies a `[[fill]align][width]` format spec.
///
/// Strings align left and everything else aligns right unless an alignment is
/// given.
pub fn format_value(value: &Value, spec: Option<&str>) -> Result<String, HostError> {
    let text = value.to_string();
    let Some(spec) = spec.filter(|s| !s.is_empty()) else {
        return Ok(text);
    };
    let Some(caps) = FORMAT_SPEC.captures(spec) else {
        return Err(HostError::Value(format!(
            "Invalid format specifier '{spec}' for object of type '{}'",
            value.type_name()
        )));
    };

    let width = match caps.name("width") {
        Some(w) => w
            .as_str()
            .parse::<usize>()
            .map_err(|_| HostError::Value(format!("width too large in '{spec}'")))?,
        None => 0,
    };
    if width > MAX_BUILT_LEN {
        return Err(HostError::Value(format!("width too large in '{spec}'")));
    }
    let fill = caps
        .name("fill")
        .and_then(|f| f.as_str().chars().next())
        .unwrap_or(' ');
    let align = match caps.name("align") {
        Some(a) => a.as_str(),
        None if matches!(value, Value::Str(_)) => "<",
        None => ">",
    };

    let padding = width.saturating_sub(text.chars().count());
    let (before, after) = match align {
        "<" => (0, padding),
        ">" => (padding, 0),
        _ => (padding / 2, padding - padding / 2),
    };
    let pad = |n: usize| fill.to_string().repeat(n);
    Ok(format!("{}{text}{}", pad(before), pad(after)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io_adapters::SharedOutput;
    use pretty_assertions::assert_eq;

    fn run(source: &str) -> (Result<(), HostError>, String, Namespace) {
        let output = SharedOutput::new();
        let mut interp = Interpreter::with_output(Shell::default(), Box::new(output.clone()));
        let mut ns = Namespace::new();
        let result = interp.run_source(source, Mode::File, &mut ns);
        (result, output.contents(), ns)
    }

    fn output_of(source: &str) -> String {
        let (result, output, _) = run(source);
        result.unwrap();
        output
    }

    fn error_of(source: &str) -> HostError {
        run(source).0.unwrap_err()
    }

    #[test]
    fn prints_and_arithmetic() {
        assert_eq!(
            output_of("print(1 + 2 * 3, -7 // 2, -7 % 3, 'a' + 'b', sep='|')"),
            "7|-4|2|ab\n"
        );
        assert_eq!(output_of("print('x', end='')"), "x");
    }

    #[test]
    fn control_flow() {
        let source = "\
total = 0
for i in range(10):
    if i % 2 == 0:
        continue
    if i > 7:
        break
    total = total + i
print(total)
n = 3
while n:
    n = n - 1
print(n)
";
        assert_eq!(output_of(source), "16\n0\n");
    }

    #[test]
    fn unpacking() {
        let (result, _, ns) = run("a, *mid, z = [1, 2, 3, 4]\n[p, q] = 'pq'\n*all, = (5,)");
        result.unwrap();
        assert_eq!(ns.get("a"), Some(&Value::Int(1)));
        assert_eq!(ns.get("mid"), Some(&Value::List(vec![Value::Int(2), Value::Int(3)])));
        assert_eq!(ns.get("z"), Some(&Value::Int(4)));
        assert_eq!(ns.get("q"), Some(&Value::from("q")));
        assert_eq!(ns.get("all"), Some(&Value::List(vec![Value::Int(5)])));

        let err = error_of("a, b = (1, 2, 3)");
        assert_eq!(err.kind(), "ValueError");
        assert_eq!(err.diagnostic(), "line 1: ValueError: too many values to unpack (expected 2)");
    }

    #[test]
    fn format_specs() {
        assert_eq!(format_value(&Value::Int(42), Some("5")).unwrap(), "   42");
        assert_eq!(format_value(&Value::from("ab"), Some("4")).unwrap(), "ab  ");
        assert_eq!(format_value(&Value::from("ab"), Some("*^6")).unwrap(), "**ab**");
        assert_eq!(format_value(&Value::from("ab"), Some(">1")).unwrap(), "ab");
        assert_eq!(format_value(&Value::from("ab"), None).unwrap(), "ab");
        assert!(matches!(
            format_value(&Value::from("ab"), Some("raw")),
            Err(HostError::Value(_))
        ));
    }

    #[test]
    fn oversized_repetition_and_padding_are_value_errors() {
        for source in [
            "x = 'ab' * 9223372036854775807",
            "x = 9223372036854775807 * 'ab'",
            "x = [1] * 9223372036854775807",
            "x = 'a' * 1000000000",
            "x = f'{1:99999999999999}'",
        ] {
            let err = error_of(source);
            assert_eq!(err.kind(), "ValueError", "{source}");
        }
        assert_eq!(
            error_of("x = 'ab' * 9223372036854775807").to_string(),
            "repetition result is too large"
        );
        assert_eq!(
            output_of("print(len('' * 9223372036854775807), [] * 9223372036854775807, 'ab' * 2)"),
            "0 [] abab\n"
        );
    }

    #[test]
    fn fstrings_without_markers_are_plain_formatting() {
        assert_eq!(output_of("x = 'a b'\nprint(f'[{x:>5}] {len(x)}')"), "[  a b] 3\n");
    }

    #[test]
    fn errors_carry_kind_and_line() {
        let err = error_of("x = 1\ny = nope");
        assert_eq!(err.kind(), "NameError");
        assert_eq!(err.diagnostic(), "line 2: NameError: name 'nope' is not defined");

        assert_eq!(error_of("1 // 0").kind(), "ZeroDivisionError");
        assert_eq!(error_of("'a'.nope").kind(), "AttributeError");
        assert_eq!(error_of("(1, 2)[5]").kind(), "IndexError");
        assert_eq!(error_of("assert 1 == 2, 'math'").to_string(), "math");
        assert_eq!(error_of("x = (").kind(), "SyntaxError");
    }

    #[test]
    fn try_except_binds_message() {
        let source = "\
try:
    missing
except TypeError:
    print('wrong handler')
except NameError as e:
    print('caught:', e)
";
        assert_eq!(output_of(source), "caught: name 'missing' is not defined\n");
    }

    #[test]
    fn exit_is_not_caught_by_bare_except() {
        let err = error_of("try:\n    exit(4)\nexcept:\n    pass\n");
        assert_eq!(err.exit_code(), Some(4));
    }

    #[test]
    fn interactive_mode_echoes_values() {
        let output = SharedOutput::new();
        let mut interp = Interpreter::with_output(Shell::default(), Box::new(output.clone()));
        let mut ns = Namespace::new();
        interp
            .run_source("'a'\nNone\n(1, 'b')", Mode::Interactive, &mut ns)
            .unwrap();
        assert_eq!(output.contents(), "'a'\n(1, 'b')\n");
    }

    #[cfg(unix)]
    mod unix {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn shell_literals_by_position() {
            let source = "\
~'echo streamed'
out = ~'echo captured'
print(out.strip())
stdout, stderr, code = ~'echo -n oops >&2; exit 3'
print(repr(stdout), repr(stderr), code)
print(len(~'printf abc'))
";
            assert_eq!(
                output_of(source),
                "streamed\ncaptured\n'' 'oops' 3\n3\n"
            );
        }

        #[test]
        fn interpolated_values_are_quoted() {
            let source = "\
name = 'two words; echo injected'
print(~f'printf %s {name}')
flags = '-n x'
print(~f'echo {flags:raw}')
";
            assert_eq!(output_of(source), "two words; echo injected\nx\n");
        }

        #[test]
        fn failing_capture_raises_child_process_error() {
            let err = error_of("x = 1\nout = ~'exit 9'");
            assert_eq!(err.kind(), "ChildProcessError");
            assert_eq!(
                err.diagnostic(),
                "line 2: ChildProcessError: command exited with status 9"
            );
            assert_eq!(
                output_of("try:\n    ~'exit 2'\nexcept OSError as e:\n    print(e)\n"),
                "command exited with status 2\n"
            );
        }
    }
}
