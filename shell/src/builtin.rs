//! Functions and string methods available to every program.
//!
//! Besides the user-facing functions, the namespace carries the `$`-prefixed
//! helpers that rewritten shell literals call.

use crate::command::{ExitCode, RUN_CAPTURE, RUN_CAPTURE_TRIPLE, RUN_STREAM, SHELL_QUOTE};
use crate::interpreter::{HostError, Interpreter};
use crate::quoting;
use crate::value::Value;
use log::trace;

/// Positional and keyword arguments of one call, already evaluated.
#[derive(Debug, Default)]
pub struct CallArgs {
    pub positional: Vec<Value>,
    pub keywords: Vec<(String, Value)>,
}

impl CallArgs {
    pub fn new(positional: Vec<Value>) -> Self {
        CallArgs {
            positional,
            keywords: Vec::new(),
        }
    }

    fn take_keyword(&mut self, name: &str) -> Option<Value> {
        let index = self.keywords.iter().position(|(k, _)| k == name)?;
        Some(self.keywords.remove(index).1)
    }

    fn reject_keywords(&self, func: &str) -> Result<(), HostError> {
        match self.keywords.first() {
            Some((name, _)) => Err(HostError::Type(format!(
                "{func}() got an unexpected keyword argument '{name}'"
            ))),
            None => Ok(()),
        }
    }

    fn arity(&self, func: &str, min: usize, max: usize) -> Result<(), HostError> {
        self.reject_keywords(func)?;
        let given = self.positional.len();
        if (min..=max).contains(&given) {
            return Ok(());
        }
        let expected = if min == max {
            format!("exactly {min}")
        } else if given < min {
            format!("at least {min}")
        } else {
            format!("at most {max}")
        };
        let plural = if expected.ends_with(" 1") { "" } else { "s" };
        Err(HostError::Type(format!(
            "{func}() takes {expected} argument{plural} ({given} given)"
        )))
    }

    /// The single positional argument of a one-argument function.
    fn one(mut self, func: &str) -> Result<Value, HostError> {
        self.arity(func, 1, 1)?;
        Ok(self.positional.remove(0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Print,
    Len,
    Str,
    Int,
    Repr,
    Range,
    Exit,
    RunStream,
    RunCapture,
    RunCaptureTriple,
    ShellQuote,
}

impl Builtin {
    pub const ALL: [Builtin; 11] = [
        Builtin::Print,
        Builtin::Len,
        Builtin::Str,
        Builtin::Int,
        Builtin::Repr,
        Builtin::Range,
        Builtin::Exit,
        Builtin::RunStream,
        Builtin::RunCapture,
        Builtin::RunCaptureTriple,
        Builtin::ShellQuote,
    ];

    /// Name the function is bound to in a fresh namespace.
    pub fn name(self) -> &'static str {
        match self {
            Builtin::Print => "print",
            Builtin::Len => "len",
            Builtin::Str => "str",
            Builtin::Int => "int",
            Builtin::Repr => "repr",
            Builtin::Range => "range",
            Builtin::Exit => "exit",
            Builtin::RunStream => RUN_STREAM,
            Builtin::RunCapture => RUN_CAPTURE,
            Builtin::RunCaptureTriple => RUN_CAPTURE_TRIPLE,
            Builtin::ShellQuote => SHELL_QUOTE,
        }
    }

    pub fn call(self, interp: &mut Interpreter, mut args: CallArgs) -> Result<Value, HostError> {
        let func = self.name();
        match self {
            Builtin::Print => print(interp, args),
            Builtin::Len => match args.one(func)? {
                Value::Str(s) => Ok(Value::Int(count(s.chars().count()))),
                Value::Tuple(items) | Value::List(items) => Ok(Value::Int(count(items.len()))),
                other => Err(HostError::Type(format!(
                    "object of type '{}' has no len()",
                    other.type_name()
                ))),
            },
            Builtin::Str => {
                args.arity(func, 0, 1)?;
                Ok(Value::Str(
                    args.positional.first().map(Value::to_string).unwrap_or_default(),
                ))
            }
            Builtin::Int => to_int(args.one(func)?),
            Builtin::Repr => Ok(Value::Str(args.one(func)?.repr())),
            Builtin::Range => range(args),
            Builtin::Exit => {
                args.arity(func, 0, 1)?;
                let code = match args.positional.pop() {
                    None | Some(Value::None) => 0,
                    Some(value) => {
                        let code = value.as_int().ok_or_else(|| {
                            HostError::Type(format!(
                                "exit code must be an int, not '{}'",
                                value.type_name()
                            ))
                        })?;
                        ExitCode::try_from(code).map_err(|_| {
                            HostError::Value(format!("exit code {code} is out of range"))
                        })?
                    }
                };
                Err(HostError::Exit(code))
            }
            Builtin::RunStream => {
                let command = command_arg(func, args)?;
                let (shell, out) = interp.io();
                shell.run_stream(&command, out)?;
                Ok(Value::None)
            }
            Builtin::RunCapture => {
                let command = command_arg(func, args)?;
                Ok(Value::Str(interp.shell().run_capture(&command)?))
            }
            Builtin::RunCaptureTriple => {
                let command = command_arg(func, args)?;
                let output = interp.shell().run_capture_triple(&command)?;
                Ok(Value::Tuple(vec![
                    Value::Str(output.stdout),
                    Value::Str(output.stderr),
                    Value::Int(i64::from(output.code)),
                ]))
            }
            Builtin::ShellQuote => {
                let value = args.one(func)?;
                Ok(Value::Str(quoting::quote(&value.to_string())?))
            }
        }
    }
}

fn count(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn command_arg(func: &str, args: CallArgs) -> Result<String, HostError> {
    match args.one(func)? {
        Value::Str(command) => {
            trace!("{func}: {command}");
            Ok(command)
        }
        other => Err(HostError::Type(format!(
            "{func}() expects a command string, not '{}'",
            other.type_name()
        ))),
    }
}

fn print(interp: &mut Interpreter, mut args: CallArgs) -> Result<Value, HostError> {
    let sep = text_keyword(&mut args, "sep", " ")?;
    let end = text_keyword(&mut args, "end", "\n")?;
    args.reject_keywords("print")?;

    let line = args
        .positional
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(&sep);
    let out = interp.output();
    write!(out, "{line}{end}")?;
    out.flush()?;
    Ok(Value::None)
}

fn text_keyword(args: &mut CallArgs, name: &str, default: &str) -> Result<String, HostError> {
    match args.take_keyword(name) {
        None | Some(Value::None) => Ok(default.to_string()),
        Some(Value::Str(s)) => Ok(s),
        Some(other) => Err(HostError::Type(format!(
            "{name} must be None or a string, not {}",
            other.type_name()
        ))),
    }
}

fn to_int(value: Value) -> Result<Value, HostError> {
    match value {
        Value::Str(s) => s.trim().parse::<i64>().map(Value::Int).map_err(|_| {
            HostError::Value(format!(
                "invalid literal for int() with base 10: {}",
                Value::Str(s.clone()).repr()
            ))
        }),
        other => other.as_int().map(Value::Int).ok_or_else(|| {
            HostError::Type(format!(
                "int() argument must be a string or a number, not '{}'",
                other.type_name()
            ))
        }),
    }
}

fn range(args: CallArgs) -> Result<Value, HostError> {
    args.arity("range", 1, 3)?;
    let mut bounds = Vec::with_capacity(3);
    for value in &args.positional {
        bounds.push(value.as_int().ok_or_else(|| {
            HostError::Type(format!(
                "'{}' object cannot be interpreted as an integer",
                value.type_name()
            ))
        })?);
    }
    let (start, stop, step) = match bounds.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        _ => return Err(HostError::Type("range expected 1 to 3 arguments".into())),
    };
    if step == 0 {
        return Err(HostError::Value("range() arg 3 must not be zero".into()));
    }

    let mut items = Vec::new();
    let mut i = start;
    while (step > 0 && i < stop) || (step < 0 && i > stop) {
        items.push(Value::Int(i));
        match i.checked_add(step) {
            Some(next) => i = next,
            None => break,
        }
    }
    Ok(Value::List(items))
}

const STR_METHODS: &[&str] = &[
    "splitlines",
    "strip",
    "lstrip",
    "rstrip",
    "split",
    "startswith",
    "endswith",
    "upper",
    "lower",
    "replace",
    "join",
];

/// Whether `receiver.name` names a callable method.
pub fn has_method(receiver: &Value, name: &str) -> bool {
    matches!(receiver, Value::Str(_)) && STR_METHODS.contains(&name)
}

pub fn call_method(receiver: &Value, name: &str, mut args: CallArgs) -> Result<Value, HostError> {
    let Value::Str(s) = receiver else {
        return Err(HostError::Attribute(format!(
            "'{}' object has no attribute '{name}'",
            receiver.type_name()
        )));
    };
    match name {
        "splitlines" => {
            args.arity(name, 0, 0)?;
            Ok(str_list(s.lines()))
        }
        "strip" | "lstrip" | "rstrip" => {
            args.arity(name, 0, 1)?;
            let chars = match args.positional.pop() {
                None | Some(Value::None) => None,
                Some(Value::Str(chars)) => Some(chars),
                Some(other) => return Err(expected_str(name, &other)),
            };
            let strip = |c: char| match &chars {
                Some(chars) => chars.contains(c),
                None => c.is_whitespace(),
            };
            let stripped = match name {
                "lstrip" => s.trim_start_matches(strip),
                "rstrip" => s.trim_end_matches(strip),
                _ => s.trim_matches(strip),
            };
            Ok(Value::from(stripped))
        }
        "split" => {
            args.arity(name, 0, 1)?;
            match args.positional.pop() {
                None | Some(Value::None) => Ok(str_list(s.split_whitespace())),
                Some(Value::Str(sep)) if sep.is_empty() => {
                    Err(HostError::Value("empty separator".into()))
                }
                Some(Value::Str(sep)) => Ok(str_list(s.split(sep.as_str()))),
                Some(other) => Err(expected_str(name, &other)),
            }
        }
        "startswith" | "endswith" => match args.one(name)? {
            Value::Str(affix) if name == "startswith" => Ok(Value::Bool(s.starts_with(&affix))),
            Value::Str(affix) => Ok(Value::Bool(s.ends_with(&affix))),
            other => Err(expected_str(name, &other)),
        },
        "upper" => {
            args.arity(name, 0, 0)?;
            Ok(Value::Str(s.to_uppercase()))
        }
        "lower" => {
            args.arity(name, 0, 0)?;
            Ok(Value::Str(s.to_lowercase()))
        }
        "replace" => {
            args.arity(name, 2, 2)?;
            match (&args.positional[0], &args.positional[1]) {
                (Value::Str(old), Value::Str(new)) => Ok(Value::Str(s.replace(old, new))),
                (Value::Str(_), other) | (other, _) => Err(expected_str(name, other)),
            }
        }
        "join" => {
            let items = args.one(name)?;
            let Some(items) = items.iter_items() else {
                return Err(HostError::Type(format!(
                    "can only join an iterable, not '{}'",
                    items.type_name()
                )));
            };
            let mut parts = Vec::with_capacity(items.len());
            for (i, item) in items.into_iter().enumerate() {
                match item {
                    Value::Str(part) => parts.push(part),
                    other => {
                        return Err(HostError::Type(format!(
                            "sequence item {i}: expected str instance, {} found",
                            other.type_name()
                        )));
                    }
                }
            }
            Ok(Value::Str(parts.join(s)))
        }
        _ => Err(HostError::Attribute(format!(
            "'str' object has no attribute '{name}'"
        ))),
    }
}

fn str_list<'a>(items: impl Iterator<Item = &'a str>) -> Value {
    Value::List(items.map(Value::from).collect())
}

fn expected_str(method: &str, got: &Value) -> HostError {
    HostError::Type(format!(
        "{method}() argument must be str, not {}",
        got.type_name()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn method(receiver: &str, name: &str, args: Vec<Value>) -> Value {
        call_method(&Value::from(receiver), name, CallArgs::new(args)).unwrap()
    }

    fn list(items: &[&str]) -> Value {
        Value::List(items.iter().map(|s| Value::from(*s)).collect())
    }

    #[test]
    fn every_builtin_has_a_distinct_name() {
        let mut names: Vec<_> = Builtin::ALL.iter().map(|b| b.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), Builtin::ALL.len());
    }

    #[test]
    fn splitting_methods() {
        assert_eq!(method("a\nb\n", "splitlines", vec![]), list(&["a", "b"]));
        assert_eq!(method("  a  b ", "split", vec![]), list(&["a", "b"]));
        assert_eq!(method("a,b,", "split", vec![",".into()]), list(&["a", "b", ""]));
        assert_eq!(method("-", "join", vec![list(&["x", "y"])]), Value::from("x-y"));
    }

    #[test]
    fn stripping_methods() {
        assert_eq!(method(" x\n", "strip", vec![]), Value::from("x"));
        assert_eq!(method("xxayy", "strip", vec!["xy".into()]), Value::from("a"));
        assert_eq!(method("  a ", "lstrip", vec![]), Value::from("a "));
        assert_eq!(method("  a ", "rstrip", vec![]), Value::from("  a"));
    }

    #[test]
    fn predicates_and_case() {
        assert_eq!(method("tildesh", "startswith", vec!["til".into()]), Value::Bool(true));
        assert_eq!(method("tildesh", "endswith", vec!["til".into()]), Value::Bool(false));
        assert_eq!(method("Ab", "upper", vec![]), Value::from("AB"));
        assert_eq!(method("Ab", "lower", vec![]), Value::from("ab"));
        assert_eq!(
            method("a-b-c", "replace", vec!["-".into(), "+".into()]),
            Value::from("a+b+c")
        );
    }

    #[test]
    fn bad_method_calls() {
        let err = call_method(&Value::from("x"), "split", CallArgs::new(vec!["".into()]));
        assert!(matches!(err, Err(HostError::Value(_))));

        let err = call_method(&Value::Int(1), "strip", CallArgs::default());
        assert!(matches!(err, Err(HostError::Attribute(_))));

        let err = call_method(&Value::from("x"), "join", CallArgs::new(vec![Value::Int(1)]));
        assert!(matches!(err, Err(HostError::Type(_))));
    }

    #[test]
    fn arity_messages() {
        let err = CallArgs::new(vec![]).one("len").unwrap_err();
        assert_eq!(err.to_string(), "len() takes exactly 1 argument (0 given)");

        let args = CallArgs {
            positional: vec![],
            keywords: vec![("bogus".into(), Value::None)],
        };
        let err = args.arity("repr", 0, 1).unwrap_err();
        assert_eq!(
            err.to_string(),
            "repr() got an unexpected keyword argument 'bogus'"
        );
    }

    #[test]
    fn int_conversion() {
        assert_eq!(to_int(Value::from(" 42\n")).unwrap(), Value::Int(42));
        assert_eq!(to_int(Value::Bool(true)).unwrap(), Value::Int(1));
        assert!(matches!(to_int(Value::from("4x")), Err(HostError::Value(_))));
        assert!(matches!(to_int(Value::None), Err(HostError::Type(_))));
    }

    #[test]
    fn ranges() {
        let ints = |v: &[i64]| Value::List(v.iter().copied().map(Value::Int).collect());
        assert_eq!(range(CallArgs::new(vec![Value::Int(3)])).unwrap(), ints(&[0, 1, 2]));
        assert_eq!(
            range(CallArgs::new(vec![Value::Int(5), Value::Int(0), Value::Int(-2)])).unwrap(),
            ints(&[5, 3, 1])
        );
        assert!(range(CallArgs::new(vec![Value::Int(1), Value::Int(2), Value::Int(0)])).is_err());
    }
}
