use crate::builtin::Builtin;
use crate::value::Value;
use std::collections::HashMap;

/// Module name a program sees when it is run directly.
pub const MAIN_MODULE: &str = "__main__";

/// Global variables of a running program.
///
/// A fresh namespace already binds every [`Builtin`] under its name,
/// including the `$`-prefixed helpers that rewritten shell literals call, and
/// sets `__name__` to [`MAIN_MODULE`]. Programs can rebind the user-facing
/// builtins like any other name; the `$` helpers cannot be spelled in source.
#[derive(Debug, Clone)]
pub struct Namespace {
    vars: HashMap<String, Value>,
}

impl Default for Namespace {
    fn default() -> Self {
        Namespace::new()
    }
}

impl Namespace {
    pub fn new() -> Self {
        let mut vars: HashMap<String, Value> = Builtin::ALL
            .iter()
            .map(|b| (b.name().to_string(), Value::Builtin(*b)))
            .collect();
        vars.insert("__name__".into(), Value::from(MAIN_MODULE));
        Self { vars }
    }

    /// A namespace for a script, with `argv` bound to `[script, args...]`.
    pub fn with_argv(argv: impl IntoIterator<Item = String>) -> Self {
        let mut ns = Namespace::new();
        let argv = argv.into_iter().map(Value::Str).collect();
        ns.set("argv", Value::List(argv));
        ns
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.vars.insert(name.into(), value);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{RUN_CAPTURE, SHELL_QUOTE};

    #[test]
    fn fresh_namespace_has_builtins_and_helpers() {
        let ns = Namespace::new();
        assert_eq!(ns.get("print"), Some(&Value::Builtin(Builtin::Print)));
        assert_eq!(ns.get(RUN_CAPTURE), Some(&Value::Builtin(Builtin::RunCapture)));
        assert!(ns.contains(SHELL_QUOTE));
        assert_eq!(ns.get("__name__"), Some(&Value::from("__main__")));
        assert!(!ns.contains("argv"));
    }

    #[test]
    fn set_and_get() {
        let mut ns = Namespace::new();
        assert_eq!(ns.get("SOME_RANDOM_NAME_12345"), None);
        ns.set("KEY", Value::from("VALUE"));
        assert_eq!(ns.get("KEY"), Some(&Value::from("VALUE")));
        ns.set("print", Value::Int(1));
        assert_eq!(ns.get("print"), Some(&Value::Int(1)));
    }

    #[test]
    fn argv_holds_script_and_arguments() {
        let ns = Namespace::with_argv(["run.tl".to_string(), "a b".to_string()]);
        assert_eq!(
            ns.get("argv"),
            Some(&Value::List(vec![Value::from("run.tl"), Value::from("a b")]))
        );
    }
}
