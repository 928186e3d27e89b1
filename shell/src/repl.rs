//! The interactive read-eval-print loop.
//!
//! The loop is a small state machine driven one input at a time by
//! [`Session::handle`]. Lines accumulate in a buffer until a
//! [`CompletenessProbe`] says the buffer holds a whole statement, then the
//! buffer is run through the same parse, rewrite and execute pipeline as a
//! script, in [`Mode::Interactive`].

use crate::ast::Stmt;
use crate::command::ExitCode;
use crate::env::Namespace;
use crate::interpreter::Interpreter;
use crate::parser::{self, Mode};
use anyhow::{Context, Result};
use log::trace;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::{self, Write};

pub const PRIMARY_PROMPT: &str = ">>> ";
pub const CONTINUATION_PROMPT: &str = "... ";

/// What the line source produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Line(String),
    /// The user pressed Ctrl-C.
    Interrupted,
    /// The input ended (Ctrl-D, or a closed pipe).
    Eof,
}

/// A source of input lines for the loop.
pub trait LineReader {
    fn read_line(&mut self, prompt: &str) -> Result<ReadOutcome>;
}

/// Terminal input with line editing and history.
impl LineReader for DefaultEditor {
    fn read_line(&mut self, prompt: &str) -> Result<ReadOutcome> {
        match self.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    self.add_history_entry(line.as_str())?;
                }
                Ok(ReadOutcome::Line(line))
            }
            Err(ReadlineError::Interrupted) => Ok(ReadOutcome::Interrupted),
            Err(ReadlineError::Eof) => Ok(ReadOutcome::Eof),
            Err(err) => Err(err).context("failed to read an input line"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completeness {
    /// The buffer holds one or more whole statements.
    Complete,
    /// The buffer is a valid prefix; more lines are needed.
    Incomplete,
    /// The buffer can never become valid.
    Invalid,
}

/// Decides whether buffered input is ready to run.
pub trait CompletenessProbe {
    fn probe(&self, source: &str) -> Completeness;
}

/// Probes input with the host language parser.
///
/// A buffer whose last statement opens a block stays incomplete, so the block
/// ends only at a blank line.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostProbe;

impl CompletenessProbe for HostProbe {
    fn probe(&self, source: &str) -> Completeness {
        match parser::parse(source, Mode::Interactive) {
            Ok(module) if module.body.last().is_some_and(Stmt::is_compound) => {
                Completeness::Incomplete
            }
            Ok(_) => Completeness::Complete,
            Err(err) if err.is_incomplete() => Completeness::Incomplete,
            Err(_) => Completeness::Invalid,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    AwaitingStatement,
    AwaitingContinuation,
}

/// An interactive session: a namespace that persists across inputs, plus the
/// buffer of lines read since the last execution.
pub struct Session<P = HostProbe> {
    interpreter: Interpreter,
    namespace: Namespace,
    probe: P,
    buffer: String,
    state: LoopState,
    errors: Box<dyn Write>,
}

impl Session<HostProbe> {
    pub fn new(interpreter: Interpreter, namespace: Namespace) -> Self {
        Session::with_probe(interpreter, namespace, HostProbe)
    }
}

impl<P: CompletenessProbe> Session<P> {
    pub fn with_probe(interpreter: Interpreter, namespace: Namespace, probe: P) -> Self {
        Session {
            interpreter,
            namespace,
            probe,
            buffer: String::new(),
            state: LoopState::AwaitingStatement,
            errors: Box::new(io::stderr()),
        }
    }

    /// Sends diagnostics somewhere other than standard error.
    pub fn with_errors(mut self, errors: Box<dyn Write>) -> Self {
        self.errors = errors;
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn prompt(&self) -> &'static str {
        match self.state {
            LoopState::AwaitingStatement => PRIMARY_PROMPT,
            LoopState::AwaitingContinuation => CONTINUATION_PROMPT,
        }
    }

    /// Runs the loop until end of input or `exit()`, returning the exit code.
    ///
    /// Errors raised by the user's code are reported and the loop goes on;
    /// only a failing line source ends it with an error.
    pub fn run(&mut self, reader: &mut dyn LineReader) -> Result<ExitCode> {
        loop {
            let input = reader.read_line(self.prompt())?;
            if let Some(code) = self.handle(input)? {
                return Ok(code);
            }
        }
    }

    /// Advances the state machine by one input. Returns the exit code once
    /// the session is over.
    pub fn handle(&mut self, input: ReadOutcome) -> Result<Option<ExitCode>> {
        let line = match input {
            ReadOutcome::Line(line) => line,
            ReadOutcome::Interrupted => {
                trace!("interrupted, dropping {} buffered bytes", self.buffer.len());
                self.buffer.clear();
                self.state = LoopState::AwaitingStatement;
                self.newline()?;
                return Ok(None);
            }
            ReadOutcome::Eof => {
                self.newline()?;
                return Ok(Some(0));
            }
        };

        let continuing = self.state == LoopState::AwaitingContinuation;
        if continuing {
            self.buffer.push('\n');
        }
        self.buffer.push_str(&line);

        if continuing && line.trim().is_empty() {
            return self.execute_buffer();
        }
        match self.probe.probe(&self.buffer) {
            Completeness::Incomplete => {
                trace!("buffer incomplete after {} line(s)", self.buffer.lines().count());
                self.state = LoopState::AwaitingContinuation;
                Ok(None)
            }
            // Invalid input runs too, so the parser's diagnostic gets reported.
            Completeness::Complete | Completeness::Invalid => self.execute_buffer(),
        }
    }

    fn execute_buffer(&mut self) -> Result<Option<ExitCode>> {
        let source = std::mem::take(&mut self.buffer);
        self.state = LoopState::AwaitingStatement;

        let Err(err) = self
            .interpreter
            .run_source(&source, Mode::Interactive, &mut self.namespace)
        else {
            return Ok(None);
        };
        if let Some(code) = err.exit_code() {
            return Ok(Some(code));
        }
        writeln!(self.errors, "{}", err.diagnostic())?;
        self.errors.flush()?;
        Ok(None)
    }

    fn newline(&mut self) -> Result<()> {
        let out = self.interpreter.output();
        writeln!(out)?;
        out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io_adapters::SharedOutput;
    use crate::process::Shell;
    use crate::value::Value;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;

    /// Replays canned input and records the prompts it was asked with.
    struct Scripted {
        inputs: VecDeque<ReadOutcome>,
        prompts: Vec<String>,
    }

    impl Scripted {
        fn new(inputs: Vec<ReadOutcome>) -> Self {
            Scripted {
                inputs: inputs.into(),
                prompts: Vec::new(),
            }
        }
    }

    impl LineReader for Scripted {
        fn read_line(&mut self, prompt: &str) -> Result<ReadOutcome> {
            self.prompts.push(prompt.to_string());
            Ok(self.inputs.pop_front().unwrap_or(ReadOutcome::Eof))
        }
    }

    fn line(text: &str) -> ReadOutcome {
        ReadOutcome::Line(text.to_string())
    }

    fn lines(texts: &[&str]) -> Vec<ReadOutcome> {
        texts.iter().map(|t| line(t)).collect()
    }

    struct Harness {
        session: Session,
        output: SharedOutput,
        errors: SharedOutput,
    }

    fn harness() -> Harness {
        let output = SharedOutput::new();
        let errors = SharedOutput::new();
        let interpreter = Interpreter::with_output(Shell::default(), Box::new(output.clone()));
        let session =
            Session::new(interpreter, Namespace::new()).with_errors(Box::new(errors.clone()));
        Harness {
            session,
            output,
            errors,
        }
    }

    fn run(inputs: Vec<ReadOutcome>) -> (ExitCode, Harness) {
        let mut h = harness();
        let code = h.session.run(&mut Scripted::new(inputs)).unwrap();
        (code, h)
    }

    #[test]
    fn probe_classifies_input() {
        let probe = HostProbe;
        assert_eq!(probe.probe("x = 1"), Completeness::Complete);
        assert_eq!(probe.probe(""), Completeness::Complete);
        assert_eq!(probe.probe("if x:"), Completeness::Incomplete);
        assert_eq!(probe.probe("if x:\n    y = 1"), Completeness::Incomplete);
        assert_eq!(probe.probe("print(1,"), Completeness::Incomplete);
        assert_eq!(probe.probe("x = )"), Completeness::Invalid);
    }

    #[test]
    fn expression_values_are_echoed() {
        let (code, h) = run(lines(&["x = 40 + 2", "x", "'text'"]));
        assert_eq!(code, 0);
        assert_eq!(h.output.contents(), "42\n'text'\n\n");
        assert_eq!(h.errors.contents(), "");
    }

    #[test]
    fn blocks_run_after_a_blank_line() {
        let mut h = harness();
        assert_eq!(h.session.handle(line("if True:")).unwrap(), None);
        assert_eq!(h.session.state(), LoopState::AwaitingContinuation);
        assert_eq!(h.session.prompt(), CONTINUATION_PROMPT);

        h.session.handle(line("    print('inside')")).unwrap();
        assert_eq!(h.output.contents(), "");

        h.session.handle(line("")).unwrap();
        assert_eq!(h.output.contents(), "inside\n");
        assert_eq!(h.session.state(), LoopState::AwaitingStatement);
        assert_eq!(h.session.buffer(), "");
    }

    #[test]
    fn prompts_follow_the_state() {
        let mut reader = Scripted::new(lines(&["for i in range(2):", "    i", "", "1"]));
        let mut h = harness();
        h.session.run(&mut reader).unwrap();
        assert_eq!(reader.prompts, [">>> ", "... ", "... ", ">>> ", ">>> "]);
        assert_eq!(h.output.contents(), "0\n1\n1\n\n");
    }

    #[test]
    fn interrupt_discards_the_buffer() {
        let (code, h) = run(vec![
            line("if True:"),
            line("    print('never')"),
            ReadOutcome::Interrupted,
            line("print('after')"),
        ]);
        assert_eq!(code, 0);
        assert_eq!(h.output.contents(), "\nafter\n\n");
    }

    #[test]
    fn errors_are_reported_and_the_loop_continues() {
        let (code, h) = run(lines(&["missing", "x = )", "print('still here')"]));
        assert_eq!(code, 0);
        assert_eq!(h.output.contents(), "still here\n\n");
        let errors = h.errors.contents();
        let reported: Vec<&str> = errors.lines().collect();
        assert_eq!(reported.len(), 2, "{errors}");
        assert_eq!(reported[0], "line 1: NameError: name 'missing' is not defined");
        assert!(reported[1].starts_with("SyntaxError: "), "{errors}");
    }

    #[test]
    fn exit_ends_the_session_with_its_code() {
        let (code, h) = run(lines(&["print('bye')", "exit(3)", "print('unreachable')"]));
        assert_eq!(code, 3);
        assert_eq!(h.output.contents(), "bye\n");
    }

    #[test]
    fn namespace_persists_between_inputs() {
        let mut h = harness();
        h.session.handle(line("a = 1")).unwrap();
        h.session.handle(line("b = a + 1")).unwrap();
        assert_eq!(h.session.namespace().get("b"), Some(&Value::Int(2)));
    }

    #[test]
    fn custom_probe_controls_buffering() {
        struct SemicolonTerminated;
        impl CompletenessProbe for SemicolonTerminated {
            fn probe(&self, source: &str) -> Completeness {
                if source.trim_end().ends_with(';') {
                    Completeness::Complete
                } else {
                    Completeness::Incomplete
                }
            }
        }

        let output = SharedOutput::new();
        let interpreter = Interpreter::with_output(Shell::default(), Box::new(output.clone()));
        let mut session = Session::with_probe(interpreter, Namespace::new(), SemicolonTerminated)
            .with_errors(Box::new(SharedOutput::new()));
        session.handle(line("print(")).unwrap();
        assert_eq!(session.state(), LoopState::AwaitingContinuation);
        session.handle(line("'x')")).unwrap();
        assert_eq!(output.contents(), "");
        // A blank line still forces execution.
        session.handle(line("")).unwrap();
        assert_eq!(output.contents(), "x\n");
    }

    #[cfg(unix)]
    #[test]
    fn shell_literals_in_the_loop() {
        let (code, h) = run(lines(&[
            "~'echo streamed'",
            "out, err, status = ~'echo -n partial; exit 4'",
            "status",
            "out",
        ]));
        assert_eq!(code, 0);
        assert_eq!(h.output.contents(), "streamed\n4\n'partial'\n\n");
    }
}
