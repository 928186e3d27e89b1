//! A small scripting language with shell literals.
//!
//! Writing `~'ls -l'` in a program runs `ls -l` through the system shell.
//! Before a program runs, [`rewrite`] replaces every such marker with a call
//! into [`Shell`], choosing how the command's output is delivered from where
//! the marker sits:
//!
//! - `~'cmd'` on its own streams the output as it arrives,
//! - `out = ~'cmd'` captures merged stdout and stderr as one string,
//! - `out, err, code = ~'cmd'` captures the three parts separately.
//!
//! Values interpolated into f-string commands, `~f'ls {path}'`, are quoted so
//! the shell sees each one as a single word; `{value:raw}` opts out.
//!
//! The main entry points are [`Interpreter::run_source`] for whole programs
//! and [`Session`] for the interactive loop.

pub mod ast;
mod builtin;
pub mod command;
mod env;
mod external;
mod interpreter;
mod io_adapters;
mod lexer;
pub mod parser;
mod process;
mod quoting;
pub mod repl;
mod rewriter;
mod value;

pub use builtin::Builtin;
pub use command::{CaptureVariant, ExitCode};
pub use env::Namespace;
pub use external::SHELL_ENV_VAR;
pub use interpreter::{HostError, Interpreter};
pub use io_adapters::SharedOutput;
pub use parser::Mode;
pub use process::{CapturedOutput, IncrementalDecoder, Shell, ShellError};
pub use quoting::{QuoteError, is_inside_single_quotes, quote};
pub use repl::{Completeness, CompletenessProbe, HostProbe, LineReader, ReadOutcome, Session};
pub use rewriter::{RAW_SPEC, rewrite};
pub use value::Value;
