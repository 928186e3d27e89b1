use anyhow::{Context, Result};
use argh::FromArgs;
use rustyline::DefaultEditor;
use std::fs;
use tildesh::{ExitCode, Interpreter, Mode, Namespace, Session, Shell};

#[derive(FromArgs)]
/// Run a program that embeds shell commands as ~'...' literals, or start an
/// interactive session when no program is given.
struct Args {
    /// keep going in an interactive session after the program has run
    #[argh(switch, short = 'i')]
    interactive: bool,

    /// the program to run, followed by the arguments it sees in argv
    #[argh(positional, greedy)]
    command: Vec<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Args = argh::from_env();
    let code = run(args)?;
    std::process::exit(code);
}

fn run(args: Args) -> Result<ExitCode> {
    let mut interpreter = Interpreter::new(Shell::from_env());
    log::debug!("running commands through {}", interpreter.shell().program().display());

    let Some(script) = args.command.first().cloned() else {
        println!("tildesh {}", env!("CARGO_PKG_VERSION"));
        return interactive(interpreter, Namespace::new());
    };

    let source =
        fs::read_to_string(&script).with_context(|| format!("failed to read {script}"))?;
    let mut namespace = Namespace::with_argv(args.command);
    if let Err(err) = interpreter.run_source(&source, Mode::File, &mut namespace) {
        if let Some(code) = err.exit_code() {
            return Ok(code);
        }
        eprintln!("{script}: {}", err.diagnostic());
        if !args.interactive {
            return Ok(1);
        }
    }

    if args.interactive {
        return interactive(interpreter, namespace);
    }
    Ok(0)
}

fn interactive(interpreter: Interpreter, namespace: Namespace) -> Result<ExitCode> {
    let mut editor = DefaultEditor::new().context("failed to set up line editing")?;
    Session::new(interpreter, namespace).run(&mut editor)
}
