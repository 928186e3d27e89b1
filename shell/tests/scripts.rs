#![cfg(unix)]

use pretty_assertions::assert_eq;
use std::io::Write;
use std::process::{Command, Output, Stdio};
use tempfile::NamedTempFile;
use tildesh::{Interpreter, Mode, Namespace, SharedOutput, Shell};

fn script(source: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(source.as_bytes()).unwrap();
    file
}

fn tildesh(args: &[&str], stdin: &str) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_tildesh"))
        .args(args)
        .env_remove("TILDESH_SHELL")
        .env("RUST_LOG", "off")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(stdin.as_bytes())
        .unwrap();
    child.wait_with_output().unwrap()
}

fn run_script(source: &str, args: &[&str]) -> Output {
    let file = script(source);
    let path = file.path().to_str().unwrap().to_string();
    let mut argv = vec![path.as_str()];
    argv.extend_from_slice(args);
    tildesh(&argv, "")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn streamed_and_captured_output() {
    let output = run_script(
        "\
~'echo one; echo two >&2'
listing = ~'printf \"%s\\n\" b a | sort'
print(listing.splitlines())
",
        &[],
    );
    assert_eq!(stdout(&output), "one\ntwo\n['a', 'b']\n");
    assert_eq!(stderr(&output), "");
    assert_eq!(output.status.code(), Some(0));
}

#[test]
fn triple_capture_reports_failure_without_raising() {
    let output = run_script(
        "\
stdout, stderr, code = ~'echo -n failed && exit 200'
print((stdout, stderr, code))
_, err, code = ~'cat .'
print('directory' in err.lower(), code)
",
        &[],
    );
    assert_eq!(stdout(&output), "('failed', '', 200)\nTrue 1\n");
}

#[test]
fn interpolated_arguments_stay_single_words() {
    let output = run_script(
        "\
name = \"it's a test; echo injected\"
words = ~f'printf \"%s|\" {name}'
print(words)
flags = '-n raw'
print(~f'echo {flags:raw}')
",
        &[],
    );
    assert_eq!(stdout(&output), "it's a test; echo injected|\nraw\n");
}

#[test]
fn argv_and_module_name() {
    let output = run_script(
        "\
if __name__ == '__main__':
    print(len(argv), argv[1], argv[2])
",
        &["first arg", "-x"],
    );
    assert_eq!(stdout(&output), "3 first arg -x\n");
}

#[test]
fn failed_command_ends_the_script_with_a_diagnostic() {
    let output = run_script("print('before')\nout = ~'exit 5'\nprint('after')\n", &[]);
    assert_eq!(stdout(&output), "before\n");
    assert!(
        stderr(&output).contains("line 2: ChildProcessError: command exited with status 5"),
        "{}",
        stderr(&output)
    );
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn exit_sets_the_status() {
    let output = run_script("print('x')\nexit(7)\nprint('y')\n", &[]);
    assert_eq!(stdout(&output), "x\n");
    assert_eq!(output.status.code(), Some(7));
}

#[test]
fn interactive_session_reads_stdin() {
    let output = tildesh(&[], "x = ~'echo hi'\nx\nif True:\n    print('block')\n\n");
    let out = stdout(&output);
    assert!(out.contains("'hi\\n'"), "{out}");
    assert!(out.contains("block"), "{out}");
    assert_eq!(output.status.code(), Some(0));
}

#[test]
fn interactive_after_script_keeps_the_namespace() {
    let file = script("greeting = 'hello'\n");
    let path = file.path().to_str().unwrap();
    let output = tildesh(&["-i", path], "print(greeting)\n");
    assert!(stdout(&output).contains("hello"), "{}", stdout(&output));
    assert_eq!(output.status.code(), Some(0));
}

#[test]
fn library_runs_programs_against_a_custom_sink() {
    let sink = SharedOutput::new();
    let mut interpreter = Interpreter::with_output(Shell::default(), Box::new(sink.clone()));
    let mut namespace = Namespace::new();
    interpreter
        .run_source(
            "for word in (~'echo a b c').split():\n    ~f'echo {word}!'\n",
            Mode::File,
            &mut namespace,
        )
        .unwrap();
    assert_eq!(sink.contents(), "a!\nb!\nc!\n");
}
