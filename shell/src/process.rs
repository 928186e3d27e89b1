//! Running shell commands on behalf of shell literals.
//!
//! Every command runs as `<shell> -c <command>` with the caller's standard
//! input. Output bytes are decoded as UTF-8; invalid sequences become
//! U+FFFD instead of failing the run.

use crate::command::ExitCode;
use crate::external::{self, DEFAULT_SHELL};
use encoding_rs::{CoderResult, Decoder, UTF_8};
use log::debug;
use std::ffi::OsString;
use std::io::{self, PipeReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use thiserror::Error;

const CHUNK_SIZE: usize = 8 * 1024;

#[derive(Debug, Error)]
pub enum ShellError {
    #[error("command exited with status {0}")]
    ChildProcessFailed(ExitCode),

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Everything a finished command produced, as returned to triple-capture sites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedOutput {
    pub stdout: String,
    pub stderr: String,
    pub code: ExitCode,
}

/// The command interpreter shell literals are handed to.
#[derive(Debug, Clone)]
pub struct Shell {
    program: PathBuf,
    flag: OsString,
}

impl Default for Shell {
    fn default() -> Self {
        Shell::new(DEFAULT_SHELL)
    }
}

impl Shell {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        let flag = if cfg!(windows) { "/C" } else { "-c" };
        Shell {
            program: program.into(),
            flag: flag.into(),
        }
    }

    /// The shell named by `TILDESH_SHELL`, or the platform default.
    pub fn from_env() -> Self {
        external::shell_from_env().map(Shell::new).unwrap_or_default()
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Runs `command`, forwarding stdout and stderr to `out` as they arrive.
    ///
    /// Both streams share one pipe, so their relative order is kept. Every
    /// decoded chunk is written and flushed before the next read; a multi-byte
    /// character split across reads is held back until it is complete.
    ///
    /// # Errors
    ///
    /// [`ShellError::ChildProcessFailed`] when the command exits non-zero,
    /// after all of its output has been forwarded.
    pub fn run_stream(&self, command: &str, out: &mut dyn Write) -> Result<(), ShellError> {
        let (mut child, reader) = self.spawn_merged(command)?;
        let forwarded = forward(reader, out);
        let status = child.wait()?;
        forwarded?;
        check_status(status)
    }

    /// Runs `command` and returns its merged stdout and stderr.
    ///
    /// # Errors
    ///
    /// [`ShellError::ChildProcessFailed`] when the command exits non-zero.
    pub fn run_capture(&self, command: &str) -> Result<String, ShellError> {
        let (mut child, mut reader) = self.spawn_merged(command)?;
        let mut bytes = Vec::new();
        let read = reader.read_to_end(&mut bytes);
        drop(reader);
        let status = child.wait()?;
        read?;
        check_status(status)?;
        Ok(decode(&bytes))
    }

    /// Runs `command` and returns stdout, stderr and the exit code separately.
    ///
    /// A non-zero exit is reported through [`CapturedOutput::code`], never as
    /// an error.
    pub fn run_capture_triple(&self, command: &str) -> Result<CapturedOutput, ShellError> {
        let mut cmd = self.command(command);
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        let output = self.spawn(cmd)?.wait_with_output()?;
        Ok(CapturedOutput {
            stdout: decode(&output.stdout),
            stderr: decode(&output.stderr),
            code: exit_code(output.status),
        })
    }

    fn command(&self, command: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg(&self.flag).arg(command).stdin(Stdio::inherit());
        cmd
    }

    fn spawn(&self, mut cmd: Command) -> Result<Child, ShellError> {
        debug!("spawning {:?}", cmd);
        cmd.spawn().map_err(|source| ShellError::Spawn {
            program: self.program.display().to_string(),
            source,
        })
    }

    /// Starts `command` with stdout and stderr both writing into one pipe.
    fn spawn_merged(&self, command: &str) -> Result<(Child, PipeReader), ShellError> {
        let (reader, writer) = io::pipe()?;
        let child = {
            let mut cmd = self.command(command);
            cmd.stdout(writer.try_clone()?).stderr(writer);
            // `cmd` owns our copies of the write end; they close when it drops
            // here, so the reader sees EOF once the child is done.
            self.spawn(cmd)?
        };
        Ok((child, reader))
    }
}

/// Decodes a byte stream chunk by chunk without splitting characters.
pub struct IncrementalDecoder {
    inner: Decoder,
}

impl Default for IncrementalDecoder {
    fn default() -> Self {
        IncrementalDecoder::new()
    }
}

impl IncrementalDecoder {
    pub fn new() -> Self {
        IncrementalDecoder {
            inner: UTF_8.new_decoder_without_bom_handling(),
        }
    }

    /// Decodes as much of `bytes` as forms whole characters.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.run(bytes, false)
    }

    /// Flushes whatever is still buffered, replacing a truncated character.
    pub fn finish(mut self) -> String {
        self.run(&[], true)
    }

    fn run(&mut self, bytes: &[u8], last: bool) -> String {
        let capacity = self
            .inner
            .max_utf8_buffer_length(bytes.len())
            .unwrap_or_else(|| bytes.len().saturating_mul(3).saturating_add(4));
        let mut text = String::with_capacity(capacity);
        let (result, _, _) = self.inner.decode_to_string(bytes, &mut text, last);
        // capacity covers the worst case, so the whole input is consumed
        debug_assert_eq!(result, CoderResult::InputEmpty);
        text
    }
}

fn forward(mut reader: PipeReader, out: &mut dyn Write) -> Result<(), ShellError> {
    let mut decoder = IncrementalDecoder::new();
    let mut chunk = [0u8; CHUNK_SIZE];
    loop {
        let n = match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        write_text(out, &decoder.decode(&chunk[..n]))?;
    }
    write_text(out, &decoder.finish())
}

fn write_text(out: &mut dyn Write, text: &str) -> Result<(), ShellError> {
    if !text.is_empty() {
        out.write_all(text.as_bytes())?;
        out.flush()?;
    }
    Ok(())
}

fn decode(bytes: &[u8]) -> String {
    UTF_8.decode_without_bom_handling(bytes).0.into_owned()
}

fn check_status(status: ExitStatus) -> Result<(), ShellError> {
    match exit_code(status) {
        0 => Ok(()),
        code => Err(ShellError::ChildProcessFailed(code)),
    }
}

fn exit_code(status: ExitStatus) -> ExitCode {
    match status.code() {
        Some(code) => code,
        None => terminated_by_signal(status),
    }
}

#[cfg(unix)]
fn terminated_by_signal(status: ExitStatus) -> ExitCode {
    use std::os::unix::process::ExitStatusExt;
    match status.signal() {
        Some(signal) => 128 + signal,
        None => -1,
    }
}

#[cfg(not(unix))]
fn terminated_by_signal(_status: ExitStatus) -> ExitCode {
    -1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decoder_holds_back_split_characters() {
        let mut decoder = IncrementalDecoder::new();
        let bytes = "é".as_bytes();
        assert_eq!(decoder.decode(&bytes[..1]), "");
        assert_eq!(decoder.decode(&bytes[1..]), "é");
        assert_eq!(decoder.finish(), "");
    }

    #[test]
    fn decoder_replaces_truncated_tail() {
        let mut decoder = IncrementalDecoder::new();
        assert_eq!(decoder.decode(b"ok\xE2\x82"), "ok");
        assert_eq!(decoder.finish(), "\u{FFFD}");
    }

    #[test]
    fn invalid_bytes_are_replaced() {
        assert_eq!(decode(b"a\xFFb"), "a\u{FFFD}b");
    }

    #[cfg(unix)]
    mod unix {
        use super::super::*;
        use pretty_assertions::assert_eq;

        fn sh() -> Shell {
            Shell::default()
        }

        #[test]
        fn capture_returns_merged_output() {
            let output = sh().run_capture("echo out; echo err >&2").unwrap();
            assert_eq!(output, "out\nerr\n");
        }

        #[test]
        fn capture_fails_on_nonzero_exit() {
            let err = sh().run_capture("echo partial; exit 3").unwrap_err();
            assert!(matches!(err, ShellError::ChildProcessFailed(3)), "{err:?}");
        }

        #[test]
        fn capture_of_silent_command_is_empty() {
            assert_eq!(sh().run_capture("true").unwrap(), "");
        }

        #[test]
        fn stream_forwards_everything_capture_returns() {
            let command = "printf 'one\\n'; printf 'two\\n' >&2; printf 'tr\\303\\250s'";
            let mut streamed = Vec::new();
            sh().run_stream(command, &mut streamed).unwrap();
            let captured = sh().run_capture(command).unwrap();
            assert_eq!(String::from_utf8(streamed).unwrap(), captured);
            assert_eq!(captured, "one\ntwo\ntrès");
        }

        #[test]
        fn stream_fails_after_forwarding_output() {
            let mut streamed = Vec::new();
            let err = sh().run_stream("echo before; exit 7", &mut streamed).unwrap_err();
            assert!(matches!(err, ShellError::ChildProcessFailed(7)), "{err:?}");
            assert_eq!(streamed, b"before\n");
        }

        #[test]
        fn triple_reports_exit_code_instead_of_failing() {
            let output = sh().run_capture_triple("echo -n failed && exit 200").unwrap();
            assert_eq!(
                output,
                CapturedOutput {
                    stdout: "failed".to_string(),
                    stderr: String::new(),
                    code: 200,
                }
            );
        }

        #[test]
        fn triple_keeps_stderr_separate() {
            let output = sh().run_capture_triple("cat .").unwrap();
            assert_eq!(output.stdout, "");
            assert!(output.stderr.to_lowercase().contains("directory"), "{output:?}");
            assert_eq!(output.code, 1);
        }

        #[test]
        fn killed_child_reports_signal_code() {
            let err = sh().run_capture("kill -9 $$").unwrap_err();
            assert!(matches!(err, ShellError::ChildProcessFailed(137)), "{err:?}");
        }

        #[test]
        fn missing_shell_is_a_spawn_error() {
            let err = Shell::new("/no/such/shell").run_capture("true").unwrap_err();
            assert!(matches!(err, ShellError::Spawn { .. }), "{err:?}");
        }
    }
}
