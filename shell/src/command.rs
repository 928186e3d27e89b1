//! The ways a shell literal can be executed.

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// Children killed by a signal are reported as `128 + signal`, the way POSIX
/// shells report them in `$?`.
pub type ExitCode = i32;

/// Namespace entry behind [`CaptureVariant::Stream`].
pub const RUN_STREAM: &str = "$run_stream";
/// Namespace entry behind [`CaptureVariant::Single`].
pub const RUN_CAPTURE: &str = "$run_capture";
/// Namespace entry behind [`CaptureVariant::Triple`].
pub const RUN_CAPTURE_TRIPLE: &str = "$run_capture_triple";
/// Namespace entry of the value-quoting utility.
pub const SHELL_QUOTE: &str = "$shell_quote";

/// How a shell literal runs, decided by where it appears in the program.
///
/// The names of the helpers start with `$` so no user program can refer to
/// or shadow them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureVariant {
    /// Output goes straight to the program's own output; the value is `None`.
    Stream,
    /// Merged stdout and stderr are returned as one string.
    Single,
    /// `(stdout, stderr, exit_code)` is returned and a non-zero exit is not an error.
    Triple,
}

impl CaptureVariant {
    /// Name of the helper a rewritten literal calls.
    pub fn runner(self) -> &'static str {
        match self {
            CaptureVariant::Stream => RUN_STREAM,
            CaptureVariant::Single => RUN_CAPTURE,
            CaptureVariant::Triple => RUN_CAPTURE_TRIPLE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runners_are_distinct_and_unnameable() {
        let names = [
            CaptureVariant::Stream.runner(),
            CaptureVariant::Single.runner(),
            CaptureVariant::Triple.runner(),
        ];
        assert_eq!(names, [RUN_STREAM, RUN_CAPTURE, RUN_CAPTURE_TRIPLE]);
        assert!(names.iter().chain([&SHELL_QUOTE]).all(|n| n.starts_with('$')));
    }
}
