//! Locating the command interpreter that shell literals run through.

use log::warn;
use std::env;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Environment variable naming the shell to run commands with.
pub const SHELL_ENV_VAR: &str = "TILDESH_SHELL";

/// Shell used when [`SHELL_ENV_VAR`] is unset.
#[cfg(not(windows))]
pub const DEFAULT_SHELL: &str = "/bin/sh";
#[cfg(windows)]
pub const DEFAULT_SHELL: &str = "cmd";

/// Reads [`SHELL_ENV_VAR`] and resolves it to an executable.
///
/// Returns `None` when the variable is unset, empty, or names a program that
/// cannot be found; the last case is logged.
pub fn shell_from_env() -> Option<PathBuf> {
    let requested = env::var_os(SHELL_ENV_VAR).filter(|v| !v.is_empty())?;
    let search_paths = env::var_os("PATH").unwrap_or_default();
    let found = find_command_path(&search_paths, Path::new(&requested));
    if found.is_none() {
        warn!(
            "{SHELL_ENV_VAR}={} does not name an executable, using {DEFAULT_SHELL}",
            requested.to_string_lossy()
        );
    }
    found
}

/// Resolves a program name the way a shell would.
///
/// Names containing a path separator are taken relative to the current
/// directory (or as-is when absolute). Bare names are searched for in each
/// directory of `search_paths`, a `PATH`-style list. Only executables count.
pub fn find_command_path(search_paths: &OsStr, program: &Path) -> Option<PathBuf> {
    if program.as_os_str().is_empty() {
        return None;
    }

    if program.components().count() > 1 || program.is_absolute() {
        return is_executable(program).then(|| program.to_path_buf());
    }

    env::split_paths(search_paths)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    fn make_file(dir: &Path, name: &str, mode: u32) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(mode)).unwrap();
        path
    }

    #[test]
    fn absolute_path_to_shell() {
        let found = find_command_path(OsStr::new(""), Path::new("/bin/sh"));
        assert_eq!(found.as_deref(), Some(Path::new("/bin/sh")));
    }

    #[test]
    fn bare_name_is_searched_in_path() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        let expected = make_file(second.path(), "mysh", 0o755);

        let search = env::join_paths([first.path(), second.path()]).unwrap();
        let found = find_command_path(&search, Path::new("mysh"));
        assert_eq!(found, Some(expected));
    }

    #[test]
    fn non_executable_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        make_file(dir.path(), "plain", 0o644);

        let found = find_command_path(dir.path().as_os_str(), Path::new("plain"));
        assert_eq!(found, None);
    }

    #[test]
    fn missing_and_empty_names() {
        assert_eq!(find_command_path(OsStr::new("/bin"), Path::new("")), None);
        assert_eq!(
            find_command_path(OsStr::new("/bin"), Path::new("no-such-shell-here")),
            None
        );
        assert_eq!(
            find_command_path(OsStr::new("/bin"), Path::new("/bin/no-such-shell-here")),
            None
        );
    }
}
