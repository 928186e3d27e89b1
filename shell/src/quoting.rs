//! Shell quoting: the quote-state scanner and the value-quoting utility.

use std::borrow::Cow;
use thiserror::Error;

/// A value that cannot be embedded in a shell command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot quote {0:?} for the shell: it contains a NUL byte")]
pub struct QuoteError(pub String);

/// Reports whether the character at `index` is part of a single-quoted span.
///
/// The text is scanned from the start on every call, keeping POSIX nesting
/// rules: a `'` only toggles single quoting outside double quotes, and a `"`
/// only toggles double quoting outside single quotes. Both the opening and
/// the closing quote characters count as inside the span. Backslashes get no
/// special treatment.
///
/// `index` is a character offset. An index at or past the end reports
/// whether a single-quoted span is still open at the end of the text, which
/// is where text appended to `text` would land.
pub fn is_inside_single_quotes(text: &str, index: usize) -> bool {
    let mut in_single = false;
    let mut in_double = false;

    for (i, ch) in text.chars().enumerate() {
        let was_single = in_single;
        match ch {
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            _ => {}
        }
        if i == index {
            return was_single || in_single;
        }
    }

    in_single
}

/// Quotes `value` so the shell reads it back as exactly one word.
///
/// # Errors
///
/// Fails when the value contains a NUL byte, which no shell word can hold.
pub fn quote(value: &str) -> Result<String, QuoteError> {
    shlex::try_quote(value)
        .map(Cow::into_owned)
        .map_err(|_| QuoteError(value.to_string()))
}
