//! Message sanitization applied before anything reaches a log or a result.
//!
//! Archive member names and OS error strings are attacker-influenced; they
//! must not be able to inject fake log lines or flood the log.

/// Longest message kept, in characters.
pub const MAX_MESSAGE_CHARS: usize = 1000;

/// Appended to messages cut at [`MAX_MESSAGE_CHARS`].
pub const TRUNCATION_MARKER: &str = "... [truncated]";

/// Strip control characters and cap the length.
///
/// # Examples
///
/// ```
/// use bulk_extractor::sanitize::sanitize_message;
///
/// assert_eq!(sanitize_message("evil\nERROR: forged"), "evilERROR: forged");
/// ```
pub fn sanitize_message(message: &str) -> String {
    let mut cleaned: String = message.chars().filter(|c| !c.is_control()).collect();

    if let Some((cut, _)) = cleaned.char_indices().nth(MAX_MESSAGE_CHARS) {
        cleaned.truncate(cut);
        cleaned.push_str(TRUNCATION_MARKER);
    }

    cleaned
}
