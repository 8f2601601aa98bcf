//! Display escaping for transcript text.
//!
//! Replies come from an endpoint we only partly trust, and the transcript is
//! drawn straight onto a terminal. Anything that a terminal would interpret
//! (escape sequences, bare control characters) is stripped before a message
//! is stored, so the text can only ever be displayed, never executed.

use regex::Regex;
use std::sync::OnceLock;

// CSI (`ESC [ ... final`), OSC (`ESC ] ... BEL|ST`), short ESC sequences, 8-bit CSI.
const ESCAPE_SEQUENCE: &str =
    r"\x1b\[[0-?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)|\x1b[ -/]*[0-~]|\x{9b}[0-?]*[ -/]*[@-~]";

fn escape_sequence_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(ESCAPE_SEQUENCE).expect("escape sequence pattern is valid"))
}

/// Make `text` safe to place in the transcript.
///
/// Newlines and tabs survive, `\r\n` collapses to `\n`, and every other
/// control character is dropped.
pub fn for_display(text: &str) -> String {
    let without_sequences = escape_sequence_regex().replace_all(text, "");

    without_sequences
        .replace("\r\n", "\n")
        .chars()
        .filter(|c| *c == '\n' || *c == '\t' || !c.is_control())
        .collect()
}
