//! Reply post-processing: navigation directives and speech-safe text
//!
//! Replies may carry a `[LINK:<url>]` directive. It is removed from what is
//! shown and spoken, and the first URL is handed to the UI to open. Code is
//! never read aloud: fenced blocks and inline spans become short placeholders.

use regex::Regex;
use std::sync::LazyLock;

const CODE_BLOCK_PLACEHOLDER: &str = " [code blocks] ";
const INLINE_CODE_PLACEHOLDER: &str = " [code] ";

/// A reply split into what to show, what to say and what to open
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreparedReply {
    /// Text for the transcript, directives removed
    pub display: String,

    /// Text for speech synthesis
    pub spoken: String,

    /// URL from the first `[LINK:...]` directive
    pub link: Option<String>,
}

static LINK_DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[LINK:\s*(https?://[^\]\s]+)\s*\]").expect("valid regex")
});

static ANY_DIRECTIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[LINK:[^\]]*\]").expect("valid regex"));

static CODE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```.*?```").expect("valid regex"));

static INLINE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`[^`\n]+`").expect("valid regex"));

/// Split a raw completion into display text, spoken text and an optional link
pub fn prepare_reply(raw: &str) -> PreparedReply {
    let link = LINK_DIRECTIVE
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string());

    let display = match link {
        Some(_) => tidy_after_removal(&ANY_DIRECTIVE.replace_all(raw, "")),
        None => raw.trim().to_string(),
    };
    let spoken = speakable_text(&display);

    PreparedReply {
        display,
        spoken,
        link,
    }
}

/// Replace code with placeholders and collapse whitespace
pub fn speakable_text(text: &str) -> String {
    let without_blocks = CODE_BLOCK.replace_all(text, CODE_BLOCK_PLACEHOLDER);
    let without_inline = INLINE_CODE.replace_all(&without_blocks, INLINE_CODE_PLACEHOLDER);
    collapse_whitespace(&without_inline)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// Removing a directive can leave "for you! - a link" or doubled spaces mid-line
fn tidy_after_removal(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
