//! Rejects recognition noise before it reaches a provider

/// Utterances consisting only of one of these are ignored
pub const FILLER_WORDS: [&str; 6] = ["a", "ah", "um", "uh", "hm", "mm"];

const MIN_CHARS: usize = 2;

/// True if `text` is too short or a lone filler word
pub fn is_noise(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.chars().count() < MIN_CHARS {
        return true;
    }
    FILLER_WORDS
        .iter()
        .any(|filler| trimmed.eq_ignore_ascii_case(filler))
}
