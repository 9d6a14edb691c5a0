//! Sentence boundaries over de-tagged text.
//!
//! A sentence ends at a run of `.`, `!` or `?`, optionally followed by closing
//! quotes or brackets, when the run is followed by whitespace or the end of
//! the text. Requiring whitespace keeps "3.14" and "a.m." in one piece.

const TERMINATORS: [char; 3] = ['.', '!', '?'];

fn is_closing(c: char) -> bool {
    matches!(
        c,
        '"' | '\'' | ')' | ']' | '}' | '\u{201D}' | '\u{2019}' | '\u{00BB}' | '\u{300D}'
    )
}

/// Byte offsets just past each sentence's terminating run.
pub fn sentence_ends(text: &str) -> Vec<usize> {
    let mut ends = Vec::new();
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if !TERMINATORS.contains(&c) {
            continue;
        }
        let mut end = i + c.len_utf8();
        while let Some(&(j, next)) = chars.peek() {
            if TERMINATORS.contains(&next) || is_closing(next) {
                end = j + next.len_utf8();
                chars.next();
            } else {
                break;
            }
        }
        match chars.peek() {
            None => ends.push(end),
            Some(&(_, next)) if next.is_whitespace() => ends.push(end),
            _ => {}
        }
    }
    ends
}

/// Splits text into trimmed sentences; a trailing unterminated run counts as
/// the last sentence.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    for end in sentence_ends(text) {
        let sentence = text[start..end].trim();
        if !sentence.is_empty() {
            sentences.push(sentence);
        }
        start = end;
    }
    let rest = text[start..].trim();
    if !rest.is_empty() {
        sentences.push(rest);
    }
    sentences
}
