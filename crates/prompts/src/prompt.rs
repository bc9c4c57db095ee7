//! Prompt parsing.
//!
//! A prompt file is plain UTF-8 text with one prompt per line. Lines are
//! trimmed; blank lines and lines starting with [`COMMENT_MARKER`] are
//! ignored. There is no escaping and no multi-line prompt syntax, so a line is
//! the entire prompt verbatim after trimming.

use derive_more::Display;

/// Lines starting with this marker (after trimming) are ignored.
pub const COMMENT_MARKER: char = '#';
const BYTE_ORDER_MARK: char = '\u{feff}';

/// A single line of generation instruction text.
///
/// Always non-empty, trimmed, and never starts with [`COMMENT_MARKER`].
#[derive(Clone, Debug, Display, PartialEq, Eq, Hash)]
pub struct Prompt(String);
impl Prompt {
    /// Build a prompt from a single line of text, returning `None` if the line
    /// is blank or a comment.
    pub fn from_line(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() || line.starts_with(COMMENT_MARKER) {
            return None;
        }
        Some(Self(line.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Shortened form for log output, cut on a character boundary.
    pub fn preview(&self, max_chars: usize) -> String {
        match self.0.char_indices().nth(max_chars) {
            Some((cut, _)) => format!("{}...", &self.0[..cut]),
            None => self.0.clone(),
        }
    }
}
impl AsRef<str> for Prompt {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
impl From<Prompt> for String {
    fn from(prompt: Prompt) -> Self {
        prompt.0
    }
}

/// Extract the prompts from the text contents of a prompt file, preserving
/// file order.
///
/// Returns an empty list (not an error) when nothing usable remains.
pub fn parse(contents: &str) -> Vec<Prompt> {
    // Editors on Windows love to prepend a BOM; it isn't whitespace as far as
    // `str::trim` is concerned and would end up inside the first prompt.
    let contents = contents.strip_prefix(BYTE_ORDER_MARK).unwrap_or(contents);
    contents.lines().filter_map(Prompt::from_line).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn strings(prompts: &[Prompt]) -> Vec<&str> {
        prompts.iter().map(Prompt::as_str).collect()
    }

    #[test]
    fn test_comments_and_blank_lines_are_dropped() {
        let prompts = parse("cat\n# comment\n\ndog\n");
        assert_eq!(strings(&prompts), ["cat", "dog"]);
    }

    #[test]
    fn test_order_is_preserved() {
        let prompts = parse("zebra\napple\n  # skip\nmango");
        assert_eq!(strings(&prompts), ["zebra", "apple", "mango"]);
    }

    #[test]
    fn test_lines_are_trimmed() {
        let prompts = parse("   a castle at dusk  \r\n\tneon city\t\r\n");
        assert_eq!(strings(&prompts), ["a castle at dusk", "neon city"]);
    }

    #[test]
    fn test_hash_inside_a_prompt_is_kept() {
        let prompts = parse("a poster with #1 on it");
        assert_eq!(strings(&prompts), ["a poster with #1 on it"]);
    }

    #[test]
    fn test_byte_order_mark_is_ignored() {
        let prompts = parse("\u{feff}# header\nfirst");
        assert_eq!(strings(&prompts), ["first"]);
    }

    #[rstest]
    #[case("")]
    #[case("\n\n\n")]
    #[case("   \n\t\n")]
    #[case("# only\n  # comments\n#")]
    fn test_nothing_usable(#[case] contents: &str) {
        assert!(parse(contents).is_empty());
    }

    #[rstest]
    #[case("short", 60, "short")]
    #[case("abcdef", 3, "abc...")]
    #[case("abc", 3, "abc")]
    #[case("ünïcödé", 4, "ünïc...")]
    fn test_preview(#[case] text: &str, #[case] max: usize, #[case] expected: &str) {
        let prompt = Prompt::from_line(text).unwrap();
        assert_eq!(prompt.preview(max), expected);
    }
}
