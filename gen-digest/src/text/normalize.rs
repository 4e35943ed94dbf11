//! Normalization of newsletter text: link stripping and speech cleanup.

use once_cell::sync::Lazy;
use regex::Regex;

use super::TextBlock;

/// `[label](target)` markdown links.
static MARKDOWN_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]*)\]\(([^)]*)\)").expect("markdown link pattern is valid"));

/// Replace markdown links with their label.
pub fn strip_markdown_links(text: &str) -> String {
    MARKDOWN_LINK.replace_all(text, "$1").into_owned()
}

enum Speak {
    Keep,
    Replace(&'static str),
    Drop,
}

/// How a character should reach the synthesizer.
fn speakable(c: char) -> Speak {
    match c {
        '\u{2018}' | '\u{2019}' | '\u{2032}' => Speak::Replace("'"),
        '\u{201c}' | '\u{201d}' | '\u{2033}' | '\u{00ab}' | '\u{00bb}' => Speak::Replace("\""),
        '\u{2011}'..='\u{2015}' => Speak::Replace("-"),
        '\u{2026}' => Speak::Replace("."),
        '\u{00a0}' | '\t' => Speak::Replace(" "),
        '\u{200b}' | '\u{200c}' | '\u{200d}' | '\u{feff}' => Speak::Drop,
        '\n' => Speak::Keep,
        c if c.is_control() => Speak::Drop,
        _ => Speak::Keep,
    }
}

/// Clean text for synthesis.
///
/// Smart punctuation becomes ASCII, control and zero-width characters are
/// dropped, runs of spaces collapse to one, more than two consecutive
/// newlines collapse to two, and repeated periods collapse to one.
pub fn clean_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    let mut newlines = 0;

    let mapped = text.chars().flat_map(|c| {
        let chars: Vec<char> = match speakable(c) {
            Speak::Keep => vec![c],
            Speak::Replace(r) => r.chars().collect(),
            Speak::Drop => Vec::new(),
        };
        chars
    });

    for c in mapped {
        match c {
            ' ' => pending_space = true,
            '\n' => {
                pending_space = false;
                newlines += 1;
                if newlines <= 2 {
                    out.push('\n');
                }
            }
            '.' if out.ends_with('.') && !pending_space && newlines == 0 => {}
            _ => {
                if pending_space && !out.is_empty() && !out.ends_with('\n') {
                    out.push(' ');
                }
                pending_space = false;
                newlines = 0;
                out.push(c);
            }
        }
    }

    out.trim().to_string()
}

/// Produce copies of the blocks with markdown links reduced to their labels.
///
/// Nothing else changes, so character counts stay those of the source text.
/// The input is left untouched.
pub fn normalize_blocks(blocks: &[TextBlock]) -> Vec<TextBlock> {
    blocks
        .iter()
        .map(|block| TextBlock::new(&block.title, strip_markdown_links(&block.text)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_markdown_links() {
        let text = "Check [this link](http://a.com) and [another one](http://b.com).";
        assert_eq!(strip_markdown_links(text), "Check this link and another one.");
        assert_eq!(strip_markdown_links("No links here."), "No links here.");
    }

    #[test]
    fn test_strip_markdown_links_keeps_brackets_without_target() {
        assert_eq!(strip_markdown_links("a [note] here"), "a [note] here");
    }

    #[test]
    fn test_clean_smart_quotes() {
        let text = "\u{201c}Hello,\u{201d} said John. \u{2018}It\u{2019}s nice.\u{2019}";
        assert_eq!(clean_text(text), "\"Hello,\" said John. 'It's nice.'");
    }

    #[test]
    fn test_clean_dashes() {
        assert_eq!(clean_text("one\u{2013}two\u{2014}three"), "one-two-three");
    }

    #[test]
    fn test_clean_multiple_periods() {
        assert_eq!(clean_text("What.. is... this...."), "What. is. this.");
        assert_eq!(clean_text("Wait\u{2026} what?"), "Wait. what?");
    }

    #[test]
    fn test_clean_whitespace() {
        assert_eq!(
            clean_text("Hello   world\n\n\n\nNew paragraph"),
            "Hello world\n\nNew paragraph"
        );
        assert_eq!(clean_text("Line 1\nLine 2"), "Line 1\nLine 2");
    }

    #[test]
    fn test_clean_control_and_zero_width() {
        assert_eq!(clean_text("Hello\x00World\x07Test"), "HelloWorldTest");
        assert_eq!(clean_text("Hello\u{200b}World\u{feff}Test"), "HelloWorldTest");
    }

    #[test]
    fn test_normalize_blocks_is_pure() {
        let blocks = vec![TextBlock::new("Tech", "Read [more](https://x.io)  now")];
        let normalized = normalize_blocks(&blocks);

        assert_eq!(normalized[0].title, "Tech");
        assert_eq!(normalized[0].text, "Read more  now");
        assert_eq!(blocks[0].text, "Read [more](https://x.io)  now");
    }
}
