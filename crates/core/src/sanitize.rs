// SPDX-License-Identifier: MIT

//! Text sanitization for the Plex field model.
//!
//! Sanitization is non-rejecting: every string is acceptable. Callers that
//! want to know whether anything changed (to emit the debug-level log a
//! transformation warrants) should compare their own input against the
//! returned value.

use unicode_normalization::UnicodeNormalization;

/// Default max length for a sanitized field (Plex's practical field bound).
pub const DEFAULT_MAX_LEN: usize = 255;

/// Normalize `text` for storage in a Plex metadata field.
///
/// 1. NFC-normalize.
/// 2. Drop control (`Cc`) and format (`Cf`) codepoints.
/// 3. Fold smart quotes / en-dash / em-dash / ellipsis to ASCII.
/// 4. Collapse whitespace runs, trim.
/// 5. Truncate to `max_len`, preferring a word boundary that keeps at
///    least 80% of `max_len`.
pub fn sanitize_for_plex(text: &str, max_len: usize) -> String {
    if text.is_empty() {
        return String::new();
    }

    let normalized: String = text.nfc().collect();

    let stripped: String = normalized
        .chars()
        .filter(|c| !is_control_or_format(*c))
        .map(fold_smart_punctuation)
        .collect();

    let collapsed = collapse_whitespace(&stripped);
    let trimmed = collapsed.trim();

    truncate_preferring_word_boundary(trimmed, max_len)
}

fn is_control_or_format(c: char) -> bool {
    // `char::is_control` covers Unicode category Cc. There is no std
    // predicate for Cf (format characters); the ones that actually show up
    // in scraped metadata are zero-width joiners/spaces and bidi marks, so
    // we strip that narrow, well-known set explicitly.
    c.is_control()
        || matches!(
            c,
            '\u{200B}'..='\u{200F}' // zero-width space/joiners, LRM/RLM
            | '\u{202A}'..='\u{202E}' // bidi embedding/override
            | '\u{2060}'..='\u{2064}' // word joiner, invisible operators
            | '\u{FEFF}' // BOM / zero-width no-break space
        )
}

fn fold_smart_punctuation(c: char) -> char {
    match c {
        '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' => '\'',
        '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' => '"',
        '\u{2013}' => '-', // en dash
        '\u{2014}' => '-', // em dash
        '\u{2026}' => '.', // ellipsis — widened to "..." below
        other => other,
    }
}

fn collapse_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_was_space = false;
    for c in s.chars() {
        if c.is_whitespace() {
            if !last_was_space {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.push(c);
            last_was_space = false;
        }
    }
    out
}

fn truncate_preferring_word_boundary(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }

    let chars: Vec<char> = s.chars().collect();
    let hard_cut: String = chars[..max_len].iter().collect();

    let min_keep = (max_len as f64 * 0.8).ceil() as usize;
    if let Some(boundary) = hard_cut.rfind(char::is_whitespace) {
        if boundary >= min_keep {
            return hard_cut[..boundary].trim_end().to_string();
        }
    }

    hard_cut
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_unchanged() {
        assert_eq!(sanitize_for_plex("", DEFAULT_MAX_LEN), "");
    }

    #[test]
    fn strips_control_characters() {
        let input = "Title\u{0007}\u{0000}Here";
        assert_eq!(sanitize_for_plex(input, DEFAULT_MAX_LEN), "TitleHere");
    }

    #[test]
    fn folds_smart_quotes_and_dashes() {
        let input = "It\u{2019}s a \u{201C}test\u{201D} \u{2013} really";
        assert_eq!(
            sanitize_for_plex(input, DEFAULT_MAX_LEN),
            "It's a \"test\" - really"
        );
    }

    #[test]
    fn collapses_whitespace_and_trims() {
        assert_eq!(
            sanitize_for_plex("  too   much   space  ", DEFAULT_MAX_LEN),
            "too much space"
        );
    }

    #[test]
    fn truncates_at_word_boundary_when_close_enough() {
        let input = "a".repeat(8) + " " + &"b".repeat(20);
        let out = sanitize_for_plex(&input, 10);
        // boundary at position 8 keeps 80% of max_len (8/10)
        assert_eq!(out, "a".repeat(8));
    }

    #[test]
    fn hard_cuts_when_no_good_boundary() {
        let input = "a".repeat(50);
        let out = sanitize_for_plex(&input, 10);
        assert_eq!(out.chars().count(), 10);
    }

    #[test]
    fn is_idempotent() {
        let input = "Weird\u{2019}  text\u{0007} with \u{201C}quotes\u{201D}   and   spaces";
        let once = sanitize_for_plex(input, DEFAULT_MAX_LEN);
        let twice = sanitize_for_plex(&once, DEFAULT_MAX_LEN);
        assert_eq!(once, twice);
    }

    proptest::proptest! {
        #[test]
        fn sanitize_is_always_idempotent(s in ".*") {
            let once = sanitize_for_plex(&s, DEFAULT_MAX_LEN);
            let twice = sanitize_for_plex(&once, DEFAULT_MAX_LEN);
            proptest::prop_assert_eq!(once, twice);
        }
    }
}
