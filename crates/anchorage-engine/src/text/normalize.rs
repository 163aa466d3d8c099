use regex::Regex;
use std::sync::OnceLock;

/// Collapse every run of whitespace to a single space and trim both ends.
pub fn normalize_text(text: &str) -> String {
    static WHITESPACE: OnceLock<Regex> = OnceLock::new();
    let whitespace =
        WHITESPACE.get_or_init(|| Regex::new(r"\s+").expect("Invalid whitespace regex"));

    whitespace.replace_all(text, " ").trim().to_string()
}

/// Fold typographic quote, dash and space variants to their ASCII forms.
///
/// The mapping is one character to one character, so a character offset into the
/// result is also a valid offset into the input.
pub fn normalize_quotes(text: &str) -> String {
    text.chars().map(fold_typography).collect()
}

fn fold_typography(c: char) -> char {
    match c {
        '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' | '`' | '\u{00B4}' => '\'',
        '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{00AB}' | '\u{00BB}' => '"',
        '\u{2013}' | '\u{2014}' => '-',
        '\u{00A0}' => ' ',
        other => other,
    }
}

/// Lower-case each character to a single character, keeping offsets aligned.
///
/// Characters whose lower-case form expands (e.g. `İ`) keep only the first
/// character of the expansion.
pub fn fold_case(text: &str) -> String {
    text.chars()
        .map(|c| c.to_lowercase().next().unwrap_or(c))
        .collect()
}

/// The first `max` characters of `text`.
pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// The last `max` characters of `text`.
pub fn last_chars(text: &str, max: usize) -> String {
    let count = text.chars().count();
    text.chars().skip(count.saturating_sub(max)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("", "")]
    #[case("   ", "")]
    #[case("hello", "hello")]
    #[case("  hello   world  ", "hello world")]
    #[case("line one\n\n\tline two", "line one line two")]
    #[case("a\u{00A0}\u{00A0}b", "a b")]
    fn test_normalize_text(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize_text(input), expected);
    }

    #[rstest]
    #[case("\u{2018}quoted\u{2019}", "'quoted'")]
    #[case("\u{201C}hello\u{201D}", "\"hello\"")]
    #[case("\u{00AB}bonjour\u{00BB}", "\"bonjour\"")]
    #[case("2019\u{2013}2020 \u{2014} done", "2019-2020 - done")]
    #[case("non\u{00A0}breaking", "non breaking")]
    #[case("plain text", "plain text")]
    fn test_normalize_quotes(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize_quotes(input), expected);
    }

    #[rstest]
    #[case("  messy \n text ")]
    #[case("\u{201C}curly\u{201D} \u{2014} dash")]
    #[case("")]
    fn test_normalizers_are_idempotent(#[case] input: &str) {
        let once = normalize_text(input);
        assert_eq!(normalize_text(&once), once);

        let once = normalize_quotes(input);
        assert_eq!(normalize_quotes(&once), once);
    }

    #[test]
    fn test_normalize_quotes_preserves_char_count() {
        let input = "He said \u{201C}hello\u{201D} \u{2014} twice";
        assert_eq!(
            normalize_quotes(input).chars().count(),
            input.chars().count()
        );
    }

    #[test]
    fn test_fold_case_preserves_char_count() {
        let input = "İstanbul ÄÖÜ";
        assert_eq!(fold_case(input).chars().count(), input.chars().count());
        assert_eq!(fold_case("Budget REVIEW"), "budget review");
    }

    #[test]
    fn test_char_caps() {
        assert_eq!(truncate_chars("héllo world", 5), "héllo");
        assert_eq!(last_chars("héllo world", 5), "world");
        assert_eq!(last_chars("abc", 10), "abc");
    }
}
