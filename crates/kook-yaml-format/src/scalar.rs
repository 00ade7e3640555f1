//! Scalar handling utilities for YAML output.
//!
//! Decides whether a string can be written plain, escapes it for single or
//! double quotes, and folds long double-quoted strings across lines.

use std::borrow::Cow;

use kook_yaml_tree::{ScalarTag, resolve_scalar};

/// Characters that cannot start a plain scalar.
const INDICATORS: &[char] = &[
    '-', '?', ':', ',', '[', ']', '{', '}', '#', '&', '*', '!', '|', '>', '\'', '"', '%', '@',
    '`',
];

/// Check if a string must be quoted to read back as the same string.
///
/// Quoting is needed when the string:
/// 1. is empty or would resolve to a non-string type (`123`, `yes`, `~`)
/// 2. starts with an indicator character or a document marker
/// 3. has leading or trailing whitespace
/// 4. contains `: ` or ` #`, or ends with `:`
/// 5. contains flow indicators and is written inside a flow collection
/// 6. is the merge key `<<`
/// 7. contains characters that only double quotes can express
pub fn needs_quotes(s: &str, flow: bool) -> bool {
    let Some(first) = s.chars().next() else {
        return true;
    };
    if resolve_scalar(s) != ScalarTag::Str {
        return true;
    }
    if INDICATORS.contains(&first) || s.starts_with("...") {
        return true;
    }
    if s.starts_with([' ', '\t']) || s.ends_with([' ', '\t']) {
        return true;
    }
    if s.contains(": ") || s.contains(":\t") || s.contains(" #") || s.contains("\t#") || s.ends_with(':')
    {
        return true;
    }
    if flow && s.contains([',', '[', ']', '{', '}']) {
        return true;
    }
    s == "<<" || needs_double_quotes(s)
}

/// Check if a string contains characters single quotes cannot carry.
pub fn needs_double_quotes(s: &str) -> bool {
    s.chars().any(requires_escape)
}

fn requires_escape(c: char) -> bool {
    c.is_control() || matches!(c, '\u{85}' | '\u{2028}' | '\u{2029}' | '\u{feff}')
}

/// Whether a string has a single space between two non-space characters,
/// which is where a folded double-quoted scalar may break.
pub fn is_foldable(s: &str) -> bool {
    s.as_bytes()
        .windows(3)
        .any(|w| w[0] != b' ' && w[1] == b' ' && w[2] != b' ')
}

/// Quote a string with single quotes.
pub fn quote_single(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Escape a string for double-quoted output.
///
/// Returns the escaped content (without surrounding quotes).
pub fn escape_double(s: &str) -> Cow<'_, str> {
    if !s
        .chars()
        .any(|c| matches!(c, '"' | '\\') || requires_escape(c))
    {
        return Cow::Borrowed(s);
    }

    let mut result = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        match c {
            '"' => result.push_str("\\\""),
            '\\' => result.push_str("\\\\"),
            '\0' => result.push_str("\\0"),
            '\u{07}' => result.push_str("\\a"),
            '\u{08}' => result.push_str("\\b"),
            '\t' => result.push_str("\\t"),
            '\n' => result.push_str("\\n"),
            '\u{0b}' => result.push_str("\\v"),
            '\u{0c}' => result.push_str("\\f"),
            '\r' => result.push_str("\\r"),
            '\u{1b}' => result.push_str("\\e"),
            '\u{85}' => result.push_str("\\N"),
            '\u{2028}' => result.push_str("\\L"),
            '\u{2029}' => result.push_str("\\P"),
            c if (c as u32) <= 0xff && requires_escape(c) => {
                result.push_str(&format!("\\x{:02X}", c as u32));
            }
            c if requires_escape(c) => {
                result.push_str(&format!("\\u{:04X}", c as u32));
            }
            c => result.push(c),
        }
    }
    Cow::Owned(result)
}

/// Write already-escaped content as a double-quoted scalar, breaking lines
/// at single spaces so that no line runs past `width` where avoidable.
///
/// `start_col` is the column of the opening quote and `indent` the column
/// continuation lines start at. A break replaces exactly one space, which
/// the reader folds back into a space.
pub fn fold_double(escaped: &str, start_col: usize, indent: usize, width: usize) -> String {
    let segments: Vec<&str> = escaped.split(' ').collect();
    let mut out = String::with_capacity(escaped.len() + 8);
    out.push('"');
    let mut col = start_col + 1;
    let mut line_has_text = false;

    for (i, segment) in segments.iter().enumerate() {
        let segment_width = segment.chars().count();
        if i > 0 {
            let breakable = !segments[i - 1].is_empty() && !segment.is_empty();
            // The closing quote rides on the last segment.
            let needed = segment_width + usize::from(i == segments.len() - 1);
            if breakable && line_has_text && col + 1 + needed > width {
                out.push('\n');
                out.extend(std::iter::repeat_n(' ', indent));
                col = indent;
                line_has_text = false;
            } else {
                out.push(' ');
                col += 1;
            }
        }
        out.push_str(segment);
        col += segment_width;
        line_has_text |= !segment.is_empty();
    }

    out.push('"');
    out
}

/// Format a float so it reads back as a float.
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        ".nan".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { ".inf" } else { "-.inf" }.to_string()
    } else {
        // Debug formatting always keeps a `.0` or an exponent.
        format!("{:?}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kook_yaml_tree::decode_double;

    #[test]
    fn test_needs_quotes() {
        for s in ["", "123", "1.5", "yes", "~", "null", "2024-01-01", "- a", "#x", "*ref", "&a"] {
            assert!(needs_quotes(s, false), "{s:?}");
        }
        for s in [" lead", "trail ", "a: b", "a #b", "key:", "<<", "...", "tab\there", "line\nbreak"] {
            assert!(needs_quotes(s, false), "{s:?}");
        }
        for s in ["hello", "hello world", "a:b", "a#b", "a, b", "x[0]", "日本語"] {
            assert!(!needs_quotes(s, false), "{s:?}");
        }
        assert!(needs_quotes("a, b", true));
        assert!(needs_quotes("x[0]", true));
    }

    #[test]
    fn test_needs_double_quotes() {
        assert!(needs_double_quotes("a\nb"));
        assert!(needs_double_quotes("bell\u{07}"));
        assert!(needs_double_quotes("\u{feff}bom"));
        assert!(!needs_double_quotes("it's fine"));
    }

    #[test]
    fn test_quote_single() {
        assert_eq!(quote_single("it's"), "'it''s'");
        assert_eq!(quote_single(""), "''");
    }

    #[test]
    fn test_escape_double() {
        assert_eq!(escape_double("plain"), "plain");
        assert!(matches!(escape_double("plain"), Cow::Borrowed(_)));
        assert_eq!(escape_double("a\"b\\c"), "a\\\"b\\\\c");
        assert_eq!(escape_double("tab\there\nnext"), "tab\\there\\nnext");
        assert_eq!(escape_double("\u{01}\u{7f}"), "\\x01\\x7F");
        assert_eq!(escape_double("\u{feff}"), "\\uFEFF");
    }

    #[test]
    fn test_escape_then_decode() {
        let original = "quote \" slash \\ bell \u{07} nl \n cr \r nbsp \u{a0} ls \u{2028}";
        let escaped = escape_double(original);
        assert_eq!(decode_double(&escaped).unwrap(), original);
    }

    #[test]
    fn test_is_foldable() {
        assert!(is_foldable("a b"));
        assert!(!is_foldable("ab"));
        assert!(!is_foldable("a  b"));
        assert!(!is_foldable(" ab "));
    }

    #[test]
    fn test_fold_double_breaks_at_spaces() {
        let folded = fold_double("aaaa bbbb cccc dddd", 0, 2, 12);
        assert_eq!(folded, "\"aaaa bbbb\n  cccc dddd\"");
        let inner = &folded[1..folded.len() - 1];
        assert_eq!(decode_double(inner).unwrap(), "aaaa bbbb cccc dddd");
    }

    #[test]
    fn test_fold_double_keeps_double_spaces() {
        let folded = fold_double("aaaa  bbbb", 0, 2, 5);
        assert_eq!(folded, "\"aaaa  bbbb\"");
    }

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(1.0), "1.0");
        assert_eq!(format_float(-0.5), "-0.5");
        assert_eq!(format_float(1e300), "1e300");
        assert_eq!(format_float(f64::INFINITY), ".inf");
        assert_eq!(format_float(f64::NEG_INFINITY), "-.inf");
        assert_eq!(format_float(f64::NAN), ".nan");
    }
}
