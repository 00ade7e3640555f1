//! Scalar decoding and implicit type resolution (YAML 1.1 rules).

use crate::node::ScalarTag;

/// Resolve the implicit type of a plain scalar.
pub fn resolve_scalar(text: &str) -> ScalarTag {
    if is_null(text) {
        ScalarTag::Null
    } else if is_bool(text) {
        ScalarTag::Bool
    } else if is_int(text) {
        ScalarTag::Int
    } else if is_float(text) {
        ScalarTag::Float
    } else if is_timestamp(text) {
        ScalarTag::Timestamp
    } else {
        ScalarTag::Str
    }
}

fn is_null(text: &str) -> bool {
    matches!(text, "" | "~" | "null" | "Null" | "NULL")
}

fn is_bool(text: &str) -> bool {
    parse_bool(text).is_some()
}

/// Parse a YAML 1.1 boolean.
pub fn parse_bool(text: &str) -> Option<bool> {
    match text {
        "true" | "True" | "TRUE" | "yes" | "Yes" | "YES" | "on" | "On" | "ON" => Some(true),
        "false" | "False" | "FALSE" | "no" | "No" | "NO" | "off" | "Off" | "OFF" => Some(false),
        _ => None,
    }
}

fn split_sign(text: &str) -> (bool, &str) {
    if let Some(rest) = text.strip_prefix('-') {
        (true, rest)
    } else {
        (false, text.strip_prefix('+').unwrap_or(text))
    }
}

fn all_digits(text: &str, radix: u32) -> bool {
    !text.is_empty()
        && text.chars().any(|c| c != '_')
        && text.chars().all(|c| c == '_' || c.is_digit(radix))
}

fn is_int(text: &str) -> bool {
    let (_, body) = split_sign(text);
    if let Some(hex) = body.strip_prefix("0x") {
        return all_digits(hex, 16);
    }
    if let Some(oct) = body.strip_prefix("0o") {
        return all_digits(oct, 8);
    }
    if let Some(bin) = body.strip_prefix("0b") {
        return all_digits(bin, 2);
    }
    if body == "0" {
        return true;
    }
    // Leading zero means octal in YAML 1.1.
    if let Some(oct) = body.strip_prefix('0') {
        return all_digits(oct, 8);
    }
    body.starts_with(|c: char| c.is_ascii_digit()) && all_digits(body, 10)
}

/// Parse an integer scalar. Returns `None` if the text is not an integer or
/// does not fit in an `i64`.
pub fn parse_int(text: &str) -> Option<i64> {
    if !is_int(text) {
        return None;
    }
    let (negative, body) = split_sign(text);
    let (digits, radix) = if let Some(hex) = body.strip_prefix("0x") {
        (hex, 16)
    } else if let Some(oct) = body.strip_prefix("0o") {
        (oct, 8)
    } else if let Some(bin) = body.strip_prefix("0b") {
        (bin, 2)
    } else if body.len() > 1 && body.starts_with('0') {
        (&body[1..], 8)
    } else {
        (body, 10)
    };
    let digits: String = digits.chars().filter(|c| *c != '_').collect();
    let magnitude = i128::from_str_radix(&digits, radix).ok()?;
    let value = if negative { -magnitude } else { magnitude };
    i64::try_from(value).ok()
}

fn is_float(text: &str) -> bool {
    let (_, body) = split_sign(text);
    if matches!(body, ".inf" | ".Inf" | ".INF") {
        return true;
    }
    if matches!(text, ".nan" | ".NaN" | ".NAN") {
        return true;
    }

    let (mantissa, exponent) = match body.find(['e', 'E']) {
        Some(i) => (&body[..i], Some(&body[i + 1..])),
        None => (body, None),
    };
    if let Some(exponent) = exponent {
        let (_, exp_digits) = split_sign(exponent);
        if exp_digits.is_empty() || !exp_digits.chars().all(|c| c.is_ascii_digit()) {
            return false;
        }
    }

    let (whole, fraction) = match mantissa.split_once('.') {
        Some((w, f)) => (w, Some(f)),
        None => (mantissa, None),
    };
    let digit_or_underscore = |s: &str| s.chars().all(|c| c == '_' || c.is_ascii_digit());
    if !digit_or_underscore(whole) {
        return false;
    }
    match fraction {
        // `.5`
        Some(f) if whole.is_empty() => !f.is_empty() && f.chars().all(|c| c.is_ascii_digit()),
        // `1.` and `1.5`
        Some(f) => whole.chars().any(|c| c.is_ascii_digit()) && digit_or_underscore(f),
        None => whole.chars().any(|c| c.is_ascii_digit()),
    }
}

/// Parse a float scalar, including `.inf`, `-.inf` and `.nan`.
pub fn parse_float(text: &str) -> Option<f64> {
    if !is_float(text) && !is_int(text) {
        return None;
    }
    let (negative, body) = split_sign(text);
    let magnitude = match body {
        ".inf" | ".Inf" | ".INF" => f64::INFINITY,
        ".nan" | ".NaN" | ".NAN" => return Some(f64::NAN),
        _ => {
            let cleaned: String = body.chars().filter(|c| *c != '_').collect();
            match cleaned.parse::<f64>() {
                Ok(v) => v,
                // Hex/octal integers that overflowed `i64`.
                Err(_) => parse_int_lossy(&cleaned)?,
            }
        }
    };
    Some(if negative { -magnitude } else { magnitude })
}

fn parse_int_lossy(body: &str) -> Option<f64> {
    let (digits, radix) = if let Some(hex) = body.strip_prefix("0x") {
        (hex, 16)
    } else if let Some(oct) = body.strip_prefix("0o") {
        (oct, 8)
    } else if let Some(bin) = body.strip_prefix("0b") {
        (bin, 2)
    } else {
        (body.strip_prefix('0').unwrap_or(body), 8)
    };
    let mut value = 0f64;
    for c in digits.chars() {
        value = value * radix as f64 + c.to_digit(radix)? as f64;
    }
    Some(value)
}

/// `YYYY-MM-DD`, optionally followed by `T` or spaces and a time.
fn is_timestamp(text: &str) -> bool {
    let bytes = text.as_bytes();
    if bytes.len() < 10 {
        return false;
    }
    let date_ok = bytes[..4].iter().all(u8::is_ascii_digit)
        && bytes[4] == b'-'
        && bytes[5..7].iter().all(u8::is_ascii_digit)
        && bytes[7] == b'-'
        && bytes[8..10].iter().all(u8::is_ascii_digit);
    if !date_ok {
        return false;
    }
    if bytes.len() == 10 {
        return true;
    }
    let time = match bytes[10] {
        b'T' | b't' => &text[11..],
        b' ' | b'\t' => text[10..].trim_start(),
        _ => return false,
    };
    let time_bytes = time.as_bytes();
    time_bytes.len() >= 5
        && time_bytes[0].is_ascii_digit()
        && time.contains(':')
        && time
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, ':' | '.' | '+' | '-' | 'Z' | ' '))
}

/// Decode the body of a single-quoted scalar (without the quotes).
pub fn decode_single(inner: &str) -> String {
    let mut out = String::with_capacity(inner.len());
    let mut protected = 0;
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\'' if chars.peek() == Some(&'\'') => {
                chars.next();
                out.push('\'');
                protected = out.len();
            }
            '\n' | '\r' => fold_line_break(c, &mut chars, &mut out, protected),
            c => out.push(c),
        }
    }
    out
}

/// Decode the body of a double-quoted scalar (without the quotes).
///
/// On failure returns the offending escape sequence.
pub fn decode_double(inner: &str) -> Result<String, String> {
    let mut out = String::with_capacity(inner.len());
    // Escaped characters at the end of `out` are not trimmed by line folding.
    let mut protected = 0;
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let Some(escape) = chars.next() else {
                    return Err("\\".to_string());
                };
                let decoded = match escape {
                    '0' => '\0',
                    'a' => '\u{07}',
                    'b' => '\u{08}',
                    't' | '\t' => '\t',
                    'n' => '\n',
                    'v' => '\u{0b}',
                    'f' => '\u{0c}',
                    'r' => '\r',
                    'e' => '\u{1b}',
                    ' ' => ' ',
                    '"' => '"',
                    '/' => '/',
                    '\\' => '\\',
                    'N' => '\u{85}',
                    '_' => '\u{a0}',
                    'L' => '\u{2028}',
                    'P' => '\u{2029}',
                    'x' => decode_hex(&mut chars, 2, 'x')?,
                    'u' => decode_hex(&mut chars, 4, 'u')?,
                    'U' => decode_hex(&mut chars, 8, 'U')?,
                    '\n' | '\r' => {
                        // Escaped line break: join without a space.
                        if escape == '\r' && chars.peek() == Some(&'\n') {
                            chars.next();
                        }
                        while let Some(' ' | '\t') = chars.peek() {
                            chars.next();
                        }
                        continue;
                    }
                    other => return Err(format!("\\{other}")),
                };
                out.push(decoded);
                protected = out.len();
            }
            '\n' | '\r' => fold_line_break(c, &mut chars, &mut out, protected),
            c => out.push(c),
        }
    }
    Ok(out)
}

fn decode_hex(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    len: usize,
    prefix: char,
) -> Result<char, String> {
    let digits: String = chars.by_ref().take(len).collect();
    let invalid = || format!("\\{prefix}{digits}");
    if digits.len() != len {
        return Err(invalid());
    }
    u32::from_str_radix(&digits, 16)
        .ok()
        .and_then(char::from_u32)
        .ok_or_else(invalid)
}

/// Fold a line break inside a flow scalar.
///
/// Whitespace around the break is dropped. A single break becomes a space,
/// `n` consecutive breaks become `n - 1` newlines.
fn fold_line_break(
    first: char,
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    out: &mut String,
    protected: usize,
) {
    while out.len() > protected && out.ends_with([' ', '\t']) {
        out.pop();
    }
    if first == '\r' && chars.peek() == Some(&'\n') {
        chars.next();
    }

    let mut breaks = 0;
    loop {
        while let Some(' ' | '\t') = chars.peek() {
            chars.next();
        }
        match chars.peek() {
            Some('\n') => {
                chars.next();
                breaks += 1;
            }
            Some('\r') => {
                chars.next();
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                breaks += 1;
            }
            _ => break,
        }
    }

    if breaks == 0 {
        out.push(' ');
    } else {
        out.extend(std::iter::repeat_n('\n', breaks));
    }
}

/// Block scalar chomping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Chomping {
    Clip,
    Strip,
    Keep,
}

/// Decode a block scalar from its header (`|`, `>-`, `|2`, ...) and content
/// lines.
///
/// `parent_indent` is the indentation of the line holding the header. With an
/// indentation indicator the content is indented by that many spaces past
/// it; otherwise the first non-blank line sets the indentation.
pub fn decode_block(header: &str, content: &str, parent_indent: usize) -> String {
    let folded = header.starts_with('>');
    let chomping = if header.contains('+') {
        Chomping::Keep
    } else if header[1..].contains('-') {
        Chomping::Strip
    } else {
        Chomping::Clip
    };

    let mut lines: Vec<&str> = content
        .split('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .collect();
    if content.ends_with('\n') || content.is_empty() {
        lines.pop();
    }

    let indent = match header[1..].chars().find_map(|c| c.to_digit(10)) {
        Some(indicator) => parent_indent + indicator as usize,
        None => lines
            .iter()
            .find(|l| !l.trim().is_empty())
            .map(|l| l.len() - l.trim_start_matches(' ').len())
            .unwrap_or(0),
    };
    let lines: Vec<&str> = lines.iter().map(|l| l.get(indent..).unwrap_or("")).collect();

    let last_content = lines.iter().rposition(|l| !l.trim().is_empty());
    let (body_lines, trailing) = match last_content {
        Some(i) => (&lines[..=i], lines.len() - i - 1),
        None => (&lines[..0], lines.len()),
    };

    let mut body = if folded {
        fold_block_lines(body_lines)
    } else {
        body_lines.join("\n")
    };

    match chomping {
        Chomping::Strip => {}
        Chomping::Clip => {
            if !body_lines.is_empty() {
                body.push('\n');
            }
        }
        Chomping::Keep => {
            if !body_lines.is_empty() {
                body.push('\n');
            }
            body.extend(std::iter::repeat_n('\n', trailing));
        }
    }
    body
}

fn fold_block_lines(lines: &[&str]) -> String {
    let mut out = String::new();
    let mut previous_normal = false;
    let mut seen_text = false;
    let mut blank_run = 0;

    for line in lines {
        if line.trim().is_empty() {
            blank_run += 1;
            continue;
        }
        let more_indented = line.starts_with([' ', '\t']);
        if seen_text {
            if previous_normal && !more_indented {
                if blank_run == 0 {
                    out.push(' ');
                } else {
                    out.extend(std::iter::repeat_n('\n', blank_run));
                }
            } else {
                out.extend(std::iter::repeat_n('\n', blank_run + 1));
            }
        } else {
            out.extend(std::iter::repeat_n('\n', blank_run));
        }
        out.push_str(line);
        previous_normal = !more_indented;
        seen_text = true;
        blank_run = 0;
    }
    out
}
