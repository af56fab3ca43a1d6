//! Text canonicalization for supplier product descriptions.
//!
//! Every downstream parser works on the canonical form: uppercase ASCII,
//! unified separators, and single spaces between words.

/// Schedule spellings rewritten to the compact `SCH nn` form.
const SCHEDULE_REWRITES: &[(&str, &str)] = &[
    ("SCHEDULE 40", "SCH 40"),
    ("SCHEDULE-40", "SCH 40"),
    ("SCHEDULE 80", "SCH 80"),
    ("SCHEDULE-80", "SCH 80"),
];

/// Normalizes a raw description into the canonical uppercase token stream.
///
/// The multiplication glyph becomes `X`, the inch mark becomes `IN`, and any
/// character outside `A-Z`, `0-9`, space, `/`, `.` and `-` is replaced by a
/// space before whitespace runs collapse. Schedule rewrites run on the
/// collapsed text so that the function is idempotent.
pub fn canonicalize(text: &str) -> String {
    let upper = text.to_uppercase().replace('×', "X").replace('"', "IN");

    let mut collapsed = String::with_capacity(upper.len());
    let mut pending_space = false;
    for ch in upper.chars() {
        if is_allowed(ch) && ch != ' ' {
            if pending_space && !collapsed.is_empty() {
                collapsed.push(' ');
            }
            pending_space = false;
            collapsed.push(ch);
        } else {
            pending_space = true;
        }
    }

    let mut out = collapsed;
    for (from, to) in SCHEDULE_REWRITES {
        if out.contains(from) {
            out = out.replace(from, to);
        }
    }
    out
}

fn is_allowed(ch: char) -> bool {
    ch.is_ascii_uppercase() || ch.is_ascii_digit() || matches!(ch, ' ' | '/' | '.' | '-')
}

/// Returns true when `phrase` appears in canonical text delimited by spaces
/// or the text boundaries.
pub fn has_phrase(canon: &str, phrase: &str) -> bool {
    if phrase.is_empty() {
        return false;
    }
    let mut offset = 0;
    while let Some(found) = canon[offset..].find(phrase) {
        let start = offset + found;
        let end = start + phrase.len();
        let left_ok = start == 0 || canon.as_bytes()[start - 1] == b' ';
        let right_ok = end == canon.len() || canon.as_bytes()[end] == b' ';
        if left_ok && right_ok {
            return true;
        }
        offset = start + 1;
    }
    false
}

/// Splits canonical text into maximal alphanumeric words.
///
/// `/`, `.`, `-` and spaces all terminate a word, so `1-1/2IN` yields
/// `["1", "1", "2IN"]`.
pub fn alnum_words(canon: &str) -> impl Iterator<Item = &str> {
    canon
        .split(|ch: char| !ch.is_ascii_alphanumeric())
        .filter(|word| !word.is_empty())
}

/// Splits canonical text on single spaces.
pub fn space_words(canon: &str) -> impl Iterator<Item = &str> {
    canon.split(' ').filter(|word| !word.is_empty())
}
