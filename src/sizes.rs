//! Size-run extraction from canonical descriptions.
//!
//! A size run is one to four size tokens joined by `X` (`3`, `3 X 2`,
//! `3X2X1/2`). The scanner mirrors a left-to-right, non-overlapping,
//! backtracking pattern match over the canonical text and the longest run
//! (by token characters) wins.

use crate::attributes::BEND_SYNONYMS;
use crate::canonical::space_words;

/// Upper bound on tokens in a single run.
const MAX_RUN_TOKENS: usize = 4;

/// Common decimal fractions mapped back to the fraction spelling suppliers
/// print on fittings.
const DECIMAL_FRACTIONS: &[(f64, &str)] = &[
    (0.0, ""),
    (0.125, "1/8"),
    (0.25, "1/4"),
    (0.375, "3/8"),
    (0.5, "1/2"),
    (0.625, "5/8"),
    (0.75, "3/4"),
    (0.875, "7/8"),
];

/// Words that mark the preceding number as an angle rather than a size.
const ANGLE_SUFFIXES: &[&str] = &["D", "DEG", "DEGREE", "DEGREES"];

/// Extracts the dominant size sequence from canonical text and normalizes
/// each token. Returns an empty vector when no size is present.
pub fn parse_sizes(canon: &str) -> Vec<String> {
    let runs = SizeScanner::new(canon).runs();
    let mut best: Option<(&Vec<&str>, usize)> = None;
    for run in &runs {
        let weight: usize = run.iter().map(|token| token.len()).sum();
        if best.map_or(true, |(_, current)| weight > current) {
            best = Some((run, weight));
        }
    }
    best.map(|(run, _)| run.iter().map(|token| normalize_size_token(token)).collect())
        .unwrap_or_default()
}

/// Canonicalizes a single raw size token.
///
/// `1 1/2IN` and `1-1/2` become `1-1/2`, `3IN` becomes `3`, and decimals
/// with a common fractional part map to fractions (`1.5` → `1-1/2`).
pub fn normalize_size_token(raw: &str) -> String {
    let mut token = raw.trim();
    if let Some(stripped) = token.strip_suffix("IN") {
        token = stripped.trim_end();
    }
    let joined = token.split_whitespace().collect::<Vec<_>>().join("-");
    map_decimal(&joined).unwrap_or(joined)
}

fn map_decimal(token: &str) -> Option<String> {
    let (whole, fraction) = token.split_once('.')?;
    if whole.is_empty()
        || fraction.is_empty()
        || !whole.bytes().all(|b| b.is_ascii_digit())
        || !fraction.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    let whole: u64 = whole.parse().ok()?;
    let fraction: f64 = format!("0.{fraction}").parse().ok()?;
    let rounded = (fraction * 1000.0).round() / 1000.0;
    let (_, spelled) = DECIMAL_FRACTIONS
        .iter()
        .find(|(value, _)| (value - rounded).abs() < 1e-9)?;
    Some(match (whole, spelled.is_empty()) {
        (whole, true) => whole.to_string(),
        (0, false) => spelled.to_string(),
        (whole, false) => format!("{whole}-{spelled}"),
    })
}

struct SizeScanner<'a> {
    text: &'a str,
    bytes: &'a [u8],
}

impl<'a> SizeScanner<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            bytes: text.as_bytes(),
        }
    }

    fn runs(&self) -> Vec<Vec<&'a str>> {
        let mut runs = Vec::new();
        let mut pos = 0;
        while pos < self.bytes.len() {
            if !self.is_run_start(pos) {
                pos += 1;
                continue;
            }
            if self.follows_schedule(pos) {
                pos = self.digits_end(pos);
                continue;
            }
            if let Some(end) = self.bend_fraction_end(pos) {
                pos = end;
                continue;
            }
            match self.match_run(pos, 1) {
                Some((end, spans)) if !(spans.len() == 1 && self.precedes_angle_word(end)) => {
                    runs.push(
                        spans
                            .into_iter()
                            .map(|(start, end)| &self.text[start..end])
                            .collect(),
                    );
                    pos = end;
                }
                Some(_) => pos = self.digits_end(pos),
                None => pos += 1,
            }
        }
        runs
    }

    fn is_run_start(&self, pos: usize) -> bool {
        self.bytes[pos].is_ascii_digit() && (pos == 0 || !is_word_byte(self.bytes[pos - 1]))
    }

    /// Tries to match a run starting at `start`, preferring more tokens.
    fn match_run(&self, start: usize, count: usize) -> Option<(usize, Vec<(usize, usize)>)> {
        for end in self.token_ends(start) {
            if count < MAX_RUN_TOKENS {
                for next in self.separator_ends(end) {
                    if let Some((run_end, mut rest)) = self.match_run(next, count + 1) {
                        rest.insert(0, (start, end));
                        return Some((run_end, rest));
                    }
                }
            }
            if self.boundary_after(end) {
                return Some((end, vec![(start, end)]));
            }
        }
        None
    }

    /// Candidate token end positions in match-preference order.
    fn token_ends(&self, start: usize) -> Vec<usize> {
        let whole_end = self.digits_end(start);
        if whole_end == start {
            return Vec::new();
        }

        let mut bases = Vec::with_capacity(5);
        if let Some(end) = self.fraction_after(whole_end, b' ') {
            bases.push(end);
        }
        if let Some(end) = self.fraction_after(whole_end, b'-') {
            bases.push(end);
        }
        if let Some(end) = self.digits_after(whole_end, b'.') {
            bases.push(end);
        }
        if let Some(end) = self.digits_after(whole_end, b'/') {
            bases.push(end);
        }
        bases.push(whole_end);

        let mut ends = Vec::with_capacity(bases.len() * 3);
        for base in bases {
            if self.bytes[base..].starts_with(b" IN") {
                ends.push(base + 3);
            }
            if self.bytes[base..].starts_with(b"IN") {
                ends.push(base + 2);
            }
            ends.push(base);
        }
        ends
    }

    /// Ends of ` ?X ?` separators starting at `pos`, greedy first.
    fn separator_ends(&self, pos: usize) -> Vec<usize> {
        let mut ends = Vec::with_capacity(4);
        for lead in [1usize, 0] {
            let x_at = pos + lead;
            if lead == 1 && self.bytes.get(pos) != Some(&b' ') {
                continue;
            }
            if self.bytes.get(x_at) != Some(&b'X') {
                continue;
            }
            if self.bytes.get(x_at + 1) == Some(&b' ') {
                ends.push(x_at + 2);
            }
            ends.push(x_at + 1);
        }
        ends
    }

    /// `sep` digits `/` digits, as in `-1/2` or ` 1/2`.
    fn fraction_after(&self, pos: usize, sep: u8) -> Option<usize> {
        let numerator_end = self.digits_after(pos, sep)?;
        self.digits_after(numerator_end, b'/')
    }

    fn digits_after(&self, pos: usize, lead: u8) -> Option<usize> {
        if self.bytes.get(pos) != Some(&lead) {
            return None;
        }
        let end = self.digits_end(pos + 1);
        (end > pos + 1).then_some(end)
    }

    fn digits_end(&self, pos: usize) -> usize {
        let mut end = pos;
        while end < self.bytes.len() && self.bytes[end].is_ascii_digit() {
            end += 1;
        }
        end
    }

    fn boundary_after(&self, pos: usize) -> bool {
        pos == self.bytes.len() || !is_word_byte(self.bytes[pos])
    }

    /// True when the word immediately before `pos` is `SCH`.
    fn follows_schedule(&self, pos: usize) -> bool {
        pos > 0 && space_words(&self.text[..pos]).last() == Some("SCH") && self.bytes[pos - 1] == b' '
    }

    /// End of a bend fraction such as `1/4 BEND` or `1/8 ELBOW` starting at
    /// `pos`. Those fractions name the angle, not a size.
    fn bend_fraction_end(&self, pos: usize) -> Option<usize> {
        let rest = &self.text[pos..];
        BEND_SYNONYMS
            .iter()
            .filter(|(literal, _)| literal.starts_with(|c: char| c.is_ascii_digit()))
            .find(|(literal, _)| rest.starts_with(literal))
            .and_then(|_| self.digits_after(self.digits_end(pos), b'/'))
    }

    fn precedes_angle_word(&self, end: usize) -> bool {
        let rest = &self.text[end..];
        rest.starts_with(' ')
            && space_words(rest)
                .next()
                .map_or(false, |word| ANGLE_SUFFIXES.contains(&word))
    }
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}
