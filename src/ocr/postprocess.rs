//! Post-processing: deterministic cleanup of recognized text.
//!
//! Recognizers return text with ragged spacing, stray blank lines and a
//! handful of classic glyph confusions. The rules below fix those without
//! touching content, and each one is independently testable.
//!
//! ## Rule Order
//!
//! Whitespace is collapsed before the glyph fixes so token boundaries are
//! clean, and lines are trimmed before blank-line collapsing so that lines
//! holding only spaces count as blank.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply every cleanup rule in order.
///
/// Rules:
/// 1. Normalise line endings (CRLF → LF)
/// 2. Collapse runs of spaces and tabs to one space
/// 3. Fix digit/letter confusions inside words (only when `fix_glyphs`)
/// 4. Trim every line
/// 5. Collapse 3+ consecutive newlines to 2
/// 6. Trim the whole text
pub fn clean_text(input: &str, fix_glyphs: bool) -> String {
    let s = normalise_line_endings(input);
    let s = collapse_horizontal_whitespace(&s);
    let s = if fix_glyphs {
        fix_common_misreads(&s)
    } else {
        s
    };
    let s = trim_lines(&s);
    let s = collapse_blank_lines(&s);
    s.trim().to_string()
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Collapse horizontal whitespace ───────────────────────────────────

static RE_HSPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t\x0B\x0C]+").unwrap());

fn collapse_horizontal_whitespace(input: &str) -> String {
    RE_HSPACE.replace_all(input, " ").to_string()
}

// ── Rule 3: Digit/letter confusions ──────────────────────────────────────────

static RE_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9A-Za-z]+").unwrap());

/// `0→O`, `1→l`, `5→S`, `8→B`, but only in tokens that also contain a
/// letter. Pure numbers are left alone.
fn fix_common_misreads(input: &str) -> String {
    RE_TOKEN
        .replace_all(input, |caps: &regex::Captures| {
            let token = &caps[0];
            if !token.chars().any(|c| c.is_ascii_alphabetic()) {
                return token.to_string();
            }
            token
                .chars()
                .map(|c| match c {
                    '0' => 'O',
                    '1' => 'l',
                    '5' => 'S',
                    '8' => 'B',
                    other => other,
                })
                .collect()
        })
        .to_string()
}

// ── Rule 4: Trim every line ──────────────────────────────────────────────────

fn trim_lines(input: &str) -> String {
    input.lines().map(str::trim).collect::<Vec<_>>().join("\n")
}

// ── Rule 5: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}
