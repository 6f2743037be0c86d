//! Greedy word wrap and pagination for text → PDF.
//!
//! Widths come from the Helvetica AFM metrics (units of 1/1000 em), so the
//! wrap matches what a viewer draws with the built-in font.

use crate::config::LayoutConfig;

/// Helvetica advance widths for `0x20..=0x7E`.
const ASCII_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // '0'..'?'
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // '@'..'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 'P'..'_'
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // '`'..'o'
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 'p'..'~'
];

/// Helvetica advance widths for `0xA0..=0xFF`.
const LATIN1_WIDTHS: [u16; 96] = [
    278, 333, 556, 556, 556, 556, 260, 556, 333, 737, 370, 556, 584, 333, 737, 333, // A0..AF
    400, 584, 333, 333, 333, 556, 537, 278, 333, 333, 365, 556, 834, 834, 834, 611, // B0..BF
    667, 667, 667, 667, 667, 667, 1000, 722, 667, 667, 667, 667, 278, 278, 278, 278, // C0..CF
    722, 722, 778, 778, 778, 778, 778, 584, 778, 722, 722, 722, 722, 667, 667, 611, // D0..DF
    556, 556, 556, 556, 556, 556, 889, 500, 556, 556, 556, 556, 278, 278, 278, 278, // E0..EF
    556, 556, 556, 556, 556, 556, 556, 584, 611, 556, 556, 556, 556, 500, 556, 500, // F0..FF
];

const DEFAULT_WIDTH: u16 = 556;

/// Advance width of `c` in 1/1000 em.
pub fn helvetica_width(c: char) -> u16 {
    match c as u32 {
        code @ 0x20..=0x7E => ASCII_WIDTHS[(code - 0x20) as usize],
        code @ 0xA0..=0xFF => LATIN1_WIDTHS[(code - 0xA0) as usize],
        _ => DEFAULT_WIDTH,
    }
}

/// Width of `s` in points at `font_size`.
pub fn text_width(s: &str, font_size: f32) -> f32 {
    let units: u32 = s.chars().map(|c| helvetica_width(c) as u32).sum();
    units as f32 * font_size / 1000.0
}

/// Greedy word wrap.
///
/// Each input line is wrapped independently; an empty input line yields an
/// empty output line. A single word wider than `max_width` is broken at the
/// character that would overflow.
pub fn wrap_text(text: &str, max_width: f32, font_size: f32) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut current = String::new();
        for word in paragraph.split(' ').filter(|w| !w.is_empty()) {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{current} {word}")
            };
            if text_width(&candidate, font_size) <= max_width {
                current = candidate;
                continue;
            }
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if text_width(word, font_size) <= max_width {
                current = word.to_string();
            } else {
                let mut pieces = break_word(word, max_width, font_size);
                current = pieces.pop().unwrap_or_default();
                lines.extend(pieces);
            }
        }
        lines.push(current);
    }
    lines
}

fn break_word(word: &str, max_width: f32, font_size: f32) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut piece = String::new();
    for c in word.chars() {
        piece.push(c);
        if text_width(&piece, font_size) > max_width && piece.chars().count() > 1 {
            piece.pop();
            pieces.push(std::mem::take(&mut piece));
            piece.push(c);
        }
    }
    pieces.push(piece);
    pieces
}

/// Split wrapped lines into pages.
///
/// A new page starts when the next baseline would fall below the bottom
/// margin. Always returns at least one (possibly empty) page.
pub fn paginate(lines: Vec<String>, layout: &LayoutConfig) -> Vec<Vec<String>> {
    let per_page = layout.lines_per_page();
    let mut pages: Vec<Vec<String>> = Vec::new();
    let mut current = Vec::with_capacity(per_page);
    for line in lines {
        if current.len() == per_page {
            pages.push(std::mem::replace(&mut current, Vec::with_capacity(per_page)));
        }
        current.push(line);
    }
    pages.push(current);
    pages
}

/// Wrap and paginate `text` with `layout`.
pub fn layout_text(text: &str, layout: &LayoutConfig) -> Vec<Vec<String>> {
    let lines = wrap_text(text, layout.printable_width(), layout.font_size);
    paginate(lines, layout)
}
