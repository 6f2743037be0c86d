//! Text clean-up before it is drawn with a standard PDF font.
//!
//! The built-in Helvetica is a WinAnsi font: it has glyphs for printable
//! ASCII and the Latin-1 supplement, nothing else. Anything outside that
//! range is dropped rather than transliterated, so the result is lossy for
//! CJK, emoji and most symbols.

/// Make `text` safe for a WinAnsi-encoded standard font.
///
/// * CRLF and lone CR become LF; LF is kept.
/// * Tabs become four spaces.
/// * Other control characters are removed.
/// * Only `0x20–0x7E` and `0xA0–0xFF` survive.
pub fn sanitize_for_pdf(text: &str) -> String {
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    let mut out = String::with_capacity(normalized.len());
    for ch in normalized.chars() {
        match ch {
            '\n' => out.push('\n'),
            '\t' => out.push_str("    "),
            c if is_win_ansi_printable(c) => out.push(c),
            _ => {}
        }
    }
    out
}

/// Printable ASCII or Latin-1 supplement.
pub fn is_win_ansi_printable(c: char) -> bool {
    matches!(c as u32, 0x20..=0x7E | 0xA0..=0xFF)
}

/// Encode already-sanitized text as single-byte WinAnsi.
///
/// Characters outside the printable range are skipped.
pub fn to_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .filter(|c| is_win_ansi_printable(*c))
        .map(|c| c as u32 as u8)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_endings_normalized() {
        assert_eq!(sanitize_for_pdf("a\r\nb\rc\nd"), "a\nb\nc\nd");
    }

    #[test]
    fn tabs_expand_to_four_spaces() {
        assert_eq!(sanitize_for_pdf("a\tb"), "a    b");
    }

    #[test]
    fn controls_and_wide_chars_are_dropped() {
        assert_eq!(sanitize_for_pdf("x\u{0007}y\u{001b}z"), "xyz");
        assert_eq!(sanitize_for_pdf("日本 ok 🚀"), " ok ");
        assert_eq!(sanitize_for_pdf("\u{0085}\u{009f}"), "");
    }

    #[test]
    fn latin1_is_kept() {
        assert_eq!(sanitize_for_pdf("café Ñandú ©"), "café Ñandú ©");
    }

    #[test]
    fn win_ansi_bytes() {
        assert_eq!(to_win_ansi("é!"), vec![0xE9, b'!']);
        assert_eq!(to_win_ansi("a€b"), b"ab".to_vec());
    }
}
