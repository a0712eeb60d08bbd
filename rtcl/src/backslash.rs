//! Backslash escape decoding.
//!
//! Corresponds to `TclParseBackslash` in `tclParse.c`.  Decodes exactly one
//! backslash sequence into a Unicode scalar plus the number of source bytes
//! consumed.  There is no failure mode: every input decodes to *some*
//! character, by policy — callers throughout the lexer rely on this.
//!
//! | Sequence        | Result                                               |
//! |-----------------|------------------------------------------------------|
//! | `\a \b \f \n \r \t \v` | the named control character, 2 bytes          |
//! | `\xhh`          | up to 2 hex digits                                   |
//! | `\uhhhh`        | up to 4 hex digits                                   |
//! | `\Uhhhhhhhh`    | up to 8 hex digits (invalid scalars → U+FFFD)        |
//! | `\<newline>`    | collapses the newline and following spaces/tabs to one space |
//! | `\ooo`          | 1–3 octal digits                                     |
//! | `\` at end      | a literal backslash, 1 byte                          |
//! | anything else   | the escaped character itself                         |

/// One decoded backslash sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackslashEscape {
    /// The decoded character.
    pub ch: char,
    /// Source bytes consumed, including the leading backslash.  Always ≥ 1.
    pub read: usize,
    /// True only for a backslash-newline sequence.  The decoded result of
    /// `\<newline>` and the escaped space `\ ` is the same space character,
    /// so the distinction has to travel alongside it.
    pub continuation: bool,
}

impl BackslashEscape {
    /// True when this escape was a backslash-newline continuation.
    pub fn is_line_continuation(&self) -> bool {
        self.continuation
    }
}

/// Decode the backslash sequence starting at `src[0]` (which must be `\`).
pub fn parse_backslash(src: &[u8]) -> BackslashEscape {
    debug_assert_eq!(src.first(), Some(&b'\\'));
    if src.len() < 2 {
        // A trailing lone backslash stands for itself.
        return BackslashEscape { ch: '\\', read: 1, continuation: false };
    }
    match src[1] {
        b'a' => fixed(0x07),
        b'b' => fixed(0x08),
        b'f' => fixed(0x0C),
        b'n' => fixed(0x0A),
        b'r' => fixed(0x0D),
        b't' => fixed(0x09),
        b'v' => fixed(0x0B),
        b'x' => hex_escape(src, 2),
        b'u' => hex_escape(src, 4),
        b'U' => hex_escape(src, 8),
        b'\n' => {
            // Line continuation: the newline and any run of following
            // spaces/tabs collapse into a single space.
            let mut read = 2;
            while read < src.len() && (src[read] == b' ' || src[read] == b'\t') {
                read += 1;
            }
            BackslashEscape { ch: ' ', read, continuation: true }
        }
        b'0'..=b'7' => octal_escape(src),
        _ => {
            // Any other byte stands for itself.  If it leads a multi-byte
            // UTF-8 sequence, consume the whole character.
            let (ch, len) = utf8_char_at(&src[1..]);
            BackslashEscape { ch, read: 1 + len, continuation: false }
        }
    }
}

fn fixed(code: u32) -> BackslashEscape {
    BackslashEscape {
        ch: char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER),
        read: 2,
        continuation: false,
    }
}

/// `\x`, `\u`, `\U`: read up to `max_digits` hex digits after the marker.
/// Zero digits means the marker character itself is the result.
fn hex_escape(src: &[u8], max_digits: usize) -> BackslashEscape {
    let mut value: u32 = 0;
    let mut digits = 0;
    while digits < max_digits {
        let Some(&b) = src.get(2 + digits) else { break };
        let Some(d) = (b as char).to_digit(16) else { break };
        value = (value << 4) | d;
        digits += 1;
    }
    if digits == 0 {
        // "\x" with no digits: just the letter.
        return BackslashEscape { ch: src[1] as char, read: 2, continuation: false };
    }
    if max_digits == 2 {
        value &= 0xFF;
    }
    BackslashEscape {
        ch: char::from_u32(value).unwrap_or(char::REPLACEMENT_CHARACTER),
        read: 2 + digits,
        continuation: false,
    }
}

/// 1–3 octal digits.  A third digit is consumed only when the two-digit
/// value fits in five bits, keeping the three-digit result within one byte;
/// the result is masked to a byte either way.
fn octal_escape(src: &[u8]) -> BackslashEscape {
    let mut value = (src[1] - b'0') as u32;
    let mut read = 2;
    if let Some(d) = octal_digit(src, read) {
        value = (value << 3) + d;
        read = 3;
        if value <= 0x1F {
            if let Some(d) = octal_digit(src, read) {
                value = ((value << 3) + d) & 0xFF;
                read = 4;
            }
        }
    }
    BackslashEscape {
        ch: char::from_u32(value).unwrap_or(char::REPLACEMENT_CHARACTER),
        read,
        continuation: false,
    }
}

fn octal_digit(src: &[u8], at: usize) -> Option<u32> {
    match src.get(at) {
        Some(&b @ b'0'..=b'7') => Some((b - b'0') as u32),
        _ => None,
    }
}

/// Decode one UTF-8 character from the front of `src`.
///
/// Returns the character and its byte length.  A truncated or malformed
/// sequence yields the first byte as a Latin-1 character of length 1, so the
/// decoder still never fails.
fn utf8_char_at(src: &[u8]) -> (char, usize) {
    let len = match src[0] {
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF7 => 4,
        _ => 1,
    };
    if len > 1 && src.len() >= len {
        if let Ok(s) = std::str::from_utf8(&src[..len]) {
            if let Some(ch) = s.chars().next() {
                return (ch, len);
            }
        }
    }
    (src[0] as char, 1)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn bs(s: &str) -> BackslashEscape {
        parse_backslash(s.as_bytes())
    }

    fn esc(ch: char, read: usize) -> BackslashEscape {
        BackslashEscape { ch, read, continuation: false }
    }

    #[test]
    fn named_escapes() {
        assert_eq!(bs("\\n"), esc('\n', 2));
        assert_eq!(bs("\\t"), esc('\t', 2));
        assert_eq!(bs("\\a"), esc('\u{7}', 2));
        assert_eq!(bs("\\r"), esc('\r', 2));
        assert_eq!(bs("\\v"), esc('\u{B}', 2));
    }

    #[test]
    fn trailing_lone_backslash() {
        assert_eq!(bs("\\"), esc('\\', 1));
    }

    #[test]
    fn hex_two_digits() {
        assert_eq!(bs("\\x41"), esc('A', 4));
        // Extra hex digits are not consumed past the cap.
        assert_eq!(bs("\\x414"), esc('A', 4));
    }

    #[test]
    fn hex_short() {
        assert_eq!(bs("\\x4"), esc('\u{4}', 3));
        // "\x" with no digits at all decodes to the letter x.
        assert_eq!(bs("\\xg"), esc('x', 2));
    }

    #[test]
    fn unicode_escapes() {
        assert_eq!(bs("\\u0041"), esc('A', 6));
        assert_eq!(bs("\\u00e9"), esc('é', 6));
        assert_eq!(bs("\\U0001F600"), esc('😀', 10));
    }

    #[test]
    fn unicode_out_of_range_is_replacement() {
        assert_eq!(bs("\\UFFFFFFFF").ch, char::REPLACEMENT_CHARACTER);
        // Surrogate half.
        assert_eq!(bs("\\uD800").ch, char::REPLACEMENT_CHARACTER);
    }

    #[test]
    fn octal() {
        assert_eq!(bs("\\101"), esc('A', 4));
        assert_eq!(bs("\\0"), esc('\0', 2));
        assert_eq!(bs("\\7z"), esc('\u{7}', 2));
    }

    #[test]
    fn octal_third_digit_gated_on_two_digit_value() {
        // 0o47 = 0x27 > 0x1F, so the third digit is left unconsumed.
        assert_eq!(bs("\\477"), esc('\'', 3));
        // 0o10 = 8 ≤ 0x1F, so all three digits are read.
        assert_eq!(bs("\\101x"), esc('A', 4));
    }

    #[test]
    fn line_continuation() {
        let e = bs("\\\n   x");
        assert_eq!(e.ch, ' ');
        assert_eq!(e.read, 5); // backslash, newline, three spaces
        assert!(e.is_line_continuation());
    }

    #[test]
    fn line_continuation_consumes_tabs() {
        let e = bs("\\\n\t\t");
        assert_eq!(e, BackslashEscape { ch: ' ', read: 4, continuation: true });
    }

    #[test]
    fn escaped_space_is_not_a_continuation() {
        // Decodes to the same character and length as a collapsed
        // backslash-newline, so only the flag tells them apart.
        let e = bs("\\ x");
        assert_eq!(e, esc(' ', 2));
        assert!(!e.is_line_continuation());
    }

    #[test]
    fn self_escape() {
        assert_eq!(bs("\\q"), esc('q', 2));
        assert_eq!(bs("\\{"), esc('{', 2));
        assert_eq!(bs("\\\\"), esc('\\', 2));
    }

    #[test]
    fn multibyte_self_escape() {
        // Escaping a multi-byte character consumes the whole character.
        assert_eq!(bs("\\é"), esc('é', 3));
        assert_eq!(bs("\\😀"), esc('😀', 5));
    }

    #[test]
    fn never_fails_on_arbitrary_bytes() {
        for b in 0u16..=255 {
            let src = [b'\\', b as u8];
            let esc = parse_backslash(&src);
            assert!(esc.read >= 1 && esc.read <= 2);
        }
    }
}
