//! Byte classification for the command-language lexer.
//!
//! Corresponds to the `CHAR_TYPE` table in `tclParse.c`: a fixed 256-entry
//! lookup mapping each byte to the syntactic role it plays while scanning a
//! script.  The scanner combines these values into stop masks, so a single
//! table probe answers "does this byte end the current run?".
//!
//! Bytes ≥ 0x80 are [`NORMAL`]: multi-byte UTF-8 sequences never carry
//! syntactic meaning and pass through literal runs untouched.

/// Ordinary byte with no syntactic meaning.
pub const NORMAL: u8 = 0;
/// Word separator: space, tab, vertical tab, form feed, or carriage return.
pub const SPACE: u8 = 0x01;
/// Terminates a command: newline or semicolon.
pub const COMMAND_END: u8 = 0x02;
/// Starts a substitution: `$`, `[`, or backslash.
pub const SUBS: u8 = 0x04;
/// Double quote.
pub const QUOTE: u8 = 0x08;
/// Close parenthesis; terminates an array-index scan.
pub const CLOSE_PAREN: u8 = 0x10;
/// Close bracket; terminates a nested-command scan.
pub const CLOSE_BRACK: u8 = 0x20;
/// Open or close brace.
pub const BRACE: u8 = 0x40;

static CHAR_TYPE: [u8; 256] = build_table();

const fn build_table() -> [u8; 256] {
    let mut t = [NORMAL; 256];
    t[b' ' as usize] = SPACE;
    t[b'\t' as usize] = SPACE;
    t[0x0B] = SPACE; // vertical tab
    t[0x0C] = SPACE; // form feed
    t[b'\r' as usize] = SPACE;
    t[b'\n' as usize] = COMMAND_END;
    t[b';' as usize] = COMMAND_END;
    t[b'$' as usize] = SUBS;
    t[b'[' as usize] = SUBS;
    t[b'\\' as usize] = SUBS;
    t[b'"' as usize] = QUOTE;
    t[b')' as usize] = CLOSE_PAREN;
    t[b']' as usize] = CLOSE_BRACK;
    t[b'{' as usize] = BRACE;
    t[b'}' as usize] = BRACE;
    t
}

/// Classify one byte.  Total over all 256 values; never fails.
#[inline]
pub fn char_type(b: u8) -> u8 {
    CHAR_TYPE[b as usize]
}

/// Word-separator whitespace (the [`SPACE`] class; excludes newline).
#[inline]
pub fn is_space(b: u8) -> bool {
    char_type(b) & SPACE != 0
}

/// List-separator whitespace: the [`SPACE`] class plus newline.
///
/// Newline separates list elements but *terminates* commands, which is why
/// the two predicates differ.
#[inline]
pub fn is_list_space(b: u8) -> bool {
    b == b'\n' || char_type(b) & SPACE != 0
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_is_total() {
        for b in 0u16..=255 {
            // Must not panic, and every value maps to exactly one class.
            let t = char_type(b as u8);
            assert!(t.count_ones() <= 1, "byte {b:#x} maps to {t:#x}");
        }
    }

    #[test]
    fn space_class() {
        for b in [b' ', b'\t', 0x0B, 0x0C, b'\r'] {
            assert_eq!(char_type(b), SPACE, "byte {b:#x}");
        }
        assert_ne!(char_type(b'\n'), SPACE);
    }

    #[test]
    fn command_terminators() {
        assert_eq!(char_type(b'\n'), COMMAND_END);
        assert_eq!(char_type(b';'), COMMAND_END);
    }

    #[test]
    fn substitution_starters() {
        assert_eq!(char_type(b'$'), SUBS);
        assert_eq!(char_type(b'['), SUBS);
        assert_eq!(char_type(b'\\'), SUBS);
    }

    #[test]
    fn delimiters() {
        assert_eq!(char_type(b'"'), QUOTE);
        assert_eq!(char_type(b')'), CLOSE_PAREN);
        assert_eq!(char_type(b']'), CLOSE_BRACK);
        assert_eq!(char_type(b'{'), BRACE);
        assert_eq!(char_type(b'}'), BRACE);
    }

    #[test]
    fn high_bytes_are_normal() {
        for b in 0x80u16..=0xFF {
            assert_eq!(char_type(b as u8), NORMAL);
        }
    }

    #[test]
    fn list_space_includes_newline() {
        assert!(is_list_space(b'\n'));
        assert!(is_list_space(b' '));
        assert!(!is_list_space(b'a'));
        assert!(!is_space(b'\n'));
    }
}
