//! Pattern matching — glob, exact, and regex modes.
//!
//! Corresponds to `Tcl_StringCaseMatch` in `tclUtil.c` plus the
//! regex-to-glob translator used to prefilter expensive regex scans.  The
//! glob dialect is deliberately small: `*`, `?`, `[…]` classes with
//! either-direction ranges, and backslash escapes.  There is **no** class
//! negation and no nesting.
//!
//! The matcher is a plain backtracking recursion with no depth bound; a
//! pattern of many stars against a long non-matching string is worst-case
//! exponential.  Callers matching untrusted patterns against untrusted text
//! should bound input sizes themselves.

use std::sync::Arc;

use regex::{Regex, RegexBuilder};
use thiserror::Error;

// ── Glob matcher ──────────────────────────────────────────────────────────────

/// Match `string` against the glob `pattern`.
///
/// `nocase` folds both sides through simple lowercase before comparing.
/// A pattern ending in a lone backslash matches nothing, as does an
/// unclosed `[` class.
pub fn match_glob(string: &str, pattern: &str, nocase: bool) -> bool {
    let mut s = string;
    let mut p = pattern;
    loop {
        let Some(pc) = p.chars().next() else {
            return s.is_empty();
        };
        match pc {
            '*' => {
                // A run of stars is one star.
                while let Some(rest) = p.strip_prefix('*') {
                    p = rest;
                }
                if p.is_empty() {
                    return true;
                }
                // When the tail starts with a plain character, only string
                // positions holding that character can possibly match, so
                // scan forward instead of recursing at every offset.
                let lead = p.chars().next().filter(|c| !matches!(c, '[' | '?' | '\\'));
                loop {
                    if let Some(c) = lead {
                        loop {
                            let Some(sc) = s.chars().next() else { return false };
                            if fold_eq(sc, c, nocase) {
                                break;
                            }
                            s = &s[sc.len_utf8()..];
                        }
                    }
                    if match_glob(s, p, nocase) {
                        return true;
                    }
                    let Some(sc) = s.chars().next() else { return false };
                    s = &s[sc.len_utf8()..];
                }
            }
            '?' => {
                let Some(sc) = s.chars().next() else { return false };
                s = &s[sc.len_utf8()..];
                p = &p[1..];
            }
            '[' => {
                let Some(sc) = s.chars().next() else { return false };
                p = &p[1..];
                match class_match(p, fold(sc, nocase), nocase) {
                    Some(rest) => {
                        s = &s[sc.len_utf8()..];
                        p = rest;
                    }
                    None => return false,
                }
            }
            '\\' => {
                p = &p[1..];
                let Some(pc) = p.chars().next() else {
                    // Trailing backslash matches nothing.
                    return false;
                };
                let Some(sc) = s.chars().next() else { return false };
                if !fold_eq(sc, pc, nocase) {
                    return false;
                }
                s = &s[sc.len_utf8()..];
                p = &p[pc.len_utf8()..];
            }
            _ => {
                let Some(sc) = s.chars().next() else { return false };
                if !fold_eq(sc, pc, nocase) {
                    return false;
                }
                s = &s[sc.len_utf8()..];
                p = &p[pc.len_utf8()..];
            }
        }
    }
}

/// Byte-oriented variant of [`match_glob`] for data that may not be UTF-8.
/// No case folding; `?` matches exactly one byte.
pub fn match_glob_bytes(string: &[u8], pattern: &[u8]) -> bool {
    let mut s = string;
    let mut p = pattern;
    loop {
        let Some(&pc) = p.first() else {
            return s.is_empty();
        };
        match pc {
            b'*' => {
                while p.first() == Some(&b'*') {
                    p = &p[1..];
                }
                if p.is_empty() {
                    return true;
                }
                let lead = p.first().copied().filter(|c| !matches!(c, b'[' | b'?' | b'\\'));
                loop {
                    if let Some(c) = lead {
                        match memchr::memchr(c, s) {
                            Some(i) => s = &s[i..],
                            None => return false,
                        }
                    }
                    if match_glob_bytes(s, p) {
                        return true;
                    }
                    if s.is_empty() {
                        return false;
                    }
                    s = &s[1..];
                }
            }
            b'?' => {
                if s.is_empty() {
                    return false;
                }
                s = &s[1..];
                p = &p[1..];
            }
            b'[' => {
                let Some(&sc) = s.first() else { return false };
                p = &p[1..];
                match class_match_bytes(p, sc) {
                    Some(rest) => {
                        s = &s[1..];
                        p = rest;
                    }
                    None => return false,
                }
            }
            b'\\' => {
                p = &p[1..];
                let Some(&pc) = p.first() else { return false };
                if s.first() != Some(&pc) {
                    return false;
                }
                s = &s[1..];
                p = &p[1..];
            }
            _ => {
                if s.first() != Some(&pc) {
                    return false;
                }
                s = &s[1..];
                p = &p[1..];
            }
        }
    }
}

/// Try to match `sc` against the class body starting at `p` (just past the
/// `[`).  On success returns the pattern remainder past the closing `]`.
/// An unclosed class never matches.
fn class_match(mut p: &str, sc: char, nocase: bool) -> Option<&str> {
    let mut matched = false;
    loop {
        let Some(c) = p.chars().next() else { return None };
        if c == ']' {
            return if matched { Some(&p[1..]) } else { None };
        }
        let start = fold(c, nocase);
        p = &p[c.len_utf8()..];
        if let Some(rest) = p.strip_prefix('-') {
            // A range; either direction is accepted.
            let Some(e) = rest.chars().next() else { return None };
            if e == ']' {
                // "a-]": the dash is literal, handled below.
                if start == sc || sc == '-' {
                    matched = true;
                }
                continue;
            }
            let end = fold(e, nocase);
            p = &rest[e.len_utf8()..];
            if (start <= sc && sc <= end) || (end <= sc && sc <= start) {
                matched = true;
            }
        } else if start == sc {
            matched = true;
        }
    }
}

fn class_match_bytes(mut p: &[u8], sc: u8) -> Option<&[u8]> {
    let mut matched = false;
    loop {
        let Some(&c) = p.first() else { return None };
        if c == b']' {
            return if matched { Some(&p[1..]) } else { None };
        }
        p = &p[1..];
        if p.first() == Some(&b'-') && p.get(1).is_some_and(|&e| e != b']') {
            let e = p[1];
            p = &p[2..];
            if (c <= sc && sc <= e) || (e <= sc && sc <= c) {
                matched = true;
            }
        } else if c == sc {
            matched = true;
        }
    }
}

#[inline]
fn fold(c: char, nocase: bool) -> char {
    if nocase {
        c.to_lowercase().next().unwrap_or(c)
    } else {
        c
    }
}

#[inline]
fn fold_eq(a: char, b: char, nocase: bool) -> bool {
    fold(a, nocase) == fold(b, nocase)
}

// ── Regex → glob translation ──────────────────────────────────────────────────

/// Cap on `*` runs in a translated glob.  Each star multiplies backtracking
/// cost in the glob matcher, so a translation needing more than this many is
/// refused and the caller falls back to the regex engine alone.
pub const MAX_TRANSLATED_STARS: usize = 3;

/// Why a regular expression could not be rewritten as a glob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TranslateError {
    #[error("trailing backslash in regular expression")]
    BadEscape,
    #[error("regular expression syntax {0:?} has no glob equivalent")]
    UnhandledSyntax(char),
    #[error("'$' anchor not at end of regular expression")]
    DollarNotAtEnd,
    #[error("translated glob would exceed {MAX_TRANSLATED_STARS} wildcard runs")]
    TooComplex,
}

/// Rewrite a simple anchored-literal regular expression as an equivalent
/// glob pattern.
///
/// Handles literals, `.`, `.*`, `.+`, `^`/`$` anchors, and escapes of
/// regex metacharacters.  Anything else — alternation, grouping, classes,
/// repetition counts, perl classes — is refused with
/// [`TranslateError::UnhandledSyntax`]; the refusal is a safety valve, not
/// an error the caller should surface.
pub fn re_to_glob(re: &str) -> Result<String, TranslateError> {
    let mut out = String::with_capacity(re.len() + 2);
    let mut stars = 0usize;
    let mut chars = re.chars().peekable();
    let mut anchored_end = false;

    if chars.peek() == Some(&'^') {
        chars.next();
    } else {
        push_star(&mut out, &mut stars)?;
    }

    while let Some(c) = chars.next() {
        match c {
            '.' => match chars.peek() {
                Some('*') => {
                    chars.next();
                    push_star(&mut out, &mut stars)?;
                }
                Some('+') => {
                    chars.next();
                    out.push('?');
                    push_star(&mut out, &mut stars)?;
                }
                _ => out.push('?'),
            },
            '$' => {
                if chars.peek().is_some() {
                    return Err(TranslateError::DollarNotAtEnd);
                }
                anchored_end = true;
            }
            '\\' => {
                let Some(e) = chars.next() else {
                    return Err(TranslateError::BadEscape);
                };
                match e {
                    'a' => out.push('\u{7}'),
                    'f' => out.push('\u{C}'),
                    'n' => out.push('\n'),
                    'r' => out.push('\r'),
                    't' => out.push('\t'),
                    'v' => out.push('\u{B}'),
                    // Perl classes and assertions have no glob form.
                    'd' | 'D' | 'w' | 'W' | 's' | 'S' | 'b' | 'B' | 'A' | 'z' | 'Z' => {
                        return Err(TranslateError::UnhandledSyntax(e));
                    }
                    _ => push_literal(&mut out, e),
                }
            }
            '*' | '+' | '?' | '(' | ')' | '[' | ']' | '|' | '^' | '{' | '}' => {
                return Err(TranslateError::UnhandledSyntax(c));
            }
            _ => push_literal(&mut out, c),
        }
    }

    if !anchored_end {
        push_star(&mut out, &mut stars)?;
    }
    Ok(out)
}

fn push_star(out: &mut String, stars: &mut usize) -> Result<(), TranslateError> {
    if out.ends_with('*') {
        return Ok(());
    }
    *stars += 1;
    if *stars > MAX_TRANSLATED_STARS {
        return Err(TranslateError::TooComplex);
    }
    out.push('*');
    Ok(())
}

fn push_literal(out: &mut String, c: char) {
    if matches!(c, '*' | '?' | '[' | ']' | '\\') {
        out.push('\\');
    }
    out.push(c);
}

// ── Compiled patterns ─────────────────────────────────────────────────────────

/// Which matching algorithm a [`Pattern`] uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    Exact,
    Glob,
    Regexp,
}

/// Error returned when a pattern cannot be compiled.
#[derive(Debug, Clone, Error)]
pub enum PatternError {
    #[error("bad regular expression: {0}")]
    Regex(#[from] regex::Error),
}

// Arc keeps Clone a reference-count bump rather than a recompile.
#[derive(Debug, Clone)]
enum Compiled {
    Exact(String),
    Glob,
    Regex {
        re: Arc<Regex>,
        // Glob rewrite of the same regex, when one exists; checked first
        // because the glob matcher is far cheaper on non-matching text.
        prefilter: Option<String>,
    },
}

/// A compiled pattern ready for matching.
#[derive(Debug, Clone)]
pub struct Pattern {
    src: String,
    mode: MatchMode,
    nocase: bool,
    compiled: Compiled,
}

impl Pattern {
    /// Compile `src` using `mode`.
    pub fn new(src: &str, mode: MatchMode, nocase: bool) -> Result<Self, PatternError> {
        let compiled = match mode {
            MatchMode::Exact => Compiled::Exact(if nocase {
                src.to_lowercase()
            } else {
                src.to_owned()
            }),
            MatchMode::Glob => Compiled::Glob,
            MatchMode::Regexp => {
                let re = RegexBuilder::new(src).case_insensitive(nocase).build()?;
                Compiled::Regex {
                    re: Arc::new(re),
                    prefilter: re_to_glob(src).ok(),
                }
            }
        };
        Ok(Self { src: src.to_owned(), mode, nocase, compiled })
    }

    /// The original source string.
    pub fn src(&self) -> &str {
        &self.src
    }

    /// The match mode.
    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    /// True when this pattern matches `text`.
    pub fn matches(&self, text: &str) -> bool {
        match &self.compiled {
            Compiled::Exact(want) => {
                if self.nocase {
                    text.to_lowercase() == *want
                } else {
                    text == want
                }
            }
            Compiled::Glob => match_glob(text, &self.src, self.nocase),
            Compiled::Regex { re, prefilter } => {
                if let Some(glob) = prefilter {
                    if !match_glob(text, glob, self.nocase) {
                        return false;
                    }
                }
                re.is_match(text)
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
