//! List parsing and formatting.
//!
//! Corresponds to `TclFindElement` / `TclScanElement` / `TclConvertElement`
//! and the `Tcl_SplitList` / `Tcl_Merge` / `Tcl_Concat` family in
//! `tclUtil.c`.  A list value has two faces: a syntactic string and a
//! sequence of elements.  [`find_element`] walks the string form;
//! [`scan_element`] + [`convert_element`] produce the minimal quoting needed
//! to embed one raw value as one element; [`split_list`], [`merge`], and
//! [`concat`] are built on top of those and add no quoting logic of their
//! own.
//!
//! The central contract: a list produced by [`merge`] re-parses under
//! [`split_list`] to exactly the original element values (round-trip
//! identity), and is safe to embed inside another list's braces.

use thiserror::Error;

use crate::backslash::parse_backslash;
use crate::chartype::is_list_space;

// ── Errors ────────────────────────────────────────────────────────────────────

/// Bad list syntax.  Pure value errors; no resource cleanup is involved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListError {
    #[error("unmatched open brace in list")]
    UnmatchedBrace { pos: usize },
    #[error("unmatched open quote in list")]
    UnmatchedQuote { pos: usize },
    #[error("list element in {} followed by {found:?} instead of space", delim_name(.quoted))]
    ElementFollowedByJunk { quoted: bool, found: char, pos: usize },
}

fn delim_name(quoted: &bool) -> &'static str {
    if *quoted {
        "quotes"
    } else {
        "braces"
    }
}

impl ListError {
    /// Byte offset of the failure, relative to the scanned string.
    pub fn pos(&self) -> usize {
        match self {
            ListError::UnmatchedBrace { pos }
            | ListError::UnmatchedQuote { pos }
            | ListError::ElementFollowedByJunk { pos, .. } => *pos,
        }
    }

    fn offset_by(mut self, n: usize) -> Self {
        match &mut self {
            ListError::UnmatchedBrace { pos }
            | ListError::UnmatchedQuote { pos }
            | ListError::ElementFollowedByJunk { pos, .. } => *pos += n,
        }
        self
    }
}

// ── Element finding ───────────────────────────────────────────────────────────

/// One located list element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Element {
    /// Byte offset of the element's content (inside any braces/quotes).
    pub start: usize,
    /// Content length in bytes.
    pub size: usize,
    /// Offset from which to search for the next element.
    pub next: usize,
    /// True when the content bytes already *are* the element's value.
    /// When false the caller must collapse backslash sequences first.
    pub literal: bool,
    /// True when the element was brace-enclosed (its content is verbatim
    /// except for backslash-newline).
    pub braced: bool,
}

/// Locate the first element of the list `s`.
///
/// Skips leading separator whitespace; returns `Ok(None)` when the string
/// holds no further elements.  Brace and quote delimited elements must be
/// followed by whitespace or end-of-string.
pub fn find_element(s: &str) -> Result<Option<Element>, ListError> {
    let b = s.as_bytes();
    let len = b.len();
    let mut p = 0;
    while p < len && is_list_space(b[p]) {
        p += 1;
    }
    if p == len {
        return Ok(None);
    }

    let mut open_braces = 0usize;
    let mut in_quotes = false;
    let braced = b[p] == b'{';
    if braced {
        open_braces = 1;
        p += 1;
    } else if b[p] == b'"' {
        in_quotes = true;
        p += 1;
    }
    let start = p;
    let mut literal = true;

    while p < len {
        match b[p] {
            b'{' if open_braces > 0 => {
                open_braces += 1;
                p += 1;
            }
            b'}' if open_braces > 0 => {
                open_braces -= 1;
                p += 1;
                if open_braces == 0 {
                    return close_delimited(s, start, p - 1 - start, p, literal, false);
                }
            }
            b'"' if in_quotes => {
                return close_delimited(s, start, p - start, p + 1, literal, true);
            }
            b'\\' => {
                // Skip the whole escape so an escaped delimiter cannot
                // close the element.
                let esc = parse_backslash(&b[p..]);
                if open_braces == 0 {
                    literal = false;
                } else if p + 1 < len && b[p + 1] == b'\n' {
                    // The one escape that is live inside braces.
                    literal = false;
                }
                p += esc.read;
            }
            c if open_braces == 0 && !in_quotes && is_list_space(c) => {
                return Ok(Some(Element { start, size: p - start, next: p, literal, braced }));
            }
            _ => p += 1,
        }
    }

    if open_braces > 0 {
        return Err(ListError::UnmatchedBrace { pos: start - 1 });
    }
    if in_quotes {
        return Err(ListError::UnmatchedQuote { pos: start - 1 });
    }
    Ok(Some(Element { start, size: len - start, next: len, literal, braced }))
}

/// A brace/quote delimited element just closed at `after - 1`; the next byte
/// must be separator whitespace or end-of-string.
fn close_delimited(
    s: &str,
    start: usize,
    size: usize,
    after: usize,
    literal: bool,
    quoted: bool,
) -> Result<Option<Element>, ListError> {
    let b = s.as_bytes();
    if after < b.len() && !is_list_space(b[after]) {
        let found = s[after..].chars().next().unwrap_or('\u{0}');
        return Err(ListError::ElementFollowedByJunk { quoted, found, pos: after });
    }
    Ok(Some(Element { start, size, next: after, literal, braced: !quoted }))
}

/// Rewrite a non-literal element substring into its true value by decoding
/// every backslash sequence.
pub fn copy_collapse(s: &str) -> String {
    let b = s.as_bytes();
    let mut out = String::with_capacity(s.len());
    let mut p = 0;
    while p < b.len() {
        match memchr::memchr(b'\\', &b[p..]) {
            Some(i) => {
                out.push_str(&s[p..p + i]);
                let esc = parse_backslash(&b[p + i..]);
                out.push(esc.ch);
                p += i + esc.read;
            }
            None => break,
        }
    }
    out.push_str(&s[p..]);
    out
}

/// Collapse only backslash-newline runs; everything else stays verbatim.
/// This is the brace-enclosed variant of [`copy_collapse`].
fn collapse_continuations(s: &str) -> String {
    let b = s.as_bytes();
    let mut out = String::with_capacity(s.len());
    let mut p = 0;
    while p < b.len() {
        match memchr::memchr(b'\\', &b[p..]) {
            Some(i) if p + i + 1 < b.len() && b[p + i + 1] == b'\n' => {
                out.push_str(&s[p..p + i]);
                let esc = parse_backslash(&b[p + i..]);
                out.push(' ');
                p += i + esc.read;
            }
            Some(i) => {
                // Ordinary backslash: verbatim, and skip the next byte so a
                // backslash-backslash pair cannot hide a newline.
                let stop = (p + i + 2).min(b.len());
                out.push_str(&s[p..stop]);
                p = stop;
            }
            None => break,
        }
    }
    out.push_str(&s[p..]);
    out
}

/// Split a list string into its element values.
pub fn split_list(s: &str) -> Result<Vec<String>, ListError> {
    let mut elems = Vec::new();
    let mut tail = s;
    let mut consumed = 0;
    loop {
        match find_element(tail).map_err(|e| e.offset_by(consumed))? {
            None => return Ok(elems),
            Some(el) => {
                let text = &tail[el.start..el.start + el.size];
                elems.push(if el.literal {
                    text.to_owned()
                } else if el.braced {
                    collapse_continuations(text)
                } else {
                    copy_collapse(text)
                });
                consumed += el.next;
                tail = &tail[el.next..];
            }
        }
    }
}

// ── Element formatting ────────────────────────────────────────────────────────

/// Quoting strategy chosen by [`scan_element`] and consumed by
/// [`convert_element`].  A scan/convert pair must use the same mode on the
/// same value or the byte counts will not agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteMode {
    /// The value embeds verbatim.
    None,
    /// Enclose in braces.
    Brace,
    /// Backslash-escape every special character.
    Escape,
    /// Backslash-escape specials but leave braces untouched.  Chosen only
    /// when quoting is triggered solely by `]` or a non-leading `"`; kept
    /// for exact output compatibility with historical formatters.  The
    /// trigger condition is deliberate — do not fold this into
    /// [`QuoteMode::Escape`].
    Mask,
}

/// Caller-side formatting options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuoteOptions {
    /// Permit brace quoting (disabled when the result must embed where
    /// braces cannot appear).
    pub use_braces: bool,
    /// Quote a leading `#`.  Off for elements the caller knows will not sit
    /// first in a parsed command word.
    pub quote_hash: bool,
}

impl Default for QuoteOptions {
    fn default() -> Self {
        Self { use_braces: true, quote_hash: true }
    }
}

/// Decide how `v` must be quoted to embed as a single list element, and the
/// exact output size in bytes.
pub fn scan_element(v: &str, opts: QuoteOptions) -> (usize, QuoteMode) {
    let mode = pick_mode(v, opts);
    (emit(v, mode, opts, None), mode)
}

/// Append the quoted form of `v` to `dst`, returning bytes written.  `mode`
/// and `opts` must come from a [`scan_element`] call on the same value.
pub fn convert_element(v: &str, mode: QuoteMode, opts: QuoteOptions, dst: &mut String) -> usize {
    emit(v, mode, opts, Some(dst))
}

fn pick_mode(v: &str, opts: QuoteOptions) -> QuoteMode {
    if v.is_empty() {
        // The empty value always round-trips as the brace pair "{}".
        return QuoteMode::Brace;
    }
    let b = v.as_bytes();
    let mut nesting: i64 = 0;
    let mut forbid_none = false;
    let mut require_escape = false;
    let mut prefer_escape = false;
    let mut prefer_brace = false;

    // A leading brace, quote, or hash would be misread as element syntax.
    if b[0] == b'{' || b[0] == b'"' || (b[0] == b'#' && opts.quote_hash) {
        forbid_none = true;
        prefer_brace = true;
    }

    let mut p = 0;
    while p < b.len() {
        match b[p] {
            b'{' => nesting += 1,
            b'}' => {
                nesting -= 1;
                if nesting < 0 {
                    require_escape = true;
                }
            }
            b']' | b'"' => {
                forbid_none = true;
                prefer_escape = true;
            }
            b'[' | b'$' | b';' | b' ' | b'\t' | b'\n' | 0x0B | 0x0C | b'\r' => {
                forbid_none = true;
                prefer_brace = true;
            }
            b'\\' => {
                forbid_none = true;
                if p + 1 == b.len() {
                    // A trailing backslash would escape a closing brace.
                    require_escape = true;
                } else if b[p + 1] == b'\n' {
                    // Braces would collapse the continuation on re-parse.
                    require_escape = true;
                    p += 1;
                } else {
                    prefer_brace = true;
                    p += 1; // the escaped character is not special
                }
            }
            _ => {}
        }
        p += 1;
    }
    if nesting != 0 {
        require_escape = true;
    }

    if require_escape {
        return QuoteMode::Escape;
    }
    if forbid_none {
        if !opts.use_braces {
            return if prefer_escape { QuoteMode::Mask } else { QuoteMode::Escape };
        }
        if prefer_escape && !prefer_brace {
            return QuoteMode::Mask;
        }
        return QuoteMode::Brace;
    }
    QuoteMode::None
}

/// Single writer shared by scan (sizing) and convert (output), so the two
/// can never disagree on byte counts.
fn emit(v: &str, mode: QuoteMode, opts: QuoteOptions, mut dst: Option<&mut String>) -> usize {
    match mode {
        QuoteMode::None | QuoteMode::Brace if v.is_empty() => {
            if let Some(d) = dst {
                d.push_str("{}");
            }
            2
        }
        QuoteMode::None => {
            if let Some(d) = dst {
                d.push_str(v);
            }
            v.len()
        }
        QuoteMode::Brace => {
            if let Some(d) = dst {
                d.push('{');
                d.push_str(v);
                d.push('}');
            }
            v.len() + 2
        }
        QuoteMode::Escape | QuoteMode::Mask => {
            let leave_braces = mode == QuoteMode::Mask;
            let mut n = 0;
            for (i, ch) in v.char_indices() {
                let esc = match ch {
                    '\t' => Some('t'),
                    '\n' => Some('n'),
                    '\x0B' => Some('v'),
                    '\x0C' => Some('f'),
                    '\r' => Some('r'),
                    ' ' | '"' | '[' | ']' | '$' | ';' | '\\' => Some(ch),
                    '{' | '}' if !leave_braces => Some(ch),
                    '#' if i == 0 && opts.quote_hash => Some(ch),
                    _ => None,
                };
                match esc {
                    Some(e) => {
                        n += 2;
                        if let Some(d) = dst.as_deref_mut() {
                            d.push('\\');
                            d.push(e);
                        }
                    }
                    None => {
                        n += ch.len_utf8();
                        if let Some(d) = dst.as_deref_mut() {
                            d.push(ch);
                        }
                    }
                }
            }
            n
        }
    }
}

// ── Higher-level assembly ─────────────────────────────────────────────────────

/// Build a canonical list string from element values.
pub fn merge<S: AsRef<str>>(elems: &[S]) -> String {
    let mut plan = Vec::with_capacity(elems.len());
    let mut total = 0;
    for (i, e) in elems.iter().enumerate() {
        // A leading hash is only command syntax for the first element.
        let opts = QuoteOptions { quote_hash: i == 0, ..QuoteOptions::default() };
        let (n, mode) = scan_element(e.as_ref(), opts);
        total += n + 1;
        plan.push((mode, opts));
    }
    let mut out = String::with_capacity(total.saturating_sub(1));
    for (i, e) in elems.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let (mode, opts) = plan[i];
        convert_element(e.as_ref(), mode, opts, &mut out);
    }
    out
}

/// Join values with single spaces, trimming each value's own leading and
/// trailing separator whitespace first.  Unlike [`merge`], no quoting is
/// added; empty values vanish.
pub fn concat<S: AsRef<str>>(values: &[S]) -> String {
    let mut out = String::new();
    for v in values {
        let t = trim_concat(v.as_ref());
        if t.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(t);
    }
    out
}

/// Trim separator whitespace from both ends, but keep one trailing
/// whitespace byte when trimming would leave a backslash exposed at the end
/// (it would otherwise quote the joining space).
fn trim_concat(s: &str) -> &str {
    let b = s.as_bytes();
    let mut start = 0;
    while start < b.len() && is_list_space(b[start]) {
        start += 1;
    }
    let mut end = b.len();
    while end > start && is_list_space(b[end - 1]) {
        end -= 1;
    }
    if end < b.len() && end > start && b[end - 1] == b'\\' {
        end += 1;
    }
    &s[start..end]
}

// ── Tests ─────────────────────────────────────────────────────────────────────
