//! Command-language lexer.
//!
//! Corresponds to `Tcl_ParseCommand`, `ParseTokens`, `Tcl_ParseBraces`,
//! `Tcl_ParseQuotedString`, `Tcl_ParseVarName`, and `Tcl_CommandComplete`
//! in `tclParse.c`.  One [`Parse`] tokenizes one command; scripts are
//! handled by running a fresh parse per command, as [`is_complete`] does.
//!
//! Tokens never own text.  Each [`Token`] is an offset/length pair into the
//! borrowed source, so tokenizing allocates nothing beyond the token array
//! itself (and that lives inline for commands of up to twenty tokens).
//! Substitution semantics are deferred entirely to [`crate::subst`]; this
//! module only records structure.

use smallvec::SmallVec;
use thiserror::Error;
use tracing::debug;

use crate::backslash::parse_backslash;
use crate::chartype::{char_type, is_space, CLOSE_BRACK, CLOSE_PAREN, COMMAND_END, QUOTE, SPACE, SUBS};
use crate::list;

// ── Flags and tokens ──────────────────────────────────────────────────────────

/// Which substitution classes the tokenizer honors.  A disabled class makes
/// its trigger character ordinary text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubstFlags {
    pub commands: bool,
    pub variables: bool,
    pub backslashes: bool,
}

impl SubstFlags {
    pub const ALL: SubstFlags = SubstFlags { commands: true, variables: true, backslashes: true };
}

impl Default for SubstFlags {
    fn default() -> Self {
        SubstFlags::ALL
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// A word needing substitution; its components follow.
    Word,
    /// A word whose value is exactly one literal [`TokenKind::Text`] component.
    SimpleWord,
    /// A word carrying the expansion prefix whose elements could not be
    /// determined statically; split at substitution time.
    ExpandWord,
    /// A literal text run.
    Text,
    /// One backslash sequence.
    Backslash,
    /// A bracketed command substitution, brackets included.
    Command,
    /// A variable substitution; component 0 is the name, any further
    /// components form the array index.
    Variable,
}

/// One token: a typed span of the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offset into the parsed source.
    pub start: usize,
    /// Span length in bytes.
    pub size: usize,
    /// How many of the following tokens belong to this one.
    pub num_components: usize,
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    MissingBrace,
    MissingVarBrace,
    MissingParen,
    MissingQuote,
    MissingBracket,
    ExtraAfterCloseQuote,
    ExtraAfterCloseBrace,
}

impl ParseErrorKind {
    /// True when the failure means the script is merely unfinished, so more
    /// input could still complete it.
    pub fn is_missing(self) -> bool {
        !matches!(
            self,
            ParseErrorKind::ExtraAfterCloseQuote | ParseErrorKind::ExtraAfterCloseBrace
        )
    }

    fn message(self) -> &'static str {
        match self {
            ParseErrorKind::MissingBrace => "missing close-brace",
            ParseErrorKind::MissingVarBrace => "missing close-brace for variable name",
            ParseErrorKind::MissingParen => "missing )",
            ParseErrorKind::MissingQuote => "missing \"",
            ParseErrorKind::MissingBracket => "missing close-bracket",
            ParseErrorKind::ExtraAfterCloseQuote => "extra characters after close-quote",
            ParseErrorKind::ExtraAfterCloseBrace => "extra characters after close-brace",
        }
    }
}

/// A syntax error, positioned at the construct that failed to close (not at
/// end-of-input, which is rarely where the actual mistake is).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{} at byte {pos}", .kind.message())]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub pos: usize,
    /// Extra diagnosis for the unbalanced-brace-in-comment trap.
    pub hint: Option<&'static str>,
}

impl ParseError {
    fn new(kind: ParseErrorKind, pos: usize) -> Self {
        ParseError { kind, pos, hint: None }
    }
}

// ── Parse state ───────────────────────────────────────────────────────────────

/// Tokenizer state for one command of a script.
#[derive(Debug)]
pub struct Parse<'s> {
    src: &'s str,
    tokens: SmallVec<[Token; 20]>,
    num_words: usize,
    comment: Option<(usize, usize)>,
    command: (usize, usize),
    term: usize,
    incomplete: bool,
}

impl<'s> Parse<'s> {
    pub fn new(src: &'s str) -> Self {
        Parse {
            src,
            tokens: SmallVec::new(),
            num_words: 0,
            comment: None,
            command: (0, 0),
            term: 0,
            incomplete: false,
        }
    }

    /// Tokenize the first command of the source.  `nested` makes `]` a
    /// command terminator, for bracketed substitutions.
    ///
    /// On error the token array is cleared and the command extent covers
    /// everything scanned, so callers can still step past the bad command.
    pub fn parse_command(&mut self, nested: bool) -> Result<(), ParseError> {
        let end = self.src.len();
        self.parse_command_range(0, end, nested)
    }

    /// Tokenize the entire source as substitution text: no command or word
    /// structure, quotes and braces ordinary.  Backing for
    /// [`crate::subst::subst`].
    pub fn parse_substitution(&mut self, flags: SubstFlags) -> Result<(), ParseError> {
        let end = self.src.len();
        self.parse_tokens(0, end, 0, flags)
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn num_words(&self) -> usize {
        self.num_words
    }

    /// The leading comment run, if the command had one.
    pub fn comment_text(&self) -> Option<&'s str> {
        self.comment.map(|(start, size)| &self.src[start..start + size])
    }

    /// The full extent of the parsed command, terminator included.
    pub fn command_text(&self) -> &'s str {
        &self.src[self.command.0..self.command.0 + self.command.1]
    }

    /// Offset of the byte that terminated the command (or end of input).
    pub fn terminator(&self) -> usize {
        self.term
    }

    /// True after a failure that more input could still repair.
    pub fn is_incomplete(&self) -> bool {
        self.incomplete
    }

    /// The source span of one token.
    pub fn token_text(&self, tok: &Token) -> &'s str {
        &self.src[tok.start..tok.start + tok.size]
    }

    fn parse_command_range(
        &mut self,
        from: usize,
        to: usize,
        nested: bool,
    ) -> Result<(), ParseError> {
        self.command = (from, 0);
        match self.run_command(from, to, nested) {
            Ok(()) => Ok(()),
            Err(e) => {
                debug!(pos = e.pos, "parse error: {e}");
                self.incomplete = e.kind.is_missing();
                self.command.1 = to - self.command.0;
                self.term = to;
                self.tokens.clear();
                self.num_words = 0;
                Err(e)
            }
        }
    }

    fn run_command(&mut self, from: usize, to: usize, nested: bool) -> Result<(), ParseError> {
        let b = self.src.as_bytes();
        let term_mask = COMMAND_END | if nested { CLOSE_BRACK } else { 0 };
        let mut p = from;

        // Leading whitespace and comments.  Comments only occur where a
        // command could start, and an escaped newline continues one.
        loop {
            p = self.skip_white(p, to);
            if p >= to || b[p] != b'#' {
                break;
            }
            let c_start = p;
            while p < to {
                if b[p] == b'\\' {
                    p += parse_backslash(&b[p..to]).read;
                } else if b[p] == b'\n' {
                    p += 1;
                    break;
                } else {
                    p += 1;
                }
            }
            let first = self.comment.map_or(c_start, |(s, _)| s);
            self.comment = Some((first, p - first));
        }
        self.command = (p, 0);

        loop {
            p = self.skip_white(p, to);
            if p >= to {
                self.term = to;
                self.command.1 = to - self.command.0;
                return Ok(());
            }
            if char_type(b[p]) & term_mask != 0 {
                // The terminator byte belongs to this command's extent.
                self.term = p;
                self.command.1 = p + 1 - self.command.0;
                return Ok(());
            }
            p = self.parse_word(p, to, term_mask)?;
        }
    }

    /// One word: expansion prefix, body, trailing-junk check, finalization.
    /// Returns the position after the word.
    fn parse_word(&mut self, at: usize, to: usize, term_mask: u8) -> Result<usize, ParseError> {
        let b = self.src.as_bytes();
        let mut p = at;

        let mut expand = false;
        if self.src[p..to.min(self.src.len())].starts_with("{*}") {
            let after = p + 3;
            // "{*}" alone (or before a separator) is an ordinary braced word.
            if after < to && char_type(b[after]) & (SPACE | term_mask) == 0 {
                expand = true;
                p = after;
            }
        }

        let word_index = self.tokens.len();
        self.tokens.push(Token {
            kind: if expand { TokenKind::ExpandWord } else { TokenKind::Word },
            start: at,
            size: 0,
            num_components: 0,
        });
        self.num_words += 1;

        let delimited = p < to && (b[p] == b'"' || b[p] == b'{');
        if p < to && b[p] == b'"' {
            self.parse_quoted_string(p, to)?;
        } else if p < to && b[p] == b'{' {
            self.parse_braces(p, to)?;
        } else {
            self.parse_tokens(p, to, SPACE | term_mask, SubstFlags::ALL)?;
        }
        p = self.term;

        if delimited && p < to && char_type(b[p]) & (SPACE | term_mask) == 0 {
            let kind = if b[p - 1] == b'"' {
                ParseErrorKind::ExtraAfterCloseQuote
            } else {
                ParseErrorKind::ExtraAfterCloseBrace
            };
            return Err(ParseError::new(kind, p));
        }

        let components = self.tokens.len() - word_index - 1;
        self.tokens[word_index].size = p - at;
        self.tokens[word_index].num_components = components;
        if components == 1 && self.tokens[word_index + 1].kind == TokenKind::Text {
            if expand {
                self.split_literal_expansion(word_index);
            } else {
                self.tokens[word_index].kind = TokenKind::SimpleWord;
            }
        }
        Ok(p)
    }

    /// An expansion word whose body is a single literal can be split into
    /// its element words right now; only non-literal elements force the
    /// split to wait for substitution time.
    fn split_literal_expansion(&mut self, word_index: usize) {
        let src = self.src;
        let body = self.tokens[word_index + 1];
        let mut tail = &src[body.start..body.start + body.size];
        let mut base = body.start;
        let mut elems: SmallVec<[(usize, usize); 8]> = SmallVec::new();
        loop {
            match list::find_element(tail) {
                Ok(None) => break,
                Ok(Some(el)) if el.literal => {
                    elems.push((base + el.start, el.size));
                    base += el.next;
                    tail = &tail[el.next..];
                }
                // Leave the word for substitution-time expansion.
                _ => return,
            }
        }
        self.tokens.truncate(word_index);
        self.num_words -= 1;
        for (start, size) in elems {
            self.tokens.push(Token { kind: TokenKind::SimpleWord, start, size, num_components: 1 });
            self.tokens.push(Token { kind: TokenKind::Text, start, size, num_components: 0 });
            self.num_words += 1;
        }
    }

    /// Skip word-separator whitespace, including backslash-newline runs.
    fn skip_white(&self, mut p: usize, to: usize) -> usize {
        let b = self.src.as_bytes();
        loop {
            while p < to && is_space(b[p]) {
                p += 1;
            }
            if p + 1 < to && b[p] == b'\\' && b[p + 1] == b'\n' {
                p += parse_backslash(&b[p..to]).read;
                continue;
            }
            return p;
        }
    }

    /// Scan a run of tokens up to a byte in `stop_mask` or the range end.
    /// Leaves [`Parse::term`] at the stopping byte.  Always appends at least
    /// one token, an empty text token if nothing else.
    fn parse_tokens(
        &mut self,
        from: usize,
        to: usize,
        stop_mask: u8,
        flags: SubstFlags,
    ) -> Result<(), ParseError> {
        let b = self.src.as_bytes();
        let started = self.tokens.len();
        let mut p = from;
        let mut text_start = p;

        while p < to {
            let t = char_type(b[p]);
            if t & stop_mask != 0 {
                break;
            }
            if t & SUBS == 0 {
                p += 1;
                continue;
            }
            match b[p] {
                b'$' if flags.variables => {
                    self.flush_text(text_start, p);
                    self.parse_var_name(p, to, flags)?;
                    p = self.term;
                    text_start = p;
                }
                b'[' if flags.commands => {
                    self.flush_text(text_start, p);
                    p = self.parse_nested_commands(p, to)?;
                    text_start = p;
                }
                b'\\' if flags.backslashes => {
                    let esc = parse_backslash(&b[p..to]);
                    if esc.is_line_continuation() && stop_mask & SPACE != 0 {
                        // Behaves as a space: the word ends here and the
                        // outer whitespace skip consumes the sequence.
                        break;
                    }
                    self.flush_text(text_start, p);
                    self.tokens.push(Token {
                        kind: TokenKind::Backslash,
                        start: p,
                        size: esc.read,
                        num_components: 0,
                    });
                    p += esc.read;
                    text_start = p;
                }
                _ => {
                    // A substitution class that is switched off yields its
                    // trigger byte as a one-byte text token.
                    self.flush_text(text_start, p);
                    self.tokens.push(Token {
                        kind: TokenKind::Text,
                        start: p,
                        size: 1,
                        num_components: 0,
                    });
                    p += 1;
                    text_start = p;
                }
            }
        }

        self.flush_text(text_start, p);
        if self.tokens.len() == started {
            self.tokens.push(Token { kind: TokenKind::Text, start: p, size: 0, num_components: 0 });
        }
        self.term = p;
        Ok(())
    }

    fn flush_text(&mut self, from: usize, to: usize) {
        if to > from {
            self.tokens.push(Token {
                kind: TokenKind::Text,
                start: from,
                size: to - from,
                num_components: 0,
            });
        }
    }

    /// `[` at `at`: parse commands until one terminates at `]`.  Emits a
    /// single [`TokenKind::Command`] token spanning the brackets.
    fn parse_nested_commands(&mut self, at: usize, to: usize) -> Result<usize, ParseError> {
        let b = self.src.as_bytes();
        let mut from = at + 1;
        let after = loop {
            let mut nested = Parse::new(self.src);
            nested.parse_command_range(from, to, true)?;
            let t = nested.terminator();
            if t < to && b[t] == b']' {
                break t + 1;
            }
            if t >= to {
                return Err(ParseError::new(ParseErrorKind::MissingBracket, at));
            }
            from = t + 1;
        };
        self.tokens.push(Token {
            kind: TokenKind::Command,
            start: at,
            size: after - at,
            num_components: 0,
        });
        Ok(after)
    }

    /// A braced word body.  The content is verbatim except that a
    /// backslash-newline stays live, which forces the text into separate
    /// tokens around a backslash token.
    fn parse_braces(&mut self, from: usize, to: usize) -> Result<(), ParseError> {
        let b = self.src.as_bytes();
        let started = self.tokens.len();
        let mut level = 1u32;
        let mut p = from + 1;
        let mut text_start = p;

        while p < to {
            match b[p] {
                b'{' => {
                    level += 1;
                    p += 1;
                }
                b'}' => {
                    level -= 1;
                    p += 1;
                    if level == 0 {
                        if p - 1 > text_start || self.tokens.len() == started {
                            self.flush_text(text_start, p - 1);
                            if self.tokens.len() == started {
                                self.tokens.push(Token {
                                    kind: TokenKind::Text,
                                    start: text_start,
                                    size: 0,
                                    num_components: 0,
                                });
                            }
                        }
                        self.term = p;
                        return Ok(());
                    }
                }
                b'\\' => {
                    let esc = parse_backslash(&b[p..to]);
                    if esc.is_line_continuation() {
                        self.flush_text(text_start, p);
                        self.tokens.push(Token {
                            kind: TokenKind::Backslash,
                            start: p,
                            size: esc.read,
                            num_components: 0,
                        });
                        p += esc.read;
                        text_start = p;
                    } else {
                        // An escaped brace must not affect the level count.
                        p += esc.read;
                    }
                }
                _ => p += 1,
            }
        }

        let mut err = ParseError::new(ParseErrorKind::MissingBrace, from);
        if comment_hides_brace(&self.src[from..to]) {
            err.hint = Some("possible unbalanced brace in comment");
        }
        Err(err)
    }

    /// A quoted word body: ordinary token scanning that must stop at `"`.
    fn parse_quoted_string(&mut self, from: usize, to: usize) -> Result<(), ParseError> {
        self.parse_tokens(from + 1, to, QUOTE, SubstFlags::ALL)?;
        if self.term >= to {
            return Err(ParseError::new(ParseErrorKind::MissingQuote, from));
        }
        self.term += 1;
        Ok(())
    }

    /// `$` at `at`: a variable substitution, or a literal dollar when no
    /// name follows.
    fn parse_var_name(&mut self, at: usize, to: usize, flags: SubstFlags) -> Result<(), ParseError> {
        let b = self.src.as_bytes();
        let vi = self.tokens.len();
        self.tokens.push(Token { kind: TokenKind::Variable, start: at, size: 0, num_components: 0 });
        let mut p = at + 1;

        if p < to && b[p] == b'{' {
            let name_start = p + 1;
            let close = match memchr::memchr(b'}', &b[name_start..to]) {
                Some(i) => name_start + i,
                None => return Err(ParseError::new(ParseErrorKind::MissingVarBrace, at)),
            };
            self.tokens.push(Token {
                kind: TokenKind::Text,
                start: name_start,
                size: close - name_start,
                num_components: 0,
            });
            self.term = close + 1;
        } else {
            let name_start = p;
            while p < to {
                if is_name_byte(b[p]) {
                    p += 1;
                } else if b[p] == b':' && p + 1 < to && b[p + 1] == b':' {
                    p += 2;
                    while p < to && b[p] == b':' {
                        p += 1;
                    }
                } else {
                    break;
                }
            }
            if p == name_start {
                // "$" followed by nothing variable-like is a literal dollar.
                self.tokens.truncate(vi);
                self.tokens.push(Token {
                    kind: TokenKind::Text,
                    start: at,
                    size: 1,
                    num_components: 0,
                });
                self.term = at + 1;
                return Ok(());
            }
            self.tokens.push(Token {
                kind: TokenKind::Text,
                start: name_start,
                size: p - name_start,
                num_components: 0,
            });
            if p < to && b[p] == b'(' {
                let paren = p;
                self.parse_tokens(paren + 1, to, CLOSE_PAREN, flags)?;
                if self.term >= to {
                    return Err(ParseError::new(ParseErrorKind::MissingParen, paren));
                }
                self.term += 1;
            } else {
                self.term = p;
            }
        }

        self.tokens[vi].size = self.term - at;
        self.tokens[vi].num_components = self.tokens.len() - vi - 1;
        Ok(())
    }
}

/// Variable-name bytes: ASCII alphanumerics, underscore, and all non-ASCII
/// bytes (multi-byte characters are taken as name characters wholesale).
#[inline]
fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b >= 0x80
}

/// Heuristic for the classic trap: a `{`-delimited body whose braces are
/// unbalanced because a comment line inside it contains a stray brace.
fn comment_hides_brace(body: &str) -> bool {
    for line in body.lines() {
        let t = line.trim_start();
        if !t.starts_with('#') {
            continue;
        }
        let mut delta = 0i64;
        let mut bytes = t.bytes();
        while let Some(c) = bytes.next() {
            match c {
                b'\\' => {
                    bytes.next();
                }
                b'{' => delta += 1,
                b'}' => delta -= 1,
                _ => {}
            }
        }
        if delta != 0 {
            return true;
        }
    }
    false
}

// ── Script completeness ───────────────────────────────────────────────────────

/// True when the script has no dangling brace, bracket, or quote — i.e. a
/// line-at-a-time reader can safely evaluate it now rather than waiting for
/// more input.  Syntax errors that more input cannot repair count as
/// complete, so the reader surfaces them instead of hanging.
pub fn is_complete(script: &str) -> bool {
    let mut from = 0;
    loop {
        let mut parse = Parse::new(script);
        if parse.parse_command_range(from, script.len(), false).is_err() {
            return !parse.is_incomplete();
        }
        let end = parse.command.0 + parse.command.1;
        if end >= script.len() {
            return true;
        }
        from = end;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
