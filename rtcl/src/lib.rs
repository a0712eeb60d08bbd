//! Lexical engine for a Tcl-style command language.
//!
//! Everything here operates on borrowed source text: the tokenizer emits
//! offset/length spans, the list engine locates elements in place, and the
//! glob matcher walks both strings directly.  Nothing evaluates; command
//! dispatch and variable storage live behind the [`subst::SubstContext`]
//! seam.
//!
//! The pieces:
//!
//! * [`parse`] — command tokenizer: words, quoting, braces, `{*}`
//!   expansion, variable and command references, plus [`parse::is_complete`]
//!   for line-at-a-time readers.
//! * [`subst`] — walks tokens and produces substituted [`value::Value`]s.
//! * [`list`] — the dual list representation: split, merge, and the
//!   minimal-quoting element formatter.
//! * [`pattern`] — glob matching and compiled patterns, with a regex→glob
//!   prefilter translator.
//! * [`backslash`] — the escape decoder shared by all of the above.
//!
//! ```
//! use rtcl::{is_complete, list, Parse};
//!
//! let mut parse = Parse::new("lappend names {Ada Lovelace}\n");
//! parse.parse_command(false)?;
//! assert_eq!(parse.num_words(), 3);
//!
//! assert!(!is_complete("proc greet {who} {"));
//!
//! let script = list::merge(&["puts", "hello world"]);
//! assert_eq!(script, "puts {hello world}");
//! # Ok::<(), rtcl::ParseError>(())
//! ```

pub mod backslash;
pub mod chartype;
pub mod list;
pub mod parse;
pub mod pattern;
pub mod subst;
pub mod value;

pub use backslash::{parse_backslash, BackslashEscape};
pub use list::{ListError, QuoteMode, QuoteOptions};
pub use parse::{is_complete, Parse, ParseError, ParseErrorKind, SubstFlags, Token, TokenKind};
pub use pattern::{match_glob, match_glob_bytes, MatchMode, Pattern, PatternError};
pub use subst::{subst, subst_tokens, SubstContext, SubstError, Substitution};
pub use value::Value;
