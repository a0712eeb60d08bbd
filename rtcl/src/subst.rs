//! Token substitution.
//!
//! Corresponds to `TclSubstTokens` in `tclParse.c`.  Walks a token stream
//! from [`crate::parse`] and produces the substituted value, calling back
//! into a [`SubstContext`] for variable reads and bracketed command
//! evaluation.  The lexer knows nothing about where values come from; this
//! trait is the only seam between the two.
//!
//! When a single substitution provides the entire result, its [`Value`]
//! passes through unconverted — `$x` holding an integer stays an integer.
//! Any second contribution flattens the accumulator to a string.

use thiserror::Error;
use tracing::trace;

use crate::backslash::parse_backslash;
use crate::parse::{Parse, ParseError, SubstFlags, TokenKind};
use crate::value::Value;

/// Capabilities substitution needs from its host: variable lookup and
/// nested command evaluation.
pub trait SubstContext {
    /// Read a variable, with the already-substituted array index if the
    /// reference had one.
    fn var_value(&mut self, name: &str, index: Option<&str>) -> Result<Value, SubstError>;

    /// Evaluate the body of a bracketed substitution (brackets stripped).
    fn eval_command(&mut self, script: &str) -> Result<Value, SubstError>;
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SubstError {
    #[error("can't read \"{0}\": no such variable")]
    NoSuchVariable(String),
    #[error("error evaluating command: {0}")]
    Eval(String),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Result of substituting a token run.
#[derive(Debug, Clone, PartialEq)]
pub struct Substitution {
    pub value: Value,
    /// Tokens consumed, counting component tokens.
    pub consumed: usize,
    /// Output byte offsets where a backslash-newline collapsed to a space.
    /// Line-oriented callers use these to map output positions back to
    /// source lines.
    pub continuations: Vec<usize>,
}

// Accumulator with the value-preserving fast path: a sole contribution
// keeps its structured form, a second one flattens everything to text.
enum Acc {
    Empty,
    Single(Value),
    Text(String),
}

impl Acc {
    fn push_value(&mut self, v: Value) {
        match self {
            Acc::Empty => *self = Acc::Single(v),
            Acc::Single(prev) => {
                let mut s = prev.to_string();
                s.push_str(&v.to_string());
                *self = Acc::Text(s);
            }
            Acc::Text(s) => s.push_str(&v.to_string()),
        }
    }

    fn push_str(&mut self, t: &str) {
        if t.is_empty() {
            return;
        }
        self.flatten().push_str(t);
    }

    fn push_char(&mut self, c: char) {
        self.flatten().push(c);
    }

    fn flatten(&mut self) -> &mut String {
        if !matches!(self, Acc::Text(_)) {
            let s = match std::mem::replace(self, Acc::Text(String::new())) {
                Acc::Single(v) => v.to_string(),
                _ => String::new(),
            };
            *self = Acc::Text(s);
        }
        match self {
            Acc::Text(s) => s,
            _ => unreachable!(),
        }
    }

    fn len(&self) -> usize {
        match self {
            Acc::Empty => 0,
            Acc::Single(v) => v.to_string().len(),
            Acc::Text(s) => s.len(),
        }
    }

    fn finish(self) -> Value {
        match self {
            Acc::Empty => Value::Str(String::new()),
            Acc::Single(v) => v,
            Acc::Text(s) => Value::Str(s),
        }
    }
}

/// Substitute `count` tokens of `parse` starting at index `first`.
///
/// Word-level tokens recurse into their components; a
/// [`TokenKind::Variable`] consumes its name and index components.  The
/// returned [`Substitution::consumed`] reports how far the walk advanced,
/// so callers stepping a word list can jump token groups reliably.
pub fn subst_tokens<C: SubstContext>(
    parse: &Parse<'_>,
    first: usize,
    count: usize,
    ctx: &mut C,
) -> Result<Substitution, SubstError> {
    let tokens = parse.tokens();
    let end = (first + count).min(tokens.len());
    let mut acc = Acc::Empty;
    let mut continuations = Vec::new();
    let mut i = first;

    while i < end {
        let tok = tokens[i];
        match tok.kind {
            TokenKind::Text => {
                acc.push_str(parse.token_text(&tok));
                i += 1;
            }
            TokenKind::Backslash => {
                let esc = parse_backslash(parse.token_text(&tok).as_bytes());
                if esc.is_line_continuation() {
                    continuations.push(acc.len());
                }
                acc.push_char(esc.ch);
                i += 1;
            }
            TokenKind::Command => {
                let text = parse.token_text(&tok);
                // Strip the brackets the token span includes.
                let script = &text[1..text.len() - 1];
                trace!(script, "command substitution");
                acc.push_value(ctx.eval_command(script)?);
                i += 1;
            }
            TokenKind::Variable => {
                let name = parse.token_text(&tokens[i + 1]);
                let index = if tok.num_components > 1 {
                    let sub = subst_tokens(parse, i + 2, tok.num_components - 1, ctx)?;
                    Some(sub.value.to_string())
                } else {
                    None
                };
                acc.push_value(ctx.var_value(name, index.as_deref())?);
                i += 1 + tok.num_components;
            }
            TokenKind::Word | TokenKind::SimpleWord | TokenKind::ExpandWord => {
                let sub = subst_tokens(parse, i + 1, tok.num_components, ctx)?;
                for off in sub.continuations {
                    continuations.push(acc.len() + off);
                }
                acc.push_value(sub.value);
                i += 1 + tok.num_components;
            }
        }
    }

    Ok(Substitution { value: acc.finish(), consumed: i - first, continuations })
}

/// Perform backslash, variable, and command substitution on a whole string,
/// honoring `flags` to disable classes.  Quotes and braces are ordinary
/// characters here.
pub fn subst<C: SubstContext>(
    script: &str,
    flags: SubstFlags,
    ctx: &mut C,
) -> Result<Value, SubstError> {
    let mut parse = Parse::new(script);
    parse.parse_substitution(flags)?;
    let n = parse.tokens().len();
    Ok(subst_tokens(&parse, 0, n, ctx)?.value)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;

    struct Ctx {
        vars: HashMap<String, Value>,
    }

    impl Ctx {
        fn new() -> Self {
            let mut vars = HashMap::new();
            vars.insert("x".to_owned(), Value::Int(7));
            vars.insert("name".to_owned(), Value::Str("world".to_owned()));
            vars.insert("k".to_owned(), Value::Str("i".to_owned()));
            vars.insert("a(i)".to_owned(), Value::Str("indexed".to_owned()));
            Ctx { vars }
        }
    }

    impl SubstContext for Ctx {
        fn var_value(&mut self, name: &str, index: Option<&str>) -> Result<Value, SubstError> {
            let key = match index {
                Some(i) => format!("{name}({i})"),
                None => name.to_owned(),
            };
            self.vars.get(&key).cloned().ok_or(SubstError::NoSuchVariable(key))
        }

        fn eval_command(&mut self, script: &str) -> Result<Value, SubstError> {
            match script {
                "answer" => Ok(Value::Int(42)),
                "empty" => Ok(Value::Str(String::new())),
                s => Ok(Value::Str(format!("<{s}>"))),
            }
        }
    }

    fn run(script: &str) -> Value {
        subst(script, SubstFlags::ALL, &mut Ctx::new()).unwrap()
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(run("hello"), Value::Str("hello".to_owned()));
        assert_eq!(run(""), Value::Str(String::new()));
    }

    #[test]
    fn braces_and_quotes_are_ordinary() {
        assert_eq!(run("{a} \"b\""), Value::Str("{a} \"b\"".to_owned()));
    }

    #[test]
    fn sole_variable_keeps_its_type() {
        assert_eq!(run("$x"), Value::Int(7));
    }

    #[test]
    fn mixed_contributions_flatten_to_text() {
        assert_eq!(run("a$x"), Value::Str("a7".to_owned()));
        assert_eq!(run("$x$x"), Value::Str("77".to_owned()));
    }

    #[test]
    fn command_substitution() {
        assert_eq!(run("[answer]"), Value::Int(42));
        assert_eq!(run("x[answer]y"), Value::Str("x42y".to_owned()));
        assert_eq!(run("[foo bar]"), Value::Str("<foo bar>".to_owned()));
    }

    #[test]
    fn backslash_substitution() {
        assert_eq!(run("a\\tb"), Value::Str("a\tb".to_owned()));
        assert_eq!(run("\\x41"), Value::Str("A".to_owned()));
    }

    #[test]
    fn continuation_offsets_are_recorded() {
        let mut ctx = Ctx::new();
        let mut parse = Parse::new("ab\\\n   cd");
        parse.parse_substitution(SubstFlags::ALL).unwrap();
        let n = parse.tokens().len();
        let sub = subst_tokens(&parse, 0, n, &mut ctx).unwrap();
        assert_eq!(sub.value, Value::Str("ab cd".to_owned()));
        assert_eq!(sub.continuations, vec![2]);
    }

    #[test]
    fn escaped_space_records_no_continuation() {
        let mut ctx = Ctx::new();
        let mut parse = Parse::new("a\\ b");
        parse.parse_substitution(SubstFlags::ALL).unwrap();
        let n = parse.tokens().len();
        let sub = subst_tokens(&parse, 0, n, &mut ctx).unwrap();
        assert_eq!(sub.value, Value::Str("a b".to_owned()));
        assert!(sub.continuations.is_empty());
    }

    #[test]
    fn quoted_escaped_space_substitutes_in_word() {
        let mut parse = Parse::new("puts \"a\\ b\"");
        parse.parse_command(false).unwrap();
        let sub = subst_tokens(&parse, 2, 1, &mut Ctx::new()).unwrap();
        assert_eq!(sub.value, Value::Str("a b".to_owned()));
        assert!(sub.continuations.is_empty());
    }

    #[test]
    fn array_index_literal_and_computed() {
        assert_eq!(run("$a(i)"), Value::Str("indexed".to_owned()));
        assert_eq!(run("$a($k)"), Value::Str("indexed".to_owned()));
    }

    #[test]
    fn missing_variable_is_an_error() {
        let err = subst("$nope", SubstFlags::ALL, &mut Ctx::new()).unwrap_err();
        assert_eq!(err, SubstError::NoSuchVariable("nope".to_owned()));
        assert_eq!(err.to_string(), "can't read \"nope\": no such variable");
    }

    #[test]
    fn disabled_classes_stay_literal() {
        let only_backslash =
            SubstFlags { commands: false, variables: false, backslashes: true };
        assert_eq!(
            subst("$x [answer] \\t", only_backslash, &mut Ctx::new()).unwrap(),
            Value::Str("$x [answer] \t".to_owned())
        );
        let none = SubstFlags { commands: false, variables: false, backslashes: false };
        assert_eq!(
            subst("$x \\t", none, &mut Ctx::new()).unwrap(),
            Value::Str("$x \\t".to_owned())
        );
    }

    #[test]
    fn parse_error_propagates() {
        let err = subst("${open", SubstFlags::ALL, &mut Ctx::new()).unwrap_err();
        assert!(matches!(err, SubstError::Parse(_)));
    }

    #[test]
    fn word_tokens_substitute_through_commands() {
        let mut parse = Parse::new("puts a$x");
        parse.parse_command(false).unwrap();
        // Word 2 starts at token index 2.
        let sub = subst_tokens(&parse, 2, 1, &mut Ctx::new()).unwrap();
        assert_eq!(sub.value, Value::Str("a7".to_owned()));
        assert_eq!(sub.consumed, 4); // word, text, variable, name
    }

    #[test]
    fn consumed_counts_component_tokens() {
        let mut parse = Parse::new("$a($k)x");
        parse.parse_substitution(SubstFlags::ALL).unwrap();
        let n = parse.tokens().len();
        let sub = subst_tokens(&parse, 0, n, &mut Ctx::new()).unwrap();
        assert_eq!(sub.value, Value::Str("indexedx".to_owned()));
        assert_eq!(sub.consumed, n);
    }
}
