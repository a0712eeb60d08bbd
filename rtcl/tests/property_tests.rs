//! Randomized invariants across the lexer, list engine, and glob matcher.

use proptest::prelude::*;

use rtcl::list::{convert_element, merge, scan_element, split_list, QuoteOptions};
use rtcl::pattern::{match_glob, match_glob_bytes};
use rtcl::{is_complete, Parse, SubstFlags};

proptest! {
    /// A merged list always re-parses to exactly the original elements.
    #[test]
    fn merge_split_round_trip(elems in proptest::collection::vec(".*", 0..8)) {
        let merged = merge(&elems);
        prop_assert_eq!(split_list(&merged).unwrap(), elems);
    }

    /// The merged form stays intact when embedded as a braced element of an
    /// outer list.
    #[test]
    fn merged_list_nests(elems in proptest::collection::vec("[ -~]*", 0..5)) {
        let inner = merge(&elems);
        let outer = merge(&[inner.clone()]);
        let back = split_list(&outer).unwrap();
        prop_assert_eq!(back.len(), 1);
        prop_assert_eq!(split_list(&back[0]).unwrap(), elems);
    }

    /// Scanning predicts the exact conversion size, for every option
    /// combination.
    #[test]
    fn scan_size_matches_convert(v in ".*", use_braces: bool, quote_hash: bool) {
        let opts = QuoteOptions { use_braces, quote_hash };
        let (n, mode) = scan_element(&v, opts);
        let mut out = String::new();
        let written = convert_element(&v, mode, opts, &mut out);
        prop_assert_eq!(written, n);
        prop_assert_eq!(out.len(), n);
    }

    /// One converted element re-parses to the original value.
    #[test]
    fn single_element_round_trip(v in ".*") {
        let opts = QuoteOptions::default();
        let (_, mode) = scan_element(&v, opts);
        let mut out = String::new();
        convert_element(&v, mode, opts, &mut out);
        prop_assert_eq!(split_list(&out).unwrap(), vec![v]);
    }

    /// The command parser neither panics nor loops on arbitrary input.
    #[test]
    fn parser_is_total(src in ".*") {
        let mut parse = Parse::new(&src);
        let _ = parse.parse_command(false);
        let _ = is_complete(&src);
    }

    /// Substitution tokenizing with all classes disabled reproduces any
    /// input unchanged.
    #[test]
    fn inert_substitution_is_identity(src in ".*") {
        let flags = SubstFlags { commands: false, variables: false, backslashes: false };
        let mut parse = Parse::new(&src);
        parse.parse_substitution(flags).unwrap();
        let joined: String = parse
            .tokens()
            .iter()
            .map(|t| parse.token_text(t))
            .collect();
        prop_assert_eq!(joined, src);
    }

    /// The byte-wise glob matcher agrees with the char-wise one on ASCII.
    /// Inputs are kept short because the matcher backtracks.
    #[test]
    fn glob_matchers_agree(
        s in "[a-c]{0,12}",
        p in r"[a-c*?\[\]\\-]{0,8}",
    ) {
        prop_assert_eq!(
            match_glob(&s, &p, false),
            match_glob_bytes(s.as_bytes(), p.as_bytes())
        );
    }

    /// A string always matches itself with the glob specials escaped.
    #[test]
    fn escaped_self_match(s in "[ -~]{0,16}") {
        let mut pat = String::new();
        for c in s.chars() {
            if matches!(c, '*' | '?' | '[' | ']' | '\\') {
                pat.push('\\');
            }
            pat.push(c);
        }
        prop_assert!(match_glob(&s, &pat, false));
    }
}
