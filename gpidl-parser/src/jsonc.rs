//! JSONC preprocessing
//!
//! GPIDL sources are JSON with `//` line comments, `/* */` block comments,
//! and tolerated trailing commas before `]` or `}`. This module reduces such
//! text to plain JSON and parses it into a [`serde_json::Value`] whose
//! mappings preserve insertion order.
//!
//! The stripper is a single logos token scan. It must never alter the
//! contents of string literals, and it keeps a line comment's terminating
//! newline so that parse-error line numbers stay meaningful. Unrecognized
//! bytes are copied through untouched; malformed input is diagnosed by the
//! JSON parser, not here.

use crate::error::DocumentError;
use logos::{Lexer, Logos};
use serde_json::Value;

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
enum RawToken {
    #[regex(r#""([^"\\]|\\.)*""#)]
    Str,

    #[regex(r"//[^\n]*")]
    LineComment,

    #[token("/*", block_comment)]
    BlockComment,

    #[token(",")]
    Comma,

    #[token("]")]
    CloseBracket,

    #[token("}")]
    CloseBrace,

    #[regex(r"[ \t\r\n]+")]
    Whitespace,

    #[token("/")]
    Slash,

    #[regex(r#"[^ \t\r\n",\]}/]+"#)]
    Text,
}

/// Consume everything up to and including the closing `*/`. An unterminated
/// block comment swallows the rest of the input.
fn block_comment(lex: &mut Lexer<RawToken>) {
    match lex.remainder().find("*/") {
        Some(end) => lex.bump(end + 2),
        None => lex.bump(lex.remainder().len()),
    }
}

fn is_ignorable(token: &Result<RawToken, ()>) -> bool {
    matches!(
        token,
        Ok(RawToken::Whitespace) | Ok(RawToken::LineComment) | Ok(RawToken::BlockComment)
    )
}

/// Strip comments and trailing commas, leaving plain JSON.
///
/// String literal contents pass through byte for byte. A comma whose next
/// significant token is `]` or `}` is dropped; everything between the comma
/// and the closer (whitespace, comments) is kept.
pub fn strip(source: &str) -> String {
    let tokens: Vec<(Result<RawToken, ()>, std::ops::Range<usize>)> =
        RawToken::lexer(source).spanned().collect();

    let mut out = String::with_capacity(source.len());
    for (i, (token, span)) in tokens.iter().enumerate() {
        match token {
            Ok(RawToken::LineComment) | Ok(RawToken::BlockComment) => {}
            Ok(RawToken::Comma) => {
                let mut j = i + 1;
                while j < tokens.len() && is_ignorable(&tokens[j].0) {
                    j += 1;
                }
                let closes = matches!(
                    tokens.get(j).map(|(t, _)| t),
                    Some(Ok(RawToken::CloseBracket)) | Some(Ok(RawToken::CloseBrace))
                );
                if !closes {
                    out.push(',');
                }
            }
            _ => out.push_str(&source[span.clone()]),
        }
    }
    out
}

/// Parse GPIDL source text into a parsed document.
///
/// Mapping key order in the result follows declaration order in the source.
pub fn parse_document(source: &str) -> Result<Value, DocumentError> {
    let stripped = strip(source);
    serde_json::from_str(&stripped).map_err(DocumentError::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_line_comments() {
        let src = "{\n  // opcode table\n  \"a\": 1\n}";
        assert_eq!(strip(src), "{\n  \n  \"a\": 1\n}");
    }

    #[test]
    fn strips_block_comments() {
        let src = "{ /* multi\nline */ \"a\": 1 }";
        assert_eq!(strip(src), "{  \"a\": 1 }");
    }

    #[test]
    fn preserves_comment_markers_inside_strings() {
        let src = r#"{ "url": "http://example", "glob": "/* keep */" }"#;
        assert_eq!(strip(src), src);
    }

    #[test]
    fn preserves_escaped_quotes() {
        let src = r#"{ "a": "say \"hi\" // not a comment" }"#;
        assert_eq!(strip(src), src);
    }

    #[test]
    fn drops_trailing_commas() {
        let src = "{ \"a\": [1, 2, ], \"b\": { \"c\": 3, }, }";
        assert_eq!(strip(src), "{ \"a\": [1, 2 ], \"b\": { \"c\": 3 } }");
        let value = parse_document(src).expect("trailing commas are tolerated");
        assert_eq!(value["a"], serde_json::json!([1, 2]));
    }

    #[test]
    fn drops_comma_separated_from_closer_by_comment() {
        let src = "[1, 2, // last\n]";
        let value = parse_document(src).expect("comment between comma and closer");
        assert_eq!(value, serde_json::json!([1, 2]));
    }

    #[test]
    fn keeps_interior_commas() {
        assert_eq!(strip("[1, 2, 3]"), "[1, 2, 3]");
    }

    #[test]
    fn unterminated_block_comment_swallows_rest() {
        assert_eq!(strip("[1] /* dangling"), "[1] ");
    }

    #[test]
    fn preserves_key_order() {
        let src = r#"{ "zeta": 1, "alpha": 2, "mid": 3 }"#;
        let value = parse_document(src).unwrap();
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["zeta", "alpha", "mid"]);
    }

    #[test]
    fn malformed_document_is_an_error() {
        let err = parse_document("{ \"a\": }").unwrap_err();
        assert!(err.to_string().starts_with("failed to parse JSONC:"));
    }
}
