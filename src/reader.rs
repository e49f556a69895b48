use logos::Logos;

use crate::value::{AtomValue, SExpr};

//===----------------------------------------------------------------------===//
// Token
//
// Uses the logos crate to implement the tokenizer. Newlines are stripped
// from the source before lexing, so only the space character separates
// tokens; tabs are ordinary text characters. A backslash makes the next
// character literal wherever it appears.
//===----------------------------------------------------------------------===//

#[derive(Logos, Debug, PartialEq, Clone)]
#[logos(skip r"[ ]+")]
pub enum Token {
    #[token("(")]
    Open,

    #[token(")")]
    Close,

    // Quoted block, tolerating a missing closing quote at end of input.
    #[regex(r#""([^"\\]|\\.)*"?"#, |lex| unquote(lex.slice()))]
    Literal(String),

    #[regex(r#"([^ ()"\\]|\\.)+"#, |lex| unescape(lex.slice()))]
    Text(String),
}

/// Drops each backslash, keeping the following character as is.
fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn unquote(s: &str) -> String {
    let inner = s.strip_prefix('"').unwrap_or(s);
    let inner = inner.strip_suffix('"').unwrap_or(inner);
    unescape(inner)
}

pub fn tokenize(source: &str) -> Vec<Token> {
    let stripped: String =
        source.chars().filter(|c| *c != '\n' && *c != '\r').collect();
    let mut lexer = Token::lexer(&stripped);
    let mut tokens: Vec<Token> = Vec::new();
    let mut prev_end = usize::MAX;
    let mut prev_was_text = false;
    while let Some(result) = lexer.next() {
        let token = match result {
            Ok(token) => token,
            Err(()) => continue,
        };
        let span = lexer.span();
        match token {
            // An opening quote glued to bare text continues the same block;
            // the closing quote ends the combined token.
            Token::Literal(s) if prev_was_text && span.start == prev_end => {
                if let Some(Token::Text(prev)) = tokens.last_mut() {
                    prev.push_str(&s);
                }
                prev_was_text = false;
            }
            other => {
                prev_was_text = matches!(other, Token::Text(_));
                tokens.push(other);
            }
        }
        prev_end = span.end;
    }
    tokens
}

//===----------------------------------------------------------------------===//
// Parser
//===----------------------------------------------------------------------===//

/// Bare and quoted tokens alike pass through literal inference: integer
/// first, then double, then the boolean words, otherwise a string atom.
fn infer_literal(s: &str) -> SExpr {
    if let Ok(v) = s.parse::<i64>() {
        return SExpr::Atom(AtomValue::Int(v));
    }
    if let Ok(v) = s.parse::<f64>() {
        return SExpr::Atom(AtomValue::Double(v));
    }
    match s {
        "true" => SExpr::Atom(AtomValue::Boolean(true)),
        "false" => SExpr::Atom(AtomValue::Boolean(false)),
        _ => SExpr::Atom(AtomValue::Str(s.to_string())),
    }
}

/// Folds a parsed form into the accumulator: forms append to a list node,
/// anything else is replaced by the newcomer.
fn append_to(node: Option<SExpr>, form: SExpr) -> SExpr {
    match node {
        Some(SExpr::List(mut elements)) => {
            elements.push(form);
            SExpr::List(elements)
        }
        _ => form,
    }
}

fn parse<'t>(
    mut tokens: &'t [Token],
    mut node: Option<SExpr>,
) -> (&'t [Token], Option<SExpr>) {
    while let Some((token, rest)) = tokens.split_first() {
        tokens = rest;
        match token {
            Token::Open => {
                let (remaining, sub) = parse(tokens, Some(SExpr::null()));
                tokens = remaining;
                node = Some(append_to(node, sub.unwrap_or_else(SExpr::null)));
            }
            // A stray close paren ends the current form without complaint.
            Token::Close => return (tokens, node),
            Token::Literal(s) | Token::Text(s) => {
                node = Some(append_to(node, infer_literal(s)));
            }
        }
    }
    (tokens, node)
}

/// Reads a source string into a single tree. Missing close parens are
/// supplied implicitly at end of input; empty input reads as null.
pub fn read(source: &str) -> SExpr {
    let tokens = tokenize(source);
    let (_, node) = parse(&tokens, None);
    node.unwrap_or_else(SExpr::null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::list;

    fn int(v: i64) -> SExpr {
        SExpr::Atom(AtomValue::Int(v))
    }

    fn sym(s: &str) -> SExpr {
        SExpr::symbol(s)
    }

    #[test]
    fn reads_nested_lists() {
        assert_eq!(
            read("(+ 1 (a 2))"),
            list![sym("+"), int(1), list![sym("a"), int(2)]]
        );
    }

    #[test]
    fn infers_literal_types() {
        assert_eq!(read("42"), int(42));
        assert_eq!(read("-3.5"), SExpr::Atom(AtomValue::Double(-3.5)));
        assert_eq!(read("true"), SExpr::Atom(AtomValue::Boolean(true)));
        assert_eq!(read("abc"), sym("abc"));
    }

    #[test]
    fn quoted_blocks_keep_spaces_and_infer_too() {
        assert_eq!(read("\"a b\""), SExpr::Atom(AtomValue::Str("a b".into())));
        assert_eq!(read("\"123\""), int(123));
        assert_eq!(read("\"\""), SExpr::Atom(AtomValue::Str(String::new())));
    }

    #[test]
    fn backslash_makes_the_next_char_literal() {
        assert_eq!(read(r"a\ b"), SExpr::Atom(AtomValue::Str("a b".into())));
        assert_eq!(read(r"\(x"), SExpr::Atom(AtomValue::Str("(x".into())));
    }

    #[test]
    fn quote_glued_to_text_continues_the_block() {
        // The opening quote keeps accumulating; the closing quote flushes.
        assert_eq!(read("ab\"cd\""), sym("abcd"));
        assert_eq!(read("ab\"c d\""), SExpr::Atom(AtomValue::Str("abc d".into())));
        // A closing quote ends the token, so trailing text stands alone.
        assert_eq!(read("(\"ab\"cd)"), list![sym("ab"), sym("cd")]);
    }

    #[test]
    fn newlines_vanish_before_lexing() {
        assert_eq!(read("ab\ncd"), sym("abcd"));
        assert_eq!(read("(a\nb)"), list![sym("ab")]);
    }

    #[test]
    fn tabs_are_text_characters() {
        assert_eq!(read("a\tb"), SExpr::Atom(AtomValue::Str("a\tb".into())));
    }

    #[test]
    fn empty_input_reads_as_null() {
        assert!(read("").is_null());
        assert!(read("   ").is_null());
    }

    #[test]
    fn missing_close_paren_is_supplied() {
        assert_eq!(read("(a (b 1"), list![sym("a"), list![sym("b"), int(1)]]);
    }

    #[test]
    fn stray_close_paren_ends_the_form() {
        assert_eq!(read("(a)) (b)"), list![sym("a")]);
    }

    #[test]
    fn later_forms_append_into_a_leading_list() {
        assert_eq!(read("(a) (b)"), list![sym("a"), list![sym("b")]]);
    }
}
