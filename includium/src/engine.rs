//! Stateless text and lexical transforms: comment stripping, line
//! splicing, `_Pragma` rewriting, and the span-based lexer that turns a
//! frame's owned source text into a [`Token`] stream.
//!
//! These are kept as free functions on a unit struct, the way the
//! original engine groups its pure, context-free passes, so they stay
//! trivially testable without a [`crate::context::PreprocessorContext`].

use crate::token::{Span, Token, TokenKind, is_identifier_continue, is_identifier_start};

pub struct PreprocessorEngine;

impl PreprocessorEngine {
    /// Strips `//` and `/* */` comments, replacing them with a single
    /// space (plus a preserved newline for `//`, so line numbers stay
    /// correct), without touching comment-like text inside string or
    /// char literals.
    #[must_use]
    pub fn strip_comments(input: &str) -> String {
        if !input.contains('/') {
            return input.to_string();
        }

        let mut result = String::with_capacity(input.len());
        let mut chars = input.chars().peekable();
        let mut in_string = false;
        let mut quote_char = '\0';

        while let Some(ch) = chars.next() {
            if !in_string {
                if ch == '"' || ch == '\'' {
                    in_string = true;
                    quote_char = ch;
                } else if ch == '/' {
                    if chars.peek() == Some(&'/') {
                        chars.next();
                        result.push(' ');
                        for c in chars.by_ref() {
                            if c == '\n' {
                                result.push(c);
                                break;
                            }
                        }
                        continue;
                    } else if chars.peek() == Some(&'*') {
                        chars.next();
                        result.push(' ');
                        let mut prev = '\0';
                        for c in chars.by_ref() {
                            if prev == '*' && c == '/' {
                                break;
                            }
                            if c == '\n' {
                                result.push('\n');
                            }
                            prev = c;
                        }
                        continue;
                    }
                }
            } else if ch == quote_char {
                let mut backslash_count = 0;
                let mut pos = result.len();
                while pos > 0 && result.as_bytes()[pos - 1] == b'\\' {
                    backslash_count += 1;
                    pos -= 1;
                }
                if backslash_count % 2 == 0 {
                    in_string = false;
                    quote_char = '\0';
                }
            }
            result.push(ch);
        }
        result
    }

    /// Joins lines ending in a backslash-newline into one logical line.
    #[must_use]
    pub fn line_splice(input: &str) -> String {
        if !input.contains('\\') {
            return input.to_string();
        }

        let mut out = String::with_capacity(input.len());
        let mut chars = input.chars().peekable();
        while let Some(ch) = chars.next() {
            if ch == '\\' {
                match chars.peek() {
                    Some('\n') => {
                        chars.next();
                    }
                    Some('\r') => {
                        chars.next();
                        if chars.peek() == Some(&'\n') {
                            chars.next();
                        }
                    }
                    _ => out.push(ch),
                }
            } else {
                out.push(ch);
            }
        }
        out
    }

    /// Rewrites `_Pragma("...")` operators into `#pragma ...` directive
    /// lines, the way the standard requires them to be treated once the
    /// unary operator form is seen mid-expansion.
    #[must_use]
    pub fn process_pragma(line: &str) -> String {
        let chars: Vec<char> = line.chars().collect();
        let mut result = String::with_capacity(line.len());
        let mut i = 0;

        while i < chars.len() {
            if chars[i..].starts_with(&['_', 'P', 'r', 'a', 'g', 'm', 'a']) {
                let mut j = i + 7;
                while j < chars.len() && chars[j].is_whitespace() {
                    j += 1;
                }
                if j < chars.len() && chars[j] == '(' {
                    j += 1;
                    while j < chars.len() && chars[j].is_whitespace() {
                        j += 1;
                    }
                    if j < chars.len() && chars[j] == '"' {
                        j += 1;
                        let mut content = String::new();
                        while j < chars.len() && chars[j] != '"' {
                            if chars[j] == '\\' && j + 1 < chars.len() {
                                content.push(chars[j + 1]);
                                j += 2;
                            } else {
                                content.push(chars[j]);
                                j += 1;
                            }
                        }
                        if j < chars.len() && chars[j] == '"' {
                            j += 1;
                            while j < chars.len() && chars[j].is_whitespace() {
                                j += 1;
                            }
                            if j < chars.len() && chars[j] == ')' {
                                j += 1;
                                result.push_str("#pragma ");
                                result.push_str(&content);
                                result.push('\n');
                                i = j;
                                continue;
                            }
                        }
                    }
                }
            }
            result.push(chars[i]);
            i += 1;
        }
        result
    }

    /// Lexes an entire frame's source text into a [`Token`] stream.
    /// Whitespace and newlines are emitted as real tokens: the directive
    /// parser needs newline boundaries, and a macro-expansion pass
    /// needs to tell "no space" from "one space" apart for stringify.
    #[must_use]
    pub fn tokenize_line(source: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        let bytes = source.as_bytes();
        let mut i = 0usize;

        macro_rules! push {
            ($kind:expr, $start:expr, $end:expr) => {
                tokens.push(Token::new($kind, Span::new($start as u32, ($end - $start) as u32)))
            };
        }

        while i < bytes.len() {
            let ch = source[i..].chars().next().unwrap();
            let start = i;

            if ch == '\n' {
                i += 1;
                push!(TokenKind::Newline, start, i);
                continue;
            }
            if ch.is_whitespace() {
                while i < bytes.len() {
                    let c = source[i..].chars().next().unwrap();
                    if c == '\n' || !c.is_whitespace() {
                        break;
                    }
                    i += c.len_utf8();
                }
                push!(TokenKind::Whitespace, start, i);
                continue;
            }
            if is_identifier_start(ch) {
                i += ch.len_utf8();
                while i < bytes.len() {
                    let c = source[i..].chars().next().unwrap();
                    if !is_identifier_continue(c) {
                        break;
                    }
                    i += c.len_utf8();
                }
                push!(TokenKind::Identifier, start, i);
                continue;
            }
            if ch.is_ascii_digit() || (ch == '.' && bytes.get(i + 1).is_some_and(u8::is_ascii_digit)) {
                let mut is_float = ch == '.';
                i += 1;
                while i < bytes.len() {
                    let c = bytes[i] as char;
                    if c.is_ascii_digit() || is_identifier_continue(c) {
                        i += 1;
                    } else if c == '.' && !is_float {
                        is_float = true;
                        i += 1;
                    } else {
                        break;
                    }
                }
                push!(if is_float { TokenKind::FloatLiteral } else { TokenKind::IntLiteral }, start, i);
                continue;
            }
            if ch == '"' || ch == '\'' {
                let quote = ch;
                i += 1;
                while i < bytes.len() {
                    let c = bytes[i] as char;
                    if c == '\\' && i + 1 < bytes.len() {
                        i += 2;
                        continue;
                    }
                    i += 1;
                    if c == quote {
                        break;
                    }
                    if c == '\n' {
                        break;
                    }
                }
                push!(if quote == '"' { TokenKind::StringLiteral } else { TokenKind::CharLiteral }, start, i);
                continue;
            }

            let rest = &source[i..];
            let (kind, len) = lex_punctuation(rest);
            push!(kind, start, start + len);
            i += len;
        }

        tokens
    }
}

/// Longest-match lexing of operators and single-character punctuation.
fn lex_punctuation(rest: &str) -> (TokenKind, usize) {
    const THREE: &[(&str, TokenKind)] = &[
        ("<<=", TokenKind::LShiftAssign),
        (">>=", TokenKind::RShiftAssign),
    ];
    const TWO: &[(&str, TokenKind)] = &[
        ("##", TokenKind::HashHash),
        ("++", TokenKind::Increment),
        ("--", TokenKind::Decrement),
        ("<<", TokenKind::LShift),
        (">>", TokenKind::RShift),
        ("<=", TokenKind::LessEqual),
        (">=", TokenKind::GreaterEqual),
        ("==", TokenKind::EqualEqual),
        ("!=", TokenKind::NotEqual),
        ("&&", TokenKind::AndAnd),
        ("||", TokenKind::OrOr),
        ("+=", TokenKind::AddAssign),
        ("-=", TokenKind::SubAssign),
        ("*=", TokenKind::MulAssign),
        ("/=", TokenKind::DivAssign),
        ("%=", TokenKind::ModAssign),
        ("&=", TokenKind::AndAssign),
        ("|=", TokenKind::OrAssign),
        ("^=", TokenKind::XorAssign),
    ];

    for (pat, kind) in THREE {
        if rest.starts_with(pat) {
            return (kind.clone(), pat.len());
        }
    }
    for (pat, kind) in TWO {
        if rest.starts_with(pat) {
            return (kind.clone(), pat.len());
        }
    }
    if rest.starts_with('#') {
        return (TokenKind::Hash, 1);
    }
    let c = rest.chars().next().unwrap_or('\0');
    (TokenKind::Punctuation(c), c.len_utf8())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        PreprocessorEngine::tokenize_line(source).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lexes_identifier_and_int_literal() {
        let tokens = PreprocessorEngine::tokenize_line("foo 42");
        assert_eq!(tokens[0].kind, TokenKind::Identifier);
        assert_eq!(tokens[0].text("foo 42"), "foo");
        assert_eq!(tokens[2].kind, TokenKind::IntLiteral);
        assert_eq!(tokens[2].text("foo 42"), "42");
    }

    #[test]
    fn lexes_hash_hash_before_hash() {
        assert_eq!(kinds("a##b"), vec![TokenKind::Identifier, TokenKind::HashHash, TokenKind::Identifier]);
    }

    #[test]
    fn lexes_multichar_operators_greedily() {
        assert_eq!(kinds("a<<=b"), vec![TokenKind::Identifier, TokenKind::LShiftAssign, TokenKind::Identifier]);
        assert_eq!(kinds("a<<b"), vec![TokenKind::Identifier, TokenKind::LShift, TokenKind::Identifier]);
    }

    #[test]
    fn string_literal_survives_escaped_quote() {
        let source = r#""a\"b""#;
        let tokens = PreprocessorEngine::tokenize_line(source);
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::StringLiteral);
        assert_eq!(tokens[0].text(source), source);
    }

    #[test]
    fn strip_comments_preserves_string_contents() {
        let out = PreprocessorEngine::strip_comments(r#"int x = 1; // comment"#);
        assert!(out.starts_with("int x = 1; "));
        let out = PreprocessorEngine::strip_comments(r#"char *s = "a // not a comment";"#);
        assert!(out.contains("a // not a comment"));
    }

    #[test]
    fn strip_block_comment_keeps_newlines_for_line_numbers() {
        let out = PreprocessorEngine::strip_comments("a/*\n\n*/b");
        assert_eq!(out.matches('\n').count(), 2);
    }

    #[test]
    fn line_splice_joins_backslash_newline() {
        assert_eq!(PreprocessorEngine::line_splice("foo\\\nbar"), "foobar");
        assert_eq!(PreprocessorEngine::line_splice("foo\\\r\nbar"), "foobar");
    }

    #[test]
    fn process_pragma_rewrites_to_directive() {
        let out = PreprocessorEngine::process_pragma(r#"_Pragma("once") int x;"#);
        assert!(out.starts_with("#pragma once\n"));
        assert!(out.ends_with(" int x;"));
    }
}
