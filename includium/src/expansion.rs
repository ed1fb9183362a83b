//! Macro expansion: object-like and function-like macro invocation,
//! argument collection, `#` stringification and `##` token pasting, and
//! the recursion guard that turns runaway self-reference into a clean
//! error instead of a stack overflow.
//!
//! Expansion works over macro-body and argument *text* rather than over
//! spans into a particular frame, the same simplification [`crate::expr`]
//! makes for constant expressions: a macro body is re-lexed from its
//! own normalized text every time it is substituted, which is exactly
//! what pushing a synthetic [`crate::include::IncludeFrame`] would do,
//! minus the frame bookkeeping.

use std::rc::Rc;

use crate::context::PreprocessorContext;
use crate::engine::PreprocessorEngine;
use crate::error::PreprocessError;
use crate::token::TokenKind;

/// Recursively expands every macro invocation found in `text`, honoring
/// the context's recursion guard and depth limit.
///
/// # Errors
/// Returns [`PreprocessError::recursion_limit_exceeded`] if expansion
/// nests deeper than `ctx.recursion_limit`, or a semantic error if a
/// function-like macro is invoked with the wrong number of arguments.
pub fn expand_text(ctx: &mut PreprocessorContext, text: &str, depth: usize) -> Result<String, PreprocessError> {
    if depth > ctx.recursion_limit {
        return Err(PreprocessError::recursion_limit_exceeded());
    }

    let tokens = PreprocessorEngine::tokenize_line(text);
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < tokens.len() {
        let tok = &tokens[i];
        if matches!(tok.kind, TokenKind::Whitespace) {
            i += 1;
            continue;
        }
        if tok.kind != TokenKind::Identifier {
            push_piece(&mut out, tok.text(text), false);
            i += 1;
            continue;
        }

        let name = tok.text(text);
        let Some(def) = ctx.lookup(name) else {
            push_piece(&mut out, name, false);
            i += 1;
            continue;
        };
        if ctx.disabled_macros.contains(name) {
            return Err(PreprocessError::recursion_limit_exceeded());
        }

        if def.is_object_like() {
            let name_rc: Rc<str> = Rc::from(name);
            ctx.disabled_macros.insert(Rc::clone(&name_rc));
            let expanded = expand_text(ctx, &def.definition, depth + 1);
            ctx.disabled_macros.remove(&name_rc);
            push_piece(&mut out, &expanded?, false);
            i += 1;
            continue;
        }

        // Function-like: only a call (name immediately followed by `(`,
        // modulo whitespace) triggers expansion; otherwise the name is
        // plain text, matching the standard's "function-like macros are
        // only replaced when followed by (" rule.
        let mut j = i + 1;
        while j < tokens.len() && matches!(tokens[j].kind, TokenKind::Whitespace) {
            j += 1;
        }
        if j >= tokens.len() || tokens[j].kind != TokenKind::Punctuation('(') {
            push_piece(&mut out, name, false);
            i += 1;
            continue;
        }

        let (args, after) = collect_arguments(&tokens, j, text)?;
        let required = def.required_arg_count();
        let got = if def.paramcount == crate::macro_def::PARAMCOUNT_FUNCTIONLIKE_VOID && args.len() == 1 && args[0].trim().is_empty()
        {
            0
        } else {
            args.len()
        };
        if !def.is_variadic && got != required {
            return Err(PreprocessError::macro_arg_mismatch(name, got, required));
        }
        if def.is_variadic && got < required {
            return Err(PreprocessError::macro_arg_mismatch(name, got, required));
        }

        let name_rc: Rc<str> = Rc::from(name);
        ctx.disabled_macros.insert(Rc::clone(&name_rc));
        let substituted = substitute_body(ctx, &def, &args, depth + 1);
        let substituted = substituted.and_then(|body| expand_text(ctx, &body, depth + 1));
        ctx.disabled_macros.remove(&name_rc);

        push_piece(&mut out, &substituted?, false);
        i = after;
    }

    Ok(out)
}

/// Appends `piece` to `out`, inserting a single separating space unless
/// `out` is still empty or `suppress` is set (the `##` paste operator
/// joins its operands with no intervening space on either side).
fn push_piece(out: &mut String, piece: &str, suppress: bool) {
    if piece.is_empty() {
        return;
    }
    if !out.is_empty() && !suppress {
        out.push(' ');
    }
    out.push_str(piece);
}

/// Scans a parenthesized, comma-separated argument list starting at the
/// `(` token index `open`. Returns the raw (unexpanded) argument texts
/// and the token index just past the matching `)`.
fn collect_arguments(
    tokens: &[crate::token::Token],
    open: usize,
    text: &str,
) -> Result<(Vec<String>, usize), PreprocessError> {
    debug_assert_eq!(tokens[open].kind, TokenKind::Punctuation('('));
    let mut depth = 0i32;
    let mut args = Vec::new();
    let mut current = String::new();
    let mut k = open;
    let mut saw_any_token_in_call = false;

    loop {
        if k >= tokens.len() {
            return Err(PreprocessError::malformed_directive("unterminated macro argument list"));
        }
        let tok = &tokens[k];
        match tok.kind {
            TokenKind::Punctuation('(') => {
                depth += 1;
                if depth > 1 {
                    current.push_str(tok.text(text));
                }
            }
            TokenKind::Punctuation(')') => {
                depth -= 1;
                if depth == 0 {
                    args.push(std::mem::take(&mut current).trim().to_string());
                    k += 1;
                    break;
                }
                current.push_str(tok.text(text));
            }
            TokenKind::Punctuation(',') if depth == 1 => {
                args.push(std::mem::take(&mut current).trim().to_string());
            }
            _ => {
                if depth >= 1 {
                    saw_any_token_in_call = true;
                    current.push_str(tok.text(text));
                }
            }
        }
        k += 1;
    }

    if args.len() == 1 && !saw_any_token_in_call {
        args[0] = String::new();
    }
    Ok((args, k))
}

/// Substitutes parameters into a function-like macro's body, applying
/// `#` stringification and `##` pasting. Parameters used as a `##`
/// operand are substituted with their raw argument text; every other
/// occurrence is substituted with the argument's already-expanded text.
fn substitute_body(
    ctx: &mut PreprocessorContext,
    def: &crate::macro_def::MacroDefinition,
    args: &[String],
    depth: usize,
) -> Result<String, PreprocessError> {
    let mut expanded_args = Vec::with_capacity(args.len());
    for arg in args {
        expanded_args.push(expand_text(ctx, arg, depth)?);
    }

    let body = &def.definition;
    let tokens = PreprocessorEngine::tokenize_line(body);
    let mut out = String::with_capacity(body.len());
    let mut i = 0;
    // Set right after a `##` token is consumed: suppresses the space
    // before the next emitted piece (the paste's right-hand operand).
    let mut suppress_space = false;

    let param_index = |name: &str| -> Option<usize> { def.parameters.iter().position(|p| p.as_ref() == name) };

    while i < tokens.len() {
        let tok = &tokens[i];

        if matches!(tok.kind, TokenKind::Whitespace) {
            i += 1;
            continue;
        }

        if tok.kind == TokenKind::Hash {
            let mut j = i + 1;
            while j < tokens.len() && matches!(tokens[j].kind, TokenKind::Whitespace) {
                j += 1;
            }
            if j < tokens.len() && tokens[j].kind == TokenKind::Identifier {
                if let Some(idx) = param_index(tokens[j].text(body)) {
                    push_piece(&mut out, &stringify(args.get(idx).map(String::as_str).unwrap_or("")), suppress_space);
                    suppress_space = false;
                    i = j + 1;
                    continue;
                }
            }
            push_piece(&mut out, tok.text(body), suppress_space);
            suppress_space = false;
            i += 1;
            continue;
        }

        if tok.kind == TokenKind::HashHash {
            suppress_space = true;
            i += 1;
            continue;
        }

        // A bound parameter emits its already-expanded text by default,
        // or its raw argument text when it sits on either side of a
        // `##` paste (the operand that is about to be joined must keep
        // its original spelling, not its macro-expanded form).
        let is_paste_operand = suppress_space || followed_by_hashhash(&tokens, i);

        let piece = if tok.kind == TokenKind::Identifier {
            let name = tok.text(body);
            if name == "__VA_ARGS__" && def.is_variadic {
                let extra = args.get(def.parameters.len()..).unwrap_or(&[]);
                extra.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
            } else if let Some(idx) = param_index(name) {
                if is_paste_operand {
                    args.get(idx).map(String::as_str).unwrap_or("").to_string()
                } else {
                    expanded_args.get(idx).map(String::as_str).unwrap_or("").to_string()
                }
            } else {
                name.to_string()
            }
        } else {
            tok.text(body).to_string()
        };

        push_piece(&mut out, &piece, suppress_space);
        suppress_space = false;
        i += 1;
    }

    Ok(out)
}

/// True if, skipping whitespace, the next token after index `i` is `##`.
fn followed_by_hashhash(tokens: &[crate::token::Token], i: usize) -> bool {
    let mut j = i + 1;
    while j < tokens.len() && matches!(tokens[j].kind, TokenKind::Whitespace) {
        j += 1;
    }
    j < tokens.len() && tokens[j].kind == TokenKind::HashHash
}

/// Wraps `text` in double quotes, escaping `\` and `"`, the way the `#`
/// stringify operator renders a macro argument's spelling.
fn stringify(text: &str) -> String {
    let trimmed = text.trim();
    let mut out = String::with_capacity(trimmed.len() + 2);
    out.push('"');
    for c in trimmed.chars() {
        if c == '\\' || c == '"' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::macro_def::{PARAMCOUNT_OBJECTLIKE, ParamCount};

    fn define(ctx: &mut PreprocessorContext, name: &str, params: &[&str], paramcount: ParamCount, variadic: bool, body: &str) {
        let params = params.iter().map(|p| Rc::from(*p)).collect();
        ctx.define(Rc::from(name), params, paramcount, variadic, body).unwrap();
    }

    #[test]
    fn object_like_macro_expands() {
        let mut ctx = PreprocessorContext::new();
        define(&mut ctx, "PI", &[], PARAMCOUNT_OBJECTLIKE, false, "3");
        assert_eq!(expand_text(&mut ctx, "x = PI;", 0).unwrap(), "x = 3 ;");
    }

    #[test]
    fn function_like_macro_substitutes_arguments() {
        let mut ctx = PreprocessorContext::new();
        define(&mut ctx, "ADD", &["a", "b"], 2, false, "(a + b)");
        assert_eq!(expand_text(&mut ctx, "ADD(1, 2)", 0).unwrap(), "( 1 + 2 )");
    }

    #[test]
    fn function_like_name_without_call_is_untouched() {
        let mut ctx = PreprocessorContext::new();
        define(&mut ctx, "ADD", &["a", "b"], 2, false, "(a + b)");
        assert_eq!(expand_text(&mut ctx, "ADD;", 0).unwrap(), "ADD ;");
    }

    #[test]
    fn stringify_operator_quotes_argument_spelling() {
        let mut ctx = PreprocessorContext::new();
        define(&mut ctx, "STR", &["x"], 1, false, "#x");
        assert_eq!(expand_text(&mut ctx, "STR(hello)", 0).unwrap(), "\"hello\"");
    }

    #[test]
    fn token_paste_concatenates_operands() {
        let mut ctx = PreprocessorContext::new();
        define(&mut ctx, "CAT", &["a", "b"], 2, false, "a ## b");
        assert_eq!(expand_text(&mut ctx, "CAT(foo, bar)", 0).unwrap(), "foobar");
    }

    #[test]
    fn self_referential_macro_is_a_recursion_error() {
        let mut ctx = PreprocessorContext::new();
        define(&mut ctx, "LOOP", &[], PARAMCOUNT_OBJECTLIKE, false, "LOOP + 1");
        let err = expand_text(&mut ctx, "LOOP", 0).unwrap_err();
        assert_eq!(err.message(), "Recursing macros");
    }

    #[test]
    fn variadic_macro_joins_extra_arguments() {
        let mut ctx = PreprocessorContext::new();
        define(&mut ctx, "LOG", &["fmt"], 1, true, "printf(fmt, __VA_ARGS__)");
        assert_eq!(expand_text(&mut ctx, r#"LOG("%d", 1, 2)"#, 0).unwrap(), r#"printf ( "%d" , 1 , 2 )"#);
    }

    #[test]
    fn wrong_arity_is_an_error() {
        let mut ctx = PreprocessorContext::new();
        define(&mut ctx, "ADD", &["a", "b"], 2, false, "(a + b)");
        let err = expand_text(&mut ctx, "ADD(1)", 0).unwrap_err();
        assert_eq!(err.message(), "macro 'ADD' passed 1 arguments, but requires 2");
    }
}
