//! A small tagged-expression-tree calculator, independent of the line
//! oriented preprocessing driver: parses and evaluates a single C-style
//! expression (arithmetic, comparison, logical, and the `?:` ternary).
//!
//! Grounded in the original calculator's `Expression`/`ExpressionUnary`/
//! `ExpressionBinary`/`ExpressionTernary` structs, which share a
//! discriminant via a common leading field and are downcast through
//! raw-pointer casts. Here that's a single tagged `enum` instead, and
//! `Operator::NotEqual`'s evaluation uses `!=` rather than the `==` the
//! original's `run_expr` mistakenly used.

use std::rc::Rc;

use crate::error::PreprocessError;
use crate::token::{ExprToken, Token, TokenKind};

/// A unary, binary, or ternary operator recognized by the calculator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Negate,
    LogicalNot,
    BitwiseNot,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    ShiftLeft,
    ShiftRight,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
    NotEqual,
    BitwiseAnd,
    BitwiseXor,
    BitwiseOr,
    LogicalAnd,
    LogicalOr,
    Conditional,
}

/// A parsed expression tree node.
#[derive(Debug, Clone)]
pub enum Expression {
    IntLiteral(i64),
    FloatLiteral(f64),
    StringLiteral(Rc<str>),
    Identifier(Rc<str>),
    Unary { op: Operator, operand: Box<Expression> },
    Binary { op: Operator, left: Box<Expression>, right: Box<Expression> },
    Ternary { cond: Box<Expression>, then_branch: Box<Expression>, else_branch: Box<Expression> },
}

/// Evaluates `expr` to a double, resolving bare identifiers through
/// `lookup` the way the original calculator's REPL resolved named
/// constants.
///
/// # Errors
/// Returns [`PreprocessError::evaluator_error`] for division/modulo by
/// zero or an unresolved identifier.
pub fn run_expression(expr: &Expression, lookup: &dyn Fn(&str) -> Option<f64>) -> Result<f64, PreprocessError> {
    match expr {
        Expression::IntLiteral(n) => Ok(*n as f64),
        Expression::FloatLiteral(f) => Ok(*f),
        Expression::StringLiteral(_) => Err(PreprocessError::evaluator_error("cannot evaluate a string literal numerically")),
        Expression::Identifier(name) => {
            lookup(name).ok_or_else(|| PreprocessError::evaluator_error(format!("undefined identifier '{name}'")))
        }
        Expression::Unary { op, operand } => {
            let value = run_expression(operand, lookup)?;
            Ok(match op {
                Operator::Negate => -value,
                Operator::LogicalNot => f64::from(value == 0.0),
                Operator::BitwiseNot => !(value as i64) as f64,
                _ => unreachable!("non-unary operator in Unary node"),
            })
        }
        Expression::Binary { op, left, right } => {
            let l = run_expression(left, lookup)?;
            let r = run_expression(right, lookup)?;
            Ok(match op {
                Operator::Add => l + r,
                Operator::Subtract => l - r,
                Operator::Multiply => l * r,
                Operator::Divide => {
                    if r == 0.0 {
                        return Err(PreprocessError::evaluator_error("division by zero"));
                    }
                    l / r
                }
                Operator::Modulo => {
                    if r == 0.0 {
                        return Err(PreprocessError::evaluator_error("modulo by zero"));
                    }
                    (l as i64 % r as i64) as f64
                }
                Operator::ShiftLeft => (((l as i64) << (r as i64)) as f64),
                Operator::ShiftRight => (((l as i64) >> (r as i64)) as f64),
                Operator::Less => f64::from(l < r),
                Operator::LessEqual => f64::from(l <= r),
                Operator::Greater => f64::from(l > r),
                Operator::GreaterEqual => f64::from(l >= r),
                Operator::Equal => f64::from(l == r),
                // Fixed: the original compared with `==` here, so `!=`
                // always evaluated to the logical negation of equality
                // done twice over (i.e. behaved exactly like `==`).
                Operator::NotEqual => f64::from(l != r),
                Operator::BitwiseAnd => ((l as i64) & (r as i64)) as f64,
                Operator::BitwiseXor => ((l as i64) ^ (r as i64)) as f64,
                Operator::BitwiseOr => ((l as i64) | (r as i64)) as f64,
                Operator::LogicalAnd => f64::from(l != 0.0 && r != 0.0),
                Operator::LogicalOr => f64::from(l != 0.0 || r != 0.0),
                _ => unreachable!("non-binary operator in Binary node"),
            })
        }
        Expression::Ternary { cond, then_branch, else_branch } => {
            if run_expression(cond, lookup)? != 0.0 {
                run_expression(then_branch, lookup)
            } else {
                run_expression(else_branch, lookup)
            }
        }
    }
}

/// Parses a single C-style expression via precedence climbing, the
/// direct Rust counterpart of the original's Lemon-generated grammar
/// (`convert_to_lemon_token` plus the `.y` rules, collapsed here into
/// one recursive-descent parser since there is no parser generator in
/// play).
///
/// # Errors
/// Returns [`PreprocessError::malformed_directive`] on a syntax error.
pub fn parse_expression(text: &str) -> Result<Expression, PreprocessError> {
    let tokens = lex(text);
    let mut pos = 0;
    let expr = parse_conditional(&tokens, text, &mut pos)?;
    if pos != tokens.len() {
        return Err(PreprocessError::malformed_directive("trailing tokens after expression"));
    }
    Ok(expr)
}

fn lex(text: &str) -> Vec<Token> {
    crate::engine::PreprocessorEngine::tokenize_line(text)
        .into_iter()
        .filter(|t| !matches!(t.kind, TokenKind::Whitespace | TokenKind::Newline))
        .collect()
}

fn peek<'a>(tokens: &'a [Token], pos: usize) -> Option<&'a Token> {
    tokens.get(pos)
}

fn parse_conditional(tokens: &[Token], src: &str, pos: &mut usize) -> Result<Expression, PreprocessError> {
    let cond = parse_logical_or(tokens, src, pos)?;
    if matches!(peek(tokens, *pos).map(|t| &t.kind), Some(TokenKind::Punctuation('?'))) {
        *pos += 1;
        let then_branch = parse_conditional(tokens, src, pos)?;
        expect_punct(tokens, src, pos, ':')?;
        let else_branch = parse_conditional(tokens, src, pos)?;
        return Ok(Expression::Ternary { cond: Box::new(cond), then_branch: Box::new(then_branch), else_branch: Box::new(else_branch) });
    }
    Ok(cond)
}

fn expect_punct(tokens: &[Token], _src: &str, pos: &mut usize, c: char) -> Result<(), PreprocessError> {
    match peek(tokens, *pos) {
        Some(t) if t.kind == TokenKind::Punctuation(c) => {
            *pos += 1;
            Ok(())
        }
        _ => Err(PreprocessError::malformed_directive(format!("expected '{c}'"))),
    }
}

macro_rules! left_assoc_binary {
    ($name:ident, $next:ident, $($kind:pat => $op:expr),+ $(,)?) => {
        fn $name(tokens: &[Token], src: &str, pos: &mut usize) -> Result<Expression, PreprocessError> {
            let mut left = $next(tokens, src, pos)?;
            loop {
                let op = match peek(tokens, *pos).map(|t| &t.kind) {
                    $(Some($kind) => $op,)+
                    _ => break,
                };
                *pos += 1;
                let right = $next(tokens, src, pos)?;
                left = Expression::Binary { op, left: Box::new(left), right: Box::new(right) };
            }
            Ok(left)
        }
    };
}

left_assoc_binary!(parse_logical_or, parse_logical_and, TokenKind::OrOr => Operator::LogicalOr);
left_assoc_binary!(parse_logical_and, parse_bitwise_or, TokenKind::AndAnd => Operator::LogicalAnd);
left_assoc_binary!(parse_bitwise_or, parse_bitwise_xor, TokenKind::Punctuation('|') => Operator::BitwiseOr);
left_assoc_binary!(parse_bitwise_xor, parse_bitwise_and, TokenKind::Punctuation('^') => Operator::BitwiseXor);
left_assoc_binary!(parse_bitwise_and, parse_equality, TokenKind::Punctuation('&') => Operator::BitwiseAnd);
left_assoc_binary!(parse_equality, parse_relational,
    TokenKind::EqualEqual => Operator::Equal,
    TokenKind::NotEqual => Operator::NotEqual,
);
left_assoc_binary!(parse_relational, parse_shift,
    TokenKind::LessEqual => Operator::LessEqual,
    TokenKind::GreaterEqual => Operator::GreaterEqual,
    TokenKind::Punctuation('<') => Operator::Less,
    TokenKind::Punctuation('>') => Operator::Greater,
);
left_assoc_binary!(parse_shift, parse_additive,
    TokenKind::LShift => Operator::ShiftLeft,
    TokenKind::RShift => Operator::ShiftRight,
);
left_assoc_binary!(parse_additive, parse_multiplicative,
    TokenKind::Punctuation('+') => Operator::Add,
    TokenKind::Punctuation('-') => Operator::Subtract,
);
left_assoc_binary!(parse_multiplicative, parse_unary,
    TokenKind::Punctuation('*') => Operator::Multiply,
    TokenKind::Punctuation('/') => Operator::Divide,
    TokenKind::Punctuation('%') => Operator::Modulo,
);

fn parse_unary(tokens: &[Token], src: &str, pos: &mut usize) -> Result<Expression, PreprocessError> {
    let op = match peek(tokens, *pos).map(|t| &t.kind) {
        Some(TokenKind::Punctuation('-')) => Some(Operator::Negate),
        Some(TokenKind::Punctuation('!')) => Some(Operator::LogicalNot),
        Some(TokenKind::Punctuation('~')) => Some(Operator::BitwiseNot),
        Some(TokenKind::Punctuation('+')) => None, // unary plus is a no-op
        _ => return parse_primary(tokens, src, pos),
    };
    if matches!(peek(tokens, *pos).map(|t| &t.kind), Some(TokenKind::Punctuation('+'))) {
        *pos += 1;
        return parse_unary(tokens, src, pos);
    }
    let Some(op) = op else { return parse_primary(tokens, src, pos) };
    *pos += 1;
    let operand = parse_unary(tokens, src, pos)?;
    Ok(Expression::Unary { op, operand: Box::new(operand) })
}

fn parse_primary(tokens: &[Token], src: &str, pos: &mut usize) -> Result<Expression, PreprocessError> {
    let Some(tok) = peek(tokens, *pos) else {
        return Err(PreprocessError::malformed_directive("unexpected end of expression"));
    };
    match &tok.kind {
        TokenKind::IntLiteral => {
            let text = tok.text(src);
            *pos += 1;
            text.parse::<i64>().map(Expression::IntLiteral).map_err(|_| PreprocessError::malformed_directive(format!("invalid integer literal '{text}'")))
        }
        TokenKind::FloatLiteral => {
            let text = tok.text(src);
            *pos += 1;
            text.parse::<f64>().map(Expression::FloatLiteral).map_err(|_| PreprocessError::malformed_directive(format!("invalid float literal '{text}'")))
        }
        TokenKind::StringLiteral => {
            let text = tok.text(src);
            *pos += 1;
            Ok(Expression::StringLiteral(Rc::from(text)))
        }
        TokenKind::Identifier => {
            let text = tok.text(src);
            *pos += 1;
            Ok(Expression::Identifier(Rc::from(text)))
        }
        TokenKind::Punctuation('(') => {
            *pos += 1;
            let inner = parse_conditional(tokens, src, pos)?;
            expect_punct(tokens, src, pos, ')')?;
            Ok(inner)
        }
        other => Err(PreprocessError::malformed_directive(format!("unexpected token {other:?} in expression"))),
    }
}

/// Converts a parsed [`Expression`]'s leaves into [`ExprToken`]s, for
/// callers that want to feed a calculator expression into
/// [`crate::expr::evaluate`]'s RPN machinery instead. Only literal and
/// identifier leaves are representable; compound nodes have no
/// [`ExprToken`] counterpart and are rejected.
///
/// # Errors
/// Returns an error if `expr` is not a single literal or identifier.
pub fn as_expr_token(expr: &Expression) -> Result<ExprToken, PreprocessError> {
    match expr {
        Expression::IntLiteral(n) => Ok(ExprToken::Number(*n)),
        Expression::Identifier(name) => Ok(ExprToken::Identifier(name.to_string())),
        _ => Err(PreprocessError::evaluator_error("expression is not representable as a single token")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(src: &str) -> f64 {
        run_expression(&parse_expression(src).unwrap(), &|_| None).unwrap()
    }

    #[test]
    fn arithmetic_precedence() {
        assert_eq!(eval("1 + 2 * 3"), 7.0);
        assert_eq!(eval("(1 + 2) * 3"), 9.0);
    }

    #[test]
    fn not_equal_is_not_the_same_as_equal() {
        assert_eq!(eval("1 != 2"), 1.0);
        assert_eq!(eval("1 != 1"), 0.0);
        assert_eq!(eval("1 == 1"), 1.0);
    }

    #[test]
    fn ternary_picks_branch() {
        assert_eq!(eval("1 ? 10 : 20"), 10.0);
        assert_eq!(eval("0 ? 10 : 20"), 20.0);
    }

    #[test]
    fn unary_operators() {
        assert_eq!(eval("-5 + 3"), -2.0);
        assert_eq!(eval("!0"), 1.0);
        assert_eq!(eval("!5"), 0.0);
    }

    #[test]
    fn identifier_resolves_through_lookup() {
        let expr = parse_expression("x + 1").unwrap();
        let value = run_expression(&expr, &|name| if name == "x" { Some(41.0) } else { None }).unwrap();
        assert_eq!(value, 42.0);
    }

    #[test]
    fn unresolved_identifier_is_an_error() {
        let expr = parse_expression("y").unwrap();
        assert!(run_expression(&expr, &|_| None).is_err());
    }

    #[test]
    fn division_by_zero_is_an_error() {
        let expr = parse_expression("1 / 0").unwrap();
        assert!(run_expression(&expr, &|_| None).is_err());
    }
}
