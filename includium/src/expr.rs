//! Constant integer-expression evaluator for `#if`/`#elif`.
//!
//! Grounded directly in the original preprocessor's `reduce_pp_expression`,
//! `find_precedence`, and `interpret_rpn`: a shunting-yard pass turns the
//! expression into reverse-polish tokens, then a stack machine interprets
//! that list. This replaces the recursive-descent evaluator an earlier
//! pass of this crate used, which never actually supported the bitwise
//! and shift operators its own token type declared.

use crate::error::PreprocessError;
use crate::macro_table::MacroTable;
use crate::token::ExprToken;

/// Recursion cap shared with ordinary macro expansion (§4.6).
const MAX_EXPANSION_DEPTH: usize = 256;

/// Lexes `text` (the tail of an `#if`/`#elif` line) into raw identifier/
/// number/operator tokens, expanding object-like macros inline and
/// resolving `defined`/`defined(...)` before any macro lookup can touch
/// the operand identifier.
pub fn tokenize_expression(text: &str, macros: &MacroTable) -> Result<Vec<ExprToken>, PreprocessError> {
    let mut out = Vec::new();
    expand_into(text, macros, &mut out, 0)?;
    Ok(out)
}

fn expand_into(
    text: &str,
    macros: &MacroTable,
    out: &mut Vec<ExprToken>,
    depth: usize,
) -> Result<(), PreprocessError> {
    if depth >= MAX_EXPANSION_DEPTH {
        return Err(PreprocessError::recursion_limit_exceeded());
    }

    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;
    let mut previous_was_literal = false;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if crate::token::is_identifier_start(c) {
            let start = i;
            while i < chars.len() && crate::token::is_identifier_continue(chars[i]) {
                i += 1;
            }
            let ident: String = chars[start..i].iter().collect();

            if ident == "defined" {
                let (value, consumed) = evaluate_defined(&chars, i, macros)?;
                i = consumed;
                out.push(ExprToken::Number(value));
                previous_was_literal = true;
                continue;
            }

            if let Some(def) = macros.get(&ident).filter(|d| d.is_object_like()) {
                expand_into(&def.definition, macros, out, depth + 1)?;
                previous_was_literal = matches!(out.last(), Some(ExprToken::Number(_)));
                continue;
            }

            // Unresolved identifier (including a function-like macro
            // name not followed by a recognized call) evaluates to zero.
            out.push(ExprToken::Number(0));
            previous_was_literal = true;
            continue;
        }

        if c.is_ascii_digit() {
            let start = i;
            let hex = c == '0' && chars.get(i + 1).is_some_and(|c| *c == 'x' || *c == 'X');
            if hex {
                i += 2;
                while i < chars.len() && chars[i].is_ascii_hexdigit() {
                    i += 1;
                }
            } else {
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
            }
            let literal: String = chars[start..i].iter().collect();
            // Trailing integer suffixes (u/U/l/L) are accepted and ignored.
            while i < chars.len() && matches!(chars[i], 'u' | 'U' | 'l' | 'L') {
                i += 1;
            }
            let value = if hex {
                i64::from_str_radix(literal.trim_start_matches("0x").trim_start_matches("0X"), 16)
            } else {
                literal.parse::<i64>()
            }
            .map_err(|_| PreprocessError::evaluator_error(format!("invalid integer literal '{literal}'")))?;
            out.push(ExprToken::Number(value));
            previous_was_literal = true;
            continue;
        }

        let two: Option<&str> = if i + 1 < chars.len() {
            match (c, chars[i + 1]) {
                ('&', '&') => Some("&&"),
                ('|', '|') => Some("||"),
                ('=', '=') => Some("=="),
                ('!', '=') => Some("!="),
                ('<', '=') => Some("<="),
                ('>', '=') => Some(">="),
                ('<', '<') => Some("<<"),
                ('>', '>') => Some(">>"),
                _ => None,
            }
        } else {
            None
        };

        if let Some(op) = two {
            out.push(match op {
                "&&" => ExprToken::And,
                "||" => ExprToken::Or,
                "==" => ExprToken::Equal,
                "!=" => ExprToken::NotEqual,
                "<=" => ExprToken::LessEqual,
                ">=" => ExprToken::GreaterEqual,
                "<<" => ExprToken::ShiftLeft,
                ">>" => ExprToken::ShiftRight,
                _ => unreachable!(),
            });
            i += 2;
            previous_was_literal = false;
            continue;
        }

        let single = match c {
            '(' => Some(ExprToken::LParen),
            ')' => Some(ExprToken::RParen),
            '!' => Some(ExprToken::Not),
            '~' => Some(ExprToken::BitNot),
            '*' => Some(ExprToken::Multiply),
            '/' => Some(ExprToken::Divide),
            '%' => Some(ExprToken::Modulo),
            '&' => Some(ExprToken::BitAnd),
            '|' => Some(ExprToken::BitOr),
            '^' => Some(ExprToken::BitXor),
            '<' => Some(ExprToken::Less),
            '>' => Some(ExprToken::Greater),
            '+' => Some(ExprToken::Plus),
            '-' => Some(ExprToken::Minus),
            _ => None,
        };

        match single {
            Some(tok @ ExprToken::RParen) => {
                out.push(tok);
                previous_was_literal = true;
            }
            Some(tok) => {
                out.push(tok);
                previous_was_literal = false;
            }
            None => {
                return Err(PreprocessError::evaluator_error(format!("unexpected character '{c}' in expression")));
            }
        }
        i += 1;
    }

    Ok(())
}

/// Handles `defined X` / `defined(X)`, starting just after the
/// `defined` identifier. Returns the 0/1 result and the new cursor.
fn evaluate_defined(chars: &[char], mut i: usize, macros: &MacroTable) -> Result<(i64, usize), PreprocessError> {
    while i < chars.len() && chars[i].is_whitespace() {
        i += 1;
    }

    let parenthesized = i < chars.len() && chars[i] == '(';
    if parenthesized {
        i += 1;
        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
    }

    let start = i;
    if i >= chars.len() || !crate::token::is_identifier_start(chars[i]) {
        return Err(PreprocessError::evaluator_error("'defined' without an identifier"));
    }
    while i < chars.len() && crate::token::is_identifier_continue(chars[i]) {
        i += 1;
    }
    let ident: String = chars[start..i].iter().collect();

    if parenthesized {
        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
        if i >= chars.len() || chars[i] != ')' {
            return Err(PreprocessError::evaluator_error("expected ')' after 'defined(...'"));
        }
        i += 1;
    }

    Ok((i64::from(macros.contains(&ident)), i))
}

/// An operator as it sits on the shunting-yard operator stack. Unary
/// `+`/`-` are tracked as distinct variants from their binary
/// counterparts so popping the stack never has to re-guess which form
/// was meant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StackOp {
    LParen,
    UnaryPlus,
    UnaryMinus,
    Not,
    BitNot,
    Binary(BinOp),
}

impl StackOp {
    /// Precedence table straight from the original's `find_precedence`:
    /// 0=`||`, 1=`&&`, 2=`|`, 3=`^`, 4=`&`, 5=`!=`, 6=`==`, 7=relational,
    /// 8=shift, 9=`+ -`, 10=`* / %`, 11=unary. Reindexed to start at 1
    /// so `None` can mean "not an operator".
    const fn precedence(self) -> u8 {
        match self {
            StackOp::LParen => 0,
            StackOp::Binary(BinOp::Or) => 1,
            StackOp::Binary(BinOp::And) => 2,
            StackOp::Binary(BinOp::BitOr) => 3,
            StackOp::Binary(BinOp::BitXor) => 4,
            StackOp::Binary(BinOp::BitAnd) => 5,
            StackOp::Binary(BinOp::Eq | BinOp::Ne) => 6,
            StackOp::Binary(BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge) => 7,
            StackOp::Binary(BinOp::Shl | BinOp::Shr) => 8,
            StackOp::Binary(BinOp::Add | BinOp::Sub) => 9,
            StackOp::Binary(BinOp::Mul | BinOp::Div | BinOp::Mod) => 10,
            StackOp::UnaryPlus | StackOp::UnaryMinus | StackOp::Not | StackOp::BitNot => 11,
        }
    }

    fn into_rpn_item(self) -> RpnItem {
        match self {
            StackOp::LParen => unreachable!("'(' is never converted to an RPN item"),
            StackOp::UnaryPlus => RpnItem::UnaryPlus,
            StackOp::UnaryMinus => RpnItem::UnaryMinus,
            StackOp::Not => RpnItem::Not,
            StackOp::BitNot => RpnItem::BitNot,
            StackOp::Binary(op) => RpnItem::Binary(op),
        }
    }
}

/// An operator in reverse-polish form: unary ops pop one operand,
/// binary ops pop two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RpnItem {
    Number(i64),
    UnaryPlus,
    UnaryMinus,
    Not,
    BitNot,
    Binary(BinOp),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinOp {
    Or,
    And,
    BitOr,
    BitXor,
    BitAnd,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Shl,
    Shr,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

fn binary_op_for(tok: &ExprToken) -> Option<BinOp> {
    Some(match tok {
        ExprToken::Or => BinOp::Or,
        ExprToken::And => BinOp::And,
        ExprToken::BitOr => BinOp::BitOr,
        ExprToken::BitXor => BinOp::BitXor,
        ExprToken::BitAnd => BinOp::BitAnd,
        ExprToken::Equal => BinOp::Eq,
        ExprToken::NotEqual => BinOp::Ne,
        ExprToken::Less => BinOp::Lt,
        ExprToken::Greater => BinOp::Gt,
        ExprToken::LessEqual => BinOp::Le,
        ExprToken::GreaterEqual => BinOp::Ge,
        ExprToken::ShiftLeft => BinOp::Shl,
        ExprToken::ShiftRight => BinOp::Shr,
        ExprToken::Plus => BinOp::Add,
        ExprToken::Minus => BinOp::Sub,
        ExprToken::Multiply => BinOp::Mul,
        ExprToken::Divide => BinOp::Div,
        ExprToken::Modulo => BinOp::Mod,
        _ => return None,
    })
}

/// Shunting-yard: converts the token stream into reverse-polish order.
/// The previous emitted token (an integer literal or not) disambiguates
/// unary from binary `+`/`-`, exactly as in the original.
fn to_rpn(tokens: &[ExprToken]) -> Result<Vec<RpnItem>, PreprocessError> {
    let mut output = Vec::new();
    let mut operators: Vec<StackOp> = Vec::new();
    let mut previous_was_operand = false;

    for tok in tokens {
        match tok {
            ExprToken::Number(n) => {
                output.push(RpnItem::Number(*n));
                previous_was_operand = true;
            }
            ExprToken::LParen => {
                operators.push(StackOp::LParen);
                previous_was_operand = false;
            }
            ExprToken::RParen => {
                loop {
                    match operators.pop() {
                        Some(StackOp::LParen) => break,
                        Some(op) => output.push(op.into_rpn_item()),
                        None => return Err(PreprocessError::evaluator_error("unmatched ')' in expression")),
                    }
                }
                previous_was_operand = true;
            }
            ExprToken::Plus | ExprToken::Minus if !previous_was_operand => {
                // Unary: binds tighter than anything binary, so no popping first.
                operators.push(if matches!(tok, ExprToken::Plus) { StackOp::UnaryPlus } else { StackOp::UnaryMinus });
                previous_was_operand = false;
            }
            ExprToken::Not => {
                operators.push(StackOp::Not);
                previous_was_operand = false;
            }
            ExprToken::BitNot => {
                operators.push(StackOp::BitNot);
                previous_was_operand = false;
            }
            _ => {
                let Some(bin_op) = binary_op_for(tok) else {
                    return Err(PreprocessError::evaluator_error(format!("unexpected token {tok:?} in expression")));
                };
                let this = StackOp::Binary(bin_op);
                let this_prec = this.precedence();
                while let Some(top) = operators.last() {
                    if *top == StackOp::LParen {
                        break;
                    }
                    // Left-associative: pop while the stacked operator binds
                    // at least as tightly as this one.
                    if top.precedence() >= this_prec {
                        output.push(operators.pop().expect("non-empty by loop condition").into_rpn_item());
                    } else {
                        break;
                    }
                }
                operators.push(this);
                previous_was_operand = false;
            }
        }
    }

    while let Some(top) = operators.pop() {
        if top == StackOp::LParen {
            return Err(PreprocessError::evaluator_error("unmatched '(' in expression"));
        }
        output.push(top.into_rpn_item());
    }

    Ok(output)
}

/// Interprets a reverse-polish token list against an `i64` stack, the
/// way the original's `interpret_rpn` walks its `long` stack.
fn interpret_rpn(items: &[RpnItem]) -> Result<i64, PreprocessError> {
    let mut stack: Vec<i64> = Vec::new();

    for item in items {
        match item {
            RpnItem::Number(n) => stack.push(*n),
            RpnItem::UnaryPlus => {
                let a = stack.pop().ok_or_else(invalid_expression)?;
                stack.push(a);
            }
            RpnItem::UnaryMinus => {
                let a = stack.pop().ok_or_else(invalid_expression)?;
                stack.push(-a);
            }
            RpnItem::Not => {
                let a = stack.pop().ok_or_else(invalid_expression)?;
                stack.push(i64::from(a == 0));
            }
            RpnItem::BitNot => {
                let a = stack.pop().ok_or_else(invalid_expression)?;
                stack.push(!a);
            }
            RpnItem::Binary(op) => {
                let b = stack.pop().ok_or_else(invalid_expression)?;
                let a = stack.pop().ok_or_else(invalid_expression)?;
                stack.push(apply_binary(*op, a, b)?);
            }
        }
    }

    if stack.len() != 1 {
        return Err(invalid_expression());
    }
    Ok(stack[0])
}

fn invalid_expression() -> PreprocessError {
    PreprocessError::evaluator_error("Invalid expression")
}

fn apply_binary(op: BinOp, a: i64, b: i64) -> Result<i64, PreprocessError> {
    Ok(match op {
        BinOp::Or => i64::from(a != 0 || b != 0),
        BinOp::And => i64::from(a != 0 && b != 0),
        BinOp::BitOr => a | b,
        BinOp::BitXor => a ^ b,
        BinOp::BitAnd => a & b,
        BinOp::Eq => i64::from(a == b),
        BinOp::Ne => i64::from(a != b),
        BinOp::Lt => i64::from(a < b),
        BinOp::Gt => i64::from(a > b),
        BinOp::Le => i64::from(a <= b),
        BinOp::Ge => i64::from(a >= b),
        BinOp::Shl => a.checked_shl(b as u32).unwrap_or(0),
        BinOp::Shr => a.checked_shr(b as u32).unwrap_or(0),
        BinOp::Add => a.wrapping_add(b),
        BinOp::Sub => a.wrapping_sub(b),
        BinOp::Mul => a.wrapping_mul(b),
        BinOp::Div => {
            if b == 0 {
                return Err(PreprocessError::evaluator_error("division by zero in constant expression"));
            }
            a.wrapping_div(b)
        }
        BinOp::Mod => {
            if b == 0 {
                return Err(PreprocessError::evaluator_error("division by zero in constant expression"));
            }
            a.wrapping_rem(b)
        }
    })
}

/// Evaluates the tail of an `#if`/`#elif` line: tokenizes with macro
/// expansion, converts to reverse-polish via shunting-yard, then
/// interprets the result as a signed 64-bit integer.
pub fn evaluate(text: &str, macros: &MacroTable) -> Result<i64, PreprocessError> {
    let tokens = tokenize_expression(text, macros)?;
    if tokens.is_empty() {
        return Err(PreprocessError::evaluator_error("empty expression"));
    }
    let rpn = to_rpn(&tokens)?;
    interpret_rpn(&rpn)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(expr: &str) -> i64 {
        evaluate(expr, &MacroTable::new()).unwrap()
    }

    #[test]
    fn arithmetic_precedence() {
        assert_eq!(eval("2+2==4"), 1);
        assert_eq!(eval("1 - -1"), 2);
        assert_eq!(eval("1 + +1"), 2);
        assert_eq!(eval("-1 < 0"), 1);
    }

    #[test]
    fn bitwise_and_shift_operators() {
        assert_eq!(eval("(6 & 3) == 2"), 1);
        assert_eq!(eval("(1 | 2) == 3"), 1);
        assert_eq!(eval("(5 ^ 1) == 4"), 1);
        assert_eq!(eval("(1 << 4) == 16"), 1);
        assert_eq!(eval("(256 >> 4) == 16"), 1);
    }

    #[test]
    fn logical_operators_short_circuit_value_only() {
        assert_eq!(eval("1 && 0"), 0);
        assert_eq!(eval("1 || 0"), 1);
    }

    #[test]
    fn defined_matches_parenthesized_and_bare_forms() {
        let mut macros = MacroTable::new();
        macros
            .add(crate::macro_def::MacroDefinition::arg_binding(
                std::rc::Rc::from("FOO"),
                std::rc::Rc::from("1"),
                std::rc::Rc::from("1"),
            ))
            .unwrap();
        assert_eq!(evaluate("defined(FOO)", &macros).unwrap(), 1);
        assert_eq!(evaluate("defined FOO", &macros).unwrap(), 1);
        assert_eq!(evaluate("defined(BAR)", &macros).unwrap(), 0);
    }

    #[test]
    fn defined_without_identifier_is_an_error() {
        assert!(evaluate("defined", &MacroTable::new()).is_err());
    }

    #[test]
    fn unresolved_identifier_is_zero() {
        assert_eq!(eval("UNDEFINED_THING"), 0);
    }

    #[test]
    fn unmatched_parenthesis_is_rejected() {
        assert!(evaluate("(1 + 2", &MacroTable::new()).is_err());
        assert!(evaluate("1 + 2)", &MacroTable::new()).is_err());
    }
}
