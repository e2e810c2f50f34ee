//! Value-level operations behind the arithmetic, comparison and sequence
//! special forms. Operands arrive already evaluated.

use crate::{EvalError, EvalResult, Node, Sexpr, Span};

const OVERFLOW: &str = "integer overflow";
const DIVISION_BY_ZERO: &str = "division by zero";

fn expect_integer(node: &Node, operator: &str) -> Result<i64, EvalError> {
    match node.kind {
        Sexpr::Integer(n) => Ok(n),
        _ => Err(EvalError::NotANumber {
            operator: operator.to_string(),
            found: node.kind.clone(),
            span: node.span,
        }),
    }
}

fn integer_op<F: Fn(i64, i64) -> Result<i64, &'static str>>(
    lhs: &Node,
    rhs: &Node,
    span: Span,
    operator: &str,
    func: F,
) -> EvalResult {
    let left = expect_integer(lhs, operator)?;
    let right = expect_integer(rhs, operator)?;
    match func(left, right) {
        Ok(result) => Ok(Node::new_integer(result, span)),
        Err(message) => Err(EvalError::ArithmeticError {
            operator: operator.to_string(),
            message: message.to_string(),
            span,
        }),
    }
}

/// Integer division rounding towards negative infinity.
pub fn floor_div(a: i64, b: i64) -> Result<i64, &'static str> {
    if b == 0 {
        return Err(DIVISION_BY_ZERO);
    }
    let quotient = a.checked_div(b).ok_or(OVERFLOW)?;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        Ok(quotient - 1)
    } else {
        Ok(quotient)
    }
}

/// Remainder matching `floor_div`: takes the sign of the divisor, so that
/// `a == b * floor_div(a, b) + floor_mod(a, b)`.
pub fn floor_mod(a: i64, b: i64) -> Result<i64, &'static str> {
    if b == 0 {
        return Err(DIVISION_BY_ZERO);
    }
    let remainder = a.wrapping_rem(b); // i64::MIN % -1 is 0, not an overflow
    if remainder != 0 && ((remainder < 0) != (b < 0)) {
        Ok(remainder + b)
    } else {
        Ok(remainder)
    }
}

pub fn prim_add(lhs: &Node, rhs: &Node, span: Span) -> EvalResult {
    integer_op(lhs, rhs, span, "+", |a, b| a.checked_add(b).ok_or(OVERFLOW))
}

pub fn prim_sub(lhs: &Node, rhs: &Node, span: Span) -> EvalResult {
    integer_op(lhs, rhs, span, "-", |a, b| a.checked_sub(b).ok_or(OVERFLOW))
}

pub fn prim_mul(lhs: &Node, rhs: &Node, span: Span) -> EvalResult {
    integer_op(lhs, rhs, span, "*", |a, b| a.checked_mul(b).ok_or(OVERFLOW))
}

pub fn prim_div(lhs: &Node, rhs: &Node, span: Span) -> EvalResult {
    integer_op(lhs, rhs, span, "/", floor_div)
}

pub fn prim_mod(lhs: &Node, rhs: &Node, span: Span) -> EvalResult {
    integer_op(lhs, rhs, span, "mod", floor_mod)
}

pub fn prim_greater_than(lhs: &Node, rhs: &Node, span: Span) -> EvalResult {
    let left = expect_integer(lhs, ">")?;
    let right = expect_integer(rhs, ">")?;
    Ok(Node::new_bool(left > right, span))
}

/// `eq`: true only for two atoms of equal value. Lists never compare equal.
pub fn prim_eq(lhs: &Node, rhs: &Node, span: Span) -> EvalResult {
    let equal = lhs.kind.is_atom() && rhs.kind.is_atom() && lhs.kind == rhs.kind;
    Ok(Node::new_bool(equal, span))
}

// --- Sequences ---

/// The part of a string or a list that `cons`, `head`, `tail` and `empty`
/// care about.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sequence<'a> {
    Text(&'a str),
    Items(&'a [Node]),
}

impl<'a> Sequence<'a> {
    pub fn of(value: &'a Sexpr) -> Option<Self> {
        match value {
            Sexpr::String(s) => Some(Sequence::Text(s)),
            Sexpr::List(items) => Some(Sequence::Items(items)),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Sequence::Text(s) => s.is_empty(),
            Sequence::Items(items) => items.is_empty(),
        }
    }

    /// First character as a one-character string, or the first element.
    pub fn first(&self, span: Span) -> Option<Node> {
        match self {
            Sequence::Text(s) => s
                .chars()
                .next()
                .map(|c| Node::new_string(c.to_string(), span)),
            Sequence::Items(items) => items.first().cloned(),
        }
    }

    /// Everything after the first character or element.
    pub fn rest(&self, span: Span) -> Option<Node> {
        match self {
            Sequence::Text(s) => {
                let mut chars = s.chars();
                chars
                    .next()
                    .map(|_| Node::new_string(chars.as_str(), span))
            }
            Sequence::Items(items) => items
                .split_first()
                .map(|(_, rest)| Node::new_list(rest.to_vec(), span)),
        }
    }
}

fn expect_sequence<'a>(node: &'a Node, operator: &str) -> Result<Sequence<'a>, EvalError> {
    Sequence::of(&node.kind).ok_or_else(|| EvalError::NotAListOrString {
        operator: operator.to_string(),
        found: node.kind.clone(),
        span: node.span,
    })
}

fn empty_value_error(operator: &str, span: Span) -> EvalError {
    EvalError::EmptyValue {
        operator: operator.to_string(),
        span,
    }
}

/// `cons`: two strings concatenate; otherwise `lhs` is prepended to the list `rhs`.
pub fn prim_cons(lhs: Node, rhs: Node, span: Span) -> EvalResult {
    match (lhs.kind, rhs.kind) {
        (Sexpr::String(left), Sexpr::String(right)) => Ok(Node::new_string(left + &right, span)),
        (head_kind, Sexpr::List(mut items)) => {
            items.insert(0, Node::new(head_kind, lhs.span));
            Ok(Node::new_list(items, span))
        }
        (_, other) => Err(EvalError::NotAList {
            context: "cons".to_string(),
            found: other,
            span: rhs.span,
        }),
    }
}

pub fn prim_head(value: &Node, span: Span) -> EvalResult {
    expect_sequence(value, "head")?
        .first(span)
        .ok_or_else(|| empty_value_error("head", span))
}

pub fn prim_tail(value: &Node, span: Span) -> EvalResult {
    expect_sequence(value, "tail")?
        .rest(span)
        .ok_or_else(|| empty_value_error("tail", span))
}

pub fn prim_empty(value: &Node, span: Span) -> EvalResult {
    let sequence = expect_sequence(value, "empty")?;
    Ok(Node::new_bool(sequence.is_empty(), span))
}
