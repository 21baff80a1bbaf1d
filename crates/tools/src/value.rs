//! Runtime values produced by the arithmetic evaluator.
//!
//! Integers are exact and unbounded up to [`MAX_INT_DIGITS`] decimal
//! digits; anything larger is refused rather than computed. Division,
//! floor division, modulo and exponentiation follow the usual
//! scripting-language conventions users type into a chat box:
//! `7 / 2 == 3.5`, `-7 // 2 == -4`, `-7 % 3 == 2`, `2 ** -1 == 0.5`.
//! Tuples and lists concatenate with `+` and repeat with `* int`.

use nova_core::error::EvalError;
use num_bigint::BigInt;
use num_traits::{One, Signed, ToPrimitive, Zero};
use std::fmt;

/// Largest integer the evaluator will produce, in decimal digits.
pub const MAX_INT_DIGITS: usize = 4300;

/// `MAX_INT_DIGITS` expressed in bits (4300 * log2(10), rounded up).
pub(crate) const MAX_INT_BITS: u64 = 14_285;

/// Largest tuple or list the evaluator will build.
pub const MAX_SEQUENCE_LEN: usize = 10_000;

/// A number or a literal sequence of values.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(BigInt),
    Float(f64),
    Tuple(Vec<Value>),
    List(Vec<Value>),
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(BigInt::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

/// The arithmetic binary operators that survive validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
}

impl ArithOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::FloorDiv => "//",
            Self::Mod => "%",
            Self::Pow => "**",
        }
    }
}

impl Value {
    /// Type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Tuple(_) => "tuple",
            Self::List(_) => "list",
        }
    }

    fn is_number(&self) -> bool {
        matches!(self, Self::Int(_) | Self::Float(_))
    }

    /// The value as a float, if it is a number within float range.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => i.to_f64().filter(|f| f.is_finite()),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn negate(self) -> Result<Value, EvalError> {
        match self {
            Self::Int(i) => Ok(Self::Int(-i)),
            Self::Float(f) => Ok(Self::Float(-f)),
            other => Err(EvalError::UnsupportedOperand {
                op: "-".into(),
                operand: other.type_name().into(),
            }),
        }
    }

    pub fn positive(self) -> Result<Value, EvalError> {
        match self {
            Self::Int(_) | Self::Float(_) => Ok(self),
            other => Err(EvalError::UnsupportedOperand {
                op: "+".into(),
                operand: other.type_name().into(),
            }),
        }
    }

    /// Apply a binary operator.
    pub fn apply(self, op: ArithOp, rhs: Value) -> Result<Value, EvalError> {
        match (self, rhs) {
            (Self::Int(a), Self::Int(b)) => int_op(op, a, b),
            (Self::Tuple(a), Self::Tuple(b)) if op == ArithOp::Add => concat(a, b).map(Self::Tuple),
            (Self::List(a), Self::List(b)) if op == ArithOp::Add => concat(a, b).map(Self::List),
            (Self::Tuple(items), Self::Int(n)) | (Self::Int(n), Self::Tuple(items))
                if op == ArithOp::Mul =>
            {
                repeat(items, &n).map(Self::Tuple)
            }
            (Self::List(items), Self::Int(n)) | (Self::Int(n), Self::List(items))
                if op == ArithOp::Mul =>
            {
                repeat(items, &n).map(Self::List)
            }
            (lhs, rhs) if lhs.is_number() && rhs.is_number() => {
                // An integer beyond float range cannot meet a float.
                let a = lhs.as_f64().ok_or(EvalError::Overflow)?;
                let b = rhs.as_f64().ok_or(EvalError::Overflow)?;
                float_op(op, a, b)
            }
            (lhs, rhs) => Err(EvalError::UnsupportedOperands {
                op: op.symbol().into(),
                left: lhs.type_name().into(),
                right: rhs.type_name().into(),
            }),
        }
    }
}

pub(crate) fn int_too_large() -> EvalError {
    EvalError::TooLarge(format!("integer with more than {MAX_INT_DIGITS} digits"))
}

fn sequence_too_large() -> EvalError {
    EvalError::TooLarge(format!("sequence of more than {MAX_SEQUENCE_LEN} items"))
}

/// Refuse integers past the digit cap.
pub(crate) fn check_int_size(i: &BigInt) -> Result<(), EvalError> {
    if i.bits() > MAX_INT_BITS {
        Err(int_too_large())
    } else {
        Ok(())
    }
}

fn bounded(i: BigInt) -> Result<Value, EvalError> {
    check_int_size(&i)?;
    Ok(Value::Int(i))
}

fn concat(mut a: Vec<Value>, b: Vec<Value>) -> Result<Vec<Value>, EvalError> {
    if a.len() + b.len() > MAX_SEQUENCE_LEN {
        return Err(sequence_too_large());
    }
    a.extend(b);
    Ok(a)
}

/// `items * times`; a count of zero or less gives an empty sequence.
fn repeat(items: Vec<Value>, times: &BigInt) -> Result<Vec<Value>, EvalError> {
    if items.is_empty() || !times.is_positive() {
        return Ok(Vec::new());
    }
    let len = times
        .to_usize()
        .and_then(|n| n.checked_mul(items.len()))
        .filter(|&len| len <= MAX_SEQUENCE_LEN)
        .ok_or_else(sequence_too_large)?;
    Ok(items.iter().cloned().cycle().take(len).collect())
}

fn to_float(i: &BigInt) -> Result<f64, EvalError> {
    i.to_f64().filter(|f| f.is_finite()).ok_or(EvalError::Overflow)
}

/// Floor division and modulo together: the quotient rounds toward -inf
/// and the remainder takes the sign of the divisor.
fn floor_div_mod(a: &BigInt, b: &BigInt) -> (BigInt, BigInt) {
    let mut q = a / b;
    let mut r = a % b;
    if !r.is_zero() && r.is_negative() != b.is_negative() {
        q -= BigInt::one();
        r += b;
    }
    (q, r)
}

fn int_op(op: ArithOp, a: BigInt, b: BigInt) -> Result<Value, EvalError> {
    let divides = matches!(op, ArithOp::Div | ArithOp::FloorDiv | ArithOp::Mod);
    if divides && b.is_zero() {
        return Err(EvalError::DivisionByZero);
    }

    match op {
        ArithOp::Add => bounded(a + b),
        ArithOp::Sub => bounded(a - b),
        ArithOp::Mul => bounded(a * b),
        ArithOp::Div => Ok(Value::Float(to_float(&a)? / to_float(&b)?)),
        ArithOp::FloorDiv => bounded(floor_div_mod(&a, &b).0),
        ArithOp::Mod => bounded(floor_div_mod(&a, &b).1),
        ArithOp::Pow => int_pow(a, b),
    }
}

fn int_pow(base: BigInt, exp: BigInt) -> Result<Value, EvalError> {
    if exp.is_negative() {
        if base.is_zero() {
            return Err(EvalError::DivisionByZero);
        }
        return float_op(ArithOp::Pow, to_float(&base)?, to_float(&exp)?);
    }

    // 0, 1 and -1 stay small whatever the exponent.
    if base.is_zero() {
        return Ok(Value::from(i64::from(exp.is_zero())));
    }
    if base.abs().is_one() {
        let odd = !(&exp % BigInt::from(2)).is_zero();
        return Ok(Value::from(if base.is_negative() && odd { -1_i64 } else { 1 }));
    }

    // |base| >= 2, so the result needs at least (bits - 1) * exp + 1 bits.
    let exp = exp
        .to_u32()
        .filter(|&e| u64::from(e) <= MAX_INT_BITS)
        .ok_or_else(int_too_large)?;
    if (base.bits() - 1).saturating_mul(u64::from(exp)) >= MAX_INT_BITS {
        return Err(int_too_large());
    }
    bounded(base.pow(exp))
}

fn float_op(op: ArithOp, a: f64, b: f64) -> Result<Value, EvalError> {
    let v = match op {
        ArithOp::Add => a + b,
        ArithOp::Sub => a - b,
        ArithOp::Mul => a * b,
        ArithOp::Div => {
            if b == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            a / b
        }
        ArithOp::FloorDiv => {
            if b == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            (a / b).floor()
        }
        ArithOp::Mod => {
            if b == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            let r = a % b;
            if r != 0.0 && ((r < 0.0) != (b < 0.0)) { r + b } else { r }
        }
        ArithOp::Pow => {
            if a == 0.0 && b < 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            if a < 0.0 && b.fract() != 0.0 {
                return Err(EvalError::NotReal(format!("{a} ** {b}")));
            }
            let r = a.powf(b);
            if r.is_infinite() && a.is_finite() && b.is_finite() {
                return Err(EvalError::Overflow);
            }
            r
        }
    };
    Ok(Value::Float(v))
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => f.write_str(&format_float(*x)),
            Self::Tuple(items) => {
                f.write_str("(")?;
                write_items(f, items)?;
                if items.len() == 1 {
                    f.write_str(",")?;
                }
                f.write_str(")")
            }
            Self::List(items) => {
                f.write_str("[")?;
                write_items(f, items)?;
                f.write_str("]")
            }
        }
    }
}

fn write_items(f: &mut fmt::Formatter<'_>, items: &[Value]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

/// Shortest round-trip float text, always marked as a float:
/// `4.0`, `2.5`, `1e+20`, `1.5e-07`.
fn format_float(x: f64) -> String {
    if x.is_nan() {
        return "nan".into();
    }
    if x.is_infinite() {
        return if x > 0.0 { "inf".into() } else { "-inf".into() };
    }
    let abs = x.abs();
    if abs == 0.0 || (1e-4..1e16).contains(&abs) {
        let s = format!("{x}");
        if s.contains('.') { s } else { format!("{s}.0") }
    } else {
        let s = format!("{x:e}");
        match s.split_once('e') {
            Some((mantissa, exp)) => {
                let exp: i32 = exp.parse().unwrap_or(0);
                let sign = if exp < 0 { '-' } else { '+' };
                format!("{mantissa}e{sign}{:02}", exp.abs())
            }
            None => s,
        }
    }
}
