//! Built-in tools for Nova.
//!
//! Currently one: a sandboxed arithmetic evaluator. Expressions are parsed
//! into a full syntax tree and checked against an allow-list before any
//! evaluation happens, so untrusted chat input can never reach names,
//! calls, attribute access or anything else beyond plain arithmetic.

pub mod calculator;
pub mod value;

pub use calculator::evaluate;
pub use value::Value;

/// Evaluate `expr`, logging the outcome.
///
/// Convenience wrapper used by the turn core; callers that need the raw
/// result without tracing use [`evaluate`].
pub fn evaluate_logged(expr: &str) -> Result<Value, nova_core::EvalError> {
    let result = evaluate(expr);
    match &result {
        Ok(value) => tracing::debug!(expr, %value, "Evaluated arithmetic expression"),
        Err(e) => tracing::debug!(expr, error = %e, "Arithmetic expression rejected"),
    }
    result
}
