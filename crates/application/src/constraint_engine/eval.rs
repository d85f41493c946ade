//! Evaluator for compiled constraint expressions.

use super::parser::{CompareOp, Expr};
use super::{ContextValue, EvaluationContext, ExpressionError};

/// Evaluates an expression tree against a context.
pub(super) fn evaluate(
    expr: &Expr,
    context: &EvaluationContext,
) -> Result<ContextValue, ExpressionError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Variable { name, offset } => context.get(name).cloned().ok_or_else(|| {
            ExpressionError::new(*offset, format!("unknown variable '{name}'"))
        }),
        Expr::Not(inner) => match evaluate(inner, context)? {
            ContextValue::Bool(value) => Ok(ContextValue::Bool(!value)),
            other => Err(ExpressionError::new(
                0,
                format!("'!' requires a bool operand, got {}", other.type_name()),
            )),
        },
        Expr::And(left, right) => {
            let left = require_bool(evaluate(left, context)?, "&&")?;
            if !left {
                // Short-circuit; the right side is type-checked lazily like
                // every other runtime error in this language.
                return Ok(ContextValue::Bool(false));
            }
            let right = require_bool(evaluate(right, context)?, "&&")?;
            Ok(ContextValue::Bool(right))
        }
        Expr::Or(left, right) => {
            let left = require_bool(evaluate(left, context)?, "||")?;
            if left {
                return Ok(ContextValue::Bool(true));
            }
            let right = require_bool(evaluate(right, context)?, "||")?;
            Ok(ContextValue::Bool(right))
        }
        Expr::Compare {
            op,
            offset,
            left,
            right,
        } => {
            let left = evaluate(left, context)?;
            let right = evaluate(right, context)?;
            compare(*op, *offset, &left, &right)
        }
    }
}

fn require_bool(value: ContextValue, operator: &str) -> Result<bool, ExpressionError> {
    match value {
        ContextValue::Bool(value) => Ok(value),
        other => Err(ExpressionError::new(
            0,
            format!(
                "'{operator}' requires bool operands, got {}",
                other.type_name()
            ),
        )),
    }
}

fn compare(
    op: CompareOp,
    offset: usize,
    left: &ContextValue,
    right: &ContextValue,
) -> Result<ContextValue, ExpressionError> {
    let result = match (op, left, right) {
        (CompareOp::Eq, left, right) if same_type(left, right) => left == right,
        (CompareOp::Ne, left, right) if same_type(left, right) => left != right,
        (CompareOp::Lt, ContextValue::Int(l), ContextValue::Int(r)) => l < r,
        (CompareOp::Le, ContextValue::Int(l), ContextValue::Int(r)) => l <= r,
        (CompareOp::Gt, ContextValue::Int(l), ContextValue::Int(r)) => l > r,
        (CompareOp::Ge, ContextValue::Int(l), ContextValue::Int(r)) => l >= r,
        _ => {
            return Err(ExpressionError::new(
                offset,
                format!(
                    "cannot compare {} with {}",
                    left.type_name(),
                    right.type_name()
                ),
            ));
        }
    };

    Ok(ContextValue::Bool(result))
}

fn same_type(left: &ContextValue, right: &ContextValue) -> bool {
    left.type_name() == right.type_name()
}
