//! WHERE clause translation into a predicate tree

use docsql_ir::{CompareOp, Predicate, Value};
use sqlparser::ast::{BinaryOperator, Expr, UnaryOperator};

use crate::literal::{field_name, literal};
use crate::TranslationError;

pub(crate) fn predicate(expr: &Expr) -> Result<Predicate, TranslationError> {
    match expr {
        Expr::Nested(inner) => predicate(inner),
        Expr::BinaryOp {
            left,
            op: BinaryOperator::And,
            right,
        } => Ok(combine(predicate(left)?, predicate(right)?, true)),
        Expr::BinaryOp {
            left,
            op: BinaryOperator::Or,
            right,
        } => Ok(combine(predicate(left)?, predicate(right)?, false)),
        Expr::BinaryOp { left, op, right } => comparison(left, op, right),
        Expr::UnaryOp {
            op: UnaryOperator::Not,
            expr,
        } => Ok(Predicate::Not {
            predicate: Box::new(predicate(expr)?),
        }),
        Expr::IsNull(inner) => Ok(Predicate::IsNull {
            field: field(inner)?,
            negated: false,
        }),
        Expr::IsNotNull(inner) => Ok(Predicate::IsNull {
            field: field(inner)?,
            negated: true,
        }),
        Expr::InList {
            expr,
            list,
            negated,
        } => {
            if list.is_empty() {
                return Err(TranslationError::UnsupportedPredicate(
                    "empty IN list".to_string(),
                ));
            }
            let values = list
                .iter()
                .map(operand)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Predicate::In {
                field: field(expr)?,
                values,
                negated: *negated,
            })
        }
        Expr::Between {
            expr,
            negated,
            low,
            high,
        } => Ok(Predicate::Between {
            field: field(expr)?,
            low: operand(low)?,
            high: operand(high)?,
            negated: *negated,
        }),
        Expr::Like {
            negated,
            any,
            expr,
            pattern,
            escape_char,
        } => {
            if *any || escape_char.is_some() {
                return Err(TranslationError::UnsupportedPredicate(format!(
                    "LIKE form on {expr}"
                )));
            }
            let pattern = match literal(pattern) {
                Some(Value::String(p)) => p,
                _ => {
                    return Err(TranslationError::UnsupportedPredicate(format!(
                        "LIKE pattern {pattern}"
                    )))
                }
            };
            Ok(Predicate::Like {
                field: field(expr)?,
                pattern,
                negated: *negated,
            })
        }
        other => Err(TranslationError::UnsupportedPredicate(other.to_string())),
    }
}

fn comparison(
    left: &Expr,
    op: &BinaryOperator,
    right: &Expr,
) -> Result<Predicate, TranslationError> {
    let compare = compare_op(op)
        .ok_or_else(|| TranslationError::UnsupportedPredicate(format!("operator {op}")))?;

    let (field, compare, value) = match (field_name(left), field_name(right)) {
        (Some(field), None) => (field, compare, operand(right)?),
        // `5 < x` becomes `x > 5`
        (None, Some(field)) => (field, compare.mirror(), operand(left)?),
        (Some(_), Some(_)) => {
            return Err(TranslationError::UnsupportedPredicate(format!(
                "field-to-field comparison {left} {op} {right}"
            )))
        }
        (None, None) => {
            return Err(TranslationError::UnsupportedPredicate(format!(
                "comparison without a field {left} {op} {right}"
            )))
        }
    };

    if value.is_null() {
        return Err(TranslationError::UnsupportedPredicate(format!(
            "comparison with NULL on {field}, use IS NULL"
        )));
    }

    Ok(Predicate::Compare {
        field,
        op: compare,
        value,
    })
}

fn compare_op(op: &BinaryOperator) -> Option<CompareOp> {
    match op {
        BinaryOperator::Eq => Some(CompareOp::Eq),
        BinaryOperator::NotEq => Some(CompareOp::NotEq),
        BinaryOperator::Lt => Some(CompareOp::Lt),
        BinaryOperator::LtEq => Some(CompareOp::LtEq),
        BinaryOperator::Gt => Some(CompareOp::Gt),
        BinaryOperator::GtEq => Some(CompareOp::GtEq),
        _ => None,
    }
}

// Flattens nested conjunctions/disjunctions of the same kind
fn combine(left: Predicate, right: Predicate, conjunction: bool) -> Predicate {
    let mut predicates = Vec::new();
    for side in [left, right] {
        match side {
            Predicate::And { predicates: inner } if conjunction => predicates.extend(inner),
            Predicate::Or { predicates: inner } if !conjunction => predicates.extend(inner),
            other => predicates.push(other),
        }
    }
    if conjunction {
        Predicate::And { predicates }
    } else {
        Predicate::Or { predicates }
    }
}

fn field(expr: &Expr) -> Result<String, TranslationError> {
    field_name(expr).ok_or_else(|| {
        TranslationError::UnsupportedPredicate(format!("expected a field, found {expr}"))
    })
}

fn operand(expr: &Expr) -> Result<Value, TranslationError> {
    literal(expr).ok_or_else(|| {
        TranslationError::UnsupportedPredicate(format!("expected a literal, found {expr}"))
    })
}
