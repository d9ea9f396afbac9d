//! Literal values and field references in expressions

use docsql_ir::Value;
use sqlparser::ast::{self, Expr, ObjectName, ObjectNamePart, UnaryOperator};

/// Field referenced by a plain or qualified column; the qualifier is dropped.
pub(crate) fn field_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.clone()),
        Expr::CompoundIdentifier(idents) => idents.last().map(|ident| ident.value.clone()),
        Expr::Nested(inner) => field_name(inner),
        _ => None,
    }
}

/// Last identifier of a possibly qualified name (`db.books` -> `books`).
pub(crate) fn object_name(name: &ObjectName) -> Option<String> {
    match name.0.last()? {
        ObjectNamePart::Identifier(ident) => Some(ident.value.clone()),
        #[allow(unreachable_patterns)]
        _ => None,
    }
}

/// Constant value of a literal expression, with unary sign applied.
pub(crate) fn literal(expr: &Expr) -> Option<Value> {
    match expr {
        Expr::Value(v) => sql_value(&v.value),
        Expr::Nested(inner) => literal(inner),
        Expr::UnaryOp {
            op: UnaryOperator::Minus,
            expr,
        } => match literal(expr)? {
            Value::Int(i) => i.checked_neg().map(Value::Int),
            Value::Float(f) => Some(Value::Float(-f)),
            _ => None,
        },
        Expr::UnaryOp {
            op: UnaryOperator::Plus,
            expr,
        } => match literal(expr)? {
            v @ (Value::Int(_) | Value::Float(_)) => Some(v),
            _ => None,
        },
        _ => None,
    }
}

fn sql_value(value: &ast::Value) -> Option<Value> {
    match value {
        ast::Value::Number(n, _) => number(n),
        ast::Value::SingleQuotedString(s)
        | ast::Value::DoubleQuotedString(s)
        | ast::Value::NationalStringLiteral(s) => Some(Value::String(s.clone())),
        ast::Value::Boolean(b) => Some(Value::Bool(*b)),
        ast::Value::Null => Some(Value::Null),
        _ => None,
    }
}

fn number(text: &str) -> Option<Value> {
    match text.parse::<i64>() {
        Ok(i) => Some(Value::Int(i)),
        Err(_) => text.parse::<f64>().ok().map(Value::Float),
    }
}
