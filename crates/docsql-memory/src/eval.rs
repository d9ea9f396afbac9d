//! Predicate evaluation against a single document
//!
//! Semantics follow an inverted index: a multi-valued field matches when any
//! of its elements matches, and negations also match documents lacking the field.

use std::cmp::Ordering;

use docsql_ir::{CompareOp, NativeDocument, Predicate, Value};

pub(crate) fn matches(predicate: &Predicate, doc: &NativeDocument) -> bool {
    match predicate {
        Predicate::Compare { field, op, value } => match op {
            CompareOp::NotEq => !any_element(doc, field, |v| equals(v, value)),
            op => any_element(doc, field, |v| match v.compare(value) {
                Some(ord) => satisfies(*op, ord),
                None => false,
            }),
        },
        Predicate::In {
            field,
            values,
            negated,
        } => {
            let hit = any_element(doc, field, |v| values.iter().any(|c| equals(v, c)));
            hit != *negated
        }
        Predicate::Between {
            field,
            low,
            high,
            negated,
        } => {
            let hit = any_element(doc, field, |v| {
                matches!(v.compare(low), Some(Ordering::Greater | Ordering::Equal))
                    && matches!(v.compare(high), Some(Ordering::Less | Ordering::Equal))
            });
            hit != *negated
        }
        Predicate::IsNull { field, negated } => {
            let present = any_element(doc, field, |_| true);
            present == *negated
        }
        Predicate::Like {
            field,
            pattern,
            negated,
        } => {
            let hit = any_element(doc, field, |v| v.as_str().is_some_and(|s| like(s, pattern)));
            hit != *negated
        }
        Predicate::And { predicates } => predicates.iter().all(|p| matches(p, doc)),
        Predicate::Or { predicates } => predicates.iter().any(|p| matches(p, doc)),
        Predicate::Not { predicate } => !matches(predicate, doc),
    }
}

// Null values and empty arrays count as absent
fn any_element(
    doc: &NativeDocument,
    field: &str,
    mut test: impl FnMut(&Value) -> bool,
) -> bool {
    match doc.get(field) {
        None | Some(Value::Null) => false,
        Some(Value::Array(items)) => items.iter().filter(|v| !v.is_null()).any(&mut test),
        Some(value) => test(value),
    }
}

fn equals(a: &Value, b: &Value) -> bool {
    a.compare(b) == Some(Ordering::Equal)
}

fn satisfies(op: CompareOp, ord: Ordering) -> bool {
    match op {
        CompareOp::Eq => ord == Ordering::Equal,
        CompareOp::NotEq => ord != Ordering::Equal,
        CompareOp::Lt => ord == Ordering::Less,
        CompareOp::LtEq => ord != Ordering::Greater,
        CompareOp::Gt => ord == Ordering::Greater,
        CompareOp::GtEq => ord != Ordering::Less,
    }
}

/// SQL LIKE: `%` matches any run of characters, `_` exactly one.
pub(crate) fn like(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();

    let (mut t, mut p) = (0, 0);
    // Position of the last `%` and the text index it was tried at
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some('%') => {
                backtrack = Some((p, t));
                p += 1;
            }
            Some(&c) if c == '_' || c == text[t] => {
                t += 1;
                p += 1;
            }
            _ => match backtrack {
                Some((star, from)) => {
                    p = star + 1;
                    t = from + 1;
                    backtrack = Some((star, from + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|&c| c == '%')
}

/// Sort comparison of one field; missing values order last in both directions.
pub(crate) fn compare_for_sort(
    a: &NativeDocument,
    b: &NativeDocument,
    field: &str,
    desc: bool,
) -> Ordering {
    match (sort_value(a, field), sort_value(b, field)) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(x), Some(y)) => {
            let ord = sort_order(x, y);
            if desc {
                ord.reverse()
            } else {
                ord
            }
        }
    }
}

// Total order over present values: kinds rank bool < number < string < list,
// numbers compare numerically with NaN above every other number
fn sort_order(x: &Value, y: &Value) -> Ordering {
    match (x, y) {
        (Value::Int(a), Value::Int(b)) => a.cmp(b),
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            match (x.as_f64(), y.as_f64()) {
                (Some(a), Some(b)) => match (a.is_nan(), b.is_nan()) {
                    (true, true) => Ordering::Equal,
                    (true, false) => Ordering::Greater,
                    (false, true) => Ordering::Less,
                    (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
                },
                _ => Ordering::Equal,
            }
        }
        _ => match x.compare(y) {
            Some(ord) => ord,
            None => kind_rank(x).cmp(&kind_rank(y)),
        },
    }
}

fn kind_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Int(_) | Value::Float(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
    }
}

fn sort_value<'a>(doc: &'a NativeDocument, field: &str) -> Option<&'a Value> {
    match doc.get(field)? {
        Value::Null => None,
        Value::Array(items) => items.iter().find(|v| !v.is_null()),
        value => Some(value),
    }
}
