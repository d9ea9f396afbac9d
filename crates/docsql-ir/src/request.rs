//! Rendered search and mutation requests
//!
//! A [`RenderedQuery`] is the engine-facing form of a SELECT: a predicate tree,
//! requested fields, sort keys and a page window. It renders to Lucene-syntax
//! request parameters for HTTP search engines and is consumed structurally by
//! in-process gateways.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{NativeDocument, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl CompareOp {
    /// Operator to use when the operands are swapped (`5 < x` becomes `x > 5`).
    pub fn mirror(self) -> Self {
        match self {
            CompareOp::Eq => CompareOp::Eq,
            CompareOp::NotEq => CompareOp::NotEq,
            CompareOp::Lt => CompareOp::Gt,
            CompareOp::LtEq => CompareOp::GtEq,
            CompareOp::Gt => CompareOp::Lt,
            CompareOp::GtEq => CompareOp::LtEq,
        }
    }
}

/// Filter predicate tree over document fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Predicate {
    Compare {
        field: String,
        op: CompareOp,
        value: Value,
    },
    In {
        field: String,
        values: Vec<Value>,
        #[serde(default)]
        negated: bool,
    },
    Between {
        field: String,
        low: Value,
        high: Value,
        #[serde(default)]
        negated: bool,
    },
    IsNull {
        field: String,
        #[serde(default)]
        negated: bool,
    },
    /// SQL LIKE pattern (`%` any run, `_` one character).
    Like {
        field: String,
        pattern: String,
        #[serde(default)]
        negated: bool,
    },
    And {
        predicates: Vec<Predicate>,
    },
    Or {
        predicates: Vec<Predicate>,
    },
    Not {
        predicate: Box<Predicate>,
    },
}

impl Predicate {
    pub fn compare(field: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Predicate::Compare {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    /// Render as a Lucene query string.
    pub fn to_query_string(&self) -> String {
        match self {
            Predicate::Compare { field, op, value } => {
                let term = lucene_term(value);
                match op {
                    CompareOp::Eq => format!("{}:{}", field, term),
                    CompareOp::NotEq => exclude(format!("{}:{}", field, term)),
                    CompareOp::Lt => format!("{}:{{* TO {}}}", field, term),
                    CompareOp::LtEq => format!("{}:[* TO {}]", field, term),
                    CompareOp::Gt => format!("{}:{{{} TO *}}", field, term),
                    CompareOp::GtEq => format!("{}:[{} TO *]", field, term),
                }
            }
            Predicate::In {
                field,
                values,
                negated,
            } => {
                let terms: Vec<String> = values.iter().map(lucene_term).collect();
                negate_if(format!("{}:({})", field, terms.join(" OR ")), *negated)
            }
            Predicate::Between {
                field,
                low,
                high,
                negated,
            } => negate_if(
                format!("{}:[{} TO {}]", field, lucene_term(low), lucene_term(high)),
                *negated,
            ),
            Predicate::IsNull { field, negated } => {
                let exists = format!("{}:[* TO *]", field);
                if *negated {
                    exists
                } else {
                    exclude(exists)
                }
            }
            Predicate::Like {
                field,
                pattern,
                negated,
            } => negate_if(format!("{}:{}", field, like_to_wildcard(pattern)), *negated),
            Predicate::And { predicates } => join_clauses(predicates, " AND "),
            Predicate::Or { predicates } => join_clauses(predicates, " OR "),
            Predicate::Not { predicate } => exclude(predicate.to_query_string()),
        }
    }
}

fn join_clauses(predicates: &[Predicate], separator: &str) -> String {
    match predicates {
        [] => "*:*".to_string(),
        [single] => single.to_query_string(),
        many => {
            let parts: Vec<String> = many.iter().map(Predicate::to_query_string).collect();
            format!("({})", parts.join(separator))
        }
    }
}

// Pure negative clauses match nothing in Lucene; anchor them to all documents
fn exclude(clause: String) -> String {
    format!("(*:* -{})", clause)
}

fn negate_if(clause: String, negated: bool) -> String {
    if negated {
        exclude(clause)
    } else {
        clause
    }
}

const LUCENE_SPECIAL: &[char] = &[
    '+', '-', '&', '|', '!', '(', ')', '{', '}', '[', ']', '^', '"', '~', '*', '?', ':', '\\', '/',
];

fn escape_lucene(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if LUCENE_SPECIAL.contains(&c) || c.is_whitespace() {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn lucene_term(value: &Value) -> String {
    match value {
        Value::Null => "\"\"".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Int(i) => escape_lucene(&i.to_string()),
        Value::Float(f) => escape_lucene(&f.to_string()),
        Value::String(s) => format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
        Value::Array(items) => {
            let terms: Vec<String> = items.iter().map(lucene_term).collect();
            format!("({})", terms.join(" OR "))
        }
    }
}

fn like_to_wildcard(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        match c {
            '%' => out.push('*'),
            '_' => out.push('?'),
            c if LUCENE_SPECIAL.contains(&c) || c.is_whitespace() => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    #[serde(default)]
    pub desc: bool,
}

impl SortKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            desc: false,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            desc: true,
        }
    }
}

/// Page window of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paging {
    pub offset: u64,
    pub limit: u64,
}

impl Paging {
    /// Window with `limit` clamped to `max_page_size`; no limit means a full page.
    pub fn clamped(offset: u64, limit: Option<u64>, max_page_size: u64) -> Self {
        Self {
            offset,
            limit: limit.map_or(max_page_size, |l| l.min(max_page_size)),
        }
    }
}

/// Field assignment of an UPDATE.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub field: String,
    pub value: Value,
}

/// Search request as sent to the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedQuery {
    pub collection: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Predicate>,

    /// Fields to return; empty means every stored field.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<SortKey>,

    pub start: u64,
    pub rows: u64,

    /// The caller needs an exact total-match count, not just the page.
    #[serde(default)]
    pub include_total: bool,
}

impl RenderedQuery {
    /// Lucene main query (`q`).
    pub fn query_string(&self) -> String {
        self.filter
            .as_ref()
            .map(Predicate::to_query_string)
            .unwrap_or_else(|| "*:*".to_string())
    }

    /// Request parameters in the form understood by HTTP search engines.
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("q", self.query_string())];

        let fl = if self.fields.is_empty() {
            "*".to_string()
        } else {
            self.fields.join(",")
        };
        params.push(("fl", fl));

        if !self.sort.is_empty() {
            let sort: Vec<String> = self
                .sort
                .iter()
                .map(|k| format!("{} {}", k.field, if k.desc { "desc" } else { "asc" }))
                .collect();
            params.push(("sort", sort.join(",")));
        }

        params.push(("start", self.start.to_string()));
        params.push(("rows", self.rows.to_string()));
        params
    }

    /// SHA-256 of the canonical JSON form, for log correlation and caching.
    pub fn fingerprint(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// Mutation request as sent to the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op")]
pub enum RenderedMutation {
    Add {
        collection: String,
        documents: Vec<NativeDocument>,
    },
    Update {
        collection: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        filter: Option<Predicate>,
        assignments: Vec<Assignment>,
    },
    Delete {
        collection: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        filter: Option<Predicate>,
    },
}

impl RenderedMutation {
    pub fn collection(&self) -> &str {
        match self {
            RenderedMutation::Add { collection, .. }
            | RenderedMutation::Update { collection, .. }
            | RenderedMutation::Delete { collection, .. } => collection,
        }
    }

    pub fn op_name(&self) -> &'static str {
        match self {
            RenderedMutation::Add { .. } => "add",
            RenderedMutation::Update { .. } => "update",
            RenderedMutation::Delete { .. } => "delete",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_rendering() {
        assert_eq!(
            Predicate::compare("age", CompareOp::Gt, 18).to_query_string(),
            "age:{18 TO *}"
        );
        assert_eq!(
            Predicate::compare("age", CompareOp::LtEq, 65).to_query_string(),
            "age:[* TO 65]"
        );
        assert_eq!(
            Predicate::compare("age", CompareOp::Eq, -3).to_query_string(),
            "age:\\-3"
        );
    }

    #[test]
    fn test_boolean_rendering() {
        let predicate = Predicate::And {
            predicates: vec![
                Predicate::compare("name", CompareOp::Eq, "O\"Brien"),
                Predicate::Or {
                    predicates: vec![
                        Predicate::compare("city", CompareOp::NotEq, "Oslo"),
                        Predicate::IsNull {
                            field: "city".into(),
                            negated: false,
                        },
                    ],
                },
            ],
        };

        assert_eq!(
            predicate.to_query_string(),
            "(name:\"O\\\"Brien\" AND ((*:* -city:\"Oslo\") OR (*:* -city:[* TO *])))"
        );
    }

    #[test]
    fn test_like_and_in_rendering() {
        let like = Predicate::Like {
            field: "title".into(),
            pattern: "rust_%guide".into(),
            negated: false,
        };
        assert_eq!(like.to_query_string(), "title:rust?*guide");

        let not_in = Predicate::In {
            field: "id".into(),
            values: vec![Value::Int(1), Value::Int(2)],
            negated: true,
        };
        assert_eq!(not_in.to_query_string(), "(*:* -id:(1 OR 2))");
    }

    #[test]
    fn test_query_params() {
        let query = RenderedQuery {
            collection: "books".into(),
            filter: None,
            fields: vec!["title".into(), "year".into()],
            sort: vec![SortKey::desc("year"), SortKey::asc("title")],
            start: 10,
            rows: 5,
            include_total: false,
        };

        assert_eq!(
            query.to_params(),
            vec![
                ("q", "*:*".to_string()),
                ("fl", "title,year".to_string()),
                ("sort", "year desc,title asc".to_string()),
                ("start", "10".to_string()),
                ("rows", "5".to_string()),
            ]
        );
    }

    #[test]
    fn test_fingerprint_deterministic() {
        let query = RenderedQuery {
            collection: "books".into(),
            filter: Some(Predicate::compare("year", CompareOp::GtEq, 2000)),
            fields: vec![],
            sort: vec![],
            start: 0,
            rows: 10,
            include_total: true,
        };

        assert_eq!(query.fingerprint(), query.clone().fingerprint());

        let mut other = query.clone();
        other.rows = 11;
        assert_ne!(query.fingerprint(), other.fingerprint());
    }

    #[test]
    fn test_paging_clamp() {
        assert_eq!(Paging::clamped(0, None, 100).limit, 100);
        assert_eq!(Paging::clamped(5, Some(500), 100), Paging { offset: 5, limit: 100 });
        assert_eq!(Paging::clamped(0, Some(7), 100).limit, 7);
    }
}
