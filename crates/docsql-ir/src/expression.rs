//! Projected output columns

use serde::{Deserialize, Serialize};

/// Result name given to an unaliased count aggregate.
pub const COUNT_RESULT_NAME: &str = "COUNT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Aggregate {
    /// Total number of documents matching the filter, as reported by the engine.
    Count,
}

/// One projected output column of a query.
///
/// Field projections read `source_field` from every document. Aggregate
/// columns are computed once per query and stamped onto every row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expression {
    source_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    aggregate: Option<Aggregate>,
    result_name: String,
}

impl Expression {
    /// Plain field projection, named after the field.
    pub fn field(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            result_name: name.clone(),
            source_field: Some(name),
            aggregate: None,
        }
    }

    /// `COUNT(*)`.
    pub fn count() -> Self {
        Self {
            source_field: None,
            aggregate: Some(Aggregate::Count),
            result_name: COUNT_RESULT_NAME.to_string(),
        }
    }

    /// `COUNT(field)`; still reports the engine's total-match count.
    pub fn count_of(field: impl Into<String>) -> Self {
        Self {
            source_field: Some(field.into()),
            aggregate: Some(Aggregate::Count),
            result_name: COUNT_RESULT_NAME.to_string(),
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.result_name = alias.into();
        self
    }

    pub fn source_field(&self) -> Option<&str> {
        self.source_field.as_deref()
    }

    pub fn aggregate(&self) -> Option<Aggregate> {
        self.aggregate
    }

    pub fn is_count(&self) -> bool {
        self.aggregate == Some(Aggregate::Count)
    }

    pub fn result_name(&self) -> &str {
        &self.result_name
    }
}

/// First result name that appears more than once, if any.
///
/// Names are compared case-insensitively, matching column lookup by label.
pub fn duplicate_result_name(expressions: &[Expression]) -> Option<&str> {
    let mut seen = std::collections::HashSet::new();
    expressions
        .iter()
        .map(Expression::result_name)
        .find(|name| !seen.insert(name.to_ascii_lowercase()))
}
