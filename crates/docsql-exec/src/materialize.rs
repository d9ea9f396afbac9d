//! Native documents to relational rows

use docsql_ir::{DocumentList, Expression, NativeDocument, Value};
use serde::Serialize;

use crate::ResultMetadata;

/// One relational row: a value per projected column, in projection order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Immutable tabular result of a query.
#[derive(Debug, Clone, PartialEq)]
pub struct RowSet {
    metadata: ResultMetadata,
    rows: Vec<Row>,
    num_found: u64,
    start: u64,
}

impl RowSet {
    pub fn metadata(&self) -> &ResultMetadata {
        &self.metadata
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Total documents matching the filter, as reported by the engine.
    pub fn num_found(&self) -> u64 {
        self.num_found
    }

    /// Offset of the first row within all matches.
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Value of a column by label (case-insensitive).
    pub fn value(&self, row: usize, label: &str) -> Option<&Value> {
        let column = self.metadata.find_column(label)?;
        self.rows.get(row)?.get(column)
    }

    /// API form: column descriptors, rows as objects keyed by label, and the row count.
    pub fn to_json(&self) -> serde_json::Value {
        let columns: Vec<serde_json::Value> = self
            .metadata
            .columns()
            .iter()
            .map(|c| {
                serde_json::json!({
                    "name": c.label,
                    "type": c.data_type.sql_name(),
                    "nullable": c.nullable,
                })
            })
            .collect();

        let rows: Vec<serde_json::Value> = self
            .rows
            .iter()
            .map(|row| {
                let object: serde_json::Map<String, serde_json::Value> = self
                    .metadata
                    .column_names()
                    .zip(row.values())
                    .map(|(name, value)| (name.to_string(), value.to_json()))
                    .collect();
                serde_json::Value::Object(object)
            })
            .collect();

        serde_json::json!({
            "columns": columns,
            "rows": rows,
            "row_count": self.rows.len(),
            "num_found": self.num_found,
            "start": self.start,
        })
    }
}

/// Shape one page of documents into rows.
///
/// Count columns carry the engine's total-match count on every row. When a
/// count is projected over an empty page, a single row is synthesized so the
/// aggregate is still reported.
pub fn materialize(documents: &DocumentList, expressions: &[Expression]) -> RowSet {
    let has_count = expressions.iter().any(Expression::is_count);
    let total = Value::Int(i64::try_from(documents.num_found).unwrap_or(i64::MAX));

    let synthesized = [NativeDocument::new()];
    let basis: &[NativeDocument] = if has_count && documents.is_empty() {
        &synthesized
    } else {
        &documents.documents
    };

    let rows: Vec<Row> = basis
        .iter()
        .map(|doc| {
            let values = expressions
                .iter()
                .map(|expr| {
                    if expr.is_count() {
                        return total.clone();
                    }
                    expr.source_field()
                        .and_then(|field| doc.get(field))
                        .cloned()
                        .unwrap_or(Value::Null)
                })
                .collect();
            Row::new(values)
        })
        .collect();

    let mut metadata = ResultMetadata::describe(expressions);
    metadata.refine(&rows);

    RowSet {
        metadata,
        rows,
        num_found: documents.num_found,
        start: documents.start,
    }
}
