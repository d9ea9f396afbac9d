//! Column metadata derived from the projection list

use docsql_ir::{DataType, Expression};
use serde::Serialize;

use crate::Row;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnMetadata {
    pub label: String,
    /// Document field the column reads, if any.
    pub source_field: Option<String>,
    pub data_type: DataType,
    pub nullable: bool,
    pub aggregate: bool,
}

/// Describes the columns of one result set, in projection order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultMetadata {
    columns: Vec<ColumnMetadata>,
}

impl ResultMetadata {
    /// Metadata for a projection list.
    ///
    /// Count columns are `BIGINT` and never null. Field columns start out as
    /// `VARCHAR` until a value has been observed for them.
    pub fn describe(expressions: &[Expression]) -> Self {
        let columns = expressions
            .iter()
            .map(|expr| ColumnMetadata {
                label: expr.result_name().to_string(),
                source_field: expr.source_field().map(str::to_string),
                data_type: if expr.is_count() {
                    DataType::BigInt
                } else {
                    DataType::Varchar
                },
                nullable: !expr.is_count(),
                aggregate: expr.is_count(),
            })
            .collect();
        Self { columns }
    }

    // Field column types come from the first non-null value in each column
    pub(crate) fn refine(&mut self, rows: &[Row]) {
        for (index, column) in self.columns.iter_mut().enumerate() {
            if column.aggregate {
                continue;
            }
            let observed = rows
                .iter()
                .filter_map(|row| row.get(index))
                .find(|value| !value.is_null());
            if let Some(value) = observed {
                column.data_type = DataType::infer(value);
            }
        }
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[ColumnMetadata] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> Option<&ColumnMetadata> {
        self.columns.get(index)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.label.as_str())
    }

    /// Index of the first column whose label matches, ignoring ASCII case.
    pub fn find_column(&self, label: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.label.eq_ignore_ascii_case(label))
    }
}
