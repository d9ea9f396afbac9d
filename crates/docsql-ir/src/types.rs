//! Column type system for relational results

use serde::{Deserialize, Serialize};

use crate::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Boolean,
    BigInt,
    Double,
    Varchar,
    Timestamp,
    Array,

    // Not yet observed in any document
    Unknown,
}

impl DataType {
    /// Best-effort type of a single document value.
    ///
    /// Search engines return dates as ISO-8601 strings, so strings that parse
    /// as RFC 3339 timestamps are reported as `Timestamp`.
    pub fn infer(value: &Value) -> DataType {
        match value {
            Value::Null => DataType::Unknown,
            Value::Bool(_) => DataType::Boolean,
            Value::Int(_) => DataType::BigInt,
            Value::Float(_) => DataType::Double,
            Value::String(s) => {
                if chrono::DateTime::parse_from_rfc3339(s).is_ok() {
                    DataType::Timestamp
                } else {
                    DataType::Varchar
                }
            }
            Value::Array(_) => DataType::Array,
        }
    }

    /// SQL type name reported in result metadata.
    pub fn sql_name(&self) -> &'static str {
        match self {
            DataType::Boolean => "BOOLEAN",
            DataType::BigInt => "BIGINT",
            DataType::Double => "DOUBLE",
            DataType::Varchar => "VARCHAR",
            DataType::Timestamp => "TIMESTAMP",
            DataType::Array => "ARRAY",
            DataType::Unknown => "UNKNOWN",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_timestamp_strings() {
        assert_eq!(
            DataType::infer(&Value::String("2024-03-01T10:00:00Z".into())),
            DataType::Timestamp
        );
        assert_eq!(DataType::infer(&Value::String("hello".into())), DataType::Varchar);
        assert_eq!(DataType::infer(&Value::Int(3)), DataType::BigInt);
        assert_eq!(DataType::infer(&Value::Null), DataType::Unknown);
    }
}
