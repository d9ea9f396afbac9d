//! Native search documents as returned by the engine

use serde::{Deserialize, Serialize};

use crate::Value;

/// One schema-less record: field names mapped to values, in engine order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NativeDocument {
    fields: Vec<(String, Value)>,
}

impl NativeDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a field. Presence varies from document to document.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    /// Set a field, replacing an existing value in place.
    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        let field = field.into();
        match self.fields.iter_mut().find(|(name, _)| *name == field) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((field, value)),
        }
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value.into());
        self
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Keep only the listed fields, in their original order.
    pub fn project(&self, fields: &[String]) -> NativeDocument {
        NativeDocument {
            fields: self
                .fields
                .iter()
                .filter(|(name, _)| fields.iter().any(|f| f == name))
                .cloned()
                .collect(),
        }
    }

    /// Build a document from a JSON object. Non-object input yields `None`.
    pub fn from_json(json: serde_json::Value) -> Option<Self> {
        match json {
            serde_json::Value::Object(map) => Some(NativeDocument {
                fields: map.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
            }),
            _ => None,
        }
    }
}

impl FromIterator<(String, Value)> for NativeDocument {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut doc = NativeDocument::new();
        for (field, value) in iter {
            doc.set(field, value);
        }
        doc
    }
}

/// One page of search results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentList {
    pub documents: Vec<NativeDocument>,
    /// Total documents matching the filter; may exceed `documents.len()`.
    pub num_found: u64,
    /// Offset of the first returned document within all matches.
    pub start: u64,
}

impl DocumentList {
    pub fn new(documents: Vec<NativeDocument>, num_found: u64) -> Self {
        Self {
            documents,
            num_found,
            start: 0,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_replaces_in_place() {
        let mut doc = NativeDocument::new().with("a", 1).with("b", "x");
        doc.set("a", Value::Int(5));

        assert_eq!(doc.get("a"), Some(&Value::Int(5)));
        assert_eq!(doc.field_names().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(doc.get("missing"), None);
    }

    #[test]
    fn test_project_keeps_order() {
        let doc = NativeDocument::new().with("a", 1).with("b", 2).with("c", 3);
        let projected = doc.project(&["c".to_string(), "a".to_string()]);

        assert_eq!(projected.field_names().collect::<Vec<_>>(), vec!["a", "c"]);
    }

    #[test]
    fn test_from_json() {
        let doc = NativeDocument::from_json(serde_json::json!({"id": "1", "n": 2})).unwrap();
        assert_eq!(doc.get("n"), Some(&Value::Int(2)));
        assert!(NativeDocument::from_json(serde_json::json!([1])).is_none());
    }
}
