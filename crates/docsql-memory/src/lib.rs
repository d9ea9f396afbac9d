//! In-process search engine implementing [`SearchGateway`]
//!
//! Holds named collections of documents behind a reader-writer lock, so
//! searches run concurrently and mutations are serialized.

mod eval;

use std::collections::BTreeMap;
use std::path::Path;
use std::thread;
use std::time::Duration;

use docsql_ir::{
    DocumentList, NativeDocument, Predicate, RenderedMutation, RenderedQuery, SearchGateway,
    TransportError,
};
use parking_lot::RwLock;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Failed to read seed file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse seed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid seed: {0}")]
    Shape(String),
}

#[derive(Default)]
pub struct MemoryGateway {
    collections: RwLock<BTreeMap<String, Vec<NativeDocument>>>,
    latency: Option<Duration>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulated round-trip time added to every request.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Create an empty collection; existing documents are kept.
    pub fn create_collection(&self, name: impl Into<String>) {
        self.collections.write().entry(name.into()).or_default();
    }

    pub fn insert_documents(
        &self,
        name: impl Into<String>,
        documents: impl IntoIterator<Item = NativeDocument>,
    ) {
        self.collections
            .write()
            .entry(name.into())
            .or_default()
            .extend(documents);
    }

    pub fn collection_names(&self) -> Vec<String> {
        self.collections.read().keys().cloned().collect()
    }

    /// Number of documents in a collection, if it exists.
    pub fn document_count(&self, name: &str) -> Option<usize> {
        self.collections.read().get(name).map(Vec::len)
    }

    /// Build from a JSON object mapping collection names to arrays of documents.
    pub fn from_json(seed: serde_json::Value) -> Result<Self, SeedError> {
        let serde_json::Value::Object(map) = seed else {
            return Err(SeedError::Shape(
                "expected an object of collections".to_string(),
            ));
        };

        let gateway = Self::new();
        for (name, docs) in map {
            let serde_json::Value::Array(items) = docs else {
                return Err(SeedError::Shape(format!(
                    "collection '{}' is not an array",
                    name
                )));
            };
            let documents = items
                .into_iter()
                .map(|item| {
                    NativeDocument::from_json(item).ok_or_else(|| {
                        SeedError::Shape(format!("non-object document in '{}'", name))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            gateway.insert_documents(name, documents);
        }
        Ok(gateway)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SeedError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let gateway = Self::from_json(serde_json::from_str(&content)?)?;
        info!(
            path = %path.display(),
            collections = gateway.collection_names().len(),
            "Loaded seed collections"
        );
        Ok(gateway)
    }

    fn simulate_latency(&self, timeout: Duration) -> Result<(), TransportError> {
        let Some(latency) = self.latency else {
            return Ok(());
        };
        if latency > timeout {
            thread::sleep(timeout);
            return Err(TransportError::Timeout(timeout));
        }
        thread::sleep(latency);
        Ok(())
    }
}

fn unknown_collection(name: &str) -> TransportError {
    TransportError::Remote {
        status: 404,
        message: format!("collection '{}' not found", name),
    }
}

fn matches_filter(filter: Option<&Predicate>, doc: &NativeDocument) -> bool {
    filter.map_or(true, |p| eval::matches(p, doc))
}

impl SearchGateway for MemoryGateway {
    fn search(
        &self,
        request: &RenderedQuery,
        timeout: Duration,
    ) -> Result<DocumentList, TransportError> {
        self.simulate_latency(timeout)?;

        let collections = self.collections.read();
        let documents = collections
            .get(&request.collection)
            .ok_or_else(|| unknown_collection(&request.collection))?;

        let mut hits: Vec<&NativeDocument> = documents
            .iter()
            .filter(|doc| matches_filter(request.filter.as_ref(), doc))
            .collect();
        let num_found = hits.len() as u64;

        if !request.sort.is_empty() {
            hits.sort_by(|a, b| {
                request
                    .sort
                    .iter()
                    .map(|key| eval::compare_for_sort(a, b, &key.field, key.desc))
                    .find(|ord| ord.is_ne())
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }

        let start = usize::try_from(request.start).unwrap_or(usize::MAX);
        let rows = usize::try_from(request.rows).unwrap_or(usize::MAX);
        let page: Vec<NativeDocument> = hits
            .into_iter()
            .skip(start)
            .take(rows)
            .map(|doc| {
                if request.fields.is_empty() {
                    doc.clone()
                } else {
                    doc.project(&request.fields)
                }
            })
            .collect();

        debug!(
            collection = %request.collection,
            num_found,
            returned = page.len(),
            "Memory search"
        );

        Ok(DocumentList {
            documents: page,
            num_found,
            start: request.start,
        })
    }

    fn mutate(
        &self,
        request: &RenderedMutation,
        timeout: Duration,
    ) -> Result<u64, TransportError> {
        self.simulate_latency(timeout)?;

        let mut collections = self.collections.write();
        let collection = request.collection();
        let documents = collections
            .get_mut(collection)
            .ok_or_else(|| unknown_collection(collection))?;

        let affected = match request {
            RenderedMutation::Add { documents: added, .. } => {
                documents.extend(added.iter().cloned());
                added.len()
            }
            RenderedMutation::Update {
                filter,
                assignments,
                ..
            } => {
                let mut updated = 0;
                for doc in documents
                    .iter_mut()
                    .filter(|doc| matches_filter(filter.as_ref(), doc))
                {
                    for assignment in assignments {
                        doc.set(assignment.field.clone(), assignment.value.clone());
                    }
                    updated += 1;
                }
                updated
            }
            RenderedMutation::Delete { filter, .. } => {
                let before = documents.len();
                documents.retain(|doc| !matches_filter(filter.as_ref(), doc));
                before - documents.len()
            }
        };

        debug!(
            collection,
            op = request.op_name(),
            affected,
            "Memory mutation"
        );
        Ok(affected as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsql_ir::{Assignment, CompareOp, SortKey, Value};

    const TIMEOUT: Duration = Duration::from_secs(1);

    fn gateway() -> MemoryGateway {
        MemoryGateway::from_json(serde_json::json!({
            "books": [
                {"id": "1", "title": "Dune", "year": 1965},
                {"id": "2", "title": "Neuromancer", "year": 1984},
                {"id": "3", "title": "Hyperion"},
                {"id": "4", "title": "Snow Crash", "year": 1992}
            ]
        }))
        .unwrap()
    }

    fn query(filter: Option<Predicate>) -> RenderedQuery {
        RenderedQuery {
            collection: "books".into(),
            filter,
            fields: vec![],
            sort: vec![],
            start: 0,
            rows: 10,
            include_total: true,
        }
    }

    #[test]
    fn test_search_filters_and_counts() {
        let gw = gateway();
        let result = gw
            .search(
                &query(Some(Predicate::compare("year", CompareOp::Gt, 1970))),
                TIMEOUT,
            )
            .unwrap();

        assert_eq!(result.num_found, 2);
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn test_sort_page_and_project() {
        let gw = gateway();
        let mut request = query(None);
        request.sort = vec![SortKey::desc("year")];
        request.start = 1;
        request.rows = 2;
        request.fields = vec!["title".into()];

        let result = gw.search(&request, TIMEOUT).unwrap();
        let titles: Vec<_> = result
            .documents
            .iter()
            .map(|d| d.get("title").cloned())
            .collect();

        assert_eq!(result.num_found, 4);
        assert_eq!(
            titles,
            vec![Some(Value::from("Neuromancer")), Some(Value::from("Dune"))]
        );
        assert_eq!(result.documents[0].len(), 1);
    }

    #[test]
    fn test_rows_zero_still_counts() {
        let gw = gateway();
        let mut request = query(None);
        request.rows = 0;

        let result = gw.search(&request, TIMEOUT).unwrap();
        assert!(result.is_empty());
        assert_eq!(result.num_found, 4);
    }

    #[test]
    fn test_unknown_collection() {
        let gw = gateway();
        let mut request = query(None);
        request.collection = "films".into();

        let err = gw.search(&request, TIMEOUT).unwrap_err();
        assert!(matches!(err, TransportError::Remote { status: 404, .. }));
    }

    #[test]
    fn test_mutations() {
        let gw = gateway();

        let added = gw
            .mutate(
                &RenderedMutation::Add {
                    collection: "books".into(),
                    documents: vec![NativeDocument::new().with("id", "5")],
                },
                TIMEOUT,
            )
            .unwrap();
        assert_eq!(added, 1);

        let updated = gw
            .mutate(
                &RenderedMutation::Update {
                    collection: "books".into(),
                    filter: Some(Predicate::IsNull {
                        field: "year".into(),
                        negated: false,
                    }),
                    assignments: vec![Assignment {
                        field: "year".into(),
                        value: Value::Int(1989),
                    }],
                },
                TIMEOUT,
            )
            .unwrap();
        assert_eq!(updated, 2);

        let deleted = gw
            .mutate(
                &RenderedMutation::Delete {
                    collection: "books".into(),
                    filter: None,
                },
                TIMEOUT,
            )
            .unwrap();
        assert_eq!(deleted, 5);
        assert_eq!(gw.document_count("books"), Some(0));
    }

    #[test]
    fn test_latency_beyond_timeout() {
        let gw = gateway().with_latency(Duration::from_millis(200));
        let err = gw
            .search(&query(None), Duration::from_millis(10))
            .unwrap_err();
        assert_eq!(err, TransportError::Timeout(Duration::from_millis(10)));
    }

    #[test]
    fn test_invalid_seed() {
        assert!(matches!(
            MemoryGateway::from_json(serde_json::json!([1, 2])),
            Err(SeedError::Shape(_))
        ));
        assert!(matches!(
            MemoryGateway::from_json(serde_json::json!({"books": [1]})),
            Err(SeedError::Shape(_))
        ));
    }
}
