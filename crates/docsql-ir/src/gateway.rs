//! Search gateway boundary
//!
//! The gateway owns the transport to the search engine: connections, retries
//! and its own concurrency discipline. The core only submits rendered requests
//! and receives documents or affected counts, passing the statement timeout
//! explicitly on every call.

use parking_lot::Mutex;
use std::time::Duration;
use thiserror::Error;

use crate::{DocumentList, RenderedMutation, RenderedQuery};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("remote error ({status}): {message}")]
    Remote { status: u16, message: String },
}

impl TransportError {
    /// Stable reason code.
    pub fn code(&self) -> &'static str {
        match self {
            TransportError::Timeout(_) => "EXECUTION_TIMEOUT",
            TransportError::Connection(_) => "EXECUTION_CONNECTION",
            TransportError::MalformedResponse(_) => "EXECUTION_MALFORMED_RESPONSE",
            TransportError::Remote { .. } => "EXECUTION_REMOTE",
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout(_))
    }
}

/// Synchronous access to a search engine.
pub trait SearchGateway: Send + Sync {
    /// Run a search and return one page of documents plus the total-match count.
    fn search(
        &self,
        request: &RenderedQuery,
        timeout: Duration,
    ) -> Result<DocumentList, TransportError>;

    /// Apply a mutation and return the number of affected documents.
    fn mutate(&self, request: &RenderedMutation, timeout: Duration)
        -> Result<u64, TransportError>;
}

/// Gateway stub for testing: returns canned responses and records every request.
pub struct MockGateway {
    search_response: Result<DocumentList, TransportError>,
    mutate_response: Result<u64, TransportError>,
    searches: Mutex<Vec<RenderedQuery>>,
    mutations: Mutex<Vec<RenderedMutation>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            search_response: Ok(DocumentList::empty()),
            mutate_response: Ok(0),
            searches: Mutex::new(Vec::new()),
            mutations: Mutex::new(Vec::new()),
        }
    }

    pub fn with_documents(documents: DocumentList) -> Self {
        Self {
            search_response: Ok(documents),
            ..Self::new()
        }
    }

    pub fn with_affected(count: u64) -> Self {
        Self {
            mutate_response: Ok(count),
            ..Self::new()
        }
    }

    /// Every request fails with `error`.
    pub fn failing(error: TransportError) -> Self {
        Self {
            search_response: Err(error.clone()),
            mutate_response: Err(error),
            ..Self::new()
        }
    }

    pub fn searches(&self) -> Vec<RenderedQuery> {
        self.searches.lock().clone()
    }

    pub fn mutations(&self) -> Vec<RenderedMutation> {
        self.mutations.lock().clone()
    }

    /// Total number of requests received.
    pub fn call_count(&self) -> usize {
        self.searches.lock().len() + self.mutations.lock().len()
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchGateway for MockGateway {
    fn search(
        &self,
        request: &RenderedQuery,
        _timeout: Duration,
    ) -> Result<DocumentList, TransportError> {
        self.searches.lock().push(request.clone());
        self.search_response.clone()
    }

    fn mutate(
        &self,
        request: &RenderedMutation,
        _timeout: Duration,
    ) -> Result<u64, TransportError> {
        self.mutations.lock().push(request.clone());
        self.mutate_response.clone()
    }
}
