//! Statement execution entry point

use std::sync::Arc;
use std::time::{Duration, Instant};

use docsql_ir::{Command, CommandError, SearchGateway};
use docsql_sql::{parse, ParseError, TranslateOptions, TranslationError, Translator};
use thiserror::Error;
use tracing::{info, warn};

use crate::{materialize, RowSet};

#[derive(Debug, Error)]
pub enum StatementError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Translation(#[from] TranslationError),

    #[error(transparent)]
    Command(#[from] CommandError),
}

impl StatementError {
    /// Stable reason code of the underlying failure.
    pub fn code(&self) -> &'static str {
        match self {
            StatementError::Parse(err) => err.code(),
            StatementError::Translation(err) => err.code(),
            StatementError::Command(err) => err.code(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, StatementError::Command(err) if err.is_timeout())
    }
}

/// Per-session execution settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionOptions {
    /// Bound on every gateway round-trip.
    pub timeout: Duration,
    pub max_page_size: u64,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_page_size: docsql_sql::DEFAULT_MAX_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatementResult {
    Rows(RowSet),
    UpdateCount(u64),
}

/// Per-statement results of a batch, in submission order.
#[derive(Debug)]
pub struct BatchOutcome {
    results: Vec<Result<u64, StatementError>>,
}

impl BatchOutcome {
    pub fn results(&self) -> &[Result<u64, StatementError>] {
        &self.results
    }

    pub fn into_results(self) -> Vec<Result<u64, StatementError>> {
        self.results
    }

    pub fn has_failures(&self) -> bool {
        self.results.iter().any(Result::is_err)
    }

    /// Affected counts, `None` where the statement failed.
    pub fn update_counts(&self) -> Vec<Option<u64>> {
        self.results.iter().map(|r| r.as_ref().ok().copied()).collect()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Executes SQL statements against one search gateway.
///
/// A session holds no per-statement state: every call builds its own
/// [`Command`], so a shared session can serve concurrent callers.
pub struct Session {
    gateway: Arc<dyn SearchGateway>,
    translator: Translator,
    options: ExecutionOptions,
}

impl Session {
    pub fn new(gateway: Arc<dyn SearchGateway>, options: ExecutionOptions) -> Self {
        let translator = Translator::new(TranslateOptions {
            max_page_size: options.max_page_size,
        });
        Self {
            gateway,
            translator,
            options,
        }
    }

    pub fn options(&self) -> ExecutionOptions {
        self.options
    }

    /// Parse and translate without touching the gateway.
    pub fn prepare(&self, sql: &str) -> Result<Command, StatementError> {
        let statement = parse(sql)?;
        Ok(self.translator.translate(&statement)?)
    }

    /// Run any supported statement, returning rows for queries and a count for mutations.
    pub fn execute(&self, sql: &str) -> Result<StatementResult, StatementError> {
        let command = self.prepare(sql)?;
        self.run(&command)
    }

    /// Run an already prepared command through the matching entry point.
    pub fn run(&self, command: &Command) -> Result<StatementResult, StatementError> {
        if command.is_query() {
            Ok(StatementResult::Rows(self.run_query(command)?))
        } else {
            Ok(StatementResult::UpdateCount(self.run_update(command)?))
        }
    }

    pub fn execute_query(&self, sql: &str) -> Result<RowSet, StatementError> {
        let command = self.prepare(sql)?;
        self.run_query(&command)
    }

    pub fn execute_update(&self, sql: &str) -> Result<u64, StatementError> {
        let command = self.prepare(sql)?;
        self.run_update(&command)
    }

    /// Run each statement as an update, continuing past failures.
    pub fn execute_batch<I, S>(&self, statements: I) -> BatchOutcome
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let results: Vec<Result<u64, StatementError>> = statements
            .into_iter()
            .enumerate()
            .map(|(index, sql)| {
                let result = self.execute_update(sql.as_ref());
                if let Err(err) = &result {
                    warn!(index, code = err.code(), error = %err, "Batch statement failed");
                }
                result
            })
            .collect();

        let outcome = BatchOutcome { results };
        info!(
            statements = outcome.len(),
            failures = outcome.results.iter().filter(|r| r.is_err()).count(),
            "Batch executed"
        );
        outcome
    }

    /// Run a prepared command as a query.
    pub fn run_query(&self, command: &Command) -> Result<RowSet, StatementError> {
        let started = Instant::now();
        let output = command.execute_query(self.gateway.as_ref(), self.options.timeout)?;
        let rows = materialize(&output.documents, &output.expressions);

        info!(
            collection = command.collection(),
            rows = rows.len(),
            num_found = rows.num_found(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Query executed"
        );
        Ok(rows)
    }

    /// Run a prepared command as a mutation.
    pub fn run_update(&self, command: &Command) -> Result<u64, StatementError> {
        let started = Instant::now();
        let affected = command.execute_update(self.gateway.as_ref(), self.options.timeout)?;

        info!(
            kind = %command.kind(),
            collection = command.collection(),
            affected,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Update executed"
        );
        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsql_ir::{DocumentList, MockGateway, NativeDocument, TransportError, Value};

    fn session_with(gateway: MockGateway) -> (Session, Arc<MockGateway>) {
        let gateway = Arc::new(gateway);
        let session = Session::new(gateway.clone(), ExecutionOptions::default());
        (session, gateway)
    }

    #[test]
    fn test_execute_dispatches_on_kind() {
        let (session, _) = session_with(MockGateway::with_documents(DocumentList::new(
            vec![NativeDocument::new().with("a", 1)],
            1,
        )));
        let result = session.execute("SELECT a FROM t").unwrap();
        assert!(matches!(result, StatementResult::Rows(ref rows) if rows.len() == 1));

        let (session, _) = session_with(MockGateway::with_affected(2));
        let result = session.execute("DELETE FROM t WHERE a = 1").unwrap();
        assert_eq!(result, StatementResult::UpdateCount(2));
    }

    #[test]
    fn test_wrong_entry_point_is_invalid_usage() {
        let (session, gateway) = session_with(MockGateway::new());

        let err = session.execute_query("UPDATE t SET a = 1").unwrap_err();
        assert_eq!(err.code(), "INVALID_COMMAND_USAGE");

        let err = session.execute_update("SELECT a FROM t").unwrap_err();
        assert_eq!(err.code(), "INVALID_COMMAND_USAGE");
        assert_eq!(gateway.call_count(), 0);
    }

    #[test]
    fn test_timeout_passed_to_gateway_and_surfaced() {
        let (session, _) = session_with(MockGateway::failing(TransportError::Timeout(
            Duration::from_secs(30),
        )));
        let err = session.execute_query("SELECT COUNT(*) FROM t").unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(err.code(), "EXECUTION_TIMEOUT");
    }

    #[test]
    fn test_page_size_option_flows_into_request() {
        let gateway = Arc::new(MockGateway::new());
        let session = Session::new(
            gateway.clone(),
            ExecutionOptions {
                timeout: Duration::from_secs(5),
                max_page_size: 25,
            },
        );
        session.execute_query("SELECT a FROM t LIMIT 1000").unwrap();
        assert_eq!(gateway.searches()[0].rows, 25);
    }

    #[test]
    fn test_batch_continues_past_failures() {
        let (session, gateway) = session_with(MockGateway::with_affected(1));
        let outcome = session.execute_batch([
            "INSERT INTO t (a) VALUES (1)",
            "DROP TABLE t",
            "UPDATE t SET a = 2 WHERE a = 1",
        ]);

        assert!(outcome.has_failures());
        assert_eq!(outcome.update_counts(), vec![Some(1), None, Some(1)]);
        assert_eq!(
            outcome.results()[1].as_ref().unwrap_err().code(),
            "UNSUPPORTED_STATEMENT"
        );
        assert_eq!(gateway.mutations().len(), 2);
    }

    #[test]
    fn test_prepared_command_runs_once_per_call() {
        let (session, gateway) = session_with(MockGateway::with_affected(3));
        let command = session.prepare("DELETE FROM t WHERE a > 1").unwrap();
        assert_eq!(gateway.call_count(), 0);

        assert_eq!(session.run(&command).unwrap(), StatementResult::UpdateCount(3));
        assert_eq!(session.run(&command).unwrap(), StatementResult::UpdateCount(3));
        assert_eq!(gateway.mutations().len(), 2);
    }

    #[test]
    fn test_prepare_reports_parse_errors() {
        let (session, _) = session_with(MockGateway::new());
        let err = session.prepare("SELEC a").unwrap_err();
        assert!(matches!(err, StatementError::Parse(_)));

        let rows = session.execute_query("SELECT COUNT(*) AS n FROM t").unwrap();
        assert_eq!(rows.value(0, "n"), Some(&Value::Int(0)));
    }
}
