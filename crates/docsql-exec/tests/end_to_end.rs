//! End-to-end statement execution tests
//!
//! Run SQL text through parsing, translation, a gateway and materialization,
//! using the canned `MockGateway` for exact engine responses and the
//! in-memory engine for realistic filtering, sorting and mutation.

use std::sync::Arc;
use std::time::Duration;

use docsql_exec::{ExecutionOptions, Session, StatementError, StatementResult};
use docsql_ir::{
    CommandError, DataType, DocumentList, MockGateway, NativeDocument, SearchGateway,
    TransportError, Value,
};
use docsql_memory::MemoryGateway;

fn mock_session(gateway: MockGateway) -> (Session, Arc<MockGateway>) {
    let gateway = Arc::new(gateway);
    (
        Session::new(gateway.clone(), ExecutionOptions::default()),
        gateway,
    )
}

fn library() -> Session {
    let gateway = MemoryGateway::from_json(serde_json::json!({
        "books": [
            {"id": "1", "title": "Dune", "author": "Herbert", "year": 1965, "rating": 4.3},
            {"id": "2", "title": "Neuromancer", "author": "Gibson", "year": 1984, "rating": 3.9},
            {"id": "3", "title": "Hyperion", "author": "Simmons", "year": 1989},
            {"id": "4", "title": "Snow Crash", "author": "Stephenson", "year": 1992, "rating": 4.0},
            {"id": "5", "title": "Count Zero", "author": "Gibson", "year": 1986, "rating": 3.8}
        ]
    }))
    .unwrap();
    Session::new(Arc::new(gateway), ExecutionOptions::default())
}

#[test]
fn test_count_over_three_of_seven_documents() {
    let page = DocumentList::new(
        vec![
            NativeDocument::new().with("a", "x"),
            NativeDocument::new().with("a", "y"),
            NativeDocument::new().with("a", "z"),
        ],
        7,
    );
    let (session, gateway) = mock_session(MockGateway::with_documents(page));

    let rows = session
        .execute_query("SELECT a, COUNT(*) AS n FROM t")
        .unwrap();

    assert_eq!(rows.len(), 3);
    for (row, expected) in rows.rows().iter().zip(["x", "y", "z"]) {
        assert_eq!(row.values(), &[Value::from(expected), Value::Int(7)]);
    }
    assert!(gateway.searches()[0].include_total);
}

#[test]
fn test_count_over_no_documents_yields_single_row() {
    let (session, gateway) = mock_session(MockGateway::new());

    let rows = session.execute_query("SELECT COUNT(*) AS n FROM t").unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows.value(0, "n"), Some(&Value::Int(0)));
    assert_eq!(rows.metadata().columns()[0].data_type, DataType::BigInt);
    assert_eq!(gateway.searches()[0].rows, 0);
}

#[test]
fn test_aliases_of_one_field() {
    let page = DocumentList::new(vec![NativeDocument::new().with("x", 5)], 1);
    let (session, _) = mock_session(MockGateway::with_documents(page));

    let rows = session.execute_query("SELECT x AS x1, x AS x2 FROM t").unwrap();

    assert_eq!(rows.value(0, "x1"), Some(&Value::Int(5)));
    assert_eq!(rows.value(0, "x2"), Some(&Value::Int(5)));
}

#[test]
fn test_update_through_query_entry_point_never_reaches_gateway() {
    let (session, gateway) = mock_session(MockGateway::new());

    let err = session
        .execute_query("UPDATE t SET a = 1 WHERE b = 2")
        .unwrap_err();

    assert!(matches!(
        err,
        StatementError::Command(CommandError::InvalidUsage { .. })
    ));
    assert_eq!(gateway.call_count(), 0);
}

#[test]
fn test_gateway_timeout_surfaces_without_rows() {
    let (session, _) = mock_session(MockGateway::failing(TransportError::Timeout(
        Duration::from_secs(30),
    )));

    let result = session.execute("SELECT a FROM t");

    match result {
        Err(StatementError::Command(CommandError::Execution(TransportError::Timeout(_)))) => {}
        other => panic!("expected timeout, got {:?}", other),
    }
}

#[test]
fn test_duplicate_names_fail_before_gateway() {
    let (session, gateway) = mock_session(MockGateway::new());

    let err = session.execute_query("SELECT a, c AS a FROM t").unwrap_err();

    assert_eq!(err.code(), "DUPLICATE_RESULT_NAME");
    assert_eq!(gateway.call_count(), 0);
}

#[test]
fn test_filters_sorts_and_pages_in_memory() {
    let session = library();

    let rows = session
        .execute_query(
            "SELECT title, year, COUNT(*) AS matches FROM books \
             WHERE year > 1980 AND author <> 'Stephenson' ORDER BY year DESC LIMIT 2",
        )
        .unwrap();

    let titles: Vec<&Value> = rows.rows().iter().filter_map(|r| r.get(0)).collect();
    assert_eq!(titles, vec![&Value::from("Hyperion"), &Value::from("Count Zero")]);
    assert_eq!(rows.value(1, "matches"), Some(&Value::Int(3)));
    assert_eq!(rows.metadata().columns()[1].data_type, DataType::BigInt);
}

#[test]
fn test_offset_page_reports_start() {
    let session = library();

    let rows = session
        .execute_query("SELECT title FROM books ORDER BY year LIMIT 2 OFFSET 3")
        .unwrap();

    assert_eq!(rows.start(), 3);
    assert_eq!(rows.num_found(), 5);
    let titles: Vec<&Value> = rows.rows().iter().filter_map(|r| r.get(0)).collect();
    assert_eq!(titles, vec![&Value::from("Hyperion"), &Value::from("Snow Crash")]);
}

#[test]
fn test_missing_fields_are_null_and_metadata_inferred() {
    let session = library();

    let rows = session
        .execute_query("SELECT title, rating FROM books WHERE title LIKE 'Hyp%' OR id = '1' ORDER BY 1")
        .unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows.value(0, "title"), Some(&Value::from("Dune")));
    assert_eq!(rows.value(1, "RATING"), Some(&Value::Null));
    assert_eq!(rows.metadata().columns()[1].data_type, DataType::Double);
    assert!(rows.metadata().columns()[1].nullable);
}

#[test]
fn test_wildcard_expands_from_documents() {
    let session = library();

    let rows = session
        .execute_query("SELECT * FROM books WHERE id IN ('3', '4')")
        .unwrap();

    let names: Vec<&str> = rows.metadata().column_names().collect();
    assert_eq!(names, vec!["id", "title", "author", "year", "rating"]);
    assert_eq!(rows.value(0, "rating"), Some(&Value::Null));
}

#[test]
fn test_mutations_report_affected_counts() {
    let session = library();

    let inserted = session
        .execute_update("INSERT INTO books (id, title, year) VALUES ('6', 'Anathem', 2008)")
        .unwrap();
    assert_eq!(inserted, 1);

    let updated = session
        .execute_update("UPDATE books SET rating = 4.1 WHERE rating IS NULL")
        .unwrap();
    assert_eq!(updated, 2);

    let deleted = session
        .execute("DELETE FROM books WHERE author = 'Gibson'")
        .unwrap();
    assert_eq!(deleted, StatementResult::UpdateCount(2));

    let rows = session.execute_query("SELECT COUNT(*) FROM books").unwrap();
    assert_eq!(rows.value(0, "count"), Some(&Value::Int(4)));
}

#[test]
fn test_batch_reports_each_statement() {
    let session = library();

    let outcome = session.execute_batch(vec![
        "DELETE FROM books WHERE year < 1970".to_string(),
        "DELETE FROM films".to_string(),
        "SELECT title FROM books".to_string(),
        "UPDATE books SET year = 1990 WHERE id = '3'".to_string(),
    ]);

    assert_eq!(outcome.update_counts(), vec![Some(1), None, None, Some(1)]);
    let codes: Vec<&str> = outcome
        .results()
        .iter()
        .filter_map(|r| r.as_ref().err())
        .map(StatementError::code)
        .collect();
    assert_eq!(codes, vec!["EXECUTION_REMOTE", "INVALID_COMMAND_USAGE"]);
}

#[test]
fn test_sessions_share_a_gateway_across_threads() {
    let gateway: Arc<dyn SearchGateway> = Arc::new(
        MemoryGateway::from_json(serde_json::json!({"t": [{"a": 1}, {"a": 2}]})).unwrap(),
    );
    let session = Arc::new(Session::new(gateway, ExecutionOptions::default()));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let session = Arc::clone(&session);
            std::thread::spawn(move || session.execute_query("SELECT COUNT(*) AS n FROM t"))
        })
        .collect();

    for handle in handles {
        let rows = handle.join().unwrap().unwrap();
        assert_eq!(rows.value(0, "n"), Some(&Value::Int(2)));
    }
}
