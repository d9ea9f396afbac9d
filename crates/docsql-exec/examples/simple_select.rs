//! Simple example running a counted SELECT against an in-memory collection
//!
//! Demonstrates the full pipeline:
//! SQL text → AST → Command → rendered search request → documents → rows

use std::sync::Arc;

use docsql_exec::{ExecutionOptions, Session};
use docsql_ir::Command;
use docsql_memory::MemoryGateway;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Create an in-memory engine with sample documents
    println!("1. Creating in-memory collection...");
    let gateway = MemoryGateway::from_json(serde_json::json!({
        "users": [
            {"id": 1, "name": "Alice", "age": 30},
            {"id": 2, "name": "Bob", "age": 25},
            {"id": 3, "name": "Charlie", "age": 35}
        ]
    }))?;
    println!("   ✓ Created collection with 3 documents\n");

    let session = Session::new(Arc::new(gateway), ExecutionOptions::default());

    // 2. Translate SQL into a command
    let sql = "SELECT name, age, COUNT(*) AS total FROM users WHERE age >= 30 ORDER BY age DESC";
    println!("2. Translating SQL: {}", sql);
    let command = session.prepare(sql)?;
    if let Command::Select(select) = &command {
        let request = select.render();
        println!("   Search params: {:?}", request.to_params());
        println!("   Fingerprint: {}\n", request.fingerprint());
    }

    // 3. Execute and materialize
    println!("3. Executing...");
    let rows = session.execute_query(sql)?;
    println!("   ✓ Query executed\n");

    // 4. Display results
    println!("4. Results:");
    let columns: Vec<&str> = rows.metadata().column_names().collect();
    println!("   Columns: {:?}", columns);
    println!("   Rows: {}", rows.len());
    for (i, row) in rows.rows().iter().enumerate() {
        println!("   Row {}: {:?}", i + 1, row.values());
    }

    Ok(())
}
