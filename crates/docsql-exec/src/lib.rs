//! Statement execution over a search gateway
//!
//! [`Session`] is the entry point: it parses and translates SQL text, runs
//! the resulting command through a [`docsql_ir::SearchGateway`] and shapes the
//! returned documents into relational rows with [`ResultMetadata`].

mod materialize;
mod metadata;
mod statement;

pub use materialize::{materialize, Row, RowSet};
pub use metadata::{ColumnMetadata, ResultMetadata};
pub use statement::{BatchOutcome, ExecutionOptions, Session, StatementError, StatementResult};
