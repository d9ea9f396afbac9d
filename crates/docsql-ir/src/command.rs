//! Per-statement commands
//!
//! A [`Command`] is built once per statement by the translator, renders itself
//! into a gateway request and is discarded after execution. Statement kinds
//! form a closed enum so both entry points match every kind explicitly.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::{
    Assignment, DocumentList, Expression, NativeDocument, Paging, Predicate, RenderedMutation,
    RenderedQuery, SearchGateway, SortKey, TransportError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
}

impl StatementKind {
    /// Leading SQL keyword.
    pub fn as_str(&self) -> &'static str {
        match self {
            StatementKind::Select => "SELECT",
            StatementKind::Insert => "INSERT",
            StatementKind::Update => "UPDATE",
            StatementKind::Delete => "DELETE",
        }
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("invalid command usage: {method} cannot run a {kind} statement")]
    InvalidUsage {
        kind: StatementKind,
        method: &'static str,
    },

    #[error("execution failed: {0}")]
    Execution(#[from] TransportError),
}

impl CommandError {
    /// Stable reason code.
    pub fn code(&self) -> &'static str {
        match self {
            CommandError::InvalidUsage { .. } => "INVALID_COMMAND_USAGE",
            CommandError::Execution(err) => err.code(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, CommandError::Execution(err) if err.is_timeout())
    }
}

/// Projection list of a SELECT.
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// `SELECT *`: resolved from the returned documents.
    All,
    Columns(Vec<Expression>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectCommand {
    pub collection: String,
    pub projection: Projection,
    pub filter: Option<Predicate>,
    pub sort: Vec<SortKey>,
    pub paging: Paging,
}

impl SelectCommand {
    /// Expressions known before execution; empty for `SELECT *`.
    pub fn expressions(&self) -> &[Expression] {
        match &self.projection {
            Projection::All => &[],
            Projection::Columns(exprs) => exprs,
        }
    }

    fn has_count(&self) -> bool {
        self.expressions().iter().any(Expression::is_count)
    }

    fn count_only(&self) -> bool {
        let exprs = self.expressions();
        !exprs.is_empty() && exprs.iter().all(Expression::is_count)
    }

    pub fn render(&self) -> RenderedQuery {
        let mut fields: Vec<String> = Vec::new();
        for expr in self.expressions().iter().filter(|e| !e.is_count()) {
            if let Some(field) = expr.source_field() {
                if !fields.iter().any(|f| f == field) {
                    fields.push(field.to_string());
                }
            }
        }

        RenderedQuery {
            collection: self.collection.clone(),
            filter: self.filter.clone(),
            fields,
            sort: self.sort.clone(),
            start: self.paging.offset,
            // A pure aggregate needs the total only, never the documents
            rows: if self.count_only() { 0 } else { self.paging.limit },
            include_total: self.has_count(),
        }
    }

    fn execute(
        &self,
        gateway: &dyn SearchGateway,
        timeout: Duration,
    ) -> Result<QueryOutput, CommandError> {
        let request = self.render();
        debug!(
            collection = %request.collection,
            q = %request.query_string(),
            rows = request.rows,
            fingerprint = %request.fingerprint(),
            "Dispatching search"
        );

        let documents = gateway.search(&request, timeout)?;

        let expressions = match &self.projection {
            Projection::Columns(exprs) => exprs.clone(),
            Projection::All => wildcard_expressions(&documents),
        };

        Ok(QueryOutput {
            documents,
            expressions,
        })
    }
}

// Union of field names across the page, in first-seen order
fn wildcard_expressions(documents: &DocumentList) -> Vec<Expression> {
    let mut names: Vec<&str> = Vec::new();
    for doc in &documents.documents {
        for name in doc.field_names() {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    names.into_iter().map(Expression::field).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertCommand {
    pub collection: String,
    pub documents: Vec<NativeDocument>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateCommand {
    pub collection: String,
    pub assignments: Vec<Assignment>,
    pub filter: Option<Predicate>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteCommand {
    pub collection: String,
    pub filter: Option<Predicate>,
}

/// Result of running a query command: the raw page and the expressions used to project it.
#[derive(Debug, Clone)]
pub struct QueryOutput {
    pub documents: DocumentList,
    pub expressions: Vec<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Select(SelectCommand),
    Insert(InsertCommand),
    Update(UpdateCommand),
    Delete(DeleteCommand),
}

impl Command {
    pub fn kind(&self) -> StatementKind {
        match self {
            Command::Select(_) => StatementKind::Select,
            Command::Insert(_) => StatementKind::Insert,
            Command::Update(_) => StatementKind::Update,
            Command::Delete(_) => StatementKind::Delete,
        }
    }

    pub fn is_query(&self) -> bool {
        matches!(self, Command::Select(_))
    }

    pub fn collection(&self) -> &str {
        match self {
            Command::Select(c) => &c.collection,
            Command::Insert(c) => &c.collection,
            Command::Update(c) => &c.collection,
            Command::Delete(c) => &c.collection,
        }
    }

    /// Run a SELECT and return the page with the expressions that project it.
    pub fn execute_query(
        &self,
        gateway: &dyn SearchGateway,
        timeout: Duration,
    ) -> Result<QueryOutput, CommandError> {
        match self {
            Command::Select(select) => select.execute(gateway, timeout),
            Command::Insert(_) | Command::Update(_) | Command::Delete(_) => {
                Err(CommandError::InvalidUsage {
                    kind: self.kind(),
                    method: "execute_query",
                })
            }
        }
    }

    /// Run a mutation and return the gateway-reported affected count.
    pub fn execute_update(
        &self,
        gateway: &dyn SearchGateway,
        timeout: Duration,
    ) -> Result<u64, CommandError> {
        let mutation = match self {
            Command::Select(_) => {
                return Err(CommandError::InvalidUsage {
                    kind: self.kind(),
                    method: "execute_update",
                })
            }
            Command::Insert(insert) => RenderedMutation::Add {
                collection: insert.collection.clone(),
                documents: insert.documents.clone(),
            },
            Command::Update(update) => RenderedMutation::Update {
                collection: update.collection.clone(),
                filter: update.filter.clone(),
                assignments: update.assignments.clone(),
            },
            Command::Delete(delete) => RenderedMutation::Delete {
                collection: delete.collection.clone(),
                filter: delete.filter.clone(),
            },
        };

        debug!(
            collection = %mutation.collection(),
            op = mutation.op_name(),
            "Dispatching mutation"
        );

        Ok(gateway.mutate(&mutation, timeout)?)
    }
}
