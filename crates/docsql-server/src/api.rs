//! HTTP API
//!
//! Endpoints:
//! - `POST /sql` runs one statement
//! - `POST /batch` runs statements as updates, continuing past failures
//! - `GET /health`
//! - `GET /metrics` in Prometheus text format

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::State,
    http::{header, StatusCode},
    routing::{get, post},
    Json, Router,
};
use docsql_exec::{Session, StatementError, StatementResult};
use docsql_ir::CommandError;
use serde::{Deserialize, Serialize};
use tokio::task::JoinError;
use tracing::{info_span, warn, Instrument, Span};
use uuid::Uuid;

use crate::metrics::MetricsRegistry;

/// Kind label for statements that never produced a command.
const UNPARSED: &str = "UNKNOWN";
const BATCH: &str = "BATCH";

#[derive(Clone)]
pub struct AppState {
    session: Arc<Session>,
    metrics: MetricsRegistry,
}

impl AppState {
    pub fn new(session: Arc<Session>, metrics: MetricsRegistry) -> Self {
        Self { session, metrics }
    }
}

/// Entry point a statement is run through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecuteMode {
    /// Query for SELECT, update for everything else
    #[default]
    Auto,
    Query,
    Update,
}

#[derive(Debug, Deserialize)]
pub struct SqlRequest {
    pub sql: String,
    #[serde(default)]
    pub mode: ExecuteMode,
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub statements: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error_detail(err: &StatementError) -> ErrorDetail {
    ErrorDetail {
        code: err.code().to_string(),
        message: err.to_string(),
    }
}

fn status_for(err: &StatementError) -> StatusCode {
    match err {
        StatementError::Parse(_) | StatementError::Translation(_) => StatusCode::BAD_REQUEST,
        StatementError::Command(CommandError::InvalidUsage { .. }) => StatusCode::BAD_REQUEST,
        StatementError::Command(CommandError::Execution(e)) if e.is_timeout() => {
            StatusCode::GATEWAY_TIMEOUT
        }
        StatementError::Command(CommandError::Execution(_)) => StatusCode::BAD_GATEWAY,
    }
}

fn statement_error(err: &StatementError) -> ApiError {
    (
        status_for(err),
        Json(ErrorResponse {
            error: error_detail(err),
        }),
    )
}

fn internal_error(err: JoinError) -> ApiError {
    warn!(error = %err, "Statement task failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: ErrorDetail {
                code: "INTERNAL".to_string(),
                message: err.to_string(),
            },
        }),
    )
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/sql", post(execute_sql))
        .route("/batch", post(execute_batch))
        .route("/health", get(health_check))
        .route("/metrics", get(render_metrics))
        .with_state(state)
}

fn run_statement(
    session: &Session,
    sql: &str,
    mode: ExecuteMode,
) -> (&'static str, Result<StatementResult, StatementError>) {
    let command = match session.prepare(sql) {
        Ok(command) => command,
        Err(err) => return (UNPARSED, Err(err)),
    };
    let kind = command.kind().as_str();
    let result = match mode {
        ExecuteMode::Auto => session.run(&command),
        ExecuteMode::Query => session.run_query(&command).map(StatementResult::Rows),
        ExecuteMode::Update => session
            .run_update(&command)
            .map(StatementResult::UpdateCount),
    };
    (kind, result)
}

async fn execute_sql(
    State(state): State<AppState>,
    Json(req): Json<SqlRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let request_id = Uuid::new_v4();
    let span = info_span!("sql", %request_id, mode = ?req.mode);

    async move {
        let started = Instant::now();
        let session = Arc::clone(&state.session);
        let task_span = Span::current();
        // Gateway calls block; keep them off the async workers
        let (kind, result) = tokio::task::spawn_blocking(move || {
            task_span.in_scope(|| run_statement(&session, &req.sql, req.mode))
        })
        .await
        .map_err(internal_error)?;
        let secs = started.elapsed().as_secs_f64();

        match result {
            Ok(StatementResult::Rows(rows)) => {
                state.metrics.record_statement(kind, rows.len() as u64, secs);
                let mut body = rows.to_json();
                body["kind"] = kind.into();
                Ok(Json(body))
            }
            Ok(StatementResult::UpdateCount(count)) => {
                state.metrics.record_statement(kind, count, secs);
                Ok(Json(serde_json::json!({
                    "kind": kind,
                    "update_count": count,
                })))
            }
            Err(err) => {
                state.metrics.record_error(kind, err.code(), secs);
                warn!(kind, code = err.code(), error = %err, "Statement failed");
                Err(statement_error(&err))
            }
        }
    }
    .instrument(span)
    .await
}

async fn execute_batch(
    State(state): State<AppState>,
    Json(req): Json<BatchRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let request_id = Uuid::new_v4();
    let span = info_span!("batch", %request_id, statements = req.statements.len());

    async move {
        let started = Instant::now();
        let session = Arc::clone(&state.session);
        let task_span = Span::current();
        let outcome = tokio::task::spawn_blocking(move || {
            task_span.in_scope(|| session.execute_batch(req.statements))
        })
        .await
        .map_err(internal_error)?;

        // Batches are timed as a whole; each statement observes the mean
        let secs = started.elapsed().as_secs_f64() / outcome.len().max(1) as f64;
        let mut failures = 0;
        let results: Vec<serde_json::Value> = outcome
            .results()
            .iter()
            .map(|result| match result {
                Ok(count) => {
                    state.metrics.record_statement(BATCH, *count, secs);
                    serde_json::json!({ "update_count": count })
                }
                Err(err) => {
                    failures += 1;
                    state.metrics.record_error(BATCH, err.code(), secs);
                    serde_json::json!({ "error": error_detail(err) })
                }
            })
            .collect();

        Ok(Json(serde_json::json!({
            "results": results,
            "failures": failures,
        })))
    }
    .instrument(span)
    .await
}

async fn health_check() -> &'static str {
    "OK"
}

async fn render_metrics(
    State(state): State<AppState>,
) -> ([(header::HeaderName, &'static str); 1], String) {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render_prometheus(),
    )
}
