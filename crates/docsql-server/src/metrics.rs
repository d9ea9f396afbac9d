use std::sync::Arc;

use prometheus::{
    CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};

/// Prometheus metrics for statement execution.
#[derive(Clone, Debug)]
pub struct MetricsRegistry {
    inner: Arc<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    registry: Registry,
    statements: CounterVec,
    statement_seconds: HistogramVec,
    statement_errors: CounterVec,
    rows_returned: CounterVec,
    documents_affected: CounterVec,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self, prometheus::Error> {
        Ok(Self {
            inner: Arc::new(MetricsInner::new()?),
        })
    }

    /// Record a successful statement. `rows` is the row count for queries
    /// and the affected count for mutations.
    pub fn record_statement(&self, kind: &str, rows: u64, secs: f64) {
        self.inner
            .statements
            .with_label_values(&[kind, "ok"])
            .inc();
        self.inner
            .statement_seconds
            .with_label_values(&[kind])
            .observe(secs);
        let counter = if kind == "SELECT" {
            &self.inner.rows_returned
        } else {
            &self.inner.documents_affected
        };
        counter.with_label_values(&[kind]).inc_by(rows as f64);
    }

    pub fn record_error(&self, kind: &str, code: &str, secs: f64) {
        self.inner
            .statements
            .with_label_values(&[kind, "error"])
            .inc();
        self.inner
            .statement_seconds
            .with_label_values(&[kind])
            .observe(secs);
        self.inner
            .statement_errors
            .with_label_values(&[code])
            .inc();
    }

    pub fn render_prometheus(&self) -> String {
        let metric_families = self.inner.registry.gather();
        let mut out = Vec::new();
        let enc = TextEncoder::new();
        if enc.encode(&metric_families, &mut out).is_err() {
            return String::new();
        }
        String::from_utf8_lossy(&out).to_string()
    }
}

impl MetricsInner {
    fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let statements = counter_vec(
            &registry,
            "docsql_statements_total",
            "Statements executed, by kind and outcome",
            &["kind", "outcome"],
        )?;
        let statement_seconds = histogram_vec(
            &registry,
            "docsql_statement_seconds",
            "Statement wall time including the engine round-trip",
            &["kind"],
        )?;
        let statement_errors = counter_vec(
            &registry,
            "docsql_statement_errors_total",
            "Failed statements, by reason code",
            &["code"],
        )?;
        let rows_returned = counter_vec(
            &registry,
            "docsql_rows_returned_total",
            "Rows materialized for queries",
            &["kind"],
        )?;
        let documents_affected = counter_vec(
            &registry,
            "docsql_documents_affected_total",
            "Documents reported affected by mutations",
            &["kind"],
        )?;

        Ok(Self {
            registry,
            statements,
            statement_seconds,
            statement_errors,
            rows_returned,
            documents_affected,
        })
    }
}

fn counter_vec(
    registry: &Registry,
    name: &str,
    help: &str,
    labels: &[&str],
) -> Result<CounterVec, prometheus::Error> {
    let c = CounterVec::new(Opts::new(name, help), labels)?;
    registry.register(Box::new(c.clone()))?;
    Ok(c)
}

fn histogram_vec(
    registry: &Registry,
    name: &str,
    help: &str,
    labels: &[&str],
) -> Result<HistogramVec, prometheus::Error> {
    let h = HistogramVec::new(HistogramOpts::new(name, help), labels)?;
    registry.register(Box::new(h.clone()))?;
    Ok(h)
}

#[cfg(test)]
mod tests {
    use super::MetricsRegistry;

    #[test]
    fn renders_prometheus_text() {
        let m = MetricsRegistry::new().unwrap();
        m.record_statement("SELECT", 12, 0.004);
        let text = m.render_prometheus();
        assert!(text.contains("docsql_statements_total"));
        assert!(text.contains("docsql_rows_returned_total{kind=\"SELECT\"} 12"));
    }

    #[test]
    fn errors_counted_by_code() {
        let m = MetricsRegistry::new().unwrap();
        m.record_statement("DELETE", 3, 0.01);
        m.record_error("SELECT", "EXECUTION_TIMEOUT", 30.0);
        m.record_error("UPDATE", "EXECUTION_TIMEOUT", 30.0);
        let text = m.render_prometheus();

        assert!(text.contains("docsql_statement_errors_total{code=\"EXECUTION_TIMEOUT\"} 2"));
        assert!(text.contains("docsql_documents_affected_total{kind=\"DELETE\"} 3"));
        assert!(text.contains("outcome=\"error\""));
        assert!(text.contains("docsql_statement_seconds"));
    }

    #[test]
    fn registries_are_independent() {
        let a = MetricsRegistry::new().unwrap();
        let b = MetricsRegistry::new().unwrap();
        a.record_statement("INSERT", 1, 0.001);
        assert!(!b.render_prometheus().contains("kind=\"INSERT\""));
    }
}
