//! # Prometheus Metrics
//!
//! Ledger operation metrics, scraped at `/metrics` on the metrics port.
//! Everything lives in a dedicated [`prometheus::Registry`] under the
//! `wrapt` namespace.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

use wrapt_ledger::{LedgerResult, TokenInfo};

/// Prometheus handles for the node.
#[derive(Clone)]
pub struct NodeMetrics {
    registry: Registry,
    /// Operations that committed, by operation name.
    pub operations_total: IntCounterVec,
    /// Operations that were rejected, by operation name and error kind.
    pub operation_errors_total: IntCounterVec,
    /// Accounts created since start.
    pub accounts_created_total: IntCounter,
    /// Last observed total supply.
    pub total_supply: IntGauge,
    /// Last observed wrapped supply.
    pub wrapped_supply: IntGauge,
    /// Handler latency per operation, in seconds.
    pub operation_latency_seconds: HistogramVec,
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("wrapt".into()), None)
            .expect("failed to create prometheus registry");

        let operations_total = IntCounterVec::new(
            Opts::new("operations_total", "Ledger operations committed"),
            &["operation"],
        )
        .expect("metric creation");
        registry
            .register(Box::new(operations_total.clone()))
            .expect("metric registration");

        let operation_errors_total = IntCounterVec::new(
            Opts::new("operation_errors_total", "Ledger operations rejected"),
            &["operation", "kind"],
        )
        .expect("metric creation");
        registry
            .register(Box::new(operation_errors_total.clone()))
            .expect("metric registration");

        let accounts_created_total =
            IntCounter::new("accounts_created_total", "Balance accounts created")
                .expect("metric creation");
        registry
            .register(Box::new(accounts_created_total.clone()))
            .expect("metric registration");

        let total_supply = IntGauge::new("total_supply", "Units minted or wrapped since initialization")
            .expect("metric creation");
        registry
            .register(Box::new(total_supply.clone()))
            .expect("metric registration");

        let wrapped_supply =
            IntGauge::new("wrapped_supply", "Supply backed by the custody vault")
                .expect("metric creation");
        registry
            .register(Box::new(wrapped_supply.clone()))
            .expect("metric registration");

        let operation_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "operation_latency_seconds",
                "Ledger operation handling latency in seconds",
            )
            .buckets(vec![
                0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.5,
            ]),
            &["operation"],
        )
        .expect("metric creation");
        registry
            .register(Box::new(operation_latency_seconds.clone()))
            .expect("metric registration");

        Self {
            registry,
            operations_total,
            operation_errors_total,
            accounts_created_total,
            total_supply,
            wrapped_supply,
            operation_latency_seconds,
        }
    }

    /// Counts the outcome of one ledger operation.
    pub fn record<T>(&self, operation: &str, result: &LedgerResult<T>) {
        match result {
            Ok(_) => self.operations_total.with_label_values(&[operation]).inc(),
            Err(err) => {
                let kind = format!("{:?}", err.kind());
                self.operation_errors_total
                    .with_label_values(&[operation, kind.as_str()])
                    .inc();
            }
        }
    }

    /// Mirrors the supply counters of `info` into the gauges.
    pub fn observe_supply(&self, info: &TokenInfo) {
        self.total_supply
            .set(i64::try_from(info.total_supply).unwrap_or(i64::MAX));
        self.wrapped_supply
            .set(i64::try_from(info.wrapped_supply).unwrap_or(i64::MAX));
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl Default for NodeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<NodeMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wrapt_ledger::LedgerError;

    #[test]
    fn record_splits_success_and_failure() {
        let metrics = NodeMetrics::new();
        metrics.record("transfer", &Ok::<(), LedgerError>(()));
        metrics.record::<()>("transfer", &Err(LedgerError::Unauthorized));

        assert_eq!(
            metrics
                .operations_total
                .with_label_values(&["transfer"])
                .get(),
            1
        );
        assert_eq!(
            metrics
                .operation_errors_total
                .with_label_values(&["transfer", "Unauthorized"])
                .get(),
            1
        );
    }

    #[test]
    fn encode_uses_namespace() {
        let metrics = NodeMetrics::new();
        metrics.accounts_created_total.inc();
        let text = metrics.encode().unwrap();
        assert!(text.contains("wrapt_accounts_created_total 1"));
    }
}
