// src/metrics.rs
use anyhow::{Context, Result};
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder. Call once per process.
    pub fn init() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        describe_pipeline_metrics();
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

/// One-time metrics registration (so series show up on /metrics).
pub fn describe_pipeline_metrics() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("deals_found_total", "Candidate deals extracted from sources.");
        describe_counter!("deals_dispatched_total", "Deals accepted by the notification channel.");
        describe_counter!("deals_rejected_total", "Candidates dropped by validation.");
        describe_counter!("deals_duplicate_total", "Candidates skipped as already sent.");
        describe_counter!(
            "deal_dispatch_failures_total",
            "Sends refused by or failing to reach the channel."
        );
        describe_counter!(
            "source_fetch_failures_total",
            "Sources that produced no content."
        );
        describe_counter!("scrape_cycles_total", "Completed scrape cycles.");
        describe_histogram!("scrape_cycle_ms", "Scrape cycle duration in milliseconds.");
        describe_gauge!("scrape_last_cycle_ts", "Unix ts when the last scrape cycle ended.");
    });
}
