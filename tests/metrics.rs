// tests/metrics.rs
//
// One test per process: the Prometheus recorder is global.

mod common;

use std::sync::Arc;

use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use common::{orchestrator, scraping, RecordingNotifier, StubFetcher, SAMPLE_LINE};
use deal_notifier::api::{self, AppState};
use deal_notifier::metrics::Metrics;
use deal_notifier::validate::DealValidator;

#[tokio::test]
async fn metrics_endpoint_contains_pipeline_series() {
    let metrics = Metrics::init().expect("install recorder");

    let fetcher = Arc::new(StubFetcher::new().page("https://a.test/", SAMPLE_LINE));
    let notifier = RecordingNotifier::accepting();
    let orch = orchestrator(scraping(2, 300), fetcher, notifier.clone());
    let urls = vec!["https://a.test/".to_string(), "https://dead.test/".to_string()];
    orch.run_cycle(&urls).await;
    orch.run_cycle(&urls).await;

    let app = api::router_with_metrics(
        AppState::new(notifier, DealValidator::new(Default::default())),
        &metrics,
    );
    let resp = app
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    // axum::body::to_bytes requires an explicit limit
    let body = body::to_bytes(resp.into_body(), 1_048_576).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();

    for (needle, value) in [
        ("deals_found_total", 2),
        ("deals_dispatched_total", 1),
        ("deals_duplicate_total", 1),
        ("source_fetch_failures_total", 2),
    ] {
        let line = text
            .lines()
            .find(|l| l.starts_with(needle) && !l.starts_with('#'))
            .unwrap_or_else(|| panic!("missing {needle} in:\n{text}"));
        assert!(
            line.ends_with(&format!(" {value}")),
            "unexpected sample `{line}`"
        );
    }
}
