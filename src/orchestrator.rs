// src/orchestrator.rs
//! Fetch → extract → validate → dedupe → dispatch.
//!
//! `process_source` runs the whole chain for one page. `run_cycle` fans it out over
//! many pages with at most `max_concurrent_scrapes` in flight, and `run_forever`
//! repeats cycles on a fixed interval until cancelled.
//!
//! Failures stay where they happen: a bad candidate is dropped, a dead source yields
//! nothing, a refused send leaves the deal unmarked so the next cycle retries it.
//! A cycle always resolves completely (every dispatch answered) before the next one
//! starts fetching.

use anyhow::{bail, Result};
use futures::{stream, FutureExt, StreamExt};
use metrics::{counter, gauge, histogram};
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{AppConfig, ScrapingConfig};
use crate::deal::CandidateDeal;
use crate::dedup::SentDeals;
use crate::ingest::types::{ContentFetcher, DealSource, ExtractionStrategy};
use crate::ingest::{HttpFetcher, PatternExtractor};
use crate::notify::{DealMessage, Notifier};
use crate::validate::DealValidator;

/// What happened to one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DealOutcome {
    Dispatched,
    Duplicate,
    Rejected,
    /// Channel refused or unreachable. Left unmarked for the next cycle.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceReport {
    pub url: String,
    pub deals_found: usize,
    pub deals_dispatched: usize,
    pub error: Option<String>,
}

impl SourceReport {
    fn failed(url: &str, error: String) -> Self {
        Self {
            url: url.to_string(),
            deals_found: 0,
            deals_dispatched: 0,
            error: Some(error),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-cycle totals, logged after every cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleSummary {
    pub sources_total: usize,
    pub sources_succeeded: usize,
    pub deals_found: usize,
    pub deals_dispatched: usize,
    pub errors: Vec<String>,
}

impl CycleSummary {
    pub fn from_reports(reports: &[SourceReport]) -> Self {
        let mut s = Self {
            sources_total: reports.len(),
            ..Self::default()
        };
        for r in reports {
            s.deals_found += r.deals_found;
            s.deals_dispatched += r.deals_dispatched;
            match &r.error {
                None => s.sources_succeeded += 1,
                Some(e) => s.errors.push(e.clone()),
            }
        }
        s
    }
}

/// How `run_forever` ended when it was not refused up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    pub cycles: u64,
}

/// Time left to wait after a cycle. Never negative.
pub fn remaining_sleep(interval: Duration, elapsed: Duration) -> Duration {
    interval.saturating_sub(elapsed)
}

pub struct Orchestrator {
    cfg: ScrapingConfig,
    fetcher: Arc<dyn ContentFetcher>,
    extractor: Arc<dyn ExtractionStrategy>,
    validator: DealValidator,
    notifier: Arc<dyn Notifier>,
    sent: Arc<SentDeals>,
}

impl Orchestrator {
    pub fn new(
        cfg: ScrapingConfig,
        validator: DealValidator,
        fetcher: Arc<dyn ContentFetcher>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        crate::metrics::describe_pipeline_metrics();
        Self {
            cfg,
            fetcher,
            extractor: Arc::new(PatternExtractor::new()),
            validator,
            notifier,
            sent: Arc::new(SentDeals::new()),
        }
    }

    /// Production wiring: HTTP fetcher + pattern extractor.
    pub fn from_config(cfg: &AppConfig, notifier: Arc<dyn Notifier>) -> Result<Self> {
        let fetcher = Arc::new(HttpFetcher::new(&cfg.scraping)?);
        Ok(Self::new(
            cfg.scraping.clone(),
            DealValidator::new(cfg.validator.clone()),
            fetcher,
            notifier,
        ))
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn ExtractionStrategy>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_sent_deals(mut self, sent: Arc<SentDeals>) -> Self {
        self.sent = sent;
        self
    }

    pub fn sent_deals(&self) -> &Arc<SentDeals> {
        &self.sent
    }

    pub fn config(&self) -> &ScrapingConfig {
        &self.cfg
    }

    /// Validate, dedupe and dispatch a single candidate.
    pub async fn process_deal(&self, deal: &CandidateDeal) -> DealOutcome {
        let id = deal.identity();
        let fp = id.fingerprint();

        let Some(claim) = self.sent.try_claim(id) else {
            debug!(target: "pipeline", deal = %fp, "deal already sent");
            counter!("deals_duplicate_total").increment(1);
            return DealOutcome::Duplicate;
        };

        let verdict = self.validator.validate(deal);
        if !verdict.is_valid() {
            warn!(
                target: "pipeline",
                deal = %fp,
                errors = %verdict.error_messages().join("; "),
                "deal rejected"
            );
            counter!("deals_rejected_total").increment(1);
            return DealOutcome::Rejected;
        }

        match self.notifier.send_deal(&DealMessage::from(deal)).await {
            Ok(out) if out.accepted => {
                claim.commit();
                counter!("deals_dispatched_total").increment(1);
                info!(target: "pipeline", deal = %fp, title = %deal.title, "deal dispatched");
                DealOutcome::Dispatched
            }
            Ok(out) => {
                counter!("deal_dispatch_failures_total").increment(1);
                error!(
                    target: "pipeline",
                    deal = %fp,
                    notifier = self.notifier.name(),
                    response = %out.raw,
                    "deal notification not accepted"
                );
                DealOutcome::Failed
            }
            Err(e) => {
                counter!("deal_dispatch_failures_total").increment(1);
                error!(
                    target: "pipeline",
                    deal = %fp,
                    notifier = self.notifier.name(),
                    error = %format!("{e:#}"),
                    "deal notification failed"
                );
                DealOutcome::Failed
            }
        }
    }

    /// Candidates are handled strictly in the given order. Returns how many were dispatched.
    pub async fn process_deals(&self, deals: &[CandidateDeal]) -> usize {
        let mut dispatched = 0;
        for deal in deals {
            if self.process_deal(deal).await == DealOutcome::Dispatched {
                dispatched += 1;
            }
        }
        dispatched
    }

    /// Full pipeline for one page. A failed fetch is reported, never raised.
    pub async fn process_source(&self, url: &str) -> SourceReport {
        info!(target: "pipeline", %url, "scraping deals");

        let Some(content) = self.fetcher.fetch_text(url).await else {
            warn!(target: "pipeline", %url, "no content extracted");
            counter!("source_fetch_failures_total").increment(1);
            return SourceReport::failed(url, format!("no content from {url}"));
        };

        let deals = self.extractor.extract(&content, url);
        info!(
            target: "pipeline",
            %url,
            found = deals.len(),
            extractor = self.extractor.name(),
            "potential deals found"
        );
        counter!("deals_found_total").increment(deals.len() as u64);

        let dispatched = self.process_deals(&deals).await;
        SourceReport {
            url: url.to_string(),
            deals_found: deals.len(),
            deals_dispatched: dispatched,
            error: None,
        }
    }

    /// One cycle over `urls` with bounded concurrency. Completion order is arbitrary.
    pub async fn run_cycle(&self, urls: &[String]) -> CycleSummary {
        let limit = self.cfg.max_concurrent_scrapes.max(1);
        // Futures are built eagerly (they stay lazy until polled) so the stream holds no
        // closure; this keeps the cycle future provably `Send` for `tokio::spawn`.
        let jobs: Vec<_> = urls
            .iter()
            .map(|url| async move {
                match AssertUnwindSafe(self.process_source(url))
                    .catch_unwind()
                    .await
                {
                    Ok(report) => report,
                    Err(_) => {
                        error!(target: "pipeline", %url, "source pipeline panicked");
                        SourceReport::failed(url, format!("error scraping {url}: pipeline panicked"))
                    }
                }
            })
            .collect();
        let reports: Vec<SourceReport> = stream::iter(jobs)
            .buffer_unordered(limit)
            .collect()
            .await;

        CycleSummary::from_reports(&reports)
    }

    /// One cycle where a custom scraper replaces fetch + extract for the whole URL set.
    pub async fn run_custom_cycle(&self, source: &dyn DealSource, urls: &[String]) -> CycleSummary {
        match source.fetch_deals(urls).await {
            Ok(deals) => {
                counter!("deals_found_total").increment(deals.len() as u64);
                let dispatched = self.process_deals(&deals).await;
                CycleSummary {
                    sources_total: urls.len(),
                    sources_succeeded: urls.len(),
                    deals_found: deals.len(),
                    deals_dispatched: dispatched,
                    errors: Vec::new(),
                }
            }
            Err(e) => {
                let msg = format!("custom scraper {}: {e:#}", source.name());
                error!(target: "pipeline", error = %msg, "custom scraper error");
                CycleSummary {
                    sources_total: urls.len(),
                    errors: vec![msg],
                    ..CycleSummary::default()
                }
            }
        }
    }

    /// Repeat cycles every `scrape_interval_secs` until `cancel` fires.
    ///
    /// Refuses to start if the channel's connection test fails. Cancellation is
    /// honoured mid-cycle and during the pause, and is reported as `Ok`.
    pub async fn run_forever(
        &self,
        urls: &[String],
        custom: Option<&dyn DealSource>,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome> {
        let interval = self.cfg.interval();
        info!(
            target: "pipeline",
            sources = urls.len(),
            interval_secs = interval.as_secs(),
            custom = custom.map(|c| c.name()).unwrap_or("none"),
            "starting continuous scraping"
        );

        if !self.notifier.test_connection().await {
            error!(target: "pipeline", notifier = self.notifier.name(), "connection test failed, aborting");
            bail!("{} connection test failed", self.notifier.name());
        }

        let mut cycles: u64 = 0;
        while !cancel.is_cancelled() {
            let started = Instant::now();

            let cycle = async {
                match custom {
                    Some(src) => self.run_custom_cycle(src, urls).await,
                    None => self.run_cycle(urls).await,
                }
            };
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                r = AssertUnwindSafe(cycle).catch_unwind() => r,
            };

            let elapsed = started.elapsed();
            match result {
                Ok(summary) => {
                    cycles += 1;
                    counter!("scrape_cycles_total").increment(1);
                    histogram!("scrape_cycle_ms").record(elapsed.as_secs_f64() * 1_000.0);
                    gauge!("scrape_last_cycle_ts").set(chrono::Utc::now().timestamp() as f64);
                    info!(
                        target: "pipeline",
                        cycle = cycles,
                        sources = summary.sources_total,
                        succeeded = summary.sources_succeeded,
                        found = summary.deals_found,
                        dispatched = summary.deals_dispatched,
                        errors = ?summary.errors,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "scraping cycle complete"
                    );
                }
                Err(_) => {
                    error!(target: "pipeline", "unexpected panic in scraping cycle, continuing");
                }
            }

            let pause = remaining_sleep(interval, elapsed);
            if !pause.is_zero() {
                info!(target: "pipeline", secs = pause.as_secs_f64(), "sleeping until next scrape");
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(pause) => {}
                }
            }
        }

        info!(target: "pipeline", cycles, "scraping stopped");
        Ok(RunOutcome { cycles })
    }
}
