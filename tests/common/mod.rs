// tests/common/mod.rs
//
// Stub collaborators shared by the integration tests. Nothing here touches the
// network: fetchers serve canned pages, notifiers record what they were asked to send.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use parking_lot::Mutex;
use serde_json::json;

use deal_notifier::config::ScrapingConfig;
use deal_notifier::ingest::ContentFetcher;
use deal_notifier::notify::{DealMessage, DispatchOutcome, Notifier};
use deal_notifier::orchestrator::Orchestrator;
use deal_notifier::validate::{DealValidator, ValidatorConfig};

pub const SAMPLE_LINE: &str =
    "Amazing deal! https://shop.example.com/item £19.99 off original price";

/// How the recording notifier answers a send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Accept,
    Refuse,
    Unreachable,
}

pub struct RecordingNotifier {
    connected: bool,
    reply: Mutex<Reply>,
    sent: Mutex<Vec<DealMessage>>,
    delay: Duration,
}

impl RecordingNotifier {
    pub fn accepting() -> Arc<Self> {
        Arc::new(Self::with(true, Reply::Accept, Duration::ZERO))
    }

    pub fn with(connected: bool, reply: Reply, delay: Duration) -> Self {
        Self {
            connected,
            reply: Mutex::new(reply),
            sent: Mutex::new(Vec::new()),
            delay,
        }
    }

    pub fn set_reply(&self, reply: Reply) {
        *self.reply.lock() = reply;
    }

    /// Every send attempt, accepted or not.
    pub fn calls(&self) -> Vec<DealMessage> {
        self.sent.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.sent.lock().len()
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn test_connection(&self) -> bool {
        self.connected
    }

    async fn send_deal(&self, deal: &DealMessage) -> Result<DispatchOutcome> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.sent.lock().push(deal.clone());
        match *self.reply.lock() {
            Reply::Accept => Ok(DispatchOutcome {
                accepted: true,
                raw: json!({ "ok": true, "result": { "message_id": 1 } }),
            }),
            Reply::Refuse => Ok(DispatchOutcome {
                accepted: false,
                raw: json!({ "ok": false, "description": "Bad Request: chat not found" }),
            }),
            Reply::Unreachable => Err(anyhow!("connection refused")),
        }
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Serves canned text per URL. Unknown URLs behave like a failed fetch.
/// Tracks how many fetches overlap so tests can check the concurrency bound.
#[derive(Default)]
pub struct StubFetcher {
    pages: HashMap<String, String>,
    delays: HashMap<String, Duration>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
    panic_on: Mutex<Option<String>>,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, content: &str) -> Self {
        self.pages.insert(url.to_string(), content.to_string());
        self
    }

    pub fn slow(mut self, url: &str, delay: Duration) -> Self {
        self.delays.insert(url.to_string(), delay);
        self
    }

    pub fn panics_on(self, url: &str) -> Self {
        *self.panic_on.lock() = Some(url.to_string());
        self
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ContentFetcher for StubFetcher {
    async fn fetch_text(&self, url: &str) -> Option<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if let Some(d) = self.delays.get(url) {
            tokio::time::sleep(*d).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.panic_on.lock().as_deref() == Some(url) {
            panic!("stub fetcher blew up on {url}");
        }
        self.pages.get(url).cloned()
    }
}

pub fn scraping(max_concurrent: usize, interval_secs: u64) -> ScrapingConfig {
    ScrapingConfig {
        scrape_interval_secs: interval_secs,
        max_concurrent_scrapes: max_concurrent,
        ..ScrapingConfig::default()
    }
}

pub fn orchestrator(
    cfg: ScrapingConfig,
    fetcher: Arc<StubFetcher>,
    notifier: Arc<RecordingNotifier>,
) -> Orchestrator {
    Orchestrator::new(
        cfg,
        DealValidator::new(ValidatorConfig::default()),
        fetcher,
        notifier,
    )
}
