// src/ingest/types.rs
use anyhow::Result;

use crate::deal::CandidateDeal;

/// Turns page text into candidate deals. Must be deterministic for a given input.
pub trait ExtractionStrategy: Send + Sync {
    fn extract(&self, content: &str, source_url: &str) -> Vec<CandidateDeal>;
    fn name(&self) -> &'static str;
}

/// Acquires page text. Every failure (DNS, timeout, HTTP status, empty body) is `None`.
#[async_trait::async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch_text(&self, url: &str) -> Option<String>;
}

/// Site-specific scraper that replaces the built-in fetch + extract for a whole URL set.
/// Its output goes straight into validate / dedupe / dispatch.
#[async_trait::async_trait]
pub trait DealSource: Send + Sync {
    async fn fetch_deals(&self, urls: &[String]) -> Result<Vec<CandidateDeal>>;
    fn name(&self) -> &'static str;
}
