// src/ingest/mod.rs
//! Content acquisition: fetching page text and turning it into candidate deals.

pub mod config;
pub mod extract;
pub mod fetch;
pub mod types;

pub use extract::PatternExtractor;
pub use fetch::{html_to_text, HttpFetcher};
pub use types::{ContentFetcher, DealSource, ExtractionStrategy};
