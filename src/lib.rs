// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod config;
pub mod deal;
pub mod dedup;
pub mod ingest;
pub mod metrics;
pub mod notify;
pub mod orchestrator;
pub mod telemetry;
pub mod validate;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::config::AppConfig;
pub use crate::deal::{CandidateDeal, DealIdentity};
pub use crate::dedup::SentDeals;
pub use crate::notify::{DealMessage, DispatchOutcome, DryRunNotifier, Notifier, TelegramNotifier};
pub use crate::orchestrator::{CycleSummary, DealOutcome, Orchestrator, SourceReport};
pub use crate::validate::{DealValidator, ValidationResult};
