// src/notify/mod.rs
//! Downstream notification channel.
//!
//! The pipeline only needs two things from a channel: a reachability probe and a
//! send that says whether the message was accepted. Formatting is the channel's job.

pub mod telegram;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::deal::CandidateDeal;

pub use telegram::TelegramNotifier;

/// Markup used when rendering a deal message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MessageFormat {
    #[default]
    #[serde(rename = "HTML", alias = "html", alias = "Html")]
    Html,
    #[serde(rename = "Markdown", alias = "markdown", alias = "MarkdownV2")]
    Markdown,
}

impl FromStr for MessageFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "html" => Ok(Self::Html),
            "markdown" | "markdownv2" => Ok(Self::Markdown),
            other => Err(anyhow!("unknown message format `{other}`")),
        }
    }
}

/// What gets sent for one deal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealMessage {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl From<&CandidateDeal> for DealMessage {
    fn from(d: &CandidateDeal) -> Self {
        Self {
            title: d.title.clone(),
            url: d.url.clone(),
            price: d.price.clone(),
            description: d.description.clone(),
        }
    }
}

/// Channel verdict. `accepted` is the only success signal; `raw` is kept for logs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchOutcome {
    pub accepted: bool,
    pub raw: serde_json::Value,
}

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn test_connection(&self) -> bool;
    /// `Err` means the channel could not be reached at all.
    async fn send_deal(&self, deal: &DealMessage) -> Result<DispatchOutcome>;
    fn name(&self) -> &'static str;
}

/// Accepts everything and only logs. Used for `--dry-run`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunNotifier;

#[async_trait::async_trait]
impl Notifier for DryRunNotifier {
    async fn test_connection(&self) -> bool {
        true
    }

    async fn send_deal(&self, deal: &DealMessage) -> Result<DispatchOutcome> {
        tracing::info!(
            target: "notify",
            title = %deal.title,
            url = %deal.url,
            price = ?deal.price,
            "dry run: deal not sent"
        );
        Ok(DispatchOutcome {
            accepted: true,
            raw: serde_json::json!({ "ok": true, "dry_run": true }),
        })
    }

    fn name(&self) -> &'static str {
        "dry-run"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_format_parsing() {
        assert_eq!("HTML".parse::<MessageFormat>().unwrap(), MessageFormat::Html);
        assert_eq!(
            "MarkdownV2".parse::<MessageFormat>().unwrap(),
            MessageFormat::Markdown
        );
        assert!("rtf".parse::<MessageFormat>().is_err());
        let f: MessageFormat = serde_json::from_str(r#""markdown""#).unwrap();
        assert_eq!(f, MessageFormat::Markdown);
    }

    #[tokio::test]
    async fn dry_run_accepts() {
        let n = DryRunNotifier;
        assert!(n.test_connection().await);
        let out = n
            .send_deal(&DealMessage {
                title: "t".into(),
                url: "https://u.test".into(),
                price: None,
                description: None,
            })
            .await
            .unwrap();
        assert!(out.accepted);
    }
}
