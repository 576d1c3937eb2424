// src/ingest/fetch.rs
use anyhow::{bail, Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use std::time::Duration;

use crate::config::ScrapingConfig;
use crate::ingest::types::ContentFetcher;

/// Pages larger than this are not scraped.
pub const MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

static RE_LOOKS_HTML: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<\s*(!doctype|html|body|div|p|br|span|a|article|section|li)\b")
        .expect("html sniff regex")
});
static RE_DROP_BLOCKS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?is)<!--.*?-->|<script\b.*?</script\s*>|<style\b.*?</style\s*>|<noscript\b.*?</noscript\s*>|<head\b.*?</head\s*>|<template\b.*?</template\s*>",
    )
    .expect("drop blocks regex")
});
static RE_BREAKS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)<\s*/?\s*(br|p|div|li|ul|ol|h[1-6]|tr|table|article|section|header|footer|main|aside|blockquote)\b[^>]*>",
    )
    .expect("block tag regex")
});
static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)</?[^>]+>").expect("tag regex"));

/// Reduce a page to readable text, one block per line.
///
/// Non-HTML input only gets its lines whitespace-normalised.
pub fn html_to_text(body: &str) -> String {
    let text = if RE_LOOKS_HTML.is_match(body) {
        let out = RE_DROP_BLOCKS.replace_all(body, "");
        let out = RE_BREAKS.replace_all(&out, "\n");
        let out = RE_TAGS.replace_all(&out, "");
        html_escape::decode_html_entities(&out).into_owned()
    } else {
        body.to_string()
    };

    text.lines()
        .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Shared reqwest client with the configured user agent and per-request timeout.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
    max_body: usize,
}

impl HttpFetcher {
    pub fn new(cfg: &ScrapingConfig) -> Result<Self> {
        let timeout = Duration::from_secs(cfg.request_timeout_secs);
        let client = Client::builder()
            .user_agent(cfg.user_agent.clone())
            .timeout(timeout)
            .build()
            .context("building HTTP client for page fetches")?;
        Ok(Self {
            client,
            timeout,
            max_body: MAX_BODY_BYTES,
        })
    }

    pub fn with_max_body(mut self, bytes: usize) -> Self {
        self.max_body = bytes;
        self
    }

    async fn fetch_raw(&self, url: &str) -> Result<String> {
        let mut resp = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()
            .with_context(|| format!("non-2xx from {url}"))?;

        if let Some(len) = resp.content_length() {
            if len > self.max_body as u64 {
                bail!("{url} declares {len} bytes, limit is {}", self.max_body);
            }
        }
        // Content-Length may be absent or wrong, so count while reading too.
        let mut body = Vec::new();
        while let Some(chunk) = resp
            .chunk()
            .await
            .with_context(|| format!("reading body of {url}"))?
        {
            if body.len() + chunk.len() > self.max_body {
                bail!("body of {url} exceeds {} bytes", self.max_body);
            }
            body.extend_from_slice(&chunk);
        }
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

#[async_trait::async_trait]
impl ContentFetcher for HttpFetcher {
    async fn fetch_text(&self, url: &str) -> Option<String> {
        match self.fetch_raw(url).await {
            Ok(body) => {
                let text = html_to_text(&body);
                if text.is_empty() {
                    tracing::warn!(target: "fetch", %url, "page produced no text");
                    None
                } else {
                    Some(text)
                }
            }
            Err(e) => {
                tracing::warn!(target: "fetch", %url, error = %format!("{e:#}"), "fetch failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_scripts_and_splits_blocks() {
        let html = r#"<!DOCTYPE html><html><head><title>x</title></head><body>
            <script>var a = "<p>deal £1</p>";</script>
            <div><h2>Big  sale</h2><p>TV &amp; soundbar <b>£199</b></p></div>
            <ul><li>one</li><li>two&nbsp;items</li></ul>
        </body></html>"#;
        let text = html_to_text(html);
        assert_eq!(text, "Big sale\nTV & soundbar £199\none\ntwo items");
    }

    #[test]
    fn plain_text_passes_through() {
        let text = html_to_text("  Deal £5  \n\n\t 10% off now \n");
        assert_eq!(text, "Deal £5\n10% off now");
    }

    #[test]
    fn entities_do_not_become_tags() {
        let text = html_to_text("<p>use &lt;b&gt; for bold</p>");
        assert_eq!(text, "use <b> for bold");
    }
}
