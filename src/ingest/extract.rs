// src/ingest/extract.rs
//! Line-oriented deal extraction.
//!
//! Each non-blank line is tested against a few deal indicators (keyword next to a
//! currency amount, "was £X now £Y" phrasing, "N% off"). A matching line becomes one
//! candidate: its first 100 chars are the title, the full line is the description,
//! and the first bare URL within two lines either side is the link (falling back to
//! the page URL). Crude on purpose; it works on any site's text.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::deal::CandidateDeal;
use crate::ingest::types::ExtractionStrategy;

pub const TITLE_MAX_CHARS: usize = 100;
const URL_WINDOW: usize = 2;

static DEAL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)(deal|offer|sale|discount|off).*?([£$€¥₹]\d+[.,]?\d*)",
        r"(?i)(was|rrp|originally)\s*([£$€¥₹]\d+[.,]?\d*).*?now\s*([£$€¥₹]\d+[.,]?\d*)",
        r"(?i)(\d+%)\s*(off|discount|save)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("deal pattern"))
    .collect()
});

static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+").expect("url regex"));
static PRICE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[£$€¥₹]\d+[.,]?\d*").expect("price regex"));

#[derive(Debug, Clone, Copy, Default)]
pub struct PatternExtractor;

impl PatternExtractor {
    pub fn new() -> Self {
        Self
    }

    /// True if any deal indicator fires on `line`.
    pub fn is_deal_line(line: &str) -> bool {
        DEAL_PATTERNS.iter().any(|re| re.is_match(line))
    }
}

impl ExtractionStrategy for PatternExtractor {
    fn extract(&self, content: &str, source_url: &str) -> Vec<CandidateDeal> {
        let lines: Vec<&str> = content.lines().collect();
        let mut out = Vec::new();

        for (i, raw) in lines.iter().enumerate() {
            let line = raw.trim();
            if line.is_empty() || !Self::is_deal_line(line) {
                continue;
            }

            let title: String = line.chars().take(TITLE_MAX_CHARS).collect();

            let lo = i.saturating_sub(URL_WINDOW);
            let hi = (i + URL_WINDOW + 1).min(lines.len());
            let url = lines[lo..hi]
                .iter()
                .find_map(|l| URL_RE.find(l))
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| source_url.to_string());

            let price = PRICE_RE.find(line).map(|m| m.as_str().to_string());

            out.push(CandidateDeal {
                title,
                url,
                price,
                description: Some(line.to_string()),
                source: source_url.to_string(),
            });
        }

        tracing::debug!(
            target: "extract",
            source = %source_url,
            lines = lines.len(),
            found = out.len(),
            "pattern extraction done"
        );
        out
    }

    fn name(&self) -> &'static str {
        "pattern"
    }
}
