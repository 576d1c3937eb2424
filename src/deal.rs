// src/deal.rs
//! Candidate deal records and the identity used to deduplicate them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of leading title characters that take part in a deal's identity.
pub const IDENTITY_TITLE_CHARS: usize = 50;

/// An unvalidated deal as produced by an extraction strategy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CandidateDeal {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Where the deal came from (site name or page URL).
    pub source: String,
}

impl CandidateDeal {
    pub fn identity(&self) -> DealIdentity {
        DealIdentity::new(&self.title, &self.url)
    }
}

/// Dedup key: first 50 chars of the title followed by the full URL.
///
/// Two postings sharing a URL and a title prefix are the same deal, even if
/// their price, description or source differ.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DealIdentity(String);

impl DealIdentity {
    pub fn new(title: &str, url: &str) -> Self {
        let head: String = title.chars().take(IDENTITY_TITLE_CHARS).collect();
        Self(format!("{head}_{url}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short stable hash for logs, so titles and URLs never land in log lines verbatim.
    pub fn fingerprint(&self) -> String {
        use sha2::{Digest, Sha256};
        let digest = Sha256::digest(self.0.as_bytes());
        let mut out = String::with_capacity(12);
        for b in digest.iter().take(6) {
            use std::fmt::Write as _;
            let _ = write!(&mut out, "{:02x}", b);
        }
        out
    }
}

impl fmt::Display for DealIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
