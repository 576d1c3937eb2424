// src/validate.rs
//! Deal validation rules.
//!
//! A candidate passes or fails on its title and URL alone. Price and description
//! can only ever add warnings, and so can the spam heuristics:
//! - runs of five or more capital letters
//! - three or more exclamation marks in a row
//! - nested `www.` domains inside free text
//! - a title longer than 20 characters with no spaces at all
//!
//! Warnings are advisory. They are logged and returned, never used to block a send.
//!
//! The validator holds no state beyond its configured bounds, so one instance can be
//! shared freely between concurrent pipelines.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use crate::deal::CandidateDeal;

const ALLOWED_SCHEMES: [&str; 2] = ["http", "https"];

/// Retailers whose name in a title is expected to show up in the deal's host.
const KNOWN_RETAILERS: [&str; 7] = ["amazon", "ebay", "argos", "currys", "johnlewis", "ao", "very"];

static SPAM_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (Regex::new(r"[A-Z]{5,}").expect("caps regex"), "excessive capitals"),
        (Regex::new(r"!{3,}").expect("bang regex"), "repeated exclamation marks"),
        (
            Regex::new(r"www\..*\..*\..*").expect("nested domain regex"),
            "nested domain pattern",
        ),
    ]
});

static PRICE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)[\$£€¥₹][\d,]+\.?\d*",
        r"(?i)\d+[\.,]\d+\s*[\$£€¥₹]",
        r"(?i)[\$£€¥₹]?\s*\d+[\.,]?\d*",
        r"(?i)free",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("price regex"))
    .collect()
});

/// Bounds used by [`DealValidator`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    pub min_title_len: usize,
    pub max_title_len: usize,
    pub max_description_len: usize,
    pub max_price_len: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            min_title_len: 3,
            max_title_len: 200,
            max_description_len: 500,
            max_price_len: 50,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DealField {
    Title,
    Url,
    Price,
    Description,
}

impl fmt::Display for DealField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DealField::Title => "title",
            DealField::Url => "url",
            DealField::Price => "price",
            DealField::Description => "description",
        })
    }
}

/// Reasons a candidate is refused outright.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("title cannot be empty")]
    EmptyTitle,
    #[error("title must be at least {min} characters long")]
    TitleTooShort { min: usize },
    #[error("title must be no more than {max} characters long")]
    TitleTooLong { max: usize },
    #[error("URL cannot be empty")]
    EmptyUrl,
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: DealField,
    pub error: ValidationError,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.error)
    }
}

impl Serialize for FieldError {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

/// Outcome of a single field check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldCheck {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<String>,
}

impl FieldCheck {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Aggregated result over all fields. Valid iff there are no errors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub errors: Vec<FieldError>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }

    pub fn has_error(&self, error: &ValidationError) -> bool {
        self.errors.iter().any(|e| &e.error == error)
    }

    fn absorb(&mut self, field: DealField, check: FieldCheck) {
        self.errors
            .extend(check.errors.into_iter().map(|error| FieldError { field, error }));
        self.warnings
            .extend(check.warnings.into_iter().map(|w| format!("{field}: {w}")));
    }
}

#[derive(Debug, Clone, Default)]
pub struct DealValidator {
    cfg: ValidatorConfig,
}

impl DealValidator {
    pub fn new(cfg: ValidatorConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.cfg
    }

    pub fn validate_title(&self, title: &str) -> FieldCheck {
        let mut out = FieldCheck::default();
        let title = title.trim();
        if title.is_empty() {
            out.errors.push(ValidationError::EmptyTitle);
            return out;
        }

        let len = title.chars().count();
        if len < self.cfg.min_title_len {
            out.errors.push(ValidationError::TitleTooShort {
                min: self.cfg.min_title_len,
            });
        }
        if len > self.cfg.max_title_len {
            out.errors.push(ValidationError::TitleTooLong {
                max: self.cfg.max_title_len,
            });
        }

        out.warnings.extend(spam_warnings(title));
        if !title.contains(' ') && len > 20 {
            out.warnings
                .push("very long without spaces, may be suspicious".to_string());
        }
        out
    }

    pub fn validate_url(&self, url: &str) -> FieldCheck {
        let mut out = FieldCheck::default();
        let url = url.trim();
        if url.is_empty() {
            out.errors.push(ValidationError::EmptyUrl);
            return out;
        }

        let parsed = match Url::parse(url) {
            Ok(u) => u,
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                out.errors.push(ValidationError::InvalidUrl(
                    "URL must include a scheme (http/https)".into(),
                ));
                return out;
            }
            Err(url::ParseError::EmptyHost) => {
                out.errors
                    .push(ValidationError::InvalidUrl("URL must include a domain".into()));
                return out;
            }
            Err(e) => {
                out.errors
                    .push(ValidationError::InvalidUrl(format!("malformed URL ({e})")));
                return out;
            }
        };

        if !ALLOWED_SCHEMES.contains(&parsed.scheme()) {
            out.errors.push(ValidationError::InvalidUrl(format!(
                "scheme `{}` not allowed, expected http or https",
                parsed.scheme()
            )));
        }

        // The parser invents a host for `https:example.com` and `http:/example.com`;
        // require a literal `//authority` in the input.
        let has_authority = url
            .get(parsed.scheme().len() + 1..)
            .and_then(|rest| rest.strip_prefix("//"))
            .is_some_and(|auth| !auth.is_empty() && !auth.starts_with('/'));

        match parsed.host_str().filter(|h| has_authority && !h.is_empty()) {
            None => out
                .errors
                .push(ValidationError::InvalidUrl("URL must include a domain".into())),
            Some(host) => {
                if host.split('.').count() > 4 {
                    out.warnings
                        .push("domain has many subdomains, may be suspicious".to_string());
                }
            }
        }
        out
    }

    pub fn validate_price(&self, price: Option<&str>) -> FieldCheck {
        let mut out = FieldCheck::default();
        let Some(price) = price.map(str::trim).filter(|p| !p.is_empty()) else {
            return out;
        };

        if !PRICE_PATTERNS.iter().any(|re| re.is_match(price)) {
            out.warnings
                .push("format doesn't match common price patterns".to_string());
        }
        if price.chars().count() > self.cfg.max_price_len {
            out.warnings.push("price string is unusually long".to_string());
        }
        out
    }

    pub fn validate_description(&self, description: Option<&str>) -> FieldCheck {
        let mut out = FieldCheck::default();
        let Some(desc) = description.map(str::trim).filter(|d| !d.is_empty()) else {
            return out;
        };

        if desc.chars().count() > self.cfg.max_description_len {
            out.warnings.push(format!(
                "longer than {} characters and will be truncated",
                self.cfg.max_description_len
            ));
        }
        out.warnings.extend(spam_warnings(desc));
        out
    }

    /// Validate every field and the title/host cross-check. Findings are logged here too.
    pub fn validate_deal(
        &self,
        title: &str,
        url: &str,
        price: Option<&str>,
        description: Option<&str>,
    ) -> ValidationResult {
        let mut result = ValidationResult::default();
        result.absorb(DealField::Title, self.validate_title(title));
        result.absorb(DealField::Url, self.validate_url(url));
        result.absorb(DealField::Price, self.validate_price(price));
        result.absorb(DealField::Description, self.validate_description(description));

        if let Some(w) = retailer_mismatch(title, url) {
            result.warnings.push(w);
        }

        if !result.warnings.is_empty() {
            tracing::warn!(
                target: "validate",
                warnings = %result.warnings.join("; "),
                "deal validation warnings"
            );
        }
        if !result.is_valid() {
            tracing::error!(
                target: "validate",
                errors = %result.error_messages().join("; "),
                "deal validation errors"
            );
        }
        result
    }

    pub fn validate(&self, deal: &CandidateDeal) -> ValidationResult {
        self.validate_deal(
            &deal.title,
            &deal.url,
            deal.price.as_deref(),
            deal.description.as_deref(),
        )
    }
}

fn spam_warnings(text: &str) -> Vec<String> {
    SPAM_PATTERNS
        .iter()
        .filter(|(re, _)| re.is_match(text))
        .map(|(_, label)| format!("may contain spam-like content ({label})"))
        .collect()
}

/// First known retailer named in the title but absent from the URL host.
fn retailer_mismatch(title: &str, url: &str) -> Option<String> {
    if title.trim().is_empty() || url.trim().is_empty() {
        return None;
    }
    let host = Url::parse(url.trim())
        .ok()?
        .host_str()
        .map(str::to_ascii_lowercase)?;
    let title_lower = title.to_lowercase();
    KNOWN_RETAILERS
        .iter()
        .find(|site| title_lower.contains(*site) && !host.contains(*site))
        .map(|site| format!("title mentions {site} but URL is from {host}"))
}
