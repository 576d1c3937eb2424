// src/ingest/config.rs
//! Source page lists for `monitor`.
//!
//! A list file is either TOML (`sources = ["https://..."]`) or JSON (a bare array,
//! or `{"sources": [...]}`). Entries that are not absolute http(s) URLs are dropped
//! with a warning; the rest keep their first-seen order.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

pub const ENV_SOURCES_PATH: &str = "DEAL_SOURCES_PATH";
const FALLBACK_PATHS: [&str; 2] = ["config/sources.toml", "config/sources.json"];

#[derive(Deserialize)]
#[serde(untagged)]
enum SourceFile {
    Table { sources: Vec<String> },
    Bare(Vec<String>),
}

impl SourceFile {
    fn into_entries(self) -> Vec<String> {
        match self {
            SourceFile::Table { sources } => sources,
            SourceFile::Bare(list) => list,
        }
    }
}

/// Read a source list file. The extension picks the format; anything else is
/// tried as JSON, then TOML.
pub fn load_sources_from(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading source list from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();

    let file: SourceFile = match ext.as_str() {
        "toml" => toml::from_str(&content)
            .with_context(|| format!("parsing TOML source list {}", path.display()))?,
        "json" => serde_json::from_str(&content)
            .with_context(|| format!("parsing JSON source list {}", path.display()))?,
        _ => match serde_json::from_str(&content) {
            Ok(f) => f,
            Err(_) => toml::from_str(&content).with_context(|| {
                format!("{} is neither a JSON nor a TOML source list", path.display())
            })?,
        },
    };

    let sources = clean_sources(file.into_entries());
    tracing::info!(
        target: "ingest",
        path = %path.display(),
        sources = sources.len(),
        "source list loaded"
    );
    Ok(sources)
}

/// `$DEAL_SOURCES_PATH` (must exist), else `config/sources.toml`, else
/// `config/sources.json`, else an empty list.
pub fn load_sources_default() -> Result<Vec<String>> {
    if let Ok(p) = std::env::var(ENV_SOURCES_PATH) {
        let pb = PathBuf::from(p);
        if !pb.exists() {
            bail!("{ENV_SOURCES_PATH} points to non-existent path {}", pb.display());
        }
        return load_sources_from(&pb);
    }
    match FALLBACK_PATHS.iter().map(Path::new).find(|p| p.exists()) {
        Some(p) => load_sources_from(p),
        None => Ok(Vec::new()),
    }
}

/// Keep absolute http(s) URLs with a host, trimmed. Repeats are detected on the
/// parsed form, so `https://a.test` and `https://a.test/` count once.
pub fn clean_sources(entries: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(entries.len());
    for raw in entries {
        let entry = raw.trim();
        if entry.is_empty() {
            continue;
        }
        match source_url(entry) {
            Ok(parsed) => {
                if seen.insert(parsed.to_string()) {
                    out.push(entry.to_string());
                }
            }
            Err(reason) => {
                tracing::warn!(target: "ingest", source = %entry, %reason, "skipping source");
            }
        }
    }
    out
}

fn source_url(entry: &str) -> std::result::Result<Url, String> {
    let parsed = Url::parse(entry).map_err(|e| e.to_string())?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(format!("scheme `{}` is not http(s)", parsed.scheme()));
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err("no host".to_string());
    }
    Ok(parsed)
}
