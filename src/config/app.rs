// src/config/app.rs
use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use std::{env, fs};

use crate::notify::MessageFormat;
use crate::validate::ValidatorConfig;

pub const ENV_CONFIG_PATH: &str = "DEAL_NOTIFIER_CONFIG";
/// Upper bound for the Telegram retry delay and send spacing.
const MAX_DELAY_SECS: f64 = 3600.0;
const FALLBACK_PATHS: [&str; 2] = ["config/deal_notifier.toml", "config/deal_notifier.json"];

fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// `@channel` handle or numeric chat id.
    pub channel_id: String,
    pub format: MessageFormat,
    pub max_retries: u8,
    pub retry_delay_secs: f64,
    /// Minimum spacing between two sends.
    pub rate_limit_secs: f64,
    pub disable_web_page_preview: bool,
    pub api_base: String,
    pub timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            channel_id: String::new(),
            format: MessageFormat::Html,
            max_retries: 3,
            retry_delay_secs: 2.0,
            rate_limit_secs: 1.0,
            disable_web_page_preview: false,
            api_base: default_api_base(),
            timeout_secs: 10,
        }
    }
}

impl TelegramConfig {
    pub fn require_credentials(&self) -> Result<()> {
        if self.bot_token.trim().is_empty() {
            bail!("Missing Telegram bot token (set TELEGRAM_BOT_TOKEN or telegram.bot_token)");
        }
        if self.channel_id.trim().is_empty() {
            bail!("Missing Telegram channel id (set TELEGRAM_CHANNEL_ID or telegram.channel_id)");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapingConfig {
    pub scrape_interval_secs: u64,
    pub max_concurrent_scrapes: usize,
    pub request_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for ScrapingConfig {
    fn default() -> Self {
        Self {
            scrape_interval_secs: 300,
            max_concurrent_scrapes: 5,
            request_timeout_secs: 10,
            user_agent: "Deal Scraper Bot 1.0".to_string(),
        }
    }
}

impl ScrapingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.scrape_interval_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(anyhow!("unknown log format `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when RUST_LOG is unset.
    pub level: String,
    pub format: LogFormat,
    pub file_path: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
            file_path: Some(PathBuf::from("deal_notifier.log")),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub telegram: TelegramConfig,
    pub scraping: ScrapingConfig,
    pub logging: LoggingConfig,
    pub validator: ValidatorConfig,
}

impl AppConfig {
    /// Defaults, then the config file (explicit path or fallbacks), then env overrides.
    ///
    /// File lookup when `path` is `None`:
    /// 1) $DEAL_NOTIFIER_CONFIG
    /// 2) config/deal_notifier.toml
    /// 3) config/deal_notifier.json
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut cfg = match resolve_path(path)? {
            Some(p) => Self::load_from_file(&p)?,
            None => Self::default(),
        };
        cfg.apply_env();
        cfg.sanitize();
        Ok(cfg)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg = match ext.as_str() {
            "toml" => toml::from_str(&data).context("parsing TOML config")?,
            "json" => serde_json::from_str(&data).context("parsing JSON config")?,
            _ => match serde_json::from_str(&data) {
                Ok(cfg) => cfg,
                Err(_) => toml::from_str(&data)
                    .map_err(|e| anyhow!("unsupported config format: {e}"))?,
            },
        };
        Ok(cfg)
    }

    /// Write a JSON template with placeholder credentials.
    pub fn write_template<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        let mut tpl = Self::default();
        tpl.telegram.bot_token = "YOUR_BOT_TOKEN_HERE".to_string();
        tpl.telegram.channel_id = "@your_channel_here".to_string();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating {}", dir.display()))?;
        }
        let body = serde_json::to_string_pretty(&tpl)?;
        fs::write(path, body).with_context(|| format!("writing {}", path.display()))?;
        tracing::info!(path = %path.display(), "configuration template saved");
        Ok(())
    }

    fn apply_env(&mut self) {
        let t = &mut self.telegram;
        if let Some(v) = env_string("TELEGRAM_BOT_TOKEN") {
            t.bot_token = v;
        }
        if let Some(v) = env_string("TELEGRAM_CHANNEL_ID") {
            t.channel_id = v;
        }
        if let Some(v) = env_parse("TELEGRAM_FORMAT") {
            t.format = v;
        }
        if let Some(v) = env_parse("TELEGRAM_MAX_RETRIES") {
            t.max_retries = v;
        }
        if let Some(v) = env_parse("TELEGRAM_RETRY_DELAY") {
            t.retry_delay_secs = v;
        }
        if let Some(v) = env_parse("TELEGRAM_RATE_LIMIT") {
            t.rate_limit_secs = v;
        }
        if let Some(v) = env_string("TELEGRAM_DISABLE_PREVIEW") {
            t.disable_web_page_preview = v.eq_ignore_ascii_case("true") || v == "1";
        }

        let s = &mut self.scraping;
        if let Some(v) = env_parse("SCRAPE_INTERVAL") {
            s.scrape_interval_secs = v;
        }
        if let Some(v) = env_parse("MAX_CONCURRENT_SCRAPES") {
            s.max_concurrent_scrapes = v;
        }
        if let Some(v) = env_parse("REQUEST_TIMEOUT") {
            s.request_timeout_secs = v;
        }
        if let Some(v) = env_string("USER_AGENT") {
            s.user_agent = v;
        }

        let l = &mut self.logging;
        if let Some(v) = env_string("LOG_LEVEL") {
            l.level = v.to_ascii_lowercase();
        }
        if let Some(v) = env_parse("LOG_FORMAT") {
            l.format = v;
        }
        if let Ok(v) = env::var("LOG_FILE") {
            let v = v.trim();
            l.file_path = (!v.is_empty()).then(|| PathBuf::from(v));
        }
    }

    fn sanitize(&mut self) {
        let t = &mut self.telegram;
        if !t.retry_delay_secs.is_finite() || t.retry_delay_secs < 0.0 {
            t.retry_delay_secs = 0.0;
        }
        if !t.rate_limit_secs.is_finite() || t.rate_limit_secs < 0.0 {
            t.rate_limit_secs = 0.0;
        }
        t.retry_delay_secs = t.retry_delay_secs.min(MAX_DELAY_SECS);
        t.rate_limit_secs = t.rate_limit_secs.min(MAX_DELAY_SECS);
        t.max_retries = t.max_retries.max(1);
        t.api_base = t.api_base.trim_end_matches('/').to_string();

        self.scraping.max_concurrent_scrapes = self.scraping.max_concurrent_scrapes.max(1);

        let v = &mut self.validator;
        if v.min_title_len > v.max_title_len {
            std::mem::swap(&mut v.min_title_len, &mut v.max_title_len);
        }
    }
}

fn resolve_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(p) = explicit {
        return Ok(Some(p.to_path_buf()));
    }
    if let Ok(p) = env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return Ok(Some(pb));
        }
        bail!("{ENV_CONFIG_PATH} points to non-existent path");
    }
    Ok(FALLBACK_PATHS
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists()))
}

fn env_string(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = env_string(key)?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(%key, value = %raw, "ignoring unparseable env override");
            None
        }
    }
}
