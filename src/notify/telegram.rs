// src/notify/telegram.rs
use anyhow::{anyhow, Context, Result};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::{DealMessage, DispatchOutcome, MessageFormat, Notifier};
use crate::config::TelegramConfig;

const DESCRIPTION_PREVIEW_CHARS: usize = 200;

/// Telegram Bot API channel poster.
pub struct TelegramNotifier {
    api_base: String,
    token: String,
    channel_id: String,
    format: MessageFormat,
    disable_preview: bool,
    client: Client,
    timeout: Duration,
    max_retries: u8,
    retry_delay: Duration,
    min_spacing: Duration,
    last_send: Mutex<Option<Instant>>,
}

impl TelegramNotifier {
    pub fn new(cfg: &TelegramConfig) -> Result<Self> {
        cfg.require_credentials()?;
        let timeout = Duration::from_secs(cfg.timeout_secs.max(1));
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("building Telegram HTTP client")?;
        Ok(Self {
            api_base: cfg.api_base.trim_end_matches('/').to_string(),
            token: cfg.bot_token.clone(),
            channel_id: cfg.channel_id.clone(),
            format: cfg.format,
            disable_preview: cfg.disable_web_page_preview,
            client,
            timeout,
            max_retries: cfg.max_retries.max(1),
            retry_delay: Duration::try_from_secs_f64(cfg.retry_delay_secs).unwrap_or_default(),
            min_spacing: Duration::try_from_secs_f64(cfg.rate_limit_secs).unwrap_or_default(),
            last_send: Mutex::new(None),
        })
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.max(1);
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_rate_limit(mut self, spacing: Duration) -> Self {
        self.min_spacing = spacing;
        self
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    /// Hold the send slot until `min_spacing` has passed since the previous send.
    async fn throttle(&self) {
        let mut last = self.last_send.lock().await;
        if let Some(prev) = *last {
            let wait = self.min_spacing.saturating_sub(prev.elapsed());
            if !wait.is_zero() {
                tokio::time::sleep(wait).await;
            }
        }
        *last = Some(Instant::now());
    }

    fn backoff(&self, attempt: u8, retry_after: Option<u64>) -> Duration {
        match retry_after {
            Some(secs) => Duration::from_secs(secs),
            None => self
                .retry_delay
                .checked_mul(1u32 << attempt.saturating_sub(1).min(16))
                .unwrap_or(Duration::MAX),
        }
    }

    async fn post_message(&self, payload: &SendMessage<'_>) -> Result<DispatchOutcome> {
        let url = self.method_url("sendMessage");
        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            self.throttle().await;

            let res = self
                .client
                .post(&url)
                .timeout(self.timeout)
                .json(payload)
                .send()
                .await;

            match res {
                Ok(rsp) => {
                    let status = rsp.status();
                    let body = rsp.text().await.unwrap_or_default();
                    let raw: Value = serde_json::from_str(&body).unwrap_or_else(|_| {
                        json!({ "ok": false, "description": format!("non-JSON response ({status})") })
                    });

                    if status.is_success() {
                        let accepted = raw.get("ok").and_then(Value::as_bool).unwrap_or(false);
                        return Ok(DispatchOutcome { accepted, raw });
                    }

                    let retryable =
                        status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS;
                    if retryable && attempt < self.max_retries {
                        let retry_after = raw
                            .pointer("/parameters/retry_after")
                            .and_then(Value::as_u64);
                        let wait = self.backoff(attempt, retry_after);
                        tracing::warn!(
                            target: "notify",
                            %status, attempt, wait_ms = wait.as_millis() as u64,
                            "Telegram send failed, retrying"
                        );
                        tokio::time::sleep(wait).await;
                        continue;
                    }
                    return Ok(DispatchOutcome {
                        accepted: false,
                        raw,
                    });
                }
                Err(e) => {
                    // Drop the URL: it carries the bot token.
                    let e = e.without_url();
                    if attempt < self.max_retries {
                        let wait = self.backoff(attempt, None);
                        tracing::warn!(
                            target: "notify",
                            error = %e, attempt, wait_ms = wait.as_millis() as u64,
                            "Telegram request error, retrying"
                        );
                        tokio::time::sleep(wait).await;
                        continue;
                    }
                    return Err(anyhow!("Telegram request failed: {e}"));
                }
            }
        }
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: String,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

#[async_trait::async_trait]
impl Notifier for TelegramNotifier {
    async fn test_connection(&self) -> bool {
        let res = self
            .client
            .get(self.method_url("getMe"))
            .timeout(self.timeout)
            .send()
            .await;
        let rsp = match res {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(target: "notify", error = %e.without_url(), "Telegram connection test failed");
                return false;
            }
        };
        match rsp.json::<Value>().await {
            Ok(v) if v.get("ok").and_then(Value::as_bool) == Some(true) => {
                let username = v
                    .pointer("/result/username")
                    .and_then(Value::as_str)
                    .unwrap_or("?");
                tracing::info!(target: "notify", bot = %username, "Telegram connection ok");
                true
            }
            Ok(v) => {
                tracing::error!(target: "notify", response = %v, "Telegram rejected getMe");
                false
            }
            Err(e) => {
                tracing::error!(target: "notify", error = %e.without_url(), "Telegram getMe unreadable");
                false
            }
        }
    }

    async fn send_deal(&self, deal: &DealMessage) -> Result<DispatchOutcome> {
        let payload = SendMessage {
            chat_id: &self.channel_id,
            text: render_message(deal, self.format),
            parse_mode: parse_mode(self.format),
            disable_web_page_preview: self.disable_preview,
        };
        let out = self.post_message(&payload).await?;
        if out.accepted {
            tracing::info!(target: "notify", title = %deal.title, "deal notification sent");
        } else {
            let reason = out
                .raw
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            tracing::error!(target: "notify", %reason, "Telegram refused deal notification");
        }
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "telegram"
    }
}

fn parse_mode(format: MessageFormat) -> &'static str {
    match format {
        MessageFormat::Html => "HTML",
        MessageFormat::Markdown => "MarkdownV2",
    }
}

fn preview(description: &str) -> String {
    if description.chars().count() > DESCRIPTION_PREVIEW_CHARS {
        let head: String = description.chars().take(DESCRIPTION_PREVIEW_CHARS).collect();
        format!("{head}...")
    } else {
        description.to_string()
    }
}

/// Render a deal as a Telegram message body in the given markup.
pub fn render_message(deal: &DealMessage, format: MessageFormat) -> String {
    let price = deal.price.as_deref().map(str::trim).filter(|p| !p.is_empty());
    let desc = deal
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(preview);

    match format {
        MessageFormat::Html => {
            let mut msg = format!(
                "🔥 <b>New Deal Spotted!</b>\n📦 <b>Item:</b> {}",
                html_escape::encode_text(&deal.title)
            );
            if let Some(p) = price {
                msg.push_str(&format!("\n💸 <b>Price:</b> {}", html_escape::encode_text(p)));
            }
            if let Some(d) = desc {
                msg.push_str(&format!(
                    "\n📝 <b>Description:</b> {}",
                    html_escape::encode_text(&d)
                ));
            }
            msg.push_str(&format!(
                "\n🔗 <a href=\"{}\">View Deal</a>",
                html_escape::encode_double_quoted_attribute(&deal.url)
            ));
            msg
        }
        MessageFormat::Markdown => {
            let mut msg = format!(
                "🔥 *New Deal Spotted\\!*\n📦 *Item:* {}",
                escape_markdown(&deal.title)
            );
            if let Some(p) = price {
                msg.push_str(&format!("\n💸 *Price:* {}", escape_markdown(p)));
            }
            if let Some(d) = desc {
                msg.push_str(&format!("\n📝 *Description:* {}", escape_markdown(&d)));
            }
            msg.push_str(&format!(
                "\n🔗 [View Deal]({})",
                deal.url.replace('\\', "\\\\").replace(')', "\\)")
            ));
            msg
        }
    }
}

/// Escape MarkdownV2 reserved characters.
fn escape_markdown(s: &str) -> String {
    const RESERVED: &str = "_*[]()~`>#+-=|{}.!\\";
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        if RESERVED.contains(ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}
