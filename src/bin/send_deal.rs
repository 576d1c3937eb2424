//! One-shot helper: post a single deal to the configured Telegram channel.
//! With no arguments it sends a sample deal, which doubles as a smoke test.

use anyhow::{bail, Result};
use clap::Parser;

use deal_notifier::config::AppConfig;
use deal_notifier::notify::{DealMessage, Notifier, TelegramNotifier};

#[derive(Parser, Debug)]
#[command(about = "Send one deal notification")]
struct Args {
    title: Option<String>,
    url: Option<String>,
    #[arg(long)]
    price: Option<String>,
    #[arg(long)]
    description: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_target(false).init();

    let args = Args::parse();
    let deal = match (args.title, args.url) {
        (Some(title), Some(url)) => DealMessage {
            title,
            url,
            price: args.price,
            description: args.description,
        },
        (None, None) => DealMessage {
            title: "LEGO Star Wars AT-AT Walker 75288".to_string(),
            url: "https://example.com/lego-deal".to_string(),
            price: Some("£42.99".to_string()),
            description: Some("Amazing deal on LEGO Star Wars set with free shipping!".to_string()),
        },
        _ => bail!("give both a title and a url, or neither for the sample deal"),
    };

    let cfg = AppConfig::load(None)?;
    let notifier = TelegramNotifier::new(&cfg.telegram)?;
    let out = notifier.send_deal(&deal).await?;
    if !out.accepted {
        bail!("notification failed: {}", out.raw);
    }
    println!("deal notification sent: {}", deal.title);
    Ok(())
}
