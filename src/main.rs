//! Deal notifier: binary entrypoint.
//! Scrapes deal pages, validates and dedupes candidates, and posts them to Telegram.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use deal_notifier::api::{self, AppState};
use deal_notifier::config::AppConfig;
use deal_notifier::ingest::config::{clean_sources, load_sources_default, load_sources_from};
use deal_notifier::metrics::Metrics;
use deal_notifier::notify::{DealMessage, DryRunNotifier, Notifier, TelegramNotifier};
use deal_notifier::orchestrator::Orchestrator;
use deal_notifier::telemetry;
use deal_notifier::validate::DealValidator;

const DEFAULT_TEMPLATE_PATH: &str = "config/deal_notifier.json";

#[derive(Parser, Debug)]
#[command(author, version, about = "Scrape deal pages and post new deals to a Telegram channel")]
struct Cli {
    /// Configuration file (TOML or JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log deals instead of sending them
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check the channel connection and send a sample deal
    Test,
    /// Scrape a single page once
    Scrape {
        #[arg(long)]
        url: String,
    },
    /// Scrape pages on a fixed interval until Ctrl-C
    Monitor(MonitorArgs),
    /// Validate and send one deal
    Notify(NotifyArgs),
    /// Run the HTTP wrapper
    Serve {
        #[arg(long, default_value = "127.0.0.1:5000")]
        bind: SocketAddr,
    },
    /// Write a configuration template
    InitConfig {
        #[arg(long, default_value = DEFAULT_TEMPLATE_PATH)]
        path: PathBuf,
    },
}

#[derive(Args, Debug)]
struct MonitorArgs {
    /// Page URLs to scrape
    #[arg(long, num_args = 1..)]
    urls: Vec<String>,

    /// File with a source list (TOML `sources = [...]` or a JSON array)
    #[arg(long, conflicts_with = "urls")]
    urls_file: Option<PathBuf>,

    /// Also expose Prometheus metrics on this address
    #[arg(long)]
    metrics_bind: Option<SocketAddr>,
}

#[derive(Args, Debug)]
struct NotifyArgs {
    #[arg(long)]
    title: String,
    #[arg(long)]
    url: String,
    #[arg(long)]
    price: Option<String>,
    #[arg(long)]
    description: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    if let Command::InitConfig { path } = &cli.command {
        AppConfig::write_template(path)?;
        println!("Configuration template written to {}", path.display());
        println!("Edit it with your bot token and channel id.");
        return Ok(());
    }

    let cfg = AppConfig::load(cli.config.as_deref())?;
    telemetry::init(&cfg.logging)?;

    let notifier = build_notifier(&cfg, cli.dry_run)?;

    match cli.command {
        Command::Test => run_test(&cfg, notifier).await,
        Command::Scrape { url } => {
            let orch = Orchestrator::from_config(&cfg, notifier)?;
            let report = orch.process_source(&url).await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Command::Monitor(args) => run_monitor(&cfg, notifier, args).await,
        Command::Notify(args) => run_notify(&cfg, notifier, args).await,
        Command::Serve { bind } => run_serve(&cfg, notifier, bind).await,
        Command::InitConfig { .. } => Ok(()),
    }
}

fn build_notifier(cfg: &AppConfig, dry_run: bool) -> Result<Arc<dyn Notifier>> {
    if dry_run {
        info!("dry run: deals will be logged, not sent");
        return Ok(Arc::new(DryRunNotifier));
    }
    let tg = TelegramNotifier::new(&cfg.telegram)
        .context("configuring Telegram notifier (use --dry-run to skip)")?;
    Ok(Arc::new(tg))
}

async fn run_test(cfg: &AppConfig, notifier: Arc<dyn Notifier>) -> Result<()> {
    info!("testing deal notifier");
    if !notifier.test_connection().await {
        bail!("{} connection test failed", notifier.name());
    }

    let sample = DealMessage {
        title: "Test Deal - LEGO Star Wars AT-AT".to_string(),
        url: "https://example.com/deal".to_string(),
        price: Some("£42.99".to_string()),
        description: None,
    };
    let validator = DealValidator::new(cfg.validator.clone());
    let verdict = validator.validate_deal(&sample.title, &sample.url, sample.price.as_deref(), None);
    if !verdict.is_valid() {
        bail!("sample deal failed validation: {}", verdict.error_messages().join("; "));
    }

    let out = notifier.send_deal(&sample).await?;
    if !out.accepted {
        bail!("sample deal was not accepted: {}", out.raw);
    }
    println!("Test passed: connection ok, sample deal sent");
    Ok(())
}

async fn run_monitor(cfg: &AppConfig, notifier: Arc<dyn Notifier>, args: MonitorArgs) -> Result<()> {
    let urls = match (&args.urls_file, args.urls.is_empty()) {
        (Some(path), _) => load_sources_from(path)?,
        (None, false) => clean_sources(args.urls.clone()),
        (None, true) => load_sources_default()?,
    };
    if urls.is_empty() {
        bail!("no sources given (use --urls, --urls-file or config/sources.toml)");
    }

    if let Some(bind) = args.metrics_bind {
        let metrics = Metrics::init()?;
        let listener = tokio::net::TcpListener::bind(bind)
            .await
            .with_context(|| format!("binding metrics listener on {bind}"))?;
        info!(%bind, "serving /metrics");
        let app = metrics.router();
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!(error = %e, "metrics server stopped");
            }
        });
    }

    let orch = Orchestrator::from_config(cfg, notifier)?;
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl-C received, stopping"),
            Err(e) => warn!(error = %e, "could not listen for Ctrl-C"),
        }
        on_signal.cancel();
    });

    let outcome = orch.run_forever(&urls, None, &cancel).await?;
    info!(cycles = outcome.cycles, "monitor finished");
    Ok(())
}

async fn run_notify(cfg: &AppConfig, notifier: Arc<dyn Notifier>, args: NotifyArgs) -> Result<()> {
    let validator = DealValidator::new(cfg.validator.clone());
    let verdict = validator.validate_deal(
        &args.title,
        &args.url,
        args.price.as_deref(),
        args.description.as_deref(),
    );
    if !verdict.is_valid() {
        bail!("deal failed validation: {}", verdict.error_messages().join("; "));
    }

    let msg = DealMessage {
        title: args.title,
        url: args.url,
        price: args.price,
        description: args.description,
    };
    let out = notifier.send_deal(&msg).await?;
    if !out.accepted {
        bail!("deal was not accepted: {}", out.raw);
    }
    println!("Deal sent: {}", msg.title);
    Ok(())
}

async fn run_serve(cfg: &AppConfig, notifier: Arc<dyn Notifier>, bind: SocketAddr) -> Result<()> {
    let metrics = Metrics::init()?;
    let state = AppState::new(notifier, DealValidator::new(cfg.validator.clone()));
    let app = api::router_with_metrics(state, &metrics);

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("binding {bind}"))?;
    info!(%bind, "deal notifier HTTP wrapper listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("HTTP server")
}
