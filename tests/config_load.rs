// tests/config_load.rs
//
// AppConfig resolution: file formats, fallback paths, env overrides.
// Env and CWD are process-global, so every test here is serialised.

use std::{env, fs};

use deal_notifier::config::{AppConfig, LogFormat, ENV_CONFIG_PATH};
use deal_notifier::notify::MessageFormat;

const ENV_KEYS: &[&str] = &[
    ENV_CONFIG_PATH,
    "TELEGRAM_BOT_TOKEN",
    "TELEGRAM_CHANNEL_ID",
    "TELEGRAM_FORMAT",
    "TELEGRAM_MAX_RETRIES",
    "TELEGRAM_RETRY_DELAY",
    "TELEGRAM_RATE_LIMIT",
    "TELEGRAM_DISABLE_PREVIEW",
    "SCRAPE_INTERVAL",
    "MAX_CONCURRENT_SCRAPES",
    "REQUEST_TIMEOUT",
    "USER_AGENT",
    "LOG_LEVEL",
    "LOG_FORMAT",
    "LOG_FILE",
];

fn clear_env() {
    for k in ENV_KEYS {
        env::remove_var(k);
    }
}

/// Run `f` with CWD inside a fresh temp dir so the repo's own config/ is never read.
fn in_temp_cwd<F: FnOnce(&std::path::Path)>(f: F) {
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();
    clear_env();
    f(tmp.path());
    clear_env();
    env::set_current_dir(old).unwrap();
}

#[serial_test::serial]
#[test]
fn no_file_no_env_gives_defaults() {
    in_temp_cwd(|_| {
        let cfg = AppConfig::load(None).unwrap();
        assert_eq!(cfg.scraping.scrape_interval_secs, 300);
        assert_eq!(cfg.scraping.user_agent, "Deal Scraper Bot 1.0");
        assert_eq!(cfg.logging.format, LogFormat::Compact);
        assert!(cfg.telegram.bot_token.is_empty());
    });
}

#[serial_test::serial]
#[test]
fn toml_fallback_then_env_wins() {
    in_temp_cwd(|dir| {
        fs::create_dir_all(dir.join("config")).unwrap();
        fs::write(
            dir.join("config/deal_notifier.toml"),
            r#"
[telegram]
bot_token = "file-token"
channel_id = "@file_channel"

[scraping]
scrape_interval_secs = 120
max_concurrent_scrapes = 2
"#,
        )
        .unwrap();

        let cfg = AppConfig::load(None).unwrap();
        assert_eq!(cfg.telegram.bot_token, "file-token");
        assert_eq!(cfg.scraping.scrape_interval_secs, 120);
        assert!(cfg.telegram.require_credentials().is_ok());

        env::set_var("TELEGRAM_CHANNEL_ID", "@env_channel");
        env::set_var("SCRAPE_INTERVAL", "45");
        env::set_var("TELEGRAM_FORMAT", "markdown");
        env::set_var("LOG_FORMAT", "json");
        env::set_var("LOG_FILE", "");
        let cfg = AppConfig::load(None).unwrap();
        assert_eq!(cfg.telegram.bot_token, "file-token");
        assert_eq!(cfg.telegram.channel_id, "@env_channel");
        assert_eq!(cfg.telegram.format, MessageFormat::Markdown);
        assert_eq!(cfg.scraping.scrape_interval_secs, 45);
        assert_eq!(cfg.scraping.max_concurrent_scrapes, 2);
        assert_eq!(cfg.logging.format, LogFormat::Json);
        assert!(cfg.logging.file_path.is_none());
    });
}

#[serial_test::serial]
#[test]
fn unparseable_env_values_are_ignored() {
    in_temp_cwd(|_| {
        env::set_var("MAX_CONCURRENT_SCRAPES", "lots");
        env::set_var("TELEGRAM_RETRY_DELAY", "soon");
        env::set_var("REQUEST_TIMEOUT", "30");
        let cfg = AppConfig::load(None).unwrap();
        assert_eq!(cfg.scraping.max_concurrent_scrapes, 5);
        assert_eq!(cfg.telegram.retry_delay_secs, 2.0);
        assert_eq!(cfg.scraping.request_timeout_secs, 30);
    });
}

#[serial_test::serial]
#[test]
fn zero_concurrency_is_clamped() {
    in_temp_cwd(|_| {
        env::set_var("MAX_CONCURRENT_SCRAPES", "0");
        let cfg = AppConfig::load(None).unwrap();
        assert_eq!(cfg.scraping.max_concurrent_scrapes, 1);
    });
}

#[serial_test::serial]
#[test]
fn env_path_must_exist_and_is_preferred() {
    in_temp_cwd(|dir| {
        env::set_var(ENV_CONFIG_PATH, dir.join("missing.json"));
        assert!(AppConfig::load(None).is_err());

        let p = dir.join("custom.json");
        fs::write(&p, r#"{"scraping": {"user_agent": "Custom UA"}}"#).unwrap();
        env::set_var(ENV_CONFIG_PATH, &p);
        let cfg = AppConfig::load(None).unwrap();
        assert_eq!(cfg.scraping.user_agent, "Custom UA");
        assert_eq!(cfg.scraping.scrape_interval_secs, 300);
    });
}

#[serial_test::serial]
#[test]
fn explicit_path_without_extension_is_sniffed() {
    in_temp_cwd(|dir| {
        let json = dir.join("settings");
        fs::write(&json, r#"{"logging": {"level": "debug"}}"#).unwrap();
        assert_eq!(AppConfig::load(Some(&json)).unwrap().logging.level, "debug");

        let toml = dir.join("settings.conf");
        fs::write(&toml, "[logging]\nlevel = \"warn\"\n").unwrap();
        assert_eq!(AppConfig::load(Some(&toml)).unwrap().logging.level, "warn");

        let broken = dir.join("broken.toml");
        fs::write(&broken, "[logging\nlevel=").unwrap();
        assert!(AppConfig::load(Some(&broken)).is_err());
    });
}

#[serial_test::serial]
#[test]
fn template_round_trips_through_loader() {
    in_temp_cwd(|dir| {
        let p = dir.join("nested/dir/deal_notifier.json");
        AppConfig::write_template(&p).unwrap();
        let cfg = AppConfig::load(Some(&p)).unwrap();
        assert_eq!(cfg.telegram.bot_token, "YOUR_BOT_TOKEN_HERE");
        assert_eq!(cfg.telegram.channel_id, "@your_channel_here");
        assert_eq!(cfg.scraping.scrape_interval_secs, 300);
    });
}
