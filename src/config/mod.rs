// src/config/mod.rs
pub mod app;

pub use app::{
    AppConfig, LogFormat, LoggingConfig, ScrapingConfig, TelegramConfig, ENV_CONFIG_PATH,
};
pub use crate::validate::ValidatorConfig;
