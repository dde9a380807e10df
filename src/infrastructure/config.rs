//! Configuration infrastructure
//!
//! Contains configuration loading and management for the catalog sync
//! service. Settings live in a JSON file under the user config directory and
//! are created with defaults on first run.

#![allow(clippy::uninlined_format_args)]
#![allow(clippy::derivable_impls)]

use anyhow::{Context, Result, bail};
use chrono::NaiveTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::fs;
use tracing::{info, warn};

use crate::domain::reconciliation::{ReconciliationConfig, SyncMode};
use crate::domain::value_objects::PriceLocale;
use crate::infrastructure::retry_policy::{BackoffStrategy, RetryPolicy};

/// Environment variable that points at an alternative config file
pub const CONFIG_PATH_ENV: &str = "FRAGRANCE_STOCK_CONFIG";

/// Environment variable that overrides `database.url`
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub site: SiteConfig,
    pub crawler: CrawlerConfig,
    pub sync: SyncConfig,
    pub scheduler: SchedulerConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// sqlx connection string, e.g. `sqlite:data/fragrance.db`
    pub url: String,
    pub max_connections: u32,
    pub busy_timeout_seconds: u64,
}

/// Storefront being mirrored
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub base_url: String,
    /// Page holding the brand/category widget
    pub shop_path: String,
    pub user_agent: String,
    pub accept_language: String,
    pub price_locale: PriceLocale,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Politeness delay before every request
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_attempts: u32,
    pub backoff: BackoffStrategy,
    pub max_backoff_ms: u64,
    pub request_timeout_seconds: u64,
    pub max_pages_per_category: u32,
    /// Give failed categories a second pass at the end of the crawl
    pub retry_failed_categories: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub purchase_price_ratio: Decimal,
    pub default_min_stock: i64,
    /// Mode used by `POST /sync` when the request does not name one
    pub manual_mode: SyncMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,
    /// Local time of day, `HH:MM`
    pub run_at: String,
    pub mode: SyncMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Enable JSON formatted logs
    pub json_format: bool,

    /// Enable console output
    pub console_output: bool,

    /// Enable file output
    pub file_output: bool,

    /// Directory for log files; defaults to `logs/` next to the executable
    pub log_dir: Option<PathBuf>,

    /// Daily-rotated log file prefix
    pub file_prefix: String,

    /// Module-specific log level filters (e.g., "sqlx": "warn", "reqwest": "info")
    pub module_filters: HashMap<String, String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            site: SiteConfig::default(),
            crawler: CrawlerConfig::default(),
            sync: SyncConfig::default(),
            scheduler: SchedulerConfig::default(),
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: defaults::DATABASE_URL.to_string(),
            max_connections: defaults::DB_MAX_CONNECTIONS,
            busy_timeout_seconds: defaults::DB_BUSY_TIMEOUT_SECONDS,
        }
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: saphirus::BASE_URL.to_string(),
            shop_path: saphirus::SHOP_PATH.to_string(),
            user_agent: saphirus::USER_AGENT.to_string(),
            accept_language: saphirus::ACCEPT_LANGUAGE.to_string(),
            price_locale: PriceLocale::default(),
        }
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: defaults::MIN_DELAY_MS,
            max_delay_ms: defaults::MAX_DELAY_MS,
            max_attempts: defaults::MAX_ATTEMPTS,
            backoff: BackoffStrategy::Linear,
            max_backoff_ms: defaults::MAX_BACKOFF_MS,
            request_timeout_seconds: defaults::REQUEST_TIMEOUT_SECONDS,
            max_pages_per_category: defaults::MAX_PAGES_PER_CATEGORY,
            retry_failed_categories: true,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            purchase_price_ratio: Decimal::new(defaults::PURCHASE_PRICE_RATIO_PERCENT, 2),
            default_min_stock: defaults::MIN_STOCK,
            manual_mode: SyncMode::Full,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            run_at: defaults::SCHEDULE_RUN_AT.to_string(),
            mode: SyncMode::Incremental,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: defaults::SERVER_HOST.to_string(),
            port: defaults::SERVER_PORT,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: defaults::LOG_JSON_FORMAT,
            console_output: defaults::LOG_CONSOLE_OUTPUT,
            file_output: defaults::LOG_FILE_OUTPUT,
            log_dir: None,
            file_prefix: defaults::LOG_FILE_PREFIX.to_string(),
            module_filters: {
                let mut filters = HashMap::new();
                filters.insert("sqlx".to_string(), "warn".to_string());
                filters.insert("reqwest".to_string(), "info".to_string());
                filters.insert("hyper".to_string(), "warn".to_string());
                filters.insert("tower_http".to_string(), "info".to_string());
                filters
            },
        }
    }
}

impl CrawlerConfig {
    /// Retry policy for a single page fetch
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            min_delay_ms: self.min_delay_ms,
            max_delay_ms: self.max_delay_ms,
            strategy: self.backoff,
            max_backoff_ms: self.max_backoff_ms,
        }
    }
}

impl SyncConfig {
    pub fn reconciliation(&self) -> ReconciliationConfig {
        ReconciliationConfig {
            purchase_price_ratio: self.purchase_price_ratio,
            default_min_stock: self.default_min_stock,
        }
    }
}

impl SchedulerConfig {
    pub fn run_at_time(&self) -> Result<NaiveTime> {
        NaiveTime::parse_from_str(self.run_at.trim(), "%H:%M")
            .with_context(|| format!("Invalid scheduler.run_at '{}', expected HH:MM", self.run_at))
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl AppConfig {
    /// Applies environment overrides using the given lookup
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(DATABASE_URL_ENV).filter(|v| !v.trim().is_empty()) {
            info!("Using database URL from {}", DATABASE_URL_ENV);
            self.database.url = url;
        }
    }

    /// Applies overrides from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Rejects settings that would make the service misbehave
    pub fn validate(&self) -> Result<()> {
        if self.database.url.trim().is_empty() {
            bail!("database.url must not be empty");
        }
        if self.crawler.max_attempts == 0 {
            bail!("crawler.max_attempts must be at least 1");
        }
        if self.crawler.max_pages_per_category == 0 {
            bail!("crawler.max_pages_per_category must be at least 1");
        }
        if self.crawler.min_delay_ms > self.crawler.max_delay_ms {
            bail!(
                "crawler.min_delay_ms ({}) exceeds crawler.max_delay_ms ({})",
                self.crawler.min_delay_ms,
                self.crawler.max_delay_ms
            );
        }
        if self.sync.purchase_price_ratio < Decimal::ZERO || self.sync.purchase_price_ratio > Decimal::ONE {
            bail!(
                "sync.purchase_price_ratio must be between 0 and 1, got {}",
                self.sync.purchase_price_ratio
            );
        }
        if self.sync.default_min_stock < 0 {
            bail!("sync.default_min_stock must not be negative");
        }
        self.scheduler.run_at_time()?;
        url::Url::parse(&self.site.base_url)
            .with_context(|| format!("Invalid site.base_url '{}'", self.site.base_url))?;
        self.site
            .price_locale
            .parser()
            .map_err(|e| anyhow::anyhow!("Invalid site.price_locale: {}", e))?;
        Ok(())
    }
}

/// Configuration manager for loading and saving settings
pub struct ConfigManager {
    pub config_path: PathBuf,
}

impl ConfigManager {
    /// Get the application configuration directory
    pub fn get_config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get user config directory")?
            .join(defaults::APP_DIR_NAME);

        Ok(config_dir)
    }

    /// Create a configuration manager, honouring `FRAGRANCE_STOCK_CONFIG`
    pub fn new() -> Result<Self> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            if !path.trim().is_empty() {
                return Ok(Self::with_path(path));
            }
        }
        let config_path = Self::get_config_dir()?.join(defaults::CONFIG_FILE_NAME);
        Ok(Self { config_path })
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
        }
    }

    /// Load configuration from file, creating default if it doesn't exist
    pub async fn load_config(&self) -> Result<AppConfig> {
        if !self.config_path.exists() {
            info!("🎉 Configuration file not found, creating default: {:?}", self.config_path);
            let default_config = AppConfig::default();
            self.save_config(&default_config).await?;
            return Ok(default_config);
        }

        let content = fs::read_to_string(&self.config_path)
            .await
            .context("Failed to read configuration file")?;

        match serde_json::from_str::<AppConfig>(&content) {
            Ok(config) => {
                info!("Loaded configuration from: {:?}", self.config_path);
                Ok(config)
            }
            Err(parse_error) => {
                warn!("⚠️  Configuration file could not be parsed: {}", parse_error);
                warn!("⚠️  Resetting to default configuration");

                // Keep the broken file around for inspection
                let backup_path = self.config_path.with_extension("json.corrupted");
                if let Err(e) = fs::copy(&self.config_path, &backup_path).await {
                    warn!("Failed to create backup of corrupted config: {}", e);
                } else {
                    info!("Backed up corrupted config to: {:?}", backup_path);
                }

                let default_config = AppConfig::default();
                self.save_config(&default_config)
                    .await
                    .context("Failed to save default configuration")?;

                info!("✅ Reset to default configuration");
                Ok(default_config)
            }
        }
    }

    /// Save configuration to file
    pub async fn save_config(&self, config: &AppConfig) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create config directory")?;
        }

        let content = serde_json::to_string_pretty(config).context("Failed to serialize configuration")?;

        fs::write(&self.config_path, content)
            .await
            .context("Failed to write configuration file")?;

        info!("Saved configuration to: {:?}", self.config_path);
        Ok(())
    }

    /// Get the configuration file path
    pub const fn config_path(&self) -> &PathBuf {
        &self.config_path
    }
}

/// Saphirus storefront URLs and request headers
pub mod saphirus {
    /// Base URL of the storefront
    pub const BASE_URL: &str = "https://www.saphirus.com.ar";

    /// Shop landing page holding the brand/category widget
    pub const SHOP_PATH: &str = "/tienda";

    /// Query appended to every listing page (list view, three per row)
    pub const LISTING_QUERY: &str = "per_row=3&shop_view=list";

    /// Path segment that precedes a category slug
    pub const CATEGORY_PATH_SEGMENT: &str = "categoria-producto";

    pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

    pub const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";

    pub const ACCEPT_LANGUAGE: &str = "es-AR,es;q=0.9,en;q=0.8";
}

/// Default configuration values
pub mod defaults {
    pub const APP_DIR_NAME: &str = "fragrance-stock";
    pub const CONFIG_FILE_NAME: &str = "config.json";

    pub const DATABASE_URL: &str = "sqlite:data/fragrance_stock.db";
    pub const DB_MAX_CONNECTIONS: u32 = 5;
    pub const DB_BUSY_TIMEOUT_SECONDS: u64 = 10;

    /// Politeness delay range between requests in milliseconds
    pub const MIN_DELAY_MS: u64 = 2_000;
    pub const MAX_DELAY_MS: u64 = 5_000;

    /// Attempts per page fetch, including the first one
    pub const MAX_ATTEMPTS: u32 = 3;
    pub const MAX_BACKOFF_MS: u64 = 60_000;
    pub const REQUEST_TIMEOUT_SECONDS: u64 = 30;
    pub const MAX_PAGES_PER_CATEGORY: u32 = 200;

    /// Estimated cost of a new product, as a percentage of its list price
    pub const PURCHASE_PRICE_RATIO_PERCENT: i64 = 70;
    pub const MIN_STOCK: i64 = 3;

    pub const SCHEDULE_RUN_AT: &str = "07:00";

    pub const SERVER_HOST: &str = "127.0.0.1";
    pub const SERVER_PORT: u16 = 3000;

    pub const LOG_LEVEL: &str = "info";
    pub const LOG_JSON_FORMAT: bool = false;
    pub const LOG_CONSOLE_OUTPUT: bool = true;
    pub const LOG_FILE_OUTPUT: bool = true;
    pub const LOG_FILE_PREFIX: &str = "fragrance-stock.log";
}

/// URL building helper functions
pub mod utils {
    use super::saphirus::{CATEGORY_PATH_SEGMENT, LISTING_QUERY};
    use url::Url;

    /// Build the listing URL for one page of a category.
    ///
    /// Page 1 is the category URL itself; later pages append `page/<n>/`.
    pub fn category_page_url(category_url: &str, page: u32) -> String {
        let (path, query) = match category_url.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (category_url, None),
        };

        let mut url = path.trim_end_matches('/').to_string();
        url.push('/');
        if page > 1 {
            url.push_str(&format!("page/{}/", page));
        }
        url.push('?');
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            url.push_str(query);
            url.push('&');
        }
        url.push_str(LISTING_QUERY);
        url
    }

    /// Resolve a possibly relative URL against the site base URL
    pub fn resolve_url(base_url: &str, href: &str) -> String {
        let href = href.trim();
        if href.starts_with("http://") || href.starts_with("https://") {
            return href.to_string();
        }
        Url::parse(base_url)
            .and_then(|base| base.join(href))
            .map_or_else(|_| href.to_string(), |url| url.to_string())
    }

    /// Category slug that follows `categoria-producto/` in a URL, decoded
    pub fn category_slug(url: &str) -> Option<String> {
        let marker = format!("{}/", CATEGORY_PATH_SEGMENT);
        let start = url.find(&marker)? + marker.len();
        let rest = &url[start..];
        let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
        let raw = &rest[..end];
        if raw.is_empty() {
            return None;
        }
        let decoded = urlencoding::decode(raw).map_or_else(|_| raw.to_string(), |s| s.into_owned());
        Some(decoded)
    }

    /// `eau-de-parfum` → `Eau De Parfum`
    pub fn humanize_slug(slug: &str) -> String {
        slug.split(['-', ' '])
            .filter(|word| !word.is_empty())
            .map(|word| {
                let mut chars = word.chars();
                chars.next().map_or_else(String::new, |first| {
                    first.to_uppercase().collect::<String>() + chars.as_str()
                })
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}
