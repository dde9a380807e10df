//! Infrastructure layer for database connections, parsing, and external integrations
//!
//! SQLite repositories, the storefront HTTP client, HTML extraction, the site
//! crawler, configuration and logging.

pub mod catalog_repository;
pub mod config;
pub mod crawler;
pub mod database_connection;
pub mod html_parser;
pub mod http_client;
pub mod inventory_repository;
pub mod logging;
pub mod notification_repository;
pub mod parsing_error;
pub mod retry_policy;

// Re-export commonly used items
pub use catalog_repository::SqliteCatalogRepository;
pub use config::{AppConfig, ConfigManager};
pub use crawler::SiteCrawler;
pub use database_connection::DatabaseConnection;
pub use html_parser::{ListingPage, SaphirusDataExtractor, SaphirusExtractorConfig};
pub use http_client::{FetchError, HttpClient, HttpClientConfig, PageFetcher};
pub use inventory_repository::SqliteInventoryRepository;
pub use logging::{get_log_directory, init_logging, init_logging_with_config};
pub use notification_repository::SqliteNotificationRepository;
pub use parsing_error::{ParsingError, ParsingResult};
pub use retry_policy::{BackoffStrategy, RetryPolicy};
