//! Shared fixtures for the integration tests: a scripted storefront and a
//! throwaway SQLite database wired into a full [`AppState`].

#![allow(dead_code, clippy::unwrap_used)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::sync::Notify;

use fragrance_stock_lib::application::AppState;
use fragrance_stock_lib::domain::repositories::CatalogSource;
use fragrance_stock_lib::infrastructure::config::utils::category_page_url;
use fragrance_stock_lib::infrastructure::config::{AppConfig, CrawlerConfig, saphirus};
use fragrance_stock_lib::infrastructure::html_parser::SaphirusDataExtractor;
use fragrance_stock_lib::infrastructure::http_client::{FetchError, PageFetcher};
use fragrance_stock_lib::infrastructure::{DatabaseConnection, SiteCrawler};

pub const SHOP: &str = r#"
    <html><body>
    <ul class="product-categories">
      <li class="cat-item cat-parent"><a href="/categoria-producto/saphirus/">Saphirus</a>
        <ul class="children">
          <li class="cat-item"><a href="/categoria-producto/saphirus/aromatizantes/">Aromatizantes</a></li>
          <li class="cat-item"><a href="/categoria-producto/saphirus/difusores/">Difusores</a></li>
        </ul>
      </li>
    </ul>
    </body></html>"#;

pub const AROMATIZANTES: &str = "aromatizantes";
pub const DIFUSORES: &str = "difusores";

/// One product block as the storefront renders it
#[derive(Debug, Clone)]
pub struct Listed {
    pub sku: &'static str,
    pub name: &'static str,
    pub regular: &'static str,
    pub sale: Option<&'static str>,
    pub in_stock: bool,
}

impl Listed {
    pub const fn new(sku: &'static str, name: &'static str, regular: &'static str) -> Self {
        Self {
            sku,
            name,
            regular,
            sale: None,
            in_stock: true,
        }
    }

    pub const fn on_sale(mut self, sale: &'static str) -> Self {
        self.sale = Some(sale);
        self
    }

    pub const fn sold_out(mut self) -> Self {
        self.in_stock = false;
        self
    }
}

fn amount(text: &str) -> String {
    format!(r#"<span class="woocommerce-Price-amount amount"><bdi>{text}</bdi></span>"#)
}

pub fn listing_page(products: &[Listed]) -> String {
    let blocks: String = products
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let prices = match p.sale {
                Some(sale) => format!("<del>{}</del><ins>{}</ins>", amount(p.regular), amount(sale)),
                None => amount(p.regular),
            };
            let stock_class = if p.in_stock { "instock" } else { "outofstock" };
            format!(
                r#"<div class="product-grid-item product {stock_class}" data-id="{id}">
                     <h3 class="wd-entities-title"><a href="/producto/{sku}/">{name}</a></h3>
                     <span class="price">{prices}</span>
                     <a class="add_to_cart_button" data-product_sku="{sku}">Añadir</a>
                   </div>"#,
                id = 100 + i,
                sku = p.sku,
                name = p.name,
            )
        })
        .collect();
    format!(r#"<html><body><div class="products">{blocks}</div></body></html>"#)
}

pub fn shop_url() -> String {
    format!("{}{}", saphirus::BASE_URL, saphirus::SHOP_PATH)
}

pub fn category_url(slug: &str) -> String {
    category_page_url(&format!("{}/categoria-producto/saphirus/{slug}/", saphirus::BASE_URL), 1)
}

/// Storefront whose pages can be swapped between sync runs
#[derive(Default)]
pub struct ScriptedSite {
    pages: Mutex<HashMap<String, String>>,
    broken: Mutex<HashSet<String>>,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl ScriptedSite {
    pub fn set_page(&self, url: impl Into<String>, markup: impl Into<String>) {
        self.pages.lock().unwrap().insert(url.into(), markup.into());
    }

    pub fn set_category(&self, slug: &str, products: &[Listed]) {
        self.set_page(category_url(slug), listing_page(products));
    }

    /// The next request waits until `gate` is notified
    pub fn hold_next_request(&self, gate: Arc<Notify>) {
        *self.gate.lock().unwrap() = Some(gate);
    }

    /// Every request to `url` answers 500
    pub fn break_url(&self, url: impl Into<String>) {
        self.broken.lock().unwrap().insert(url.into());
    }
}

#[async_trait]
impl PageFetcher for ScriptedSite {
    async fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.broken.lock().unwrap().contains(url) {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: 500,
            });
        }
        self.pages
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
    }
}

/// Two categories, three products; the first is on sale at 20% off
pub fn default_catalog(site: &ScriptedSite) {
    site.set_page(shop_url(), SHOP);
    site.set_category(
        AROMATIZANTES,
        &[
            Listed::new("SAP-VAI-01", "Aroma Vainilla", "$10.000").on_sale("$8.000"),
            Listed::new("SAP-COC-02", "Aroma Coco", "$5.500"),
        ],
    );
    site.set_category(DIFUSORES, &[Listed::new("SAP-LAV-03", "Difusor Lavanda", "$3.000")]);
}

pub fn test_config(db_url: String) -> AppConfig {
    let mut config = AppConfig::default();
    config.database.url = db_url;
    config.scheduler.enabled = false;
    config.crawler = CrawlerConfig {
        min_delay_ms: 0,
        max_delay_ms: 0,
        max_backoff_ms: 0,
        max_attempts: 2,
        ..CrawlerConfig::default()
    };
    config
}

pub struct TestEnv {
    pub site: Arc<ScriptedSite>,
    pub state: AppState,
    pub db: DatabaseConnection,
    _dir: TempDir,
}

pub async fn test_env() -> TestEnv {
    let dir = tempfile::tempdir().unwrap();
    let db_url = format!("sqlite:{}", dir.path().join("stock.db").display());
    let config = test_config(db_url);

    let db = DatabaseConnection::new(
        &config.database.url,
        config.database.max_connections,
        config.database.busy_timeout_seconds,
    )
    .await
    .unwrap();
    db.migrate().await.unwrap();

    let site = Arc::new(ScriptedSite::default());
    default_catalog(&site);
    let crawler = SiteCrawler::new(
        site.clone(),
        SaphirusDataExtractor::new().unwrap(),
        &config.site,
        &config.crawler,
    );
    let source: Arc<dyn CatalogSource> = Arc::new(crawler);
    let state = AppState::new(config, db.pool().clone(), source);

    TestEnv {
        site,
        state,
        db,
        _dir: dir,
    }
}
