//! Site crawler for the Saphirus storefront
//!
//! Walks the brand → category tree of the shop page and every listing page
//! of each category, strictly one request at a time with a randomised pause
//! before each fetch. Failed categories get one more chance in a second pass.

#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::domain::errors::{CatalogError, CatalogResult};
use crate::domain::product::{BrandNode, CategoryContext, CategoryLink, CrawlReport, ScrapedProduct};
use crate::domain::repositories::CatalogSource;
use crate::infrastructure::config::utils::{category_page_url, resolve_url};
use crate::infrastructure::config::{CrawlerConfig, SiteConfig};
use crate::infrastructure::html_parser::{SaphirusDataExtractor, SaphirusExtractorConfig};
use crate::infrastructure::http_client::{FetchError, HttpClient, HttpClientConfig, PageFetcher};
use crate::infrastructure::retry_policy::RetryPolicy;

/// A category to crawl together with the brand it belongs to
#[derive(Debug, Clone)]
struct CrawlTarget {
    link: CategoryLink,
    context: CategoryContext,
    path: String,
}

impl CrawlTarget {
    fn new(brand: &BrandNode, link: &CategoryLink) -> Self {
        Self {
            link: link.clone(),
            context: CategoryContext::new(brand.name.clone(), link.name.clone()),
            path: format!("{} > {}", brand.name, link.name),
        }
    }
}

/// Products of one category and how many pages it took
#[derive(Debug, Default)]
struct CategoryCrawl {
    products: Vec<ScrapedProduct>,
    pages: usize,
}

/// Sequential crawler over a [`PageFetcher`]
pub struct SiteCrawler {
    fetcher: Arc<dyn PageFetcher>,
    extractor: SaphirusDataExtractor,
    retry: RetryPolicy,
    max_pages_per_category: u32,
    retry_failed_categories: bool,
    shop_url: String,
}

impl SiteCrawler {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        extractor: SaphirusDataExtractor,
        site: &SiteConfig,
        crawler: &CrawlerConfig,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            retry: crawler.retry_policy(),
            max_pages_per_category: crawler.max_pages_per_category.max(1),
            retry_failed_categories: crawler.retry_failed_categories,
            shop_url: resolve_url(&site.base_url, &site.shop_path),
        }
    }

    /// Crawler backed by the real HTTP client
    pub fn from_config(site: &SiteConfig, crawler: &CrawlerConfig) -> Result<Self> {
        let client = HttpClient::with_config(HttpClientConfig::from_app_config(site, crawler))?;
        let extractor = SaphirusDataExtractor::with_config(SaphirusExtractorConfig {
            base_url: site.base_url.clone(),
            price_locale: site.price_locale.clone(),
            ..SaphirusExtractorConfig::default()
        })
        .context("Failed to build storefront extractor")?;
        Ok(Self::new(Arc::new(client), extractor, site, crawler))
    }

    pub fn shop_url(&self) -> &str {
        &self.shop_url
    }

    async fn pause(&self) {
        let delay = self.retry.random_delay();
        if !delay.is_zero() {
            debug!("Waiting {}ms before next request", delay.as_millis());
            tokio::time::sleep(delay).await;
        }
    }

    /// One page with politeness delay and bounded retries
    pub async fn fetch_with_retry(&self, url: &str) -> Result<String, FetchError> {
        self.pause().await;
        self.retry
            .execute(url, |_| self.fetcher.fetch_page(url), FetchError::is_retryable)
            .await
    }

    /// Reads the brand/category widget of the shop page.
    ///
    /// Failing to reach the shop page is a run-level network error.
    pub async fn list_brands_with_categories(&self) -> CatalogResult<Vec<BrandNode>> {
        info!("🔍 Discovering brands and categories from {}", self.shop_url);
        let markup = self.fetch_with_retry(&self.shop_url).await.map_err(|e| {
            error!("❌ Shop page unreachable: {}", e);
            CatalogError::from(e)
        })?;

        let brands = self.extractor.extract_category_tree(&markup);
        if brands.is_empty() {
            warn!("⚠️ No brands found on {}", self.shop_url);
        }
        Ok(brands)
    }

    /// Every listing page of one category, in order
    pub async fn crawl_category(
        &self,
        link: &CategoryLink,
        context: &CategoryContext,
    ) -> Result<Vec<ScrapedProduct>, FetchError> {
        Ok(self.crawl_pages(link, context).await?.products)
    }

    async fn crawl_pages(&self, link: &CategoryLink, context: &CategoryContext) -> Result<CategoryCrawl, FetchError> {
        let mut crawl = CategoryCrawl::default();
        let mut page = 1;

        loop {
            let url = category_page_url(&link.url, page);
            debug!("Fetching {} page {}: {}", link.name, page, url);
            let markup = self.fetch_with_retry(&url).await?;
            let listing = self.extractor.extract_page(&markup, context);
            crawl.pages += 1;
            debug!("Page {} of {} had {} products", page, link.name, listing.products.len());
            crawl.products.extend(listing.products);

            if !listing.has_next {
                break;
            }
            if page >= self.max_pages_per_category {
                warn!(
                    "⚠️ Stopping {} at the page limit of {}",
                    link.name, self.max_pages_per_category
                );
                break;
            }
            page += 1;
        }

        Ok(crawl)
    }

    /// Crawls every category of every brand
    pub async fn crawl_all(&self) -> CatalogResult<CrawlReport> {
        let brands = self.list_brands_with_categories().await?;
        let targets: Vec<CrawlTarget> = brands
            .iter()
            .flat_map(|brand| brand.categories.iter().map(move |link| CrawlTarget::new(brand, link)))
            .collect();

        info!("🚀 Crawling {} categories across {} brands", targets.len(), brands.len());

        let mut report = CrawlReport {
            categories_total: targets.len(),
            ..CrawlReport::default()
        };
        let mut failed = Vec::new();

        for target in targets {
            match self.crawl_pages(&target.link, &target.context).await {
                Ok(crawl) => {
                    info!("📦 {}: {} products", target.path, crawl.products.len());
                    report.pages_fetched += crawl.pages;
                    report.products.extend(crawl.products);
                }
                Err(e) => {
                    warn!("⚠️ Category {} failed: {}", target.path, e);
                    failed.push(target);
                }
            }
        }

        if !failed.is_empty() && self.retry_failed_categories {
            info!("🔄 Retrying {} failed categories", failed.len());
            let mut still_failing = Vec::new();
            for target in failed {
                match self.crawl_pages(&target.link, &target.context).await {
                    Ok(crawl) => {
                        info!("✅ Recovered {}: {} products", target.path, crawl.products.len());
                        report.pages_fetched += crawl.pages;
                        report.products.extend(crawl.products);
                    }
                    Err(e) => {
                        error!("❌ Dropping category {}: {}", target.path, e);
                        still_failing.push(target);
                    }
                }
            }
            failed = still_failing;
        }

        report.failed_categories = failed.into_iter().map(|target| target.path).collect();
        info!(
            "✅ Crawl finished: {} products from {} pages, {} categories failed",
            report.products.len(),
            report.pages_fetched,
            report.failed_categories.len()
        );
        Ok(report)
    }
}

#[async_trait]
impl CatalogSource for SiteCrawler {
    async fn fetch_catalog(&self) -> CatalogResult<CrawlReport> {
        self.crawl_all().await
    }

    async fn brand_tree(&self) -> CatalogResult<Vec<BrandNode>> {
        self.list_brands_with_categories().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    const BASE: &str = "https://www.saphirus.com.ar";

    const SHOP: &str = r#"
        <ul class="product-categories">
          <li class="cat-item"><a href="/categoria-producto/saphirus/">Saphirus</a>
            <ul class="children">
              <li class="cat-item"><a href="/categoria-producto/saphirus/aromatizantes/">Aromatizantes</a></li>
              <li class="cat-item"><a href="/categoria-producto/saphirus/difusores/">Difusores</a></li>
            </ul>
          </li>
        </ul>"#;

    fn listing(sku: &str, next: bool) -> String {
        let pagination = if next {
            r#"<nav class="woocommerce-pagination"><a class="next" href="page/2/">→</a></nav>"#
        } else {
            ""
        };
        format!(
            r#"<div class="product-grid-item"><h3 class="wd-entities-title"><a href="/producto/{sku}/">{sku}</a></h3>
               <span class="price"><span class="woocommerce-Price-amount">$1.000</span></span>
               <a class="add_to_cart_button" data-product_sku="{sku}"></a></div>{pagination}"#
        )
    }

    fn category_url(slug: &str, page: u32) -> String {
        category_page_url(&format!("{BASE}/categoria-producto/saphirus/{slug}/"), page)
    }

    /// Replays scripted responses per URL; the last response repeats
    #[derive(Default)]
    struct ScriptedFetcher {
        responses: Mutex<HashMap<String, VecDeque<Result<String, FetchError>>>>,
        calls: Mutex<HashMap<String, usize>>,
    }

    impl ScriptedFetcher {
        fn script(&self, url: &str, responses: Vec<Result<String, FetchError>>) {
            self.responses.lock().unwrap().insert(url.to_string(), responses.into());
        }

        fn calls(&self, url: &str) -> usize {
            self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
        }
    }

    #[async_trait]
    impl PageFetcher for ScriptedFetcher {
        async fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
            *self.calls.lock().unwrap().entry(url.to_string()).or_default() += 1;
            let mut responses = self.responses.lock().unwrap();
            let queue = responses.get_mut(url).ok_or_else(|| FetchError::Status {
                url: url.to_string(),
                status: 404,
            })?;
            if queue.len() > 1 {
                queue.pop_front().unwrap()
            } else {
                queue.front().cloned().unwrap()
            }
        }
    }

    fn server_error(url: &str) -> Result<String, FetchError> {
        Err(FetchError::Status {
            url: url.to_string(),
            status: 500,
        })
    }

    fn crawler(fetcher: Arc<ScriptedFetcher>, max_pages: u32) -> SiteCrawler {
        let site = SiteConfig::default();
        let config = CrawlerConfig {
            min_delay_ms: 0,
            max_delay_ms: 0,
            max_backoff_ms: 0,
            max_pages_per_category: max_pages,
            ..CrawlerConfig::default()
        };
        SiteCrawler::new(fetcher, SaphirusDataExtractor::new().unwrap(), &site, &config)
    }

    #[tokio::test]
    async fn fetch_recovers_after_two_transient_failures() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        let url = category_url("aromatizantes", 1);
        fetcher.script(
            &url,
            vec![
                Err(FetchError::Timeout { url: url.clone() }),
                server_error(&url),
                Ok("<html>ok</html>".to_string()),
            ],
        );

        let body = crawler(fetcher.clone(), 10).fetch_with_retry(&url).await.unwrap();
        assert_eq!(body, "<html>ok</html>");
        assert_eq!(fetcher.calls(&url), 3);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        let url = category_url("missing", 1);

        let err = crawler(fetcher.clone(), 10).fetch_with_retry(&url).await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 404, .. }));
        assert_eq!(fetcher.calls(&url), 1);
    }

    #[tokio::test]
    async fn failing_category_does_not_stop_the_crawl() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        let shop = format!("{BASE}/tienda");
        let broken = category_url("difusores", 1);
        fetcher.script(&shop, vec![Ok(SHOP.to_string())]);
        fetcher.script(&category_url("aromatizantes", 1), vec![Ok(listing("A-1", false))]);
        fetcher.script(&broken, vec![server_error(&broken)]);

        let report = crawler(fetcher.clone(), 10).crawl_all().await.unwrap();
        assert_eq!(report.categories_total, 2);
        assert_eq!(report.products.len(), 1);
        assert_eq!(report.products[0].sku.as_deref(), Some("A-1"));
        assert_eq!(report.failed_categories, vec!["Saphirus > Difusores".to_string()]);
        // three attempts in each pass
        assert_eq!(fetcher.calls(&broken), 6);
    }

    #[tokio::test]
    async fn second_pass_recovers_category() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        let flaky = category_url("difusores", 1);
        fetcher.script(&format!("{BASE}/tienda"), vec![Ok(SHOP.to_string())]);
        fetcher.script(&category_url("aromatizantes", 1), vec![Ok(listing("A-1", false))]);
        fetcher.script(
            &flaky,
            vec![
                server_error(&flaky),
                server_error(&flaky),
                server_error(&flaky),
                Ok(listing("D-1", false)),
            ],
        );

        let report = crawler(fetcher, 10).crawl_all().await.unwrap();
        assert!(report.failed_categories.is_empty());
        assert_eq!(report.products.len(), 2);
        assert_eq!(report.products[1].brand.as_deref(), Some("Saphirus"));
        assert_eq!(report.products[1].category, "Difusores");
    }

    #[tokio::test]
    async fn unreachable_shop_is_a_run_level_error() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        let shop = format!("{BASE}/tienda");
        fetcher.script(&shop, vec![Err(FetchError::Timeout { url: shop.clone() })]);

        let err = crawler(fetcher, 10).crawl_all().await.unwrap_err();
        assert!(err.is_run_level());
        assert!(matches!(err, CatalogError::Network { .. }));
    }

    #[tokio::test]
    async fn pages_are_followed_until_no_next_control() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        fetcher.script(&category_url("aromatizantes", 1), vec![Ok(listing("P-1", true))]);
        fetcher.script(&category_url("aromatizantes", 2), vec![Ok(listing("P-2", false))]);

        let link = CategoryLink {
            name: "Aromatizantes".into(),
            url: format!("{BASE}/categoria-producto/saphirus/aromatizantes/"),
        };
        let products = crawler(fetcher, 10)
            .crawl_category(&link, &CategoryContext::new("Saphirus", "Aromatizantes"))
            .await
            .unwrap();
        let skus: Vec<_> = products.iter().filter_map(|p| p.sku.as_deref()).collect();
        assert_eq!(skus, vec!["P-1", "P-2"]);
    }

    #[tokio::test]
    async fn page_limit_caps_runaway_pagination() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        fetcher.script(&category_url("aromatizantes", 1), vec![Ok(listing("P-1", true))]);
        fetcher.script(&category_url("aromatizantes", 2), vec![Ok(listing("P-2", true))]);

        let link = CategoryLink {
            name: "Aromatizantes".into(),
            url: format!("{BASE}/categoria-producto/saphirus/aromatizantes/"),
        };
        let crawler = crawler(fetcher.clone(), 1);
        let products = crawler.crawl_category(&link, &CategoryContext::default()).await.unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(fetcher.calls(&category_url("aromatizantes", 2)), 0);
    }
}
