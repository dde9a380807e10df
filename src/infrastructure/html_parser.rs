//! HTML parsing and data extraction for the Saphirus storefront
//!
//! This module turns WooCommerce listing pages into [`ScrapedProduct`]
//! records and reads the brand/category widget of the shop page. Extraction
//! is pure and tolerant: a missing or malformed sub-field never drops the
//! product, it is logged and left empty.

#![allow(clippy::uninlined_format_args)]

use rust_decimal::Decimal;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::domain::product::{
    BrandNode, CategoryContext, CategoryLink, CategorySource, ScrapedProduct, UNCATEGORIZED,
};
use crate::domain::value_objects::{PriceLocale, PriceParser};
use crate::infrastructure::config::saphirus;
use crate::infrastructure::config::utils::{category_slug, humanize_slug, resolve_url};
use crate::infrastructure::parsing_error::{ParsingError, ParsingResult};

/// Markers in `.stock` text that mean the product is unavailable
const OUT_OF_STOCK_MARKERS: &[&str] = &["out of stock", "agotado", "sin stock"];

/// Products of one listing page plus its pagination state
#[derive(Debug, Clone, Default)]
pub struct ListingPage {
    pub products: Vec<ScrapedProduct>,
    pub has_next: bool,
}

/// Configuration for storefront data extraction
#[derive(Debug, Clone)]
pub struct SaphirusExtractorConfig {
    /// CSS selectors for product listing pages
    pub listing_selectors: ListingSelectors,
    /// CSS selector for the brand/category widget
    pub category_list: String,
    /// Base URL for resolving relative links
    pub base_url: String,
    pub price_locale: PriceLocale,
}

#[derive(Debug, Clone)]
pub struct ListingSelectors {
    pub product_block: String,
    pub name: String,
    pub description: String,
    pub image: String,
    pub product_link: String,
    pub price_amount: String,
    pub out_of_stock: String,
    pub stock_text: String,
    pub labels: String,
    pub add_to_cart: String,
    pub brand: String,
    pub category_container: String,
    pub category_heading: String,
    pub category_link: String,
    pub breadcrumb: String,
    pub next_page: String,
}

impl Default for ListingSelectors {
    fn default() -> Self {
        Self {
            product_block: ".product-grid-item, .wd-product".to_string(),
            name: ".wd-entities-title a".to_string(),
            description: ".woocommerce-product-details__short-description".to_string(),
            image: ".product-image-link img".to_string(),
            product_link: ".product-image-link".to_string(),
            price_amount: ".price .woocommerce-Price-amount".to_string(),
            out_of_stock: ".out-of-stock".to_string(),
            stock_text: ".stock".to_string(),
            labels: ".berocket_better_labels .br_alabel".to_string(),
            add_to_cart: ".add_to_cart_button".to_string(),
            brand: ".wd-product-brands-links a".to_string(),
            category_container: ".product-category".to_string(),
            category_heading: "h2.woocommerce-loop-category__title".to_string(),
            category_link: "a[href*=\"/categoria-producto/\"]".to_string(),
            breadcrumb: ".woocommerce-breadcrumb a, .breadcrumb a".to_string(),
            next_page: ".woocommerce-pagination .next".to_string(),
        }
    }
}

impl Default for SaphirusExtractorConfig {
    fn default() -> Self {
        Self {
            listing_selectors: ListingSelectors::default(),
            category_list: ".product-categories".to_string(),
            base_url: saphirus::BASE_URL.to_string(),
            price_locale: PriceLocale::default(),
        }
    }
}

#[derive(Debug, Clone)]
struct CompiledSelectors {
    product_block: Selector,
    name: Selector,
    description: Selector,
    image: Selector,
    product_link: Selector,
    price_amount: Selector,
    out_of_stock: Selector,
    stock_text: Selector,
    labels: Selector,
    add_to_cart: Selector,
    brand: Selector,
    category_container: Selector,
    category_heading: Selector,
    category_link: Selector,
    breadcrumb: Selector,
    next_page: Selector,
    category_list: Selector,
}

fn compile(selector: &str) -> ParsingResult<Selector> {
    Selector::parse(selector).map_err(|e| ParsingError::invalid_selector(selector, e))
}

impl CompiledSelectors {
    fn new(config: &SaphirusExtractorConfig) -> ParsingResult<Self> {
        let s = &config.listing_selectors;
        Ok(Self {
            product_block: compile(&s.product_block)?,
            name: compile(&s.name)?,
            description: compile(&s.description)?,
            image: compile(&s.image)?,
            product_link: compile(&s.product_link)?,
            price_amount: compile(&s.price_amount)?,
            out_of_stock: compile(&s.out_of_stock)?,
            stock_text: compile(&s.stock_text)?,
            labels: compile(&s.labels)?,
            add_to_cart: compile(&s.add_to_cart)?,
            brand: compile(&s.brand)?,
            category_container: compile(&s.category_container)?,
            category_heading: compile(&s.category_heading)?,
            category_link: compile(&s.category_link)?,
            breadcrumb: compile(&s.breadcrumb)?,
            next_page: compile(&s.next_page)?,
            category_list: compile(&config.category_list)?,
        })
    }
}

/// Storefront data extractor
#[derive(Debug, Clone)]
pub struct SaphirusDataExtractor {
    config: SaphirusExtractorConfig,
    selectors: CompiledSelectors,
    prices: PriceParser,
}

impl SaphirusDataExtractor {
    pub fn new() -> ParsingResult<Self> {
        Self::with_config(SaphirusExtractorConfig::default())
    }

    pub fn with_config(config: SaphirusExtractorConfig) -> ParsingResult<Self> {
        let selectors = CompiledSelectors::new(&config)?;
        let prices = config
            .price_locale
            .parser()
            .map_err(|e| ParsingError::ConfigurationError {
                message: e.to_string(),
                field: "price_locale".to_string(),
            })?;
        Ok(Self {
            config,
            selectors,
            prices,
        })
    }

    pub const fn config(&self) -> &SaphirusExtractorConfig {
        &self.config
    }

    /// Extract every product block on a listing page
    pub fn extract(&self, markup: &str, context: &CategoryContext) -> Vec<ScrapedProduct> {
        let html = Html::parse_document(markup);
        self.extract_from_document(&html, context)
    }

    pub fn extract_from_document(&self, html: &Html, context: &CategoryContext) -> Vec<ScrapedProduct> {
        let products: Vec<ScrapedProduct> = html
            .select(&self.selectors.product_block)
            .filter(|block| !self.is_nested_block(block))
            .map(|block| self.extract_product(html, block, context))
            .collect();

        debug!(
            "Extracted {} products (context: {:?} / {:?})",
            products.len(),
            context.brand,
            context.category
        );
        products
    }

    /// Parse a listing page once for both its products and its pagination
    pub fn extract_page(&self, markup: &str, context: &CategoryContext) -> ListingPage {
        let html = Html::parse_document(markup);
        ListingPage {
            products: self.extract_from_document(&html, context),
            has_next: html.select(&self.selectors.next_page).next().is_some(),
        }
    }

    /// Whether the listing has a following page
    pub fn has_next_page(&self, markup: &str) -> bool {
        let html = Html::parse_document(markup);
        html.select(&self.selectors.next_page).next().is_some()
    }

    /// Read the two-level brand → category widget of the shop page
    pub fn extract_category_tree(&self, markup: &str) -> Vec<BrandNode> {
        let html = Html::parse_document(markup);
        let mut seen = HashSet::new();
        let mut brands = Vec::new();

        for list in html.select(&self.selectors.category_list) {
            for item in child_elements(list).filter(is_cat_item) {
                let Some(anchor) = child_elements(item).find(|e| e.value().name() == "a") else {
                    continue;
                };
                let name = element_text(&anchor);
                if name.is_empty() || !seen.insert(name.clone()) {
                    continue;
                }

                let categories: Vec<CategoryLink> = child_elements(item)
                    .filter(|e| e.value().name() == "ul" && has_class(e, "children"))
                    .flat_map(child_elements)
                    .filter(is_cat_item)
                    .filter_map(|li| self.category_link_of(li))
                    .collect();

                brands.push(BrandNode {
                    url: anchor.value().attr("href").map(|href| self.resolve(href)),
                    name,
                    categories,
                });
            }
        }

        debug!("Discovered {} brands in category widget", brands.len());
        brands
    }

    fn category_link_of(&self, item: ElementRef<'_>) -> Option<CategoryLink> {
        let anchor = child_elements(item).find(|e| e.value().name() == "a")?;
        let name = element_text(&anchor);
        let href = anchor.value().attr("href")?;
        if name.is_empty() || href.trim().is_empty() {
            return None;
        }
        Some(CategoryLink {
            name,
            url: self.resolve(href),
        })
    }

    fn is_nested_block(&self, block: &ElementRef<'_>) -> bool {
        block
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|ancestor| self.selectors.product_block.matches(&ancestor))
    }

    fn extract_product(&self, html: &Html, block: ElementRef<'_>, context: &CategoryContext) -> ScrapedProduct {
        let name = self.text_in(&block, &self.selectors.name).unwrap_or_default();
        if name.is_empty() {
            debug!("Product block without a name");
        }

        let (regular_price, sale_price) = self.extract_prices(&block, &name);

        let add_to_cart = block.select(&self.selectors.add_to_cart).next();
        let sku = add_to_cart
            .and_then(|button| button.value().attr("data-product_sku"))
            .and_then(non_empty);
        let site_id = block
            .value()
            .attr("data-id")
            .and_then(non_empty)
            .or_else(|| {
                add_to_cart
                    .and_then(|button| button.value().attr("data-product_id"))
                    .and_then(non_empty)
            });

        let image_url = block
            .select(&self.selectors.image)
            .next()
            .and_then(|img| img.value().attr("src").or_else(|| img.value().attr("data-src")))
            .and_then(non_empty)
            .map(|src| self.resolve(&src));
        let product_url = block
            .select(&self.selectors.product_link)
            .next()
            .or_else(|| block.select(&self.selectors.name).next())
            .and_then(|a| a.value().attr("href"))
            .and_then(non_empty)
            .map(|href| self.resolve(&href));

        let brand = self
            .text_in(&block, &self.selectors.brand)
            .or_else(|| context.brand.clone().filter(|b| !b.trim().is_empty()));

        let (category, category_source) = self.resolve_category(html, &block, product_url.as_deref(), context, &name);

        let labels = block
            .select(&self.selectors.labels)
            .map(|label| element_text(&label))
            .filter(|text| !text.is_empty())
            .collect();

        ScrapedProduct {
            site_id,
            description: self.text_in(&block, &self.selectors.description),
            brand,
            category,
            category_source,
            on_sale: sale_price.is_some(),
            regular_price,
            sale_price,
            in_stock: !self.is_out_of_stock(&block),
            image_url,
            product_url,
            sku,
            labels,
            name,
        }
    }

    fn extract_prices(&self, block: &ElementRef<'_>, name: &str) -> (Option<Decimal>, Option<Decimal>) {
        let amounts: Vec<String> = block
            .select(&self.selectors.price_amount)
            .map(|amount| element_text(&amount))
            .collect();

        match amounts.as_slice() {
            [] => {
                debug!("No price found for '{}'", name);
                (None, None)
            }
            [regular] => (self.parse_price(regular, "regular_price", name), None),
            [regular, sale, ..] => (
                self.parse_price(regular, "regular_price", name),
                self.parse_price(sale, "sale_price", name),
            ),
        }
    }

    fn parse_price(&self, raw: &str, field: &str, name: &str) -> Option<Decimal> {
        match self.prices.parse(raw) {
            Ok(amount) => Some(amount),
            Err(e) => {
                let err = ParsingError::PriceFormat {
                    field: field.to_string(),
                    reason: e.to_string(),
                };
                warn!("⚠️ {} for '{}'", err, name);
                None
            }
        }
    }

    fn is_out_of_stock(&self, block: &ElementRef<'_>) -> bool {
        if block
            .value()
            .classes()
            .any(|class| class == "out-of-stock" || class == "outofstock")
        {
            return true;
        }
        if block.select(&self.selectors.out_of_stock).next().is_some() {
            return true;
        }
        block.select(&self.selectors.stock_text).any(|stock| {
            let text = element_text(&stock).to_lowercase();
            OUT_OF_STOCK_MARKERS.iter().any(|marker| text.contains(marker))
        })
    }

    fn resolve_category(
        &self,
        html: &Html,
        block: &ElementRef<'_>,
        product_url: Option<&str>,
        context: &CategoryContext,
        name: &str,
    ) -> (String, CategorySource) {
        let resolved = context
            .category
            .clone()
            .filter(|c| !c.trim().is_empty())
            .map(|c| (c, CategorySource::Context))
            .or_else(|| {
                block
                    .ancestors()
                    .filter_map(ElementRef::wrap)
                    .find(|ancestor| self.selectors.category_container.matches(ancestor))
                    .and_then(|container| self.text_in(&container, &self.selectors.category_heading))
                    .map(|heading| (heading, CategorySource::ContainerHeading))
            })
            .or_else(|| {
                block
                    .select(&self.selectors.category_link)
                    .filter_map(|a| a.value().attr("href"))
                    .find_map(category_slug)
                    .map(|slug| (humanize_slug(&slug), CategorySource::CategoryLink))
            })
            .or_else(|| {
                html.select(&self.selectors.breadcrumb)
                    .nth(1)
                    .map(|crumb| element_text(&crumb))
                    .filter(|text| !text.is_empty())
                    .map(|text| (text, CategorySource::Breadcrumb))
            })
            .or_else(|| {
                product_url
                    .and_then(category_slug)
                    .map(|slug| (humanize_slug(&slug), CategorySource::ProductUrl))
            })
            .filter(|(category, _)| !category.trim().is_empty());

        match resolved {
            Some((category, source)) => {
                debug!("Category for '{}' from {}: {}", name, source, category);
                (category, source)
            }
            None => {
                warn!("⚠️ No category source matched for '{}', using '{}'", name, UNCATEGORIZED);
                (UNCATEGORIZED.to_string(), CategorySource::Fallback)
            }
        }
    }

    fn text_in(&self, scope: &ElementRef<'_>, selector: &Selector) -> Option<String> {
        scope
            .select(selector)
            .next()
            .map(|el| element_text(&el))
            .filter(|text| !text.is_empty())
    }

    fn resolve(&self, href: &str) -> String {
        resolve_url(&self.config.base_url, href)
    }
}

/// Text content with whitespace runs collapsed
fn element_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn child_elements(element: ElementRef<'_>) -> impl Iterator<Item = ElementRef<'_>> {
    element.children().filter_map(ElementRef::wrap)
}

fn has_class(element: &ElementRef<'_>, class: &str) -> bool {
    element.value().classes().any(|c| c == class)
}

fn is_cat_item(element: &ElementRef<'_>) -> bool {
    element.value().name() == "li" && has_class(element, "cat-item")
}
