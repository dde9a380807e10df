//! Listing extraction and reconciliation throughput
//!
//! One storefront listing page carries up to a few dozen product blocks; a
//! full catalog is a few thousand products reconciled in one pass.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use fragrance_stock_lib::domain::{CatalogSnapshot, CategoryContext, ReconciliationConfig, ReconciliationEngine};
use fragrance_stock_lib::infrastructure::SaphirusDataExtractor;

fn listing_markup(products: usize) -> String {
    let blocks: String = (0..products)
        .map(|i| {
            let group = i % 1_000;
            let price = if i % 4 == 0 {
                format!(
                    r#"<del><span class="woocommerce-Price-amount amount"><bdi>$12.{group:03}</bdi></span></del>
                       <ins><span class="woocommerce-Price-amount amount"><bdi>$9.{group:03}</bdi></span></ins>"#
                )
            } else {
                format!(r#"<span class="woocommerce-Price-amount amount"><bdi>$7.{group:03}</bdi></span>"#)
            };
            format!(
                r#"<div class="product-grid-item product" data-id="{i}">
                     <a class="product-image-link" href="/producto/aroma-{i}/"><img src="/img/{i}.jpg"></a>
                     <h3 class="wd-entities-title"><a href="/producto/aroma-{i}/">Aroma {i}</a></h3>
                     <span class="price">{price}</span>
                     <div class="berocket_better_labels"><span class="br_alabel">Nuevo</span></div>
                     <a class="add_to_cart_button" data-product_sku="SAP-{i:05}">Añadir</a>
                   </div>"#
            )
        })
        .collect();
    format!(
        r#"<html><body><div class="products">{blocks}</div>
           <nav class="woocommerce-pagination"><a class="next" href="page/2/">→</a></nav></body></html>"#
    )
}

fn extraction(c: &mut Criterion) {
    let extractor = SaphirusDataExtractor::new().expect("default selectors compile");
    let context = CategoryContext::new("Saphirus", "Aromatizantes");

    let mut group = c.benchmark_group("listing_extraction");
    for size in [12, 48] {
        let markup = listing_markup(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &markup, |b, markup| {
            b.iter(|| extractor.extract_page(black_box(markup), &context));
        });
    }
    group.finish();
}

fn reconciliation(c: &mut Criterion) {
    let extractor = SaphirusDataExtractor::new().expect("default selectors compile");
    let context = CategoryContext::new("Saphirus", "Aromatizantes");
    let scraped = extractor.extract(&listing_markup(2_000), &context);
    let engine = ReconciliationEngine::new(ReconciliationConfig::default());
    let empty = CatalogSnapshot::default();

    c.bench_function("reconcile_2000_new_products", |b| {
        b.iter(|| engine.reconcile(black_box(&scraped), &empty));
    });
}

criterion_group!(benches, extraction, reconciliation);
criterion_main!(benches);
