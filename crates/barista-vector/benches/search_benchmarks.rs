//! Benchmarks for product similarity search.
//!
//! Builds a synthetic catalog and measures query embedding plus ranking.
//! Set `BENCH_LARGE_CATALOG=1` to use a 20k-product catalog instead of 1k.

use criterion::{criterion_group, criterion_main, Criterion};

use barista_core::config::SearchConfig;
use barista_storage::Product;
use barista_vector::embedding::TokenHashEmbedding;
use barista_vector::search::ProductSearch;

const SMALL_CATALOG: usize = 1_000;
const LARGE_CATALOG: usize = 20_000;

const CATEGORIES: &[&str] = &["Mugs", "Tumblers", "Cups", "Bottles", "Accessories"];

fn catalog_size() -> usize {
    if std::env::var("BENCH_LARGE_CATALOG").is_ok() {
        LARGE_CATALOG
    } else {
        SMALL_CATALOG
    }
}

fn synthetic_product(i: usize) -> Product {
    let category = CATEGORIES[i % CATEGORIES.len()];
    Product {
        id: i as i64,
        name: format!("{} edition {}", category, i),
        category: category.to_string(),
        price: format!("RM {}.00", 20 + i % 80),
        description: format!(
            "Drinkware item {} in the {} range, double wall, {}ml",
            i,
            category.to_lowercase(),
            250 + (i % 5) * 100
        ),
    }
}

fn bench_similar_products(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to build tokio runtime");

    let products: Vec<Product> = (0..catalog_size()).map(synthetic_product).collect();
    let search = ProductSearch::new(TokenHashEmbedding::new(512), SearchConfig::default());
    rt.block_on(search.index_products(&products))
        .expect("Failed to index products");

    c.bench_function("similar_products_top5", |b| {
        b.iter(|| {
            rt.block_on(search.similar_products("double wall tumbler 450ml", Some(5)))
                .expect("search failed")
        })
    });

    c.bench_function("similar_products_top20", |b| {
        b.iter(|| {
            rt.block_on(search.similar_products("ceramic coffee mugs", Some(20)))
                .expect("search failed")
        })
    });
}

criterion_group!(benches, bench_similar_products);
criterion_main!(benches);
