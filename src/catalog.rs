use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

use crate::db::Snapshot;
use crate::error::{InventoryError, Result};
use crate::models::{Category, Product, Provider, StockStatus};
use crate::providers::provider_label;

/// Important products first, then "brand name" case-insensitively.
pub fn sort_for_display(products: &mut [Product]) {
    products.sort_by_cached_key(|p| (!p.important, p.display_name().to_lowercase()));
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq)]
pub struct Range {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl Range {
    pub fn is_set(&self) -> bool {
        self.min.is_some() || self.max.is_some()
    }

    pub fn contains(&self, value: f64) -> bool {
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ProductFilter {
    pub text: Option<String>,
    pub category: Option<Category>,
    pub stock_status: Option<StockStatus>,
    pub provider_id: Option<i64>,
    #[serde(default)]
    pub important_only: bool,
    #[serde(default)]
    pub price_range: Range,
    #[serde(default)]
    pub stock_range: Range,
}

impl ProductFilter {
    pub fn matches(&self, product: &Product) -> bool {
        if let Some(text) = self.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let needle = text.to_lowercase();
            let hit = [
                Some(product.name.as_str()),
                product.brand.as_deref(),
                product.barcode.as_deref(),
                product.sku.as_deref(),
            ]
            .into_iter()
            .flatten()
            .any(|field| field.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }

        self.category.map_or(true, |c| product.category == c)
            && self.stock_status.map_or(true, |s| product.stock_status() == s)
            && self.provider_id.map_or(true, |id| product.provider_id == Some(id))
            && (!self.important_only || product.important)
            && self.price_range.contains(product.sale_price)
            && self.stock_range.contains(product.stock)
    }

    /// Number of active criteria, shown as a badge next to the filter button.
    pub fn active_count(&self) -> usize {
        [
            self.text.as_deref().is_some_and(|t| !t.trim().is_empty()),
            self.category.is_some(),
            self.stock_status.is_some(),
            self.provider_id.is_some(),
            self.important_only,
            self.price_range.is_set(),
            self.stock_range.is_set(),
        ]
        .into_iter()
        .filter(|active| *active)
        .count()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ProductRow {
    #[serde(flatten)]
    pub product: Product,
    pub provider: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Listing {
    pub products: Vec<ProductRow>,
    pub active_filters: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct CatalogStats {
    pub total: usize,
    pub low_stock_count: usize,
    pub out_of_stock_count: usize,
    pub important_count: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CategorySummary {
    pub category: Category,
    pub count: usize,
    pub value: f64,
    pub low_stock: usize,
    pub out_of_stock: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Valuation {
    pub total_value: f64,
    pub total_cost: f64,
    pub potential_profit: f64,
    pub categories: Vec<CategorySummary>,
    pub top_value: Vec<Product>,
    pub critical: Vec<Product>,
}

const VALUATION_TOP: usize = 10;

#[derive(Debug, Clone)]
pub struct Catalog {
    rx: watch::Receiver<Snapshot>,
}

impl Catalog {
    pub fn new(rx: watch::Receiver<Snapshot>) -> Self {
        Self { rx }
    }

    /// Fixed catalog over a given list, with no live updates.
    pub fn from_products(mut products: Vec<Product>) -> Self {
        sort_for_display(&mut products);
        let (tx, rx) = watch::channel(Arc::new(products));
        // Sender dropped on purpose: the last value stays readable.
        drop(tx);
        Self { rx }
    }

    pub fn list(&self) -> Snapshot {
        self.rx.borrow().clone()
    }

    pub fn get(&self, id: i64) -> Option<Product> {
        self.list().iter().find(|p| p.id == id).cloned()
    }

    pub fn filter(&self, filter: &ProductFilter) -> Vec<Product> {
        self.list()
            .iter()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect()
    }

    /// Barcode wins over SKU, SKU over UPC.
    pub fn find_by_code(&self, code: &str) -> Result<Product> {
        let code = code.trim();
        if code.is_empty() {
            return Err(InventoryError::DecodeMiss(String::new()));
        }

        let products = self.list();
        products
            .iter()
            .find(|p| p.barcode.as_deref() == Some(code))
            .or_else(|| products.iter().find(|p| p.sku.as_deref() == Some(code)))
            .or_else(|| products.iter().find(|p| p.upc.as_deref() == Some(code)))
            .cloned()
            .ok_or_else(|| InventoryError::DecodeMiss(code.to_string()))
    }

    /// Name or category match for the quick-adjust search box.
    pub fn search(&self, term: &str, limit: usize) -> Vec<Product> {
        let needle = term.trim().to_lowercase();
        self.list()
            .iter()
            .filter(|p| {
                p.name.to_lowercase().contains(&needle) || p.category.as_str().contains(&needle)
            })
            .take(limit)
            .cloned()
            .collect()
    }

    /// Filtered products with provider names resolved, as the product
    /// table shows them.
    pub fn listing(&self, filter: &ProductFilter, providers: &[Provider]) -> Listing {
        let products = self
            .filter(filter)
            .into_iter()
            .map(|product| ProductRow {
                provider: provider_label(providers, product.provider_id).to_string(),
                product,
            })
            .collect();
        Listing {
            products,
            active_filters: filter.active_count(),
        }
    }

    pub fn stats(&self) -> CatalogStats {
        stats_of(&self.list())
    }

    pub fn valuation(&self) -> Valuation {
        valuation_of(&self.list())
    }
}

pub fn stats_of(products: &[Product]) -> CatalogStats {
    let mut stats = CatalogStats {
        total: products.len(),
        ..Default::default()
    };
    for p in products {
        match p.stock_status() {
            StockStatus::Out => stats.out_of_stock_count += 1,
            StockStatus::Low => stats.low_stock_count += 1,
            StockStatus::Good => {}
        }
        if p.important {
            stats.important_count += 1;
        }
    }
    stats
}

fn stock_value(p: &Product) -> f64 {
    p.sale_price * p.stock
}

pub fn valuation_of(products: &[Product]) -> Valuation {
    let total_value: f64 = products.iter().map(stock_value).sum();
    let total_cost: f64 = products.iter().map(|p| p.purchase_price * p.stock).sum();

    let mut categories: Vec<CategorySummary> = Category::ALL
        .into_iter()
        .map(|category| {
            let items = products.iter().filter(|p| p.category == category);
            let mut summary = CategorySummary {
                category,
                count: 0,
                value: 0.0,
                low_stock: 0,
                out_of_stock: 0,
            };
            for p in items {
                summary.count += 1;
                summary.value += stock_value(p);
                match p.stock_status() {
                    StockStatus::Low => summary.low_stock += 1,
                    StockStatus::Out => summary.out_of_stock += 1,
                    StockStatus::Good => {}
                }
            }
            summary
        })
        .filter(|s| s.count > 0)
        .collect();
    categories.sort_by(|a, b| b.count.cmp(&a.count));

    let mut top_value = products.to_vec();
    top_value.sort_by(|a, b| stock_value(b).total_cmp(&stock_value(a)));
    top_value.truncate(VALUATION_TOP);

    let mut critical: Vec<Product> = products
        .iter()
        .filter(|p| match p.stock_status() {
            StockStatus::Out => true,
            StockStatus::Low => p.important,
            StockStatus::Good => false,
        })
        .cloned()
        .collect();
    critical.sort_by(|a, b| a.stock.total_cmp(&b.stock));
    critical.truncate(VALUATION_TOP);

    Valuation {
        total_value,
        total_cost,
        potential_profit: total_value - total_cost,
        categories,
        top_value,
        critical,
    }
}
