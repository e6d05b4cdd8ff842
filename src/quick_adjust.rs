use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::catalog::Catalog;
use crate::db::Database;
use crate::error::{InventoryError, Result};
use crate::ledger::{self, StockUpdate};
use crate::models::Product;
use crate::policy::Actor;

pub const MIN_SEARCH_CHARS: usize = 2;
pub const MAX_CANDIDATES: usize = 10;
pub const MAX_RECENT: usize = 10;
pub const TOP_FREQUENT: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Idle,
    Searching {
        term: String,
        candidates: Vec<Product>,
    },
    ProductSelected {
        product: Product,
        working: f64,
    },
    Committing {
        product: Product,
        working: f64,
    },
}

/// Locally persisted "recently adjusted" and "frequently adjusted" lists.
/// Not shared between devices.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct UsageRanking {
    recent: Vec<i64>,
    counts: HashMap<i64, u32>,
    #[serde(skip)]
    path: Option<PathBuf>,
}

impl UsageRanking {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load from `path`; a missing file starts empty, a corrupt one is
    /// discarded with a warning.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let mut ranking = match std::fs::read_to_string(path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "discarding unreadable usage ranking");
                UsageRanking::default()
            }),
            Err(_) => UsageRanking::default(),
        };
        ranking.path = Some(path.to_path_buf());
        ranking
    }

    pub fn record(&mut self, product_id: i64) {
        self.recent.retain(|id| *id != product_id);
        self.recent.insert(0, product_id);
        self.recent.truncate(MAX_RECENT);
        *self.counts.entry(product_id).or_insert(0) += 1;
    }

    pub fn recent(&self) -> &[i64] {
        &self.recent
    }

    /// Most adjusted first; ties by product id so the order is stable.
    pub fn frequent(&self) -> Vec<i64> {
        let mut ranked: Vec<(i64, u32)> = self.counts.iter().map(|(id, n)| (*id, *n)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked.into_iter().take(TOP_FREQUENT).map(|(id, _)| id).collect()
    }

    /// Forget products for which `keep` is false.
    pub fn retain(&mut self, keep: impl Fn(i64) -> bool) {
        self.recent.retain(|id| keep(*id));
        self.counts.retain(|id, _| keep(*id));
    }

    pub fn count(&self, product_id: i64) -> u32 {
        self.counts.get(&product_id).copied().unwrap_or(0)
    }

    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec(self)?)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

/// Quick stock adjustment flow.
///
/// ```text
/// Idle --search(>=2 chars)--> Searching --select--> ProductSelected
///  |                                                   |   ^
///  +--scan(hit)----------------------------------------+   | failure
///                                                      v   |
///                                   Idle <--success-- Committing
/// ```
pub struct QuickAdjustSession {
    catalog: Catalog,
    ranking: UsageRanking,
    state: SessionState,
}

impl QuickAdjustSession {
    /// Ranking entries for products no longer in the catalog are dropped.
    pub fn new(catalog: Catalog, mut ranking: UsageRanking) -> Self {
        let known: HashSet<i64> = catalog.list().iter().map(|p| p.id).collect();
        ranking.retain(|id| known.contains(&id));
        Self {
            catalog,
            ranking,
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn ranking(&self) -> &UsageRanking {
        &self.ranking
    }

    /// Working quantity, when a product is selected.
    pub fn working(&self) -> Option<f64> {
        match &self.state {
            SessionState::ProductSelected { working, .. }
            | SessionState::Committing { working, .. } => Some(*working),
            _ => None,
        }
    }

    fn ensure_browsing(&self, action: &str) -> Result<()> {
        match self.state {
            SessionState::Idle | SessionState::Searching { .. } => Ok(()),
            _ => Err(InventoryError::Validation(format!(
                "cannot {action} while a product is selected"
            ))),
        }
    }

    /// Update the search term. Fewer than two characters goes back to idle.
    pub fn search(&mut self, term: &str) -> Result<Vec<Product>> {
        self.ensure_browsing("search")?;

        let term = term.trim();
        if term.chars().count() < MIN_SEARCH_CHARS {
            self.state = SessionState::Idle;
            return Ok(Vec::new());
        }

        let candidates = self.catalog.search(term, MAX_CANDIDATES);
        self.state = SessionState::Searching {
            term: term.to_string(),
            candidates: candidates.clone(),
        };
        Ok(candidates)
    }

    /// Scanned or typed code. A miss leaves the session idle.
    pub fn scan(&mut self, code: &str) -> Result<Product> {
        self.ensure_browsing("scan")?;

        match self.catalog.find_by_code(code) {
            Ok(product) => {
                tracing::debug!(product_id = product.id, "code matched");
                Ok(self.enter_selected(product))
            }
            Err(e) => {
                self.state = SessionState::Idle;
                Err(e)
            }
        }
    }

    /// Pick a search candidate, or a product from the recent/frequent lists.
    /// The working value is seeded from the live snapshot, not from the
    /// candidate captured at search time.
    pub fn select(&mut self, product_id: i64) -> Result<Product> {
        self.ensure_browsing("select")?;

        let product = self
            .catalog
            .get(product_id)
            .ok_or_else(|| InventoryError::NotFound(format!("Product {product_id}")))?;

        Ok(self.enter_selected(product))
    }

    fn enter_selected(&mut self, product: Product) -> Product {
        self.state = SessionState::ProductSelected {
            product: product.clone(),
            working: product.stock,
        };
        product
    }

    fn working_mut(&mut self) -> Result<&mut f64> {
        match &mut self.state {
            SessionState::ProductSelected { working, .. } => Ok(working),
            _ => Err(InventoryError::Validation("no product selected".into())),
        }
    }

    /// Relative step (+1, -10, any signed delta). Clamped at zero.
    pub fn adjust(&mut self, delta: f64) -> Result<f64> {
        let working = self.working_mut()?;
        *working = ledger::apply_delta(*working, delta);
        Ok(*working)
    }

    /// Absolute overwrite. Negative values clamp to zero.
    pub fn set(&mut self, value: f64) -> Result<f64> {
        if !value.is_finite() {
            return Err(InventoryError::InvalidQuantity(value.to_string()));
        }
        let working = self.working_mut()?;
        *working = value.max(0.0);
        Ok(*working)
    }

    /// Absolute overwrite from typed text. Unparseable input leaves the
    /// working value untouched.
    pub fn set_from_input(&mut self, input: &str) -> Result<f64> {
        let trimmed = input.trim();
        let value: f64 = trimmed
            .replace(',', ".")
            .parse()
            .map_err(|_| InventoryError::InvalidQuantity(trimmed.to_string()))?;
        self.set(value)
    }

    /// Write the working value through the ledger. On failure the session
    /// stays on the selected product with the working value intact.
    pub fn commit(&mut self, db: &Database, actor: &Actor) -> Result<StockUpdate> {
        let (product, working) = match std::mem::replace(&mut self.state, SessionState::Idle) {
            SessionState::ProductSelected { product, working } => (product, working),
            other => {
                self.state = other;
                return Err(InventoryError::Validation("no product selected".into()));
            }
        };
        self.state = SessionState::Committing {
            product: product.clone(),
            working,
        };

        match ledger::update_stock(db, actor, product.id, working, Some(product.version)) {
            Ok(update) => {
                self.ranking.record(product.id);
                if let Err(e) = self.ranking.save() {
                    tracing::warn!(error = %e, "could not persist usage ranking");
                }
                self.state = SessionState::Idle;
                Ok(update)
            }
            Err(e) => {
                tracing::warn!(product_id = product.id, error = %e, "quick adjust commit failed");
                self.state = SessionState::ProductSelected { product, working };
                Err(e)
            }
        }
    }

    /// Re-read the selected product from the catalog after a conflict,
    /// keeping the working value so the user can retry.
    pub fn refresh(&mut self) -> Result<Product> {
        let id = match &self.state {
            SessionState::ProductSelected { product, .. } => product.id,
            _ => return Err(InventoryError::Validation("no product selected".into())),
        };
        let latest = self
            .catalog
            .get(id)
            .ok_or_else(|| InventoryError::NotFound(format!("Product {id}")))?;
        if let SessionState::ProductSelected { product, .. } = &mut self.state {
            *product = latest.clone();
        }
        Ok(latest)
    }

    /// Drop the working value. Ignored while a commit is in flight.
    pub fn cancel(&mut self) {
        if !matches!(self.state, SessionState::Committing { .. }) {
            self.state = SessionState::Idle;
        }
    }

    /// Recently adjusted products that still exist.
    pub fn recent_products(&self) -> Vec<Product> {
        self.ranking
            .recent()
            .iter()
            .filter_map(|id| self.catalog.get(*id))
            .collect()
    }

    pub fn frequent_products(&self) -> Vec<Product> {
        self.ranking
            .frequent()
            .into_iter()
            .filter_map(|id| self.catalog.get(id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recent_is_bounded_and_deduplicated() {
        let mut ranking = UsageRanking::in_memory();
        for id in 1..=12 {
            ranking.record(id);
        }
        ranking.record(5);

        assert_eq!(ranking.recent().len(), MAX_RECENT);
        assert_eq!(ranking.recent()[0], 5);
        assert_eq!(ranking.recent().iter().filter(|id| **id == 5).count(), 1);
        assert!(!ranking.recent().contains(&1));
    }

    #[test]
    fn test_frequent_top_five() {
        let mut ranking = UsageRanking::in_memory();
        for (id, times) in [(1, 1), (2, 4), (3, 2), (4, 6), (5, 3), (6, 2), (7, 1)] {
            for _ in 0..times {
                ranking.record(id);
            }
        }
        assert_eq!(ranking.frequent(), vec![4, 2, 5, 3, 6]);
        assert_eq!(ranking.count(4), 6);
    }

    #[test]
    fn test_ranking_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("usage.json");

        let mut ranking = UsageRanking::load(&path);
        ranking.record(3);
        ranking.record(9);
        ranking.save().unwrap();

        let reloaded = UsageRanking::load(&path);
        assert_eq!(reloaded.recent(), &[9, 3]);
        assert_eq!(reloaded.count(3), 1);
    }

    #[test]
    fn test_retain_drops_unknown_products() {
        let mut ranking = UsageRanking::in_memory();
        for id in [1, 2, 2, 3] {
            ranking.record(id);
        }
        ranking.retain(|id| id != 2);

        assert_eq!(ranking.recent(), &[3, 1]);
        assert_eq!(ranking.count(2), 0);
        assert_eq!(ranking.frequent(), vec![1, 3]);
    }

    #[test]
    fn test_corrupt_ranking_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("usage.json");
        std::fs::write(&path, "{not json").unwrap();

        let ranking = UsageRanking::load(&path);
        assert!(ranking.recent().is_empty());
    }
}
