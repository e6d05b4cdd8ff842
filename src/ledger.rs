use serde::{Deserialize, Serialize};

use crate::db::{now, Database};
use crate::error::{InventoryError, Result};
use crate::history;
use crate::models::{ActionKind, HistoryEntry, Product, StockChange};
use crate::policy::{ensure_capability, Actor, Capability};
use crate::products::{self, check_version};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StockUpdate {
    pub product: Product,
    pub history: HistoryEntry,
}

/// Parse free-form numeric entry. Negative and non-finite values are
/// rejected, not clamped.
pub fn parse_quantity(input: &str) -> Result<f64> {
    let trimmed = input.trim();
    let value: f64 = trimmed
        .replace(',', ".")
        .parse()
        .map_err(|_| InventoryError::InvalidQuantity(trimmed.to_string()))?;
    validate_quantity(value)?;
    Ok(value)
}

pub fn validate_quantity(value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(InventoryError::InvalidQuantity(value.to_string()));
    }
    Ok(())
}

/// Relative adjustment used by the +/- controls; never goes below zero.
pub fn apply_delta(current: f64, delta: f64) -> f64 {
    let next = current + delta;
    if next.is_finite() {
        next.max(0.0)
    } else {
        current
    }
}

/// The only path that changes a product's stock. Writes the product and
/// exactly one `stock_update` history entry in one transaction.
pub fn update_stock(
    db: &Database,
    actor: &Actor,
    product_id: i64,
    requested: f64,
    expected_version: Option<i64>,
) -> Result<StockUpdate> {
    ensure_capability(actor, Capability::AdjustStock)?;
    validate_quantity(requested)?;

    let update = db.write(|tx| {
        let current = products::get(tx, product_id)?;
        check_version(&current, expected_version)?;

        let previous = current.stock;
        let changed = tx.execute(
            "UPDATE products SET previous_stock = ?1, stock = ?2, version = version + 1, \
             updated_by = ?3, updated_at = ?4 WHERE id = ?5 AND version = ?6",
            rusqlite::params![
                previous,
                requested,
                actor.email,
                now(),
                product_id,
                current.version
            ],
        )?;
        if changed == 0 {
            return Err(InventoryError::Conflict(format!(
                "{} changed while updating stock",
                current.name
            )));
        }

        let history = history::record(
            tx,
            ActionKind::StockUpdate,
            &current.name,
            actor,
            &format!("Stock updated from {previous} to {requested}"),
            Some(StockChange {
                previous,
                new: requested,
            }),
        )?;

        let product = products::get(tx, product_id)?;
        Ok(StockUpdate { product, history })
    })?;

    tracing::info!(
        product_id,
        product = %update.product.name,
        previous = update.product.previous_stock,
        stock = update.product.stock,
        actor = %actor.email,
        "stock updated"
    );
    Ok(update)
}

/// Direct numeric entry from a form field.
pub fn update_stock_from_input(
    db: &Database,
    actor: &Actor,
    product_id: i64,
    input: &str,
    expected_version: Option<i64>,
) -> Result<StockUpdate> {
    ensure_capability(actor, Capability::AdjustStock)?;
    let requested = parse_quantity(input)?;
    update_stock(db, actor, product_id, requested, expected_version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{query, HistoryQuery};
    use crate::models::CreateProduct;
    use crate::policy::Role;

    fn setup(stock: f64) -> (Database, Product) {
        let db = Database::open_in_memory().unwrap();
        let admin = Actor::new("owner@bar.test", Role::Admin);
        let product = products::create_product(
            &db,
            &admin,
            CreateProduct {
                name: "Jack Daniel's".into(),
                stock,
                ..Default::default()
            },
        )
        .unwrap();
        (db, product)
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity(" 12 ").unwrap(), 12.0);
        assert_eq!(parse_quantity("2,5").unwrap(), 2.5);
        assert!(matches!(parse_quantity("abc"), Err(InventoryError::InvalidQuantity(_))));
        assert!(matches!(parse_quantity("-1"), Err(InventoryError::InvalidQuantity(_))));
        assert!(matches!(parse_quantity("NaN"), Err(InventoryError::InvalidQuantity(_))));
        assert!(matches!(parse_quantity("inf"), Err(InventoryError::InvalidQuantity(_))));
    }

    #[test]
    fn test_apply_delta_clamps_at_zero() {
        assert_eq!(apply_delta(12.0, -15.0), 0.0);
        assert_eq!(apply_delta(3.0, 10.0), 13.0);
        assert_eq!(apply_delta(3.0, f64::NAN), 3.0);
    }

    #[test]
    fn test_update_captures_previous_stock() {
        let (db, product) = setup(12.0);
        let bartender = Actor::new("tom@bar.test", Role::Bartender);

        let update = update_stock(&db, &bartender, product.id, 7.0, Some(product.version)).unwrap();
        assert_eq!(update.product.stock, 7.0);
        assert_eq!(update.product.previous_stock, 12.0);
        assert_eq!(update.product.updated_by, "tom@bar.test");
        assert_eq!(update.product.version, product.version + 1);
        assert_eq!(update.history.previous_stock, Some(12.0));
        assert_eq!(update.history.new_stock, Some(7.0));
        assert_eq!(update.history.details, "Stock updated from 12 to 7");
    }

    #[test]
    fn test_unchanged_value_is_still_logged() {
        let (db, product) = setup(4.0);
        let bartender = Actor::new("tom@bar.test", Role::Bartender);

        update_stock(&db, &bartender, product.id, 4.0, None).unwrap();
        let entries = query(
            &db,
            &HistoryQuery { action: Some(ActionKind::StockUpdate), ..Default::default() },
        )
        .unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_stale_version_is_rejected() {
        let (db, product) = setup(4.0);
        let bartender = Actor::new("tom@bar.test", Role::Bartender);

        update_stock(&db, &bartender, product.id, 5.0, Some(product.version)).unwrap();
        let err = update_stock(&db, &bartender, product.id, 9.0, Some(product.version)).unwrap_err();
        assert!(matches!(err, InventoryError::Conflict(_)));

        let stored = db.read(|c| products::get(c, product.id)).unwrap();
        assert_eq!(stored.stock, 5.0);
    }

    #[test]
    fn test_missing_product() {
        let (db, _) = setup(4.0);
        let bartender = Actor::new("tom@bar.test", Role::Bartender);
        let err = update_stock(&db, &bartender, 999, 1.0, None).unwrap_err();
        assert!(matches!(err, InventoryError::NotFound(_)));
    }
}
