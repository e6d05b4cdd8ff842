use rusqlite::{Connection, OptionalExtension, Row};

use crate::db::{now, Database};
use crate::error::{InventoryError, Result};
use crate::history;
use crate::models::{
    ActionKind, Category, CreateProduct, Product, Unit, UpdateProduct,
    DEFAULT_LOW_STOCK_THRESHOLD,
};
use crate::policy::{ensure_capability, Actor, Capability};

const PRODUCT_COLUMNS: &str = "id, name, brand, category, stock, low_stock_threshold, unit, \
     sale_price, purchase_price, provider_id, barcode, sku, upc, important, notes, \
     previous_stock, version, created_by, updated_by, created_at, updated_at";

// Defaults are resolved here, once, so callers never see missing fields.
fn product_from_row(row: &Row<'_>) -> rusqlite::Result<Product> {
    Ok(Product {
        id: row.get(0)?,
        name: row.get(1)?,
        brand: row.get(2)?,
        category: row
            .get::<_, Option<String>>(3)?
            .map(|s| Category::parse_or_default(&s))
            .unwrap_or_default(),
        stock: row.get::<_, Option<f64>>(4)?.unwrap_or(0.0).max(0.0),
        low_stock_threshold: row
            .get::<_, Option<f64>>(5)?
            .unwrap_or(DEFAULT_LOW_STOCK_THRESHOLD),
        unit: row
            .get::<_, Option<String>>(6)?
            .map(|s| Unit::parse_or_default(&s))
            .unwrap_or_default(),
        sale_price: row.get::<_, Option<f64>>(7)?.unwrap_or(0.0),
        purchase_price: row.get::<_, Option<f64>>(8)?.unwrap_or(0.0),
        provider_id: row.get(9)?,
        barcode: row.get(10)?,
        sku: row.get(11)?,
        upc: row.get(12)?,
        important: row.get(13)?,
        notes: row.get::<_, Option<String>>(14)?.unwrap_or_default(),
        previous_stock: row.get::<_, Option<f64>>(15)?.unwrap_or(0.0),
        version: row.get(16)?,
        created_by: row.get(17)?,
        updated_by: row.get(18)?,
        created_at: row.get(19)?,
        updated_at: row.get(20)?,
    })
}

pub fn load_all(conn: &Connection) -> Result<Vec<Product>> {
    let mut stmt = conn.prepare(&format!("SELECT {PRODUCT_COLUMNS} FROM products"))?;

    let products = stmt
        .query_map([], product_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(products)
}

pub fn find(conn: &Connection, id: i64) -> Result<Option<Product>> {
    let product = conn
        .query_row(
            &format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"),
            [id],
            product_from_row,
        )
        .optional()?;
    Ok(product)
}

pub fn get(conn: &Connection, id: i64) -> Result<Product> {
    find(conn, id)?.ok_or_else(|| InventoryError::NotFound(format!("Product {id}")))
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn validate_amount(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(InventoryError::Validation(format!(
            "{field} must be a non-negative number"
        )));
    }
    Ok(())
}

pub fn create_product(db: &Database, actor: &Actor, product: CreateProduct) -> Result<Product> {
    ensure_capability(actor, Capability::EditProduct)?;

    let name = product.name.trim().to_string();
    if name.is_empty() {
        return Err(InventoryError::Validation("Product name is required".into()));
    }
    if !product.stock.is_finite() || product.stock < 0.0 {
        return Err(InventoryError::InvalidQuantity(product.stock.to_string()));
    }
    validate_amount("Sale price", product.sale_price)?;
    validate_amount("Purchase price", product.purchase_price)?;
    let threshold = product
        .low_stock_threshold
        .unwrap_or(DEFAULT_LOW_STOCK_THRESHOLD);
    validate_amount("Low stock threshold", threshold)?;

    let created = db.write(|tx| {
        let ts = now();
        tx.execute(
            "INSERT INTO products (name, brand, category, stock, low_stock_threshold, unit, \
             sale_price, purchase_price, provider_id, barcode, sku, upc, important, notes, \
             previous_stock, version, created_by, updated_by, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?4, 1, ?15, ?15, ?16, ?16)",
            rusqlite::params![
                name,
                blank_to_none(product.brand),
                product.category.unwrap_or_default().as_str(),
                product.stock,
                threshold,
                product.unit.unwrap_or_default().as_str(),
                product.sale_price,
                product.purchase_price,
                product.provider_id,
                blank_to_none(product.barcode),
                blank_to_none(product.sku),
                blank_to_none(product.upc),
                product.important,
                product.notes.unwrap_or_default(),
                actor.email,
                ts,
            ],
        )?;

        let created = get(tx, tx.last_insert_rowid())?;
        history::record(tx, ActionKind::Create, &created.name, actor, "Product created", None)?;
        Ok(created)
    })?;

    tracing::info!(product_id = created.id, actor = %actor.email, "product created");
    Ok(created)
}

pub fn update_product(db: &Database, actor: &Actor, product: UpdateProduct) -> Result<Product> {
    ensure_capability(actor, Capability::EditProduct)?;

    let name = product.name.trim().to_string();
    if name.is_empty() {
        return Err(InventoryError::Validation("Product name is required".into()));
    }
    validate_amount("Sale price", product.sale_price)?;
    validate_amount("Purchase price", product.purchase_price)?;
    validate_amount("Low stock threshold", product.low_stock_threshold)?;

    let updated = db.write(|tx| {
        let current = get(tx, product.id)?;
        check_version(&current, product.expected_version)?;

        tx.execute(
            "UPDATE products SET name = ?1, brand = ?2, category = ?3, low_stock_threshold = ?4, \
             unit = ?5, sale_price = ?6, purchase_price = ?7, provider_id = ?8, barcode = ?9, \
             sku = ?10, upc = ?11, notes = ?12, version = version + 1, updated_by = ?13, \
             updated_at = ?14 WHERE id = ?15",
            rusqlite::params![
                name,
                blank_to_none(product.brand),
                product.category.as_str(),
                product.low_stock_threshold,
                product.unit.as_str(),
                product.sale_price,
                product.purchase_price,
                product.provider_id,
                blank_to_none(product.barcode),
                blank_to_none(product.sku),
                blank_to_none(product.upc),
                product.notes,
                actor.email,
                now(),
                product.id,
            ],
        )?;

        let updated = get(tx, product.id)?;
        history::record(tx, ActionKind::Edit, &updated.name, actor, "Product edited", None)?;
        Ok(updated)
    })?;

    tracing::info!(product_id = updated.id, actor = %actor.email, "product edited");
    Ok(updated)
}

/// Hard delete. The caller must pass `confirmed = true` after asking the
/// user; the history entry keeps the product name after the row is gone.
pub fn delete_product(db: &Database, actor: &Actor, id: i64, confirmed: bool) -> Result<()> {
    ensure_capability(actor, Capability::DeleteProduct)?;
    if !confirmed {
        return Err(InventoryError::ConfirmationRequired(format!("delete product {id}")));
    }

    let name = db.write(|tx| {
        let current = get(tx, id)?;
        tx.execute("DELETE FROM products WHERE id = ?1", [id])?;
        history::record(
            tx,
            ActionKind::Delete,
            &current.name,
            actor,
            "Product removed from inventory",
            None,
        )?;
        Ok(current.name)
    })?;

    tracing::info!(product_id = id, product = %name, actor = %actor.email, "product deleted");
    Ok(())
}

pub fn toggle_important(db: &Database, actor: &Actor, id: i64) -> Result<Product> {
    ensure_capability(actor, Capability::EditProduct)?;

    db.write(|tx| {
        let current = get(tx, id)?;
        let important = !current.important;

        tx.execute(
            "UPDATE products SET important = ?1, version = version + 1, updated_by = ?2, \
             updated_at = ?3 WHERE id = ?4",
            rusqlite::params![important, actor.email, now(), id],
        )?;

        let details = if important {
            "Product marked as important"
        } else {
            "Product unmarked as important"
        };
        history::record(tx, ActionKind::MarkImportant, &current.name, actor, details, None)?;
        get(tx, id)
    })
}

pub(crate) fn check_version(current: &Product, expected: Option<i64>) -> Result<()> {
    match expected {
        Some(v) if v != current.version => Err(InventoryError::Conflict(format!(
            "{} was changed by someone else (version {} != {})",
            current.name, current.version, v
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::Role;

    fn admin() -> Actor {
        Actor::new("owner@bar.test", Role::Admin)
    }

    fn sample(name: &str) -> CreateProduct {
        CreateProduct {
            name: name.to_string(),
            stock: 10.0,
            sale_price: 20.0,
            purchase_price: 12.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_create_resolves_defaults() {
        let db = Database::open_in_memory().unwrap();
        let p = create_product(&db, &admin(), sample("Fernet")).unwrap();

        assert_eq!(p.category, Category::Liquor);
        assert_eq!(p.unit, Unit::Bottle);
        assert!((p.low_stock_threshold - 5.0).abs() < f64::EPSILON);
        assert_eq!(p.version, 1);
        assert_eq!(p.created_by, "owner@bar.test");
        assert_eq!(p.updated_by, "owner@bar.test");
    }

    #[test]
    fn test_create_requires_name() {
        let db = Database::open_in_memory().unwrap();
        let err = create_product(&db, &admin(), sample("   ")).unwrap_err();
        assert!(matches!(err, InventoryError::Validation(_)));
    }

    #[test]
    fn test_blank_codes_are_stored_as_none() {
        let db = Database::open_in_memory().unwrap();
        let mut input = sample("Campari");
        input.barcode = Some("  ".into());
        input.sku = Some(" SKU-1 ".into());
        let p = create_product(&db, &admin(), input).unwrap();
        assert_eq!(p.barcode, None);
        assert_eq!(p.sku.as_deref(), Some("SKU-1"));
    }

    #[test]
    fn test_edit_rejects_stale_version() {
        let db = Database::open_in_memory().unwrap();
        let p = create_product(&db, &admin(), sample("Aperol")).unwrap();
        toggle_important(&db, &admin(), p.id).unwrap();

        let edit = UpdateProduct {
            id: p.id,
            name: "Aperol Spritz".into(),
            brand: None,
            category: Category::Liquor,
            low_stock_threshold: 3.0,
            unit: Unit::Bottle,
            sale_price: 25.0,
            purchase_price: 15.0,
            provider_id: None,
            barcode: None,
            sku: None,
            upc: None,
            notes: String::new(),
            expected_version: Some(p.version),
        };
        let err = update_product(&db, &admin(), edit).unwrap_err();
        assert!(matches!(err, InventoryError::Conflict(_)));
    }

    #[test]
    fn test_delete_needs_confirmation() {
        let db = Database::open_in_memory().unwrap();
        let p = create_product(&db, &admin(), sample("Malbec")).unwrap();

        let err = delete_product(&db, &admin(), p.id, false).unwrap_err();
        assert!(matches!(err, InventoryError::ConfirmationRequired(_)));
        assert!(db.read(|c| find(c, p.id)).unwrap().is_some());

        delete_product(&db, &admin(), p.id, true).unwrap();
        assert!(db.read(|c| find(c, p.id)).unwrap().is_none());
    }

    #[test]
    fn test_toggle_important_flips_flag() {
        let db = Database::open_in_memory().unwrap();
        let p = create_product(&db, &admin(), sample("Gancia")).unwrap();

        let p = toggle_important(&db, &admin(), p.id).unwrap();
        assert!(p.important);
        let p = toggle_important(&db, &admin(), p.id).unwrap();
        assert!(!p.important);
        assert_eq!(p.version, 3);
    }
}
