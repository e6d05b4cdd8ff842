use crate::catalog::{Catalog, CatalogStats, Listing, ProductFilter, Valuation};
use crate::commands::AppStateExt;
use crate::db::DatabaseExt;
use crate::error::Result;
use crate::ledger::{self, StockUpdate};
use crate::models::{CreateProduct, Product, UpdateProduct};
use crate::products;
use crate::providers;
use tauri::AppHandle;

fn catalog(app: &AppHandle) -> Catalog {
    Catalog::new(app.db().subscribe())
}

#[tauri::command]
pub fn get_products(app: AppHandle, filter: Option<ProductFilter>) -> Result<Listing> {
    app.actor()?;
    let providers = providers::get_providers(app.db())?;
    Ok(catalog(&app).listing(&filter.unwrap_or_default(), &providers))
}

#[tauri::command]
pub fn get_stats(app: AppHandle) -> Result<CatalogStats> {
    app.actor()?;
    Ok(catalog(&app).stats())
}

#[tauri::command]
pub fn get_valuation(app: AppHandle) -> Result<Valuation> {
    app.actor()?;
    Ok(catalog(&app).valuation())
}

#[tauri::command]
pub fn find_by_code(app: AppHandle, code: String) -> Result<Product> {
    app.actor()?;
    catalog(&app).find_by_code(&code)
}

#[tauri::command]
pub fn create_product(app: AppHandle, product: CreateProduct) -> Result<Product> {
    products::create_product(app.db(), &app.actor()?, product)
}

#[tauri::command]
pub fn update_product(app: AppHandle, product: UpdateProduct) -> Result<Product> {
    products::update_product(app.db(), &app.actor()?, product)
}

#[tauri::command]
pub fn delete_product(app: AppHandle, id: i64, confirmed: bool) -> Result<()> {
    products::delete_product(app.db(), &app.actor()?, id, confirmed)
}

#[tauri::command]
pub fn toggle_important(app: AppHandle, id: i64) -> Result<Product> {
    products::toggle_important(app.db(), &app.actor()?, id)
}

/// Direct entry from the product form. `quantity` is the raw text field.
#[tauri::command]
pub fn update_stock(
    app: AppHandle,
    product_id: i64,
    quantity: String,
    expected_version: Option<i64>,
) -> Result<StockUpdate> {
    ledger::update_stock_from_input(app.db(), &app.actor()?, product_id, &quantity, expected_version)
}
