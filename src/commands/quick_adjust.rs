use serde::Serialize;

use crate::commands::AppStateExt;
use crate::db::DatabaseExt;
use crate::error::{InventoryError, Result};
use crate::ledger::StockUpdate;
use crate::models::Product;
use crate::quick_adjust::QuickAdjustSession;
use tauri::AppHandle;

fn with_session<T>(app: &AppHandle, f: impl FnOnce(&mut QuickAdjustSession) -> Result<T>) -> Result<T> {
    let mut guard = app.session().quick.lock()?;
    let session = guard
        .as_mut()
        .ok_or_else(|| InventoryError::Validation("Not signed in".into()))?;
    f(session)
}

#[derive(Debug, Serialize)]
pub struct Shortcuts {
    pub recent: Vec<Product>,
    pub frequent: Vec<Product>,
}

#[tauri::command]
pub fn quick_search(app: AppHandle, term: String) -> Result<Vec<Product>> {
    with_session(&app, |s| s.search(&term))
}

#[tauri::command]
pub fn quick_scan(app: AppHandle, code: String) -> Result<Product> {
    with_session(&app, |s| s.scan(&code))
}

#[tauri::command]
pub fn quick_select(app: AppHandle, product_id: i64) -> Result<Product> {
    with_session(&app, |s| s.select(product_id))
}

#[tauri::command]
pub fn quick_adjust(app: AppHandle, delta: f64) -> Result<f64> {
    with_session(&app, |s| s.adjust(delta))
}

#[tauri::command]
pub fn quick_set(app: AppHandle, value: String) -> Result<f64> {
    with_session(&app, |s| s.set_from_input(&value))
}

#[tauri::command]
pub fn quick_refresh(app: AppHandle) -> Result<Product> {
    with_session(&app, |s| s.refresh())
}

#[tauri::command]
pub fn quick_commit(app: AppHandle) -> Result<StockUpdate> {
    let actor = app.actor()?;
    with_session(&app, |s| s.commit(app.db(), &actor))
}

#[tauri::command]
pub fn quick_cancel(app: AppHandle) -> Result<()> {
    with_session(&app, |s| {
        s.cancel();
        Ok(())
    })
}

#[tauri::command]
pub fn quick_shortcuts(app: AppHandle) -> Result<Shortcuts> {
    with_session(&app, |s| {
        Ok(Shortcuts {
            recent: s.recent_products(),
            frequent: s.frequent_products(),
        })
    })
}
