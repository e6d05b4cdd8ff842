use crate::commands::AppStateExt;
use crate::db::DatabaseExt;
use crate::error::Result;
use crate::models::{Provider, SaveProvider};
use crate::providers;
use tauri::AppHandle;

#[tauri::command]
pub fn get_providers(app: AppHandle) -> Result<Vec<Provider>> {
    app.actor()?;
    providers::get_providers(app.db())
}

#[tauri::command]
pub fn create_provider(app: AppHandle, provider: SaveProvider) -> Result<Provider> {
    providers::create_provider(app.db(), &app.actor()?, provider)
}

#[tauri::command]
pub fn update_provider(app: AppHandle, id: i64, provider: SaveProvider) -> Result<Provider> {
    providers::update_provider(app.db(), &app.actor()?, id, provider)
}

#[tauri::command]
pub fn delete_provider(app: AppHandle, id: i64, confirmed: bool) -> Result<()> {
    providers::delete_provider(app.db(), &app.actor()?, id, confirmed)
}
