use crate::commands::AppStateExt;
use crate::db::DatabaseExt;
use crate::error::Result;
use crate::history::{self, HistoryQuery};
use crate::models::HistoryEntry;
use tauri::AppHandle;

#[tauri::command]
pub fn get_history(app: AppHandle, mut query: HistoryQuery) -> Result<Vec<HistoryEntry>> {
    app.actor()?;
    if query.limit.is_none() {
        query.limit = Some(app.session().settings.lock()?.history_limit);
    }
    history::query(app.db(), &query)
}

#[tauri::command]
pub fn get_history_actors(app: AppHandle) -> Result<Vec<String>> {
    app.actor()?;
    history::actors(app.db())
}
