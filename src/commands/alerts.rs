use std::sync::Arc;

use crate::alerts::{AlertScheduler, AlertSink, StockAlert};
use crate::catalog::Catalog;
use crate::commands::AppStateExt;
use crate::config::{Settings, SETTINGS_FILE};
use crate::db::DatabaseExt;
use crate::error::Result;
use tauri::{AppHandle, Emitter};

pub const ALERT_EVENT: &str = "stock-alert";

/// Forwards alerts to the web view, which shows the system notification.
struct EventSink(AppHandle);

impl AlertSink for EventSink {
    fn deliver(&self, alert: &StockAlert) {
        if let Err(e) = self.0.emit(ALERT_EVENT, alert) {
            tracing::warn!(tag = %alert.tag, error = %e, "could not emit stock alert");
        }
    }
}

fn scheduler(app: &AppHandle, settings: &Settings) -> Result<AlertScheduler> {
    AlertScheduler::new(
        Catalog::new(app.db().subscribe()),
        settings.alerts.schedule,
        settings.alerts.kinds,
        Arc::new(EventSink(app.clone())),
    )
}

/// (Re)start the background check with the current settings.
pub(crate) fn start(app: &AppHandle) -> Result<()> {
    stop(app)?;

    let settings = app.session().settings.lock()?.clone();
    if !settings.alerts.enabled {
        tracing::info!("stock alerts disabled");
        return Ok(());
    }

    let handle = scheduler(app, &settings)?.spawn_with(|task| {
        tauri::async_runtime::spawn(task);
    });
    *app.session().alerts.lock()? = Some(handle);
    Ok(())
}

pub(crate) fn stop(app: &AppHandle) -> Result<()> {
    if let Some(handle) = app.session().alerts.lock()?.take() {
        handle.stop();
    }
    Ok(())
}

#[tauri::command]
pub fn get_settings(app: AppHandle) -> Result<Settings> {
    Ok(app.session().settings.lock()?.clone())
}

#[tauri::command]
pub fn save_settings(app: AppHandle, settings: Settings) -> Result<Settings> {
    settings.save_as(&app.actor()?, app.session().data_dir.join(SETTINGS_FILE))?;
    *app.session().settings.lock()? = settings.clone();
    start(&app)?;
    Ok(settings)
}

/// Evaluate the catalog right away. Returns how many alerts were delivered.
#[tauri::command]
pub fn check_stock_now(app: AppHandle) -> Result<usize> {
    let settings = app.session().settings.lock()?.clone();
    Ok(scheduler(&app, &settings)?.check_now())
}
