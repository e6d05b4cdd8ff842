pub mod alerts;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod history;
pub mod ledger;
pub mod models;
pub mod policy;
pub mod products;
pub mod providers;
pub mod quick_adjust;
pub mod users;

#[cfg(feature = "desktop")]
mod commands;


pub use error::{InventoryError, Result};

/// Install the fmt subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("bar_stock_lib=info"));
    // A second call (tests, re-entry) keeps the first subscriber.
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

#[cfg(feature = "desktop")]
pub use desktop::run;

#[cfg(feature = "desktop")]
mod desktop {
    use crate::commands::{self, alerts, history, products, providers, quick_adjust, users};
    use crate::config::{Settings, SETTINGS_FILE};
    use crate::db::Database;
    use tauri::{
        menu::{Menu, MenuItem},
        tray::{MouseButton, MouseButtonState, TrayIconBuilder, TrayIconEvent},
        Manager,
    };

    #[cfg_attr(mobile, tauri::mobile_entry_point)]
    pub fn run() {
        crate::init_tracing();

        let result = tauri::Builder::default()
            .setup(|app| {
                let data_dir = app.path().app_data_dir()?;
                let settings = Settings::load(data_dir.join(SETTINGS_FILE)).unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "ignoring unreadable settings");
                    Settings::default()
                });

                let db = Database::open(settings.database_path(&data_dir))?;
                app.manage(db);
                app.manage(commands::AppState::new(data_dir, settings));

                let check = MenuItem::with_id(app, "check", "Check stock now", true, None::<&str>)?;
                let quit = MenuItem::with_id(app, "quit", "Quit", true, None::<&str>)?;
                let menu = Menu::with_items(app, &[&check, &quit])?;

                let mut tray = TrayIconBuilder::new()
                    .menu(&menu)
                    .show_menu_on_left_click(false)
                    .on_tray_icon_event(|tray, event| {
                        if let TrayIconEvent::Click {
                            button: MouseButton::Left,
                            button_state: MouseButtonState::Up,
                            ..
                        } = event
                        {
                            let app = tray.app_handle();
                            if let Some(window) = app.get_webview_window("main") {
                                if window.is_visible().unwrap_or(false) {
                                    let _ = window.hide();
                                } else {
                                    let _ = window.show();
                                    let _ = window.set_focus();
                                }
                            }
                        }
                    })
                    .on_menu_event(|app, event| match event.id.as_ref() {
                        "check" => {
                            if let Err(e) = alerts::check_stock_now(app.clone()) {
                                tracing::warn!(error = %e, "manual stock check failed");
                            }
                        }
                        "quit" => app.exit(0),
                        _ => {}
                    });
                if let Some(icon) = app.default_window_icon() {
                    tray = tray.icon(icon.clone());
                }
                tray.build(app)?;

                Ok(())
            })
            .invoke_handler(tauri::generate_handler![
                // Products
                products::get_products,
                products::get_stats,
                products::get_valuation,
                products::find_by_code,
                products::create_product,
                products::update_product,
                products::delete_product,
                products::toggle_important,
                products::update_stock,
                // History
                history::get_history,
                history::get_history_actors,
                // Providers
                providers::get_providers,
                providers::create_provider,
                providers::update_provider,
                providers::delete_provider,
                // Users
                users::sign_in,
                users::sign_out,
                users::get_users,
                users::create_user,
                users::update_user,
                users::delete_user,
                // Quick adjust
                quick_adjust::quick_search,
                quick_adjust::quick_scan,
                quick_adjust::quick_select,
                quick_adjust::quick_adjust,
                quick_adjust::quick_set,
                quick_adjust::quick_refresh,
                quick_adjust::quick_commit,
                quick_adjust::quick_cancel,
                quick_adjust::quick_shortcuts,
                // Alerts
                alerts::get_settings,
                alerts::save_settings,
                alerts::check_stock_now,
            ])
            .run(tauri::generate_context!());

        if let Err(e) = result {
            tracing::error!(error = %e, "error while running tauri application");
        }
    }
}
