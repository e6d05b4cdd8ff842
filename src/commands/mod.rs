pub mod alerts;
pub mod history;
pub mod products;
pub mod providers;
pub mod quick_adjust;
pub mod users;

use std::path::PathBuf;
use std::sync::Mutex;

use tauri::{AppHandle, Manager};

use crate::alerts::AlertHandle;
use crate::config::Settings;
use crate::error::{InventoryError, Result};
use crate::policy::Actor;
use crate::quick_adjust::QuickAdjustSession;

/// Per-window session state. The signed-in actor lives here so that the
/// front end cannot pick its own role; commands read it and pass it on.
pub struct AppState {
    pub data_dir: PathBuf,
    pub settings: Mutex<Settings>,
    pub actor: Mutex<Option<Actor>>,
    pub quick: Mutex<Option<QuickAdjustSession>>,
    pub alerts: Mutex<Option<AlertHandle>>,
}

impl AppState {
    pub fn new(data_dir: PathBuf, settings: Settings) -> Self {
        Self {
            data_dir,
            settings: Mutex::new(settings),
            actor: Mutex::new(None),
            quick: Mutex::new(None),
            alerts: Mutex::new(None),
        }
    }
}

pub trait AppStateExt {
    fn session(&self) -> &AppState;

    /// The signed-in actor, or an error when nobody is signed in.
    fn actor(&self) -> Result<Actor> {
        self.session()
            .actor
            .lock()?
            .clone()
            .ok_or_else(|| InventoryError::Validation("Not signed in".into()))
    }
}

impl AppStateExt for AppHandle {
    fn session(&self) -> &AppState {
        self.state::<AppState>().inner()
    }
}
