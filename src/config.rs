use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::alerts::{AlertKinds, AlertSchedule};
use crate::error::{InventoryError, Result};
use crate::history::{DEFAULT_LIMIT, LIMIT_CHOICES};
use crate::policy::{ensure_capability, Actor, Capability};

pub const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AlertSettings {
    pub enabled: bool,
    #[serde(flatten)]
    pub kinds: AlertKinds,
    pub schedule: AlertSchedule,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            kinds: AlertKinds::default(),
            schedule: AlertSchedule::default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub database_file: String,
    pub ranking_file: String,
    pub history_limit: u32,
    pub alerts: AlertSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_file: "bar_inventory.db".to_string(),
            ranking_file: "quick_adjust_usage.json".to_string(),
            history_limit: DEFAULT_LIMIT,
            alerts: AlertSettings::default(),
        }
    }
}

impl Settings {
    /// Missing file yields defaults; a malformed one is an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let settings: Settings = match std::fs::read_to_string(path) {
            Ok(text) => serde_json::from_str(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no settings file, using defaults");
                Settings::default()
            }
            Err(e) => return Err(e.into()),
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Gated on [`Capability::ManageUsers`].
    pub fn save_as(&self, actor: &Actor, path: impl AsRef<Path>) -> Result<()> {
        ensure_capability(actor, Capability::ManageUsers)?;
        self.save(path)?;
        tracing::info!(actor = %actor.email, "settings saved");
        Ok(())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        self.validate()?;
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.database_file.trim().is_empty() {
            return Err(InventoryError::Validation("database_file is empty".into()));
        }
        if !LIMIT_CHOICES.contains(&self.history_limit) {
            return Err(InventoryError::Validation(format!(
                "history_limit must be one of {LIMIT_CHOICES:?}"
            )));
        }
        self.alerts.schedule.validate()
    }

    pub fn database_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.database_file)
    }

    pub fn ranking_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.ranking_file)
    }
}
