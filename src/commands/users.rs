use crate::catalog::Catalog;
use crate::commands::{alerts, AppStateExt};
use crate::db::DatabaseExt;
use crate::error::Result;
use crate::models::{SaveUser, User};
use crate::quick_adjust::{QuickAdjustSession, UsageRanking};
use crate::users::{self, SignIn};
use tauri::AppHandle;

/// Called after the identity provider has authenticated `email`.
#[tauri::command]
pub fn sign_in(app: AppHandle, email: String) -> Result<SignIn> {
    let sign_in = users::resolve_actor(app.db(), &email)?;
    let state = app.session();

    let ranking_path = state.settings.lock()?.ranking_path(&state.data_dir);
    let session = QuickAdjustSession::new(
        Catalog::new(app.db().subscribe()),
        UsageRanking::load(ranking_path),
    );
    *state.quick.lock()? = Some(session);
    *state.actor.lock()? = Some(sign_in.actor.clone());

    alerts::start(&app)?;

    tracing::info!(
        user = %sign_in.actor.email,
        role = sign_in.actor.role.as_str(),
        in_directory = sign_in.in_directory,
        "signed in"
    );
    Ok(sign_in)
}

#[tauri::command]
pub fn sign_out(app: AppHandle) -> Result<()> {
    alerts::stop(&app)?;
    let state = app.session();
    *state.quick.lock()? = None;
    if let Some(actor) = state.actor.lock()?.take() {
        tracing::info!(user = %actor.email, "signed out");
    }
    Ok(())
}

#[tauri::command]
pub fn get_users(app: AppHandle) -> Result<Vec<User>> {
    users::get_users(app.db(), &app.actor()?)
}

#[tauri::command]
pub fn create_user(app: AppHandle, user: SaveUser) -> Result<User> {
    users::create_user(app.db(), &app.actor()?, user)
}

#[tauri::command]
pub fn update_user(app: AppHandle, id: i64, user: SaveUser) -> Result<User> {
    users::update_user(app.db(), &app.actor()?, id, user)
}

#[tauri::command]
pub fn delete_user(app: AppHandle, id: i64, confirmed: bool) -> Result<()> {
    users::delete_user(app.db(), &app.actor()?, id, confirmed)
}
