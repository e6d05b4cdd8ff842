use rusqlite::{Connection, OptionalExtension, Row};

use crate::db::{now, Database};
use crate::error::{InventoryError, Result};
use crate::models::{Provider, SaveProvider};
use crate::policy::{ensure_capability, Actor, Capability};

pub const NO_PROVIDER: &str = "No provider";

const PROVIDER_COLUMNS: &str = "id, company_name, contact_person, phone, email, address, notes, \
     created_by, updated_by, created_at, updated_at";

fn provider_from_row(row: &Row<'_>) -> rusqlite::Result<Provider> {
    Ok(Provider {
        id: row.get(0)?,
        company_name: row.get(1)?,
        contact_person: row.get(2)?,
        phone: row.get(3)?,
        email: row.get(4)?,
        address: row.get(5)?,
        notes: row.get(6)?,
        created_by: row.get(7)?,
        updated_by: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

pub fn get_providers(db: &Database) -> Result<Vec<Provider>> {
    db.read(|conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {PROVIDER_COLUMNS} FROM providers ORDER BY company_name COLLATE NOCASE"
        ))?;

        let providers = stmt
            .query_map([], provider_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(providers)
    })
}

fn get(conn: &Connection, id: i64) -> Result<Provider> {
    conn.query_row(
        &format!("SELECT {PROVIDER_COLUMNS} FROM providers WHERE id = ?1"),
        [id],
        provider_from_row,
    )
    .optional()?
    .ok_or_else(|| InventoryError::NotFound(format!("Provider {id}")))
}

fn validated(provider: &SaveProvider) -> Result<String> {
    let name = provider.company_name.trim();
    if name.is_empty() {
        return Err(InventoryError::Validation("Company name is required".into()));
    }
    Ok(name.to_string())
}

pub fn create_provider(db: &Database, actor: &Actor, provider: SaveProvider) -> Result<Provider> {
    ensure_capability(actor, Capability::ManageProviders)?;
    let name = validated(&provider)?;

    let created = db.write(|tx| {
        let ts = now();
        tx.execute(
            "INSERT INTO providers (company_name, contact_person, phone, email, address, notes, \
             created_by, updated_by, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7, ?8, ?8)",
            rusqlite::params![
                name,
                provider.contact_person,
                provider.phone,
                provider.email,
                provider.address,
                provider.notes,
                actor.email,
                ts
            ],
        )?;
        get(tx, tx.last_insert_rowid())
    })?;

    tracing::info!(provider_id = created.id, actor = %actor.email, "provider created");
    Ok(created)
}

pub fn update_provider(
    db: &Database,
    actor: &Actor,
    id: i64,
    provider: SaveProvider,
) -> Result<Provider> {
    ensure_capability(actor, Capability::ManageProviders)?;
    let name = validated(&provider)?;

    db.write(|tx| {
        let changed = tx.execute(
            "UPDATE providers SET company_name = ?1, contact_person = ?2, phone = ?3, email = ?4, \
             address = ?5, notes = ?6, updated_by = ?7, updated_at = ?8 WHERE id = ?9",
            rusqlite::params![
                name,
                provider.contact_person,
                provider.phone,
                provider.email,
                provider.address,
                provider.notes,
                actor.email,
                now(),
                id
            ],
        )?;
        if changed == 0 {
            return Err(InventoryError::NotFound(format!("Provider {id}")));
        }
        get(tx, id)
    })
}

/// Products keep their `provider_id`; readers render it as [`NO_PROVIDER`].
pub fn delete_provider(db: &Database, actor: &Actor, id: i64, confirmed: bool) -> Result<()> {
    ensure_capability(actor, Capability::ManageProviders)?;
    if !confirmed {
        return Err(InventoryError::ConfirmationRequired(format!("delete provider {id}")));
    }

    db.write(|tx| {
        let changed = tx.execute("DELETE FROM providers WHERE id = ?1", [id])?;
        if changed == 0 {
            return Err(InventoryError::NotFound(format!("Provider {id}")));
        }
        Ok(())
    })?;

    tracing::info!(provider_id = id, actor = %actor.email, "provider deleted");
    Ok(())
}

/// Display name for a product's provider, tolerating dangling ids.
pub fn provider_label(providers: &[Provider], provider_id: Option<i64>) -> &str {
    provider_id
        .and_then(|id| providers.iter().find(|p| p.id == id))
        .map_or(NO_PROVIDER, |p| p.company_name.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::Role;

    fn manager() -> Actor {
        Actor::new("ana@bar.test", Role::Manager)
    }

    #[test]
    fn test_legacy_alias_accepted() {
        let json = r#"{"empresa": "Distribuidora Sur", "phone": "555-0101"}"#;
        let provider: SaveProvider = serde_json::from_str(json).unwrap();
        assert_eq!(provider.company_name, "Distribuidora Sur");
        assert_eq!(provider.phone, "555-0101");
    }

    #[test]
    fn test_provider_crud() {
        let db = Database::open_in_memory().unwrap();
        let created = create_provider(
            &db,
            &manager(),
            SaveProvider { company_name: "Wines & Co".into(), ..Default::default() },
        )
        .unwrap();

        let updated = update_provider(
            &db,
            &manager(),
            created.id,
            SaveProvider {
                company_name: "Wines & Co.".into(),
                email: "sales@wines.test".into(),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(updated.email, "sales@wines.test");

        delete_provider(&db, &manager(), created.id, true).unwrap();
        assert!(get_providers(&db).unwrap().is_empty());
    }

    #[test]
    fn test_company_name_required() {
        let db = Database::open_in_memory().unwrap();
        let err = create_provider(&db, &manager(), SaveProvider::default()).unwrap_err();
        assert!(matches!(err, InventoryError::Validation(_)));
    }

    #[test]
    fn test_bartender_cannot_manage_providers() {
        let db = Database::open_in_memory().unwrap();
        let bartender = Actor::new("tom@bar.test", Role::Bartender);
        let err = create_provider(
            &db,
            &bartender,
            SaveProvider { company_name: "X".into(), ..Default::default() },
        )
        .unwrap_err();
        assert!(matches!(err, InventoryError::PermissionDenied { .. }));
    }

    #[test]
    fn test_dangling_provider_label() {
        let db = Database::open_in_memory().unwrap();
        let p = create_provider(
            &db,
            &manager(),
            SaveProvider { company_name: "Cervecería Norte".into(), ..Default::default() },
        )
        .unwrap();
        let providers = get_providers(&db).unwrap();

        assert_eq!(provider_label(&providers, Some(p.id)), "Cervecería Norte");
        assert_eq!(provider_label(&providers, Some(p.id + 100)), NO_PROVIDER);
        assert_eq!(provider_label(&providers, None), NO_PROVIDER);
    }
}
