use rusqlite::{Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::db::{now, Database};
use crate::error::{InventoryError, Result};
use crate::models::{SaveUser, User};
use crate::policy::{ensure_capability, Actor, Capability, Role};

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        display_name: row.get(2)?,
        role: Role::parse_or_guest(&row.get::<_, String>(3)?),
        active: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn find_by_email(conn: &Connection, email: &str) -> Result<Option<User>> {
    let user = conn
        .query_row(
            "SELECT id, email, display_name, role, active, created_at FROM users WHERE email = ?1",
            [email.trim()],
            user_from_row,
        )
        .optional()?;
    Ok(user)
}

fn get(conn: &Connection, id: i64) -> Result<User> {
    conn.query_row(
        "SELECT id, email, display_name, role, active, created_at FROM users WHERE id = ?1",
        [id],
        user_from_row,
    )
    .optional()?
    .ok_or_else(|| InventoryError::NotFound(format!("User {id}")))
}

/// Outcome of looking up a signed-in identity.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SignIn {
    pub actor: Actor,
    /// False when the identity has no directory record or is deactivated;
    /// the actor then runs as guest and the UI should flag it.
    pub in_directory: bool,
}

/// Map an authenticated email to an actor. A missing or inactive record
/// never grants more than guest.
pub fn resolve_actor(db: &Database, email: &str) -> Result<SignIn> {
    let user = db.read(|conn| find_by_email(conn, email))?;

    let sign_in = match user {
        Some(user) if user.active => SignIn {
            actor: Actor::new(user.email, user.role),
            in_directory: true,
        },
        Some(user) => {
            tracing::warn!(email = %user.email, "inactive user signed in, using guest role");
            SignIn {
                actor: Actor::new(user.email, Role::Guest),
                in_directory: false,
            }
        }
        None => {
            tracing::warn!(email = %email.trim(), "identity not in user directory, using guest role");
            SignIn {
                actor: Actor::new(email.trim(), Role::Guest),
                in_directory: false,
            }
        }
    };
    Ok(sign_in)
}

pub fn get_users(db: &Database, actor: &Actor) -> Result<Vec<User>> {
    ensure_capability(actor, Capability::ManageUsers)?;

    db.read(|conn| {
        let mut stmt = conn.prepare(
            "SELECT id, email, display_name, role, active, created_at FROM users ORDER BY email",
        )?;

        let users = stmt
            .query_map([], user_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(users)
    })
}

fn validated(user: &SaveUser) -> Result<(String, String)> {
    let email = user.email.trim();
    let name = user.display_name.trim();
    if email.is_empty() || name.is_empty() {
        return Err(InventoryError::Validation("Email and name are required".into()));
    }
    Ok((email.to_string(), name.to_string()))
}

pub fn create_user(db: &Database, actor: &Actor, user: SaveUser) -> Result<User> {
    ensure_capability(actor, Capability::ManageUsers)?;
    let (email, name) = validated(&user)?;

    let created = db.write(|tx| {
        if find_by_email(tx, &email)?.is_some() {
            return Err(InventoryError::Validation(format!("{email} already exists")));
        }
        tx.execute(
            "INSERT INTO users (email, display_name, role, active, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![email, name, user.role.as_str(), user.active, now()],
        )?;
        get(tx, tx.last_insert_rowid())
    })?;

    tracing::info!(user = %created.email, role = created.role.as_str(), "user created");
    Ok(created)
}

pub fn update_user(db: &Database, actor: &Actor, id: i64, user: SaveUser) -> Result<User> {
    ensure_capability(actor, Capability::ManageUsers)?;
    let (email, name) = validated(&user)?;

    db.write(|tx| {
        if find_by_email(tx, &email)?.is_some_and(|other| other.id != id) {
            return Err(InventoryError::Validation(format!("{email} already exists")));
        }
        let changed = tx.execute(
            "UPDATE users SET email = ?1, display_name = ?2, role = ?3, active = ?4 WHERE id = ?5",
            rusqlite::params![email, name, user.role.as_str(), user.active, id],
        )?;
        if changed == 0 {
            return Err(InventoryError::NotFound(format!("User {id}")));
        }
        get(tx, id)
    })
}

pub fn delete_user(db: &Database, actor: &Actor, id: i64, confirmed: bool) -> Result<()> {
    ensure_capability(actor, Capability::ManageUsers)?;
    if !confirmed {
        return Err(InventoryError::ConfirmationRequired(format!("delete user {id}")));
    }

    db.write(|tx| {
        let target = get(tx, id)?;
        if target.email.eq_ignore_ascii_case(&actor.email) {
            return Err(InventoryError::Validation("You cannot delete your own user".into()));
        }
        tx.execute("DELETE FROM users WHERE id = ?1", [id])?;
        Ok(())
    })?;

    tracing::info!(user_id = id, actor = %actor.email, "user deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin() -> Actor {
        Actor::new("owner@bar.test", Role::Admin)
    }

    fn save(email: &str, role: Role) -> SaveUser {
        SaveUser {
            email: email.into(),
            display_name: "Someone".into(),
            role,
            active: true,
        }
    }

    #[test]
    fn test_missing_directory_record_is_guest() {
        let db = Database::open_in_memory().unwrap();
        let sign_in = resolve_actor(&db, "stranger@bar.test").unwrap();
        assert_eq!(sign_in.actor.role, Role::Guest);
        assert!(!sign_in.in_directory);
    }

    #[test]
    fn test_directory_role_is_used() {
        let db = Database::open_in_memory().unwrap();
        create_user(&db, &admin(), save("Tom@Bar.test", Role::Bartender)).unwrap();

        let sign_in = resolve_actor(&db, "tom@bar.test").unwrap();
        assert_eq!(sign_in.actor.role, Role::Bartender);
        assert!(sign_in.in_directory);
    }

    #[test]
    fn test_inactive_user_is_guest() {
        let db = Database::open_in_memory().unwrap();
        let mut input = save("old@bar.test", Role::Manager);
        input.active = false;
        create_user(&db, &admin(), input).unwrap();

        let sign_in = resolve_actor(&db, "old@bar.test").unwrap();
        assert_eq!(sign_in.actor.role, Role::Guest);
        assert!(!sign_in.in_directory);
    }

    #[test]
    fn test_only_admin_manages_users() {
        let db = Database::open_in_memory().unwrap();
        let manager = Actor::new("ana@bar.test", Role::Manager);
        let err = create_user(&db, &manager, save("x@bar.test", Role::Guest)).unwrap_err();
        assert!(matches!(err, InventoryError::PermissionDenied { .. }));
        assert!(get_users(&db, &manager).is_err());
    }

    #[test]
    fn test_duplicate_email_rejected() {
        let db = Database::open_in_memory().unwrap();
        create_user(&db, &admin(), save("dup@bar.test", Role::Guest)).unwrap();
        let err = create_user(&db, &admin(), save("DUP@bar.test", Role::Guest)).unwrap_err();
        assert!(matches!(err, InventoryError::Validation(_)));
    }

    #[test]
    fn test_update_to_taken_email_rejected() {
        let db = Database::open_in_memory().unwrap();
        create_user(&db, &admin(), save("ana@bar.test", Role::Manager)).unwrap();
        let tom = create_user(&db, &admin(), save("tom@bar.test", Role::Bartender)).unwrap();

        let err = update_user(&db, &admin(), tom.id, save("Ana@Bar.test", Role::Bartender)).unwrap_err();
        assert!(matches!(err, InventoryError::Validation(_)));

        // Keeping its own address is not a clash.
        let renamed = update_user(&db, &admin(), tom.id, save("tom@bar.test", Role::Manager)).unwrap();
        assert_eq!(renamed.role, Role::Manager);
    }

    #[test]
    fn test_cannot_delete_self() {
        let db = Database::open_in_memory().unwrap();
        let me = create_user(&db, &admin(), save("owner@bar.test", Role::Admin)).unwrap();
        let other = create_user(&db, &admin(), save("tom@bar.test", Role::Bartender)).unwrap();

        let err = delete_user(&db, &admin(), me.id, true).unwrap_err();
        assert!(matches!(err, InventoryError::Validation(_)));

        delete_user(&db, &admin(), other.id, true).unwrap();
        assert_eq!(get_users(&db, &admin()).unwrap().len(), 1);
    }
}
