use rusqlite::{Connection, Row, Transaction};
use serde::{Deserialize, Serialize};

use crate::db::{now, Database};
use crate::error::{InventoryError, Result};
use crate::models::{ActionKind, HistoryEntry, StockChange, HISTORY_DOMAIN};
use crate::policy::Actor;

pub const DEFAULT_LIMIT: u32 = 50;

/// Page sizes offered by the history screen.
pub const LIMIT_CHOICES: [u32; 4] = [25, 50, 100, 200];

pub fn record(
    tx: &Transaction<'_>,
    action: ActionKind,
    product_name: &str,
    actor: &Actor,
    details: &str,
    stock: Option<StockChange>,
) -> Result<HistoryEntry> {
    let timestamp = now();
    let (previous_stock, new_stock) = match (action, stock) {
        (ActionKind::StockUpdate, Some(change)) => (Some(change.previous), Some(change.new)),
        (ActionKind::StockUpdate, None) => {
            return Err(InventoryError::Validation(
                "stock_update entries need previous and new stock".into(),
            ))
        }
        _ => (None, None),
    };

    tx.execute(
        "INSERT INTO history (domain, product_name, actor, action, timestamp, details, previous_stock, new_stock)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        rusqlite::params![
            HISTORY_DOMAIN,
            product_name,
            actor.email,
            action.as_str(),
            timestamp,
            details,
            previous_stock,
            new_stock
        ],
    )?;

    Ok(HistoryEntry {
        id: tx.last_insert_rowid(),
        product_name: product_name.to_string(),
        actor: actor.email.clone(),
        action,
        timestamp,
        details: details.to_string(),
        previous_stock,
        new_stock,
    })
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct HistoryQuery {
    pub action: Option<ActionKind>,
    pub actor: Option<String>,
    pub limit: Option<u32>,
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<HistoryEntry> {
    let action: String = row.get(4)?;
    let action = ActionKind::parse(&action).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            format!("unknown history action '{action}'").into(),
        )
    })?;

    Ok(HistoryEntry {
        id: row.get(0)?,
        product_name: row.get(1)?,
        actor: row.get(2)?,
        timestamp: row.get(3)?,
        action,
        details: row.get(5)?,
        previous_stock: row.get(6)?,
        new_stock: row.get(7)?,
    })
}

/// Newest first, at most `limit` entries. Each call is a fresh read.
pub fn query(db: &Database, filter: &HistoryQuery) -> Result<Vec<HistoryEntry>> {
    db.read(|conn| query_conn(conn, filter))
}

pub(crate) fn query_conn(conn: &Connection, filter: &HistoryQuery) -> Result<Vec<HistoryEntry>> {
    let limit = filter.limit.unwrap_or(DEFAULT_LIMIT);

    let mut stmt = conn.prepare(
        "SELECT id, product_name, actor, timestamp, action, details, previous_stock, new_stock
         FROM history
         WHERE domain = ?1
           AND (?2 IS NULL OR action = ?2)
           AND (?3 IS NULL OR actor = ?3)
         ORDER BY timestamp DESC, id DESC
         LIMIT ?4",
    )?;

    let entries = stmt
        .query_map(
            rusqlite::params![
                HISTORY_DOMAIN,
                filter.action.map(|a| a.as_str()),
                filter.actor.as_deref(),
                limit
            ],
            entry_from_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(entries)
}

/// Distinct actors that appear in the log, for filter menus.
pub fn actors(db: &Database) -> Result<Vec<String>> {
    db.read(|conn| {
        let mut stmt = conn.prepare(
            "SELECT DISTINCT actor FROM history WHERE domain = ?1 ORDER BY actor",
        )?;
        let actors = stmt
            .query_map([HISTORY_DOMAIN], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(actors)
    })
}

pub fn count(conn: &Connection) -> Result<i64> {
    let n = conn.query_row(
        "SELECT COUNT(*) FROM history WHERE domain = ?1",
        [HISTORY_DOMAIN],
        |row| row.get(0),
    )?;
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::Role;

    fn bartender() -> Actor {
        Actor::new("tom@bar.test", Role::Bartender)
    }

    #[test]
    fn test_query_newest_first_with_limit() {
        let db = Database::open_in_memory().unwrap();
        for name in ["Gin A", "Gin B", "Gin C"] {
            db.write(|tx| record(tx, ActionKind::Edit, name, &bartender(), "Product edited", None))
                .unwrap();
        }

        let entries = query(&db, &HistoryQuery { limit: Some(2), ..Default::default() }).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].product_name, "Gin C");
        assert_eq!(entries[1].product_name, "Gin B");
    }

    #[test]
    fn test_query_filters_by_action_and_actor() {
        let db = Database::open_in_memory().unwrap();
        let other = Actor::new("ana@bar.test", Role::Manager);
        db.write(|tx| record(tx, ActionKind::Create, "Vodka", &bartender(), "Product created", None))
            .unwrap();
        db.write(|tx| record(tx, ActionKind::Delete, "Vodka", &other, "Product removed", None))
            .unwrap();

        let deletes = query(
            &db,
            &HistoryQuery { action: Some(ActionKind::Delete), ..Default::default() },
        )
        .unwrap();
        assert_eq!(deletes.len(), 1);
        assert_eq!(deletes[0].actor, "ana@bar.test");

        let by_tom = query(
            &db,
            &HistoryQuery { actor: Some("tom@bar.test".into()), ..Default::default() },
        )
        .unwrap();
        assert_eq!(by_tom.len(), 1);
        assert_eq!(by_tom[0].action, ActionKind::Create);

        assert_eq!(actors(&db).unwrap(), vec!["ana@bar.test", "tom@bar.test"]);
    }

    #[test]
    fn test_stock_update_requires_change_pair() {
        let db = Database::open_in_memory().unwrap();
        let err = db
            .write(|tx| record(tx, ActionKind::StockUpdate, "Rum", &bartender(), "Stock", None))
            .unwrap_err();
        assert!(matches!(err, InventoryError::Validation(_)));
        assert_eq!(db.read(count).unwrap(), 0);
    }

    #[test]
    fn test_history_rows_cannot_be_changed() {
        let db = Database::open_in_memory().unwrap();
        db.write(|tx| record(tx, ActionKind::Create, "Tequila", &bartender(), "Product created", None))
            .unwrap();

        let conn = db.conn.lock().unwrap();
        assert!(conn.execute("UPDATE history SET details = 'x'", []).is_err());
        assert!(conn.execute("DELETE FROM history", []).is_err());
    }
}
