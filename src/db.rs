use rusqlite::{Connection, Transaction};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

use crate::catalog::sort_for_display;
use crate::error::Result;
use crate::models::Product;
use crate::products;

/// Point-in-time copy of every product, already in display order.
pub type Snapshot = Arc<Vec<Product>>;

pub struct Database {
    pub conn: Mutex<Connection>,
    snapshots: watch::Sender<Snapshot>,
}

impl Database {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let conn = Connection::open(path)?;
        tracing::info!(path = %path.display(), "opened inventory database");
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let (snapshots, _) = watch::channel(Arc::new(Vec::new()));
        let db = Database {
            conn: Mutex::new(conn),
            snapshots,
        };
        db.initialize()?;
        Ok(db)
    }

    pub fn initialize(&self) -> Result<()> {
        let conn = self.conn.lock()?;

        conn.execute_batch(
            "
            -- Inventory, one row per product
            CREATE TABLE IF NOT EXISTS products (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                brand TEXT,
                category TEXT NOT NULL DEFAULT 'liquor',
                stock REAL NOT NULL DEFAULT 0 CHECK (stock >= 0),
                low_stock_threshold REAL DEFAULT 5,
                unit TEXT DEFAULT 'bottle',
                sale_price REAL NOT NULL DEFAULT 0,
                purchase_price REAL NOT NULL DEFAULT 0,
                provider_id INTEGER,
                barcode TEXT,
                sku TEXT,
                important INTEGER NOT NULL DEFAULT 0,
                notes TEXT NOT NULL DEFAULT '',
                previous_stock REAL NOT NULL DEFAULT 0,
                created_by TEXT NOT NULL DEFAULT '',
                updated_by TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            );

            -- Audit trail
            CREATE TABLE IF NOT EXISTS history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                domain TEXT NOT NULL,
                product_name TEXT NOT NULL,
                actor TEXT NOT NULL,
                action TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                details TEXT NOT NULL,
                previous_stock REAL,
                new_stock REAL
            );

            CREATE INDEX IF NOT EXISTS idx_history_domain_time
                ON history (domain, timestamp DESC);

            CREATE TRIGGER IF NOT EXISTS history_no_update
            BEFORE UPDATE ON history
            BEGIN
                SELECT RAISE(ABORT, 'history is append-only');
            END;

            CREATE TRIGGER IF NOT EXISTS history_no_delete
            BEFORE DELETE ON history
            BEGIN
                SELECT RAISE(ABORT, 'history is append-only');
            END;

            -- Providers (no foreign key from products)
            CREATE TABLE IF NOT EXISTS providers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                company_name TEXT NOT NULL,
                contact_person TEXT NOT NULL DEFAULT '',
                phone TEXT NOT NULL DEFAULT '',
                email TEXT NOT NULL DEFAULT '',
                address TEXT NOT NULL DEFAULT '',
                notes TEXT NOT NULL DEFAULT '',
                created_by TEXT NOT NULL DEFAULT '',
                updated_by TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            );

            -- User directory, looked up by email at sign-in
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT NOT NULL UNIQUE COLLATE NOCASE,
                display_name TEXT NOT NULL,
                role TEXT NOT NULL DEFAULT 'guest',
                active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            ",
        )?;

        // Older files lack upc/version. Reuses the held lock.
        Self::migrate_conn(&conn)?;

        self.publish(&conn);
        Ok(())
    }

    fn migrate_conn(conn: &Connection) -> Result<()> {
        let columns: Vec<String> = conn
            .prepare("PRAGMA table_info(products)")?
            .query_map([], |row| row.get::<_, String>(1))?
            .filter_map(|r| r.ok())
            .collect();

        if !columns.iter().any(|c| c == "upc") {
            conn.execute("ALTER TABLE products ADD COLUMN upc TEXT", [])?;
        }
        if !columns.iter().any(|c| c == "version") {
            conn.execute(
                "ALTER TABLE products ADD COLUMN version INTEGER NOT NULL DEFAULT 1",
                [],
            )?;
        }

        Ok(())
    }

    /// Run `f` inside one transaction. Nothing is committed if `f` fails,
    /// and subscribers receive a fresh snapshot once the commit lands.
    pub fn write<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self.conn.lock()?;
        let tx = conn.transaction()?;
        let out = f(&tx)?;
        tx.commit()?;
        self.publish(&conn);
        Ok(out)
    }

    pub fn read<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.conn.lock()?;
        f(&conn)
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.subscribe()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshots.borrow().clone()
    }

    // A failed reload keeps the last good snapshot in place.
    fn publish(&self, conn: &Connection) {
        match products::load_all(conn) {
            Ok(mut list) => {
                sort_for_display(&mut list);
                self.snapshots.send_replace(Arc::new(list));
            }
            Err(e) => tracing::warn!(error = %e, "catalog reload failed, keeping last snapshot"),
        }
    }
}

/// Timestamp format used for every stored `*_at` column. Fixed width UTC so
/// text ordering matches time ordering.
pub fn now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

#[cfg(feature = "desktop")]
mod app {
    use super::Database;
    use tauri::{AppHandle, Manager};

    pub trait DatabaseExt {
        fn db(&self) -> &Database;
    }

    impl DatabaseExt for AppHandle {
        fn db(&self) -> &Database {
            self.state::<Database>().inner()
        }
    }
}

#[cfg(feature = "desktop")]
pub use app::DatabaseExt;
