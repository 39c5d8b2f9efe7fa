use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};

use super::{BundleConfig, BundleStorage};
use crate::error::{RdfGraphError, Result};

/// Migration metadata
struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "001_bundle_tables",
    sql: "CREATE TABLE IF NOT EXISTS bundles (
            bundle_type TEXT NOT NULL,
            bundle_id TEXT NOT NULL,
            label TEXT NOT NULL DEFAULT '',
            PRIMARY KEY (bundle_type, bundle_id)
        );
        CREATE TABLE IF NOT EXISTS bundle_settings (
            bundle_type TEXT NOT NULL,
            bundle_id TEXT NOT NULL,
            namespace TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            PRIMARY KEY (bundle_type, bundle_id, namespace, key),
            FOREIGN KEY (bundle_type, bundle_id)
                REFERENCES bundles (bundle_type, bundle_id) ON DELETE CASCADE
        );",
}];

/// Bundle storage in a SQLite database.
///
/// Setting values are stored as JSON text so non-string settings of other
/// namespaces survive a round trip.
pub struct SqliteBundleStorage {
    conn: Mutex<Connection>,
}

impl SqliteBundleStorage {
    /// Open (or create) the database at `db_path` and apply pending migrations.
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path.as_ref())?;
        // WAL for concurrent readers, foreign keys for the settings cascade
        conn.execute_batch(
            "PRAGMA journal_mode = WAL; \
             PRAGMA synchronous = NORMAL; \
             PRAGMA foreign_keys = ON;",
        )?;
        log::info!("Opened bundle database {}", db_path.as_ref().display());
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Self::with_connection(conn)
    }

    fn with_connection(mut conn: Connection) -> Result<Self> {
        run_migrations(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| RdfGraphError::Config("bundle database lock poisoned".to_string()))
    }
}

impl BundleStorage for SqliteBundleStorage {
    fn load(&self, bundle_type: &str, bundle_id: &str) -> Result<Option<BundleConfig>> {
        let conn = self.lock()?;
        load_bundle(&conn, bundle_type, bundle_id)
    }

    fn load_multiple(&self, bundle_type: &str) -> Result<Vec<BundleConfig>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT bundle_id FROM bundles WHERE bundle_type = ?1 ORDER BY bundle_id",
        )?;
        let ids: Vec<String> = stmt
            .query_map([bundle_type], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;

        let mut bundles = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(bundle) = load_bundle(&conn, bundle_type, &id)? {
                bundles.push(bundle);
            }
        }
        Ok(bundles)
    }

    fn save(&self, bundle_type: &str, bundle: &BundleConfig) -> Result<()> {
        bundle.validate()?;
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO bundles (bundle_type, bundle_id, label) VALUES (?1, ?2, ?3)
             ON CONFLICT (bundle_type, bundle_id) DO UPDATE SET label = excluded.label",
            params![bundle_type, bundle.id, bundle.label],
        )?;
        tx.execute(
            "DELETE FROM bundle_settings WHERE bundle_type = ?1 AND bundle_id = ?2",
            params![bundle_type, bundle.id],
        )?;
        for (namespace, settings) in &bundle.third_party_settings {
            for (key, value) in settings {
                tx.execute(
                    "INSERT INTO bundle_settings (bundle_type, bundle_id, namespace, key, value)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![bundle_type, bundle.id, namespace, key, serde_json::to_string(value)?],
                )?;
            }
        }

        tx.commit()?;
        log::debug!("Saved bundle {} of type {}", bundle.id, bundle_type);
        Ok(())
    }
}

fn load_bundle(conn: &Connection, bundle_type: &str, bundle_id: &str) -> Result<Option<BundleConfig>> {
    let label: Option<String> = conn
        .query_row(
            "SELECT label FROM bundles WHERE bundle_type = ?1 AND bundle_id = ?2",
            params![bundle_type, bundle_id],
            |row| row.get(0),
        )
        .optional()?;
    let Some(label) = label else {
        return Ok(None);
    };

    let mut bundle = BundleConfig::new(bundle_id, label);
    let mut stmt = conn.prepare(
        "SELECT namespace, key, value FROM bundle_settings
         WHERE bundle_type = ?1 AND bundle_id = ?2",
    )?;
    let mut rows = stmt.query(params![bundle_type, bundle_id])?;
    while let Some(row) = rows.next()? {
        let namespace: String = row.get(0)?;
        let key: String = row.get(1)?;
        let value: String = row.get(2)?;
        bundle.set_third_party_setting(&namespace, &key, serde_json::from_str(&value)?);
    }
    Ok(Some(bundle))
}

/// Create schema_migrations table if it doesn't exist
fn ensure_migrations_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;
    Ok(())
}

/// Get list of applied migrations
pub fn get_applied_migrations(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM schema_migrations ORDER BY version")?;
    let names: Vec<String> = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
    Ok(names)
}

/// Run all pending migrations
fn run_migrations(conn: &mut Connection) -> Result<()> {
    ensure_migrations_table(conn)?;
    let applied = get_applied_migrations(conn)?;

    for migration in MIGRATIONS {
        if applied.iter().any(|name| name == migration.name) {
            log::debug!("Migration {} already applied, skipping", migration.name);
            continue;
        }

        log::info!("Applying migration: {} (version {})", migration.name, migration.version);
        let tx = conn.transaction()?;
        tx.execute_batch(migration.sql)?;
        tx.execute(
            "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
            params![migration.version, migration.name],
        )?;
        tx.commit()?;
    }
    Ok(())
}
