//! SQLite database handle shared by all modules.
//!
//! A single connection is kept behind a mutex. Work is done through
//! [`Database::transaction`], which holds the lock and an open transaction
//! for the duration of one unit of work and releases both on every exit path.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use bookshelf_kernel::settings::DatabaseSettings;
use bookshelf_kernel::Migration;
use rusqlite::{Connection, OptionalExtension, Transaction};
use thiserror::Error;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const MIGRATIONS_TABLE: &str = "CREATE TABLE IF NOT EXISTS _migrations (
    module     TEXT NOT NULL,
    id         TEXT NOT NULL,
    applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY (module, id)
);";

#[derive(Debug, Error)]
pub enum DbError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("migration {module}/{id} failed: {source}")]
    Migration {
        module: String,
        id: &'static str,
        #[source]
        source: rusqlite::Error,
    },
}

/// Cloneable handle to the application database.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    path: String,
}

impl Database {
    /// Open (creating if needed) the database described by `settings`.
    pub fn open(settings: &DatabaseSettings) -> Result<Self, DbError> {
        let conn = if settings.path == ":memory:" {
            Connection::open_in_memory()?
        } else {
            Connection::open(&settings.path)?
        };
        conn.busy_timeout(BUSY_TIMEOUT)?;

        tracing::info!(target: "bookshelf-db", path = %settings.path, "database opened");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: settings.path.clone(),
        })
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, DbError> {
        Self::open(&DatabaseSettings::in_memory())
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Run `work` inside a transaction.
    ///
    /// The transaction commits when `work` returns `Ok` and rolls back when it
    /// returns `Err` (or panics). A panic poisons the mutex, but the
    /// connection is left clean by the rollback, so later calls reuse it.
    pub fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, E>,
        E: From<DbError>,
    {
        let mut conn = self.conn.lock().unwrap_or_else(|poisoned| {
            tracing::warn!(target: "bookshelf-db", "recovering connection after a panicked transaction");
            poisoned.into_inner()
        });
        let tx = conn.transaction().map_err(DbError::from)?;
        let value = work(&tx)?;
        tx.commit().map_err(DbError::from)?;
        Ok(value)
    }

    /// Apply every migration not yet recorded in `_migrations`.
    ///
    /// Returns the number of migrations applied by this call.
    pub fn migrate(&self, migrations: &[(String, Migration)]) -> Result<usize, DbError> {
        self.transaction(|tx| {
            tx.execute_batch(MIGRATIONS_TABLE)?;

            let mut applied = 0;
            for (module, migration) in migrations {
                let done = tx
                    .query_row(
                        "SELECT 1 FROM _migrations WHERE module = ?1 AND id = ?2",
                        (module, migration.id),
                        |_| Ok(()),
                    )
                    .optional()?
                    .is_some();
                if done {
                    continue;
                }

                tx.execute_batch(migration.up)
                    .map_err(|source| DbError::Migration {
                        module: module.clone(),
                        id: migration.id,
                        source,
                    })?;
                tx.execute(
                    "INSERT INTO _migrations (module, id) VALUES (?1, ?2)",
                    (module, migration.id),
                )?;

                tracing::info!(
                    target: "bookshelf-db",
                    module = %module,
                    migration = migration.id,
                    "migration applied"
                );
                applied += 1;
            }

            Ok(applied)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notes_migrations() -> Vec<(String, Migration)> {
        vec![(
            "notes".to_string(),
            Migration {
                id: "001_init",
                up: "CREATE TABLE note (id INTEGER PRIMARY KEY AUTOINCREMENT, body TEXT NOT NULL);",
            },
        )]
    }

    #[test]
    fn test_migrations_apply_once() {
        let db = Database::open_in_memory().unwrap();

        assert_eq!(db.migrate(&notes_migrations()).unwrap(), 1);
        assert_eq!(db.migrate(&notes_migrations()).unwrap(), 0);
    }

    #[test]
    fn test_failed_migration_reports_module_and_id() {
        let db = Database::open_in_memory().unwrap();
        let broken = vec![(
            "broken".to_string(),
            Migration {
                id: "001_init",
                up: "CREATE TABLE (",
            },
        )];

        let err = db.migrate(&broken).unwrap_err();
        assert!(err.to_string().contains("broken/001_init"));
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let db = Database::open_in_memory().unwrap();
        db.migrate(&notes_migrations()).unwrap();

        let result: anyhow::Result<()> = db.transaction(|tx| {
            tx.execute("INSERT INTO note (body) VALUES ('draft')", [])?;
            anyhow::bail!("abort");
        });
        assert!(result.is_err());

        let count: i64 = db
            .transaction::<_, DbError, _>(|tx| {
                Ok(tx.query_row("SELECT COUNT(*) FROM note", [], |row| row.get(0))?)
            })
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_panicked_transaction_does_not_wedge_the_connection() {
        let db = Database::open_in_memory().unwrap();
        db.migrate(&notes_migrations()).unwrap();

        let worker = db.clone();
        let panicked = std::thread::spawn(move || {
            let _: Result<(), DbError> = worker.transaction(|tx| {
                tx.execute("INSERT INTO note (body) VALUES ('lost')", [])?;
                panic!("handler bug");
            });
        })
        .join();
        assert!(panicked.is_err());

        let count: i64 = db
            .transaction::<_, DbError, _>(|tx| {
                tx.execute("INSERT INTO note (body) VALUES ('kept')", [])?;
                Ok(tx.query_row("SELECT COUNT(*) FROM note", [], |row| row.get(0))?)
            })
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_file_database_persists_between_handles() {
        let dir = tempfile::tempdir().unwrap();
        let settings = DatabaseSettings {
            path: dir.path().join("books.db").to_string_lossy().into_owned(),
        };

        {
            let db = Database::open(&settings).unwrap();
            db.migrate(&notes_migrations()).unwrap();
            db.transaction::<_, DbError, _>(|tx| {
                tx.execute("INSERT INTO note (body) VALUES ('kept')", [])?;
                Ok(())
            })
            .unwrap();
        }

        let db = Database::open(&settings).unwrap();
        assert_eq!(db.migrate(&notes_migrations()).unwrap(), 0);
        let body: String = db
            .transaction::<_, DbError, _>(|tx| {
                Ok(tx.query_row("SELECT body FROM note", [], |row| row.get(0))?)
            })
            .unwrap();
        assert_eq!(body, "kept");
    }
}
