//! SQLite schema for the feed record store.
//!
//! The store began life as a three-column table (`pub`, `sec`, `url`);
//! health tracking columns were added later. Migration is column-presence
//! based and safe to run on every startup, including against databases
//! created before health tracking existed.

use rusqlite::{Connection, Result};

/// Initialize the schema and run any pending migrations.
pub fn init_schema(conn: &Connection) -> Result<()> {
    create_tables(conn)?;
    migrate(conn)?;
    Ok(())
}

/// Create the feeds table for a fresh database.
fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS feeds (
            url TEXT PRIMARY KEY,
            pub TEXT NOT NULL,
            sec TEXT NOT NULL,
            state TEXT NOT NULL DEFAULT 'active',
            failure_count INTEGER NOT NULL DEFAULT 0,
            last_success INTEGER,
            last_failure INTEGER
        );

        CREATE INDEX IF NOT EXISTS idx_feeds_state ON feeds(state);
        "#,
    )?;
    Ok(())
}

/// Add health-tracking columns to a pre-existing store that lacks them.
///
/// Idempotent: checks `pragma_table_info` before altering, so running it on
/// every startup is safe.
fn migrate(conn: &Connection) -> Result<()> {
    let has_state: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM pragma_table_info('feeds') WHERE name = 'state'",
        [],
        |row| row.get(0),
    )?;

    if !has_state {
        tracing::info!("migrating feed store: adding health tracking columns");
        conn.execute_batch(
            r#"
            ALTER TABLE feeds ADD COLUMN state TEXT NOT NULL DEFAULT 'active';
            ALTER TABLE feeds ADD COLUMN failure_count INTEGER NOT NULL DEFAULT 0;
            ALTER TABLE feeds ADD COLUMN last_success INTEGER;
            ALTER TABLE feeds ADD COLUMN last_failure INTEGER;
            "#,
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_init_schema_fresh_db() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let columns: Vec<String> = conn
            .prepare("SELECT name FROM pragma_table_info('feeds') ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        for expected in ["url", "pub", "sec", "state", "failure_count", "last_success", "last_failure"] {
            assert!(columns.contains(&expected.to_string()), "missing {expected}");
        }
    }

    #[test]
    fn test_init_schema_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
    }

    #[test]
    fn test_migrates_legacy_table() {
        let conn = Connection::open_in_memory().unwrap();

        // A store from before health tracking existed.
        conn.execute_batch(
            "CREATE TABLE feeds (
                pub VARCHAR(64) PRIMARY KEY,
                sec VARCHAR(64) NOT NULL,
                url TEXT NOT NULL
            );
            INSERT INTO feeds (pub, sec, url) VALUES ('p1', 's1', 'https://example.com/feed');",
        )
        .unwrap();

        init_schema(&conn).unwrap();

        // Existing rows pick up defaults.
        let (state, failures): (String, u32) = conn
            .query_row(
                "SELECT state, failure_count FROM feeds WHERE url = 'https://example.com/feed'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(state, "active");
        assert_eq!(failures, 0);

        // And a second run is still safe.
        init_schema(&conn).unwrap();
    }
}
