/*!
 * Database schema and migrations.
 *
 * `MIGRATIONS[n]` upgrades a database from version `n` to `n + 1`; a fresh
 * database runs them all.
 */

use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use rusqlite::{Connection, OptionalExtension};

/// Steps from version `index` to `index + 1`
const MIGRATIONS: &[&str] = &[
    // v1: jobs and their segments
    r#"
    CREATE TABLE jobs (
        id TEXT PRIMARY KEY,
        source_path TEXT NOT NULL,
        source_hash TEXT NOT NULL,
        voice TEXT NOT NULL,
        provider TEXT NOT NULL,
        model TEXT NOT NULL,
        max_unit_size INTEGER NOT NULL,
        total_segments INTEGER NOT NULL,
        status TEXT NOT NULL DEFAULT 'in_progress',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        completed_at TEXT
    );
    CREATE INDEX idx_jobs_status ON jobs(status);
    CREATE INDEX idx_jobs_source_hash ON jobs(source_hash);

    CREATE TABLE segments (
        job_id TEXT NOT NULL REFERENCES jobs(id) ON DELETE CASCADE,
        segment_index INTEGER NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        attempts INTEGER NOT NULL DEFAULT 0,
        last_error TEXT,
        audio_path TEXT,
        duration_seconds REAL,
        updated_at TEXT NOT NULL,
        PRIMARY KEY (job_id, segment_index)
    );
    CREATE INDEX idx_segments_status ON segments(job_id, status);
    "#,
];

/// Version a fully migrated database reports
pub const SCHEMA_VERSION: i32 = MIGRATIONS.len() as i32;

/// Configure the connection and bring the schema up to `SCHEMA_VERSION`
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    // WAL survives crashes mid-write; foreign keys are per connection
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            version INTEGER NOT NULL,
            updated_at TEXT NOT NULL
        );",
    )?;

    let current = get_schema_version(conn)?;
    if current > SCHEMA_VERSION {
        return Err(anyhow!(
            "Database schema v{} is newer than supported v{}; upgrade narrador",
            current,
            SCHEMA_VERSION
        ));
    }
    if current == SCHEMA_VERSION {
        debug!("Database schema is up to date (v{})", current);
        return Ok(());
    }

    info!("Migrating progress database from v{} to v{}", current, SCHEMA_VERSION);
    for (step, sql) in MIGRATIONS.iter().enumerate().skip(current as usize) {
        let target = step as i32 + 1;
        conn.execute_batch(&format!("BEGIN; {} COMMIT;", sql))
            .with_context(|| format!("Failed to migrate database schema to v{}", target))?;
        set_schema_version(conn, target)?;
    }
    Ok(())
}

fn get_schema_version(conn: &Connection) -> Result<i32> {
    let version = conn
        .query_row("SELECT version FROM schema_version WHERE id = 1", [], |row| row.get(0))
        .optional()
        .context("Failed to read schema version")?;
    Ok(version.unwrap_or(0))
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_version (id, version, updated_at) VALUES (1, ?1, datetime('now'))",
        [version],
    )?;
    Ok(())
}
