/// A schema migration.
#[derive(Debug)]
pub struct Migration {
    pub version: u32,
    pub name: &'static str,
    pub sql: &'static str,
}

const MIGRATION_001: &str = r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- One row per indexed audio file. The id is the file path.
CREATE TABLE IF NOT EXISTS samples (
    id TEXT PRIMARY KEY,
    path TEXT NOT NULL,
    filename TEXT NOT NULL,
    embedding BLOB NOT NULL,
    dimensions INTEGER NOT NULL,
    bpm REAL NOT NULL DEFAULT 0,
    key TEXT NOT NULL DEFAULT '',
    duration_secs REAL,
    format TEXT,
    analysis_engine TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_samples_analysis_engine ON samples(analysis_engine);
CREATE INDEX IF NOT EXISTS idx_samples_filename ON samples(filename);
"#;

const MIGRATION_002: &str = r#"
-- Facts about the store itself (embedding model, dimensions)
CREATE TABLE IF NOT EXISTS store_info (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// All migrations, in order.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "samples",
        sql: MIGRATION_001,
    },
    Migration {
        version: 2,
        name: "store_info",
        sql: MIGRATION_002,
    },
];
