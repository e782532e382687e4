//! SQLite DDL for the catalog store. Every statement is idempotent.

pub(crate) const SQLITE_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS metadata_tables (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    datasource_id INTEGER NOT NULL,
    schema_name TEXT NOT NULL,
    table_name TEXT NOT NULL,
    row_count INTEGER NOT NULL DEFAULT 0,
    size_bytes INTEGER NOT NULL DEFAULT 0,
    comment TEXT NULL,
    created_at TEXT NOT NULL, -- RFC3339
    updated_at TEXT NOT NULL, -- RFC3339
    UNIQUE(datasource_id, schema_name, table_name)
);

CREATE TABLE IF NOT EXISTS metadata_columns (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    table_id INTEGER NOT NULL REFERENCES metadata_tables(id),
    column_name TEXT NOT NULL,
    data_type TEXT NOT NULL,
    is_nullable INTEGER NOT NULL,
    default_value TEXT NULL,
    ordinal_position INTEGER NOT NULL,
    comment TEXT NULL,
    UNIQUE(table_id, column_name)
);

CREATE INDEX IF NOT EXISTS idx_metadata_columns_table ON metadata_columns(table_id);

-- Composite foreign keys produce one row per column pair.
CREATE TABLE IF NOT EXISTS metadata_relationships (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    constraint_name TEXT NOT NULL,
    table_id INTEGER NOT NULL REFERENCES metadata_tables(id),
    column_name TEXT NOT NULL,
    referenced_table_id INTEGER NOT NULL REFERENCES metadata_tables(id),
    referenced_column_name TEXT NOT NULL,
    constraint_type TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_metadata_relationships_key
    ON metadata_relationships(constraint_name, table_id, referenced_table_id);

CREATE TABLE IF NOT EXISTS extraction_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    datasource_id INTEGER NOT NULL,
    task_id INTEGER NULL,
    mode TEXT NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('running', 'success', 'partial_success', 'failed')),
    message TEXT NULL,
    tables_count INTEGER NOT NULL DEFAULT 0,
    duration_seconds REAL NULL,
    started_at TEXT NOT NULL, -- RFC3339
    finished_at TEXT NULL
);

CREATE INDEX IF NOT EXISTS idx_extraction_history_latest
    ON extraction_history(datasource_id, started_at);

CREATE TABLE IF NOT EXISTS etl_tasks (
    id INTEGER PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    datasource_id INTEGER NOT NULL,
    task_type TEXT NOT NULL,
    last_run TEXT NULL,
    updated_at TEXT NOT NULL
)
"#;
