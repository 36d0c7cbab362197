use rusqlite::Connection;

use crate::error::StoreError;

pub const SCHEMA_VERSION: i32 = 1;

pub fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA cache_size = -32000;
        PRAGMA busy_timeout = 5000;
    ",
    )?;
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at INTEGER NOT NULL
);
INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, unixepoch());

CREATE TABLE IF NOT EXISTS part_records (
    record_id BLOB PRIMARY KEY CHECK (length(record_id) = 16),
    part_id TEXT NOT NULL,
    serial TEXT,
    location TEXT NOT NULL,
    building INTEGER NOT NULL,
    owner TEXT,
    container_tag TEXT,
    order_ref TEXT,
    prev BLOB CHECK (prev IS NULL OR length(prev) = 16),
    next_id BLOB CHECK (next_id IS NULL OR length(next_id) = 16),
    disposition TEXT,
    next_owner TEXT,
    created_at BLOB NOT NULL CHECK (length(created_at) = 12),
    replaced_at BLOB CHECK (replaced_at IS NULL OR length(replaced_at) = 12),
    actor BLOB NOT NULL CHECK (length(actor) = 16)
);
CREATE INDEX IF NOT EXISTS idx_records_active
    ON part_records (part_id, building, location)
    WHERE next_id IS NULL AND disposition IS NULL;
CREATE INDEX IF NOT EXISTS idx_records_owner
    ON part_records (owner, part_id)
    WHERE next_id IS NULL AND disposition IS NULL;
CREATE INDEX IF NOT EXISTS idx_records_part_created ON part_records (part_id, created_at);
CREATE INDEX IF NOT EXISTS idx_records_part_replaced ON part_records (part_id, replaced_at);
CREATE INDEX IF NOT EXISTS idx_records_container ON part_records (container_tag, created_at);
CREATE INDEX IF NOT EXISTS idx_records_closed ON part_records (replaced_at) WHERE next_id IS NOT NULL;

CREATE TABLE IF NOT EXISTS catalog (
    part_id TEXT PRIMARY KEY,
    manufacturer TEXT NOT NULL,
    name TEXT NOT NULL,
    serialized INTEGER NOT NULL,
    consumable INTEGER NOT NULL,
    shelf_location TEXT,
    category TEXT NOT NULL,
    detail BLOB NOT NULL,
    notes TEXT NOT NULL DEFAULT '',
    created_by BLOB NOT NULL CHECK (length(created_by) = 16),
    created_at BLOB NOT NULL CHECK (length(created_at) = 12),
    audited_at BLOB CHECK (audited_at IS NULL OR length(audited_at) = 12)
);
";
