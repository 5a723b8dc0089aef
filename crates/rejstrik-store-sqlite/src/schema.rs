//! SQL schema for the rejstrik SQLite store.
//!
//! Executed at connection startup. `PRAGMA user_version` records the schema
//! revision for future migrations.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- One row per graph node. `key` holds the value of `key_field`
-- (`ico` for companies and authorities, `id` for everything else).
CREATE TABLE IF NOT EXISTS nodes (
    label      TEXT NOT NULL,   -- 'Firma' | 'Zadavatel' | 'Zakazka' | ...
    key        TEXT NOT NULL,
    key_field  TEXT NOT NULL,
    props      TEXT NOT NULL DEFAULT '{}',
    updated_at TEXT NOT NULL,
    PRIMARY KEY (label, key)
);

-- At most one relationship of a type between two nodes.
CREATE TABLE IF NOT EXISTS relationships (
    rel_type   TEXT NOT NULL,
    from_label TEXT NOT NULL,
    from_key   TEXT NOT NULL,
    to_label   TEXT NOT NULL,
    to_key     TEXT NOT NULL,
    props      TEXT NOT NULL DEFAULT '{}',
    updated_at TEXT NOT NULL,
    PRIMARY KEY (rel_type, from_label, from_key, to_label, to_key)
);

-- Declared uniqueness constraints, one per (label, key_field).
CREATE TABLE IF NOT EXISTS constraints (
    label      TEXT NOT NULL,
    key_field  TEXT NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (label, key_field)
);

CREATE INDEX IF NOT EXISTS relationships_to_idx ON relationships(to_label, to_key);

PRAGMA user_version = 1;
";
