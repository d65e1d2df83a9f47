//! Database schema definitions.

/// SQL schema for the catalog database.
pub const SCHEMA_SQL: &str = r#"
-- Tea vendors, one row per importer
CREATE TABLE IF NOT EXISTS vendors (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    slug TEXT NOT NULL UNIQUE,
    description TEXT NOT NULL DEFAULT '',
    link TEXT NOT NULL,
    logo TEXT,
    display_order INTEGER NOT NULL DEFAULT 0,
    UNIQUE(name, link)
);

-- The shared tea taxonomy
CREATE TABLE IF NOT EXISTS categories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    slug TEXT NOT NULL UNIQUE,
    is_origin INTEGER NOT NULL DEFAULT 0,
    display_order INTEGER NOT NULL DEFAULT 0
);

-- The catalog itself. Rows are never removed, only flagged via deleted_at.
CREATE TABLE IF NOT EXISTS teas (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    vendor_id INTEGER NOT NULL REFERENCES vendors(id),
    vendor_internal_id TEXT NOT NULL,
    name TEXT NOT NULL,
    slug TEXT NOT NULL,
    description TEXT,
    long_description TEXT,
    ingredients TEXT,
    tips_raw TEXT,
    tips_mass INTEGER,
    tips_volume INTEGER,
    tips_temperature INTEGER,
    tips_duration INTEGER,
    tips_extra TEXT,
    tips_max_brews INTEGER NOT NULL DEFAULT 1,
    illustration TEXT,
    price REAL,
    price_unit TEXT,
    link TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    deleted_at TEXT,
    UNIQUE(vendor_id, vendor_internal_id),
    UNIQUE(vendor_id, slug)
);

CREATE INDEX IF NOT EXISTS idx_teas_vendor ON teas(vendor_id);
CREATE INDEX IF NOT EXISTS idx_teas_deleted ON teas(deleted_at);

-- Tea/category association
CREATE TABLE IF NOT EXISTS tea_categories (
    tea_id INTEGER NOT NULL REFERENCES teas(id) ON DELETE CASCADE,
    category_id INTEGER NOT NULL REFERENCES categories(id),
    PRIMARY KEY(tea_id, category_id)
);
"#;

/// Create all tables and indexes if they do not exist.
pub fn initialize_schema(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)
}
