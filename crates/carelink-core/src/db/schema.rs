//! SQLite schema definition.

/// Complete database schema for the on-device store.
pub const SCHEMA: &str = r#"
-- ============================================================================
-- Secure Store
-- ============================================================================

-- Independent key/value entries; each write replaces a single key.
CREATE TABLE IF NOT EXISTS secure_store (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;
