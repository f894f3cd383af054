//! Shape of the host's key-value table.
//!
//! Applied to every loaded image so that queries against a fresh or foreign
//! database never fail on a missing table. Matches the host's own DDL, so
//! running it against an existing image is a no-op.

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS ItemTable (
    key   TEXT UNIQUE ON CONFLICT REPLACE,
    value BLOB
);
";
