//! SQL migration definitions for the event log database.
//!
//! Migrations are applied in order on open. Each one records its version in
//! `schema_migrations` so reopening an existing log is a no-op.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: append-only events table",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Append-only event log; one stream per article id
CREATE TABLE IF NOT EXISTS events (
    position     INTEGER PRIMARY KEY AUTOINCREMENT,
    event_id     TEXT NOT NULL UNIQUE,
    stream_id    TEXT NOT NULL,
    event_type   TEXT NOT NULL,
    content_type TEXT NOT NULL DEFAULT 'application/json',
    data         TEXT NOT NULL,
    recorded_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_events_type ON events(event_type, position);
CREATE INDEX IF NOT EXISTS idx_events_stream ON events(stream_id, position);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
