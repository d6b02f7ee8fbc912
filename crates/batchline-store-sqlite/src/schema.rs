//! SQL schema for the Batchline SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
///
/// The partial UNIQUE index on published version numbers is what turns the
/// engine's read-max/write-max+1 pattern into a typed `VersionConflict`
/// under concurrent writers. Drafts get the same treatment on their own,
/// independent counter.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS documents (
    doc_id          TEXT PRIMARY KEY,
    group_id        TEXT NOT NULL,
    variation       TEXT,              -- NULL = master branch
    version_number  INTEGER,           -- set iff published
    test_sequence   INTEGER,           -- set iff draft
    parent_id       TEXT,
    clone_source_id TEXT,
    root_id         TEXT,
    locked          INTEGER NOT NULL DEFAULT 0,
    name            TEXT NOT NULL,
    lines_json      TEXT NOT NULL DEFAULT '[]',
    created_at      TEXT NOT NULL,     -- ISO 8601 UTC
    CHECK ((version_number IS NULL) != (test_sequence IS NULL))
);

-- Invariant: published version numbers are unique per (group, branch).
CREATE UNIQUE INDEX IF NOT EXISTS documents_bucket_version_idx
    ON documents(group_id, COALESCE(variation, ''), version_number)
    WHERE version_number IS NOT NULL;

-- Draft test sequences are numbered independently, also unique per bucket.
CREATE UNIQUE INDEX IF NOT EXISTS documents_bucket_draft_idx
    ON documents(group_id, COALESCE(variation, ''), test_sequence)
    WHERE test_sequence IS NOT NULL;

CREATE INDEX IF NOT EXISTS documents_group_idx ON documents(group_id);

-- Lineage events are strictly append-only.
-- No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS lineage_events (
    event_id    TEXT PRIMARY KEY,
    subject_id  TEXT NOT NULL REFERENCES documents(doc_id),
    source_id   TEXT,
    event_kind  TEXT NOT NULL,  -- discriminant of LineageEventKind
    actor_id    TEXT NOT NULL,
    occurred_at TEXT NOT NULL,
    notes       TEXT
);

CREATE INDEX IF NOT EXISTS lineage_events_subject_idx
    ON lineage_events(subject_id);

PRAGMA user_version = 1;
";
