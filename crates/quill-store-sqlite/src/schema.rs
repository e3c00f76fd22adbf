//! SQL schema for the Quill SQLite store.
//!
//! The raw event tables (`posts`, `visits`, `comments`) belong to the host
//! blog application; they are declared here with the columns the pipeline
//! touches so that a fresh database (and every test) has them. `daily_stats`
//! is owned by the aggregator.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS posts (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    title       TEXT    NOT NULL DEFAULT '',
    content     TEXT    NOT NULL DEFAULT '',
    published   INTEGER NOT NULL DEFAULT 0,
    word_count  INTEGER NOT NULL DEFAULT 0,   -- written only by the normaliser
    created_at  TEXT    NOT NULL              -- RFC 3339 UTC, millisecond precision
);

-- Append-only; one row per page view.
CREATE TABLE IF NOT EXISTS visits (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    ip          TEXT,
    path        TEXT    NOT NULL DEFAULT '/',
    created_at  TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS comments (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    post_id     INTEGER REFERENCES posts(id),
    content     TEXT    NOT NULL DEFAULT '',
    created_at  TEXT    NOT NULL
);

-- One row per local calendar date, replaced wholesale on every run.
CREATE TABLE IF NOT EXISTS daily_stats (
    date        TEXT    PRIMARY KEY,          -- YYYY-MM-DD
    pv          INTEGER NOT NULL DEFAULT 0,
    uv          INTEGER NOT NULL DEFAULT 0,
    posts       INTEGER NOT NULL DEFAULT 0,
    comments    INTEGER NOT NULL DEFAULT 0,
    updated_at  TEXT    NOT NULL
);

CREATE INDEX IF NOT EXISTS visits_created_idx   ON visits(created_at);
CREATE INDEX IF NOT EXISTS posts_created_idx    ON posts(created_at);
CREATE INDEX IF NOT EXISTS comments_created_idx ON comments(created_at);

PRAGMA user_version = 1;
";
