//! SQL schema for the Ward SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS subjects (
    subject_id     INTEGER PRIMARY KEY AUTOINCREMENT,
    email          TEXT    NOT NULL UNIQUE,   -- lower-cased login name
    is_client      INTEGER NOT NULL DEFAULT 0,
    is_staff       INTEGER NOT NULL DEFAULT 0,
    is_provider    INTEGER NOT NULL DEFAULT 0,
    is_internal    INTEGER NOT NULL DEFAULT 0,
    deleted        INTEGER NOT NULL DEFAULT 0,
    email_verified INTEGER NOT NULL DEFAULT 0,
    created_at     TEXT    NOT NULL
);

-- Exactly one row per subject.
CREATE TABLE IF NOT EXISTS credentials (
    subject_id          INTEGER PRIMARY KEY REFERENCES subjects(subject_id),
    password_hash       TEXT    NOT NULL,
    staff_blocked       INTEGER NOT NULL DEFAULT 0,
    staff_block_reason  TEXT,
    client_blocked      INTEGER NOT NULL DEFAULT 0,
    client_block_reason TEXT,
    last_login          TEXT,
    refresh_token       TEXT
);

CREATE TABLE IF NOT EXISTS role_assignments (
    subject_id INTEGER NOT NULL REFERENCES subjects(subject_id),
    role       TEXT    NOT NULL,
    PRIMARY KEY (subject_id, role)
);

-- Rejection and revocation delete the row; there is no rejected status.
CREATE TABLE IF NOT EXISTS resource_grants (
    grant_id    TEXT    PRIMARY KEY,
    granter_id  INTEGER NOT NULL REFERENCES subjects(subject_id),
    delegate_id INTEGER NOT NULL REFERENCES subjects(subject_id),
    resource    TEXT    NOT NULL,
    status      TEXT    NOT NULL CHECK (status IN ('pending', 'accepted')),
    created_at  TEXT    NOT NULL,
    UNIQUE (granter_id, delegate_id, resource),
    CHECK  (granter_id != delegate_id)
);

-- Tokens are stored as SHA-256 digests; expires_at is Unix seconds.
CREATE TABLE IF NOT EXISTS token_blacklist (
    token_digest TEXT    PRIMARY KEY,
    expires_at   INTEGER NOT NULL,
    revoked_at   TEXT    NOT NULL
);

-- Append-only.
CREATE TABLE IF NOT EXISTS login_events (
    event_id    INTEGER PRIMARY KEY AUTOINCREMENT,
    subject_id  INTEGER,                      -- NULL when the username was unknown
    kind        TEXT    NOT NULL,             -- 'login' | 'refresh'
    outcome     TEXT    NOT NULL,             -- 'success' | 'failure'
    user_agent  TEXT,
    recorded_at TEXT    NOT NULL
);

CREATE INDEX IF NOT EXISTS grants_delegate_idx    ON resource_grants(delegate_id);
CREATE INDEX IF NOT EXISTS blacklist_expiry_idx   ON token_blacklist(expires_at);
CREATE INDEX IF NOT EXISTS login_events_subject_idx ON login_events(subject_id);

PRAGMA user_version = 1;
";
