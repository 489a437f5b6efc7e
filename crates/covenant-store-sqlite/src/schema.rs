//! SQL schema for the Covenant SQLite store.
//!
//! Executed once at connection startup. `PRAGMA user_version` records the
//! schema revision so future migrations can be gated on it.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS contracts (
    contract_id TEXT PRIMARY KEY,
    title       TEXT NOT NULL,
    author_id   TEXT NOT NULL,
    status      TEXT NOT NULL,   -- 'pending_upload' | 'active'
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

-- Versions are strictly append-only; numbers are gap-free from 1.
CREATE TABLE IF NOT EXISTS contract_versions (
    version_id     TEXT PRIMARY KEY,
    contract_id    TEXT NOT NULL REFERENCES contracts(contract_id) ON DELETE CASCADE,
    version_number INTEGER NOT NULL CHECK (version_number >= 1),
    object_key     TEXT NOT NULL,
    content_type   TEXT NOT NULL,
    size_hint      INTEGER,
    created_at     TEXT NOT NULL,
    UNIQUE (contract_id, version_number),
    UNIQUE (object_key)
);

CREATE TRIGGER IF NOT EXISTS contract_versions_append_only
BEFORE UPDATE ON contract_versions
BEGIN
    SELECT RAISE(ABORT, 'contract versions are append-only');
END;

-- Natural key is (contract, email). A signed recipient never regresses.
CREATE TABLE IF NOT EXISTS contract_recipients (
    contract_id TEXT NOT NULL REFERENCES contracts(contract_id) ON DELETE CASCADE,
    email       TEXT NOT NULL,
    status      TEXT NOT NULL DEFAULT 'pending',   -- 'pending' | 'signed'
    signed_at   TEXT,
    PRIMARY KEY (contract_id, email),
    CHECK ((status = 'signed') = (signed_at IS NOT NULL))
);

CREATE TRIGGER IF NOT EXISTS contract_recipients_no_regress
BEFORE UPDATE OF status ON contract_recipients
WHEN OLD.status = 'signed' AND NEW.status != 'signed'
BEGIN
    SELECT RAISE(ABORT, 'recipient status cannot regress');
END;

CREATE TABLE IF NOT EXISTS chat_sessions (
    session_id  TEXT PRIMARY KEY,
    contract_id TEXT NOT NULL REFERENCES contracts(contract_id) ON DELETE CASCADE,
    user_id     TEXT NOT NULL,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS chat_messages (
    message_id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL REFERENCES chat_sessions(session_id) ON DELETE CASCADE,
    sequence   INTEGER NOT NULL,
    role       TEXT NOT NULL,   -- 'user' | 'assistant'
    content    TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE (session_id, sequence)
);

CREATE INDEX IF NOT EXISTS contracts_author_idx         ON contracts(author_id);
CREATE INDEX IF NOT EXISTS contract_versions_latest_idx ON contract_versions(contract_id, version_number DESC);
CREATE INDEX IF NOT EXISTS chat_sessions_contract_idx   ON chat_sessions(contract_id);

PRAGMA user_version = 1;
";
