//! SQL schema for the SortingHat SQLite store.
//!
//! Executed once at connection startup; `PRAGMA user_version` records the
//! schema revision. Revisions may only add tables or columns: primary keys
//! embed identity hashes, so a rename needs a data-copy migration.

/// Full schema DDL; idempotent thanks to `CREATE ... IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS individuals (
    mk            TEXT PRIMARY KEY,
    is_locked     INTEGER NOT NULL DEFAULT 0,
    created_at    TEXT NOT NULL,
    last_modified TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS identities (
    uuid          TEXT PRIMARY KEY,
    source        TEXT NOT NULL,
    name          TEXT,
    email         TEXT,
    username      TEXT,
    individual    TEXT NOT NULL REFERENCES individuals(mk) ON DELETE CASCADE,
    created_at    TEXT NOT NULL,
    last_modified TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS countries (
    code   TEXT PRIMARY KEY,   -- ISO 3166-1 alpha-2
    alpha3 TEXT NOT NULL UNIQUE,
    name   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS profiles (
    individual   TEXT PRIMARY KEY REFERENCES individuals(mk) ON DELETE CASCADE,
    name         TEXT,
    email        TEXT,
    gender       TEXT,
    gender_acc   INTEGER CHECK (gender_acc BETWEEN 1 AND 100),
    is_bot       INTEGER NOT NULL DEFAULT 0,
    country_code TEXT REFERENCES countries(code)
);

-- Organizations and teams share one tree-shaped table.
CREATE TABLE IF NOT EXISTS org_groups (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    name       TEXT NOT NULL,
    kind       TEXT NOT NULL,   -- 'organization' | 'team'
    parent_org INTEGER REFERENCES org_groups(id) ON DELETE CASCADE,
    parent     INTEGER REFERENCES org_groups(id) ON DELETE CASCADE,
    created_at TEXT NOT NULL,
    CHECK ((kind = 'organization') = (parent_org IS NULL))
);

CREATE UNIQUE INDEX IF NOT EXISTS groups_org_name_idx
    ON org_groups(name) WHERE kind = 'organization';
CREATE UNIQUE INDEX IF NOT EXISTS groups_team_name_idx
    ON org_groups(parent_org, name) WHERE kind = 'team';

CREATE TABLE IF NOT EXISTS domains (
    domain        TEXT PRIMARY KEY,
    is_top_domain INTEGER NOT NULL DEFAULT 0,
    organization  INTEGER NOT NULL REFERENCES org_groups(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS aliases (
    alias        TEXT PRIMARY KEY,
    organization INTEGER NOT NULL REFERENCES org_groups(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS enrollments (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    individual TEXT NOT NULL REFERENCES individuals(mk) ON DELETE CASCADE,
    group_id   INTEGER NOT NULL REFERENCES org_groups(id) ON DELETE CASCADE,
    start_at   TEXT NOT NULL,   -- fixed-width RFC 3339, sorts lexically
    end_at     TEXT NOT NULL,
    UNIQUE (individual, group_id, start_at, end_at),
    CHECK  (start_at <= end_at)
);

-- The journal is strictly append-only; transactions receive exactly one
-- UPDATE when they close.
CREATE TABLE IF NOT EXISTS transactions (
    tuid        TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    closed_at   TEXT,
    is_closed   INTEGER NOT NULL DEFAULT 0,
    authored_by TEXT,
    tenant      TEXT
);

CREATE TABLE IF NOT EXISTS operations (
    ouid        TEXT PRIMARY KEY,
    op_type     TEXT NOT NULL,   -- 'ADD' | 'DELETE' | 'UPDATE'
    entity_type TEXT NOT NULL,
    target      TEXT NOT NULL,
    timestamp   TEXT NOT NULL,
    args        TEXT NOT NULL,   -- JSON
    tuid        TEXT NOT NULL REFERENCES transactions(tuid)
);

CREATE TABLE IF NOT EXISTS tenants (
    user_name TEXT NOT NULL,
    header    TEXT NOT NULL,
    db_name   TEXT NOT NULL,
    UNIQUE (user_name, header)
);

CREATE INDEX IF NOT EXISTS identities_individual_idx ON identities(individual);
CREATE INDEX IF NOT EXISTS enrollments_individual_idx ON enrollments(individual, group_id);
CREATE INDEX IF NOT EXISTS enrollments_group_idx      ON enrollments(group_id);
CREATE INDEX IF NOT EXISTS domains_org_idx            ON domains(organization);
CREATE INDEX IF NOT EXISTS aliases_org_idx            ON aliases(organization);
CREATE INDEX IF NOT EXISTS operations_tuid_idx        ON operations(tuid, timestamp, ouid);

PRAGMA user_version = 1;
";

/// ISO 3166-1 rows as `alpha2 \t alpha3 \t name`.
pub const COUNTRIES: &str = include_str!("countries.tsv");
