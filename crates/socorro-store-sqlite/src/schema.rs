//! SQL schema for the Socorro SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- ── Registry ────────────────────────────────────────────────────────────────

CREATE TABLE IF NOT EXISTS citizens (
    citizen_id           TEXT PRIMARY KEY,
    nationality          TEXT NOT NULL,            -- 'V' | 'E'
    identification_value TEXT NOT NULL UNIQUE,
    first_name           TEXT NOT NULL,
    middle_name          TEXT,
    last_name            TEXT NOT NULL,
    second_last_name     TEXT,
    birth_date           TEXT,                     -- YYYY-MM-DD
    gender               TEXT,                     -- 'M' | 'F'
    phone                TEXT,
    email                TEXT,
    address              TEXT,                     -- JSON-encoded Address
    representative_id    TEXT REFERENCES citizens(citizen_id),
    photo_path           TEXT,
    created_at           TEXT NOT NULL,
    updated_at           TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS health_profiles (
    citizen_id             TEXT PRIMARY KEY REFERENCES citizens(citizen_id),
    blood_type             TEXT,
    has_disability         INTEGER NOT NULL DEFAULT 0,
    disability_detail      TEXT,
    has_chronic_disease    INTEGER NOT NULL DEFAULT 0,
    chronic_disease_detail TEXT,
    is_pregnant            INTEGER NOT NULL DEFAULT 0,
    has_hypertension       INTEGER NOT NULL DEFAULT 0,
    has_diabetes           INTEGER NOT NULL DEFAULT 0,
    weight_kg              REAL,
    height_cm              REAL,
    notes                  TEXT,
    updated_at             TEXT NOT NULL
);

-- ── Catalog ─────────────────────────────────────────────────────────────────

CREATE TABLE IF NOT EXISTS categories (
    category_id  TEXT PRIMARY KEY,
    name         TEXT NOT NULL,
    parent_id    TEXT REFERENCES categories(category_id),
    requirements TEXT NOT NULL DEFAULT '[]',
    created_at   TEXT NOT NULL
);

-- current_stock is a cache of the stock_movements sum for the supply.
CREATE TABLE IF NOT EXISTS supplies (
    supply_id     TEXT PRIMARY KEY,
    category_id   TEXT NOT NULL REFERENCES categories(category_id),
    name          TEXT NOT NULL,
    unit          TEXT NOT NULL,
    concentration TEXT,
    status        TEXT NOT NULL DEFAULT 'active',
    current_stock INTEGER NOT NULL DEFAULT 0,
    min_stock     INTEGER NOT NULL DEFAULT 0,
    created_at    TEXT NOT NULL,
    CHECK (current_stock >= 0),
    CHECK (min_stock >= 0)
);

CREATE TABLE IF NOT EXISTS institutions (
    institution_id TEXT PRIMARY KEY,
    name           TEXT NOT NULL,
    address        TEXT,
    phone          TEXT
);

CREATE TABLE IF NOT EXISTS medical_services (
    service_id     TEXT PRIMARY KEY,
    institution_id TEXT REFERENCES institutions(institution_id),
    name           TEXT NOT NULL,
    description    TEXT,
    active         INTEGER NOT NULL DEFAULT 1
);

-- ── Access control ──────────────────────────────────────────────────────────

CREATE TABLE IF NOT EXISTS users (
    user_id       TEXT PRIMARY KEY,
    username      TEXT NOT NULL UNIQUE,
    display_name  TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    active        INTEGER NOT NULL DEFAULT 1,
    created_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS roles (
    role_id      TEXT PRIMARY KEY,
    name         TEXT NOT NULL UNIQUE,
    description  TEXT,
    is_protected INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS permissions (
    name   TEXT PRIMARY KEY,
    module TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS role_permissions (
    role_id    TEXT NOT NULL REFERENCES roles(role_id) ON DELETE CASCADE,
    permission TEXT NOT NULL REFERENCES permissions(name),
    PRIMARY KEY (role_id, permission)
);

CREATE TABLE IF NOT EXISTS user_roles (
    user_id TEXT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    role_id TEXT NOT NULL REFERENCES roles(role_id) ON DELETE CASCADE,
    PRIMARY KEY (user_id, role_id)
);

-- ── Cases ───────────────────────────────────────────────────────────────────

CREATE TABLE IF NOT EXISTS social_cases (
    case_id        TEXT PRIMARY KEY,
    case_number    TEXT NOT NULL UNIQUE,
    citizen_id     TEXT NOT NULL REFERENCES citizens(citizen_id),
    applicant_id   TEXT NOT NULL REFERENCES citizens(citizen_id),
    beneficiary_id TEXT NOT NULL REFERENCES citizens(citizen_id),
    created_by     TEXT NOT NULL,
    assigned_to    TEXT,
    category_id    TEXT NOT NULL REFERENCES categories(category_id),
    subcategory_id TEXT REFERENCES categories(category_id),
    channel        TEXT NOT NULL,
    description    TEXT NOT NULL,
    status         TEXT NOT NULL DEFAULT 'open',
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL,
    deleted_at     TEXT
);

CREATE TABLE IF NOT EXISTS case_items (
    item_id           TEXT PRIMARY KEY,
    case_id           TEXT NOT NULL REFERENCES social_cases(case_id),
    itemable_type     TEXT NOT NULL,   -- 'supply' | 'medical_service'
    itemable_id       TEXT NOT NULL,
    quantity          INTEGER NOT NULL,
    approved_quantity INTEGER,
    status            TEXT NOT NULL DEFAULT 'pending',
    notes             TEXT,
    reviewed_by       TEXT,
    reviewed_at       TEXT,
    review_note       TEXT,
    fulfilled_at      TEXT,
    fulfilled_by      TEXT,
    created_at        TEXT NOT NULL,
    CHECK (quantity > 0),
    CHECK (approved_quantity IS NULL OR status IN ('approved', 'fulfilled'))
);

-- ── Stock ledger ────────────────────────────────────────────────────────────

-- Strictly append-only. No UPDATE or DELETE is ever issued against it.
CREATE TABLE IF NOT EXISTS stock_movements (
    movement_id    TEXT PRIMARY KEY,
    supply_id      TEXT NOT NULL REFERENCES supplies(supply_id),
    movement_type  TEXT NOT NULL CHECK (movement_type IN ('entry', 'exit')),
    quantity       INTEGER NOT NULL CHECK (quantity > 0),
    reason         TEXT NOT NULL,
    reference_type TEXT,               -- 'case' | 'case_item'
    reference_id   TEXT,
    actor_id       TEXT NOT NULL,
    notes          TEXT,
    created_at     TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS citizens_name_idx       ON citizens(last_name, first_name);
CREATE INDEX IF NOT EXISTS categories_parent_idx   ON categories(parent_id);
CREATE INDEX IF NOT EXISTS supplies_category_idx   ON supplies(category_id);
CREATE INDEX IF NOT EXISTS cases_citizen_idx       ON social_cases(citizen_id);
CREATE INDEX IF NOT EXISTS cases_status_idx        ON social_cases(status);
CREATE INDEX IF NOT EXISTS items_case_idx          ON case_items(case_id);
CREATE INDEX IF NOT EXISTS movements_supply_idx    ON stock_movements(supply_id);
CREATE INDEX IF NOT EXISTS movements_reference_idx ON stock_movements(reference_type, reference_id);

PRAGMA user_version = 1;
";
