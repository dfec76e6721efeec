//! Durable storage of templates, rules, and credentials, on SQLite.
//! Writes always go through the runtime query API with bound
//! parameters; JSON-valued columns hold the variable lists.

pub mod credentials;
pub mod rules;
pub mod templates;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

// The store is the single local writer, and SQLite admits one writer at
// a time regardless. A single pooled connection serializes statements
// and lets ":memory:" databases behave like files.
const MAX_CONNECTIONS: u32 = 1;

/// Open the database at `url`, such as `sqlite://klaxon.db` or
/// `sqlite::memory:`, creating it if needed.
pub async fn open(url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

    SqlitePoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect_with(options)
        .await
}

/// Apply the schema. Idempotent, and run on every start.
pub async fn migrate(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS templates (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        name        TEXT NOT NULL UNIQUE,
        body        TEXT NOT NULL,
        tags        TEXT NOT NULL, -- JSON array of strings.
        variables   TEXT NOT NULL, -- JSON array of variable specs.
        created_at  TEXT NOT NULL,
        updated_at  TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS rules (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        name        TEXT NOT NULL UNIQUE,
        tenant      TEXT NOT NULL,
        namespace   TEXT NOT NULL,
        group_name  TEXT NOT NULL,
        template    TEXT NOT NULL,
        enabled     INTEGER NOT NULL,
        variables   TEXT NOT NULL, -- JSON array of name/value bindings.
        created_at  TEXT NOT NULL,
        updated_at  TEXT NOT NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_rules_group
        ON rules (tenant, namespace, group_name)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS slack_credentials (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        tenant      TEXT NOT NULL,
        team        TEXT NOT NULL,
        severity    TEXT NOT NULL,
        channel     TEXT NOT NULL,
        webhook     TEXT NOT NULL,
        username    TEXT NOT NULL,
        created_at  TEXT NOT NULL,
        updated_at  TEXT NOT NULL,
        UNIQUE (tenant, team, severity)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS pagerduty_credentials (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        tenant      TEXT NOT NULL,
        team        TEXT NOT NULL,
        service_key TEXT NOT NULL,
        created_at  TEXT NOT NULL,
        updated_at  TEXT NOT NULL,
        UNIQUE (tenant, team)
    )
    "#,
];
