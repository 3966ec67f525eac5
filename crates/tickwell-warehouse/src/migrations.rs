use ::duckdb::Connection;

struct Migration {
    version: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "0001_scrape_tables",
        sql: r#"
CREATE SEQUENCE IF NOT EXISTS symbols_id_seq START 1;

CREATE TABLE IF NOT EXISTS symbols (
    id BIGINT PRIMARY KEY DEFAULT nextval('symbols_id_seq'),
    ticker TEXT NOT NULL UNIQUE,
    name TEXT
);

CREATE TABLE IF NOT EXISTS scraping_sources (
    id TEXT PRIMARY KEY,
    base_url TEXT
);

CREATE TABLE IF NOT EXISTS symbol_sources (
    symbol_id BIGINT NOT NULL,
    source_id TEXT NOT NULL,
    scrape_url TEXT,
    last_scraped BIGINT,
    PRIMARY KEY(symbol_id, source_id)
);

CREATE TABLE IF NOT EXISTS prices (
    symbol_id BIGINT NOT NULL,
    price TEXT NOT NULL,
    currency TEXT NOT NULL,
    ts BIGINT NOT NULL
);
"#,
    },
    Migration {
        version: "0002_cache",
        sql: r#"
CREATE TABLE IF NOT EXISTS cache (
    k TEXT PRIMARY KEY,
    v TEXT NOT NULL,
    expires_at BIGINT NOT NULL
);
"#,
    },
    Migration {
        version: "0003_indexes",
        sql: r#"
CREATE INDEX IF NOT EXISTS idx_prices_symbol_ts ON prices(symbol_id, ts);
"#,
    },
];

pub fn apply_migrations(connection: &Connection) -> Result<(), ::duckdb::Error> {
    connection.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    )?;

    for migration in MIGRATIONS {
        let applied_count: i64 = connection.query_row(
            "SELECT COUNT(*) FROM schema_migrations WHERE version = ?",
            [migration.version],
            |row| row.get(0),
        )?;

        if applied_count == 0 {
            connection.execute_batch(migration.sql)?;
            connection.execute(
                "INSERT INTO schema_migrations (version) VALUES (?)",
                [migration.version],
            )?;
            tracing::debug!(version = migration.version, "applied warehouse migration");
        }
    }

    Ok(())
}
