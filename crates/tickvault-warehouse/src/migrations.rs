use ::duckdb::Connection;

struct Migration {
    version: &'static str,
    sql: &'static str,
}

// The bars table carries no primary key: ingestion is append-only and
// overlapping runs stack duplicate rows; deduplication happens at query
// time.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "0001_bars",
        sql: r#"
CREATE TABLE IF NOT EXISTS bars (
    "Date" DATE NOT NULL,
    "Open" DOUBLE,
    "High" DOUBLE,
    "Low" DOUBLE,
    "Close" DOUBLE,
    "Volume" BIGINT,
    "Ticker" VARCHAR NOT NULL
);
"#,
    },
    Migration {
        version: "0002_bars_index",
        sql: r#"
CREATE INDEX IF NOT EXISTS idx_bars_ticker_date ON bars ("Ticker", "Date");
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
        let query = format!(
            "SELECT COUNT(*) FROM schema_migrations WHERE version = '{}'",
            escape_sql_string(migration.version)
        );
        let applied_count: i64 = connection.query_row(query.as_str(), [], |row| row.get(0))?;

        if applied_count == 0 {
            connection.execute_batch(migration.sql)?;
            let insert = format!(
                "INSERT INTO schema_migrations (version) VALUES ('{}')",
                escape_sql_string(migration.version)
            );
            connection.execute_batch(insert.as_str())?;
        }
    }

    Ok(())
}

fn escape_sql_string(value: &str) -> String {
    value.replace('\'', "''")
}
