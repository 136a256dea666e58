use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Connection, SqlitePool};
use tracing::info;

/// Schema migrations in application order. Versions are recorded in
/// `schema_version` and never re-applied.
const MIGRATIONS: &[(i64, &str)] = &[
    (1, include_str!("../../migrations/001_initial.sql")),
    (2, include_str!("../../migrations/002_channels.sql")),
];

/// Create a SQLite connection pool in WAL mode with foreign keys enforced.
pub async fn create_pool(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        .create_if_missing(true)
        .busy_timeout(std::time::Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    info!("database connected: {}", database_url);
    Ok(pool)
}

/// Bring the schema up to date.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    apply_migrations(pool, MIGRATIONS).await
}

/// Apply every migration newer than the recorded schema version. Each file
/// runs in its own transaction together with its version row, so a failing
/// file leaves the schema at the previous version.
async fn apply_migrations(
    pool: &SqlitePool,
    migrations: &[(i64, &'static str)],
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS schema_version (\
            version     INTEGER PRIMARY KEY, \
            applied_at  TEXT NOT NULL DEFAULT (datetime('now'))\
        )",
    )
    .execute(pool)
    .await?;

    let current: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM schema_version")
        .fetch_one(pool)
        .await?;

    let mut conn = pool.acquire().await?;
    for &(version, sql) in migrations.iter().filter(|(v, _)| *v > current) {
        info!(version, "applying migration");
        let mut tx = conn.begin().await?;
        let applied: Result<(), sqlx::Error> = async {
            sqlx::raw_sql(sql).execute(&mut *tx).await?;
            sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
                .bind(version)
                .execute(&mut *tx)
                .await?;
            Ok(())
        }
        .await;
        match applied {
            Ok(()) => tx.commit().await?,
            Err(e) => {
                tx.rollback().await?;
                return Err(e);
            }
        }
    }

    info!(version = migrations.last().map_or(0, |m| m.0), "database schema up to date");
    Ok(())
}
