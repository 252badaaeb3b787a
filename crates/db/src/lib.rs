use std::str::FromStr;

use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
};
use tracing::info;

pub mod models;

#[derive(Clone)]
pub struct DBService {
    pub pool: SqlitePool,
}

impl DBService {
    /// Open (creating if needed) the database at `database_url` and apply migrations.
    pub async fn new(database_url: &str) -> Result<DBService, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        Self::migrate(&pool).await?;
        info!(database_url = %database_url, "Database ready");
        Ok(DBService { pool })
    }

    /// Private in-memory database with migrations applied.
    ///
    /// Limited to one connection: every SQLite in-memory connection is its own database.
    pub async fn new_in_memory() -> Result<DBService, sqlx::Error> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Self::migrate(&pool).await?;
        Ok(DBService { pool })
    }

    async fn migrate(pool: &SqlitePool) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(pool).await?;
        Ok(())
    }
}
