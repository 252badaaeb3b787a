//! Startup check that migrations ran and the measurement tables exist

use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{info, warn};

/// Tables the measurement routes read and write
pub const REQUIRED_TABLES: &[&str] = &["clients", "measurements"];

#[derive(Debug, Error)]
pub enum DatabaseValidationError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub struct DatabaseValidator {
    pool: SqlitePool,
}

impl DatabaseValidator {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn validate(&self) -> Result<ValidationResult, DatabaseValidationError> {
        let migrations_table_exists = self.table_exists("_sqlx_migrations").await?;
        if !migrations_table_exists {
            warn!("Database not initialized - _sqlx_migrations table does not exist");
            return Ok(ValidationResult {
                is_initialized: false,
                migrations_applied: 0,
                missing_tables: REQUIRED_TABLES.iter().map(|t| t.to_string()).collect(),
            });
        }

        let migrations_applied = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1",
        )
        .fetch_one(&self.pool)
        .await?;

        let mut missing_tables = Vec::new();
        for table in REQUIRED_TABLES {
            if !self.table_exists(table).await? {
                missing_tables.push(table.to_string());
            }
        }

        info!(
            migrations_applied = migrations_applied,
            missing_tables = missing_tables.len(),
            "Database validation complete"
        );

        Ok(ValidationResult {
            is_initialized: true,
            migrations_applied: migrations_applied as usize,
            missing_tables,
        })
    }

    async fn table_exists(&self, table: &str) -> Result<bool, sqlx::Error> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(table)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }
}

#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub is_initialized: bool,
    pub migrations_applied: usize,
    pub missing_tables: Vec<String>,
}

impl ValidationResult {
    pub fn is_ok(&self) -> bool {
        self.is_initialized && self.missing_tables.is_empty()
    }

    pub fn summary(&self) -> String {
        if !self.is_initialized {
            "Database not initialized - migrations need to be run".to_string()
        } else if !self.missing_tables.is_empty() {
            format!("Database missing tables: {}", self.missing_tables.join(", "))
        } else {
            format!("Database OK - {} migrations applied", self.migrations_applied)
        }
    }
}

#[cfg(test)]
mod tests {
    use db::DBService;
    use sqlx::sqlite::SqlitePoolOptions;

    use super::*;

    #[tokio::test]
    async fn test_migrated_database_is_ok() {
        let db = DBService::new_in_memory().await.unwrap();
        let result = DatabaseValidator::new(db.pool.clone()).validate().await.unwrap();
        assert!(result.is_ok(), "{}", result.summary());
        assert!(result.migrations_applied >= 1);
    }

    #[tokio::test]
    async fn test_empty_database_is_not_initialized() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let result = DatabaseValidator::new(pool).validate().await.unwrap();
        assert!(!result.is_ok());
        assert!(!result.is_initialized);
        assert_eq!(result.missing_tables, vec!["clients", "measurements"]);
    }
}
