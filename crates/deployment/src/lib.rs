use async_trait::async_trait;
use db::DBService;
use serde_json::Value;
use services::services::{
    config::{Config, ConfigError},
    database_validator::DatabaseValidationError,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    DatabaseValidation(#[from] DatabaseValidationError),
    #[error("database schema incomplete: {0}")]
    SchemaIncomplete(String),
}

/// Everything a route handler needs from the running service.
#[async_trait]
pub trait Deployment: Clone + Send + Sync + 'static {
    async fn new() -> Result<Self, DeploymentError>;

    fn db(&self) -> &DBService;

    fn config(&self) -> &Config;

    /// Record a product event when analytics are enabled; never fails the request.
    async fn track_if_analytics_allowed(&self, event_name: &str, properties: Value);
}
