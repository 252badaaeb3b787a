use std::sync::Arc;

use async_trait::async_trait;
use db::DBService;
use deployment::{Deployment, DeploymentError};
use serde_json::Value;
use services::services::{config::Config, database_validator::DatabaseValidator};
use tracing::{info, warn};

#[derive(Clone)]
pub struct LocalDeployment {
    db: DBService,
    config: Arc<Config>,
}

impl LocalDeployment {
    /// Assemble from an already opened database, validating its schema.
    pub async fn from_parts(db: DBService, config: Config) -> Result<Self, DeploymentError> {
        let validation = DatabaseValidator::new(db.pool.clone()).validate().await?;
        if !validation.is_ok() {
            warn!("{}", validation.summary());
            return Err(DeploymentError::SchemaIncomplete(validation.summary()));
        }
        info!("{}", validation.summary());

        Ok(Self {
            db,
            config: Arc::new(config),
        })
    }
}

#[async_trait]
impl Deployment for LocalDeployment {
    async fn new() -> Result<Self, DeploymentError> {
        let config = Config::from_env()?;
        let db = DBService::new(&config.database_url).await?;
        Self::from_parts(db, config).await
    }

    fn db(&self) -> &DBService {
        &self.db
    }

    fn config(&self) -> &Config {
        &self.config
    }

    async fn track_if_analytics_allowed(&self, event_name: &str, properties: Value) {
        if !self.config.analytics_enabled {
            return;
        }
        info!(target: "analytics", event = event_name, properties = %properties, "Analytics event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config::from_lookup(|name| match name {
            "DATABASE_URL" => Some("sqlite::memory:".to_string()),
            _ => None,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_from_parts_accepts_migrated_database() {
        let db = DBService::new_in_memory().await.unwrap();
        let deployment = LocalDeployment::from_parts(db, test_config()).await.unwrap();
        assert!(!deployment.config().analytics_enabled);
        deployment
            .track_if_analytics_allowed("noop", serde_json::json!({}))
            .await;
    }
}
