//! Test helpers for server unit tests.

use db::{
    DBService,
    models::client::{Client, CreateClient},
};
use deployment::Deployment;
use services::services::config::Config;
use uuid::Uuid;

use crate::{DeploymentImpl, context::RequestContext};

/// Deployment backed by a fresh in-memory database.
pub async fn test_deployment() -> DeploymentImpl {
    let config = Config::from_lookup(|name| match name {
        "DATABASE_URL" => Some("sqlite::memory:".to_string()),
        _ => None,
    })
    .expect("failed to build test config");
    let db = DBService::new_in_memory()
        .await
        .expect("failed to create test database");
    DeploymentImpl::from_parts(db, config)
        .await
        .expect("failed to create test deployment")
}

pub fn test_context() -> RequestContext {
    RequestContext::new(Uuid::new_v4(), Some(Uuid::new_v4()))
}

/// Insert a client for `ctx`'s organization with the given profile measurements.
pub async fn seed_client(
    deployment: &DeploymentImpl,
    ctx: &RequestContext,
    profile_measurements: Option<serde_json::Value>,
) -> Client {
    Client::create(
        &deployment.db().pool,
        ctx.organization_id,
        &CreateClient {
            name: "Akosua Asante".to_string(),
            phone: None,
            email: None,
            profile_measurements,
        },
    )
    .await
    .expect("failed to seed client")
}
