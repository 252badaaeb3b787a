//! Routes for client records and their profile measurements.

use axum::{
    Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{get, put},
};
use db::models::client::{Client, CreateClient, UpdateProfileMeasurements};
use deployment::Deployment;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, context::RequestContext, error::ApiError};

/// Load a client of the caller's organization or fail with 404.
pub async fn load_client(
    deployment: &DeploymentImpl,
    ctx: &RequestContext,
    client_id: Uuid,
) -> Result<Client, ApiError> {
    Client::find_by_id(&deployment.db().pool, ctx.organization_id, client_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Client not found".to_string()))
}

pub async fn list_clients(
    State(deployment): State<DeploymentImpl>,
    ctx: RequestContext,
) -> Result<ResponseJson<ApiResponse<Vec<Client>>>, ApiError> {
    let clients = Client::find_by_organization(&deployment.db().pool, ctx.organization_id).await?;
    Ok(ResponseJson(ApiResponse::success(clients)))
}

pub async fn create_client(
    State(deployment): State<DeploymentImpl>,
    ctx: RequestContext,
    axum::Json(payload): axum::Json<CreateClient>,
) -> Result<ResponseJson<ApiResponse<Client>>, ApiError> {
    if payload.name.trim().is_empty() {
        return Err(ApiError::BadRequest("Client name is required".to_string()));
    }

    let client = Client::create(&deployment.db().pool, ctx.organization_id, &payload).await?;

    deployment
        .track_if_analytics_allowed(
            "client_created",
            serde_json::json!({
                "client_id": client.id.to_string(),
                "organization_id": ctx.organization_id.to_string(),
            }),
        )
        .await;

    Ok(ResponseJson(ApiResponse::success(client)))
}

pub async fn get_client(
    State(deployment): State<DeploymentImpl>,
    ctx: RequestContext,
    Path(client_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Client>>, ApiError> {
    let client = load_client(&deployment, &ctx, client_id).await?;
    Ok(ResponseJson(ApiResponse::success(client)))
}

/// PUT /api/clients/{client_id}/profile-measurements
/// Replace the client-maintained measurements. Any JSON shape is stored as-is.
pub async fn update_profile_measurements(
    State(deployment): State<DeploymentImpl>,
    ctx: RequestContext,
    Path(client_id): Path<Uuid>,
    axum::Json(payload): axum::Json<UpdateProfileMeasurements>,
) -> Result<ResponseJson<ApiResponse<Client>>, ApiError> {
    let client = Client::update_profile_measurements(
        &deployment.db().pool,
        ctx.organization_id,
        client_id,
        payload.profile_measurements.as_ref(),
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("Client not found".to_string()))?;

    Ok(ResponseJson(ApiResponse::success(client)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route("/clients", get(list_clients).post(create_client))
        .route("/clients/{client_id}", get(get_client))
        .route(
            "/clients/{client_id}/profile-measurements",
            put(update_profile_measurements),
        )
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::test_helpers::{seed_client, test_context, test_deployment};

    fn create_payload(name: &str) -> CreateClient {
        CreateClient {
            name: name.to_string(),
            phone: Some("+233 24 123 4567".to_string()),
            email: None,
            profile_measurements: None,
        }
    }

    #[tokio::test]
    async fn test_create_then_list() {
        let deployment = test_deployment().await;
        let ctx = test_context();

        let ResponseJson(created) = create_client(
            State(deployment.clone()),
            ctx,
            axum::Json(create_payload("Yaa Asantewaa")),
        )
        .await
        .unwrap();
        let created = created.into_data().unwrap();
        assert_eq!(created.organization_id, ctx.organization_id);

        let ResponseJson(listed) = list_clients(State(deployment), ctx).await.unwrap();
        let listed = listed.into_data().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, created.id);
    }

    #[tokio::test]
    async fn test_blank_name_is_rejected() {
        let deployment = test_deployment().await;
        let result = create_client(
            State(deployment),
            test_context(),
            axum::Json(create_payload("   ")),
        )
        .await;
        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_other_organization_cannot_read_client() {
        let deployment = test_deployment().await;
        let owner = test_context();
        let client = seed_client(&deployment, &owner, None).await;

        let result = get_client(State(deployment), test_context(), Path(client.id)).await;
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_profile_measurements() {
        let deployment = test_deployment().await;
        let ctx = test_context();
        let client = seed_client(&deployment, &ctx, None).await;
        let profile = json!({"values": {"chest": 40}, "unit": "INCHES"});

        let ResponseJson(updated) = update_profile_measurements(
            State(deployment),
            ctx,
            Path(client.id),
            axum::Json(UpdateProfileMeasurements {
                profile_measurements: Some(profile.clone()),
            }),
        )
        .await
        .unwrap();

        assert_eq!(updated.into_data().unwrap().profile_measurements_json(), profile);
    }
}
