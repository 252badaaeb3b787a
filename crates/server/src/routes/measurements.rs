//! Routes for measurement snapshots, comparison and sync.

use axum::{
    Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::measurement::{
    CreateMeasurement, Measurement, MeasurementMap, MeasurementUnit, MeasurementValue,
};
use deployment::Deployment;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use services::services::{
    measurement_diff::{Comparison, is_metadata_key},
    measurement_merge::{MergeChoices, SyncStrategy, normalize_for_storage},
    measurement_sync::MeasurementSyncService,
};
use tracing::warn;
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use super::clients::load_client;
use crate::{DeploymentImpl, context::RequestContext, error::ApiError};

/// Body for recording a snapshot at order intake or profile edit
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateMeasurementRequest {
    #[ts(type = "Record<string, number | string>")]
    pub values: Map<String, Value>,
    pub unit: Option<MeasurementUnit>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct CompareRequest {
    /// Tailor-side record; the latest snapshot when omitted
    #[serde(default)]
    #[ts(type = "unknown")]
    pub tailor_measurements: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ComparisonResponse {
    #[serde(flatten)]
    #[ts(flatten)]
    pub comparison: Comparison,
    pub default_choices: MergeChoices,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct SyncRequest {
    pub strategy: SyncStrategy,
    /// Complete per-field selection for `merge`; empty means the seeded defaults
    #[serde(default)]
    pub merge_choices: MergeChoices,
    pub unit: Option<MeasurementUnit>,
    #[serde(default)]
    #[ts(type = "unknown")]
    pub tailor_measurements: Option<Value>,
}

/// Validate submitted fields: primitives only, no reserved metadata names.
fn parse_values(values: &Map<String, Value>) -> Result<MeasurementMap, ApiError> {
    values
        .iter()
        .map(|(key, value)| {
            if is_metadata_key(key) {
                return Err(ApiError::BadRequest(format!(
                    "'{key}' is reserved and cannot be used as a measurement name"
                )));
            }
            MeasurementValue::from_json(value)
                .map(|value| (key.clone(), value))
                .ok_or_else(|| {
                    ApiError::BadRequest(format!("measurement '{key}' must be a number or string"))
                })
        })
        .collect()
}

pub async fn list_measurements(
    State(deployment): State<DeploymentImpl>,
    ctx: RequestContext,
    Path(client_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<Measurement>>>, ApiError> {
    load_client(&deployment, &ctx, client_id).await?;
    let history = Measurement::find_by_client(&deployment.db().pool, client_id).await?;
    Ok(ResponseJson(ApiResponse::success(history)))
}

pub async fn get_latest_measurement(
    State(deployment): State<DeploymentImpl>,
    ctx: RequestContext,
    Path(client_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Option<Measurement>>>, ApiError> {
    load_client(&deployment, &ctx, client_id).await?;
    let latest = Measurement::find_latest_for_client(&deployment.db().pool, client_id).await?;
    Ok(ResponseJson(ApiResponse::success(latest)))
}

/// POST /api/clients/{client_id}/measurements
/// Accepts `{ values, unit, notes }` and returns the new snapshot
pub async fn create_measurement(
    State(deployment): State<DeploymentImpl>,
    ctx: RequestContext,
    Path(client_id): Path<Uuid>,
    axum::Json(payload): axum::Json<CreateMeasurementRequest>,
) -> Result<ResponseJson<ApiResponse<Measurement>>, ApiError> {
    load_client(&deployment, &ctx, client_id).await?;

    let data = CreateMeasurement {
        values: normalize_for_storage(parse_values(&payload.values)?),
        unit: payload.unit.unwrap_or(deployment.config().default_unit),
        notes: payload.notes,
    };
    let snapshot =
        Measurement::create(&deployment.db().pool, client_id, &data, ctx.user_id).await?;

    deployment
        .track_if_analytics_allowed(
            "measurement_recorded",
            serde_json::json!({
                "client_id": client_id.to_string(),
                "field_count": data.values.len(),
            }),
        )
        .await;

    Ok(ResponseJson(ApiResponse::success(snapshot)))
}

/// POST /api/clients/{client_id}/measurements/compare
/// Read-only: compares the tailor record with the client's profile
pub async fn compare_measurements(
    State(deployment): State<DeploymentImpl>,
    ctx: RequestContext,
    Path(client_id): Path<Uuid>,
    axum::Json(payload): axum::Json<CompareRequest>,
) -> Result<ResponseJson<ApiResponse<ComparisonResponse>>, ApiError> {
    let service = MeasurementSyncService::new(deployment.db().pool.clone());
    let session = service
        .load_session(
            ctx.organization_id,
            client_id,
            payload.tailor_measurements.as_ref(),
        )
        .await?;

    let response = ComparisonResponse {
        default_choices: session.default_choices(),
        comparison: session.comparison().clone(),
    };
    Ok(ResponseJson(ApiResponse::success(response)))
}

/// POST /api/clients/{client_id}/measurements/sync
/// Resolve with the chosen strategy and append the result as a new snapshot
pub async fn sync_measurements(
    State(deployment): State<DeploymentImpl>,
    ctx: RequestContext,
    Path(client_id): Path<Uuid>,
    axum::Json(payload): axum::Json<SyncRequest>,
) -> Result<ResponseJson<ApiResponse<Measurement>>, ApiError> {
    let service = MeasurementSyncService::new(deployment.db().pool.clone());
    let mut session = service
        .load_session(
            ctx.organization_id,
            client_id,
            payload.tailor_measurements.as_ref(),
        )
        .await?;

    if let Err(e) = session.choose_strategy(payload.strategy) {
        warn!(client_id = %client_id, strategy = %payload.strategy, error = %e, "Measurement sync rejected");
        return Err(e.into());
    }
    // Explicit choices are the whole selection; without them the seeded defaults apply.
    if payload.strategy == SyncStrategy::Merge && !payload.merge_choices.is_empty() {
        session.replace_choices(&payload.merge_choices)?;
    }

    let unit = session.unit_or(payload.unit, deployment.config().default_unit);
    let snapshot = service
        .commit_session(&mut session, unit, ctx.user_id)
        .await?;

    deployment
        .track_if_analytics_allowed(
            "measurements_synced",
            serde_json::json!({
                "client_id": client_id.to_string(),
                "strategy": payload.strategy.to_string(),
                "differing_fields": session.comparison().differing_keys.len(),
            }),
        )
        .await;

    Ok(ResponseJson(ApiResponse::success(snapshot)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route(
            "/clients/{client_id}/measurements",
            get(list_measurements).post(create_measurement),
        )
        .route(
            "/clients/{client_id}/measurements/latest",
            get(get_latest_measurement),
        )
        .route(
            "/clients/{client_id}/measurements/compare",
            post(compare_measurements),
        )
        .route(
            "/clients/{client_id}/measurements/sync",
            post(sync_measurements),
        )
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use services::services::measurement_merge::MergeSource;

    use super::*;
    use crate::test_helpers::{seed_client, test_context, test_deployment};

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    fn sync_request(strategy: SyncStrategy, choices: MergeChoices) -> SyncRequest {
        SyncRequest {
            strategy,
            merge_choices: choices,
            unit: None,
            tailor_measurements: None,
        }
    }

    async fn record(
        deployment: &DeploymentImpl,
        ctx: RequestContext,
        client_id: Uuid,
        values: Value,
    ) -> Measurement {
        let ResponseJson(response) = create_measurement(
            State(deployment.clone()),
            ctx,
            Path(client_id),
            axum::Json(CreateMeasurementRequest {
                values: object(values),
                unit: None,
                notes: Some("Order intake".to_string()),
            }),
        )
        .await
        .unwrap();
        response.into_data().unwrap()
    }

    #[tokio::test]
    async fn test_create_measurement_normalizes_and_defaults_unit() {
        let deployment = test_deployment().await;
        let ctx = test_context();
        let client = seed_client(&deployment, &ctx, None).await;

        let snapshot = record(&deployment, ctx, client.id, json!({"chest": "36", "size": "L"})).await;

        assert_eq!(
            serde_json::to_value(&snapshot.values).unwrap(),
            json!({"chest": 36, "size": "L"})
        );
        assert_eq!(snapshot.unit, MeasurementUnit::Inches);
        assert_eq!(snapshot.created_by, ctx.user_id);
    }

    #[tokio::test]
    async fn test_create_measurement_rejects_composite_values() {
        let deployment = test_deployment().await;
        let ctx = test_context();
        let client = seed_client(&deployment, &ctx, None).await;

        let result = create_measurement(
            State(deployment),
            ctx,
            Path(client.id),
            axum::Json(CreateMeasurementRequest {
                values: object(json!({"chest": {"front": 19}})),
                unit: None,
                notes: None,
            }),
        )
        .await;
        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_compare_uses_latest_snapshot() {
        let deployment = test_deployment().await;
        let ctx = test_context();
        let client = seed_client(
            &deployment,
            &ctx,
            Some(json!({"chest": 40, "waist": 32, "hips": 44})),
        )
        .await;
        record(&deployment, ctx, client.id, json!({"chest": 38, "waist": 32})).await;

        let ResponseJson(response) = compare_measurements(
            State(deployment),
            ctx,
            Path(client.id),
            axum::Json(CompareRequest::default()),
        )
        .await
        .unwrap();
        let response = response.into_data().unwrap();

        assert_eq!(response.comparison.keys, vec!["chest", "hips", "waist"]);
        assert_eq!(response.comparison.differing_keys, vec!["chest", "hips"]);
        assert!(response.comparison.sync_available);
        assert_eq!(response.default_choices.get("hips"), Some(&MergeSource::Client));
    }

    #[tokio::test]
    async fn test_sync_merge_without_choices_uses_defaults() {
        let deployment = test_deployment().await;
        let ctx = test_context();
        let client = seed_client(
            &deployment,
            &ctx,
            Some(json!({"values": {"chest": 40, "waist": 32, "hips": 44}, "unit": "CM"})),
        )
        .await;
        record(&deployment, ctx, client.id, json!({"chest": 38, "waist": 32})).await;

        let ResponseJson(response) = sync_measurements(
            State(deployment.clone()),
            ctx,
            Path(client.id),
            axum::Json(sync_request(SyncStrategy::Merge, MergeChoices::new())),
        )
        .await
        .unwrap();
        let snapshot = response.into_data().unwrap();

        assert_eq!(
            serde_json::to_value(&snapshot.values).unwrap(),
            json!({"chest": 40, "hips": 44, "waist": 32})
        );
        assert_eq!(snapshot.unit, MeasurementUnit::Cm);
        assert_eq!(
            Measurement::count_for_client(&deployment.db().pool, client.id)
                .await
                .unwrap(),
            2
        );
    }

    #[tokio::test]
    async fn test_sync_merge_explicit_choices_replace_defaults() {
        let deployment = test_deployment().await;
        let ctx = test_context();
        let client = seed_client(
            &deployment,
            &ctx,
            Some(json!({"chest": 40, "waist": 32, "hips": 44})),
        )
        .await;

        let mut request = sync_request(
            SyncStrategy::Merge,
            MergeChoices::from([
                ("chest".to_string(), MergeSource::Tailor),
                ("waist".to_string(), MergeSource::Client),
            ]),
        );
        request.tailor_measurements = Some(json!({"chest": 38, "waist": 32}));

        let ResponseJson(response) =
            sync_measurements(State(deployment.clone()), ctx, Path(client.id), axum::Json(request))
                .await
                .unwrap();
        let snapshot = response.into_data().unwrap();

        assert_eq!(
            serde_json::to_value(&snapshot.values).unwrap(),
            json!({"chest": 38, "waist": 32})
        );
        assert_eq!(
            snapshot.notes.as_deref(),
            Some("Merged with client profile (strategy: merge)")
        );
    }

    #[tokio::test]
    async fn test_sync_merge_unknown_choice_is_rejected_without_writing() {
        let deployment = test_deployment().await;
        let ctx = test_context();
        let client = seed_client(&deployment, &ctx, Some(json!({"chest": 40}))).await;

        let result = sync_measurements(
            State(deployment.clone()),
            ctx,
            Path(client.id),
            axum::Json(sync_request(
                SyncStrategy::Merge,
                MergeChoices::from([("inseam".to_string(), MergeSource::Client)]),
            )),
        )
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.status_and_message().0, axum::http::StatusCode::BAD_REQUEST);
        assert_eq!(
            Measurement::count_for_client(&deployment.db().pool, client.id)
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_sync_use_tailor_is_rejected_without_writing() {
        let deployment = test_deployment().await;
        let ctx = test_context();
        let client = seed_client(&deployment, &ctx, Some(json!({"chest": 40}))).await;

        let result = sync_measurements(
            State(deployment.clone()),
            ctx,
            Path(client.id),
            axum::Json(sync_request(SyncStrategy::UseTailor, MergeChoices::new())),
        )
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.status_and_message().0, axum::http::StatusCode::BAD_REQUEST);
        assert_eq!(
            Measurement::count_for_client(&deployment.db().pool, client.id)
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_sync_unavailable_without_client_profile() {
        let deployment = test_deployment().await;
        let ctx = test_context();
        let client = seed_client(&deployment, &ctx, None).await;

        let result = sync_measurements(
            State(deployment),
            ctx,
            Path(client.id),
            axum::Json(sync_request(SyncStrategy::UseClient, MergeChoices::new())),
        )
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.status_and_message().0, axum::http::StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_repeated_sync_appends_each_time() {
        let deployment = test_deployment().await;
        let ctx = test_context();
        let client = seed_client(&deployment, &ctx, Some(json!({"chest": 40}))).await;

        let mut ids = Vec::new();
        for _ in 0..2 {
            let ResponseJson(response) = sync_measurements(
                State(deployment.clone()),
                ctx,
                Path(client.id),
                axum::Json(sync_request(SyncStrategy::UseClient, MergeChoices::new())),
            )
            .await
            .unwrap();
            ids.push(response.into_data().unwrap().id);
        }

        assert_ne!(ids[0], ids[1]);
        let ResponseJson(history) = list_measurements(State(deployment), ctx, Path(client.id))
            .await
            .unwrap();
        assert_eq!(history.into_data().unwrap().len(), 2);
    }
}
