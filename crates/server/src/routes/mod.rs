use axum::{Router, response::Json as ResponseJson, routing::get};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utils::response::ApiResponse;

use crate::DeploymentImpl;

pub mod clients;
pub mod measurements;

pub async fn health_check() -> ResponseJson<ApiResponse<String>> {
    ResponseJson(ApiResponse::success("OK".to_string()))
}

pub fn router(deployment: DeploymentImpl) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .merge(clients::router(&deployment))
        .merge(measurements::router(&deployment));

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(deployment)
}
