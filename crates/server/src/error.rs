use axum::{
    http::StatusCode,
    response::{IntoResponse, Json as ResponseJson, Response},
};
use services::services::measurement_sync::MeasurementSyncError;
use thiserror::Error;
use tracing::error;
use utils::response::ApiResponse;

pub const SYNC_FAILED_MESSAGE: &str = "Measurement sync failed, please try again";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    MeasurementSync(#[from] MeasurementSyncError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl ApiError {
    /// Status and user-facing message. Storage errors never leak their text.
    pub fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            ApiError::MeasurementSync(err) => match err {
                MeasurementSyncError::Database(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, SYNC_FAILED_MESSAGE.to_string())
                }
                MeasurementSyncError::ClientNotFound => {
                    (StatusCode::NOT_FOUND, "Client not found".to_string())
                }
                MeasurementSyncError::SyncUnavailable | MeasurementSyncError::AlreadyCommitted => {
                    (StatusCode::CONFLICT, err.to_string())
                }
                MeasurementSyncError::NoOpStrategy
                | MeasurementSyncError::StrategyNotChosen
                | MeasurementSyncError::NotMerging
                | MeasurementSyncError::UnknownField(_) => (StatusCode::BAD_REQUEST, err.to_string()),
            },
            ApiError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error".to_string(),
            ),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }
        (status, ResponseJson(ApiResponse::<()>::error(&message))).into_response()
    }
}
