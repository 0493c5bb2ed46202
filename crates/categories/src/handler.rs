use crate::service::{CategoryError, CategoryService};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use common::AppState;
use std::sync::Arc;
use serde_json::json;

impl IntoResponse for CategoryError {
    fn into_response(self) -> Response {
        let (status, msg) = match self {
            CategoryError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            CategoryError::NotFound => (StatusCode::NOT_FOUND, "Category not found".to_string()),
            CategoryError::Infrastructure(e) => {
                tracing::error!("Infrastructure error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": msg }))).into_response()
    }
}

pub fn categories_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_categories))
        .with_state(state)
}

async fn list_categories(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, CategoryError> {
    let categories = CategoryService::list_categories(&state.db).await?;
    Ok(Json(categories))
}
