use crate::import::ImportService;
use crate::models::RawCreateTransactionRequest;
use crate::service::{TransactionError, TransactionService};
use crate::upload::UploadStore;
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use common::AppState;
use std::sync::Arc;
use serde_json::json;
use uuid::Uuid;

/// Name of the multipart form field carrying the CSV file.
pub const UPLOAD_FIELD: &str = "file";

impl IntoResponse for TransactionError {
    fn into_response(self) -> Response {
        let (status, msg) = match self {
            TransactionError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            TransactionError::InsufficientBalance => (StatusCode::BAD_REQUEST, "Insufficient balance".to_string()),
            TransactionError::Import(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            TransactionError::Infrastructure(e) => {
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

pub fn transactions_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        // Specific routes first
        .route("/", get(list_transactions).post(create_transaction))
        .route("/import", post(import_transactions))
        // Then parameterized routes
        .route("/{id}", delete(delete_transaction))
        .with_state(state)
}

async fn list_transactions(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, TransactionError> {
    let response = TransactionService::list_transactions(&state.db).await?;
    Ok(Json(response))
}

async fn create_transaction(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RawCreateTransactionRequest>,
) -> Result<impl IntoResponse, TransactionError> {
    let transaction = TransactionService::create_transaction(
        &state.db,
        payload.title,
        payload.value,
        payload.kind,
        payload.category,
    ).await?;

    Ok((StatusCode::CREATED, Json(transaction)))
}

async fn delete_transaction(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, TransactionError> {
    TransactionService::delete_transaction(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn import_transactions(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, TransactionError> {
    let uploads = UploadStore::new(&state.config.upload_dir);
    let mut stored = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        TransactionError::InvalidInput(format!("Invalid multipart body: {e}"))
    })? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let file_name = field.file_name().map(str::to_owned);
        let data = field.bytes().await.map_err(|e| {
            TransactionError::InvalidInput(format!("Could not read uploaded file: {e}"))
        })?;

        let path = uploads.save(file_name.as_deref(), &data).await.map_err(|e| {
            tracing::error!("Could not store upload in {}: {}", uploads.dir().display(), e);
            TransactionError::Import("Could not store uploaded file".to_string())
        })?;
        stored = Some(path);
        break;
    }

    let path = stored.ok_or_else(|| {
        TransactionError::InvalidInput(format!("Missing \"{UPLOAD_FIELD}\" file field"))
    })?;

    let transactions =
        ImportService::import_file(&state.db, &path, &state.config.failed_import_dir()).await?;

    Ok((StatusCode::CREATED, Json(transactions)))
}
