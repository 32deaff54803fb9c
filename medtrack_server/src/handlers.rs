//! Endpoint handlers. Each one resolves the caller's partition and runs one
//! key-value operation against it.
//!
//! - `GET    /api/data`
//! - `POST   /api/medications`
//! - `DELETE /api/medication/:id`
//! - `POST   /api/entry`, `PUT /api/entry`, `DELETE /api/entry`

use axum::extract::{Path, State};
use axum::Json;
use medtrack_core::{
    ClearDoseRequest, EntryResponse, KvStore, MedicationsResponse, RecordDoseRequest,
    SaveMedicationsRequest, SuccessResponse, UpdateDoseRequest, UserData, UserPartition,
};
use serde::Serialize;
use serde_json::Value;

use crate::error::ApiError;
use crate::extract::{ApiJson, UserId};
use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Run one partition operation on the blocking pool. Store backends do
/// synchronous file IO (locks, fsync, rename).
async fn with_partition<T, F>(state: AppState, user_id: String, op: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&UserPartition<'_, dyn KvStore>) -> medtrack_core::Result<T> + Send + 'static,
{
    let result = tokio::task::spawn_blocking(move || {
        let partition = UserPartition::new(state.store.as_ref(), &user_id);
        op(&partition)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("store task failed: {}", e)))?;
    Ok(result?)
}

/// `GET /api/health`
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `GET /api/data`: medications as last saved and every stored day
pub async fn get_data(
    State(state): State<AppState>,
    UserId(user_id): UserId,
) -> Result<Json<UserData<Value>>, ApiError> {
    let data = with_partition(state, user_id, |p| p.load_stored()).await?;
    Ok(Json(data))
}

/// `POST /api/medications`: replace the list, stored exactly as sent
pub async fn save_medications(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    ApiJson(body): ApiJson<SaveMedicationsRequest<Value>>,
) -> Result<Json<MedicationsResponse<Value>>, ApiError> {
    let medications = with_partition(state, user_id, move |p| {
        p.save_medications_json(&body.medications)?;
        Ok(body.medications)
    })
    .await?;
    Ok(Json(MedicationsResponse {
        success: true,
        medications,
    }))
}

/// `DELETE /api/medication/:id`: history is left in place
pub async fn delete_medication(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(medication_id): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    with_partition(state, user_id, move |p| p.delete_medication(&medication_id)).await?;
    Ok(Json(SuccessResponse { success: true }))
}

/// `POST /api/entry`: upsert a dose
pub async fn record_dose(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    ApiJson(body): ApiJson<RecordDoseRequest>,
) -> Result<Json<EntryResponse>, ApiError> {
    let entry = with_partition(state, user_id, move |p| p.record_dose(&body)).await?;
    Ok(Json(EntryResponse {
        success: true,
        entry,
    }))
}

/// `PUT /api/entry`: retime an existing dose, 404 if there is none
pub async fn update_dose(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    ApiJson(body): ApiJson<UpdateDoseRequest>,
) -> Result<Json<EntryResponse>, ApiError> {
    let entry = with_partition(state, user_id, move |p| p.update_dose(&body)).await?;
    Ok(Json(EntryResponse {
        success: true,
        entry,
    }))
}

/// `DELETE /api/entry`: clear a dose slot
pub async fn clear_dose(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    ApiJson(body): ApiJson<ClearDoseRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    with_partition(state, user_id, move |p| p.clear_dose(&body)).await?;
    Ok(Json(SuccessResponse { success: true }))
}

/// JSON 404 for unknown routes
pub async fn not_found() -> ApiError {
    ApiError::NotFound("no such endpoint".into())
}
