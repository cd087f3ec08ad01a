//! Record push/pull handlers. Both run behind the auth middleware.

use crate::auth::User;
use crate::error::ServerError;
use crate::server::AppState;
use axum::extract::State;
use axum::{Extension, Json};
use passkeep_core::sync::models::{AddRecordsRequest, AddRecordsResponse, AllRecordsResponse};
use passkeep_core::Record;

/// Merge the caller's records into their partition.
///
/// The whole batch is decoded before anything is stored, so one malformed
/// record rejects the request without side effects.
pub async fn add_records(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(req): Json<AddRecordsRequest>,
) -> Result<Json<AddRecordsResponse>, ServerError> {
    let records = req
        .records
        .into_iter()
        .map(Record::from_wire)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ServerError::InvalidArgument(e.to_string()))?;

    let summary = state.records.add_records(&user.login, records).await?;
    Ok(Json(AddRecordsResponse {
        accepted: summary.accepted,
        stale: summary.stale,
    }))
}

/// Every record in the caller's partition.
pub async fn all_records(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<AllRecordsResponse>, ServerError> {
    let records = state.records.all_records(&user.login).await?;
    Ok(Json(AllRecordsResponse {
        records: records.iter().map(Record::to_wire).collect(),
    }))
}
