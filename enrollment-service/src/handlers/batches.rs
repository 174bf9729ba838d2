//! Class batch CRUD.
//!
//! Batches are soft-deactivated, never hard-deleted, and every mutation
//! kicks off a best-effort refresh of the owning teacher's availability
//! view.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::{
    AppState,
    dtos::{
        ApiEnvelope,
        batches::{BatchQuery, BatchResponse, CreateBatchRequest, UpdateBatchRequest},
    },
    models::BatchFilter,
    services::availability,
};

pub async fn create_batch(
    State(state): State<AppState>,
    Json(payload): Json<CreateBatchRequest>,
) -> Result<(StatusCode, Json<ApiEnvelope<BatchResponse>>), AppError> {
    payload.validate()?;

    let batch = payload.into_batch();
    state.store.insert_batch(batch.clone()).await?;

    tracing::info!(batch_id = %batch.id, teacher_id = %batch.teacher_id, "Class batch created");
    availability::spawn_refresh(state.store.clone(), batch.teacher_id);

    Ok((
        StatusCode::CREATED,
        Json(ApiEnvelope::data(BatchResponse::from(batch))),
    ))
}

pub async fn list_batches(
    State(state): State<AppState>,
    Query(query): Query<BatchQuery>,
) -> Result<Json<ApiEnvelope<Vec<BatchResponse>>>, AppError> {
    let batches = state.store.list_batches(&query.into_filter()).await?;
    let batches: Vec<BatchResponse> = batches.into_iter().map(BatchResponse::from).collect();
    Ok(Json(ApiEnvelope::list(batches)))
}

pub async fn get_batch(
    State(state): State<AppState>,
    Path(batch_id): Path<Uuid>,
) -> Result<Json<ApiEnvelope<BatchResponse>>, AppError> {
    let batch = state
        .store
        .find_batch(batch_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Class batch not found")))?;
    Ok(Json(ApiEnvelope::data(BatchResponse::from(batch))))
}

pub async fn update_batch(
    State(state): State<AppState>,
    Path(batch_id): Path<Uuid>,
    Json(payload): Json<UpdateBatchRequest>,
) -> Result<Json<ApiEnvelope<BatchResponse>>, AppError> {
    payload.validate()?;

    let batch = state
        .store
        .update_batch(batch_id, payload.into_update())
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Class batch not found")))?;

    availability::spawn_refresh(state.store.clone(), batch.teacher_id);

    Ok(Json(ApiEnvelope::data(BatchResponse::from(batch))))
}

/// Soft delete: the batch is deactivated so existing paid bookings keep a
/// consistent history.
pub async fn deactivate_batch(
    State(state): State<AppState>,
    Path(batch_id): Path<Uuid>,
) -> Result<Json<ApiEnvelope<BatchResponse>>, AppError> {
    let batch = state
        .store
        .deactivate_batch(batch_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Class batch not found")))?;

    tracing::info!(batch_id = %batch.id, "Class batch deactivated");
    availability::spawn_refresh(state.store.clone(), batch.teacher_id);

    Ok(Json(ApiEnvelope::with_message(
        "Class batch deactivated successfully",
        BatchResponse::from(batch),
    )))
}

/// A teacher's batches with their current enrollment counts.
pub async fn teacher_batches(
    State(state): State<AppState>,
    Path(teacher_id): Path<Uuid>,
) -> Result<Json<ApiEnvelope<Vec<BatchResponse>>>, AppError> {
    let filter = BatchFilter {
        teacher_id: Some(teacher_id),
        ..Default::default()
    };
    let batches = state.store.list_batches(&filter).await?;
    let batches: Vec<BatchResponse> = batches.into_iter().map(BatchResponse::from).collect();
    Ok(Json(ApiEnvelope::list(batches)))
}
