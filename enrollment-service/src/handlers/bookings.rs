//! Booking lifecycle handlers: staged creation, payment confirmation, and
//! cancellation with seat reconciliation.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::{
    AppState,
    dtos::{
        ApiEnvelope,
        bookings::{BookingResponse, CreateBookingRequest, StageThreeRequest, StageTwoRequest},
    },
};

/// Stage one: record the booking intent against a bookable batch. No seat
/// is held yet.
pub async fn create_booking(
    State(state): State<AppState>,
    Json(payload): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<ApiEnvelope<BookingResponse>>), AppError> {
    payload.validate()?;

    let booking = state
        .enrollment
        .create_booking(payload.into_new_booking())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiEnvelope::data(BookingResponse::from(booking))),
    ))
}

/// Stage two: payment frequency and terms acceptance.
pub async fn stage_two(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    Json(payload): Json<StageTwoRequest>,
) -> Result<Json<ApiEnvelope<BookingResponse>>, AppError> {
    let booking = state
        .enrollment
        .stage_two(booking_id, payload.frequency, payload.accept_tnc)
        .await?;

    Ok(Json(ApiEnvelope::data(BookingResponse::from(booking))))
}

/// Stage three: payment confirmation. A `paid` status claims a seat
/// atomically and fails the whole transition when the batch is full or
/// inactive.
pub async fn stage_three(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    Json(payload): Json<StageThreeRequest>,
) -> Result<Json<ApiEnvelope<BookingResponse>>, AppError> {
    let booking = state
        .enrollment
        .stage_three(booking_id, payload.payment_details, payload.status)
        .await?;

    Ok(Json(ApiEnvelope::data(BookingResponse::from(booking))))
}

pub async fn list_bookings(
    State(state): State<AppState>,
) -> Result<Json<ApiEnvelope<Vec<BookingResponse>>>, AppError> {
    let bookings = state.enrollment.list().await?;
    let bookings: Vec<BookingResponse> = bookings.into_iter().map(BookingResponse::from).collect();
    Ok(Json(ApiEnvelope::list(bookings)))
}

pub async fn get_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<ApiEnvelope<BookingResponse>>, AppError> {
    let booking = state.enrollment.get(booking_id).await?;
    Ok(Json(ApiEnvelope::data(BookingResponse::from(booking))))
}

/// Cancel a booking. The cancelled state is stored (not deleted) and the
/// seat of a paid booking is released exactly once.
pub async fn cancel_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<ApiEnvelope<BookingResponse>>, AppError> {
    let (booking, _seat_released) = state.enrollment.cancel(booking_id).await?;

    Ok(Json(ApiEnvelope::with_message(
        "Booking cancelled successfully",
        BookingResponse::from(booking),
    )))
}
