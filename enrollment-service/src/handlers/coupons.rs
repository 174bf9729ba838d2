//! Coupon handlers: validation and redemption for checkout, plus the admin
//! CRUD surface.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde_json::json;
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::{
    AppState,
    dtos::{
        ApiEnvelope,
        coupons::{
            ApplyCouponRequest, CouponQuoteResponse, CouponResponse, CreateCouponRequest,
            UpdateCouponRequest, ValidateCouponRequest,
        },
    },
    middleware::RequestContext,
    models::CouponUpdate,
};

/// Price preview: checks the coupon against the order and quotes the
/// discount. Never consumes a redemption.
pub async fn validate_coupon(
    State(state): State<AppState>,
    Json(payload): Json<ValidateCouponRequest>,
) -> Result<Json<ApiEnvelope<CouponQuoteResponse>>, AppError> {
    payload.validate()?;

    let quote = state
        .coupons
        .validate(
            &payload.coupon_code,
            &payload.user_id,
            payload.order_amount,
            &payload.criteria(),
        )
        .await?;

    Ok(Json(ApiEnvelope::data(CouponQuoteResponse::from(quote))))
}

/// Confirms a redemption once the order is finalized.
pub async fn apply_coupon(
    State(state): State<AppState>,
    Json(payload): Json<ApplyCouponRequest>,
) -> Result<Json<ApiEnvelope<()>>, AppError> {
    payload.validate()?;

    state
        .coupons
        .apply(&payload.coupon_code, &payload.user_id, &payload.order_id)
        .await?;

    Ok(Json(ApiEnvelope::message(
        "Coupon applied and recorded successfully",
    )))
}

pub async fn create_coupon(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(payload): Json<CreateCouponRequest>,
) -> Result<(StatusCode, Json<ApiEnvelope<CouponResponse>>), AppError> {
    payload.validate()?;
    if payload.start_date > payload.end_date {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "End date must be after start date"
        )));
    }

    let coupon = payload.into_coupon(ctx.user_id);
    state.store.insert_coupon(coupon.clone()).await?;

    tracing::info!(code = %coupon.code, created_by = %coupon.created_by, "Coupon created");
    Ok((
        StatusCode::CREATED,
        Json(ApiEnvelope::with_message(
            "Coupon created successfully",
            CouponResponse::from(coupon),
        )),
    ))
}

pub async fn list_coupons(
    State(state): State<AppState>,
) -> Result<Json<ApiEnvelope<Vec<CouponResponse>>>, AppError> {
    let coupons = state.store.list_coupons().await?;
    let coupons: Vec<CouponResponse> = coupons.into_iter().map(CouponResponse::from).collect();
    Ok(Json(ApiEnvelope::list(coupons)))
}

pub async fn get_coupon(
    State(state): State<AppState>,
    Path(coupon_id): Path<Uuid>,
) -> Result<Json<ApiEnvelope<CouponResponse>>, AppError> {
    let coupon = state
        .store
        .find_coupon(coupon_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Coupon not found")))?;
    Ok(Json(ApiEnvelope::data(CouponResponse::from(coupon))))
}

pub async fn update_coupon(
    State(state): State<AppState>,
    Path(coupon_id): Path<Uuid>,
    Json(payload): Json<UpdateCouponRequest>,
) -> Result<Json<ApiEnvelope<CouponResponse>>, AppError> {
    payload.validate()?;
    if let (Some(start), Some(end)) = (payload.start_date, payload.end_date) {
        if start > end {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "End date must be after start date"
            )));
        }
    }

    let coupon = state
        .store
        .update_coupon(coupon_id, payload.into_update())
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Coupon not found")))?;

    Ok(Json(ApiEnvelope::with_message(
        "Coupon updated successfully",
        CouponResponse::from(coupon),
    )))
}

pub async fn delete_coupon(
    State(state): State<AppState>,
    Path(coupon_id): Path<Uuid>,
) -> Result<Json<ApiEnvelope<()>>, AppError> {
    if !state.store.delete_coupon(coupon_id).await? {
        return Err(AppError::NotFound(anyhow::anyhow!("Coupon not found")));
    }
    Ok(Json(ApiEnvelope::message("Coupon deleted successfully")))
}

/// Flip the active flag without touching the rest of the coupon.
pub async fn toggle_coupon(
    State(state): State<AppState>,
    Path(coupon_id): Path<Uuid>,
) -> Result<Json<ApiEnvelope<serde_json::Value>>, AppError> {
    let coupon = state
        .store
        .find_coupon(coupon_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Coupon not found")))?;

    let update = CouponUpdate {
        is_active: Some(!coupon.is_active),
        ..Default::default()
    };
    let coupon = state
        .store
        .update_coupon(coupon_id, update)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Coupon not found")))?;

    let message = if coupon.is_active {
        "Coupon activated successfully"
    } else {
        "Coupon deactivated successfully"
    };
    Ok(Json(ApiEnvelope::with_message(
        message,
        json!({ "isActive": coupon.is_active }),
    )))
}
