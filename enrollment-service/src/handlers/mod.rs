//! HTTP handlers for the enrollment service.

pub mod batches;
pub mod bookings;
pub mod coupons;

use axum::{Json, http::StatusCode, response::IntoResponse};
use serde_json::json;

use crate::services;

pub async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "service": "enrollment-service",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

pub async fn metrics() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        services::get_metrics(),
    )
}
