//! Caller identity extracted from request headers.
//!
//! Authentication itself lives in the gateway; by the time a request reaches
//! this service the authenticated user id is carried in `X-User-ID`.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use service_core::error::AppError;

/// The authenticated caller, required on admin endpoints.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub user_id: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get("X-User-ID")
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                AppError::AuthError(anyhow::anyhow!("Missing X-User-ID header"))
            })?;

        let span = tracing::Span::current();
        span.record("user_id", user_id);

        Ok(RequestContext {
            user_id: user_id.to_string(),
        })
    }
}
