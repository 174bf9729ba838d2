//! Coupon validation and redemption.
//!
//! `validate` is side-effect free so price previews never consume a
//! redemption; only `apply` mutates state, through the store's conditional
//! usage-count increment.

use chrono::Utc;
use service_core::error::AppError;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Coupon, CouponCriteria, CouponUsage, DiscountType};
use crate::services::metrics;
use crate::services::store::EnrollmentStore;

#[derive(Debug, Error)]
pub enum CouponRejection {
    #[error("Coupon not found")]
    NotFound,
    #[error("This coupon is no longer valid")]
    NotLive,
    #[error("This coupon has reached its maximum usage limit")]
    UsageLimitReached,
    #[error("You've already used this coupon the maximum number of times allowed")]
    PerUserLimitReached,
    #[error("Order amount is below the minimum required for this coupon")]
    OrderTooSmall,
    #[error("This coupon cannot be applied to your order")]
    NotApplicable,
    #[error(transparent)]
    Store(#[from] AppError),
}

impl From<CouponRejection> for AppError {
    fn from(err: CouponRejection) -> Self {
        match err {
            CouponRejection::NotFound => AppError::NotFound(anyhow::anyhow!("{err}")),
            CouponRejection::Store(inner) => inner,
            other => AppError::InvalidState(anyhow::anyhow!("{other}")),
        }
    }
}

/// A successful validation: the priced discount for the order.
#[derive(Debug, Clone)]
pub struct CouponQuote {
    pub code: String,
    pub name: String,
    pub discount_type: DiscountType,
    pub discount_value: f64,
    pub discount_amount: f64,
    pub final_amount: f64,
}

/// Codes are stored uppercase; lookups normalize the same way, which makes
/// them case-insensitive.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

#[derive(Clone)]
pub struct CouponEngine {
    store: Arc<dyn EnrollmentStore>,
}

impl CouponEngine {
    pub fn new(store: Arc<dyn EnrollmentStore>) -> Self {
        Self { store }
    }

    async fn fetch(&self, code: &str) -> Result<Coupon, CouponRejection> {
        self.store
            .find_coupon_by_code(&normalize_code(code))
            .await?
            .ok_or(CouponRejection::NotFound)
    }

    /// Checks run in a fixed order and short-circuit on the first failure:
    /// existence, validity window, global usage cap, per-user cap, minimum
    /// order amount, applicability filters.
    pub async fn validate(
        &self,
        code: &str,
        user_id: &str,
        order_amount: f64,
        criteria: &CouponCriteria,
    ) -> Result<CouponQuote, CouponRejection> {
        let coupon = self.fetch(code).await?;

        if !coupon.is_live(Utc::now()) {
            return Err(CouponRejection::NotLive);
        }
        if coupon.usage_exhausted() {
            return Err(CouponRejection::UsageLimitReached);
        }
        if let Some(per_user_limit) = coupon.per_user_limit {
            let used = self
                .store
                .count_user_redemptions(coupon.id, user_id)
                .await?;
            if used >= u64::from(per_user_limit) {
                return Err(CouponRejection::PerUserLimitReached);
            }
        }
        if order_amount < coupon.min_order_amount {
            return Err(CouponRejection::OrderTooSmall);
        }
        if !coupon.applies_to_order(criteria) {
            return Err(CouponRejection::NotApplicable);
        }

        let discount_amount = coupon.calculate_discount(order_amount);
        Ok(CouponQuote {
            code: coupon.code,
            name: coupon.name,
            discount_type: coupon.discount_type,
            discount_value: coupon.discount_value,
            discount_amount,
            final_amount: order_amount - discount_amount,
        })
    }

    /// Confirms a redemption for an order. The usage-count increment is
    /// conditional on the usage limit, so concurrent applies of a nearly
    /// exhausted coupon cannot overshoot it.
    pub async fn apply(
        &self,
        code: &str,
        user_id: &str,
        order_id: &str,
    ) -> Result<(), CouponRejection> {
        let coupon = self.fetch(code).await?;

        let usage = CouponUsage {
            id: Uuid::new_v4(),
            coupon_id: coupon.id,
            user_id: user_id.to_string(),
            order_id: order_id.to_string(),
            used_at: Utc::now(),
        };
        if self.store.record_redemption(coupon.id, usage).await? {
            metrics::record_redemption("applied");
            tracing::info!(code = %coupon.code, %user_id, %order_id, "Coupon redeemed");
            Ok(())
        } else {
            metrics::record_redemption("limit_reached");
            Err(CouponRejection::UsageLimitReached)
        }
    }
}
