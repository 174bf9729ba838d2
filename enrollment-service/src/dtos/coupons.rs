//! Wire DTOs for coupon validation, redemption, and admin CRUD.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{AppliesTo, Coupon, CouponCriteria, CouponUpdate, DiscountType};
use crate::services::coupon_engine::{CouponQuote, normalize_code};

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ValidateCouponRequest {
    #[validate(length(min = 1, message = "Coupon code is required"))]
    pub coupon_code: String,
    #[validate(length(min = 1, message = "User ID is required"))]
    pub user_id: String,
    #[validate(range(min = 0.01, message = "Valid order amount is required"))]
    pub order_amount: f64,
    pub subject: Option<String>,
    pub board: Option<String>,
    pub class_id: Option<String>,
    pub teacher: Option<String>,
    pub batch: Option<String>,
}

impl ValidateCouponRequest {
    pub fn criteria(&self) -> CouponCriteria {
        CouponCriteria {
            subject: self.subject.clone(),
            board: self.board.clone(),
            class: self.class_id.clone(),
            teacher: self.teacher.clone(),
            batch: self.batch.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ApplyCouponRequest {
    #[validate(length(min = 1, message = "Coupon code is required"))]
    pub coupon_code: String,
    #[validate(length(min = 1, message = "User ID is required"))]
    pub user_id: String,
    #[validate(length(min = 1, message = "Order ID is required"))]
    pub order_id: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCouponRequest {
    #[validate(length(min = 1, message = "Coupon code is required"))]
    pub code: String,
    #[validate(length(min = 1, message = "Coupon name is required"))]
    pub name: String,
    pub description: Option<String>,
    pub discount_type: DiscountType,
    #[validate(range(min = 0.0, message = "Discount value must not be negative"))]
    pub discount_value: f64,
    pub max_discount_amount: Option<f64>,
    #[serde(default)]
    #[validate(range(min = 0.0, message = "Minimum order amount must not be negative"))]
    pub min_order_amount: f64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub usage_limit: Option<u32>,
    pub per_user_limit: Option<u32>,
    #[serde(default)]
    pub applies_to: AppliesTo,
}

impl CreateCouponRequest {
    pub fn into_coupon(self, created_by: String) -> Coupon {
        let now = Utc::now();
        Coupon {
            id: Uuid::new_v4(),
            code: normalize_code(&self.code),
            name: self.name,
            description: self.description,
            discount_type: self.discount_type,
            discount_value: self.discount_value,
            max_discount_amount: self.max_discount_amount,
            min_order_amount: self.min_order_amount,
            start_date: self.start_date,
            end_date: self.end_date,
            is_active: self.is_active,
            usage_limit: self.usage_limit,
            usage_count: 0,
            per_user_limit: self.per_user_limit,
            applies_to: self.applies_to,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCouponRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub discount_type: Option<DiscountType>,
    #[validate(range(min = 0.0, message = "Discount value must not be negative"))]
    pub discount_value: Option<f64>,
    pub max_discount_amount: Option<f64>,
    #[validate(range(min = 0.0, message = "Minimum order amount must not be negative"))]
    pub min_order_amount: Option<f64>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
    pub usage_limit: Option<u32>,
    pub per_user_limit: Option<u32>,
    pub applies_to: Option<AppliesTo>,
}

impl UpdateCouponRequest {
    pub fn into_update(self) -> CouponUpdate {
        CouponUpdate {
            name: self.name,
            description: self.description,
            discount_type: self.discount_type,
            discount_value: self.discount_value,
            max_discount_amount: self.max_discount_amount.map(Some),
            min_order_amount: self.min_order_amount,
            start_date: self.start_date,
            end_date: self.end_date,
            is_active: self.is_active,
            usage_limit: self.usage_limit.map(Some),
            per_user_limit: self.per_user_limit.map(Some),
            applies_to: self.applies_to,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponResponse {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub discount_type: DiscountType,
    pub discount_value: f64,
    pub max_discount_amount: Option<f64>,
    pub min_order_amount: f64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub is_active: bool,
    pub usage_limit: Option<u32>,
    pub usage_count: u32,
    pub per_user_limit: Option<u32>,
    pub applies_to: AppliesTo,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Coupon> for CouponResponse {
    fn from(coupon: Coupon) -> Self {
        Self {
            id: coupon.id,
            code: coupon.code,
            name: coupon.name,
            description: coupon.description,
            discount_type: coupon.discount_type,
            discount_value: coupon.discount_value,
            max_discount_amount: coupon.max_discount_amount,
            min_order_amount: coupon.min_order_amount,
            start_date: coupon.start_date,
            end_date: coupon.end_date,
            is_active: coupon.is_active,
            usage_limit: coupon.usage_limit,
            usage_count: coupon.usage_count,
            per_user_limit: coupon.per_user_limit,
            applies_to: coupon.applies_to,
            created_by: coupon.created_by,
            created_at: coupon.created_at,
            updated_at: coupon.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponQuoteResponse {
    pub code: String,
    pub name: String,
    pub discount_type: DiscountType,
    pub discount_value: f64,
    pub discount_amount: f64,
    pub final_amount: f64,
}

impl From<CouponQuote> for CouponQuoteResponse {
    fn from(quote: CouponQuote) -> Self {
        Self {
            code: quote.code,
            name: quote.name,
            discount_type: quote.discount_type,
            discount_value: quote.discount_value,
            discount_amount: quote.discount_amount,
            final_amount: quote.final_amount,
        }
    }
}
