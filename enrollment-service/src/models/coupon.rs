//! Coupon model - promotional codes with eligibility rules and usage limits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountType {
    Percentage,
    Flat,
}

/// Restriction sets matched against an order. An empty set imposes no
/// restriction; each populated set is an independent AND-filter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppliesTo {
    #[serde(default)]
    pub subjects: Vec<String>,
    #[serde(default)]
    pub boards: Vec<String>,
    #[serde(default)]
    pub classes: Vec<String>,
    #[serde(default)]
    pub teachers: Vec<String>,
    #[serde(default)]
    pub batches: Vec<String>,
}

/// The order attributes a coupon's restrictions are matched against.
#[derive(Debug, Clone, Default)]
pub struct CouponCriteria {
    pub subject: Option<String>,
    pub board: Option<String>,
    pub class: Option<String>,
    pub teacher: Option<String>,
    pub batch: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coupon {
    #[serde(rename = "_id")]
    pub id: Uuid,
    /// Unique, stored uppercase; lookups normalize the same way.
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
    /// `None` means unlimited redemptions.
    pub usage_limit: Option<u32>,
    /// Monotonic; incremented only by a confirmed apply, never decremented.
    pub usage_count: u32,
    pub per_user_limit: Option<u32>,
    pub applies_to: AppliesTo,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Coupon {
    /// Active and within its validity window at `now`.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.is_active && now >= self.start_date && now <= self.end_date
    }

    pub fn usage_exhausted(&self) -> bool {
        match self.usage_limit {
            Some(limit) => self.usage_count >= limit,
            None => false,
        }
    }

    /// Discount for `order_amount`: PERCENTAGE is capped at
    /// `max_discount_amount` when set; the result never goes below zero or
    /// above the order total.
    pub fn calculate_discount(&self, order_amount: f64) -> f64 {
        let discount = match self.discount_type {
            DiscountType::Percentage => {
                let raw = order_amount * self.discount_value / 100.0;
                match self.max_discount_amount {
                    Some(cap) => raw.min(cap),
                    None => raw,
                }
            }
            DiscountType::Flat => self.discount_value,
        };
        discount.max(0.0).min(order_amount)
    }

    /// Every populated restriction set must contain the matching criterion.
    /// A missing criterion fails any populated set.
    pub fn applies_to_order(&self, criteria: &CouponCriteria) -> bool {
        fn matches(set: &[String], value: &Option<String>) -> bool {
            if set.is_empty() {
                return true;
            }
            match value {
                Some(v) => set.iter().any(|s| s == v),
                None => false,
            }
        }

        matches(&self.applies_to.subjects, &criteria.subject)
            && matches(&self.applies_to.boards, &criteria.board)
            && matches(&self.applies_to.classes, &criteria.class)
            && matches(&self.applies_to.teachers, &criteria.teacher)
            && matches(&self.applies_to.batches, &criteria.batch)
    }
}

/// One redemption record per (coupon, user, order); insert-only, counted to
/// enforce `per_user_limit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouponUsage {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub coupon_id: Uuid,
    pub user_id: String,
    pub order_id: String,
    pub used_at: DateTime<Utc>,
}

/// Partial admin update; `None` leaves the field unchanged. The code itself
/// is immutable after creation.
#[derive(Debug, Clone, Default)]
pub struct CouponUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub discount_type: Option<DiscountType>,
    pub discount_value: Option<f64>,
    pub max_discount_amount: Option<Option<f64>>,
    pub min_order_amount: Option<f64>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
    pub usage_limit: Option<Option<u32>>,
    pub per_user_limit: Option<Option<u32>>,
    pub applies_to: Option<AppliesTo>,
}
