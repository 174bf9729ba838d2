//! In-memory store used by the integration tests.
//!
//! Every operation takes the single write lock, which makes each trait
//! method exactly as atomic as the conditional updates of the Mongo
//! implementation.

use async_trait::async_trait;
use chrono::Utc;
use service_core::error::AppError;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{CancelTransition, EnrollmentStore, PaidTransition, SeatReservation};
use crate::models::{
    BatchFilter, BatchUpdate, Booking, BookingStatus, ClassBatch, Coupon, CouponUpdate,
    CouponUsage, Frequency, TeacherAvailability,
};

#[derive(Default)]
struct Inner {
    batches: HashMap<Uuid, ClassBatch>,
    bookings: HashMap<Uuid, Booking>,
    coupons: HashMap<Uuid, Coupon>,
    usages: Vec<CouponUsage>,
    availability: HashMap<Uuid, TeacherAvailability>,
}

#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn reserve_in(batch: Option<&mut ClassBatch>) -> SeatReservation {
    match batch {
        None => SeatReservation::BatchNotFound,
        Some(batch) if !batch.is_active => SeatReservation::BatchInactive,
        Some(batch) if batch.is_full() => SeatReservation::BatchFull,
        Some(batch) => {
            batch.current_students += 1;
            batch.updated_at = Utc::now();
            SeatReservation::Granted
        }
    }
}

fn release_in(batch: Option<&mut ClassBatch>) {
    if let Some(batch) = batch {
        if batch.current_students > 0 {
            batch.current_students -= 1;
            batch.updated_at = Utc::now();
        }
    }
}

#[async_trait]
impl EnrollmentStore for InMemoryStore {
    async fn insert_batch(&self, batch: ClassBatch) -> Result<(), AppError> {
        self.inner.write().await.batches.insert(batch.id, batch);
        Ok(())
    }

    async fn find_batch(&self, id: Uuid) -> Result<Option<ClassBatch>, AppError> {
        Ok(self.inner.read().await.batches.get(&id).cloned())
    }

    async fn list_batches(&self, filter: &BatchFilter) -> Result<Vec<ClassBatch>, AppError> {
        fn any_of(haystack: &[String], wanted: &Option<Vec<String>>) -> bool {
            match wanted {
                Some(wanted) => wanted.iter().any(|w| haystack.contains(w)),
                None => true,
            }
        }

        let inner = self.inner.read().await;
        let mut batches: Vec<ClassBatch> = inner
            .batches
            .values()
            .filter(|b| filter.teacher_id.map_or(true, |t| b.teacher_id == t))
            .filter(|b| filter.is_active.map_or(true, |a| b.is_active == a))
            .filter(|b| any_of(&b.subjects, &filter.subjects))
            .filter(|b| any_of(&b.boards, &filter.boards))
            .filter(|b| any_of(&b.classes, &filter.classes))
            .cloned()
            .collect();
        batches.sort_by_key(|b| b.batch_start_date);
        Ok(batches)
    }

    async fn update_batch(
        &self,
        id: Uuid,
        update: BatchUpdate,
    ) -> Result<Option<ClassBatch>, AppError> {
        let mut inner = self.inner.write().await;
        let Some(batch) = inner.batches.get_mut(&id) else {
            return Ok(None);
        };

        if let Some(maximum) = update.maximum_students {
            if maximum < batch.current_students {
                return Err(AppError::InvalidState(anyhow::anyhow!(
                    "maximumStudents cannot be below current enrollment"
                )));
            }
            batch.maximum_students = maximum;
        }
        if let Some(name) = update.name {
            batch.name = name;
        }
        if let Some(batch_info) = update.batch_info {
            batch.batch_info = batch_info;
        }
        if let Some(subjects) = update.subjects {
            batch.subjects = subjects;
        }
        if let Some(boards) = update.boards {
            batch.boards = boards;
        }
        if let Some(classes) = update.classes {
            batch.classes = classes;
        }
        if let Some(days) = update.days {
            batch.days = days;
        }
        if let Some(time) = update.time {
            batch.time = time;
        }
        if let Some(fees) = update.fees {
            batch.fees = fees;
        }
        if let Some(batch_start_date) = update.batch_start_date {
            batch.batch_start_date = batch_start_date;
        }
        if let Some(last_enrol_date) = update.last_enrol_date {
            batch.last_enrol_date = last_enrol_date;
        }
        if let Some(is_active) = update.is_active {
            batch.is_active = is_active;
        }
        batch.updated_at = Utc::now();
        Ok(Some(batch.clone()))
    }

    async fn deactivate_batch(&self, id: Uuid) -> Result<Option<ClassBatch>, AppError> {
        let mut inner = self.inner.write().await;
        let Some(batch) = inner.batches.get_mut(&id) else {
            return Ok(None);
        };
        batch.is_active = false;
        batch.updated_at = Utc::now();
        Ok(Some(batch.clone()))
    }

    async fn try_reserve_seat(&self, batch_id: Uuid) -> Result<SeatReservation, AppError> {
        let mut inner = self.inner.write().await;
        Ok(reserve_in(inner.batches.get_mut(&batch_id)))
    }

    async fn release_seat(&self, batch_id: Uuid) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        release_in(inner.batches.get_mut(&batch_id));
        Ok(())
    }

    async fn upsert_teacher_availability(
        &self,
        availability: TeacherAvailability,
    ) -> Result<(), AppError> {
        self.inner
            .write()
            .await
            .availability
            .insert(availability.teacher_id, availability);
        Ok(())
    }

    async fn get_teacher_availability(
        &self,
        teacher_id: Uuid,
    ) -> Result<Option<TeacherAvailability>, AppError> {
        Ok(self.inner.read().await.availability.get(&teacher_id).cloned())
    }

    async fn insert_booking(&self, booking: Booking) -> Result<(), AppError> {
        self.inner.write().await.bookings.insert(booking.id, booking);
        Ok(())
    }

    async fn find_booking(&self, id: Uuid) -> Result<Option<Booking>, AppError> {
        Ok(self.inner.read().await.bookings.get(&id).cloned())
    }

    async fn list_bookings(&self) -> Result<Vec<Booking>, AppError> {
        let inner = self.inner.read().await;
        let mut bookings: Vec<Booking> = inner.bookings.values().cloned().collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(bookings)
    }

    async fn set_booking_stage_two(
        &self,
        id: Uuid,
        frequency: Frequency,
        accept_tnc: bool,
    ) -> Result<Option<Booking>, AppError> {
        let mut inner = self.inner.write().await;
        let Some(booking) = inner.bookings.get_mut(&id) else {
            return Ok(None);
        };
        booking.frequency = frequency;
        booking.accept_tnc = accept_tnc;
        booking.updated_at = Utc::now();
        Ok(Some(booking.clone()))
    }

    async fn set_booking_payment(
        &self,
        id: Uuid,
        status: BookingStatus,
        payment_details: serde_json::Value,
    ) -> Result<Option<Booking>, AppError> {
        let mut inner = self.inner.write().await;
        let Some(booking) = inner.bookings.get_mut(&id) else {
            return Ok(None);
        };
        booking.status = status;
        booking.payment_details = payment_details;
        booking.updated_at = Utc::now();
        Ok(Some(booking.clone()))
    }

    async fn mark_booking_paid(
        &self,
        id: Uuid,
        payment_details: serde_json::Value,
    ) -> Result<PaidTransition, AppError> {
        let mut inner = self.inner.write().await;
        let Some(booking) = inner.bookings.get(&id) else {
            return Ok(PaidTransition::BookingNotFound);
        };
        if !booking.status.can_become_paid() {
            return Ok(PaidTransition::NotPayable(booking.status));
        }
        let batch_id = booking.batch_id;

        match reserve_in(inner.batches.get_mut(&batch_id)) {
            SeatReservation::BatchNotFound => return Ok(PaidTransition::BatchNotFound),
            SeatReservation::BatchInactive => return Ok(PaidTransition::BatchInactive),
            SeatReservation::BatchFull => return Ok(PaidTransition::BatchFull),
            SeatReservation::Granted => {}
        }

        let booking = inner
            .bookings
            .get_mut(&id)
            .expect("booking checked above while holding the write lock");
        booking.status = BookingStatus::Paid;
        booking.payment_details = payment_details;
        booking.updated_at = Utc::now();
        Ok(PaidTransition::Paid(booking.clone()))
    }

    async fn cancel_booking(&self, id: Uuid) -> Result<CancelTransition, AppError> {
        let mut inner = self.inner.write().await;
        let Some(booking) = inner.bookings.get_mut(&id) else {
            return Ok(CancelTransition::NotFound);
        };
        if booking.status == BookingStatus::Cancelled {
            return Ok(CancelTransition::AlreadyCancelled(booking.clone()));
        }
        let was_paid = booking.status == BookingStatus::Paid;
        booking.status = BookingStatus::Cancelled;
        booking.updated_at = Utc::now();
        let booking = booking.clone();
        let batch_id = booking.batch_id;

        if was_paid {
            release_in(inner.batches.get_mut(&batch_id));
        }
        Ok(CancelTransition::Cancelled {
            booking,
            seat_released: was_paid,
        })
    }

    async fn insert_coupon(&self, coupon: Coupon) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        if inner.coupons.values().any(|c| c.code == coupon.code) {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "A coupon with this code already exists"
            )));
        }
        inner.coupons.insert(coupon.id, coupon);
        Ok(())
    }

    async fn find_coupon(&self, id: Uuid) -> Result<Option<Coupon>, AppError> {
        Ok(self.inner.read().await.coupons.get(&id).cloned())
    }

    async fn find_coupon_by_code(&self, code: &str) -> Result<Option<Coupon>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner.coupons.values().find(|c| c.code == code).cloned())
    }

    async fn list_coupons(&self) -> Result<Vec<Coupon>, AppError> {
        let inner = self.inner.read().await;
        let mut coupons: Vec<Coupon> = inner.coupons.values().cloned().collect();
        coupons.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(coupons)
    }

    async fn update_coupon(
        &self,
        id: Uuid,
        update: CouponUpdate,
    ) -> Result<Option<Coupon>, AppError> {
        let mut inner = self.inner.write().await;
        let Some(coupon) = inner.coupons.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = update.name {
            coupon.name = name;
        }
        if let Some(description) = update.description {
            coupon.description = Some(description);
        }
        if let Some(discount_type) = update.discount_type {
            coupon.discount_type = discount_type;
        }
        if let Some(discount_value) = update.discount_value {
            coupon.discount_value = discount_value;
        }
        if let Some(max_discount_amount) = update.max_discount_amount {
            coupon.max_discount_amount = max_discount_amount;
        }
        if let Some(min_order_amount) = update.min_order_amount {
            coupon.min_order_amount = min_order_amount;
        }
        if let Some(start_date) = update.start_date {
            coupon.start_date = start_date;
        }
        if let Some(end_date) = update.end_date {
            coupon.end_date = end_date;
        }
        if let Some(is_active) = update.is_active {
            coupon.is_active = is_active;
        }
        if let Some(usage_limit) = update.usage_limit {
            coupon.usage_limit = usage_limit;
        }
        if let Some(per_user_limit) = update.per_user_limit {
            coupon.per_user_limit = per_user_limit;
        }
        if let Some(applies_to) = update.applies_to {
            coupon.applies_to = applies_to;
        }
        coupon.updated_at = Utc::now();
        Ok(Some(coupon.clone()))
    }

    async fn delete_coupon(&self, id: Uuid) -> Result<bool, AppError> {
        Ok(self.inner.write().await.coupons.remove(&id).is_some())
    }

    async fn count_user_redemptions(
        &self,
        coupon_id: Uuid,
        user_id: &str,
    ) -> Result<u64, AppError> {
        let inner = self.inner.read().await;
        Ok(inner
            .usages
            .iter()
            .filter(|u| u.coupon_id == coupon_id && u.user_id == user_id)
            .count() as u64)
    }

    async fn record_redemption(
        &self,
        coupon_id: Uuid,
        usage: CouponUsage,
    ) -> Result<bool, AppError> {
        let mut inner = self.inner.write().await;
        let Some(coupon) = inner.coupons.get_mut(&coupon_id) else {
            return Ok(false);
        };
        if coupon.usage_exhausted() {
            return Ok(false);
        }
        coupon.usage_count += 1;
        coupon.updated_at = Utc::now();
        inner.usages.push(usage);
        Ok(true)
    }
}
