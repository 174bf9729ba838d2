//! Persistence surface for the enrollment domain.
//!
//! The trait deliberately exposes conditional, atomic operations for the two
//! genuinely shared counters (batch seats, coupon redemptions) instead of
//! generic read/write primitives, so no caller can reintroduce a
//! read-modify-write race. `MongoStore` is the production implementation;
//! `InMemoryStore` backs the integration tests with identical semantics.

mod memory;
mod mongo;

pub use memory::InMemoryStore;
pub use mongo::MongoStore;

use async_trait::async_trait;
use service_core::error::AppError;
use uuid::Uuid;

use crate::models::{
    BatchFilter, BatchUpdate, Booking, BookingStatus, ClassBatch, Coupon, CouponUpdate,
    CouponUsage, Frequency, TeacherAvailability,
};

/// Outcome of the atomic check-and-increment on a batch's seat counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeatReservation {
    Granted,
    BatchNotFound,
    BatchInactive,
    BatchFull,
}

/// Outcome of the atomic `pending/confirmed -> paid` transition. Reserving
/// the seat and marking the booking paid succeed or fail as one unit.
#[derive(Debug)]
pub enum PaidTransition {
    Paid(Booking),
    BookingNotFound,
    /// The booking is already in a terminal state.
    NotPayable(BookingStatus),
    BatchNotFound,
    BatchInactive,
    BatchFull,
}

/// Outcome of cancelling a booking. The status flip happens at most once,
/// so the seat release can never run twice for the same booking.
#[derive(Debug)]
pub enum CancelTransition {
    Cancelled {
        booking: Booking,
        seat_released: bool,
    },
    AlreadyCancelled(Booking),
    NotFound,
}

#[async_trait]
pub trait EnrollmentStore: Send + Sync {
    // Class batches
    async fn insert_batch(&self, batch: ClassBatch) -> Result<(), AppError>;
    async fn find_batch(&self, id: Uuid) -> Result<Option<ClassBatch>, AppError>;
    /// Batches matching the filter, sorted by `batch_start_date` ascending.
    async fn list_batches(&self, filter: &BatchFilter) -> Result<Vec<ClassBatch>, AppError>;
    async fn update_batch(
        &self,
        id: Uuid,
        update: BatchUpdate,
    ) -> Result<Option<ClassBatch>, AppError>;
    /// Soft delete: flips `is_active` off and returns the batch.
    async fn deactivate_batch(&self, id: Uuid) -> Result<Option<ClassBatch>, AppError>;
    /// Atomic conditional increment of `current_students` - grants only when
    /// the batch is active and below capacity.
    async fn try_reserve_seat(&self, batch_id: Uuid) -> Result<SeatReservation, AppError>;
    /// Atomic conditional decrement, floored at zero.
    async fn release_seat(&self, batch_id: Uuid) -> Result<(), AppError>;
    async fn upsert_teacher_availability(
        &self,
        availability: TeacherAvailability,
    ) -> Result<(), AppError>;
    async fn get_teacher_availability(
        &self,
        teacher_id: Uuid,
    ) -> Result<Option<TeacherAvailability>, AppError>;

    // Bookings
    async fn insert_booking(&self, booking: Booking) -> Result<(), AppError>;
    async fn find_booking(&self, id: Uuid) -> Result<Option<Booking>, AppError>;
    /// All bookings, newest first.
    async fn list_bookings(&self) -> Result<Vec<Booking>, AppError>;
    async fn set_booking_stage_two(
        &self,
        id: Uuid,
        frequency: Frequency,
        accept_tnc: bool,
    ) -> Result<Option<Booking>, AppError>;
    /// Stage-three update for non-paid target statuses: records payment
    /// details and the new status without touching the seat ledger.
    async fn set_booking_payment(
        &self,
        id: Uuid,
        status: BookingStatus,
        payment_details: serde_json::Value,
    ) -> Result<Option<Booking>, AppError>;
    /// The critical section: seat reservation plus status flip to `paid` as
    /// one logical unit.
    async fn mark_booking_paid(
        &self,
        id: Uuid,
        payment_details: serde_json::Value,
    ) -> Result<PaidTransition, AppError>;
    async fn cancel_booking(&self, id: Uuid) -> Result<CancelTransition, AppError>;

    // Coupons
    /// Fails with `Conflict` when the (uppercased) code already exists.
    async fn insert_coupon(&self, coupon: Coupon) -> Result<(), AppError>;
    async fn find_coupon(&self, id: Uuid) -> Result<Option<Coupon>, AppError>;
    async fn find_coupon_by_code(&self, code: &str) -> Result<Option<Coupon>, AppError>;
    /// All coupons, newest first.
    async fn list_coupons(&self) -> Result<Vec<Coupon>, AppError>;
    async fn update_coupon(
        &self,
        id: Uuid,
        update: CouponUpdate,
    ) -> Result<Option<Coupon>, AppError>;
    async fn delete_coupon(&self, id: Uuid) -> Result<bool, AppError>;
    async fn count_user_redemptions(
        &self,
        coupon_id: Uuid,
        user_id: &str,
    ) -> Result<u64, AppError>;
    /// Atomic conditional increment of `usage_count` guarded by
    /// `usage_limit`, recording one usage row on success. Returns `false`
    /// when the limit is already exhausted (including lost races).
    async fn record_redemption(
        &self,
        coupon_id: Uuid,
        usage: CouponUsage,
    ) -> Result<bool, AppError>;
}
