//! Booking state machine.
//!
//! Drives a booking through `pending -> confirmed -> paid`, coordinating the
//! seat ledger at the paid transition, and through `cancelled` with the
//! matching seat release.

use chrono::{DateTime, Utc};
use service_core::error::AppError;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Booking, BookingStatus, BookingType, Frequency};
use crate::services::metrics;
use crate::services::store::{CancelTransition, EnrollmentStore, PaidTransition};

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("Class batch not found")]
    BatchNotFound,
    #[error("Class batch is not active")]
    BatchInactive,
    #[error("Class batch is already full")]
    BatchFull,
    #[error("Booking not found")]
    BookingNotFound,
    #[error("Booking is already {0}")]
    Terminal(BookingStatus),
    #[error("Status {0} cannot be set through this stage")]
    UnsupportedStatus(BookingStatus),
    #[error(transparent)]
    Store(#[from] AppError),
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::BatchNotFound | BookingError::BookingNotFound => {
                AppError::NotFound(anyhow::anyhow!("{err}"))
            }
            BookingError::Store(inner) => inner,
            other => AppError::InvalidState(anyhow::anyhow!("{other}")),
        }
    }
}

/// Stage-one input: everything the client supplies when the booking intent
/// is first recorded.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub teacher_id: Uuid,
    pub student_id: Uuid,
    pub parent_id: Uuid,
    pub batch_id: Uuid,
    pub booking_type: BookingType,
    pub class_days: Vec<String>,
    pub class_timings: Vec<String>,
    pub subjects: Vec<String>,
    pub starting_date: DateTime<Utc>,
    pub fees: f64,
}

#[derive(Clone)]
pub struct EnrollmentService {
    store: Arc<dyn EnrollmentStore>,
}

impl EnrollmentService {
    pub fn new(store: Arc<dyn EnrollmentStore>) -> Self {
        Self { store }
    }

    /// Stage one. The target batch must be bookable, but no seat is held -
    /// inventory is only claimed when the payment is confirmed.
    pub async fn create_booking(&self, input: NewBooking) -> Result<Booking, BookingError> {
        let batch = self
            .store
            .find_batch(input.batch_id)
            .await?
            .ok_or(BookingError::BatchNotFound)?;
        if !batch.is_active {
            return Err(BookingError::BatchInactive);
        }

        let now = Utc::now();
        let booking = Booking {
            id: Uuid::new_v4(),
            teacher_id: input.teacher_id,
            student_id: input.student_id,
            parent_id: input.parent_id,
            batch_id: input.batch_id,
            status: BookingStatus::Pending,
            booking_type: input.booking_type,
            class_days: input.class_days,
            class_timings: input.class_timings,
            subjects: input.subjects,
            starting_date: input.starting_date,
            fees: input.fees,
            frequency: Frequency::Monthly,
            accept_tnc: false,
            payment_details: serde_json::json!({}),
            created_at: now,
            updated_at: now,
        };
        self.store.insert_booking(booking.clone()).await?;
        metrics::record_booking("pending");

        tracing::info!(
            booking_id = %booking.id,
            batch_id = %booking.batch_id,
            student_id = %booking.student_id,
            "Booking created"
        );
        Ok(booking)
    }

    /// Stage two: frequency and terms acceptance. No batch or coupon side
    /// effects.
    pub async fn stage_two(
        &self,
        id: Uuid,
        frequency: Frequency,
        accept_tnc: bool,
    ) -> Result<Booking, BookingError> {
        let booking = self
            .store
            .find_booking(id)
            .await?
            .ok_or(BookingError::BookingNotFound)?;
        if booking.status.is_terminal() {
            return Err(BookingError::Terminal(booking.status));
        }

        self.store
            .set_booking_stage_two(id, frequency, accept_tnc)
            .await?
            .ok_or(BookingError::BookingNotFound)
    }

    /// Stage three: payment details plus the target status. `paid` is the
    /// critical path - the seat reservation and the status flip happen as
    /// one unit, and a full or inactive batch fails the whole transition
    /// with the booking left untouched.
    pub async fn stage_three(
        &self,
        id: Uuid,
        payment_details: serde_json::Value,
        status: BookingStatus,
    ) -> Result<Booking, BookingError> {
        match status {
            BookingStatus::Paid => {
                match self.store.mark_booking_paid(id, payment_details).await? {
                    PaidTransition::Paid(booking) => {
                        metrics::record_reservation("granted");
                        metrics::record_booking("paid");
                        tracing::info!(
                            booking_id = %booking.id,
                            batch_id = %booking.batch_id,
                            "Booking paid, seat reserved"
                        );
                        Ok(booking)
                    }
                    PaidTransition::BookingNotFound => Err(BookingError::BookingNotFound),
                    PaidTransition::NotPayable(status) => Err(BookingError::Terminal(status)),
                    PaidTransition::BatchNotFound => Err(BookingError::BatchNotFound),
                    PaidTransition::BatchInactive => {
                        metrics::record_reservation("rejected_inactive");
                        Err(BookingError::BatchInactive)
                    }
                    PaidTransition::BatchFull => {
                        metrics::record_reservation("rejected_full");
                        tracing::warn!(booking_id = %id, "Seat reservation lost: batch full");
                        Err(BookingError::BatchFull)
                    }
                }
            }
            // Cancellation goes through `cancel`, which releases the seat.
            BookingStatus::Cancelled => Err(BookingError::UnsupportedStatus(status)),
            BookingStatus::Pending | BookingStatus::Confirmed => {
                let booking = self
                    .store
                    .find_booking(id)
                    .await?
                    .ok_or(BookingError::BookingNotFound)?;
                if booking.status.is_terminal() {
                    return Err(BookingError::Terminal(booking.status));
                }
                self.store
                    .set_booking_payment(id, status, payment_details)
                    .await?
                    .ok_or(BookingError::BookingNotFound)
            }
        }
    }

    /// Terminal cancellation. The status flips at most once, so the seat of
    /// a paid booking is released exactly once no matter how often this is
    /// called.
    pub async fn cancel(&self, id: Uuid) -> Result<(Booking, bool), BookingError> {
        match self.store.cancel_booking(id).await? {
            CancelTransition::Cancelled {
                booking,
                seat_released,
            } => {
                metrics::record_booking("cancelled");
                tracing::info!(
                    booking_id = %booking.id,
                    batch_id = %booking.batch_id,
                    seat_released,
                    "Booking cancelled"
                );
                Ok((booking, seat_released))
            }
            CancelTransition::AlreadyCancelled(booking) => Ok((booking, false)),
            CancelTransition::NotFound => Err(BookingError::BookingNotFound),
        }
    }

    pub async fn get(&self, id: Uuid) -> Result<Booking, BookingError> {
        self.store
            .find_booking(id)
            .await?
            .ok_or(BookingError::BookingNotFound)
    }

    pub async fn list(&self) -> Result<Vec<Booking>, BookingError> {
        Ok(self.store.list_bookings().await?)
    }
}
