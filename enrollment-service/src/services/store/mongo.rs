//! MongoDB-backed store.
//!
//! The capacity and redemption counters are guarded by conditional updates
//! evaluated atomically server-side ("increment where below bound"); the
//! paid transition wraps the seat reservation and the booking status flip in
//! a multi-document session transaction.

use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::{self, Bson, Document, doc};
use mongodb::options::{
    FindOneAndUpdateOptions, FindOptions, IndexOptions, ReplaceOptions, ReturnDocument,
};
use mongodb::{Client, ClientSession, Collection, IndexModel};
use service_core::error::AppError;
use uuid::Uuid;

use super::{CancelTransition, EnrollmentStore, PaidTransition, SeatReservation};
use crate::models::{
    BatchFilter, BatchUpdate, Booking, BookingStatus, ClassBatch, Coupon, CouponUpdate,
    CouponUsage, Frequency, TeacherAvailability,
};

#[derive(Clone)]
pub struct MongoStore {
    client: Client,
    batches: Collection<ClassBatch>,
    bookings: Collection<Booking>,
    coupons: Collection<Coupon>,
    usages: Collection<CouponUsage>,
    availability: Collection<TeacherAvailability>,
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    use mongodb::error::{ErrorKind, WriteFailure};
    matches!(
        &*err.kind,
        ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == 11000
    )
}

impl MongoStore {
    pub fn new(client: &Client, db_name: &str) -> Self {
        let db = client.database(db_name);
        Self {
            client: client.clone(),
            batches: db.collection("class_batches"),
            bookings: db.collection("bookings"),
            coupons: db.collection("coupons"),
            usages: db.collection("coupon_usages"),
            availability: db.collection("teacher_availability"),
        }
    }

    pub async fn init_indexes(&self) -> Result<(), AppError> {
        let batch_indexes = [
            IndexModel::builder()
                .keys(doc! { "teacher_id": 1 })
                .options(IndexOptions::builder().name("teacher_idx".to_string()).build())
                .build(),
            IndexModel::builder()
                .keys(doc! { "is_active": 1, "batch_start_date": 1 })
                .options(
                    IndexOptions::builder()
                        .name("active_start_idx".to_string())
                        .build(),
                )
                .build(),
        ];
        self.batches.create_indexes(batch_indexes, None).await?;

        let booking_indexes = [
            IndexModel::builder()
                .keys(doc! { "batch_id": 1, "status": 1 })
                .options(
                    IndexOptions::builder()
                        .name("batch_status_idx".to_string())
                        .build(),
                )
                .build(),
            IndexModel::builder()
                .keys(doc! { "student_id": 1 })
                .options(IndexOptions::builder().name("student_idx".to_string()).build())
                .build(),
        ];
        self.bookings.create_indexes(booking_indexes, None).await?;

        // The unique code index backs duplicate-code conflict detection.
        let coupon_indexes = [
            IndexModel::builder()
                .keys(doc! { "code": 1 })
                .options(
                    IndexOptions::builder()
                        .name("code_idx".to_string())
                        .unique(true)
                        .build(),
                )
                .build(),
            IndexModel::builder()
                .keys(doc! { "is_active": 1, "start_date": 1, "end_date": 1 })
                .options(IndexOptions::builder().name("window_idx".to_string()).build())
                .build(),
        ];
        self.coupons.create_indexes(coupon_indexes, None).await?;

        let usage_index = IndexModel::builder()
            .keys(doc! { "coupon_id": 1, "user_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("coupon_user_idx".to_string())
                    .build(),
            )
            .build();
        self.usages.create_index(usage_index, None).await?;

        tracing::info!("Enrollment service indexes initialized");
        Ok(())
    }

    /// Conditional seat increment; grants only when the batch is active and
    /// `current_students` is still below `maximum_students` at update time.
    async fn reserve_seat_conditional(
        &self,
        batch: &ClassBatch,
        session: Option<&mut ClientSession>,
    ) -> Result<bool, AppError> {
        let filter = doc! {
            "_id": batch.id.to_string(),
            "is_active": true,
            "current_students": { "$lt": batch.maximum_students as i64 },
        };
        let update = doc! {
            "$inc": { "current_students": 1 },
            "$set": { "updated_at": bson::to_bson(&Utc::now())? },
        };
        let result = match session {
            Some(session) => {
                self.batches
                    .update_one_with_session(filter, update, None, session)
                    .await?
            }
            None => self.batches.update_one(filter, update, None).await?,
        };
        Ok(result.modified_count == 1)
    }

    async fn classify_failed_reservation(
        &self,
        batch_id: Uuid,
    ) -> Result<SeatReservation, AppError> {
        match self.find_batch(batch_id).await? {
            None => Ok(SeatReservation::BatchNotFound),
            Some(batch) if !batch.is_active => Ok(SeatReservation::BatchInactive),
            Some(_) => Ok(SeatReservation::BatchFull),
        }
    }

    /// Body of the paid transition, run inside an open transaction on
    /// `session`. The caller commits only on the `Paid` outcome.
    async fn mark_paid_in_transaction(
        &self,
        session: &mut ClientSession,
        id: Uuid,
        payment_details: serde_json::Value,
    ) -> Result<PaidTransition, AppError> {
        let booking = self
            .bookings
            .find_one_with_session(doc! { "_id": id.to_string() }, None, session)
            .await?;
        let Some(booking) = booking else {
            return Ok(PaidTransition::BookingNotFound);
        };
        if !booking.status.can_become_paid() {
            return Ok(PaidTransition::NotPayable(booking.status));
        }

        let batch = self
            .batches
            .find_one_with_session(
                doc! { "_id": booking.batch_id.to_string() },
                None,
                session,
            )
            .await?;
        let Some(batch) = batch else {
            return Ok(PaidTransition::BatchNotFound);
        };
        if !batch.is_active {
            return Ok(PaidTransition::BatchInactive);
        }
        if !self.reserve_seat_conditional(&batch, Some(session)).await? {
            return Ok(PaidTransition::BatchFull);
        }

        let updated = self
            .bookings
            .find_one_and_update_with_session(
                doc! {
                    "_id": id.to_string(),
                    "status": { "$in": ["pending", "confirmed"] },
                },
                doc! { "$set": {
                    "status": "paid",
                    "payment_details": bson::to_bson(&payment_details)?,
                    "updated_at": bson::to_bson(&Utc::now())?,
                }},
                FindOneAndUpdateOptions::builder()
                    .return_document(ReturnDocument::After)
                    .build(),
                session,
            )
            .await?;
        match updated {
            Some(updated) => Ok(PaidTransition::Paid(updated)),
            // The status moved under us inside the transaction window; the
            // abort rolls the seat increment back.
            None => Ok(PaidTransition::NotPayable(booking.status)),
        }
    }
}

#[async_trait]
impl EnrollmentStore for MongoStore {
    async fn insert_batch(&self, batch: ClassBatch) -> Result<(), AppError> {
        self.batches.insert_one(batch, None).await?;
        Ok(())
    }

    async fn find_batch(&self, id: Uuid) -> Result<Option<ClassBatch>, AppError> {
        Ok(self
            .batches
            .find_one(doc! { "_id": id.to_string() }, None)
            .await?)
    }

    async fn list_batches(&self, filter: &BatchFilter) -> Result<Vec<ClassBatch>, AppError> {
        let mut query = Document::new();
        if let Some(teacher_id) = filter.teacher_id {
            query.insert("teacher_id", teacher_id.to_string());
        }
        if let Some(is_active) = filter.is_active {
            query.insert("is_active", is_active);
        }
        if let Some(subjects) = &filter.subjects {
            query.insert("subjects", doc! { "$in": subjects });
        }
        if let Some(boards) = &filter.boards {
            query.insert("boards", doc! { "$in": boards });
        }
        if let Some(classes) = &filter.classes {
            query.insert("classes", doc! { "$in": classes });
        }

        let options = FindOptions::builder()
            .sort(doc! { "batch_start_date": 1 })
            .build();
        let cursor = self.batches.find(query, options).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn update_batch(
        &self,
        id: Uuid,
        update: BatchUpdate,
    ) -> Result<Option<ClassBatch>, AppError> {
        let mut filter = doc! { "_id": id.to_string() };
        let mut set = doc! { "updated_at": bson::to_bson(&Utc::now())? };

        if let Some(maximum) = update.maximum_students {
            // Shrinking capacity below current enrollment would break the
            // seat invariant; the conditional filter rejects it atomically.
            filter.insert("current_students", doc! { "$lte": maximum as i64 });
            set.insert("maximum_students", maximum as i64);
        }
        if let Some(name) = update.name {
            set.insert("name", name);
        }
        if let Some(batch_info) = update.batch_info {
            set.insert("batch_info", batch_info);
        }
        if let Some(subjects) = update.subjects {
            set.insert("subjects", subjects);
        }
        if let Some(boards) = update.boards {
            set.insert("boards", boards);
        }
        if let Some(classes) = update.classes {
            set.insert("classes", classes);
        }
        if let Some(days) = update.days {
            set.insert("days", days);
        }
        if let Some(time) = update.time {
            set.insert("time", time);
        }
        if let Some(fees) = update.fees {
            set.insert("fees", fees);
        }
        if let Some(batch_start_date) = update.batch_start_date {
            set.insert("batch_start_date", bson::to_bson(&batch_start_date)?);
        }
        if let Some(last_enrol_date) = update.last_enrol_date {
            set.insert("last_enrol_date", bson::to_bson(&last_enrol_date)?);
        }
        if let Some(is_active) = update.is_active {
            set.insert("is_active", is_active);
        }

        let updated = self
            .batches
            .find_one_and_update(
                filter,
                doc! { "$set": set },
                FindOneAndUpdateOptions::builder()
                    .return_document(ReturnDocument::After)
                    .build(),
            )
            .await?;
        if updated.is_none() && self.find_batch(id).await?.is_some() {
            return Err(AppError::InvalidState(anyhow::anyhow!(
                "maximumStudents cannot be below current enrollment"
            )));
        }
        Ok(updated)
    }

    async fn deactivate_batch(&self, id: Uuid) -> Result<Option<ClassBatch>, AppError> {
        Ok(self
            .batches
            .find_one_and_update(
                doc! { "_id": id.to_string() },
                doc! { "$set": {
                    "is_active": false,
                    "updated_at": bson::to_bson(&Utc::now())?,
                }},
                FindOneAndUpdateOptions::builder()
                    .return_document(ReturnDocument::After)
                    .build(),
            )
            .await?)
    }

    async fn try_reserve_seat(&self, batch_id: Uuid) -> Result<SeatReservation, AppError> {
        let Some(batch) = self.find_batch(batch_id).await? else {
            return Ok(SeatReservation::BatchNotFound);
        };
        if self.reserve_seat_conditional(&batch, None).await? {
            Ok(SeatReservation::Granted)
        } else {
            self.classify_failed_reservation(batch_id).await
        }
    }

    async fn release_seat(&self, batch_id: Uuid) -> Result<(), AppError> {
        // Floored at zero by the conditional filter; a no-match is fine.
        self.batches
            .update_one(
                doc! {
                    "_id": batch_id.to_string(),
                    "current_students": { "$gt": 0 },
                },
                doc! {
                    "$inc": { "current_students": -1 },
                    "$set": { "updated_at": bson::to_bson(&Utc::now())? },
                },
                None,
            )
            .await?;
        Ok(())
    }

    async fn upsert_teacher_availability(
        &self,
        availability: TeacherAvailability,
    ) -> Result<(), AppError> {
        self.availability
            .replace_one(
                doc! { "_id": availability.teacher_id.to_string() },
                availability,
                ReplaceOptions::builder().upsert(true).build(),
            )
            .await?;
        Ok(())
    }

    async fn get_teacher_availability(
        &self,
        teacher_id: Uuid,
    ) -> Result<Option<TeacherAvailability>, AppError> {
        Ok(self
            .availability
            .find_one(doc! { "_id": teacher_id.to_string() }, None)
            .await?)
    }

    async fn insert_booking(&self, booking: Booking) -> Result<(), AppError> {
        self.bookings.insert_one(booking, None).await?;
        Ok(())
    }

    async fn find_booking(&self, id: Uuid) -> Result<Option<Booking>, AppError> {
        Ok(self
            .bookings
            .find_one(doc! { "_id": id.to_string() }, None)
            .await?)
    }

    async fn list_bookings(&self) -> Result<Vec<Booking>, AppError> {
        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .build();
        let cursor = self.bookings.find(None, options).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn set_booking_stage_two(
        &self,
        id: Uuid,
        frequency: Frequency,
        accept_tnc: bool,
    ) -> Result<Option<Booking>, AppError> {
        Ok(self
            .bookings
            .find_one_and_update(
                doc! { "_id": id.to_string() },
                doc! { "$set": {
                    "frequency": bson::to_bson(&frequency)?,
                    "accept_tnc": accept_tnc,
                    "updated_at": bson::to_bson(&Utc::now())?,
                }},
                FindOneAndUpdateOptions::builder()
                    .return_document(ReturnDocument::After)
                    .build(),
            )
            .await?)
    }

    async fn set_booking_payment(
        &self,
        id: Uuid,
        status: BookingStatus,
        payment_details: serde_json::Value,
    ) -> Result<Option<Booking>, AppError> {
        Ok(self
            .bookings
            .find_one_and_update(
                doc! { "_id": id.to_string() },
                doc! { "$set": {
                    "status": bson::to_bson(&status)?,
                    "payment_details": bson::to_bson(&payment_details)?,
                    "updated_at": bson::to_bson(&Utc::now())?,
                }},
                FindOneAndUpdateOptions::builder()
                    .return_document(ReturnDocument::After)
                    .build(),
            )
            .await?)
    }

    async fn mark_booking_paid(
        &self,
        id: Uuid,
        payment_details: serde_json::Value,
    ) -> Result<PaidTransition, AppError> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;

        let outcome = self
            .mark_paid_in_transaction(&mut session, id, payment_details)
            .await;
        match &outcome {
            Ok(PaidTransition::Paid(_)) => session.commit_transaction().await?,
            _ => {
                let _ = session.abort_transaction().await;
            }
        }
        outcome
    }

    async fn cancel_booking(&self, id: Uuid) -> Result<CancelTransition, AppError> {
        // The conditional flip happens at most once per booking, which keeps
        // the subsequent seat release single-shot.
        let prior = self
            .bookings
            .find_one_and_update(
                doc! {
                    "_id": id.to_string(),
                    "status": { "$ne": "cancelled" },
                },
                doc! { "$set": {
                    "status": "cancelled",
                    "updated_at": bson::to_bson(&Utc::now())?,
                }},
                FindOneAndUpdateOptions::builder()
                    .return_document(ReturnDocument::Before)
                    .build(),
            )
            .await?;

        match prior {
            Some(prior) => {
                let seat_released = prior.status == BookingStatus::Paid;
                if seat_released {
                    self.release_seat(prior.batch_id).await?;
                }
                let mut booking = prior;
                booking.status = BookingStatus::Cancelled;
                Ok(CancelTransition::Cancelled {
                    booking,
                    seat_released,
                })
            }
            None => match self.find_booking(id).await? {
                Some(booking) => Ok(CancelTransition::AlreadyCancelled(booking)),
                None => Ok(CancelTransition::NotFound),
            },
        }
    }

    async fn insert_coupon(&self, coupon: Coupon) -> Result<(), AppError> {
        match self.coupons.insert_one(coupon, None).await {
            Ok(_) => Ok(()),
            Err(err) if is_duplicate_key(&err) => Err(AppError::Conflict(anyhow::anyhow!(
                "A coupon with this code already exists"
            ))),
            Err(err) => Err(err.into()),
        }
    }

    async fn find_coupon(&self, id: Uuid) -> Result<Option<Coupon>, AppError> {
        Ok(self
            .coupons
            .find_one(doc! { "_id": id.to_string() }, None)
            .await?)
    }

    async fn find_coupon_by_code(&self, code: &str) -> Result<Option<Coupon>, AppError> {
        Ok(self.coupons.find_one(doc! { "code": code }, None).await?)
    }

    async fn list_coupons(&self) -> Result<Vec<Coupon>, AppError> {
        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .build();
        let cursor = self.coupons.find(None, options).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn update_coupon(
        &self,
        id: Uuid,
        update: CouponUpdate,
    ) -> Result<Option<Coupon>, AppError> {
        let mut set = doc! { "updated_at": bson::to_bson(&Utc::now())? };
        if let Some(name) = update.name {
            set.insert("name", name);
        }
        if let Some(description) = update.description {
            set.insert("description", description);
        }
        if let Some(discount_type) = update.discount_type {
            set.insert("discount_type", bson::to_bson(&discount_type)?);
        }
        if let Some(discount_value) = update.discount_value {
            set.insert("discount_value", discount_value);
        }
        if let Some(max_discount_amount) = update.max_discount_amount {
            set.insert(
                "max_discount_amount",
                max_discount_amount.map_or(Bson::Null, Bson::Double),
            );
        }
        if let Some(min_order_amount) = update.min_order_amount {
            set.insert("min_order_amount", min_order_amount);
        }
        if let Some(start_date) = update.start_date {
            set.insert("start_date", bson::to_bson(&start_date)?);
        }
        if let Some(end_date) = update.end_date {
            set.insert("end_date", bson::to_bson(&end_date)?);
        }
        if let Some(is_active) = update.is_active {
            set.insert("is_active", is_active);
        }
        if let Some(usage_limit) = update.usage_limit {
            set.insert(
                "usage_limit",
                usage_limit.map_or(Bson::Null, |v| Bson::Int64(v as i64)),
            );
        }
        if let Some(per_user_limit) = update.per_user_limit {
            set.insert(
                "per_user_limit",
                per_user_limit.map_or(Bson::Null, |v| Bson::Int64(v as i64)),
            );
        }
        if let Some(applies_to) = update.applies_to {
            set.insert("applies_to", bson::to_bson(&applies_to)?);
        }

        Ok(self
            .coupons
            .find_one_and_update(
                doc! { "_id": id.to_string() },
                doc! { "$set": set },
                FindOneAndUpdateOptions::builder()
                    .return_document(ReturnDocument::After)
                    .build(),
            )
            .await?)
    }

    async fn delete_coupon(&self, id: Uuid) -> Result<bool, AppError> {
        let result = self
            .coupons
            .delete_one(doc! { "_id": id.to_string() }, None)
            .await?;
        Ok(result.deleted_count == 1)
    }

    async fn count_user_redemptions(
        &self,
        coupon_id: Uuid,
        user_id: &str,
    ) -> Result<u64, AppError> {
        Ok(self
            .usages
            .count_documents(
                doc! { "coupon_id": coupon_id.to_string(), "user_id": user_id },
                None,
            )
            .await?)
    }

    async fn record_redemption(
        &self,
        coupon_id: Uuid,
        usage: CouponUsage,
    ) -> Result<bool, AppError> {
        let Some(coupon) = self.find_coupon(coupon_id).await? else {
            return Ok(false);
        };

        let mut filter = doc! { "_id": coupon_id.to_string() };
        if let Some(limit) = coupon.usage_limit {
            filter.insert("usage_count", doc! { "$lt": limit as i64 });
        }
        let result = self
            .coupons
            .update_one(
                filter,
                doc! {
                    "$inc": { "usage_count": 1 },
                    "$set": { "updated_at": bson::to_bson(&Utc::now())? },
                },
                None,
            )
            .await?;
        if result.modified_count != 1 {
            return Ok(false);
        }

        self.usages.insert_one(usage, None).await?;
        Ok(true)
    }
}
