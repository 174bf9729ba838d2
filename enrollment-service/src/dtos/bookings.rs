//! Wire DTOs for the staged booking surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{Booking, BookingStatus, BookingType, Frequency};
use crate::services::enrollment::NewBooking;

fn default_booking_type() -> BookingType {
    BookingType::ClassRoom
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    pub batch_id: Uuid,
    pub teacher_id: Uuid,
    pub student_id: Uuid,
    pub parent_id: Uuid,
    #[serde(default = "default_booking_type")]
    pub booking_type: BookingType,
    #[validate(length(min = 1, message = "At least one class day is required"))]
    pub class_days: Vec<String>,
    #[validate(length(min = 1, message = "At least one class timing is required"))]
    pub class_timings: Vec<String>,
    #[validate(length(min = 1, message = "At least one subject is required"))]
    pub subjects: Vec<String>,
    pub starting_date: DateTime<Utc>,
    #[validate(range(min = 0.0, message = "Fees must not be negative"))]
    pub fees: f64,
}

impl CreateBookingRequest {
    pub fn into_new_booking(self) -> NewBooking {
        NewBooking {
            teacher_id: self.teacher_id,
            student_id: self.student_id,
            parent_id: self.parent_id,
            batch_id: self.batch_id,
            booking_type: self.booking_type,
            class_days: self.class_days,
            class_timings: self.class_timings,
            subjects: self.subjects,
            starting_date: self.starting_date,
            fees: self.fees,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StageTwoRequest {
    pub frequency: Frequency,
    #[serde(rename = "acceptTNC")]
    pub accept_tnc: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageThreeRequest {
    #[serde(default)]
    pub payment_details: serde_json::Value,
    pub status: BookingStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingResponse {
    pub id: Uuid,
    pub teacher_id: Uuid,
    pub student_id: Uuid,
    pub parent_id: Uuid,
    pub batch_id: Uuid,
    pub status: BookingStatus,
    pub booking_type: BookingType,
    pub class_days: Vec<String>,
    pub class_timings: Vec<String>,
    pub subjects: Vec<String>,
    pub starting_date: DateTime<Utc>,
    pub fees: f64,
    pub frequency: Frequency,
    #[serde(rename = "acceptTNC")]
    pub accept_tnc: bool,
    pub payment_details: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Booking> for BookingResponse {
    fn from(booking: Booking) -> Self {
        Self {
            id: booking.id,
            teacher_id: booking.teacher_id,
            student_id: booking.student_id,
            parent_id: booking.parent_id,
            batch_id: booking.batch_id,
            status: booking.status,
            booking_type: booking.booking_type,
            class_days: booking.class_days,
            class_timings: booking.class_timings,
            subjects: booking.subjects,
            starting_date: booking.starting_date,
            fees: booking.fees,
            frequency: booking.frequency,
            accept_tnc: booking.accept_tnc,
            payment_details: booking.payment_details,
            created_at: booking.created_at,
            updated_at: booking.updated_at,
        }
    }
}
