//! Booking model - one student's staged reservation against a class batch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Booking lifecycle: `pending -> confirmed -> paid`, with `cancelled` as the
/// stored terminal-failure state reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Paid,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Paid => "paid",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    /// Terminal states admit no further stage transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Paid | BookingStatus::Cancelled)
    }

    /// Only pending and confirmed bookings may transition to paid.
    pub fn can_become_paid(&self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BookingType {
    ClassRoom,
    Exam,
    CourseMaterials,
}

/// Payment cadence chosen by the parent at stage two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    #[serde(rename = "_id")]
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
    pub accept_tnc: bool,
    /// Opaque gateway payload recorded at stage three.
    pub payment_details: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
