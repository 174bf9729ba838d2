//! Class batch model - a recurring scheduled class slot with fixed seat capacity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A teacher's recurring class offering with a bounded number of seats.
///
/// `current_students` is only ever mutated through the store's conditional
/// seat operations, so `0 <= current_students <= maximum_students` holds under
/// concurrent bookings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassBatch {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub teacher_id: Uuid,
    pub name: String,
    pub batch_info: String,
    pub subjects: Vec<String>,
    pub boards: Vec<String>,
    pub classes: Vec<String>,
    pub days: Vec<String>,
    pub time: Vec<String>,
    pub fees: f64,
    pub maximum_students: u32,
    pub current_students: u32,
    pub batch_start_date: DateTime<Utc>,
    pub last_enrol_date: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ClassBatch {
    pub fn is_full(&self) -> bool {
        self.current_students >= self.maximum_students
    }

    /// Whether new enrollments are still possible at `now`.
    pub fn is_enrollment_open(&self, now: DateTime<Utc>) -> bool {
        self.is_active && now <= self.last_enrol_date && !self.is_full()
    }
}

/// Filter parameters for listing batches.
///
/// Every filterable field is declared here with an explicit match mode:
/// ids and flags match exactly, list fields match any-of.
#[derive(Debug, Clone, Default)]
pub struct BatchFilter {
    pub teacher_id: Option<Uuid>,
    pub subjects: Option<Vec<String>>,
    pub boards: Option<Vec<String>>,
    pub classes: Option<Vec<String>>,
    pub is_active: Option<bool>,
}

/// Partial update for a batch; `None` leaves the field unchanged.
/// `current_students` is deliberately absent - the seat counter moves only
/// through reserve/release.
#[derive(Debug, Clone, Default)]
pub struct BatchUpdate {
    pub name: Option<String>,
    pub batch_info: Option<String>,
    pub subjects: Option<Vec<String>>,
    pub boards: Option<Vec<String>>,
    pub classes: Option<Vec<String>>,
    pub days: Option<Vec<String>>,
    pub time: Option<Vec<String>>,
    pub fees: Option<f64>,
    pub maximum_students: Option<u32>,
    pub batch_start_date: Option<DateTime<Utc>>,
    pub last_enrol_date: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
}

/// Derived view of a teacher's weekly availability, aggregated from all of
/// their batches. Refreshed best-effort after batch mutations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeacherAvailability {
    #[serde(rename = "_id")]
    pub teacher_id: Uuid,
    pub days_of_week: Vec<String>,
    pub time_of_day: Vec<String>,
    pub updated_at: DateTime<Utc>,
}
