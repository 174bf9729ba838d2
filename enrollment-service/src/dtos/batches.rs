//! Wire DTOs for the class batch surface. Field names follow the public
//! camelCase API; models stay snake_case.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{BatchFilter, BatchUpdate, ClassBatch};

fn default_maximum_students() -> u32 {
    2
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateBatchRequest {
    pub teacher_id: Uuid,
    #[validate(length(min = 1, message = "Batch name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "Batch info is required"))]
    pub batch_info: String,
    #[validate(length(min = 1, message = "At least one subject is required"))]
    pub subjects: Vec<String>,
    #[validate(length(min = 1, message = "At least one board is required"))]
    pub boards: Vec<String>,
    #[validate(length(min = 1, message = "At least one class is required"))]
    pub classes: Vec<String>,
    #[validate(length(min = 1, message = "At least one day is required"))]
    pub days: Vec<String>,
    #[validate(length(min = 1, message = "At least one time slot is required"))]
    pub time: Vec<String>,
    #[validate(range(min = 100.0, max = 25000.0, message = "Fees must be between 100 and 25000"))]
    pub fees: f64,
    #[serde(default = "default_maximum_students")]
    #[validate(range(min = 1, max = 2, message = "maximumStudents must be 1 or 2"))]
    pub maximum_students: u32,
    pub batch_start_date: DateTime<Utc>,
    pub last_enrol_date: DateTime<Utc>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl CreateBatchRequest {
    pub fn into_batch(self) -> ClassBatch {
        let now = Utc::now();
        ClassBatch {
            id: Uuid::new_v4(),
            teacher_id: self.teacher_id,
            name: self.name,
            batch_info: self.batch_info,
            subjects: self.subjects,
            boards: self.boards,
            classes: self.classes,
            days: self.days,
            time: self.time,
            fees: self.fees,
            maximum_students: self.maximum_students,
            current_students: 0,
            batch_start_date: self.batch_start_date,
            last_enrol_date: self.last_enrol_date,
            is_active: self.is_active,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBatchRequest {
    pub name: Option<String>,
    pub batch_info: Option<String>,
    pub subjects: Option<Vec<String>>,
    pub boards: Option<Vec<String>>,
    pub classes: Option<Vec<String>>,
    pub days: Option<Vec<String>>,
    pub time: Option<Vec<String>>,
    #[validate(range(min = 100.0, max = 25000.0, message = "Fees must be between 100 and 25000"))]
    pub fees: Option<f64>,
    #[validate(range(min = 1, max = 2, message = "maximumStudents must be 1 or 2"))]
    pub maximum_students: Option<u32>,
    pub batch_start_date: Option<DateTime<Utc>>,
    pub last_enrol_date: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
}

impl UpdateBatchRequest {
    pub fn into_update(self) -> BatchUpdate {
        BatchUpdate {
            name: self.name,
            batch_info: self.batch_info,
            subjects: self.subjects,
            boards: self.boards,
            classes: self.classes,
            days: self.days,
            time: self.time,
            fees: self.fees,
            maximum_students: self.maximum_students,
            batch_start_date: self.batch_start_date,
            last_enrol_date: self.last_enrol_date,
            is_active: self.is_active,
        }
    }
}

/// List filters. Multi-value fields (`subjects`, `boards`, `classes`) accept
/// a comma-separated list and match any-of; `teacherId` and `isActive`
/// match exactly.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchQuery {
    pub teacher_id: Option<Uuid>,
    pub subjects: Option<String>,
    pub boards: Option<String>,
    pub classes: Option<String>,
    pub is_active: Option<bool>,
}

fn split_csv(raw: Option<String>) -> Option<Vec<String>> {
    raw.map(|raw| {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    })
}

impl BatchQuery {
    pub fn into_filter(self) -> BatchFilter {
        BatchFilter {
            teacher_id: self.teacher_id,
            subjects: split_csv(self.subjects),
            boards: split_csv(self.boards),
            classes: split_csv(self.classes),
            is_active: self.is_active,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
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
    pub is_full: bool,
    pub batch_start_date: DateTime<Utc>,
    pub last_enrol_date: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ClassBatch> for BatchResponse {
    fn from(batch: ClassBatch) -> Self {
        let is_full = batch.is_full();
        Self {
            id: batch.id,
            teacher_id: batch.teacher_id,
            name: batch.name,
            batch_info: batch.batch_info,
            subjects: batch.subjects,
            boards: batch.boards,
            classes: batch.classes,
            days: batch.days,
            time: batch.time,
            fees: batch.fees,
            maximum_students: batch.maximum_students,
            current_students: batch.current_students,
            is_full,
            batch_start_date: batch.batch_start_date,
            last_enrol_date: batch.last_enrol_date,
            is_active: batch.is_active,
            created_at: batch.created_at,
            updated_at: batch.updated_at,
        }
    }
}
