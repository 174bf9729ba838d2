//! Derived view of a teacher's weekly availability.
//!
//! Aggregated from all of the teacher's batches and refreshed after every
//! batch mutation. The recompute runs outside any transaction and is
//! best-effort: a failure is logged, never surfaced to the request that
//! triggered it.

use chrono::Utc;
use service_core::error::AppError;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{BatchFilter, TeacherAvailability};
use crate::services::store::EnrollmentStore;

pub async fn refresh_teacher_availability(
    store: &dyn EnrollmentStore,
    teacher_id: Uuid,
) -> Result<(), AppError> {
    let filter = BatchFilter {
        teacher_id: Some(teacher_id),
        ..Default::default()
    };
    let batches = store.list_batches(&filter).await?;
    if batches.is_empty() {
        return Ok(());
    }

    let mut days_of_week = Vec::new();
    let mut time_of_day = Vec::new();
    for batch in &batches {
        days_of_week.extend(batch.days.iter().cloned());
        time_of_day.extend(batch.time.iter().cloned());
    }

    store
        .upsert_teacher_availability(TeacherAvailability {
            teacher_id,
            days_of_week,
            time_of_day,
            updated_at: Utc::now(),
        })
        .await
}

/// Fire-and-forget refresh after a batch mutation.
pub fn spawn_refresh(store: Arc<dyn EnrollmentStore>, teacher_id: Uuid) {
    tokio::spawn(async move {
        if let Err(err) = refresh_teacher_availability(store.as_ref(), teacher_id).await {
            tracing::warn!(%teacher_id, error = %err, "Failed to refresh teacher availability");
        }
    });
}
