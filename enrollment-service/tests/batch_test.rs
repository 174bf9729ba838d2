mod common;

use common::TestApp;
use enrollment_service::services::EnrollmentStore;
use serde_json::{Value, json};

#[tokio::test]
async fn create_and_fetch_batch() {
    let app = TestApp::spawn().await;
    let teacher_id = uuid::Uuid::new_v4();
    let batch_id = app.create_batch(teacher_id, 2).await;

    let body = app.get_batch(&batch_id).await;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"]["teacherId"], json!(teacher_id));
    assert_eq!(body["data"]["currentStudents"], json!(0));
    assert_eq!(body["data"]["maximumStudents"], json!(2));
    assert_eq!(body["data"]["isActive"], json!(true));
    assert_eq!(body["data"]["isFull"], json!(false));
}

#[tokio::test]
async fn fetch_unknown_batch_returns_404() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .get(format!("{}/classBatches/{}", app.address, uuid::Uuid::new_v4()))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn create_rejects_out_of_range_fields() {
    let app = TestApp::spawn().await;
    let mut body = TestApp::batch_body(uuid::Uuid::new_v4(), 2);
    body["fees"] = json!(50.0);

    let response = app
        .client
        .post(format!("{}/classBatches", app.address))
        .json(&body)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 422);

    let mut body = TestApp::batch_body(uuid::Uuid::new_v4(), 5);
    body["fees"] = json!(1500.0);
    let response = app
        .client
        .post(format!("{}/classBatches", app.address))
        .json(&body)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 422);
}

#[tokio::test]
async fn list_supports_typed_filters() {
    let app = TestApp::spawn().await;
    let teacher_a = uuid::Uuid::new_v4();
    let teacher_b = uuid::Uuid::new_v4();

    app.create_batch(teacher_a, 2).await;
    let mut body = TestApp::batch_body(teacher_b, 2);
    body["subjects"] = json!(["Physics"]);
    let response = app
        .client
        .post(format!("{}/classBatches", app.address))
        .json(&body)
        .send()
        .await
        .expect("Failed to create batch");
    assert_eq!(response.status(), 201);

    // Exact teacher match.
    let body: Value = app
        .client
        .get(format!("{}/classBatches?teacherId={}", app.address, teacher_a))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["count"], json!(1));
    assert_eq!(body["data"][0]["teacherId"], json!(teacher_a));

    // Any-of subject match, comma-separated.
    let body: Value = app
        .client
        .get(format!(
            "{}/classBatches?subjects=Physics,Chemistry",
            app.address
        ))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["count"], json!(1));
    assert_eq!(body["data"][0]["subjects"][0], json!("Physics"));

    // No filter returns everything.
    let body: Value = app
        .client
        .get(format!("{}/classBatches", app.address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["count"], json!(2));
}

#[tokio::test]
async fn update_batch_changes_fields() {
    let app = TestApp::spawn().await;
    let batch_id = app.create_batch(uuid::Uuid::new_v4(), 2).await;

    let response = app
        .client
        .put(format!("{}/classBatches/{}", app.address, batch_id))
        .json(&json!({ "name": "Geometry mornings", "fees": 2000.0 }))
        .send()
        .await
        .expect("Failed to update batch");

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["name"], json!("Geometry mornings"));
    assert_eq!(body["data"]["fees"], json!(2000.0));
}

#[tokio::test]
async fn capacity_cannot_shrink_below_current_enrollment() {
    let app = TestApp::spawn().await;
    let batch_id = app.create_batch(uuid::Uuid::new_v4(), 2).await;

    for _ in 0..2 {
        let booking_id = app.create_booking(&batch_id).await;
        assert_eq!(app.pay_booking(&booking_id).await.status(), 200);
    }
    assert_eq!(app.current_students(&batch_id).await, 2);

    let response = app
        .client
        .put(format!("{}/classBatches/{}", app.address, batch_id))
        .json(&json!({ "maximumStudents": 1 }))
        .send()
        .await
        .expect("Failed to update batch");

    assert_eq!(response.status(), 400);
    assert_eq!(
        app.get_batch(&batch_id).await["data"]["maximumStudents"],
        json!(2)
    );
}

#[tokio::test]
async fn delete_deactivates_instead_of_removing() {
    let app = TestApp::spawn().await;
    let batch_id = app.create_batch(uuid::Uuid::new_v4(), 2).await;

    let response = app
        .client
        .delete(format!("{}/classBatches/{}", app.address, batch_id))
        .send()
        .await
        .expect("Failed to deactivate batch");
    assert_eq!(response.status(), 200);

    // Still fetchable, but inactive and no longer bookable.
    let body = app.get_batch(&batch_id).await;
    assert_eq!(body["data"]["isActive"], json!(false));
}

#[tokio::test]
async fn teacher_batches_lists_enrollment_counts() {
    let app = TestApp::spawn().await;
    let teacher_id = uuid::Uuid::new_v4();
    let batch_id = app.create_batch(teacher_id, 2).await;
    app.create_batch(uuid::Uuid::new_v4(), 2).await;

    let booking_id = app.create_booking(&batch_id).await;
    assert_eq!(app.pay_booking(&booking_id).await.status(), 200);

    let body: Value = app
        .client
        .get(format!(
            "{}/classBatches/teacher/{}",
            app.address, teacher_id
        ))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["count"], json!(1));
    assert_eq!(body["data"][0]["currentStudents"], json!(1));
}

#[tokio::test]
async fn batch_mutations_refresh_teacher_availability() {
    let app = TestApp::spawn().await;
    let teacher_id = uuid::Uuid::new_v4();

    app.create_batch(teacher_id, 2).await;
    let mut second = TestApp::batch_body(teacher_id, 2);
    second["days"] = json!(["Saturday"]);
    second["time"] = json!(["09:00"]);
    let response = app
        .client
        .post(format!("{}/classBatches", app.address))
        .json(&second)
        .send()
        .await
        .expect("Failed to create batch");
    assert_eq!(response.status(), 201);

    // The recompute is fire-and-forget; poll until it lands.
    let mut availability = None;
    for _ in 0..50 {
        if let Some(view) = app
            .store
            .get_teacher_availability(teacher_id)
            .await
            .expect("availability lookup failed")
        {
            if view.days_of_week.contains(&"Saturday".to_string()) {
                availability = Some(view);
                break;
            }
        }
        tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
    }

    let view = availability.expect("availability view never refreshed");
    assert!(view.days_of_week.contains(&"Monday".to_string()));
    assert!(view.days_of_week.contains(&"Saturday".to_string()));
    assert!(view.time_of_day.contains(&"18:00".to_string()));
    assert!(view.time_of_day.contains(&"09:00".to_string()));
}
