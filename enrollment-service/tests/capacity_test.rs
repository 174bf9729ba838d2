//! Concurrency properties of the seat ledger: capacity is never exceeded no
//! matter how requests interleave, and release never drives the counter
//! negative.

mod common;

use common::TestApp;
use enrollment_service::services::EnrollmentStore;
use enrollment_service::services::store::SeatReservation;

#[tokio::test]
async fn concurrent_paid_transitions_never_exceed_capacity() {
    let app = TestApp::spawn().await;
    let batch_id = app.create_batch(uuid::Uuid::new_v4(), 2).await;

    // Six pending bookings race for two seats.
    let mut booking_ids = Vec::new();
    for _ in 0..6 {
        booking_ids.push(app.create_booking(&batch_id).await);
    }

    let mut handles = Vec::new();
    for booking_id in booking_ids {
        let client = app.client.clone();
        let url = format!("{}/bookings/stage-three/{}", app.address, booking_id);
        handles.push(tokio::spawn(async move {
            client
                .put(url)
                .json(&serde_json::json!({ "paymentDetails": {}, "status": "paid" }))
                .send()
                .await
                .expect("Failed to submit stage three")
                .status()
                .as_u16()
        }));
    }

    let mut succeeded = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await.expect("Task panicked") {
            200 => succeeded += 1,
            400 => rejected += 1,
            other => panic!("Unexpected status {other}"),
        }
    }

    assert_eq!(succeeded, 2, "exactly the two available seats are granted");
    assert_eq!(rejected, 4);
    assert_eq!(app.current_students(&batch_id).await, 2);
}

#[tokio::test]
async fn single_remaining_seat_admits_exactly_one_of_two_racers() {
    let app = TestApp::spawn().await;
    let batch_id = app.create_batch(uuid::Uuid::new_v4(), 1).await;

    let first = app.create_booking(&batch_id).await;
    let second = app.create_booking(&batch_id).await;

    let race = |booking_id: String| {
        let client = app.client.clone();
        let url = format!("{}/bookings/stage-three/{}", app.address, booking_id);
        tokio::spawn(async move {
            client
                .put(url)
                .json(&serde_json::json!({ "paymentDetails": {}, "status": "paid" }))
                .send()
                .await
                .expect("Failed to submit stage three")
                .status()
                .as_u16()
        })
    };

    let (a, b) = tokio::join!(race(first), race(second));
    let statuses = [a.unwrap(), b.unwrap()];

    assert_eq!(statuses.iter().filter(|s| **s == 200).count(), 1);
    assert_eq!(statuses.iter().filter(|s| **s == 400).count(), 1);
    assert_eq!(app.current_students(&batch_id).await, 1);
}

#[tokio::test]
async fn reserve_seat_classifies_every_rejection() {
    let app = TestApp::spawn().await;
    let batch_id = app.create_batch(uuid::Uuid::new_v4(), 1).await;
    let batch_uuid: uuid::Uuid = batch_id.parse().unwrap();

    assert_eq!(
        app.store.try_reserve_seat(batch_uuid).await.unwrap(),
        SeatReservation::Granted
    );
    assert_eq!(
        app.store.try_reserve_seat(batch_uuid).await.unwrap(),
        SeatReservation::BatchFull
    );
    assert_eq!(
        app.store.try_reserve_seat(uuid::Uuid::new_v4()).await.unwrap(),
        SeatReservation::BatchNotFound
    );

    app.client
        .delete(format!("{}/classBatches/{}", app.address, batch_id))
        .send()
        .await
        .expect("Failed to deactivate batch");
    assert_eq!(
        app.store.try_reserve_seat(batch_uuid).await.unwrap(),
        SeatReservation::BatchInactive
    );
}

#[tokio::test]
async fn release_seat_never_goes_negative() {
    let app = TestApp::spawn().await;
    let batch_id = app.create_batch(uuid::Uuid::new_v4(), 2).await;
    let batch_uuid: uuid::Uuid = batch_id.parse().unwrap();

    for _ in 0..5 {
        app.store
            .release_seat(batch_uuid)
            .await
            .expect("release_seat failed");
    }

    assert_eq!(app.current_students(&batch_id).await, 0);
}

#[tokio::test]
async fn release_after_partial_enrollment_floors_at_zero() {
    let app = TestApp::spawn().await;
    let batch_id = app.create_batch(uuid::Uuid::new_v4(), 2).await;
    let batch_uuid: uuid::Uuid = batch_id.parse().unwrap();

    let booking_id = app.create_booking(&batch_id).await;
    assert_eq!(app.pay_booking(&booking_id).await.status(), 200);
    assert_eq!(app.current_students(&batch_id).await, 1);

    for _ in 0..4 {
        app.store
            .release_seat(batch_uuid)
            .await
            .expect("release_seat failed");
    }

    assert_eq!(app.current_students(&batch_id).await, 0);
}
