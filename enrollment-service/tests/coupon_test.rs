mod common;

use common::{TEST_USER_ID, TestApp, coupon_body};
use serde_json::{Value, json};

fn merge(mut base: Value, extra: Value) -> Value {
    let (Some(base_map), Some(extra_map)) = (base.as_object_mut(), extra.as_object()) else {
        panic!("merge expects objects");
    };
    for (key, value) in extra_map {
        base_map.insert(key.clone(), value.clone());
    }
    base
}

#[tokio::test]
async fn percentage_discount_is_capped_at_max_discount_amount() {
    let app = TestApp::spawn().await;
    app.create_coupon(merge(
        coupon_body("SAVE10"),
        json!({ "discountType": "PERCENTAGE", "discountValue": 10.0, "maxDiscountAmount": 50.0 }),
    ))
    .await;

    let response = app
        .validate_coupon(json!({
            "couponCode": "SAVE10",
            "userId": TEST_USER_ID,
            "orderAmount": 1000.0
        }))
        .await;

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["discountAmount"], json!(50.0));
    assert_eq!(body["data"]["finalAmount"], json!(950.0));
}

#[tokio::test]
async fn flat_discount_is_capped_at_order_total() {
    let app = TestApp::spawn().await;
    app.create_coupon(merge(
        coupon_body("FLAT100"),
        json!({ "discountValue": 100.0 }),
    ))
    .await;

    let response = app
        .validate_coupon(json!({
            "couponCode": "FLAT100",
            "userId": TEST_USER_ID,
            "orderAmount": 80.0
        }))
        .await;

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["discountAmount"], json!(80.0));
    assert_eq!(body["data"]["finalAmount"], json!(0.0));
}

#[tokio::test]
async fn unknown_code_returns_404() {
    let app = TestApp::spawn().await;

    let response = app
        .validate_coupon(json!({
            "couponCode": "NOPE",
            "userId": TEST_USER_ID,
            "orderAmount": 100.0
        }))
        .await;

    assert_eq!(response.status(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["message"], json!("Coupon not found"));
}

#[tokio::test]
async fn lookup_is_case_insensitive() {
    let app = TestApp::spawn().await;
    let created = app.create_coupon(coupon_body("welcome10")).await;
    // Stored uppercase regardless of the submitted casing.
    assert_eq!(created["data"]["code"], json!("WELCOME10"));

    let response = app
        .validate_coupon(json!({
            "couponCode": "Welcome10",
            "userId": TEST_USER_ID,
            "orderAmount": 500.0
        }))
        .await;

    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn expired_and_inactive_coupons_are_rejected() {
    let app = TestApp::spawn().await;
    let now = chrono::Utc::now();
    app.create_coupon(merge(
        coupon_body("EXPIRED"),
        json!({
            "startDate": now - chrono::Duration::days(30),
            "endDate": now - chrono::Duration::days(1)
        }),
    ))
    .await;
    app.create_coupon(merge(coupon_body("DORMANT"), json!({ "isActive": false })))
        .await;

    for code in ["EXPIRED", "DORMANT"] {
        let response = app
            .validate_coupon(json!({
                "couponCode": code,
                "userId": TEST_USER_ID,
                "orderAmount": 500.0
            }))
            .await;
        assert_eq!(response.status(), 400, "coupon {code} should be rejected");
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["message"], json!("This coupon is no longer valid"));
    }
}

#[tokio::test]
async fn order_below_minimum_is_rejected() {
    let app = TestApp::spawn().await;
    app.create_coupon(merge(
        coupon_body("BIGSPEND"),
        json!({ "minOrderAmount": 1000.0 }),
    ))
    .await;

    let response = app
        .validate_coupon(json!({
            "couponCode": "BIGSPEND",
            "userId": TEST_USER_ID,
            "orderAmount": 999.0
        }))
        .await;

    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn applicability_sets_are_independent_and_filters() {
    let app = TestApp::spawn().await;
    app.create_coupon(merge(
        coupon_body("MATHONLY"),
        json!({ "appliesTo": { "subjects": ["Math"] } }),
    ))
    .await;

    // Any board passes because the boards set is empty.
    let response = app
        .validate_coupon(json!({
            "couponCode": "MATHONLY",
            "userId": TEST_USER_ID,
            "orderAmount": 500.0,
            "subject": "Math",
            "board": "ICSE"
        }))
        .await;
    assert_eq!(response.status(), 200);

    // Wrong subject fails.
    let response = app
        .validate_coupon(json!({
            "couponCode": "MATHONLY",
            "userId": TEST_USER_ID,
            "orderAmount": 500.0,
            "subject": "Physics"
        }))
        .await;
    assert_eq!(response.status(), 400);

    // A populated set with no matching criterion fails.
    let response = app
        .validate_coupon(json!({
            "couponCode": "MATHONLY",
            "userId": TEST_USER_ID,
            "orderAmount": 500.0
        }))
        .await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn validate_has_no_side_effects() {
    let app = TestApp::spawn().await;
    let created = app
        .create_coupon(merge(coupon_body("PREVIEW"), json!({ "usageLimit": 1 })))
        .await;
    let coupon_id = created["data"]["id"].as_str().unwrap().to_string();

    for _ in 0..3 {
        let response = app
            .validate_coupon(json!({
                "couponCode": "PREVIEW",
                "userId": TEST_USER_ID,
                "orderAmount": 500.0
            }))
            .await;
        assert_eq!(response.status(), 200);
    }

    let response = app
        .client
        .get(format!("{}/coupons/{}", app.address, coupon_id))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["usageCount"], json!(0));
}

#[tokio::test]
async fn apply_increments_usage_and_exhausts_the_limit() {
    let app = TestApp::spawn().await;
    let created = app
        .create_coupon(merge(coupon_body("ONCE"), json!({ "usageLimit": 1 })))
        .await;
    let coupon_id = created["data"]["id"].as_str().unwrap().to_string();

    let response = app.apply_coupon("ONCE", TEST_USER_ID, "order-1").await;
    assert_eq!(response.status(), 200);

    // A fresh validation now fails on the global limit.
    let response = app
        .validate_coupon(json!({
            "couponCode": "ONCE",
            "userId": "someone-else",
            "orderAmount": 500.0
        }))
        .await;
    assert_eq!(response.status(), 400);

    // And so does a second apply.
    let response = app.apply_coupon("ONCE", TEST_USER_ID, "order-2").await;
    assert_eq!(response.status(), 400);

    let body: Value = app
        .client
        .get(format!("{}/coupons/{}", app.address, coupon_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["data"]["usageCount"], json!(1));
}

#[tokio::test]
async fn concurrent_applies_of_a_limit_one_coupon_increment_exactly_once() {
    let app = TestApp::spawn().await;
    let created = app
        .create_coupon(merge(coupon_body("RACE"), json!({ "usageLimit": 1 })))
        .await;
    let coupon_id = created["data"]["id"].as_str().unwrap().to_string();

    let mut handles = Vec::new();
    for i in 0..4 {
        let client = app.client.clone();
        let url = format!("{}/coupons/apply", app.address);
        handles.push(tokio::spawn(async move {
            client
                .post(url)
                .json(&json!({
                    "couponCode": "RACE",
                    "userId": format!("user-{i}"),
                    "orderId": format!("order-{i}")
                }))
                .send()
                .await
                .expect("Failed to apply coupon")
                .status()
                .as_u16()
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        if handle.await.expect("Task panicked") == 200 {
            succeeded += 1;
        }
    }
    assert_eq!(succeeded, 1);

    let body: Value = app
        .client
        .get(format!("{}/coupons/{}", app.address, coupon_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["data"]["usageCount"], json!(1));
}

#[tokio::test]
async fn per_user_limit_is_enforced_per_user() {
    let app = TestApp::spawn().await;
    app.create_coupon(merge(
        coupon_body("PERUSER"),
        json!({ "perUserLimit": 1 }),
    ))
    .await;

    assert_eq!(
        app.apply_coupon("PERUSER", "alice", "order-1").await.status(),
        200
    );

    // Alice exhausted her allowance.
    let response = app
        .validate_coupon(json!({
            "couponCode": "PERUSER",
            "userId": "alice",
            "orderAmount": 500.0
        }))
        .await;
    assert_eq!(response.status(), 400);

    // Bob has not.
    let response = app
        .validate_coupon(json!({
            "couponCode": "PERUSER",
            "userId": "bob",
            "orderAmount": 500.0
        }))
        .await;
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn duplicate_code_returns_conflict() {
    let app = TestApp::spawn().await;
    app.create_coupon(coupon_body("DUP")).await;

    let response = app
        .client
        .post(format!("{}/coupons", app.address))
        .header("X-User-ID", common::TEST_ADMIN_ID)
        .json(&coupon_body("dup"))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 409);
}

#[tokio::test]
async fn create_requires_admin_identity() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .post(format!("{}/coupons", app.address))
        .json(&coupon_body("NOAUTH"))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn start_date_after_end_date_is_rejected() {
    let app = TestApp::spawn().await;
    let now = chrono::Utc::now();

    let response = app
        .client
        .post(format!("{}/coupons", app.address))
        .header("X-User-ID", common::TEST_ADMIN_ID)
        .json(&merge(
            coupon_body("BACKWARDS"),
            json!({
                "startDate": now + chrono::Duration::days(10),
                "endDate": now + chrono::Duration::days(1)
            }),
        ))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], json!("End date must be after start date"));
}

#[tokio::test]
async fn toggle_flips_the_active_flag() {
    let app = TestApp::spawn().await;
    let created = app.create_coupon(coupon_body("TOGGLE")).await;
    let coupon_id = created["data"]["id"].as_str().unwrap().to_string();

    let response = app
        .client
        .patch(format!("{}/coupons/{}/toggle", app.address, coupon_id))
        .send()
        .await
        .expect("Failed to toggle coupon");
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["isActive"], json!(false));

    let response = app
        .client
        .patch(format!("{}/coupons/{}/toggle", app.address, coupon_id))
        .send()
        .await
        .expect("Failed to toggle coupon");
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["isActive"], json!(true));
}

#[tokio::test]
async fn deleted_coupon_is_gone() {
    let app = TestApp::spawn().await;
    let created = app.create_coupon(coupon_body("EPHEMERAL")).await;
    let coupon_id = created["data"]["id"].as_str().unwrap().to_string();

    let response = app
        .client
        .delete(format!("{}/coupons/{}", app.address, coupon_id))
        .send()
        .await
        .expect("Failed to delete coupon");
    assert_eq!(response.status(), 200);

    let response = app
        .client
        .get(format!("{}/coupons/{}", app.address, coupon_id))
        .send()
        .await
        .expect("Failed to fetch coupon");
    assert_eq!(response.status(), 404);
}
