use enrollment_service::Application;
use enrollment_service::config::{Config, DatabaseConfig, ServerConfig};
use enrollment_service::services::InMemoryStore;
use secrecy::Secret;
use serde_json::{Value, json};
use std::sync::Arc;

pub const TEST_ADMIN_ID: &str = "test-admin";
pub const TEST_USER_ID: &str = "test-user";

pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
    pub store: Arc<InMemoryStore>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let config = Config {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Random port
            },
            database: DatabaseConfig {
                url: Secret::new("mongodb://localhost:27017".to_string()),
                db_name: format!("enrollment_test_{}", uuid::Uuid::new_v4()),
            },
            service_name: "enrollment-service-test".to_string(),
        };

        let store = Arc::new(InMemoryStore::new());
        let app = Application::with_store(config, store.clone())
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for the server to accept requests.
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            client,
            store,
        }
    }

    pub fn batch_body(teacher_id: uuid::Uuid, maximum_students: u32) -> Value {
        json!({
            "teacherId": teacher_id,
            "name": "Algebra evenings",
            "batchInfo": "Two sessions a week",
            "subjects": ["Math"],
            "boards": ["CBSE"],
            "classes": ["10"],
            "days": ["Monday", "Thursday"],
            "time": ["18:00"],
            "fees": 1500.0,
            "maximumStudents": maximum_students,
            "batchStartDate": "2026-09-01T00:00:00Z",
            "lastEnrolDate": "2026-08-25T00:00:00Z"
        })
    }

    /// Creates a batch and returns its id.
    pub async fn create_batch(&self, teacher_id: uuid::Uuid, maximum_students: u32) -> String {
        let response = self
            .client
            .post(format!("{}/classBatches", self.address))
            .json(&Self::batch_body(teacher_id, maximum_students))
            .send()
            .await
            .expect("Failed to create batch");
        assert_eq!(response.status(), 201);
        let body: Value = response.json().await.expect("Invalid batch response");
        body["data"]["id"].as_str().expect("Missing batch id").to_string()
    }

    pub async fn get_batch(&self, batch_id: &str) -> Value {
        let response = self
            .client
            .get(format!("{}/classBatches/{}", self.address, batch_id))
            .send()
            .await
            .expect("Failed to fetch batch");
        assert_eq!(response.status(), 200);
        response.json().await.expect("Invalid batch response")
    }

    pub async fn current_students(&self, batch_id: &str) -> u64 {
        self.get_batch(batch_id).await["data"]["currentStudents"]
            .as_u64()
            .expect("Missing currentStudents")
    }

    /// Creates a pending booking against `batch_id` and returns its id.
    pub async fn create_booking(&self, batch_id: &str) -> String {
        let response = self
            .client
            .post(format!("{}/bookings", self.address))
            .json(&json!({
                "batchId": batch_id,
                "teacherId": uuid::Uuid::new_v4(),
                "studentId": uuid::Uuid::new_v4(),
                "parentId": uuid::Uuid::new_v4(),
                "classDays": ["Monday"],
                "classTimings": ["18:00"],
                "subjects": ["Math"],
                "startingDate": "2026-09-01T00:00:00Z",
                "fees": 1500.0
            }))
            .send()
            .await
            .expect("Failed to create booking");
        assert_eq!(response.status(), 201);
        let body: Value = response.json().await.expect("Invalid booking response");
        body["data"]["id"]
            .as_str()
            .expect("Missing booking id")
            .to_string()
    }

    /// Submits stage three with `status=paid` and returns the raw response.
    pub async fn pay_booking(&self, booking_id: &str) -> reqwest::Response {
        self.client
            .put(format!("{}/bookings/stage-three/{}", self.address, booking_id))
            .json(&json!({
                "paymentDetails": { "gateway": "test", "reference": booking_id },
                "status": "paid"
            }))
            .send()
            .await
            .expect("Failed to submit stage three")
    }

    /// Creates a coupon as the test admin and returns the response body.
    pub async fn create_coupon(&self, body: Value) -> Value {
        let response = self
            .client
            .post(format!("{}/coupons", self.address))
            .header("X-User-ID", TEST_ADMIN_ID)
            .json(&body)
            .send()
            .await
            .expect("Failed to create coupon");
        assert_eq!(response.status(), 201);
        response.json().await.expect("Invalid coupon response")
    }

    pub async fn validate_coupon(&self, body: Value) -> reqwest::Response {
        self.client
            .post(format!("{}/coupons/validate", self.address))
            .json(&body)
            .send()
            .await
            .expect("Failed to validate coupon")
    }

    pub async fn apply_coupon(&self, code: &str, user_id: &str, order_id: &str) -> reqwest::Response {
        self.client
            .post(format!("{}/coupons/apply", self.address))
            .json(&json!({
                "couponCode": code,
                "userId": user_id,
                "orderId": order_id
            }))
            .send()
            .await
            .expect("Failed to apply coupon")
    }
}

/// Minimal valid coupon payload with a live validity window; override fields
/// per test.
pub fn coupon_body(code: &str) -> Value {
    let now = chrono::Utc::now();
    json!({
        "code": code,
        "name": "Test offer",
        "discountType": "FLAT",
        "discountValue": 100.0,
        "startDate": now - chrono::Duration::days(1),
        "endDate": now + chrono::Duration::days(30)
    })
}
