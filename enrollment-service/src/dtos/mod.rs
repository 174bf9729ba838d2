pub mod batches;
pub mod bookings;
pub mod coupons;

use serde::Serialize;

/// Standard response envelope: `{"success": true, "data": ...}`, with
/// `count` on list endpoints and `message` on bare acknowledgements.
#[derive(Debug, Serialize)]
pub struct ApiEnvelope<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiEnvelope<T> {
    pub fn data(data: T) -> Self {
        Self {
            success: true,
            message: None,
            count: None,
            data: Some(data),
        }
    }

    pub fn with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            count: None,
            data: Some(data),
        }
    }
}

impl<T: Serialize> ApiEnvelope<Vec<T>> {
    pub fn list(data: Vec<T>) -> Self {
        Self {
            success: true,
            message: None,
            count: Some(data.len()),
            data: Some(data),
        }
    }
}

impl ApiEnvelope<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            count: None,
            data: None,
        }
    }
}
