use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, ToSchema)]
#[schema(example = json!({
    "id": 3,
    "recipient_id": 7,
    "sender_id": 1,
    "subject": "Leave request approved",
    "message": "Your casual leave from 2026-01-10 to 2026-01-12 has been approved.",
    "is_read": false,
    "created_at": "2026-01-06T10:00:00Z"
}))]
pub struct Notification {
    pub id: u64,
    pub recipient_id: u64,
    pub sender_id: Option<u64>,
    pub subject: String,
    pub message: String,
    pub is_read: bool,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub recipient_id: u64,
    pub sender_id: Option<u64>,
    pub subject: String,
    pub message: String,
}
