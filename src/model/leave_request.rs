use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString, IntoStaticStr};
use thiserror::Error;
use utoipa::{IntoParams, ToSchema};

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, ToSchema, EnumString, Display,
    IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LeaveType {
    Sick,
    Casual,
    Vacation,
}

impl LeaveType {
    /// Human label used in notifications and exports.
    pub fn label(self) -> &'static str {
        match self {
            LeaveType::Sick => "Sick Leave",
            LeaveType::Casual => "Casual Leave",
            LeaveType::Vacation => "Vacation",
        }
    }

    pub fn requires_evidence(self) -> bool {
        matches!(self, LeaveType::Sick)
    }
}

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, ToSchema, EnumString, Display,
    IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
}

/// Admin decision on a pending request.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, ToSchema, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LeaveDecision {
    Approve,
    Reject,
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("leave request is already {current}")]
pub struct TransitionError {
    pub current: LeaveStatus,
}

impl LeaveStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, LeaveStatus::Pending)
    }

    /// Only a pending request can be decided; terminal states never move.
    pub fn apply(self, decision: LeaveDecision) -> Result<LeaveStatus, TransitionError> {
        match (self, decision) {
            (LeaveStatus::Pending, LeaveDecision::Approve) => Ok(LeaveStatus::Approved),
            (LeaveStatus::Pending, LeaveDecision::Reject) => Ok(LeaveStatus::Rejected),
            (current, _) => Err(TransitionError { current }),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[schema(example = json!({
    "id": 1,
    "staff_id": 7,
    "leave_type": "casual",
    "start_date": "2026-01-10",
    "end_date": "2026-01-12",
    "reason": "Family event",
    "evidence": null,
    "status": "pending",
    "applied_at": "2026-01-05T09:00:00Z"
}))]
pub struct LeaveRequest {
    pub id: u64,
    pub staff_id: u64,
    pub leave_type: LeaveType,
    #[schema(value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub end_date: NaiveDate,
    pub reason: String,
    pub evidence: Option<String>,
    pub status: LeaveStatus,
    #[schema(value_type = String, format = "date-time")]
    pub applied_at: DateTime<Utc>,
}

impl LeaveRequest {
    /// Inclusive number of calendar days covered.
    pub fn days(&self) -> i64 {
        (self.end_date - self.start_date).num_days() + 1
    }
}

/// Leave request joined with the owner's identity, used by reports and exports.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LeaveRow {
    pub id: u64,
    pub staff_id: u64,
    pub username: String,
    pub email: String,
    pub leave_type: LeaveType,
    #[schema(value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub end_date: NaiveDate,
    pub reason: String,
    pub evidence: Option<String>,
    pub status: LeaveStatus,
    #[schema(value_type = String, format = "date-time")]
    pub applied_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewLeave {
    pub staff_id: u64,
    pub leave_type: LeaveType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: String,
    pub evidence: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
pub struct LeaveFilter {
    /// Filter by staff member
    #[schema(example = 7)]
    pub staff_id: Option<u64>,
    /// Filter by leave status
    pub status: Option<LeaveStatus>,
    /// Filter by leave type
    pub leave_type: Option<LeaveType>,
}

impl LeaveFilter {
    pub fn matches(&self, staff_id: u64, status: LeaveStatus, leave_type: LeaveType) -> bool {
        self.staff_id.is_none_or(|id| id == staff_id)
            && self.status.is_none_or(|s| s == status)
            && self.leave_type.is_none_or(|t| t == leave_type)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct LeaveSummary {
    pub total: i64,
    pub pending: i64,
    pub approved: i64,
    pub rejected: i64,
}

impl LeaveSummary {
    pub fn add(&mut self, status: LeaveStatus) {
        self.total += 1;
        match status {
            LeaveStatus::Pending => self.pending += 1,
            LeaveStatus::Approved => self.approved += 1,
            LeaveStatus::Rejected => self.rejected += 1,
        }
    }
}
