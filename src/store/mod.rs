//! Persistence port. The MySQL adapter backs the running service; the
//! in-memory adapter backs the tests and mirrors the same constraints
//! (unique keys, conditional updates, all-or-nothing registration).

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::error::StoreError;
use crate::model::attendance::{
    AttendanceFilter, AttendanceRecord, AttendanceRow, AttendanceStatus, AttendanceSummary,
};
use crate::model::invitation::Invitation;
use crate::model::leave_request::{
    LeaveFilter, LeaveRequest, LeaveRow, LeaveStatus, LeaveSummary, NewLeave,
};
use crate::model::notification::{NewNotification, Notification};
use crate::model::password_reset::PasswordResetToken;
use crate::model::role::Role;
use crate::model::user::{NewUser, ProfileUpdate, StaffUpdate, User};

#[cfg(test)]
pub mod memory;
pub mod mysql;

pub type StoreResult<T> = Result<T, StoreError>;

/// 1-based pagination, clamped the way every list endpoint expects.
const MAX_PAGE: u64 = u32::MAX as u64;

#[derive(Debug, Clone, Copy, Deserialize, IntoParams)]
pub struct Page {
    /// Page number, starting at 1
    pub page: Option<u64>,
    /// Items per page (max 100)
    pub per_page: Option<u64>,
}

impl Page {
    pub fn new(page: u64, per_page: u64) -> Self {
        Self {
            page: Some(page),
            per_page: Some(per_page),
        }
    }

    pub fn number(&self) -> u64 {
        self.page.unwrap_or(1).clamp(1, MAX_PAGE)
    }

    pub fn size(&self) -> u64 {
        self.per_page.unwrap_or(10).clamp(1, 100)
    }

    pub fn offset(&self) -> u64 {
        (self.number() - 1).saturating_mul(self.size())
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    // users
    async fn create_user(&self, user: NewUser) -> StoreResult<User>;
    async fn find_user(&self, id: u64) -> StoreResult<Option<User>>;
    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn username_exists(&self, username: &str) -> StoreResult<bool>;
    async fn list_users(&self, role: Role, active_only: bool) -> StoreResult<Vec<User>>;
    async fn count_users(&self, role: Role) -> StoreResult<i64>;
    async fn update_profile(&self, id: u64, update: &ProfileUpdate) -> StoreResult<()>;
    /// `Conflict` when the new username or email is taken.
    async fn update_staff(&self, id: u64, update: &StaffUpdate) -> StoreResult<()>;
    async fn touch_last_login(&self, id: u64, at: DateTime<Utc>) -> StoreResult<()>;
    /// Every username, lowercased.
    async fn all_usernames(&self) -> StoreResult<Vec<String>>;
    /// Usernames of accounts that logged in since `since`, lowercased.
    async fn recent_usernames(&self, since: DateTime<Utc>) -> StoreResult<Vec<String>>;

    // refresh tokens
    async fn store_refresh_token(
        &self,
        user_id: u64,
        jti: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()>;
    /// Revokes an active token and returns its owner; `None` if it was unknown,
    /// expired or already revoked.
    async fn consume_refresh_token(&self, jti: &str, now: DateTime<Utc>) -> StoreResult<Option<u64>>;
    async fn revoke_user_refresh_tokens(&self, user_id: u64) -> StoreResult<u64>;

    // invitations
    async fn create_invitation(&self, email: &str, token: &str) -> StoreResult<Invitation>;
    async fn find_open_invitation(&self, token: &str) -> StoreResult<Option<Invitation>>;
    async fn invitation_email_exists(&self, email: &str) -> StoreResult<bool>;
    async fn list_invitations(&self) -> StoreResult<Vec<Invitation>>;
    /// Marks the invitation used and creates the account in one unit.
    /// `NotFound` when the invitation is missing or already used.
    async fn register_invited(&self, token: &str, user: NewUser) -> StoreResult<User>;

    // attendance
    /// Insert or overwrite the (staff, date) record.
    async fn upsert_attendance(
        &self,
        staff_id: u64,
        date: NaiveDate,
        status: AttendanceStatus,
        timestamp: DateTime<Utc>,
    ) -> StoreResult<AttendanceRecord>;
    async fn find_attendance(&self, staff_id: u64, date: NaiveDate)
    -> StoreResult<Option<AttendanceRecord>>;
    /// Newest first; `page = None` returns every match.
    async fn list_attendance(
        &self,
        filter: &AttendanceFilter,
        page: Option<Page>,
    ) -> StoreResult<Vec<AttendanceRow>>;
    async fn attendance_summary(&self, filter: &AttendanceFilter) -> StoreResult<AttendanceSummary>;

    // leave
    async fn create_leave(&self, leave: NewLeave) -> StoreResult<LeaveRequest>;
    async fn find_leave(&self, id: u64) -> StoreResult<Option<LeaveRequest>>;
    /// Newest first; `page = None` returns every match.
    async fn list_leaves(&self, filter: &LeaveFilter, page: Option<Page>) -> StoreResult<Vec<LeaveRow>>;
    async fn leave_summary(&self, filter: &LeaveFilter) -> StoreResult<LeaveSummary>;
    /// Moves a request from `from` to `to`; false when it was no longer in `from`.
    async fn transition_leave(&self, id: u64, from: LeaveStatus, to: LeaveStatus) -> StoreResult<bool>;

    // notifications
    async fn create_notification(&self, notification: NewNotification) -> StoreResult<Notification>;
    async fn list_notifications(&self, recipient_id: u64, limit: u64) -> StoreResult<Vec<Notification>>;
    async fn count_unread(&self, recipient_id: u64) -> StoreResult<i64>;
    async fn mark_notification_read(&self, id: u64, recipient_id: u64) -> StoreResult<bool>;
    async fn mark_all_read(&self, recipient_id: u64) -> StoreResult<u64>;

    // password reset
    async fn count_reset_attempts_since(&self, email: &str, since: DateTime<Utc>) -> StoreResult<i64>;
    async fn record_reset_attempt(&self, email: &str, at: DateTime<Utc>) -> StoreResult<()>;
    async fn create_reset_token(
        &self,
        user_id: u64,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()>;
    async fn find_reset_token(&self, token_hash: &str) -> StoreResult<Option<PasswordResetToken>>;
    /// Marks the token used and stores the new password hash in one unit;
    /// false when the token had already been used.
    async fn consume_reset_token(
        &self,
        token_id: u64,
        user_id: u64,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_defaults_and_clamps() {
        let p = Page { page: None, per_page: None };
        assert_eq!((p.number(), p.size(), p.offset()), (1, 10, 0));
        let p = Page::new(0, 1000);
        assert_eq!((p.number(), p.size()), (1, 100));
        let p = Page::new(3, 20);
        assert_eq!(p.offset(), 40);
    }

    #[test]
    fn huge_page_numbers_are_capped() {
        let p = Page { page: Some(u64::MAX), per_page: Some(10) };
        assert_eq!(p.number(), MAX_PAGE);
        assert_eq!(p.offset(), (MAX_PAGE - 1) * 10);
    }
}
