use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use super::{Page, Store, StoreResult};
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

struct RefreshToken {
    user_id: u64,
    jti: String,
    expires_at: DateTime<Utc>,
    revoked: bool,
}

#[derive(Default)]
struct State {
    next_id: u64,
    users: Vec<User>,
    refresh_tokens: Vec<RefreshToken>,
    invitations: Vec<Invitation>,
    attendance: Vec<AttendanceRecord>,
    leaves: Vec<LeaveRequest>,
    notifications: Vec<Notification>,
    reset_tokens: Vec<PasswordResetToken>,
    reset_attempts: Vec<(String, DateTime<Utc>)>,
    user_lookups_down: bool,
    leave_inserts_down: bool,
}

impl State {
    fn id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn insert_user(&mut self, user: NewUser) -> StoreResult<User> {
        if self.users.iter().any(|u| u.username == user.username) {
            return Err(StoreError::Conflict("Username".to_string()));
        }
        if self.users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict("Email".to_string()));
        }
        let user = User {
            id: self.id(),
            username: user.username,
            email: user.email,
            role: user.role,
            password_hash: user.password_hash,
            first_name: user.first_name,
            last_name: user.last_name,
            is_active: true,
            created_at: Utc::now(),
            last_login_at: None,
        };
        self.users.push(user.clone());
        Ok(user)
    }

    fn user(&self, id: u64) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    fn outage(down: bool) -> StoreResult<()> {
        if down {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

/// Test double with the same constraints as the MySQL schema.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Shifts a token's expiry, for expiry tests.
    pub fn expire_reset_tokens(&self, at: DateTime<Utc>) {
        for t in self.lock().reset_tokens.iter_mut() {
            t.expires_at = at;
        }
    }

    /// Makes `find_user` and `list_users` fail from now on.
    pub fn fail_user_lookups(&self) {
        self.lock().user_lookups_down = true;
    }

    /// Makes `create_leave` fail from now on.
    pub fn fail_leave_inserts(&self) {
        self.lock().leave_inserts_down = true;
    }

    pub fn attendance_count(&self) -> usize {
        self.lock().attendance.len()
    }

    /// Inserts an active account with email `<username>@staffhub.test`.
    pub fn seed_user(&self, username: &str, role: Role, password_hash: &str) -> User {
        self.lock()
            .insert_user(NewUser {
                username: username.to_string(),
                email: format!("{}@staffhub.test", username),
                role,
                password_hash: password_hash.to_string(),
                first_name: String::new(),
                last_name: String::new(),
            })
            .unwrap()
    }
}

fn paginate<T>(items: Vec<T>, page: Option<Page>) -> Vec<T> {
    match page {
        Some(p) => items
            .into_iter()
            .skip(p.offset() as usize)
            .take(p.size() as usize)
            .collect(),
        None => items,
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        self.lock().insert_user(user)
    }

    async fn find_user(&self, id: u64) -> StoreResult<Option<User>> {
        let state = self.lock();
        State::outage(state.user_lookups_down)?;
        Ok(state.user(id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(self.lock().users.iter().find(|u| u.username == username).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.lock().users.iter().find(|u| u.email == email).cloned())
    }

    async fn username_exists(&self, username: &str) -> StoreResult<bool> {
        Ok(self
            .lock()
            .users
            .iter()
            .any(|u| u.username.eq_ignore_ascii_case(username)))
    }

    async fn list_users(&self, role: Role, active_only: bool) -> StoreResult<Vec<User>> {
        let state = self.lock();
        State::outage(state.user_lookups_down)?;
        let mut users: Vec<User> = state
            .users
            .iter()
            .filter(|u| u.role == role && (!active_only || u.is_active))
            .cloned()
            .collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    async fn count_users(&self, role: Role) -> StoreResult<i64> {
        Ok(self.lock().users.iter().filter(|u| u.role == role).count() as i64)
    }

    async fn update_profile(&self, id: u64, update: &ProfileUpdate) -> StoreResult<()> {
        let mut state = self.lock();
        if let Some(u) = state.users.iter_mut().find(|u| u.id == id) {
            if let Some(first) = &update.first_name {
                u.first_name = first.clone();
            }
            if let Some(last) = &update.last_name {
                u.last_name = last.clone();
            }
        }
        Ok(())
    }

    async fn update_staff(&self, id: u64, update: &StaffUpdate) -> StoreResult<()> {
        let mut state = self.lock();
        if let Some(username) = &update.username {
            if state.users.iter().any(|u| u.id != id && &u.username == username) {
                return Err(StoreError::Conflict("Username".to_string()));
            }
        }
        if let Some(email) = &update.email {
            if state.users.iter().any(|u| u.id != id && &u.email == email) {
                return Err(StoreError::Conflict("Email".to_string()));
            }
        }
        if let Some(u) = state.users.iter_mut().find(|u| u.id == id) {
            if let Some(v) = &update.username {
                u.username = v.clone();
            }
            if let Some(v) = &update.email {
                u.email = v.clone();
            }
            if let Some(v) = &update.first_name {
                u.first_name = v.clone();
            }
            if let Some(v) = &update.last_name {
                u.last_name = v.clone();
            }
            if let Some(v) = update.is_active {
                u.is_active = v;
            }
        }
        Ok(())
    }

    async fn touch_last_login(&self, id: u64, at: DateTime<Utc>) -> StoreResult<()> {
        if let Some(u) = self.lock().users.iter_mut().find(|u| u.id == id) {
            u.last_login_at = Some(at);
        }
        Ok(())
    }

    async fn all_usernames(&self) -> StoreResult<Vec<String>> {
        Ok(self.lock().users.iter().map(|u| u.username.to_lowercase()).collect())
    }

    async fn recent_usernames(&self, since: DateTime<Utc>) -> StoreResult<Vec<String>> {
        Ok(self
            .lock()
            .users
            .iter()
            .filter(|u| u.last_login_at.is_some_and(|t| t >= since))
            .map(|u| u.username.to_lowercase())
            .collect())
    }

    async fn store_refresh_token(
        &self,
        user_id: u64,
        jti: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.lock().refresh_tokens.push(RefreshToken {
            user_id,
            jti: jti.to_string(),
            expires_at,
            revoked: false,
        });
        Ok(())
    }

    async fn consume_refresh_token(&self, jti: &str, now: DateTime<Utc>) -> StoreResult<Option<u64>> {
        let mut state = self.lock();
        match state
            .refresh_tokens
            .iter_mut()
            .find(|t| t.jti == jti && !t.revoked && t.expires_at > now)
        {
            Some(t) => {
                t.revoked = true;
                Ok(Some(t.user_id))
            }
            None => Ok(None),
        }
    }

    async fn revoke_user_refresh_tokens(&self, user_id: u64) -> StoreResult<u64> {
        let mut revoked = 0;
        for t in self.lock().refresh_tokens.iter_mut() {
            if t.user_id == user_id && !t.revoked {
                t.revoked = true;
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    async fn create_invitation(&self, email: &str, token: &str) -> StoreResult<Invitation> {
        let mut state = self.lock();
        if state.invitations.iter().any(|i| i.email == email) {
            return Err(StoreError::Conflict("Email".to_string()));
        }
        let invitation = Invitation {
            id: state.id(),
            email: email.to_string(),
            token: token.to_string(),
            is_used: false,
            created_at: Utc::now(),
        };
        state.invitations.push(invitation.clone());
        Ok(invitation)
    }

    async fn find_open_invitation(&self, token: &str) -> StoreResult<Option<Invitation>> {
        Ok(self
            .lock()
            .invitations
            .iter()
            .find(|i| i.token == token && !i.is_used)
            .cloned())
    }

    async fn invitation_email_exists(&self, email: &str) -> StoreResult<bool> {
        Ok(self.lock().invitations.iter().any(|i| i.email == email))
    }

    async fn list_invitations(&self) -> StoreResult<Vec<Invitation>> {
        let mut all = self.lock().invitations.clone();
        all.reverse();
        Ok(all)
    }

    async fn register_invited(&self, token: &str, user: NewUser) -> StoreResult<User> {
        let mut state = self.lock();
        let idx = state
            .invitations
            .iter()
            .position(|i| i.token == token && !i.is_used)
            .ok_or_else(|| StoreError::NotFound("Invitation".to_string()))?;
        let user = state.insert_user(user)?;
        state.invitations[idx].is_used = true;
        Ok(user)
    }

    async fn upsert_attendance(
        &self,
        staff_id: u64,
        date: NaiveDate,
        status: AttendanceStatus,
        timestamp: DateTime<Utc>,
    ) -> StoreResult<AttendanceRecord> {
        let mut state = self.lock();
        if let Some(r) = state
            .attendance
            .iter_mut()
            .find(|r| r.staff_id == staff_id && r.date == date)
        {
            r.status = status;
            r.timestamp = timestamp;
            return Ok(r.clone());
        }
        let record = AttendanceRecord {
            id: state.id(),
            staff_id,
            date,
            status,
            timestamp,
        };
        state.attendance.push(record.clone());
        Ok(record)
    }

    async fn find_attendance(
        &self,
        staff_id: u64,
        date: NaiveDate,
    ) -> StoreResult<Option<AttendanceRecord>> {
        Ok(self
            .lock()
            .attendance
            .iter()
            .find(|r| r.staff_id == staff_id && r.date == date)
            .cloned())
    }

    async fn list_attendance(
        &self,
        filter: &AttendanceFilter,
        page: Option<Page>,
    ) -> StoreResult<Vec<AttendanceRow>> {
        let state = self.lock();
        let mut rows: Vec<AttendanceRow> = state
            .attendance
            .iter()
            .filter(|r| filter.matches(r.staff_id, r.date, r.status))
            .filter_map(|r| {
                state.user(r.staff_id).map(|u| AttendanceRow {
                    id: r.id,
                    staff_id: r.staff_id,
                    username: u.username.clone(),
                    email: u.email.clone(),
                    date: r.date,
                    status: r.status,
                    timestamp: r.timestamp,
                })
            })
            .collect();
        rows.sort_by(|a, b| {
            b.date
                .cmp(&a.date)
                .then_with(|| a.username.cmp(&b.username))
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(paginate(rows, page))
    }

    async fn attendance_summary(&self, filter: &AttendanceFilter) -> StoreResult<AttendanceSummary> {
        let mut summary = AttendanceSummary::default();
        for r in self.lock().attendance.iter() {
            if filter.matches(r.staff_id, r.date, r.status) {
                summary.add(r.status);
            }
        }
        Ok(summary)
    }

    async fn create_leave(&self, leave: NewLeave) -> StoreResult<LeaveRequest> {
        let mut state = self.lock();
        State::outage(state.leave_inserts_down)?;
        let request = LeaveRequest {
            id: state.id(),
            staff_id: leave.staff_id,
            leave_type: leave.leave_type,
            start_date: leave.start_date,
            end_date: leave.end_date,
            reason: leave.reason,
            evidence: leave.evidence,
            status: LeaveStatus::Pending,
            applied_at: Utc::now(),
        };
        state.leaves.push(request.clone());
        Ok(request)
    }

    async fn find_leave(&self, id: u64) -> StoreResult<Option<LeaveRequest>> {
        Ok(self.lock().leaves.iter().find(|l| l.id == id).cloned())
    }

    async fn list_leaves(&self, filter: &LeaveFilter, page: Option<Page>) -> StoreResult<Vec<LeaveRow>> {
        let state = self.lock();
        let mut rows: Vec<LeaveRow> = state
            .leaves
            .iter()
            .filter(|l| filter.matches(l.staff_id, l.status, l.leave_type))
            .filter_map(|l| {
                state.user(l.staff_id).map(|u| LeaveRow {
                    id: l.id,
                    staff_id: l.staff_id,
                    username: u.username.clone(),
                    email: u.email.clone(),
                    leave_type: l.leave_type,
                    start_date: l.start_date,
                    end_date: l.end_date,
                    reason: l.reason.clone(),
                    evidence: l.evidence.clone(),
                    status: l.status,
                    applied_at: l.applied_at,
                })
            })
            .collect();
        rows.sort_by(|a, b| b.applied_at.cmp(&a.applied_at).then_with(|| b.id.cmp(&a.id)));
        Ok(paginate(rows, page))
    }

    async fn leave_summary(&self, filter: &LeaveFilter) -> StoreResult<LeaveSummary> {
        let mut summary = LeaveSummary::default();
        for l in self.lock().leaves.iter() {
            if filter.matches(l.staff_id, l.status, l.leave_type) {
                summary.add(l.status);
            }
        }
        Ok(summary)
    }

    async fn transition_leave(&self, id: u64, from: LeaveStatus, to: LeaveStatus) -> StoreResult<bool> {
        let mut state = self.lock();
        match state.leaves.iter_mut().find(|l| l.id == id && l.status == from) {
            Some(l) => {
                l.status = to;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn create_notification(&self, n: NewNotification) -> StoreResult<Notification> {
        let mut state = self.lock();
        if state.user(n.recipient_id).is_none() {
            return Err(StoreError::NotFound("Recipient".to_string()));
        }
        let notification = Notification {
            id: state.id(),
            recipient_id: n.recipient_id,
            sender_id: n.sender_id,
            subject: n.subject,
            message: n.message,
            is_read: false,
            created_at: Utc::now(),
        };
        state.notifications.push(notification.clone());
        Ok(notification)
    }

    async fn list_notifications(&self, recipient_id: u64, limit: u64) -> StoreResult<Vec<Notification>> {
        let mut list: Vec<Notification> = self
            .lock()
            .notifications
            .iter()
            .filter(|n| n.recipient_id == recipient_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        list.truncate(limit as usize);
        Ok(list)
    }

    async fn count_unread(&self, recipient_id: u64) -> StoreResult<i64> {
        Ok(self
            .lock()
            .notifications
            .iter()
            .filter(|n| n.recipient_id == recipient_id && !n.is_read)
            .count() as i64)
    }

    async fn mark_notification_read(&self, id: u64, recipient_id: u64) -> StoreResult<bool> {
        match self
            .lock()
            .notifications
            .iter_mut()
            .find(|n| n.id == id && n.recipient_id == recipient_id)
        {
            Some(n) => {
                n.is_read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_all_read(&self, recipient_id: u64) -> StoreResult<u64> {
        let mut updated = 0;
        for n in self.lock().notifications.iter_mut() {
            if n.recipient_id == recipient_id && !n.is_read {
                n.is_read = true;
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn count_reset_attempts_since(&self, email: &str, since: DateTime<Utc>) -> StoreResult<i64> {
        Ok(self
            .lock()
            .reset_attempts
            .iter()
            .filter(|(e, at)| e == email && *at > since)
            .count() as i64)
    }

    async fn record_reset_attempt(&self, email: &str, at: DateTime<Utc>) -> StoreResult<()> {
        self.lock().reset_attempts.push((email.to_string(), at));
        Ok(())
    }

    async fn create_reset_token(
        &self,
        user_id: u64,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut state = self.lock();
        let token = PasswordResetToken {
            id: state.id(),
            user_id,
            token_hash: token_hash.to_string(),
            expires_at,
            used_at: None,
            created_at: Utc::now(),
        };
        state.reset_tokens.push(token);
        Ok(())
    }

    async fn find_reset_token(&self, token_hash: &str) -> StoreResult<Option<PasswordResetToken>> {
        Ok(self
            .lock()
            .reset_tokens
            .iter()
            .find(|t| t.token_hash == token_hash)
            .cloned())
    }

    async fn consume_reset_token(
        &self,
        token_id: u64,
        user_id: u64,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut state = self.lock();
        match state
            .reset_tokens
            .iter_mut()
            .find(|t| t.id == token_id && t.used_at.is_none())
        {
            Some(t) => t.used_at = Some(now),
            None => return Ok(false),
        }
        if let Some(u) = state.users.iter_mut().find(|u| u.id == user_id) {
            u.password_hash = password_hash.to_string();
        }
        Ok(true)
    }
}
