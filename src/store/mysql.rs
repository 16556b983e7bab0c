use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::mysql::MySqlArguments;
use sqlx::query::QueryAs;
use sqlx::{FromRow, MySql, MySqlPool};

use super::{Page, Store, StoreResult};
use crate::error::StoreError;
use crate::model::attendance::{
    AttendanceFilter, AttendanceRecord, AttendanceRow, AttendanceStatus, AttendanceSummary,
};
use crate::model::invitation::Invitation;
use crate::model::leave_request::{
    LeaveFilter, LeaveRequest, LeaveRow, LeaveStatus, LeaveSummary, LeaveType, NewLeave,
};
use crate::model::notification::{NewNotification, Notification};
use crate::model::password_reset::PasswordResetToken;
use crate::model::role::Role;
use crate::model::user::{NewUser, ProfileUpdate, StaffUpdate, User};

pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

// Helper enum for typed SQLx binding of dynamic filters
enum FilterValue {
    U64(u64),
    Str(&'static str),
    Date(NaiveDate),
}

fn bind_filters<'q, O>(
    mut q: QueryAs<'q, MySql, O, MySqlArguments>,
    args: &'q [FilterValue],
) -> QueryAs<'q, MySql, O, MySqlArguments> {
    for arg in args {
        q = match arg {
            FilterValue::U64(v) => q.bind(*v),
            FilterValue::Str(s) => q.bind(*s),
            FilterValue::Date(d) => q.bind(*d),
        };
    }
    q
}

fn parse<T: FromStr>(column: &str, raw: &str) -> StoreResult<T> {
    raw.parse::<T>()
        .map_err(|_| StoreError::Corrupt(format!("{} = {:?}", column, raw)))
}

/// Key named by a MySQL duplicate-entry message, without its table prefix:
/// `Duplicate entry 'x' for key 'users.email'` gives `email`.
fn duplicate_key(message: &str) -> Option<&str> {
    let (_, tail) = message.rsplit_once("for key '")?;
    let key = tail.strip_suffix('\'')?;
    Some(key.rsplit('.').next().unwrap_or(key))
}

fn conflict_label(message: &str) -> &'static str {
    match duplicate_key(message) {
        Some("username") => "Username",
        Some("email") => "Email",
        Some("uq_attendance_staff_date") => "Attendance record",
        _ => "Record",
    }
}

/// Maps duplicate-key errors onto `Conflict`, naming the offending column.
fn conflict_or(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            return StoreError::Conflict(conflict_label(db_err.message()).to_string());
        }
    }
    StoreError::Database(e)
}

fn attendance_where(filter: &AttendanceFilter) -> (String, Vec<FilterValue>) {
    let mut sql = String::from(" WHERE 1=1");
    let mut args = Vec::new();
    if let Some(staff_id) = filter.staff_id {
        sql.push_str(" AND a.staff_id = ?");
        args.push(FilterValue::U64(staff_id));
    }
    if let Some(start) = filter.start_date {
        sql.push_str(" AND a.`date` >= ?");
        args.push(FilterValue::Date(start));
    }
    if let Some(end) = filter.end_date {
        sql.push_str(" AND a.`date` <= ?");
        args.push(FilterValue::Date(end));
    }
    if let Some(status) = filter.status {
        sql.push_str(" AND a.status = ?");
        args.push(FilterValue::Str(<&'static str>::from(status)));
    }
    (sql, args)
}

fn leave_where(filter: &LeaveFilter) -> (String, Vec<FilterValue>) {
    let mut sql = String::from(" WHERE 1=1");
    let mut args = Vec::new();
    if let Some(staff_id) = filter.staff_id {
        sql.push_str(" AND l.staff_id = ?");
        args.push(FilterValue::U64(staff_id));
    }
    if let Some(status) = filter.status {
        sql.push_str(" AND l.status = ?");
        args.push(FilterValue::Str(<&'static str>::from(status)));
    }
    if let Some(leave_type) = filter.leave_type {
        sql.push_str(" AND l.leave_type = ?");
        args.push(FilterValue::Str(<&'static str>::from(leave_type)));
    }
    (sql, args)
}

/* =========================
Row types
========================= */

const USER_COLUMNS: &str = "id, username, email, password, role, first_name, last_name, is_active, created_at, last_login_at";

#[derive(FromRow)]
struct UserRow {
    id: u64,
    username: String,
    email: String,
    password: String,
    role: String,
    first_name: String,
    last_name: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    last_login_at: Option<DateTime<Utc>>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> StoreResult<Self> {
        Ok(User {
            id: row.id,
            username: row.username,
            email: row.email,
            role: parse::<Role>("users.role", &row.role)?,
            password_hash: row.password,
            first_name: row.first_name,
            last_name: row.last_name,
            is_active: row.is_active,
            created_at: row.created_at,
            last_login_at: row.last_login_at,
        })
    }
}

#[derive(FromRow)]
struct InvitationRow {
    id: u64,
    email: String,
    token: String,
    is_used: bool,
    created_at: DateTime<Utc>,
}

impl From<InvitationRow> for Invitation {
    fn from(row: InvitationRow) -> Self {
        Invitation {
            id: row.id,
            email: row.email,
            token: row.token,
            is_used: row.is_used,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct AttendanceRecordRow {
    id: u64,
    staff_id: u64,
    date: NaiveDate,
    status: String,
    timestamp: DateTime<Utc>,
}

impl TryFrom<AttendanceRecordRow> for AttendanceRecord {
    type Error = StoreError;

    fn try_from(row: AttendanceRecordRow) -> StoreResult<Self> {
        Ok(AttendanceRecord {
            id: row.id,
            staff_id: row.staff_id,
            date: row.date,
            status: parse("attendance.status", &row.status)?,
            timestamp: row.timestamp,
        })
    }
}

#[derive(FromRow)]
struct AttendanceJoinRow {
    id: u64,
    staff_id: u64,
    username: String,
    email: String,
    date: NaiveDate,
    status: String,
    timestamp: DateTime<Utc>,
}

impl TryFrom<AttendanceJoinRow> for AttendanceRow {
    type Error = StoreError;

    fn try_from(row: AttendanceJoinRow) -> StoreResult<Self> {
        Ok(AttendanceRow {
            id: row.id,
            staff_id: row.staff_id,
            username: row.username,
            email: row.email,
            date: row.date,
            status: parse("attendance.status", &row.status)?,
            timestamp: row.timestamp,
        })
    }
}

const LEAVE_COLUMNS: &str =
    "l.id, l.staff_id, l.leave_type, l.start_date, l.end_date, l.reason, l.evidence, l.status, l.applied_at";

#[derive(FromRow)]
struct LeaveRecordRow {
    id: u64,
    staff_id: u64,
    leave_type: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    reason: String,
    evidence: Option<String>,
    status: String,
    applied_at: DateTime<Utc>,
}

impl TryFrom<LeaveRecordRow> for LeaveRequest {
    type Error = StoreError;

    fn try_from(row: LeaveRecordRow) -> StoreResult<Self> {
        Ok(LeaveRequest {
            id: row.id,
            staff_id: row.staff_id,
            leave_type: parse("leave_requests.leave_type", &row.leave_type)?,
            start_date: row.start_date,
            end_date: row.end_date,
            reason: row.reason,
            evidence: row.evidence,
            status: parse("leave_requests.status", &row.status)?,
            applied_at: row.applied_at,
        })
    }
}

#[derive(FromRow)]
struct LeaveJoinRow {
    id: u64,
    staff_id: u64,
    username: String,
    email: String,
    leave_type: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    reason: String,
    evidence: Option<String>,
    status: String,
    applied_at: DateTime<Utc>,
}

impl TryFrom<LeaveJoinRow> for LeaveRow {
    type Error = StoreError;

    fn try_from(row: LeaveJoinRow) -> StoreResult<Self> {
        Ok(LeaveRow {
            id: row.id,
            staff_id: row.staff_id,
            username: row.username,
            email: row.email,
            leave_type: parse("leave_requests.leave_type", &row.leave_type)?,
            start_date: row.start_date,
            end_date: row.end_date,
            reason: row.reason,
            evidence: row.evidence,
            status: parse("leave_requests.status", &row.status)?,
            applied_at: row.applied_at,
        })
    }
}

#[derive(FromRow)]
struct NotificationRow {
    id: u64,
    recipient_id: u64,
    sender_id: Option<u64>,
    subject: String,
    message: String,
    is_read: bool,
    created_at: DateTime<Utc>,
}

impl From<NotificationRow> for Notification {
    fn from(row: NotificationRow) -> Self {
        Notification {
            id: row.id,
            recipient_id: row.recipient_id,
            sender_id: row.sender_id,
            subject: row.subject,
            message: row.message,
            is_read: row.is_read,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct ResetTokenRow {
    id: u64,
    user_id: u64,
    token_hash: String,
    expires_at: DateTime<Utc>,
    used_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<ResetTokenRow> for PasswordResetToken {
    fn from(row: ResetTokenRow) -> Self {
        PasswordResetToken {
            id: row.id,
            user_id: row.user_id,
            token_hash: row.token_hash,
            expires_at: row.expires_at,
            used_at: row.used_at,
            created_at: row.created_at,
        }
    }
}

impl MySqlStore {
    async fn insert_user<'e, E>(executor: E, user: &NewUser) -> StoreResult<u64>
    where
        E: sqlx::Executor<'e, Database = MySql>,
    {
        let result = sqlx::query(
            r#"
            INSERT INTO users (username, email, password, role, first_name, last_name)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(<&'static str>::from(user.role))
        .bind(&user.first_name)
        .bind(&user.last_name)
        .execute(executor)
        .await
        .map_err(conflict_or)?;

        Ok(result.last_insert_id())
    }

    async fn require_user(&self, id: u64) -> StoreResult<User> {
        self.find_user(id)
            .await?
            .ok_or_else(|| StoreError::NotFound("User".to_string()))
    }

    async fn find_user_where(&self, clause: &str, value: &str) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE {} = ?", USER_COLUMNS, clause);
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }
}

#[async_trait]
impl Store for MySqlStore {
    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let id = Self::insert_user(&self.pool, &user).await?;
        self.require_user(id).await
    }

    async fn find_user(&self, id: u64) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        self.find_user_where("username", username).await
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.find_user_where("email", email).await
    }

    async fn username_exists(&self, username: &str) -> StoreResult<bool> {
        let exists = sqlx::query_scalar::<_, i64>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE username = ? LIMIT 1)",
        )
        .bind(username)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists > 0)
    }

    async fn list_users(&self, role: Role, active_only: bool) -> StoreResult<Vec<User>> {
        let mut sql = format!("SELECT {} FROM users WHERE role = ?", USER_COLUMNS);
        if active_only {
            sql.push_str(" AND is_active = TRUE");
        }
        sql.push_str(" ORDER BY username");

        sqlx::query_as::<_, UserRow>(&sql)
            .bind(<&'static str>::from(role))
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(User::try_from)
            .collect()
    }

    async fn count_users(&self, role: Role) -> StoreResult<i64> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE role = ?")
            .bind(<&'static str>::from(role))
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }

    async fn update_profile(&self, id: u64, update: &ProfileUpdate) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET first_name = COALESCE(?, first_name),
                last_name = COALESCE(?, last_name)
            WHERE id = ?
            "#,
        )
        .bind(update.first_name.as_deref())
        .bind(update.last_name.as_deref())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_staff(&self, id: u64, update: &StaffUpdate) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET username = COALESCE(?, username),
                email = COALESCE(?, email),
                first_name = COALESCE(?, first_name),
                last_name = COALESCE(?, last_name),
                is_active = COALESCE(?, is_active)
            WHERE id = ?
            "#,
        )
        .bind(update.username.as_deref())
        .bind(update.email.as_deref())
        .bind(update.first_name.as_deref())
        .bind(update.last_name.as_deref())
        .bind(update.is_active)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(conflict_or)?;
        Ok(())
    }

    async fn touch_last_login(&self, id: u64, at: DateTime<Utc>) -> StoreResult<()> {
        sqlx::query("UPDATE users SET last_login_at = ? WHERE id = ?")
            .bind(at)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn all_usernames(&self) -> StoreResult<Vec<String>> {
        let rows = sqlx::query_as::<_, (String,)>("SELECT LOWER(username) FROM users")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(u,)| u).collect())
    }

    async fn recent_usernames(&self, since: DateTime<Utc>) -> StoreResult<Vec<String>> {
        let rows = sqlx::query_as::<_, (String,)>(
            r#"
            SELECT LOWER(username)
            FROM users
            WHERE last_login_at >= ?
            ORDER BY last_login_at DESC
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(u,)| u).collect())
    }

    async fn store_refresh_token(
        &self,
        user_id: u64,
        jti: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        sqlx::query("INSERT INTO refresh_tokens (user_id, jti, expires_at) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(jti)
            .bind(expires_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn consume_refresh_token(&self, jti: &str, now: DateTime<Utc>) -> StoreResult<Option<u64>> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked = TRUE
            WHERE jti = ? AND revoked = FALSE AND expires_at > ?
            "#,
        )
        .bind(jti)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        let user_id = sqlx::query_scalar::<_, u64>("SELECT user_id FROM refresh_tokens WHERE jti = ?")
            .bind(jti)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user_id)
    }

    async fn revoke_user_refresh_tokens(&self, user_id: u64) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked = TRUE WHERE user_id = ? AND revoked = FALSE",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn create_invitation(&self, email: &str, token: &str) -> StoreResult<Invitation> {
        let result = sqlx::query("INSERT INTO invitations (email, token) VALUES (?, ?)")
            .bind(email)
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(conflict_or)?;

        sqlx::query_as::<_, InvitationRow>(
            "SELECT id, email, token, is_used, created_at FROM invitations WHERE id = ?",
        )
        .bind(result.last_insert_id())
        .fetch_one(&self.pool)
        .await
        .map(Invitation::from)
        .map_err(StoreError::from)
    }

    async fn find_open_invitation(&self, token: &str) -> StoreResult<Option<Invitation>> {
        let row = sqlx::query_as::<_, InvitationRow>(
            r#"
            SELECT id, email, token, is_used, created_at
            FROM invitations
            WHERE token = ? AND is_used = FALSE
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Invitation::from))
    }

    async fn invitation_email_exists(&self, email: &str) -> StoreResult<bool> {
        let exists = sqlx::query_scalar::<_, i64>(
            "SELECT EXISTS(SELECT 1 FROM invitations WHERE email = ? LIMIT 1)",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists > 0)
    }

    async fn list_invitations(&self) -> StoreResult<Vec<Invitation>> {
        let rows = sqlx::query_as::<_, InvitationRow>(
            "SELECT id, email, token, is_used, created_at FROM invitations ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Invitation::from).collect())
    }

    async fn register_invited(&self, token: &str, user: NewUser) -> StoreResult<User> {
        let mut tx = self.pool.begin().await?;

        let claimed = sqlx::query(
            "UPDATE invitations SET is_used = TRUE WHERE token = ? AND is_used = FALSE",
        )
        .bind(token)
        .execute(&mut *tx)
        .await?;

        if claimed.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(StoreError::NotFound("Invitation".to_string()));
        }

        let id = match Self::insert_user(&mut *tx, &user).await {
            Ok(id) => id,
            Err(e) => {
                tx.rollback().await?;
                return Err(e);
            }
        };

        tx.commit().await?;
        self.require_user(id).await
    }

    async fn upsert_attendance(
        &self,
        staff_id: u64,
        date: NaiveDate,
        status: AttendanceStatus,
        timestamp: DateTime<Utc>,
    ) -> StoreResult<AttendanceRecord> {
        sqlx::query(
            r#"
            INSERT INTO attendance (staff_id, `date`, status, `timestamp`)
            VALUES (?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE status = VALUES(status), `timestamp` = VALUES(`timestamp`)
            "#,
        )
        .bind(staff_id)
        .bind(date)
        .bind(<&'static str>::from(status))
        .bind(timestamp)
        .execute(&self.pool)
        .await?;

        self.find_attendance(staff_id, date)
            .await?
            .ok_or_else(|| StoreError::NotFound("Attendance record".to_string()))
    }

    async fn find_attendance(
        &self,
        staff_id: u64,
        date: NaiveDate,
    ) -> StoreResult<Option<AttendanceRecord>> {
        sqlx::query_as::<_, AttendanceRecordRow>(
            r#"
            SELECT id, staff_id, `date`, status, `timestamp`
            FROM attendance
            WHERE staff_id = ? AND `date` = ?
            "#,
        )
        .bind(staff_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?
        .map(AttendanceRecord::try_from)
        .transpose()
    }

    async fn list_attendance(
        &self,
        filter: &AttendanceFilter,
        page: Option<Page>,
    ) -> StoreResult<Vec<AttendanceRow>> {
        let (where_sql, args) = attendance_where(filter);
        let mut sql = format!(
            r#"
            SELECT a.id, a.staff_id, u.username, u.email, a.`date`, a.status, a.`timestamp`
            FROM attendance a
            JOIN users u ON u.id = a.staff_id
            {}
            ORDER BY a.`date` DESC, u.username ASC, a.id DESC
            "#,
            where_sql
        );
        if page.is_some() {
            sql.push_str(" LIMIT ? OFFSET ?");
        }

        let mut q = bind_filters(sqlx::query_as::<_, AttendanceJoinRow>(&sql), &args);
        if let Some(page) = page {
            q = q.bind(page.size()).bind(page.offset());
        }

        q.fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(AttendanceRow::try_from)
            .collect()
    }

    async fn attendance_summary(&self, filter: &AttendanceFilter) -> StoreResult<AttendanceSummary> {
        let (where_sql, args) = attendance_where(filter);
        let sql = format!(
            "SELECT a.status, COUNT(*) FROM attendance a{} GROUP BY a.status",
            where_sql
        );
        let rows = bind_filters(sqlx::query_as::<_, (String, i64)>(&sql), &args)
            .fetch_all(&self.pool)
            .await?;

        let mut summary = AttendanceSummary::default();
        for (status, count) in rows {
            let status: AttendanceStatus = parse("attendance.status", &status)?;
            summary.total += count;
            match status {
                AttendanceStatus::Present => summary.present += count,
                AttendanceStatus::Absent => summary.absent += count,
                AttendanceStatus::Late => summary.late += count,
            }
        }
        Ok(summary)
    }

    async fn create_leave(&self, leave: NewLeave) -> StoreResult<LeaveRequest> {
        let result = sqlx::query(
            r#"
            INSERT INTO leave_requests
                (staff_id, leave_type, start_date, end_date, reason, evidence)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(leave.staff_id)
        .bind(<&'static str>::from(leave.leave_type))
        .bind(leave.start_date)
        .bind(leave.end_date)
        .bind(&leave.reason)
        .bind(leave.evidence.as_deref())
        .execute(&self.pool)
        .await?;

        self.find_leave(result.last_insert_id())
            .await?
            .ok_or_else(|| StoreError::NotFound("Leave request".to_string()))
    }

    async fn find_leave(&self, id: u64) -> StoreResult<Option<LeaveRequest>> {
        let sql = format!("SELECT {} FROM leave_requests l WHERE l.id = ?", LEAVE_COLUMNS);
        sqlx::query_as::<_, LeaveRecordRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(LeaveRequest::try_from)
            .transpose()
    }

    async fn list_leaves(&self, filter: &LeaveFilter, page: Option<Page>) -> StoreResult<Vec<LeaveRow>> {
        let (where_sql, args) = leave_where(filter);
        let mut sql = format!(
            r#"
            SELECT {}, u.username, u.email
            FROM leave_requests l
            JOIN users u ON u.id = l.staff_id
            {}
            ORDER BY l.applied_at DESC, l.id DESC
            "#,
            LEAVE_COLUMNS, where_sql
        );
        if page.is_some() {
            sql.push_str(" LIMIT ? OFFSET ?");
        }

        let mut q = bind_filters(sqlx::query_as::<_, LeaveJoinRow>(&sql), &args);
        if let Some(page) = page {
            q = q.bind(page.size()).bind(page.offset());
        }

        q.fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(LeaveRow::try_from)
            .collect()
    }

    async fn leave_summary(&self, filter: &LeaveFilter) -> StoreResult<LeaveSummary> {
        let (where_sql, args) = leave_where(filter);
        let sql = format!(
            "SELECT l.status, COUNT(*) FROM leave_requests l{} GROUP BY l.status",
            where_sql
        );
        let rows = bind_filters(sqlx::query_as::<_, (String, i64)>(&sql), &args)
            .fetch_all(&self.pool)
            .await?;

        let mut summary = LeaveSummary::default();
        for (status, count) in rows {
            let status: LeaveStatus = parse("leave_requests.status", &status)?;
            summary.total += count;
            match status {
                LeaveStatus::Pending => summary.pending += count,
                LeaveStatus::Approved => summary.approved += count,
                LeaveStatus::Rejected => summary.rejected += count,
            }
        }
        Ok(summary)
    }

    async fn transition_leave(&self, id: u64, from: LeaveStatus, to: LeaveStatus) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE leave_requests SET status = ? WHERE id = ? AND status = ?")
            .bind(<&'static str>::from(to))
            .bind(id)
            .bind(<&'static str>::from(from))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn create_notification(&self, n: NewNotification) -> StoreResult<Notification> {
        let result = sqlx::query(
            "INSERT INTO notifications (recipient_id, sender_id, subject, message) VALUES (?, ?, ?, ?)",
        )
        .bind(n.recipient_id)
        .bind(n.sender_id)
        .bind(&n.subject)
        .bind(&n.message)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query_as::<_, NotificationRow>(
            r#"
            SELECT id, recipient_id, sender_id, subject, message, is_read, created_at
            FROM notifications
            WHERE id = ?
            "#,
        )
        .bind(result.last_insert_id())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn list_notifications(&self, recipient_id: u64, limit: u64) -> StoreResult<Vec<Notification>> {
        let rows = sqlx::query_as::<_, NotificationRow>(
            r#"
            SELECT id, recipient_id, sender_id, subject, message, is_read, created_at
            FROM notifications
            WHERE recipient_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(recipient_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Notification::from).collect())
    }

    async fn count_unread(&self, recipient_id: u64) -> StoreResult<i64> {
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM notifications WHERE recipient_id = ? AND is_read = FALSE",
        )
        .bind(recipient_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(total)
    }

    async fn mark_notification_read(&self, id: u64, recipient_id: u64) -> StoreResult<bool> {
        // MySQL reports changed rows only, so ownership is checked separately
        let owned = sqlx::query_scalar::<_, i64>(
            "SELECT EXISTS(SELECT 1 FROM notifications WHERE id = ? AND recipient_id = ?)",
        )
        .bind(id)
        .bind(recipient_id)
        .fetch_one(&self.pool)
        .await?;

        if owned == 0 {
            return Ok(false);
        }

        sqlx::query("UPDATE notifications SET is_read = TRUE WHERE id = ? AND recipient_id = ?")
            .bind(id)
            .bind(recipient_id)
            .execute(&self.pool)
            .await?;
        Ok(true)
    }

    async fn mark_all_read(&self, recipient_id: u64) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = TRUE WHERE recipient_id = ? AND is_read = FALSE",
        )
        .bind(recipient_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn count_reset_attempts_since(&self, email: &str, since: DateTime<Utc>) -> StoreResult<i64> {
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM password_reset_attempts WHERE email = ? AND created_at > ?",
        )
        .bind(email)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(total)
    }

    async fn record_reset_attempt(&self, email: &str, at: DateTime<Utc>) -> StoreResult<()> {
        sqlx::query("INSERT INTO password_reset_attempts (email, created_at) VALUES (?, ?)")
            .bind(email)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn create_reset_token(
        &self,
        user_id: u64,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO password_reset_tokens (user_id, token_hash, expires_at) VALUES (?, ?, ?)",
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_reset_token(&self, token_hash: &str) -> StoreResult<Option<PasswordResetToken>> {
        let row = sqlx::query_as::<_, ResetTokenRow>(
            r#"
            SELECT id, user_id, token_hash, expires_at, used_at, created_at
            FROM password_reset_tokens
            WHERE token_hash = ?
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(PasswordResetToken::from))
    }

    async fn consume_reset_token(
        &self,
        token_id: u64,
        user_id: u64,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;

        let used = sqlx::query(
            "UPDATE password_reset_tokens SET used_at = ? WHERE id = ? AND used_at IS NULL",
        )
        .bind(now)
        .bind(token_id)
        .execute(&mut *tx)
        .await?;

        if used.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query("UPDATE users SET password = ? WHERE id = ?")
            .bind(password_hash)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }
}
