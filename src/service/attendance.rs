use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Utc};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::model::attendance::{AttendanceRecord, AttendanceStatus};
use crate::store::Store;

/// Calendar day of `now` in the deployment's local offset.
pub fn local_today(now: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    now.with_timezone(&offset).date_naive()
}

/// Records (or overwrites) today's check-in for `staff_id`.
#[instrument(skip(store))]
pub async fn check_in(
    store: &dyn Store,
    staff_id: u64,
    now: DateTime<Utc>,
    offset: FixedOffset,
    cutoff: NaiveTime,
) -> Result<AttendanceRecord, AppError> {
    let local = now.with_timezone(&offset);
    let status = AttendanceStatus::for_check_in(local.time(), cutoff);
    let record = store
        .upsert_attendance(staff_id, local.date_naive(), status, now)
        .await?;
    info!(date = %record.date, status = %record.status, "Attendance marked");
    Ok(record)
}

/// Admin override: any status for any day of a staff account.
pub async fn set_manual(
    store: &dyn Store,
    staff_id: u64,
    date: NaiveDate,
    status: AttendanceStatus,
    now: DateTime<Utc>,
) -> Result<AttendanceRecord, AppError> {
    let staff = store
        .find_user(staff_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Staff member not found".to_string()))?;
    if !staff.is_staff() {
        return Err(AppError::field("staff_id", "Attendance can only be set for staff accounts."));
    }
    let record = store.upsert_attendance(staff_id, date, status, now).await?;
    info!(staff_id, %date, %status, "Attendance set manually");
    Ok(record)
}
