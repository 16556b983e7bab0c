use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::AppError;
use crate::model::attendance::{AttendanceFilter, AttendanceRecord, AttendanceRow, AttendanceSummary};
use crate::model::leave_request::{LeaveFilter, LeaveStatus, LeaveSummary};
use crate::model::role::Role;
use crate::store::{Page, Store};

const TREND_DAYS: i64 = 7;
const RECENT_RECORDS: u64 = 5;

#[derive(Debug, Serialize, ToSchema)]
pub struct DailyAttendance {
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub present: i64,
    pub late: i64,
    pub absent: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdminDashboard {
    pub total_staff: i64,
    pub present_today: i64,
    pub absent_today: i64,
    pub late_today: i64,
    pub pending_leaves: i64,
    /// Oldest day first, ending today.
    pub trend: Vec<DailyAttendance>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StaffDashboard {
    pub attendance: AttendanceSummary,
    pub days_present_this_month: i64,
    pub days_recorded_this_month: i64,
    pub attendance_percentage: f64,
    pub leaves: LeaveSummary,
    pub today: Option<AttendanceRecord>,
    pub recent: Vec<AttendanceRow>,
}

fn day_filter(staff_id: Option<u64>, start: NaiveDate, end: NaiveDate) -> AttendanceFilter {
    AttendanceFilter {
        staff_id,
        start_date: Some(start),
        end_date: Some(end),
        status: None,
    }
}

/// Present days over recorded days, one decimal; zero when nothing is recorded.
pub fn attendance_percentage(present: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    (present as f64 / total as f64 * 1000.0).round() / 10.0
}

pub async fn admin(store: &dyn Store, today: NaiveDate) -> Result<AdminDashboard, AppError> {
    let total_staff = store.count_users(Role::Staff).await?;
    let pending_leaves = store
        .leave_summary(&LeaveFilter {
            status: Some(LeaveStatus::Pending),
            ..Default::default()
        })
        .await?
        .pending;

    let mut trend = Vec::with_capacity(TREND_DAYS as usize);
    for back in (0..TREND_DAYS).rev() {
        let date = today - Duration::days(back);
        let s = store.attendance_summary(&day_filter(None, date, date)).await?;
        trend.push(DailyAttendance {
            date,
            present: s.present,
            late: s.late,
            absent: s.absent,
        });
    }

    let (present_today, late_today, absent_today) = trend
        .last()
        .map(|d| (d.present, d.late, d.absent))
        .unwrap_or_default();

    Ok(AdminDashboard {
        total_staff,
        present_today,
        absent_today,
        late_today,
        pending_leaves,
        trend,
    })
}

pub async fn staff(store: &dyn Store, staff_id: u64, today: NaiveDate) -> Result<StaffDashboard, AppError> {
    let own = AttendanceFilter {
        staff_id: Some(staff_id),
        ..Default::default()
    };
    let attendance = store.attendance_summary(&own).await?;

    let month_start = today.with_day(1).unwrap_or(today);
    let month = store
        .attendance_summary(&day_filter(Some(staff_id), month_start, today))
        .await?;

    let leaves = store
        .leave_summary(&LeaveFilter {
            staff_id: Some(staff_id),
            ..Default::default()
        })
        .await?;

    let today_record = store.find_attendance(staff_id, today).await?;
    let recent = store
        .list_attendance(&own, Some(Page::new(1, RECENT_RECORDS)))
        .await?;

    Ok(StaffDashboard {
        attendance,
        days_present_this_month: month.present,
        days_recorded_this_month: month.total,
        attendance_percentage: attendance_percentage(month.present, month.total),
        leaves,
        today: today_record,
        recent,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attendance::AttendanceStatus;
    use crate::store::memory::InMemoryStore;
    use chrono::Utc;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, day).unwrap()
    }

    #[test]
    fn percentage_rounds_to_one_decimal() {
        assert_eq!(attendance_percentage(0, 0), 0.0);
        assert_eq!(attendance_percentage(2, 3), 66.7);
        assert_eq!(attendance_percentage(1, 3), 33.3);
        assert_eq!(attendance_percentage(4, 4), 100.0);
    }

    #[actix_web::test]
    async fn admin_trend_covers_seven_days_ending_today() {
        let store = InMemoryStore::new();
        let a = store.seed_user("alice", Role::Staff, "x");
        let b = store.seed_user("bob", Role::Staff, "x");
        store.upsert_attendance(a.id, d(10), AttendanceStatus::Present, Utc::now()).await.unwrap();
        store.upsert_attendance(b.id, d(10), AttendanceStatus::Late, Utc::now()).await.unwrap();
        store.upsert_attendance(a.id, d(4), AttendanceStatus::Absent, Utc::now()).await.unwrap();
        // outside the window
        store.upsert_attendance(a.id, d(3), AttendanceStatus::Present, Utc::now()).await.unwrap();

        let dash = admin(&store, d(10)).await.unwrap();

        assert_eq!(dash.total_staff, 2);
        assert_eq!((dash.present_today, dash.late_today, dash.absent_today), (1, 1, 0));
        assert_eq!(dash.trend.len(), 7);
        assert_eq!(dash.trend[0].date, d(4));
        assert_eq!(dash.trend[0].absent, 1);
        assert_eq!(dash.trend.iter().map(|t| t.present).sum::<i64>(), 1);
    }

    #[actix_web::test]
    async fn staff_month_stats_ignore_previous_months() {
        let store = InMemoryStore::new();
        let a = store.seed_user("alice", Role::Staff, "x");
        let april = NaiveDate::from_ymd_opt(2026, 4, 30).unwrap();
        store.upsert_attendance(a.id, april, AttendanceStatus::Present, Utc::now()).await.unwrap();
        store.upsert_attendance(a.id, d(1), AttendanceStatus::Present, Utc::now()).await.unwrap();
        store.upsert_attendance(a.id, d(2), AttendanceStatus::Late, Utc::now()).await.unwrap();
        store.upsert_attendance(a.id, d(3), AttendanceStatus::Present, Utc::now()).await.unwrap();

        let dash = staff(&store, a.id, d(3)).await.unwrap();

        assert_eq!(dash.attendance.total, 4);
        assert_eq!((dash.days_present_this_month, dash.days_recorded_this_month), (2, 3));
        assert_eq!(dash.attendance_percentage, 66.7);
        assert_eq!(dash.today.map(|r| r.date), Some(d(3)));
        assert_eq!(dash.recent.len(), 4);
        assert_eq!(dash.recent[0].date, d(3));
    }
}
