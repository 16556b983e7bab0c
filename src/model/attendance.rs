use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString, IntoStaticStr};
use utoipa::{IntoParams, ToSchema};

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, ToSchema, EnumString, Display,
    IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
}

impl AttendanceStatus {
    /// Status for a check-in at `local_time`. Sub-second precision is dropped,
    /// so a check-in anywhere within the cutoff second still counts as present.
    /// `Absent` is never produced here.
    pub fn for_check_in(local_time: NaiveTime, cutoff: NaiveTime) -> Self {
        let time = local_time.with_nanosecond(0).unwrap_or(local_time);
        if time <= cutoff {
            AttendanceStatus::Present
        } else {
            AttendanceStatus::Late
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[schema(example = json!({
    "id": 1,
    "staff_id": 7,
    "date": "2026-01-05",
    "status": "present",
    "timestamp": "2026-01-05T07:02:11Z"
}))]
pub struct AttendanceRecord {
    pub id: u64,
    pub staff_id: u64,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    #[schema(value_type = String, format = "date-time")]
    pub timestamp: DateTime<Utc>,
}

/// Attendance record joined with the owner's identity, used by reports and exports.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AttendanceRow {
    pub id: u64,
    pub staff_id: u64,
    pub username: String,
    pub email: String,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    #[schema(value_type = String, format = "date-time")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
pub struct AttendanceFilter {
    /// Only records of this staff member
    #[schema(example = 7)]
    pub staff_id: Option<u64>,
    /// Earliest date, inclusive
    #[schema(value_type = Option<String>, format = "date", example = "2026-01-01")]
    pub start_date: Option<NaiveDate>,
    /// Latest date, inclusive
    #[schema(value_type = Option<String>, format = "date", example = "2026-01-31")]
    pub end_date: Option<NaiveDate>,
    /// Only records with this status
    pub status: Option<AttendanceStatus>,
}

impl AttendanceFilter {
    pub fn matches(&self, staff_id: u64, date: NaiveDate, status: AttendanceStatus) -> bool {
        self.staff_id.is_none_or(|id| id == staff_id)
            && self.start_date.is_none_or(|d| date >= d)
            && self.end_date.is_none_or(|d| date <= d)
            && self.status.is_none_or(|s| s == status)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct AttendanceSummary {
    pub total: i64,
    pub present: i64,
    pub absent: i64,
    pub late: i64,
}

impl AttendanceSummary {
    pub fn add(&mut self, status: AttendanceStatus) {
        self.total += 1;
        match status {
            AttendanceStatus::Present => self.present += 1,
            AttendanceStatus::Absent => self.absent += 1,
            AttendanceStatus::Late => self.late += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    #[test]
    fn cutoff_is_inclusive() {
        let cutoff = t(8, 10, 0);
        assert_eq!(AttendanceStatus::for_check_in(t(7, 0, 0), cutoff), AttendanceStatus::Present);
        assert_eq!(AttendanceStatus::for_check_in(t(8, 10, 0), cutoff), AttendanceStatus::Present);
        assert_eq!(AttendanceStatus::for_check_in(t(8, 10, 1), cutoff), AttendanceStatus::Late);
        assert_eq!(AttendanceStatus::for_check_in(t(17, 0, 0), cutoff), AttendanceStatus::Late);
    }

    #[test]
    fn fractional_seconds_within_cutoff_are_present() {
        let cutoff = t(8, 10, 0);
        let almost = NaiveTime::from_hms_milli_opt(8, 10, 0, 999).unwrap();
        assert_eq!(AttendanceStatus::for_check_in(almost, cutoff), AttendanceStatus::Present);
    }

    #[test]
    fn filter_bounds_are_inclusive() {
        let d = |day| NaiveDate::from_ymd_opt(2026, 1, day).unwrap();
        let filter = AttendanceFilter {
            staff_id: Some(3),
            start_date: Some(d(2)),
            end_date: Some(d(4)),
            status: None,
        };
        assert!(filter.matches(3, d(2), AttendanceStatus::Late));
        assert!(filter.matches(3, d(4), AttendanceStatus::Present));
        assert!(!filter.matches(3, d(5), AttendanceStatus::Present));
        assert!(!filter.matches(4, d(3), AttendanceStatus::Present));
    }

    #[test]
    fn summary_counts_each_status() {
        let mut s = AttendanceSummary::default();
        s.add(AttendanceStatus::Present);
        s.add(AttendanceStatus::Late);
        s.add(AttendanceStatus::Late);
        assert_eq!(s, AttendanceSummary { total: 3, present: 1, absent: 0, late: 2 });
    }
}
