use crate::api::attendance::ManualAttendance;
use crate::api::leave_request::ApplyLeave;
use crate::api::staff::InviteReq;
use crate::model::attendance::{
    AttendanceFilter, AttendanceRecord, AttendanceRow, AttendanceStatus, AttendanceSummary,
};
use crate::model::invitation::Invitation;
use crate::model::leave_request::{
    LeaveDecision, LeaveFilter, LeaveRequest, LeaveRow, LeaveStatus, LeaveSummary, LeaveType,
};
use crate::model::notification::Notification;
use crate::model::role::Role;
use crate::model::user::{ProfileUpdate, StaffUpdate, User};
use crate::models::{
    LoginReqDto, PasswordResetConfirmDto, PasswordResetReqDto, RegisterReqDto, TokenPair,
};
use crate::service::dashboard::{AdminDashboard, DailyAttendance, StaffDashboard};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

/// Registers the bearer scheme referenced by `security(("bearer_auth" = []))`.
pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "StaffHub API",
        version = "1.0.0",
        description = r#"
## Staff attendance and leave management

### 🔹 Key Features
- **Attendance**
  - Daily check-in; present up to the cutoff time, late after it
  - Manual corrections and filtered reports for admins
- **Leave**
  - Sick, casual and vacation requests; sick leave needs evidence
  - Pending requests are approved or rejected exactly once
- **Staff**
  - Single-use email invitations and self-registration
  - Profile and account management
- **Notifications**
  - In-app records plus email on leave activity
- **Reports**
  - CSV and XLSX exports of attendance and leave history

### 🔐 Security
Endpoints under `/api/v1` require a **JWT Bearer** access token.
Admin-only operations answer `403` for staff accounts.

### 📦 Response Format
- JSON bodies; validation errors carry per-field messages
- Pagination with `page` and `per_page` on list endpoints

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,
        crate::auth::handlers::invitation_details,
        crate::auth::handlers::register,
        crate::auth::handlers::password_reset_request,
        crate::auth::handlers::password_reset_confirm,

        crate::api::attendance::mark_attendance,
        crate::api::attendance::today_attendance,
        crate::api::attendance::attendance_history,
        crate::api::attendance::attendance_report,
        crate::api::attendance::set_attendance,
        crate::api::attendance::export_attendance,

        crate::api::leave_request::apply_leave,
        crate::api::leave_request::my_leaves,
        crate::api::leave_request::leave_list,
        crate::api::leave_request::get_leave,
        crate::api::leave_request::approve_leave,
        crate::api::leave_request::reject_leave,
        crate::api::leave_request::export_leaves,

        crate::api::staff::send_invite,
        crate::api::staff::list_invitations,
        crate::api::staff::list_staff,
        crate::api::staff::get_staff,
        crate::api::staff::edit_staff,

        crate::api::notification::list_notifications,
        crate::api::notification::mark_read,
        crate::api::notification::mark_all_read,

        crate::api::dashboard::admin_dashboard,
        crate::api::dashboard::staff_dashboard,

        crate::api::profile::get_profile,
        crate::api::profile::update_profile
    ),
    components(
        schemas(
            LoginReqDto,
            RegisterReqDto,
            PasswordResetReqDto,
            PasswordResetConfirmDto,
            TokenPair,
            Role,
            User,
            ProfileUpdate,
            StaffUpdate,
            Invitation,
            InviteReq,
            AttendanceStatus,
            AttendanceRecord,
            AttendanceRow,
            AttendanceFilter,
            AttendanceSummary,
            ManualAttendance,
            LeaveType,
            LeaveStatus,
            LeaveDecision,
            LeaveRequest,
            LeaveRow,
            LeaveFilter,
            LeaveSummary,
            ApplyLeave,
            Notification,
            AdminDashboard,
            StaffDashboard,
            DailyAttendance
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Login, tokens, registration and password reset"),
        (name = "Attendance", description = "Attendance management APIs"),
        (name = "Leave", description = "Leave management APIs"),
        (name = "Staff", description = "Invitations and staff accounts"),
        (name = "Notification", description = "In-app notifications"),
        (name = "Dashboard", description = "Aggregated overviews"),
        (name = "Profile", description = "The signed-in account"),
    )
)]
pub struct ApiDoc;
