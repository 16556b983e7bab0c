pub mod attendance;
pub mod invitation;
pub mod leave_request;
pub mod notification;
pub mod password_reset;
pub mod role;
pub mod user;
