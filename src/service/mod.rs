pub mod attendance;
pub mod dashboard;
pub mod invitation;
pub mod leave;
pub mod notify;
pub mod password_reset;
