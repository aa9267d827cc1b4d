// ==============
// crates/backend-lib/src/metrics.rs

//! Central place for metric keys
pub const SIGNUP_REQUESTED: &str = "signup.requested";
pub const SIGNUP_REJECTED: &str = "signup.rejected";
pub const SIGNUP_MAIL_FAILED: &str = "signup.mail_failed";
pub const CONFIRM_SUCCEEDED: &str = "confirm.succeeded";
pub const CONFIRM_FAILED: &str = "confirm.failed";
pub const LOGIN_SUCCEEDED: &str = "login.succeeded";
pub const LOGIN_FAILED: &str = "login.failed";
pub const SESSION_CREATED: &str = "session.created";
pub const SESSION_EXPIRED: &str = "session.expired";
pub const SESSION_EVICTED: &str = "session.evicted";
pub const SESSION_ACTIVE: &str = "session.active";
