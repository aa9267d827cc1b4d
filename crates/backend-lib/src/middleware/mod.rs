// crates/backend-lib/src/middleware/mod.rs

//! Middleware for the enrol web server.

pub mod session;

pub use session::{cookie_value, session_layer, SessionHandle};
